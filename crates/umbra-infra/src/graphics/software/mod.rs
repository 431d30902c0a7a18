// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A CPU implementation of [`GraphicsDevice`](umbra_core::renderer::GraphicsDevice).
//!
//! Textures are `f32` planes, draws are rasterized scanline by scanline with
//! the GL fixed-function rules, and programs are Rust implementations of
//! [`SoftwareProgram`] chosen by the label of the source they are created from.

mod device;
pub mod program;
mod programs;
mod raster;
mod texture;

pub use device::SoftwareDevice;
pub use program::{
    define_u32, FragmentInput, FragmentOutput, ProgramFactory, Sampler, ShaderEnv, SoftwareProgram,
    Varyings, VertexInput,
};
