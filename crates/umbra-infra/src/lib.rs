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

//! # Umbra Infra
//!
//! Concrete implementations of the contracts defined in `umbra-core`.
//!
//! - [`graphics::software::SoftwareDevice`]: a CPU reference rasterizer that
//!   runs the built-in programs in Rust. It needs no window and no GPU, which
//!   makes it the device of tests, headless baking and screenshots.
//! - [`FsShaderSource`]: program sources read from a directory, for devices
//!   that compile them.

#![warn(missing_docs)]

pub mod graphics;
pub mod shader_source;

pub use shader_source::FsShaderSource;

#[cfg(feature = "software")]
pub use graphics::software::SoftwareDevice;
