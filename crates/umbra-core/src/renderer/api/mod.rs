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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`texture`]**: texture ids, formats, targets and sampling metadata.
//! - **[`framebuffer`]**: framebuffers, attachments, clears and blits.
//! - **[`pipeline`]**: fixed-function raster state (depth, stencil, blend, cull).
//! - **[`shader`]**: program sources and uniform values.
//! - **[`mesh`]**: vertex layouts and mesh descriptors.
//! - **[`buffer`]**: uniform buffers.
//! - **[`adapter`]**: information about the device doing the work.

pub mod adapter;
pub mod buffer;
pub mod framebuffer;
pub mod mesh;
pub mod pipeline;
pub mod shader;
pub mod texture;

pub use self::adapter::*;
pub use self::buffer::*;
pub use self::framebuffer::*;
pub use self::mesh::*;
pub use self::pipeline::*;
pub use self::shader::*;
pub use self::texture::*;
