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

//! # Umbra Lanes
//!
//! The hot path of the renderer: everything that runs every frame.
//!
//! - [`context`]: the [`RenderContext`](context::RenderContext) that owns the
//!   device, mirrors its global state and hands out scoped state guards.
//! - [`toolbox`]: settings-keyed bundles of framebuffers and shaders.
//! - [`render_lane`]: the stateless renderers, with
//!   [`SceneRenderer::full_render`](render_lane::SceneRenderer::full_render)
//!   orchestrating a frame.
//! - [`scene`]: per-scene render data (renderables, lights, probes, skeletons).
//! - [`engine`]: the [`RenderEngine`](engine::RenderEngine) facade.

#![warn(missing_docs)]

pub mod context;
pub mod engine;
pub mod error;
pub mod material;
pub mod primitives;
pub mod render_lane;
pub mod scene;
pub mod shader;
pub mod toolbox;

pub use context::{RenderContext, StateScope};
pub use engine::RenderEngine;
pub use error::ToolboxError;
pub use toolbox::{RenderToolboxCollection, Toolbox, ToolboxKind, ToolboxType};
