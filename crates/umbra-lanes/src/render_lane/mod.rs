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

//! The renderers: stateless operations over a toolbox collection and a scene.
//!
//! None of them owns GPU resources. Each reads the toolboxes it needs from a
//! [`RenderToolboxCollection`](crate::toolbox::RenderToolboxCollection),
//! logs and skips its work when one is missing, and leaves the context state
//! as it found it.

mod cubemap;
mod postprocess;
mod probe;
mod scene;
mod shadow;
mod skeletal;
mod volume;

pub use cubemap::{CubemapRenderer, IblShaders};
pub use postprocess::{gaussian_weights, PostprocessRenderer};
pub use probe::{LightProbeRenderer, DEFAULT_BAKE_ITERATIONS};
pub use scene::{FullRenderOptions, RenderTarget, SceneRenderer};
pub use shadow::ShadowMapRenderer;
pub use skeletal::SkeletalMeshRenderer;
pub use volume::VolumeRenderer;
