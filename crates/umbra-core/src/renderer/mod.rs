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

//! Provides the public, backend-agnostic rendering contracts for Umbra.
//!
//! This module defines the "common language" of the frame-rendering pipeline:
//! the [`GraphicsDevice`] trait, the descriptors and fixed-function state it
//! consumes, and the data the passes read (lights, probes, settings).
//!
//! The 'how' lives elsewhere: `umbra-infra` implements [`GraphicsDevice`] for a
//! CPU reference rasterizer and for OpenGL, and `umbra-lanes` drives it.

pub mod api;
pub mod conventions;
pub mod error;
pub mod light;
pub mod probe;
pub mod settings;
pub mod stats;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::conventions::*;
pub use self::error::{RenderError, ResourceError, SettingsError, ShaderError};
pub use self::light::{LightComponent, LightType, LightUniform};
pub use self::probe::{LightProbe, ProbeKind};
pub use self::settings::{
    AntiAliasingAlgorithm, SettingLevel, ShadingAlgorithm, ToneMapping, VideoSettings,
};
pub use self::stats::{FrameTrace, RenderStats, TraceEvent};
pub use self::traits::{GraphicsDevice, MemoryShaderSource, ShaderSourceProvider};
