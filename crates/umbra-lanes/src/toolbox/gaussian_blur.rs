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

use super::{release_shader, PingPong, SetupGuard};
use crate::context::RenderContext;
use crate::error::ToolboxError;
use crate::shader::{Shader, ShaderDescriptor};
use umbra_core::renderer::{TextureFormat, UNIT_SOURCE};

/// Bloom: a half-resolution HDR ping-pong pair and the separable blur program.
#[derive(Debug)]
pub struct GaussianBlurToolbox {
    /// The pair.
    pub pair: PingPong,
    /// Separable blur.
    pub blur: Option<Shader>,
    /// Samples its source, for the downsample and the composite.
    pub copy: Option<Shader>,
}

impl GaussianBlurToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>) -> Result<Self, ToolboxError> {
        let size = guard.size();
        let pair = PingPong::create(guard, "bloom", size, TextureFormat::Rgba16F)?;
        Ok(Self {
            pair,
            blur: guard.shader(ShaderDescriptor::new("gaussian_blur").with_sampler("source", UNIT_SOURCE)),
            copy: guard.shader(
                ShaderDescriptor::new("copy")
                    .with_label("bloom_copy")
                    .with_sampler("source", UNIT_SOURCE),
            ),
        })
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        self.pair.release(ctx);
        release_shader(ctx, self.blur);
        release_shader(ctx, self.copy);
    }
}
