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

use super::{release_shader, SetupGuard};
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::error::ToolboxError;
use crate::shader::{Shader, ShaderDescriptor};
use umbra_core::renderer::{TextureFormat, UNIT_SOURCE, UNIT_SOURCE_AUX, UNIT_SOURCE_EXTRA};

/// Subpixel morphological anti-aliasing: edge, blend-weight and output targets.
#[derive(Debug)]
pub struct SmaaToolbox {
    /// Detected luma edges.
    pub edges_framebuffer: FramebufferHandle,
    /// Edges texture.
    pub edges: TextureHandle,
    /// Blending weights.
    pub weights_framebuffer: FramebufferHandle,
    /// Weights texture.
    pub weights: TextureHandle,
    /// Anti-aliased output.
    pub output_framebuffer: FramebufferHandle,
    /// Output texture.
    pub output: TextureHandle,
    /// Edge detection.
    pub edge: Option<Shader>,
    /// Blend weight calculation.
    pub blend_weights: Option<Shader>,
    /// Neighborhood blending.
    pub blend: Option<Shader>,
    /// Temporal resolve against the previous frame.
    pub resolve: Option<Shader>,
}

impl SmaaToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>) -> Result<Self, ToolboxError> {
        let edges = guard.target("smaa_edges", TextureFormat::Rgba8)?;
        let edges_framebuffer = guard.framebuffer_with("smaa_edges", &[edges], None)?;
        let weights = guard.target("smaa_weights", TextureFormat::Rgba8)?;
        let weights_framebuffer = guard.framebuffer_with("smaa_weights", &[weights], None)?;
        let output = guard.target("smaa_output", TextureFormat::Rgba8)?;
        let output_framebuffer = guard.framebuffer_with("smaa_output", &[output], None)?;
        let fullscreen = |name: &str| {
            ShaderDescriptor::new(name)
                .with_sampler("source", UNIT_SOURCE)
                .with_sampler("auxiliary", UNIT_SOURCE_AUX)
                .with_sampler("extra", UNIT_SOURCE_EXTRA)
        };
        Ok(Self {
            edges_framebuffer,
            edges,
            weights_framebuffer,
            weights,
            output_framebuffer,
            output,
            edge: guard.shader(fullscreen("smaa_edge")),
            blend_weights: guard.shader(fullscreen("smaa_weights")),
            blend: guard.shader(fullscreen("smaa_blend")),
            resolve: guard.shader(fullscreen("smaa_resolve")),
        })
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        for framebuffer in [self.edges_framebuffer, self.weights_framebuffer, self.output_framebuffer] {
            ctx.release_framebuffer(framebuffer);
        }
        for texture in [self.edges, self.weights, self.output] {
            ctx.release_texture(texture);
        }
        for shader in [self.edge, self.blend_weights, self.blend, self.resolve] {
            release_shader(ctx, shader);
        }
    }
}
