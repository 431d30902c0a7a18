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
use umbra_core::renderer::{TextureFormat, UNIT_SOURCE};

/// The tone-mapped LDR image, and the programs that produce and present it.
#[derive(Debug)]
pub struct FinalRenderTargetToolbox {
    /// LDR framebuffer.
    pub framebuffer: FramebufferHandle,
    /// LDR colour.
    pub color: TextureHandle,
    /// HDR to LDR with exposure, tone mapping and gamma.
    pub tonemap: Option<Shader>,
    /// Plain copy to the output.
    pub copy: Option<Shader>,
}

impl FinalRenderTargetToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>) -> Result<Self, ToolboxError> {
        let color = guard.target("final_ldr", TextureFormat::Rgba8)?;
        let framebuffer = guard.framebuffer_with("final", &[color], None)?;
        Ok(Self {
            framebuffer,
            color,
            tonemap: guard.shader(ShaderDescriptor::new("tonemap").with_sampler("source", UNIT_SOURCE)),
            copy: guard.shader(ShaderDescriptor::new("copy").with_sampler("source", UNIT_SOURCE)),
        })
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        ctx.release_framebuffer(self.framebuffer);
        ctx.release_texture(self.color);
        release_shader(ctx, self.tonemap);
        release_shader(ctx, self.copy);
    }
}
