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

use super::SetupGuard;
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::error::ToolboxError;
use umbra_core::math::Extent2D;
use umbra_core::renderer::{AttachmentPoint, TextureFormat, VideoSettings};

/// The HDR framebuffer the lighting and forward passes write into.
///
/// Colour 0 is HDR colour, colour 1 the bright part fed to bloom, colour 2
/// the velocity buffer (temporal SMAA only). The depth/stencil texture is
/// shared with the G-buffer.
#[derive(Debug)]
pub struct MainFramebufferToolbox {
    /// The framebuffer.
    pub framebuffer: FramebufferHandle,
    /// HDR colour.
    pub hdr: TextureHandle,
    /// Bright colour.
    pub bright: TextureHandle,
    /// Screen-space velocity, with temporal SMAA.
    pub velocity: Option<TextureHandle>,
    /// Depth and stencil.
    pub depth_stencil: TextureHandle,
    /// Size of every attachment.
    pub size: Extent2D,
}

impl MainFramebufferToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>, settings: &VideoSettings) -> Result<Self, ToolboxError> {
        let hdr = guard.target("main_hdr", TextureFormat::Rgba16F)?;
        let bright = guard.target("main_bright", TextureFormat::Rgba16F)?;
        let velocity = if settings.temporal_aa() {
            Some(guard.target("main_velocity", TextureFormat::Rg16F)?)
        } else {
            None
        };
        let depth_stencil = guard.target("main_depth_stencil", TextureFormat::Depth24Stencil8)?;
        let colors: Vec<TextureHandle> = [Some(hdr), Some(bright), velocity].into_iter().flatten().collect();
        let framebuffer = guard.framebuffer_with(
            "main",
            &colors,
            Some((AttachmentPoint::DepthStencil, depth_stencil)),
        )?;
        Ok(Self {
            framebuffer,
            hdr,
            bright,
            velocity,
            depth_stencil,
            size: guard.size(),
        })
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        ctx.release_framebuffer(self.framebuffer);
        for texture in [Some(self.hdr), Some(self.bright), self.velocity, Some(self.depth_stencil)]
            .into_iter()
            .flatten()
        {
            ctx.release_texture(texture);
        }
    }
}
