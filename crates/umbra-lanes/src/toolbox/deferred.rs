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

use super::forward::material_shader;
use super::{release_shader, MainFramebufferToolbox, SetupGuard};
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::error::ToolboxError;
use crate::shader::{ExpectedMatrices, Shader, ShaderDescriptor};
use umbra_core::math::Extent2D;
use umbra_core::renderer::{
    AttachmentLayer, AttachmentPoint, TextureFormat, GBUFFER_VELOCITY, UNIT_BRDF_LUT,
    UNIT_GBUFFER_ALBEDO_SPEC, UNIT_GBUFFER_NORMAL, UNIT_GBUFFER_PBR, UNIT_GBUFFER_POSITION,
    UNIT_IRRADIANCE, UNIT_PREFILTER, UNIT_SHADOW_CUBEMAPS, UNIT_SHADOW_MAPS, UNIT_SSAO,
};

/// The G-buffer and the programs of the geometry and lighting passes.
///
/// Colour 0 holds albedo and specular, 1 world position (`w = 1` where
/// geometry was written), 2 world normal, 3 roughness/metallic/ao, 4 velocity
/// with temporal SMAA. Velocity and depth/stencil are the main framebuffer's
/// textures, so the lighting pass depth-tests against the G-buffer depth.
#[derive(Debug)]
pub struct DeferredShadingToolbox {
    /// The G-buffer framebuffer.
    pub gbuffer: FramebufferHandle,
    /// Albedo and specular.
    pub albedo_spec: TextureHandle,
    /// World position.
    pub position: TextureHandle,
    /// World normal.
    pub normal: TextureHandle,
    /// Roughness, metallic, ambient occlusion.
    pub pbr: TextureHandle,
    /// Size of every attachment.
    pub size: Extent2D,
    /// Geometry pass.
    pub geometry: Option<Shader>,
    /// Geometry pass, skinned.
    pub geometry_skinned: Option<Shader>,
    /// Stencil marking of light volumes.
    pub stencil_mark: Option<Shader>,
    /// Light volume shading.
    pub light_volume: Option<Shader>,
    /// Image-based lighting from a probe.
    pub ibl_probe: Option<Shader>,
}

fn gbuffer_sampled(descriptor: ShaderDescriptor) -> ShaderDescriptor {
    descriptor
        .with_sampler("gAlbedoSpec", UNIT_GBUFFER_ALBEDO_SPEC)
        .with_sampler("gPosition", UNIT_GBUFFER_POSITION)
        .with_sampler("gNormal", UNIT_GBUFFER_NORMAL)
        .with_sampler("gPbr", UNIT_GBUFFER_PBR)
        .with_sampler("ssaoMap", UNIT_SSAO)
}

impl DeferredShadingToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>, main: &MainFramebufferToolbox) -> Result<Self, ToolboxError> {
        let albedo_spec = guard.target("gbuffer_albedo_spec", TextureFormat::Rgba16F)?;
        let position = guard.target("gbuffer_position", TextureFormat::Rgba32F)?;
        let normal = guard.target("gbuffer_normal", TextureFormat::Rgba16F)?;
        let pbr = guard.target("gbuffer_pbr", TextureFormat::Rgba8)?;
        let gbuffer = guard.framebuffer_with("gbuffer", &[albedo_spec, position, normal, pbr], None)?;
        let ctx = guard.ctx();
        if let Some(velocity) = main.velocity {
            ctx.attach(
                gbuffer,
                AttachmentPoint::Color(GBUFFER_VELOCITY),
                velocity,
                0,
                AttachmentLayer::Whole,
            )?;
        }
        ctx.attach(
            gbuffer,
            AttachmentPoint::DepthStencil,
            main.depth_stencil,
            0,
            AttachmentLayer::Whole,
        )?;
        ctx.check_framebuffer(gbuffer);

        let volume = ExpectedMatrices::MVP;
        Ok(Self {
            gbuffer,
            albedo_spec,
            position,
            normal,
            pbr,
            size: guard.size(),
            geometry: guard.shader(material_shader("gbuffer", "gbuffer", false)),
            geometry_skinned: guard.shader(material_shader("gbuffer", "gbuffer_skinned", true)),
            stencil_mark: guard.shader(ShaderDescriptor::new("stencil_mark").with_matrices(volume)),
            light_volume: guard.shader(
                gbuffer_sampled(ShaderDescriptor::new("light_volume"))
                    .with_matrices(volume)
                    .with_sampler("shadowMaps", UNIT_SHADOW_MAPS)
                    .with_sampler("shadowCubemaps", UNIT_SHADOW_CUBEMAPS),
            ),
            ibl_probe: guard.shader(
                gbuffer_sampled(ShaderDescriptor::new("ibl_probe"))
                    .with_matrices(volume)
                    .with_sampler("irradianceMaps", UNIT_IRRADIANCE)
                    .with_sampler("prefilterMaps", UNIT_PREFILTER)
                    .with_sampler("brdfLut", UNIT_BRDF_LUT),
            ),
        })
    }

    /// The G-buffer textures in unit order (albedo/spec, position, normal, PBR).
    pub fn gbuffer_textures(&self) -> [TextureHandle; 4] {
        [self.albedo_spec, self.position, self.normal, self.pbr]
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        ctx.release_framebuffer(self.gbuffer);
        for texture in self.gbuffer_textures() {
            ctx.release_texture(texture);
        }
        for shader in [
            self.geometry,
            self.geometry_skinned,
            self.stencil_mark,
            self.light_volume,
            self.ibl_probe,
        ] {
            release_shader(ctx, shader);
        }
    }
}
