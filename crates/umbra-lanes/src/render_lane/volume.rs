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

use crate::context::{RenderContext, TextureHandle};
use crate::primitives::GpuMesh;
use crate::scene::{Camera, GameSceneRenderData, ProbeTextures};
use crate::shader::Shader;
use crate::toolbox::{DeferredShadingToolbox, ShadowMappingToolbox};
use umbra_core::math::{Mat4, Quat, Vec2, Vec3};
use umbra_core::renderer::{
    BlendState, ClearRequest, ColorWrites, CompareFunction, CullMode, LightType, ProbeKind,
    RasterState, StencilOperation, StencilState, UniformValue, UNIT_BRDF_LUT,
    UNIT_GBUFFER_ALBEDO_SPEC, UNIT_IRRADIANCE, UNIT_PREFILTER, UNIT_SHADOW_CUBEMAPS,
    UNIT_SHADOW_MAPS, UNIT_SSAO,
};

/// Deferred lighting through stencil-marked light volumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeRenderer;

/// Marks, for the bound depth buffer, the pixels whose geometry lies in
/// front of the volume's back faces.
fn mark_state() -> RasterState {
    RasterState {
        depth_test: Some(CompareFunction::LessEqual),
        depth_write: false,
        stencil: Some(StencilState {
            compare: CompareFunction::Always,
            reference: 0,
            read_mask: 0xFF,
            write_mask: 0xFF,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Invert,
            pass_op: StencilOperation::Keep,
        }),
        blend: None,
        cull: CullMode::Front,
        color_writes: ColorWrites::empty(),
    }
}

/// Shades the marked pixels, adding to what previous lights wrote.
fn shade_state(camera_inside: bool) -> RasterState {
    RasterState {
        depth_test: Some(CompareFunction::Always),
        depth_write: false,
        stencil: Some(StencilState::test_only(CompareFunction::Equal, 0xFF)),
        blend: Some(BlendState::ADDITIVE),
        cull: if camera_inside { CullMode::Front } else { CullMode::Back },
        color_writes: ColorWrites::ALL,
    }
}

fn fullscreen_additive() -> RasterState {
    RasterState {
        blend: Some(BlendState::ADDITIVE),
        ..RasterState::fullscreen()
    }
}

impl VolumeRenderer {
    /// Shades every light of `scene` into the bound HDR framebuffer.
    ///
    /// Point and spot lights go through their volume: a stencil clear, a
    /// mark pass and a shade pass. Directional lights shade a full-screen
    /// quad. Returns the number of lights shaded.
    pub fn volumes(
        ctx: &mut RenderContext,
        deferred: &DeferredShadingToolbox,
        scene: &GameSceneRenderData,
        camera: &Camera,
        shadows: Option<&ShadowMappingToolbox>,
        ssao: Option<TextureHandle>,
    ) -> u32 {
        let (Some(shader), Some(mark)) = (deferred.light_volume.as_ref(), deferred.stencil_mark.as_ref()) else {
            log::error!("Deferred toolbox has no light volume shaders, skipping the lights");
            return 0;
        };
        let mut scope = ctx.scope();
        Self::bind_gbuffer(&mut scope, deferred, ssao);
        scope.bind_texture(UNIT_SHADOW_MAPS, shadows.map(|s| s.maps));
        scope.bind_texture(UNIT_SHADOW_CUBEMAPS, shadows.map(|s| s.cubemaps));
        shader.bind(&mut scope);
        Self::bind_view(&mut scope, camera, deferred);
        scope.set_uniform("shadowsEnabled", UniformValue::Bool(shadows.is_some()));
        scope.set_uniform("ssaoEnabled", UniformValue::Bool(ssao.is_some()));

        let primitives = *scope.primitives();
        let mut shaded = 0;
        for (index, (_, light)) in scene.lights().enumerate() {
            let mesh = match light.light_type() {
                LightType::Directional => None,
                LightType::Point => Some(primitives.sphere),
                LightType::Spot => Some(primitives.cone),
            };
            let inside = light.volume_contains(camera.position, camera.near * 2.0);
            Self::shade(&mut scope, shader, mark, camera, mesh, light.volume_transform(), inside, |ctx| {
                ctx.set_uniform("lightIndex", UniformValue::Int(index as i32));
            });
            scope.count_light_volume();
            shaded += 1;
        }
        shaded
    }

    /// Adds the image-based lighting of every baked probe. Global probes
    /// cover the screen, local probes go through a sphere volume.
    pub fn probe_volumes(
        ctx: &mut RenderContext,
        deferred: &DeferredShadingToolbox,
        scene: &GameSceneRenderData,
        camera: &Camera,
        textures: &ProbeTextures,
        ssao: Option<TextureHandle>,
    ) -> u32 {
        let (Some(shader), Some(mark)) = (deferred.ibl_probe.as_ref(), deferred.stencil_mark.as_ref()) else {
            log::error!("Deferred toolbox has no probe shader, skipping the light probes");
            return 0;
        };
        let mut scope = ctx.scope();
        Self::bind_gbuffer(&mut scope, deferred, ssao);
        scope.bind_texture(UNIT_IRRADIANCE, Some(textures.irradiance));
        scope.bind_texture(UNIT_PREFILTER, Some(textures.prefilter));
        scope.bind_texture(UNIT_BRDF_LUT, Some(textures.brdf_lut));
        shader.bind(&mut scope);
        Self::bind_view(&mut scope, camera, deferred);
        scope.set_uniform("ssaoEnabled", UniformValue::Bool(ssao.is_some()));

        let sphere = scope.primitives().sphere;
        let mut shaded = 0;
        for (_, entry) in scene.probes() {
            let probe = &entry.probe;
            let (Some(slot), true) = (probe.slot(), probe.is_baked()) else {
                continue;
            };
            let (mesh, transform) = match probe.kind {
                ProbeKind::Global => (None, Mat4::IDENTITY),
                ProbeKind::Local { radius } => (
                    Some(sphere),
                    Mat4::from_scale_rotation_translation(Vec3::splat(radius), Quat::IDENTITY, probe.position),
                ),
            };
            let inside = probe.position.distance(camera.position) <= probe.radius() + camera.near * 2.0;
            Self::shade(&mut scope, shader, mark, camera, mesh, &transform, inside, |ctx| {
                ctx.set_uniform("probeIndex", UniformValue::Int(slot as i32));
                ctx.set_uniform("probePosition", UniformValue::Vec3(probe.position));
                ctx.set_uniform("probeRadius", UniformValue::Float(probe.radius()));
            });
            shaded += 1;
        }
        shaded
    }

    fn bind_gbuffer(ctx: &mut RenderContext, deferred: &DeferredShadingToolbox, ssao: Option<TextureHandle>) {
        for (unit, texture) in (0u32..).zip(deferred.gbuffer_textures()) {
            ctx.bind_texture(UNIT_GBUFFER_ALBEDO_SPEC + unit, Some(texture));
        }
        ctx.bind_texture(UNIT_SSAO, ssao);
    }

    fn bind_view(ctx: &mut RenderContext, camera: &Camera, deferred: &DeferredShadingToolbox) {
        ctx.set_uniform("viewPos", UniformValue::Vec3(camera.position));
        let size = deferred.size;
        ctx.set_uniform(
            "screenSize",
            UniformValue::Vec2(Vec2::new(size.width as f32, size.height as f32)),
        );
    }

    /// Runs the stencil mark and shade passes of one volume, or a plain
    /// full-screen pass when `mesh` is `None`. State is restored on return.
    #[allow(clippy::too_many_arguments)]
    fn shade(
        ctx: &mut RenderContext,
        shader: &Shader,
        mark: &Shader,
        camera: &Camera,
        mesh: Option<GpuMesh>,
        transform: &Mat4,
        camera_inside: bool,
        uniforms: impl Fn(&mut RenderContext),
    ) {
        let mut scope = ctx.scope();
        let Some(mesh) = mesh else {
            scope.apply_state(fullscreen_additive());
            shader.bind(&mut scope);
            uniforms(&mut *scope);
            shader.bind_matrices(&mut scope, &Mat4::IDENTITY, &Camera::identity());
            scope.draw_fullscreen_quad();
            return;
        };

        scope.clear(&ClearRequest::stencil(0));
        scope.apply_state(mark_state());
        mark.bind(&mut scope);
        mark.bind_matrices(&mut scope, transform, camera);
        scope.draw_mesh(mesh);

        scope.apply_state(shade_state(camera_inside));
        shader.bind(&mut scope);
        uniforms(&mut *scope);
        shader.bind_matrices(&mut scope, transform, camera);
        scope.draw_mesh(mesh);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_pass_inverts_on_depth_fail_only() {
        let state = mark_state();
        let stencil = state.stencil.unwrap();
        assert_eq!(stencil.compare, CompareFunction::Always);
        assert_eq!(
            (stencil.fail_op, stencil.depth_fail_op, stencil.pass_op),
            (StencilOperation::Keep, StencilOperation::Invert, StencilOperation::Keep)
        );
        assert_eq!(state.cull, CullMode::Front);
        assert!(!state.depth_write);
        assert!(state.color_writes.is_empty());
    }

    #[test]
    fn shade_pass_flips_culling_inside_the_volume() {
        assert_eq!(shade_state(false).cull, CullMode::Back);
        assert_eq!(shade_state(true).cull, CullMode::Front);
        let stencil = shade_state(false).stencil.unwrap();
        assert!(stencil.passes(0xFF));
        assert!(!stencil.passes(0));
    }
}
