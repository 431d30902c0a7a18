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

use super::{PostprocessRenderer, ShadowMapRenderer, SkeletalMeshRenderer, VolumeRenderer};
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::material::MaterialShading;
use crate::scene::{Camera, GameSceneRenderData, RenderInfo, RenderPassKind, Renderable};
use crate::shader::Shader;
use crate::toolbox::{
    DeferredShadingToolbox, FinalRenderTargetToolbox, ForwardShadingToolbox,
    MainFramebufferToolbox, RenderToolboxCollection, ShadowMappingToolbox, SsaoToolbox,
    SSAO_NOISE_SIZE,
};
use umbra_core::math::{LinearRgba, Mat4, Rect, Vec2};
use umbra_core::renderer::{
    BlendState, ClearRequest, CompareFunction, CullMode, RasterState, UniformValue,
    VideoSettings, MAIN_BRIGHT_COLOR, MAIN_HDR_COLOR, UNIT_GBUFFER_NORMAL,
    UNIT_GBUFFER_POSITION, UNIT_SHADOW_CUBEMAPS, UNIT_SHADOW_MAPS, UNIT_SOURCE_AUX,
};

const SSAO_RADIUS: f32 = 0.5;
const SSAO_BIAS: f32 = 0.025;

/// Where a frame ends up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderTarget {
    /// `None` for the default framebuffer.
    pub framebuffer: Option<FramebufferHandle>,
    /// Sub-rectangle to draw into; the whole framebuffer when `None`.
    pub viewport: Option<Rect>,
}

impl RenderTarget {
    /// The whole of `framebuffer`.
    pub fn framebuffer(framebuffer: FramebufferHandle) -> Self {
        Self {
            framebuffer: Some(framebuffer),
            viewport: None,
        }
    }
}

/// Knobs of one [`SceneRenderer::full_render`] call.
#[derive(Debug, Clone, Copy)]
pub struct FullRenderOptions<'a> {
    /// Run bloom, tone mapping and anti-aliasing. When off, the HDR colour is
    /// copied to the target as is.
    pub postprocess: bool,
    /// Refresh stale shadow maps with the collection's shadow toolbox first.
    pub render_shadow_maps: bool,
    /// Shadow maps to sample instead of the collection's own.
    pub shadow_maps: Option<&'a ShadowMappingToolbox>,
    /// Add the image-based lighting of baked probes.
    pub use_light_probes: bool,
    /// The output.
    pub target: RenderTarget,
    /// Viewpoint replacing the scene camera.
    pub camera: Option<Camera>,
    /// Skip the deferred path even when lights are present.
    pub force_forward: bool,
}

impl Default for FullRenderOptions<'_> {
    fn default() -> Self {
        Self {
            postprocess: true,
            render_shadow_maps: true,
            shadow_maps: None,
            use_light_probes: true,
            target: RenderTarget::default(),
            camera: None,
            force_forward: false,
        }
    }
}

/// The program family a renderable is drawn with in the forward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardProgram {
    Lit,
    Unlit,
    /// The renderable's own shader.
    Own,
}

impl ForwardProgram {
    /// `None` for renderables the deferred path already drew.
    fn of(shading: &MaterialShading, forced_forward: bool, lit: bool) -> Option<Self> {
        match shading {
            MaterialShading::Lit if !forced_forward => None,
            MaterialShading::Lit if lit => Some(Self::Lit),
            MaterialShading::Lit | MaterialShading::Unlit => Some(Self::Unlit),
            MaterialShading::Custom(_) => Some(Self::Own),
        }
    }

    /// The shader to hand to the renderable: `Some(None)` lets it use its
    /// own, `None` means the toolbox failed to load the program.
    fn shader(self, forward: &ForwardShadingToolbox, skinned: bool) -> Option<Option<&Shader>> {
        let shader = match (self, skinned) {
            (Self::Own, _) => return Some(None),
            (Self::Lit, false) => forward.lit.as_ref(),
            (Self::Lit, true) => forward.lit_skinned.as_ref(),
            (Self::Unlit, false) => forward.unlit.as_ref(),
            (Self::Unlit, true) => forward.unlit_skinned.as_ref(),
        };
        shader.map(Some)
    }
}

/// Orchestrates a whole frame: shadows, geometry, SSAO, lighting, forward
/// and postprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneRenderer;

impl SceneRenderer {
    /// Renders `scene` with the toolboxes of `collection` into `options.target`.
    ///
    /// The deferred path is skipped when the scene has nothing to light, the
    /// settings are `FullLit`, the scene is a UI scene or the caller forces
    /// forward rendering: the main buffer is then cleared and everything is
    /// drawn by the forward pass.
    pub fn full_render(
        ctx: &mut RenderContext,
        collection: &mut RenderToolboxCollection,
        scene: &mut GameSceneRenderData,
        options: &FullRenderOptions<'_>,
    ) {
        let settings = collection.settings().clone();
        ctx.set_toolbox_count(collection.len());
        if collection.get_tb::<MainFramebufferToolbox>().is_none() {
            log::error!("Collection {} has no main framebuffer, nothing rendered", collection.name());
            return;
        }

        if options.render_shadow_maps && settings.shadows_enabled() {
            if let Some(shadows) = collection.get_tb_mut::<ShadowMappingToolbox>() {
                ShadowMapRenderer::render(ctx, shadows, scene, &settings);
            }
        }
        if let Err(err) = scene.upload_lights(ctx) {
            log::error!("Failed to upload the lights of scene {}: {err}", scene.name());
        }

        Self::render_frame(ctx, collection, scene, options, &settings);

        if options.postprocess {
            PostprocessRenderer::postprocess(ctx, collection, &options.target);
        } else {
            Self::present_hdr(ctx, collection, &options.target);
        }
    }

    /// Stages one to four, all writing the main framebuffer.
    fn render_frame(
        ctx: &mut RenderContext,
        collection: &RenderToolboxCollection,
        scene: &GameSceneRenderData,
        options: &FullRenderOptions<'_>,
        settings: &VideoSettings,
    ) {
        let Some(main) = collection.get_tb::<MainFramebufferToolbox>() else {
            return;
        };
        let camera = options.camera.unwrap_or(scene.camera);
        let shadows = options.shadow_maps.or_else(|| {
            collection
                .get_tb::<ShadowMappingToolbox>()
                .filter(|_| settings.shadows_enabled())
        });
        let probe_textures = scene
            .probe_textures()
            .copied()
            .filter(|_| options.use_light_probes && scene.probes().any(|(_, p)| p.probe.is_baked()));

        let nothing_to_light = scene.light_count() == 0 && probe_textures.is_none();
        let deferred = collection.get_tb::<DeferredShadingToolbox>();
        let forced_forward = options.force_forward || !settings.needs_lighting() || nothing_to_light || scene.is_ui;
        let deferred = match deferred {
            Some(deferred) if !forced_forward => Some(deferred),
            None if !forced_forward => {
                log::error!("Lighting is on but the deferred toolbox is missing, rendering forward");
                None
            }
            _ => None,
        };

        if let Some(deferred) = deferred {
            Self::geometry_pass(ctx, deferred, scene, &camera, settings);
            let ssao = collection
                .get_tb::<SsaoToolbox>()
                .filter(|_| settings.ssao_enabled())
                .and_then(|ssao| Self::ssao_pass(ctx, ssao, deferred, &camera, settings));

            let mut scope = ctx.pass("lighting");
            scope.bind_framebuffer(Some(main.framebuffer));
            Self::clear_main(&mut scope, scene.clear_color, false);
            VolumeRenderer::volumes(&mut scope, deferred, scene, &camera, shadows, ssao);
            if let Some(textures) = probe_textures.as_ref() {
                VolumeRenderer::probe_volumes(&mut scope, deferred, scene, &camera, textures, ssao);
            }
        }

        let Some(forward) = collection.get_tb::<ForwardShadingToolbox>() else {
            log::error!("Collection {} has no forward toolbox, skipping the forward pass", collection.name());
            return;
        };
        let mut scope = ctx.pass("forward");
        scope.bind_framebuffer(Some(main.framebuffer));
        if deferred.is_none() {
            Self::clear_main(&mut scope, scene.clear_color, true);
        }
        if scene.is_ui {
            Self::raw_ui_render(&mut scope, forward, scene, &camera, settings);
        } else {
            let lit = deferred.is_none() && settings.needs_lighting() && scene.light_count() > 0;
            Self::forward_pass(&mut scope, forward, scene, &camera, settings, deferred.is_none(), lit, shadows);
        }
    }

    /// Clears the bright buffer to black and the HDR buffer to `color`,
    /// leaving both as draw buffers.
    fn clear_main(ctx: &mut RenderContext, color: LinearRgba, with_depth: bool) {
        ctx.set_draw_buffers(&[MAIN_BRIGHT_COLOR]);
        ctx.clear(&ClearRequest::color(LinearRgba::BLACK));
        ctx.set_draw_buffers(&[MAIN_HDR_COLOR]);
        let request = if with_depth { ClearRequest::all(color) } else { ClearRequest::color(color) };
        ctx.clear(&request);
        ctx.set_draw_buffers(&[MAIN_HDR_COLOR, MAIN_BRIGHT_COLOR]);
    }

    fn geometry_pass(
        ctx: &mut RenderContext,
        deferred: &DeferredShadingToolbox,
        scene: &GameSceneRenderData,
        camera: &Camera,
        settings: &VideoSettings,
    ) {
        let mut scope = ctx.pass("geometry");
        scope.bind_framebuffer(Some(deferred.gbuffer));
        scope.apply_state(RasterState::default());
        scope.clear(&ClearRequest::all(LinearRgba::TRANSPARENT));
        // Parallax mapping needs the eye.
        for shader in [deferred.geometry.as_ref(), deferred.geometry_skinned.as_ref()].into_iter().flatten() {
            shader.bind(&mut scope);
            scope.set_uniform("viewPos", UniformValue::Vec3(camera.position));
        }
        let info = RenderInfo {
            pass: RenderPassKind::Geometry,
            camera,
            settings,
        };
        let lit = |r: &dyn Renderable| r.shading().is_lit();
        if let Some(shader) = deferred.geometry.as_ref() {
            for renderable in scene.renderables().filter(|r| lit(*r) && r.skinning().is_none()) {
                renderable.render(&mut scope, &info, Some(shader));
            }
        }
        if let Some(shader) = deferred.geometry_skinned.as_ref() {
            SkeletalMeshRenderer::render(&mut scope, scene, &info, Some(shader), lit);
        }
    }

    /// Occlusion from the G-buffer, then blurred. Returns the blurred texture.
    fn ssao_pass(
        ctx: &mut RenderContext,
        ssao: &SsaoToolbox,
        deferred: &DeferredShadingToolbox,
        camera: &Camera,
        settings: &VideoSettings,
    ) -> Option<TextureHandle> {
        let (Some(shader), Some(blur)) = (ssao.ssao.as_ref(), ssao.blur_shader.as_ref()) else {
            log::error!("SSAO shaders are missing, skipping ambient occlusion");
            return None;
        };
        let mut scope = ctx.pass("ssao");
        scope.bind_framebuffer(Some(ssao.framebuffer));
        scope.apply_state(RasterState::fullscreen());
        scope.clear(&ClearRequest::color(LinearRgba::WHITE));
        shader.bind(&mut scope);
        scope.bind_texture(UNIT_GBUFFER_POSITION, Some(deferred.position));
        scope.bind_texture(UNIT_GBUFFER_NORMAL, Some(deferred.normal));
        scope.bind_texture(UNIT_SOURCE_AUX, Some(ssao.noise));
        scope.set_uniform("samples", UniformValue::Vec3Array(&ssao.kernel));
        scope.set_uniform("view", UniformValue::Mat4(camera.view));
        scope.set_uniform("projection", UniformValue::Mat4(camera.projection));
        let size = deferred.size;
        let noise_scale = Vec2::new(size.width as f32, size.height as f32) / SSAO_NOISE_SIZE as f32;
        scope.set_uniform("noiseScale", UniformValue::Vec2(noise_scale));
        scope.set_uniform("radius", UniformValue::Float(SSAO_RADIUS));
        scope.set_uniform("bias", UniformValue::Float(SSAO_BIAS));
        scope.draw_fullscreen_quad();

        let blurred = PostprocessRenderer::gaussian_blur(&mut scope, blur, &ssao.blur, ssao.occlusion, settings.ssao_blur_passes);
        Some(blurred)
    }

    #[allow(clippy::too_many_arguments)]
    fn forward_pass(
        ctx: &mut RenderContext,
        forward: &ForwardShadingToolbox,
        scene: &GameSceneRenderData,
        camera: &Camera,
        settings: &VideoSettings,
        forced_forward: bool,
        lit: bool,
        shadows: Option<&ShadowMappingToolbox>,
    ) {
        ctx.apply_state(RasterState {
            depth_test: Some(CompareFunction::Less),
            depth_write: true,
            cull: CullMode::None,
            ..RasterState::default()
        });
        let info = RenderInfo {
            pass: RenderPassKind::Forward,
            camera,
            settings,
        };
        if lit {
            ctx.bind_texture(UNIT_SHADOW_MAPS, shadows.map(|s| s.maps));
            ctx.bind_texture(UNIT_SHADOW_CUBEMAPS, shadows.map(|s| s.cubemaps));
            for shader in [forward.lit.as_ref(), forward.lit_skinned.as_ref()].into_iter().flatten() {
                shader.bind(ctx);
                ctx.set_uniform("viewPos", UniformValue::Vec3(camera.position));
                ctx.set_uniform("shadowsEnabled", UniformValue::Bool(shadows.is_some()));
            }
        }

        for renderable in scene.renderables().filter(|r| r.skinning().is_none()) {
            let Some(program) = ForwardProgram::of(renderable.shading(), forced_forward, lit) else {
                continue;
            };
            match program.shader(forward, false) {
                Some(shader) => renderable.render(ctx, &info, shader),
                None => log::error!("No forward {program:?} program, skipping a renderable"),
            }
        }
        for program in [ForwardProgram::Lit, ForwardProgram::Unlit, ForwardProgram::Own] {
            let Some(shader) = program.shader(forward, true) else {
                continue;
            };
            SkeletalMeshRenderer::render(ctx, scene, &info, shader, |r| {
                ForwardProgram::of(r.shading(), forced_forward, lit) == Some(program)
            });
        }

        if !scene.debug_lines.is_empty() {
            if let Some(shader) = forward.debug_lines.as_ref() {
                shader.bind(ctx);
                shader.bind_matrices(ctx, &Mat4::IDENTITY, camera);
                ctx.draw_lines(&scene.debug_lines);
            }
        }
    }

    /// Draws a UI scene with alpha blending, elements sorted from the deepest
    /// to the nearest, each one with the view moved by the offsets of all
    /// elements drawn before it plus its own.
    ///
    /// The depth test stays on with `LessEqual`: the sort decides blending
    /// order, the accumulated offsets decide what ends up on top.
    fn raw_ui_render(
        ctx: &mut RenderContext,
        forward: &ForwardShadingToolbox,
        scene: &GameSceneRenderData,
        camera: &Camera,
        settings: &VideoSettings,
    ) {
        ctx.apply_state(RasterState {
            depth_test: Some(CompareFunction::LessEqual),
            depth_write: true,
            blend: Some(BlendState::ALPHA_BLENDING),
            cull: CullMode::None,
            ..RasterState::default()
        });
        let mut elements: Vec<&dyn Renderable> = scene.renderables().collect();
        elements.sort_by(|a, b| {
            let depth = |r: &&dyn Renderable| r.ui_placement().map_or(0.0, |p| p.depth);
            depth(b).total_cmp(&depth(a))
        });
        let mut view = *camera;
        for element in elements {
            if let Some(placement) = element.ui_placement() {
                view = view.translated(placement.offset);
            }
            let info = RenderInfo {
                pass: RenderPassKind::Ui,
                camera: &view,
                settings,
            };
            let shader = match element.shading() {
                MaterialShading::Custom(_) => None,
                _ => match forward.unlit.as_ref() {
                    Some(shader) => Some(shader),
                    None => continue,
                },
            };
            element.render(ctx, &info, shader);
        }
    }

    /// Copies the HDR colour to the target without postprocessing.
    fn present_hdr(ctx: &mut RenderContext, collection: &RenderToolboxCollection, target: &RenderTarget) {
        let (Some(main), Some(final_tb)) = (
            collection.get_tb::<MainFramebufferToolbox>(),
            collection.get_tb::<FinalRenderTargetToolbox>(),
        ) else {
            return;
        };
        match final_tb.copy.as_ref() {
            Some(copy) => PostprocessRenderer::render_fullscreen(ctx, copy, main.hdr, target),
            None => log::error!("No copy shader, the HDR frame is not presented"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_run_the_whole_frame() {
        let options = FullRenderOptions::default();
        assert!(options.postprocess && options.render_shadow_maps && options.use_light_probes);
        assert!(!options.force_forward);
        assert_eq!(options.target, RenderTarget::default());
        assert!(options.target.framebuffer.is_none());
    }
}
