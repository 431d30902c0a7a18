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

use super::SkeletalMeshRenderer;
use crate::context::RenderContext;
use crate::scene::{Camera, GameSceneRenderData, LightKey, RenderInfo, RenderPassKind};
use crate::shader::Shader;
use crate::toolbox::ShadowMappingToolbox;
use umbra_core::math::{cube_face_projection, cube_face_view, Mat4};
use umbra_core::renderer::light::SHADOW_NEAR_PLANE;
use umbra_core::renderer::{
    AttachmentLayer, AttachmentPoint, ClearRequest, ColorWrites, CompareFunction, CullMode,
    LightType, RasterState, UniformValue, VideoSettings,
};

/// Renders the shadow atlas.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadowMapRenderer;

impl ShadowMapRenderer {
    /// Re-renders the shadow map of every shadow-casting light that `shadows`
    /// does not hold up to date, or of every one when `settings` force
    /// dynamic shadows.
    ///
    /// Point lights render six cube faces of linear depth, other lights one
    /// layer of projective depth. Each rendered map is recorded in `shadows`,
    /// so another atlas rendering the same scene keeps its own cache.
    /// Returns the number of passes rendered.
    pub fn render(
        ctx: &mut RenderContext,
        shadows: &mut ShadowMappingToolbox,
        scene: &GameSceneRenderData,
        settings: &VideoSettings,
    ) -> u32 {
        let dynamic = settings.forces_dynamic_shadows();
        let stale: Vec<LightKey> = scene
            .lights()
            .filter(|(_, light)| light.casts_shadows() && light.shadow_slot().is_some())
            .map(|(key, _)| key)
            .filter(|key| dynamic || !shadows.holds(scene, *key))
            .collect();
        if stale.is_empty() {
            return 0;
        }

        let mut passes = 0;
        let mut scope = ctx.pass("shadow_maps");
        for key in stale {
            let Some(light) = scene.light(key).cloned() else {
                continue;
            };
            let Some(slot) = light.shadow_slot() else {
                continue;
            };
            let state = RasterState {
                depth_test: Some(CompareFunction::Less),
                depth_write: true,
                stencil: None,
                blend: None,
                cull: if light.should_cull_fronts_for_shadow_map() {
                    CullMode::Front
                } else {
                    CullMode::Back
                },
                color_writes: ColorWrites::empty(),
            };
            let rendered = match light.light_type() {
                LightType::Point => {
                    let far = light.shadow_far_plane();
                    let projection = cube_face_projection(SHADOW_NEAR_PLANE, far);
                    let mut faces = 0;
                    for face in 0..6u32 {
                        let view = cube_face_view(light.position(), face as usize);
                        let camera = Camera::from_matrices(view, projection, light.position(), SHADOW_NEAR_PLANE, far);
                        let layer = AttachmentLayer::Layer(slot * 6 + face);
                        if !Self::begin_layer(&mut scope, shadows, true, layer, state) {
                            break;
                        }
                        let shaders = (shadows.linear_depth.as_ref(), shadows.linear_depth_skinned.as_ref());
                        if let Some(shader) = shaders.0 {
                            shader.bind(&mut scope);
                            scope.set_uniform("lightPosition", UniformValue::Vec3(light.position()));
                            scope.set_uniform("farPlane", UniformValue::Float(far));
                        }
                        if let Some(shader) = shaders.1 {
                            shader.bind(&mut scope);
                            scope.set_uniform("lightPosition", UniformValue::Vec3(light.position()));
                            scope.set_uniform("farPlane", UniformValue::Float(far));
                        }
                        Self::render_casters(&mut scope, scene, settings, &camera, RenderPassKind::ShadowLinearDepth, shaders);
                        faces += 1;
                    }
                    faces
                }
                LightType::Directional | LightType::Spot => {
                    let camera = Camera::from_matrices(
                        Mat4::IDENTITY,
                        light.light_space_matrix(),
                        light.position(),
                        SHADOW_NEAR_PLANE,
                        light.shadow_far_plane(),
                    );
                    let layer = AttachmentLayer::Layer(slot);
                    if Self::begin_layer(&mut scope, shadows, false, layer, state) {
                        let shaders = (shadows.depth.as_ref(), shadows.depth_skinned.as_ref());
                        Self::render_casters(&mut scope, scene, settings, &camera, RenderPassKind::ShadowDepth, shaders);
                        1
                    } else {
                        0
                    }
                }
            };
            for _ in 0..rendered {
                scope.count_shadow_pass();
            }
            passes += rendered;
            if rendered > 0 {
                shadows.mark_rendered(scene, key);
            }
        }
        passes
    }

    fn begin_layer(
        ctx: &mut RenderContext,
        shadows: &ShadowMappingToolbox,
        cube: bool,
        layer: AttachmentLayer,
        state: RasterState,
    ) -> bool {
        let texture = if cube { shadows.cubemaps } else { shadows.maps };
        if let Err(err) = ctx.attach(shadows.framebuffer, AttachmentPoint::Depth, texture, 0, layer) {
            log::error!("Failed to attach shadow map layer {layer:?}: {err}");
            return false;
        }
        ctx.bind_framebuffer(Some(shadows.framebuffer));
        ctx.apply_state(state);
        ctx.clear(&ClearRequest::depth());
        true
    }

    fn render_casters(
        ctx: &mut RenderContext,
        scene: &GameSceneRenderData,
        settings: &VideoSettings,
        camera: &Camera,
        pass: RenderPassKind,
        (shader, skinned): (Option<&Shader>, Option<&Shader>),
    ) {
        let info = RenderInfo {
            pass,
            camera,
            settings,
        };
        match shader {
            Some(shader) => {
                for renderable in scene.renderables() {
                    if renderable.casts_shadows() && renderable.skinning().is_none() {
                        renderable.render(ctx, &info, Some(shader));
                    }
                }
            }
            None => log::error!("No {pass:?} shader, skipping static shadow casters"),
        }
        if skinned.is_some() {
            SkeletalMeshRenderer::render(ctx, scene, &info, skinned, |r| r.casts_shadows());
        }
    }
}
