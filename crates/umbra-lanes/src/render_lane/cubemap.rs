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

use super::{FullRenderOptions, RenderTarget, SceneRenderer};
use crate::context::{RenderContext, TextureHandle};
use crate::scene::{Camera, GameSceneRenderData};
use crate::shader::{ExpectedMatrices, Shader, ShaderDescriptor};
use crate::toolbox::RenderToolboxCollection;
use umbra_core::math::{cube_face_projection, cube_face_view, LinearRgba, Mat4, Vec3};
use umbra_core::renderer::{
    AttachmentLayer, AttachmentPoint, ClearRequest, RasterState, ResourceError, UniformValue,
    UNIT_SOURCE,
};

const CAPTURE_NEAR: f32 = 0.1;
const CAPTURE_FAR: f32 = 100.0;

/// Programs of the image-based lighting precomputation.
#[derive(Debug)]
pub struct IblShaders {
    /// Equirectangular map to cube map.
    pub equirect: Option<Shader>,
    /// Cosine-weighted hemisphere convolution.
    pub irradiance: Option<Shader>,
    /// GGX importance-sampled prefiltering, one roughness per mip.
    pub prefilter: Option<Shader>,
    /// Split-sum BRDF integration.
    pub brdf: Option<Shader>,
}

impl IblShaders {
    /// Loads the four programs. Missing ones are logged and left `None`.
    pub fn load(ctx: &mut RenderContext) -> Self {
        let cube = |name: &str, sampler: &str| {
            ShaderDescriptor::new(name)
                .with_matrices(ExpectedMatrices::VIEW | ExpectedMatrices::PROJECTION)
                .with_sampler(sampler, UNIT_SOURCE)
        };
        Self {
            equirect: Shader::load(ctx, &cube("equirect_to_cubemap", "equirectangularMap")),
            irradiance: Shader::load(ctx, &cube("irradiance_convolution", "environmentMap")),
            prefilter: Shader::load(ctx, &cube("prefilter", "environmentMap")),
            brdf: Shader::load(ctx, &ShaderDescriptor::new("brdf_integration")),
        }
    }

    /// Destroys the programs.
    pub fn release(self, ctx: &mut RenderContext) {
        for shader in [self.equirect, self.irradiance, self.prefilter, self.brdf].into_iter().flatten() {
            shader.release(ctx);
        }
    }
}

/// Renders into cube maps: scene captures and the IBL convolutions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubemapRenderer;

/// The camera at the origin of a cube looking through `face`.
fn face_camera(position: Vec3, face: u32) -> Camera {
    Camera::from_matrices(
        cube_face_view(position, face as usize),
        cube_face_projection(CAPTURE_NEAR, CAPTURE_FAR),
        position,
        CAPTURE_NEAR,
        CAPTURE_FAR,
    )
}

impl CubemapRenderer {
    /// Renders the six 90 degree views of `scene` seen from `position` into
    /// `target`, a cube map, or the cube at index `slot` of a cube-map array.
    ///
    /// Each face goes through [`SceneRenderer::full_render`] with `options`,
    /// whose camera and target are replaced.
    pub fn render_scene_to_cubemap(
        ctx: &mut RenderContext,
        collection: &mut RenderToolboxCollection,
        scene: &mut GameSceneRenderData,
        position: Vec3,
        target: TextureHandle,
        slot: Option<u32>,
        options: &FullRenderOptions<'_>,
    ) -> Result<(), ResourceError> {
        let framebuffer = ctx.create_framebuffer("cubemap_capture")?;
        let result = (|| -> Result<(), ResourceError> {
            for face in 0..6 {
                let layer = slot.map_or(face, |slot| slot * 6 + face);
                ctx.attach(framebuffer, AttachmentPoint::Color(0), target, 0, AttachmentLayer::Layer(layer))?;
                let options = FullRenderOptions {
                    camera: Some(face_camera(position, face)),
                    target: RenderTarget::framebuffer(framebuffer),
                    ..*options
                };
                SceneRenderer::full_render(ctx, collection, scene, &options);
            }
            Ok(())
        })();
        ctx.release_framebuffer(framebuffer);
        result
    }

    /// Projects an equirectangular texture onto the faces of the cube map `target`.
    pub fn from_equirect(
        ctx: &mut RenderContext,
        shaders: &IblShaders,
        equirect: TextureHandle,
        target: TextureHandle,
    ) -> Result<(), ResourceError> {
        let Some(shader) = shaders.equirect.as_ref() else {
            log::error!("No equirectangular conversion program, environment left empty");
            return Ok(());
        };
        Self::each_face(ctx, target, 0, 0, |ctx| {
            shader.bind(ctx);
            ctx.bind_texture(UNIT_SOURCE, Some(equirect));
            shader
        })
    }

    /// Convolves `environment` into the irradiance cube at `slot` of `irradiance`.
    pub fn convolve_irradiance(
        ctx: &mut RenderContext,
        shaders: &IblShaders,
        environment: TextureHandle,
        irradiance: TextureHandle,
        slot: u32,
    ) -> Result<(), ResourceError> {
        let Some(shader) = shaders.irradiance.as_ref() else {
            log::error!("No irradiance convolution program, probe {slot} has no diffuse lighting");
            return Ok(());
        };
        Self::each_face(ctx, irradiance, 0, slot * 6, |ctx| {
            shader.bind(ctx);
            ctx.bind_texture(UNIT_SOURCE, Some(environment));
            shader
        })
    }

    /// Prefilters `environment` into every mip of the cube at `slot` of
    /// `prefilter`, roughness growing linearly from 0 at mip 0 to 1 at the last.
    pub fn prefilter(
        ctx: &mut RenderContext,
        shaders: &IblShaders,
        environment: TextureHandle,
        prefilter: TextureHandle,
        slot: u32,
    ) -> Result<(), ResourceError> {
        let Some(shader) = shaders.prefilter.as_ref() else {
            log::error!("No prefilter program, probe {slot} has no specular lighting");
            return Ok(());
        };
        let mips = ctx.texture_descriptor(prefilter).map_or(1, |d| d.mip_levels.max(1));
        for mip in 0..mips {
            let roughness = if mips > 1 { mip as f32 / (mips - 1) as f32 } else { 0.0 };
            Self::each_face(ctx, prefilter, mip, slot * 6, |ctx| {
                shader.bind(ctx);
                ctx.bind_texture(UNIT_SOURCE, Some(environment));
                ctx.set_uniform("roughness", UniformValue::Float(roughness));
                shader
            })?;
        }
        Ok(())
    }

    /// Integrates the split-sum BRDF into the 2D lookup table `lut`.
    pub fn brdf_lut(ctx: &mut RenderContext, shaders: &IblShaders, lut: TextureHandle) -> Result<(), ResourceError> {
        let Some(shader) = shaders.brdf.as_ref() else {
            log::error!("No BRDF integration program, lookup table left empty");
            return Ok(());
        };
        let framebuffer = ctx.create_framebuffer("brdf_lut")?;
        let result = ctx
            .attach(framebuffer, AttachmentPoint::Color(0), lut, 0, AttachmentLayer::Whole)
            .map(|()| {
                let mut scope = ctx.pass("brdf_lut");
                scope.bind_framebuffer(Some(framebuffer));
                scope.apply_state(RasterState::fullscreen());
                scope.clear(&ClearRequest::color(LinearRgba::TRANSPARENT));
                shader.bind(&mut scope);
                scope.draw_fullscreen_quad();
            });
        ctx.release_framebuffer(framebuffer);
        result
    }

    /// Draws the unit cube once per face of `texture` at `mip`, face `f`
    /// going to layer `first_layer + f`, with the program `prepare` binds.
    fn each_face<'s>(
        ctx: &mut RenderContext,
        texture: TextureHandle,
        mip: u32,
        first_layer: u32,
        prepare: impl Fn(&mut RenderContext) -> &'s Shader,
    ) -> Result<(), ResourceError> {
        let framebuffer = ctx.create_framebuffer("cubemap_face")?;
        let result = (|| -> Result<(), ResourceError> {
            let mut scope = ctx.pass("cubemap");
            let cube = scope.primitives().cube;
            for face in 0..6 {
                let layer = AttachmentLayer::Layer(first_layer + face);
                scope.attach(framebuffer, AttachmentPoint::Color(0), texture, mip, layer)?;
                scope.bind_framebuffer(Some(framebuffer));
                scope.apply_state(RasterState::fullscreen());
                scope.clear(&ClearRequest::color(LinearRgba::TRANSPARENT));
                let shader = prepare(&mut *scope);
                shader.bind_matrices(&mut scope, &Mat4::IDENTITY, &face_camera(Vec3::ZERO, face));
                scope.draw_mesh(cube);
            }
            Ok(())
        })();
        ctx.release_framebuffer(framebuffer);
        result
    }
}
