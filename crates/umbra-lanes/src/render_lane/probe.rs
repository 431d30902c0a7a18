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

use super::{CubemapRenderer, FullRenderOptions, IblShaders};
use crate::context::{RenderContext, TextureHandle};
use crate::error::ToolboxError;
use crate::scene::{GameSceneRenderData, ProbeKey, ProbeTextures};
use crate::toolbox::{RenderToolboxCollection, ShadowMappingToolbox};
use umbra_core::math::Vec3;
use umbra_core::renderer::{TextureDescriptor, TextureFormat, VideoSettings};

/// Bake passes that let probes see each other's light.
pub const DEFAULT_BAKE_ITERATIONS: u32 = 2;

/// Precomputes the image-based lighting of light probes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightProbeRenderer;

/// What a bake needs to know about one probe.
#[derive(Debug, Clone, Copy)]
struct BakeJob {
    key: ProbeKey,
    slot: u32,
    position: Vec3,
    environment: Option<TextureHandle>,
}

impl LightProbeRenderer {
    /// Bakes every probe of `scene` that has an array slot.
    ///
    /// Renders with a throwaway collection at maximum quality, sampling the
    /// shadow maps of `live`, so those must be up to date. The first
    /// iteration renders without probe lighting, each further one with the
    /// result of the previous. Global probes with an environment texture
    /// convert it instead of capturing the scene. Returns the number of
    /// probes baked.
    pub fn bake_all(
        ctx: &mut RenderContext,
        live: &RenderToolboxCollection,
        scene: &mut GameSceneRenderData,
        iterations: u32,
    ) -> Result<usize, ToolboxError> {
        let jobs: Vec<BakeJob> = scene
            .probes()
            .filter_map(|(key, entry)| {
                Some(BakeJob {
                    key,
                    slot: entry.probe.slot()?,
                    position: entry.probe.position,
                    environment: entry.environment.filter(|_| entry.probe.is_global()),
                })
            })
            .collect();
        if jobs.is_empty() {
            return Ok(0);
        }

        let settings = live.settings().for_probe_baking();
        let mut collection = RenderToolboxCollection::new("probe_baking", settings.clone());
        let shaders = IblShaders::load(ctx);
        let result = Self::bake(ctx, &mut collection, live, scene, &settings, &shaders, &jobs, iterations.max(1));
        shaders.release(ctx);
        collection.dispose(ctx);
        if result.is_ok() {
            log::info!(
                "Baked {} light probes of scene '{}' in {} iterations",
                jobs.len(),
                scene.name(),
                iterations.max(1)
            );
        }
        result.map(|()| jobs.len())
    }

    #[allow(clippy::too_many_arguments)]
    fn bake(
        ctx: &mut RenderContext,
        collection: &mut RenderToolboxCollection,
        live: &RenderToolboxCollection,
        scene: &mut GameSceneRenderData,
        settings: &VideoSettings,
        shaders: &IblShaders,
        jobs: &[BakeJob],
        iterations: u32,
    ) -> Result<(), ToolboxError> {
        collection.add_tbs_required_by_settings(ctx)?;
        let textures = scene.ensure_probe_textures(ctx, settings)?;
        if !textures.brdf_ready {
            CubemapRenderer::brdf_lut(ctx, shaders, textures.brdf_lut)?;
            scene.mark_brdf_ready();
        }

        let capture = ctx.create_texture(
            &TextureDescriptor::cube("probe_capture", settings.probe_resolution.max(1), TextureFormat::Rgba16F)
                .with_full_mips(),
        )?;
        let mut result = Ok(());
        'bake: for iteration in 0..iterations {
            let options = FullRenderOptions {
                postprocess: false,
                render_shadow_maps: false,
                shadow_maps: live.get_tb::<ShadowMappingToolbox>(),
                use_light_probes: iteration > 0,
                ..Default::default()
            };
            for job in jobs {
                if let Err(err) = Self::bake_one(ctx, collection, scene, shaders, &textures, capture, job, &options) {
                    result = Err(err.into());
                    break 'bake;
                }
            }
            log::debug!("Light probe bake iteration {} of {iterations} done", iteration + 1);
        }
        ctx.release_texture(capture);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn bake_one(
        ctx: &mut RenderContext,
        collection: &mut RenderToolboxCollection,
        scene: &mut GameSceneRenderData,
        shaders: &IblShaders,
        textures: &ProbeTextures,
        capture: TextureHandle,
        job: &BakeJob,
        options: &FullRenderOptions<'_>,
    ) -> Result<(), umbra_core::renderer::ResourceError> {
        match job.environment {
            Some(environment) => CubemapRenderer::from_equirect(ctx, shaders, environment, capture)?,
            None => CubemapRenderer::render_scene_to_cubemap(ctx, collection, scene, job.position, capture, None, options)?,
        }
        ctx.generate_mipmaps(capture)?;
        CubemapRenderer::convolve_irradiance(ctx, shaders, capture, textures.irradiance, job.slot)?;
        CubemapRenderer::prefilter(ctx, shaders, capture, textures.prefilter, job.slot)?;
        if let Some(entry) = scene.probe_mut(job.key) {
            entry.probe.set_baked(true);
        }
        Ok(())
    }
}
