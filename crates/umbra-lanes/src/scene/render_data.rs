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

use super::{Camera, Renderable, ShadowSlotAllocator, SkeletonBatch};
use crate::context::{RenderContext, TextureHandle};
use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicU64, Ordering};
use umbra_core::math::{Extent2D, LinearRgba};
use umbra_core::renderer::{
    full_mip_count, BufferId, FilterMode, LightComponent, LightProbe, LightType, LightUniform,
    LineVertex, ResourceError, TextureDescriptor, TextureFormat, VideoSettings, BINDING_LIGHTS,
    LIGHTS_BLOCK_HEADER,
};

/// Edge length of an irradiance cube face.
pub const IRRADIANCE_SIZE: u32 = 32;
/// Mip levels of the prefiltered environment, one per roughness step.
pub const PREFILTER_MIPS: u32 = 5;
/// Edge length of the BRDF lookup table.
pub const BRDF_LUT_SIZE: u32 = 128;

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

new_key_type! {
    /// A renderable of a [`GameSceneRenderData`].
    pub struct RenderableKey;
    /// A light of a [`GameSceneRenderData`].
    pub struct LightKey;
    /// A light probe of a [`GameSceneRenderData`].
    pub struct ProbeKey;
    /// A skeleton batch of a [`GameSceneRenderData`].
    pub struct SkeletonKey;
}

/// A probe and, for global probes, the environment it converts instead of
/// capturing the scene.
#[derive(Debug, Clone)]
pub struct ProbeEntry {
    /// The probe.
    pub probe: LightProbe,
    /// Equirectangular HDR environment, retained by the scene.
    pub environment: Option<TextureHandle>,
}

/// Image-based lighting textures shared by every probe of a scene, indexed by probe slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTextures {
    /// Diffuse irradiance cube array.
    pub irradiance: TextureHandle,
    /// Prefiltered specular cube array, one mip per roughness step.
    pub prefilter: TextureHandle,
    /// Split-sum BRDF table.
    pub brdf_lut: TextureHandle,
    /// Whether the BRDF table has been generated.
    pub brdf_ready: bool,
    /// Slots available.
    pub capacity: u32,
}

/// The render-side state of one scene.
///
/// Lights are uploaded into one uniform buffer in iteration order; a light's
/// index in [`GameSceneRenderData::lights`] is its index in the block. Must be
/// [`dispose`](GameSceneRenderData::dispose)d with the context that created
/// its resources.
#[derive(Debug)]
pub struct GameSceneRenderData {
    id: u64,
    name: String,
    renderables: SlotMap<RenderableKey, Box<dyn Renderable>>,
    lights: SlotMap<LightKey, LightComponent>,
    probes: SlotMap<ProbeKey, ProbeEntry>,
    skeletons: SlotMap<SkeletonKey, SkeletonBatch>,
    /// Physics debug geometry, drawn in the forward pass.
    pub debug_lines: Vec<LineVertex>,
    lights_ubo: Option<(BufferId, usize)>,
    lights_layout_changed: bool,
    probe_textures: Option<ProbeTextures>,
    probe_capacity: u32,
    shadow_slots: ShadowSlotAllocator,
    /// The viewpoint.
    pub camera: Camera,
    /// UI scenes render forward only, back to front.
    pub is_ui: bool,
    /// Background colour of the HDR buffer.
    pub clear_color: LinearRgba,
}

impl GameSceneRenderData {
    /// An empty scene whose slot capacities follow `settings`.
    pub fn new(name: &str, settings: &VideoSettings) -> Self {
        let (maps, cubes) = Self::shadow_capacity(settings);
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            renderables: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            probes: SlotMap::with_key(),
            skeletons: SlotMap::with_key(),
            debug_lines: Vec::new(),
            lights_ubo: None,
            lights_layout_changed: true,
            probe_textures: None,
            probe_capacity: settings.max_light_probes,
            shadow_slots: ShadowSlotAllocator::new(maps, cubes),
            camera: Camera::default(),
            is_ui: false,
            clear_color: LinearRgba::BLACK,
        }
    }

    fn shadow_capacity(settings: &VideoSettings) -> (u32, u32) {
        if settings.shadows_enabled() && settings.needs_lighting() {
            (settings.max_shadow_maps, settings.max_shadow_cubemaps)
        } else {
            (0, 0)
        }
    }

    /// Unique for the lifetime of the process, unlike the name.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Renderables ----------------------------------------------------

    /// Adds a renderable.
    pub fn add_renderable(&mut self, renderable: Box<dyn Renderable>) -> RenderableKey {
        self.renderables.insert(renderable)
    }

    /// Removes a renderable.
    pub fn remove_renderable(&mut self, key: RenderableKey) -> Option<Box<dyn Renderable>> {
        self.renderables.remove(key)
    }

    /// Looks a renderable up.
    pub fn renderable(&self, key: RenderableKey) -> Option<&dyn Renderable> {
        self.renderables.get(key).map(|r| r.as_ref())
    }

    /// Looks a renderable up for modification.
    pub fn renderable_mut(&mut self, key: RenderableKey) -> Option<&mut (dyn Renderable + 'static)> {
        self.renderables.get_mut(key).map(|r| r.as_mut())
    }

    /// All renderables.
    pub fn renderables(&self) -> impl Iterator<Item = &dyn Renderable> {
        self.renderables.values().map(|r| r.as_ref())
    }

    /// Advances every renderable's animations.
    pub fn advance(&mut self, dt: f32) {
        for renderable in self.renderables.values_mut() {
            renderable.advance(dt);
        }
    }

    // --- Lights ---------------------------------------------------------

    /// Adds a light and gives it a shadow slot if it casts shadows and one is free.
    pub fn add_light(&mut self, mut light: LightComponent) -> LightKey {
        let slot = self.allocate_slot(&light);
        light.set_shadow_slot(slot);
        self.lights_layout_changed = true;
        self.lights.insert(light)
    }

    /// Removes a light and frees its slot.
    pub fn remove_light(&mut self, key: LightKey) -> Option<LightComponent> {
        let light = self.lights.remove(key)?;
        self.free_slot(&light);
        self.lights_layout_changed = true;
        Some(light)
    }

    /// Looks a light up.
    pub fn light(&self, key: LightKey) -> Option<&LightComponent> {
        self.lights.get(key)
    }

    /// Changes a light through `update`, then moves it to the right shadow
    /// pool if its type or shadow casting changed.
    pub fn update_light(&mut self, key: LightKey, update: impl FnOnce(&mut LightComponent)) {
        let Some(light) = self.lights.get_mut(key) else {
            log::warn!("Tried to update a light that is not in scene '{}'", self.name);
            return;
        };
        let before = (light.light_type() == LightType::Point, light.casts_shadows());
        update(light);
        let after = (light.light_type() == LightType::Point, light.casts_shadows());
        if before != after {
            let mut light = light.clone();
            if let Some(slot) = light.shadow_slot() {
                self.shadow_slots.free(before.0, slot);
            }
            let slot = self.allocate_slot(&light);
            light.set_shadow_slot(slot);
            if let Some(stored) = self.lights.get_mut(key) {
                *stored = light;
            }
        }
    }

    /// Lights in uniform-block order.
    pub fn lights(&self) -> impl Iterator<Item = (LightKey, &LightComponent)> {
        self.lights.iter()
    }

    /// Lights in uniform-block order, mutably.
    pub fn lights_mut(&mut self) -> impl Iterator<Item = (LightKey, &mut LightComponent)> {
        self.lights.iter_mut()
    }

    /// Number of lights.
    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// The shadow slot allocator.
    pub fn shadow_slots(&self) -> &ShadowSlotAllocator {
        &self.shadow_slots
    }

    fn allocate_slot(&mut self, light: &LightComponent) -> Option<u32> {
        if !light.casts_shadows() {
            return None;
        }
        let cube = light.light_type() == LightType::Point;
        let slot = self.shadow_slots.allocate(cube);
        if slot.is_none() && self.shadow_slots.capacity() != (0, 0) {
            log::warn!(
                "Scene '{}' is out of {} shadow slots; the light will not cast shadows",
                self.name,
                if cube { "cube" } else { "2D" }
            );
        }
        slot
    }

    fn free_slot(&mut self, light: &LightComponent) {
        if let Some(slot) = light.shadow_slot() {
            self.shadow_slots
                .free(light.light_type() == LightType::Point, slot);
        }
    }

    /// Reassigns every shadow slot for new capacities, invalidating all shadow maps.
    pub fn reconfigure(&mut self, settings: &VideoSettings) {
        let (maps, cubes) = Self::shadow_capacity(settings);
        self.shadow_slots = ShadowSlotAllocator::new(maps, cubes);
        let keys: Vec<LightKey> = self.lights.keys().collect();
        for key in keys {
            let Some(mut light) = self.lights.get(key).cloned() else {
                continue;
            };
            light.set_shadow_slot(None);
            let slot = self.allocate_slot(&light);
            light.set_shadow_slot(slot);
            light.invalidate_shadow();
            self.lights[key] = light;
        }
        if settings.max_light_probes != self.probe_capacity {
            log::warn!(
                "Scene '{}' keeps its light probe capacity of {} until disposed",
                self.name,
                self.probe_capacity
            );
        }
    }

    /// Rewrites the lights uniform block if any light changed, and binds it.
    pub fn upload_lights(&mut self, ctx: &mut RenderContext) -> Result<(), ResourceError> {
        let dirty = self.lights_layout_changed || self.lights.values().any(LightComponent::is_ubo_dirty);
        let needed = LIGHTS_BLOCK_HEADER + self.lights.len().max(1) * std::mem::size_of::<LightUniform>();
        if let Some((buffer, capacity)) = self.lights_ubo {
            if capacity < needed {
                ctx.destroy_uniform_buffer(buffer);
                self.lights_ubo = None;
            }
        }
        let (buffer, rewrite) = match self.lights_ubo {
            Some((buffer, _)) => (buffer, dirty),
            None => {
                let buffer = ctx.create_uniform_buffer("lights", needed)?;
                self.lights_ubo = Some((buffer, needed));
                (buffer, true)
            }
        };
        if rewrite {
            let mut block = Vec::with_capacity(needed);
            let mut header = [0u8; LIGHTS_BLOCK_HEADER];
            header[..4].copy_from_slice(&(self.lights.len() as i32).to_ne_bytes());
            block.extend_from_slice(&header);
            for light in self.lights.values_mut() {
                block.extend_from_slice(bytemuck::bytes_of(&light.take_uniform()));
            }
            ctx.write_uniform_buffer(buffer, 0, &block)?;
            self.lights_layout_changed = false;
        }
        ctx.bind_uniform_buffer(BINDING_LIGHTS, Some(buffer));
        Ok(())
    }

    // --- Probes ---------------------------------------------------------

    /// Adds a probe in the lowest free slot. An environment texture is retained.
    /// Returns `None` when every slot is taken.
    pub fn add_probe(
        &mut self,
        ctx: &mut RenderContext,
        mut probe: LightProbe,
        environment: Option<TextureHandle>,
    ) -> Option<ProbeKey> {
        let Some(slot) = (0..self.probe_capacity)
            .find(|slot| !self.probes.values().any(|p| p.probe.slot() == Some(*slot)))
        else {
            log::warn!("Scene '{}' has no free light probe slot", self.name);
            return None;
        };
        probe.set_slot(Some(slot));
        if let Some(texture) = environment {
            ctx.retain_texture(texture);
        }
        Some(self.probes.insert(ProbeEntry { probe, environment }))
    }

    /// Removes a probe, releasing its environment texture.
    pub fn remove_probe(&mut self, ctx: &mut RenderContext, key: ProbeKey) -> Option<LightProbe> {
        let entry = self.probes.remove(key)?;
        if let Some(texture) = entry.environment {
            ctx.release_texture(texture);
        }
        Some(entry.probe)
    }

    /// All probes.
    pub fn probes(&self) -> impl Iterator<Item = (ProbeKey, &ProbeEntry)> {
        self.probes.iter()
    }

    /// Looks a probe up for modification.
    pub fn probe_mut(&mut self, key: ProbeKey) -> Option<&mut ProbeEntry> {
        self.probes.get_mut(key)
    }

    /// Number of probes.
    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// The probe textures, once allocated.
    pub fn probe_textures(&self) -> Option<&ProbeTextures> {
        self.probe_textures.as_ref()
    }

    /// Flags the BRDF table as generated.
    pub fn mark_brdf_ready(&mut self) {
        if let Some(textures) = self.probe_textures.as_mut() {
            textures.brdf_ready = true;
        }
    }

    /// Allocates the probe textures on first use.
    pub fn ensure_probe_textures(
        &mut self,
        ctx: &mut RenderContext,
        settings: &VideoSettings,
    ) -> Result<ProbeTextures, ResourceError> {
        if let Some(textures) = self.probe_textures {
            return Ok(textures);
        }
        let capacity = self.probe_capacity.max(1);
        let prefilter_size = settings.probe_resolution.max(1);
        let prefilter_mips = PREFILTER_MIPS.min(full_mip_count(Extent2D::square(prefilter_size)));
        let irradiance = ctx.create_texture(&TextureDescriptor::cube_array(
            "probe_irradiance",
            IRRADIANCE_SIZE,
            capacity,
            TextureFormat::Rgba16F,
        ))?;
        let prefilter = ctx.create_texture(
            &TextureDescriptor::cube_array("probe_prefilter", prefilter_size, capacity, TextureFormat::Rgba16F)
                .with_mips(prefilter_mips),
        )?;
        let brdf_lut = ctx.create_texture(
            &TextureDescriptor::d2("brdf_lut", Extent2D::square(BRDF_LUT_SIZE), TextureFormat::Rg16F)
                .with_filter(FilterMode::Linear),
        )?;
        let textures = ProbeTextures {
            irradiance,
            prefilter,
            brdf_lut,
            brdf_ready: false,
            capacity,
        };
        log::info!("Allocated light probe textures for {capacity} probes in scene '{}'", self.name);
        self.probe_textures = Some(textures);
        Ok(textures)
    }

    // --- Skeletons ------------------------------------------------------

    /// Adds a skeleton batch.
    pub fn add_skeleton(&mut self, batch: SkeletonBatch) -> SkeletonKey {
        self.skeletons.insert(batch)
    }

    /// Looks a batch up.
    pub fn skeleton(&self, key: SkeletonKey) -> Option<&SkeletonBatch> {
        self.skeletons.get(key)
    }

    /// Looks a batch up for modification.
    pub fn skeleton_mut(&mut self, key: SkeletonKey) -> Option<&mut SkeletonBatch> {
        self.skeletons.get_mut(key)
    }

    /// Swaps the bone buffers of every batch. Call once per frame, before rendering.
    pub fn swap_bone_buffers(&mut self, ctx: &mut RenderContext) {
        for batch in self.skeletons.values_mut() {
            if let Err(err) = batch.swap(ctx) {
                log::error!("Failed to upload bone matrices: {err}");
            }
        }
    }

    /// Releases every GPU resource of the scene.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        if let Some((buffer, _)) = self.lights_ubo.take() {
            ctx.destroy_uniform_buffer(buffer);
        }
        for (_, batch) in self.skeletons.drain() {
            batch.release(ctx);
        }
        for (_, entry) in self.probes.drain() {
            if let Some(texture) = entry.environment {
                ctx.release_texture(texture);
            }
        }
        if let Some(textures) = self.probe_textures.take() {
            ctx.release_texture(textures.irradiance);
            ctx.release_texture(textures.prefilter);
            ctx.release_texture(textures.brdf_lut);
        }
        log::debug!("Disposed render data of scene '{}'", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::Vec3;
    use umbra_core::renderer::SettingLevel;

    fn settings(maps: u32, cubes: u32) -> VideoSettings {
        VideoSettings {
            shadows: SettingLevel::Medium,
            max_shadow_maps: maps,
            max_shadow_cubemaps: cubes,
            ..Default::default()
        }
    }

    #[test]
    fn point_lights_take_cube_slots() {
        let mut scene = GameSceneRenderData::new("test", &settings(1, 1));
        let sun = scene.add_light(LightComponent::new(LightType::Directional));
        let bulb = scene.add_light(LightComponent::new(LightType::Point));
        let second = scene.add_light(LightComponent::new(LightType::Point));
        assert_eq!(scene.light(sun).and_then(LightComponent::shadow_slot), Some(0));
        assert_eq!(scene.light(bulb).and_then(LightComponent::shadow_slot), Some(0));
        assert_eq!(scene.light(second).and_then(LightComponent::shadow_slot), None);
    }

    #[test]
    fn changing_type_moves_the_light_between_pools() {
        let mut scene = GameSceneRenderData::new("test", &settings(1, 1));
        let key = scene.add_light(LightComponent::new(LightType::Spot).with_position(Vec3::Y));
        scene.update_light(key, |light| light.set_type(LightType::Point));
        assert_eq!(scene.shadow_slots().used(false), 0);
        assert_eq!(scene.shadow_slots().used(true), 1);
        assert_eq!(scene.light(key).and_then(LightComponent::shadow_slot), Some(0));
    }

    #[test]
    fn lights_get_no_slot_without_shadows() {
        let mut s = settings(4, 4);
        s.shadows = SettingLevel::None;
        let mut scene = GameSceneRenderData::new("test", &s);
        let key = scene.add_light(LightComponent::new(LightType::Point));
        assert_eq!(scene.light(key).and_then(LightComponent::shadow_slot), None);
    }
}
