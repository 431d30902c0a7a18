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

//! The renderer facade: one context, its named shaders, collections and scenes.

use crate::context::{RenderContext, TextureHandle};
use crate::error::ToolboxError;
use crate::render_lane::{FullRenderOptions, LightProbeRenderer, RenderTarget, SceneRenderer};
use crate::scene::{GameSceneRenderData, ProbeKey};
use crate::shader::{Shader, ShaderDescriptor, ShaderLibrary};
use crate::toolbox::RenderToolboxCollection;
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;
use umbra_core::renderer::{LightProbe, RenderStats, VideoSettings};

new_key_type! {
    /// Identifies a scene in a [`RenderEngine`].
    pub struct SceneKey;
    /// Identifies a toolbox collection in a [`RenderEngine`].
    pub struct CollectionKey;
}

/// Owns the [`RenderContext`] and everything rendered with it.
///
/// Scenes and collections are independent: any scene can be rendered with
/// any collection, and a settings change rebuilds only the collection.
#[derive(Debug)]
pub struct RenderEngine {
    ctx: RenderContext,
    shaders: ShaderLibrary,
    scenes: SlotMap<SceneKey, GameSceneRenderData>,
    collections: SlotMap<CollectionKey, RenderToolboxCollection>,
}

impl RenderEngine {
    /// Wraps a context.
    pub fn new(ctx: RenderContext) -> Self {
        Self {
            ctx,
            shaders: ShaderLibrary::new(),
            scenes: SlotMap::with_key(),
            collections: SlotMap::with_key(),
        }
    }

    /// The render context.
    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// The render context, for resource creation.
    pub fn context_mut(&mut self) -> &mut RenderContext {
        &mut self.ctx
    }

    /// Counters of the last frame.
    pub fn stats(&self) -> &RenderStats {
        self.ctx.stats()
    }

    // --- Shaders --------------------------------------------------------

    /// Loads a custom material shader into the library under its label.
    /// A shader it replaces keeps its program while materials still use it.
    pub fn load_shader(&mut self, descriptor: &ShaderDescriptor) -> Option<Arc<Shader>> {
        self.shaders.load(&mut self.ctx, descriptor)
    }

    /// Looks a custom shader up by label. A miss is logged.
    pub fn shader(&self, label: &str) -> Option<Arc<Shader>> {
        self.shaders.get(label)
    }

    /// The custom shader library.
    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    // --- Collections ----------------------------------------------------

    /// Builds a collection with every toolbox `settings` require.
    pub fn create_collection(&mut self, name: &str, settings: VideoSettings) -> Result<CollectionKey, ToolboxError> {
        let mut collection = RenderToolboxCollection::new(name, settings);
        if let Err(err) = collection.add_tbs_required_by_settings(&mut self.ctx) {
            collection.dispose(&mut self.ctx);
            return Err(err);
        }
        Ok(self.collections.insert(collection))
    }

    /// A collection.
    pub fn collection(&self, key: CollectionKey) -> Option<&RenderToolboxCollection> {
        self.collections.get(key)
    }

    /// Rebuilds a collection for new settings and re-slots the shadow maps
    /// of every scene to the new capacities.
    pub fn replace_collection_settings(&mut self, key: CollectionKey, settings: VideoSettings) -> Result<(), ToolboxError> {
        let Some(collection) = self.collections.get_mut(key) else {
            log::error!("Replaced the settings of a collection that no longer exists");
            return Ok(());
        };
        collection.replace_settings(&mut self.ctx, settings.clone())?;
        for scene in self.scenes.values_mut() {
            scene.reconfigure(&settings);
        }
        Ok(())
    }

    /// Disposes and removes a collection.
    pub fn remove_collection(&mut self, key: CollectionKey) {
        if let Some(mut collection) = self.collections.remove(key) {
            collection.dispose(&mut self.ctx);
        }
    }

    // --- Scenes ---------------------------------------------------------

    /// Adds an empty scene sized for the settings of `collection`.
    pub fn add_scene(&mut self, name: &str, collection: CollectionKey) -> Option<SceneKey> {
        let Some(collection) = self.collections.get(collection) else {
            log::error!("Scene '{name}' refers to a collection that no longer exists");
            return None;
        };
        let scene = GameSceneRenderData::new(name, collection.settings());
        Some(self.scenes.insert(scene))
    }

    /// A scene.
    pub fn scene(&self, key: SceneKey) -> Option<&GameSceneRenderData> {
        self.scenes.get(key)
    }

    /// A scene, for modification.
    pub fn scene_mut(&mut self, key: SceneKey) -> Option<&mut GameSceneRenderData> {
        self.scenes.get_mut(key)
    }

    /// Disposes and removes a scene.
    pub fn remove_scene(&mut self, key: SceneKey) {
        if let Some(mut scene) = self.scenes.remove(key) {
            scene.dispose(&mut self.ctx);
        }
    }

    /// Adds a light probe to a scene, retaining its environment texture.
    /// `None` when the scene is gone or has no free probe slot.
    pub fn add_probe(&mut self, scene: SceneKey, probe: LightProbe, environment: Option<TextureHandle>) -> Option<ProbeKey> {
        let Some(scene) = self.scenes.get_mut(scene) else {
            log::error!("Probe added to a scene that no longer exists");
            return None;
        };
        scene.add_probe(&mut self.ctx, probe, environment)
    }

    /// Removes a light probe from a scene, releasing its environment texture.
    pub fn remove_probe(&mut self, scene: SceneKey, probe: ProbeKey) -> Option<LightProbe> {
        self.scenes.get_mut(scene)?.remove_probe(&mut self.ctx, probe)
    }

    // --- Frame ----------------------------------------------------------

    /// Starts a frame: resets the counters, releases unused retired shaders,
    /// remembers last frame's cameras, advances animations by `dt` seconds,
    /// swaps the bone buffers and uploads dirty light data.
    pub fn prepare_frame(&mut self, dt: f32) {
        self.ctx.begin_frame();
        self.shaders.collect_garbage(&mut self.ctx);
        for scene in self.scenes.values_mut() {
            scene.camera.advance_frame();
            scene.advance(dt);
            scene.swap_bone_buffers(&mut self.ctx);
            if let Err(err) = scene.upload_lights(&mut self.ctx) {
                log::error!("Failed to upload the lights of scene '{}': {err}", scene.name());
            }
        }
    }

    /// Renders a scene with a collection into `target`.
    pub fn render_scene(&mut self, scene: SceneKey, collection: CollectionKey, target: RenderTarget) {
        let (Some(scene), Some(collection)) = (self.scenes.get_mut(scene), self.collections.get_mut(collection)) else {
            log::error!("Render requested for a scene or collection that no longer exists");
            return;
        };
        let options = FullRenderOptions {
            target,
            ..Default::default()
        };
        SceneRenderer::full_render(&mut self.ctx, collection, scene, &options);
    }

    /// Bakes the light probes of a scene, sampling the shadow maps of
    /// `collection`, which should have rendered the scene at least once.
    pub fn bake_light_probes(&mut self, scene: SceneKey, collection: CollectionKey, iterations: u32) -> Result<usize, ToolboxError> {
        let (Some(scene), Some(collection)) = (self.scenes.get_mut(scene), self.collections.get(collection)) else {
            log::error!("Probe bake requested for a scene or collection that no longer exists");
            return Ok(0);
        };
        LightProbeRenderer::bake_all(&mut self.ctx, collection, scene, iterations)
    }

    /// Releases every GPU resource the engine owns.
    pub fn dispose(&mut self) {
        for (_, mut scene) in self.scenes.drain() {
            scene.dispose(&mut self.ctx);
        }
        for (_, mut collection) in self.collections.drain() {
            collection.dispose(&mut self.ctx);
        }
        self.shaders.dispose(&mut self.ctx);
        self.ctx.dispose();
        log::info!("Render engine disposed");
    }
}
