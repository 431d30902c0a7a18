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
use crate::scene::{GameSceneRenderData, LightKey};
use crate::shader::{ExpectedMatrices, Shader, ShaderDescriptor};
use std::collections::HashMap;
use umbra_core::renderer::{LightType, TextureDescriptor, TextureFormat, VideoSettings};

/// A layer of the atlas: cube slot or 2D layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AtlasSlot {
    cube: bool,
    slot: u32,
}

/// The light a layer was last rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShadowStamp {
    scene: u64,
    light: LightKey,
    revision: u64,
}

/// The shadow atlas: a 2D depth array with one layer per directional or spot
/// light slot, and a cube depth array with one cube per point light slot.
#[derive(Debug)]
pub struct ShadowMappingToolbox {
    /// Layered depth of directional and spot lights.
    pub maps: TextureHandle,
    /// Linear depth cubes of point lights.
    pub cubemaps: TextureHandle,
    /// Depth-only framebuffer re-attached to one layer per pass.
    pub framebuffer: FramebufferHandle,
    /// Edge length of a 2D layer.
    pub map_size: u32,
    /// Edge length of a cube face.
    pub cube_size: u32,
    /// Projective depth.
    pub depth: Option<Shader>,
    /// Projective depth, skinned.
    pub depth_skinned: Option<Shader>,
    /// Distance to the light over the far plane.
    pub linear_depth: Option<Shader>,
    /// Linear depth, skinned.
    pub linear_depth_skinned: Option<Shader>,
    rendered: HashMap<AtlasSlot, ShadowStamp>,
}

impl ShadowMappingToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>, settings: &VideoSettings) -> Result<Self, ToolboxError> {
        let map_size = settings.shadow_map_resolution();
        let cube_size = settings.shadow_cubemap_resolution();
        let maps = guard.texture(&TextureDescriptor::d2_array(
            "shadow_maps",
            umbra_core::math::Extent2D::square(map_size),
            settings.max_shadow_maps.max(1),
            TextureFormat::Depth32F,
        ))?;
        let cubemaps = guard.texture(&TextureDescriptor::cube_array(
            "shadow_cubemaps",
            cube_size,
            settings.max_shadow_cubemaps.max(1),
            TextureFormat::Depth32F,
        ))?;
        let framebuffer = guard.framebuffer("shadow")?;

        let depth = |label: &str, skinned: bool| {
            ShaderDescriptor::new("shadow_depth")
                .with_label(label)
                .with_define("SKINNED", u8::from(skinned))
                .with_matrices(ExpectedMatrices::MVP)
        };
        let linear = |label: &str, skinned: bool| {
            ShaderDescriptor::new("shadow_linear_depth")
                .with_label(label)
                .with_define("SKINNED", u8::from(skinned))
                .with_matrices(ExpectedMatrices::MODEL | ExpectedMatrices::MVP)
        };
        Ok(Self {
            maps,
            cubemaps,
            framebuffer,
            map_size,
            cube_size,
            depth: guard.shader(depth("shadow_depth", false)),
            depth_skinned: guard.shader(depth("shadow_depth_skinned", true)),
            linear_depth: guard.shader(linear("shadow_linear_depth", false)),
            linear_depth_skinned: guard.shader(linear("shadow_linear_depth_skinned", true)),
            rendered: HashMap::new(),
        })
    }

    fn stamp(scene: &GameSceneRenderData, key: LightKey) -> Option<(AtlasSlot, ShadowStamp)> {
        let light = scene.light(key)?;
        let slot = AtlasSlot {
            cube: light.light_type() == LightType::Point,
            slot: light.shadow_slot()?,
        };
        let stamp = ShadowStamp {
            scene: scene.id(),
            light: key,
            revision: light.shadow_revision(),
        };
        Some((slot, stamp))
    }

    /// Returns `true` if this atlas holds an up to date shadow map of the
    /// light, rendered for this scene.
    pub fn holds(&self, scene: &GameSceneRenderData, key: LightKey) -> bool {
        Self::stamp(scene, key).is_some_and(|(slot, stamp)| self.rendered.get(&slot) == Some(&stamp))
    }

    /// Records that the slot of the light now holds its shadow map.
    pub(crate) fn mark_rendered(&mut self, scene: &GameSceneRenderData, key: LightKey) {
        if let Some((slot, stamp)) = Self::stamp(scene, key) {
            self.rendered.insert(slot, stamp);
        }
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        ctx.release_framebuffer(self.framebuffer);
        ctx.release_texture(self.maps);
        ctx.release_texture(self.cubemaps);
        for shader in [self.depth, self.depth_skinned, self.linear_depth, self.linear_depth_skinned] {
            release_shader(ctx, shader);
        }
    }
}
