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

//! What the pipeline renders: renderables, lights, probes and skeletons of one scene.
//!
//! The scene graph itself lives elsewhere; it feeds a [`GameSceneRenderData`]
//! with objects implementing [`Renderable`].

mod camera;
mod mesh_renderable;
mod render_data;
mod shadow_slots;
mod skeleton;

pub use camera::Camera;
pub use mesh_renderable::MeshRenderable;
pub use render_data::{
    GameSceneRenderData, LightKey, ProbeEntry, ProbeKey, ProbeTextures, RenderableKey, SkeletonKey,
};
pub use shadow_slots::ShadowSlotAllocator;
pub use skeleton::SkeletonBatch;

use crate::context::RenderContext;
use crate::material::MaterialShading;
use crate::shader::Shader;
use std::fmt::Debug;
use umbra_core::renderer::VideoSettings;

/// The pass a renderable is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPassKind {
    /// Writing the G-buffer.
    Geometry,
    /// Writing colour directly into the HDR buffer.
    Forward,
    /// Projective depth into a shadow-map layer.
    ShadowDepth,
    /// Linear distance into a point-light cube face.
    ShadowLinearDepth,
    /// Forward pass of a UI scene.
    Ui,
}

impl RenderPassKind {
    /// Returns `true` for the shadow passes, which need no material data.
    pub fn is_shadow(self) -> bool {
        matches!(self, RenderPassKind::ShadowDepth | RenderPassKind::ShadowLinearDepth)
    }
}

/// Everything a renderable needs to know about the pass drawing it.
#[derive(Debug, Clone, Copy)]
pub struct RenderInfo<'a> {
    /// The pass.
    pub pass: RenderPassKind,
    /// The viewpoint.
    pub camera: &'a Camera,
    /// The settings of the collection in use.
    pub settings: &'a VideoSettings,
}

/// Binds a skinned renderable to its skeleton batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkinBinding {
    /// The batch holding the bone buffer.
    pub batch: SkeletonKey,
    /// Index of this mesh's first bone in the batch.
    pub bone_offset: u32,
}

/// Placement of a UI element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiPlacement {
    /// Larger is further away; elements are drawn from the largest depth down.
    pub depth: f32,
    /// View-space offset of the element.
    pub offset: umbra_core::math::Vec3,
}

/// An object the pipeline can draw.
pub trait Renderable: Debug {
    /// Issues the draw calls of this object.
    ///
    /// `shader` is the program chosen by the pass (G-buffer, shadow depth,
    /// forward lit/unlit...). It is `None` when the object brings its own,
    /// i.e. for [`MaterialShading::Custom`].
    fn render(&self, ctx: &mut RenderContext, info: &RenderInfo<'_>, shader: Option<&Shader>);

    /// How the object is shaded, which decides the pass it goes to.
    fn shading(&self) -> &MaterialShading;

    /// Whether the object is drawn into shadow maps.
    fn casts_shadows(&self) -> bool {
        true
    }

    /// The skeleton the object is skinned to, if any.
    fn skinning(&self) -> Option<SkinBinding> {
        None
    }

    /// UI placement, for objects of UI scenes.
    fn ui_placement(&self) -> Option<UiPlacement> {
        None
    }

    /// Advances animations by `dt` seconds.
    fn advance(&mut self, _dt: f32) {}
}
