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

use super::{RenderInfo, RenderPassKind, Renderable, SkinBinding, UiPlacement};
use crate::context::RenderContext;
use crate::material::{MaterialInstance, MaterialShading};
use crate::primitives::GpuMesh;
use crate::shader::Shader;
use std::cell::Cell;
use umbra_core::math::Mat4;
use umbra_core::renderer::UniformValue;

/// A mesh drawn with one material instance: the standard [`Renderable`].
#[derive(Debug, Clone)]
pub struct MeshRenderable {
    /// The geometry.
    pub mesh: GpuMesh,
    /// Object to world.
    pub transform: Mat4,
    /// The material.
    pub material: MaterialInstance,
    /// The pass it goes to.
    pub shading: MaterialShading,
    /// Whether it appears in shadow maps.
    pub casts_shadows: bool,
    /// Skeleton binding of a skinned mesh.
    pub skin: Option<SkinBinding>,
    /// UI placement of a UI element.
    pub ui: Option<UiPlacement>,
    drawn: Cell<DrawnTransforms>,
}

/// Transforms the geometry pass drew in frame `frame` and in the frame before.
#[derive(Debug, Clone, Copy)]
struct DrawnTransforms {
    frame: Option<u64>,
    current: Mat4,
    previous: Mat4,
}

impl MeshRenderable {
    /// A lit, shadow-casting mesh.
    pub fn new(mesh: GpuMesh, transform: Mat4, material: MaterialInstance) -> Self {
        Self {
            mesh,
            transform,
            material,
            shading: MaterialShading::Lit,
            casts_shadows: true,
            skin: None,
            ui: None,
            drawn: Cell::new(DrawnTransforms {
                frame: None,
                current: transform,
                previous: transform,
            }),
        }
    }

    /// Changes the shading.
    pub fn with_shading(mut self, shading: MaterialShading) -> Self {
        self.shading = shading;
        self
    }

    /// Binds the mesh to a skeleton.
    pub fn with_skin(mut self, skin: SkinBinding) -> Self {
        self.skin = Some(skin);
        self
    }

    /// Places the mesh in a UI scene.
    pub fn with_ui(mut self, placement: UiPlacement) -> Self {
        self.ui = Some(placement);
        self
    }

    /// Moves the mesh.
    ///
    /// Velocity compares with what the geometry pass drew in the previous
    /// frame, so this can be called anywhere around `prepare_frame`.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// The transform the last geometry pass compared with for velocity.
    pub fn previous_transform(&self) -> Mat4 {
        self.drawn.get().previous
    }

    /// Records the transform drawn in `frame` and returns the one drawn in
    /// the frame before. The first draw of a frame wins; a mesh skipped for a
    /// frame has no history and reports its current transform.
    fn draw_in_frame(&self, frame: u64) -> Mat4 {
        let drawn = self.drawn.get();
        if drawn.frame == Some(frame) {
            return drawn.previous;
        }
        let previous = if drawn.frame.map(|f| f + 1) == Some(frame) { drawn.current } else { self.transform };
        self.drawn.set(DrawnTransforms {
            frame: Some(frame),
            current: self.transform,
            previous,
        });
        previous
    }
}

impl Renderable for MeshRenderable {
    fn render(&self, ctx: &mut RenderContext, info: &RenderInfo<'_>, shader: Option<&Shader>) {
        let shader = match (shader, &self.shading) {
            (Some(shader), _) => shader,
            (None, MaterialShading::Custom(custom)) => custom.as_ref(),
            (None, _) => {
                log::warn!("Mesh {:?} has no shader for the {:?} pass", self.mesh.id, info.pass);
                return;
            }
        };
        shader.bind(ctx);
        shader.bind_matrices(ctx, &self.transform, info.camera);
        if let Some(skin) = self.skin {
            ctx.set_uniform("boneOffset", UniformValue::Int(skin.bone_offset as i32));
        }
        if !info.pass.is_shadow() {
            self.material.update_ubo_data(ctx, shader);
        }
        if info.pass == RenderPassKind::Geometry {
            let model = self.draw_in_frame(ctx.stats().frame_number);
            let previous = info.camera.previous_view_projection * model;
            ctx.set_uniform("previousMvp", UniformValue::Mat4(previous));
        }
        ctx.draw_mesh(self.mesh);
    }

    fn shading(&self) -> &MaterialShading {
        &self.shading
    }

    fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    fn skinning(&self) -> Option<SkinBinding> {
        self.skin
    }

    fn ui_placement(&self) -> Option<UiPlacement> {
        self.ui
    }

    fn advance(&mut self, dt: f32) {
        self.material.advance(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;
    use std::sync::Arc;
    use umbra_core::math::Vec3;
    use umbra_core::renderer::MeshId;

    fn mesh_at(x: f32) -> MeshRenderable {
        let material = MaterialInstance::new(Arc::new(Material::default()));
        let mesh = GpuMesh {
            id: MeshId(0),
            triangles: 2,
        };
        MeshRenderable::new(mesh, Mat4::from_translation(Vec3::X * x), material)
    }

    #[test]
    fn velocity_compares_with_the_previous_draw() {
        let mut mesh = mesh_at(0.0);
        mesh.draw_in_frame(1);
        mesh.set_transform(Mat4::from_translation(Vec3::X));
        assert_eq!(mesh.draw_in_frame(2), Mat4::IDENTITY);
    }

    #[test]
    fn history_follows_consecutive_frames() {
        let mut mesh = mesh_at(0.0);
        mesh.draw_in_frame(1);
        mesh.set_transform(Mat4::from_translation(Vec3::X));
        assert_eq!(mesh.draw_in_frame(2), Mat4::IDENTITY);
        assert_eq!(mesh.draw_in_frame(3), Mat4::from_translation(Vec3::X));
        assert_eq!(mesh.previous_transform(), Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn every_draw_of_a_frame_sees_the_same_history() {
        let mut mesh = mesh_at(0.0);
        mesh.draw_in_frame(1);
        mesh.set_transform(Mat4::from_translation(Vec3::Y));
        assert_eq!(mesh.draw_in_frame(2), Mat4::IDENTITY);
        mesh.set_transform(Mat4::from_translation(Vec3::Z));
        assert_eq!(mesh.draw_in_frame(2), Mat4::IDENTITY);
    }

    #[test]
    fn first_draw_has_no_velocity() {
        let mut mesh = mesh_at(0.0);
        mesh.set_transform(Mat4::from_translation(Vec3::X));
        assert_eq!(mesh.draw_in_frame(1), Mat4::from_translation(Vec3::X));
    }

    #[test]
    fn skipped_frames_drop_the_history() {
        let mut mesh = mesh_at(2.0);
        mesh.draw_in_frame(1);
        mesh.set_transform(Mat4::from_translation(Vec3::X * 5.0));
        assert_eq!(mesh.draw_in_frame(4), Mat4::from_translation(Vec3::X * 5.0));
    }
}
