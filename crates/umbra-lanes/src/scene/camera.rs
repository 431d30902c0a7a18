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

use umbra_core::math::{Mat4, Vec3};

/// The viewpoint of one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World to view.
    pub view: Mat4,
    /// View to clip.
    pub projection: Mat4,
    /// World-space eye position.
    pub position: Vec3,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    /// View-projection of the previous frame, for velocity.
    pub previous_view_projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0)
    }
}

impl Camera {
    /// A perspective camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let view = Mat4::look_at_rh(eye, target, umbra_core::math::stable_up(target - eye));
        let projection = Mat4::perspective_rh_gl(fov_y, aspect, near, far);
        Self {
            view,
            projection,
            position: eye,
            near,
            far,
            previous_view_projection: projection * view,
        }
    }

    /// A camera that leaves vertices untouched: for full-screen quads and
    /// passes that put the whole transform in the model matrix.
    pub fn identity() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            near: -1.0,
            far: 1.0,
            previous_view_projection: Mat4::IDENTITY,
        }
    }

    /// A camera with explicit matrices, e.g. a light's shadow projection.
    pub fn from_matrices(view: Mat4, projection: Mat4, position: Vec3, near: f32, far: f32) -> Self {
        Self {
            view,
            projection,
            position,
            near,
            far,
            previous_view_projection: projection * view,
        }
    }

    /// Projection times view.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Remembers the current view-projection as the previous one. Call once per frame.
    pub fn advance_frame(&mut self) {
        self.previous_view_projection = self.view_projection();
    }

    /// This camera with its view moved by `offset` in view space.
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            view: Mat4::from_translation(offset) * self.view,
            ..*self
        }
    }
}
