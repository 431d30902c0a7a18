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

//! Mathematics primitives used across the renderer.
//!
//! Linear algebra comes from `glam`; this module adds the colour type, integer
//! extents, and the handful of projection helpers the passes share (cube-face
//! views, light projections).

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

pub use glam::{Mat3, Mat4, Quat, UVec2, Vec2, Vec3, Vec4};

pub mod color;
pub mod dimension;

pub use self::color::LinearRgba;
pub use self::dimension::{Extent2D, Rect};

/// Forward and up vectors of the six cube-map faces, in the order
/// `+X, -X, +Y, -Y, +Z, -Z` used by every cube-map target.
pub const CUBE_FACE_DIRECTIONS: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// Returns the view matrix looking from `position` through cube face `face`.
///
/// `face` is taken modulo 6.
pub fn cube_face_view(position: Vec3, face: usize) -> Mat4 {
    let (forward, up) = CUBE_FACE_DIRECTIONS[face % 6];
    Mat4::look_at_rh(position, position + forward, up)
}

/// A 90 degree square perspective projection, the one every cube-face view uses.
pub fn cube_face_projection(near: f32, far: f32) -> Mat4 {
    Mat4::perspective_rh_gl(FRAC_PI_2, 1.0, near, far)
}

/// Returns an up vector that is not parallel to `direction`.
#[inline]
pub fn stable_up(direction: Vec3) -> Vec3 {
    if direction.normalize_or_zero().y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}

/// Builds the normal matrix (inverse-transpose of the upper 3x3) of `model`.
pub fn normal_matrix(model: &Mat4) -> Mat3 {
    Mat3::from_mat4(*model).inverse().transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cube_face_views_look_along_their_axis() {
        for (face, (forward, _)) in CUBE_FACE_DIRECTIONS.iter().enumerate() {
            let view = cube_face_view(Vec3::ZERO, face);
            // A point one unit along the face direction lands on the -Z view axis.
            let p = view.transform_point3(*forward);
            assert_relative_eq!(p.z, -1.0, epsilon = EPSILON);
            assert_relative_eq!(p.x, 0.0, epsilon = EPSILON);
            assert_relative_eq!(p.y, 0.0, epsilon = EPSILON);
        }
    }

    #[test]
    fn stable_up_avoids_parallel_vectors() {
        assert_eq!(stable_up(Vec3::NEG_Y), Vec3::Z);
        assert_eq!(stable_up(Vec3::X), Vec3::Y);
    }

    #[test]
    fn normal_matrix_of_uniform_scale_keeps_directions() {
        let model = Mat4::from_scale(Vec3::splat(3.0));
        let n = normal_matrix(&model) * Vec3::X;
        assert_relative_eq!(n.normalize().x, 1.0, epsilon = EPSILON);
    }
}
