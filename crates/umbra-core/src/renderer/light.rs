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

//! Defines the light component consumed by the deferred lighting and shadow passes.
//!
//! A [`LightComponent`] carries its radiometric parameters, the light-volume
//! transform derived from them, the shadow-map slot it was given, a dirty
//! flag for the uniform data and a shadow revision bumped whenever rendered
//! shadow maps of the light go stale.

use crate::math::{
    cube_face_projection, cube_face_view, stable_up, LinearRgba, Mat4, Quat, Vec3, Vec4,
};
use serde::{Deserialize, Serialize};

/// The largest radius a light volume may have, in world units.
pub const MAX_LIGHT_RADIUS: f32 = 50.0;

/// Near plane of every shadow projection.
pub const SHADOW_NEAR_PLANE: f32 = 0.1;

/// Outer cutoff angles are clamped below this, in degrees, to keep the cone finite.
const MAX_CUTOFF_DEGREES: f32 = 89.0;

/// An enumeration of all supported light types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightType {
    /// Infinitely distant, parallel rays, lights the whole screen.
    #[default]
    Directional,
    /// Omni-directional with distance falloff, lit through a sphere volume.
    Point,
    /// A cone with distance and angular falloff, lit through a cone volume.
    Spot,
}

impl LightType {
    /// The value stored in the `w` of [`LightUniform::position`].
    pub fn shader_index(self) -> f32 {
        match self {
            LightType::Directional => 0.0,
            LightType::Point => 1.0,
            LightType::Spot => 2.0,
        }
    }
}

/// The radius at which a light's contribution drops below one 8-bit step.
///
/// Solves `light_max / (1 + attenuation * r^2) = 5 / 256` for `r`, clamped to
/// `[0, MAX_LIGHT_RADIUS]`. A non-positive attenuation never falls off and
/// gets the maximum radius.
pub fn light_volume_radius(light_max: f32, attenuation: f32) -> f32 {
    if attenuation <= 0.0 {
        return MAX_LIGHT_RADIUS;
    }
    let squared = ((256.0 / 5.0) * light_max - 1.0) / attenuation;
    if squared <= 0.0 {
        return 0.0;
    }
    squared.sqrt().min(MAX_LIGHT_RADIUS)
}

/// The per-light block of the lights uniform buffer (std140 compatible).
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LightUniform {
    /// `xyz` world position, `w` light type index.
    pub position: [f32; 4],
    /// `xyz` direction, `w` volume radius.
    pub direction: [f32; 4],
    /// Ambient colour.
    pub ambient: [f32; 4],
    /// Diffuse colour.
    pub diffuse: [f32; 4],
    /// Specular colour.
    pub specular: [f32; 4],
    /// Attenuation, cosine of inner cutoff, cosine of outer cutoff, shadow bias.
    pub params: [f32; 4],
    /// Shadow far plane, shadow slot (`-1` for none), directional extent, casts shadows.
    pub shadow: [f32; 4],
    /// Light-space matrix of directional and spot lights.
    pub light_space: [[f32; 4]; 4],
}

/// A light in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LightComponent {
    light_type: LightType,
    position: Vec3,
    direction: Vec3,
    ambient: LinearRgba,
    diffuse: LinearRgba,
    specular: LinearRgba,
    attenuation: f32,
    inner_cutoff: f32,
    outer_cutoff: f32,
    shadow_bias: f32,
    shadow_far_plane: f32,
    directional_shadow_extent: f32,
    casts_shadows: bool,
    shadow_slot: Option<u32>,
    radius: f32,
    volume_transform: Mat4,
    ubo_dirty: bool,
    shadow_revision: u64,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self::new(LightType::Point)
    }
}

impl LightComponent {
    /// Creates a white light of `light_type` at the origin, pointing down.
    pub fn new(light_type: LightType) -> Self {
        let mut light = Self {
            light_type,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            ambient: LinearRgba::rgb(0.05, 0.05, 0.05),
            diffuse: LinearRgba::WHITE,
            specular: LinearRgba::WHITE,
            attenuation: 0.1,
            inner_cutoff: 12.5,
            outer_cutoff: 17.5,
            shadow_bias: 0.005,
            shadow_far_plane: 25.0,
            directional_shadow_extent: 20.0,
            casts_shadows: true,
            shadow_slot: None,
            radius: 0.0,
            volume_transform: Mat4::IDENTITY,
            ubo_dirty: true,
            shadow_revision: 0,
        };
        light.recompute_volume();
        light
    }

    /// Builder: sets the position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.set_position(position);
        self
    }

    /// Builder: sets the direction.
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.set_direction(direction);
        self
    }

    /// Builder: sets the colours.
    pub fn with_colors(mut self, ambient: LinearRgba, diffuse: LinearRgba, specular: LinearRgba) -> Self {
        self.set_colors(ambient, diffuse, specular);
        self
    }

    /// Builder: sets the quadratic attenuation.
    pub fn with_attenuation(mut self, attenuation: f32) -> Self {
        self.set_attenuation(attenuation);
        self
    }

    /// Builder: enables or disables shadow casting.
    pub fn with_shadows(mut self, casts_shadows: bool) -> Self {
        self.set_casts_shadows(casts_shadows);
        self
    }

    /// The type of light.
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// World position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Normalized direction.
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    /// Ambient colour.
    pub fn ambient(&self) -> LinearRgba {
        self.ambient
    }

    /// Diffuse colour.
    pub fn diffuse(&self) -> LinearRgba {
        self.diffuse
    }

    /// Specular colour.
    pub fn specular(&self) -> LinearRgba {
        self.specular
    }

    /// Quadratic attenuation factor.
    pub fn attenuation(&self) -> f32 {
        self.attenuation
    }

    /// Inner and outer cutoff angles, in degrees.
    pub fn cutoffs(&self) -> (f32, f32) {
        (self.inner_cutoff, self.outer_cutoff)
    }

    /// Depth bias applied when sampling the shadow map.
    pub fn shadow_bias(&self) -> f32 {
        self.shadow_bias
    }

    /// Far plane of the shadow projection.
    pub fn shadow_far_plane(&self) -> f32 {
        self.shadow_far_plane
    }

    /// Half size of the orthographic shadow box of directional lights.
    pub fn directional_shadow_extent(&self) -> f32 {
        self.directional_shadow_extent
    }

    /// Whether the light renders a shadow map.
    pub fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Radius of the light volume.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Model matrix of the light volume mesh (unit sphere or unit cone).
    pub fn volume_transform(&self) -> &Mat4 {
        &self.volume_transform
    }

    /// Sets the world position; invalidates the shadow map.
    pub fn set_position(&mut self, position: Vec3) {
        if self.position != position {
            self.position = position;
            self.recompute_volume();
            self.invalidate_shadow();
        }
    }

    /// Sets the direction (normalized internally); invalidates the shadow map.
    pub fn set_direction(&mut self, direction: Vec3) {
        let direction = direction.normalize_or_zero();
        if direction != Vec3::ZERO && self.direction != direction {
            self.direction = direction;
            self.recompute_volume();
            self.invalidate_shadow();
        }
    }

    /// Changes the type; invalidates the shadow map.
    pub fn set_type(&mut self, light_type: LightType) {
        if self.light_type != light_type {
            self.light_type = light_type;
            self.recompute_volume();
            self.invalidate_shadow();
        }
    }

    /// Sets the three colours. The volume radius follows the brightest diffuse channel.
    pub fn set_colors(&mut self, ambient: LinearRgba, diffuse: LinearRgba, specular: LinearRgba) {
        self.ambient = ambient;
        self.diffuse = diffuse;
        self.specular = specular;
        self.recompute_volume();
        self.ubo_dirty = true;
    }

    /// Sets the quadratic attenuation.
    pub fn set_attenuation(&mut self, attenuation: f32) {
        self.attenuation = attenuation;
        self.recompute_volume();
        self.ubo_dirty = true;
    }

    /// Sets the spot cutoff angles in degrees; invalidates the shadow map.
    pub fn set_cutoffs(&mut self, inner_degrees: f32, outer_degrees: f32) {
        let outer = outer_degrees.clamp(0.0, MAX_CUTOFF_DEGREES);
        let inner = inner_degrees.clamp(0.0, outer);
        if (inner, outer) != (self.inner_cutoff, self.outer_cutoff) {
            self.inner_cutoff = inner;
            self.outer_cutoff = outer;
            self.recompute_volume();
            self.invalidate_shadow();
        }
    }

    /// Sets the shadow bias; invalidates the shadow map.
    pub fn set_shadow_bias(&mut self, bias: f32) {
        if self.shadow_bias != bias {
            self.shadow_bias = bias;
            self.invalidate_shadow();
        }
    }

    /// Sets the shadow far plane and the directional shadow extent.
    pub fn set_shadow_range(&mut self, far_plane: f32, directional_extent: f32) {
        self.shadow_far_plane = far_plane.max(SHADOW_NEAR_PLANE * 2.0);
        self.directional_shadow_extent = directional_extent.max(0.0);
        self.invalidate_shadow();
    }

    /// Enables or disables shadow casting.
    pub fn set_casts_shadows(&mut self, casts_shadows: bool) {
        if self.casts_shadows != casts_shadows {
            self.casts_shadows = casts_shadows;
            self.invalidate_shadow();
        }
    }

    /// The shadow-map slot: a layer of the 2D array, or a cube slot for point lights.
    pub fn shadow_slot(&self) -> Option<u32> {
        self.shadow_slot
    }

    /// Assigns a shadow-map slot.
    pub fn set_shadow_slot(&mut self, slot: Option<u32>) {
        if self.shadow_slot != slot {
            self.shadow_slot = slot;
            self.invalidate_shadow();
        }
    }

    /// Returns `true` if the uniform data changed since the last [`Self::take_uniform`].
    pub fn is_ubo_dirty(&self) -> bool {
        self.ubo_dirty
    }

    /// Bumped by every change that makes a rendered shadow map stale.
    ///
    /// Shadow maps live with whoever renders them, so each store remembers
    /// the revision it rendered and compares it with this one.
    pub fn shadow_revision(&self) -> u64 {
        self.shadow_revision
    }

    /// Forces every shadow map of this light to re-render. Also marks the
    /// uniform data dirty.
    pub fn invalidate_shadow(&mut self) {
        self.shadow_revision = self.shadow_revision.wrapping_add(1);
        self.ubo_dirty = true;
    }

    /// Whether the shadow pass culls front faces for this light.
    ///
    /// Directional lights see closed geometry from far away, so rendering back
    /// faces removes acne; perspective lights are close enough to their
    /// casters that front culling would detach contact shadows.
    pub fn should_cull_fronts_for_shadow_map(&self) -> bool {
        self.light_type == LightType::Directional
    }

    /// Returns `true` if `point` lies inside the light volume, grown by `margin`.
    pub fn volume_contains(&self, point: Vec3, margin: f32) -> bool {
        match self.light_type {
            LightType::Directional => true,
            LightType::Point => point.distance(self.position) <= self.radius + margin,
            LightType::Spot => {
                let offset = point - self.position;
                let along = offset.dot(self.direction);
                if along < -margin || along > self.radius + margin {
                    return false;
                }
                let across = (offset - self.direction * along).length();
                across <= along.max(0.0) * self.outer_cutoff.to_radians().tan() + margin
            }
        }
    }

    /// Projection times view of the shadow camera for directional and spot lights.
    pub fn light_space_matrix(&self) -> Mat4 {
        let up = stable_up(self.direction);
        match self.light_type {
            LightType::Directional => {
                let extent = self.directional_shadow_extent;
                let eye = self.position - self.direction * (self.shadow_far_plane * 0.5);
                let view = Mat4::look_at_rh(eye, eye + self.direction, up);
                let projection = Mat4::orthographic_rh_gl(
                    -extent,
                    extent,
                    -extent,
                    extent,
                    SHADOW_NEAR_PLANE,
                    self.shadow_far_plane,
                );
                projection * view
            }
            LightType::Spot => {
                let view = Mat4::look_at_rh(self.position, self.position + self.direction, up);
                let fov = (2.0 * self.outer_cutoff).to_radians().max(0.01);
                let projection =
                    Mat4::perspective_rh_gl(fov, 1.0, SHADOW_NEAR_PLANE, self.shadow_far_plane);
                projection * view
            }
            LightType::Point => Mat4::IDENTITY,
        }
    }

    /// The six cube-face view-projections of a point light.
    pub fn cube_face_matrices(&self) -> [Mat4; 6] {
        let projection = cube_face_projection(SHADOW_NEAR_PLANE, self.shadow_far_plane);
        std::array::from_fn(|face| projection * cube_face_view(self.position, face))
    }

    /// Builds the uniform block and clears the "UBO data changed" flag.
    pub fn take_uniform(&mut self) -> LightUniform {
        self.ubo_dirty = false;
        self.uniform()
    }

    /// Builds the uniform block without touching the dirty flag.
    pub fn uniform(&self) -> LightUniform {
        let vec4 = |v: Vec3, w: f32| Vec4::new(v.x, v.y, v.z, w).to_array();
        let color = |c: LinearRgba| [c.r, c.g, c.b, c.a];
        LightUniform {
            position: vec4(self.position, self.light_type.shader_index()),
            direction: vec4(self.direction, self.radius),
            ambient: color(self.ambient),
            diffuse: color(self.diffuse),
            specular: color(self.specular),
            params: [
                self.attenuation,
                self.inner_cutoff.to_radians().cos(),
                self.outer_cutoff.to_radians().cos(),
                self.shadow_bias,
            ],
            shadow: [
                self.shadow_far_plane,
                self.shadow_slot.map_or(-1.0, |slot| slot as f32),
                self.directional_shadow_extent,
                if self.casts_shadows { 1.0 } else { 0.0 },
            ],
            light_space: self.light_space_matrix().to_cols_array_2d(),
        }
    }

    fn recompute_volume(&mut self) {
        self.radius = light_volume_radius(self.diffuse.max_channel(), self.attenuation);
        self.volume_transform = match self.light_type {
            LightType::Directional => Mat4::IDENTITY,
            LightType::Point => Mat4::from_scale_rotation_translation(
                Vec3::splat(self.radius),
                Quat::IDENTITY,
                self.position,
            ),
            LightType::Spot => {
                // The unit cone has its apex at the origin and opens along -Z.
                let base = self.radius * self.outer_cutoff.to_radians().tan();
                Mat4::from_scale_rotation_translation(
                    Vec3::new(base, base, self.radius),
                    Quat::from_rotation_arc(Vec3::NEG_Z, self.direction),
                    self.position,
                )
            }
        };
        self.ubo_dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radius_solves_attenuation_threshold() {
        for (light_max, attenuation) in [(1.0, 0.1), (0.5, 0.7), (2.0, 3.0), (1.0, 20.0)] {
            let r = light_volume_radius(light_max, attenuation);
            assert!(r <= MAX_LIGHT_RADIUS);
            assert_relative_eq!(
                1.0 + attenuation * r * r,
                light_max * 256.0 / 5.0,
                max_relative = 1e-4
            );
        }
    }

    #[test]
    fn radius_is_clamped() {
        assert_eq!(light_volume_radius(1.0, 0.0), MAX_LIGHT_RADIUS);
        assert_eq!(light_volume_radius(1.0, -1.0), MAX_LIGHT_RADIUS);
        assert_eq!(light_volume_radius(1.0, 1e-6), MAX_LIGHT_RADIUS);
        assert_eq!(light_volume_radius(0.0, 1.0), 0.0);
    }

    #[test]
    fn transform_changes_invalidate_shadow() {
        let mut light = LightComponent::new(LightType::Spot);
        let mut revision = light.shadow_revision();
        let changes: [fn(&mut LightComponent); 4] = [
            |l| l.set_position(Vec3::new(1.0, 2.0, 3.0)),
            |l| l.set_cutoffs(10.0, 20.0),
            |l| l.set_shadow_bias(0.01),
            |l| l.set_type(LightType::Point),
        ];
        for change in changes {
            change(&mut light);
            assert_ne!(light.shadow_revision(), revision);
            revision = light.shadow_revision();
        }
    }

    #[test]
    fn colour_changes_only_dirty_the_uniform() {
        let mut light = LightComponent::new(LightType::Point);
        let revision = light.shadow_revision();
        light.take_uniform();
        assert!(!light.is_ubo_dirty());

        light.set_colors(LinearRgba::BLACK, LinearRgba::rgb(0.2, 0.4, 0.1), LinearRgba::WHITE);
        assert!(light.is_ubo_dirty());
        assert_eq!(light.shadow_revision(), revision);
    }

    #[test]
    fn unchanged_position_keeps_the_shadow_revision() {
        let mut light = LightComponent::new(LightType::Point).with_position(Vec3::X);
        let revision = light.shadow_revision();
        light.set_position(Vec3::X);
        assert_eq!(light.shadow_revision(), revision);
    }

    #[test]
    fn point_volume_is_a_scaled_sphere() {
        let light = LightComponent::new(LightType::Point)
            .with_position(Vec3::new(0.0, 1.0, 0.0))
            .with_attenuation(1.0);
        let r = light.radius();
        let edge = light.volume_transform().transform_point3(Vec3::X);
        assert_relative_eq!(edge.x, r, epsilon = 1e-4);
        assert_relative_eq!(edge.y, 1.0, epsilon = 1e-4);
        assert!(light.volume_contains(Vec3::new(0.0, 1.0, 0.0), 0.0));
        assert!(!light.volume_contains(Vec3::new(r + 1.0, 1.0, 0.0), 0.0));
    }

    #[test]
    fn spot_volume_opens_along_direction() {
        let light = LightComponent::new(LightType::Spot).with_direction(Vec3::X);
        let tip = light.volume_transform().transform_point3(Vec3::NEG_Z);
        assert_relative_eq!(tip.x, light.radius(), epsilon = 1e-3);
        assert!(light.volume_contains(Vec3::X, 0.0));
        assert!(!light.volume_contains(Vec3::NEG_X, 0.0));
    }

    #[test]
    fn uniform_encodes_type_and_slot() {
        let mut light = LightComponent::new(LightType::Spot);
        light.set_shadow_slot(Some(3));
        let block = light.take_uniform();
        assert_eq!(block.position[3], 2.0);
        assert_eq!(block.shadow[1], 3.0);
        assert_eq!(std::mem::size_of::<LightUniform>(), 176);
    }
}
