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

//! The built-in programs of the software device, one per source name the
//! renderer asks for.
//!
//! Each program reads the same uniforms, samplers, blocks and defines as its
//! GLSL counterpart and writes the same outputs, so the passes cannot tell
//! the two devices apart.

mod ibl;
mod lighting;
mod material;
mod postprocess;

use super::program::{define_u32, ProgramFactory, ShaderEnv, VertexInput, Varyings};
use umbra_core::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use umbra_core::renderer::ProgramSource;

/// Luminance above which a colour also goes to the bright buffer.
pub(crate) const BRIGHT_THRESHOLD: f32 = 1.0;

/// Every built-in program with the source name it answers to.
pub fn builtin() -> Vec<(&'static str, ProgramFactory)> {
    vec![
        ("forward_unlit", material::forward_unlit),
        ("forward_lit", material::forward_lit),
        ("gbuffer", material::gbuffer),
        ("debug_lines", material::debug_lines),
        ("stencil_mark", lighting::stencil_mark),
        ("light_volume", lighting::light_volume),
        ("ibl_probe", lighting::ibl_probe),
        ("shadow_depth", lighting::shadow_depth),
        ("shadow_linear_depth", lighting::shadow_linear_depth),
        ("gaussian_blur", postprocess::gaussian_blur),
        ("copy", postprocess::copy),
        ("tonemap", postprocess::tonemap),
        ("ssao", postprocess::ssao),
        ("smaa_edge", postprocess::smaa_edge),
        ("smaa_weights", postprocess::smaa_weights),
        ("smaa_blend", postprocess::smaa_blend),
        ("smaa_resolve", postprocess::smaa_resolve),
        ("equirect_to_cubemap", ibl::equirect_to_cubemap),
        ("irradiance_convolution", ibl::irradiance_convolution),
        ("prefilter", ibl::prefilter),
        ("brdf_integration", ibl::brdf_integration),
    ]
}

/// Rec. 709 luminance.
pub(crate) fn luminance(color: Vec3) -> f32 {
    color.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// What a lit colour contributes to the bright buffer.
pub(crate) fn bright(color: Vec4) -> Vec4 {
    if luminance(color.truncate()) > BRIGHT_THRESHOLD {
        color.truncate().extend(1.0)
    } else {
        Vec4::W
    }
}

/// Whether the program was built with `SKINNED` set.
pub(crate) fn skinned(source: &ProgramSource) -> bool {
    define_u32(source, "SKINNED") != 0
}

/// The skinning matrix of a vertex: its bones blended by weight, read from
/// the bones block at `boneOffset`. Unweighted vertices are not moved.
pub(crate) fn skin_matrix(env: &ShaderEnv<'_>, input: &VertexInput) -> Mat4 {
    let offset = env.int("boneOffset").max(0) as usize;
    let total: f32 = input.bone_weights.iter().sum();
    if total <= 0.0 {
        return Mat4::IDENTITY;
    }
    input
        .bone_ids
        .iter()
        .zip(input.bone_weights)
        .filter(|(_, weight)| *weight > 0.0)
        .fold(Mat4::ZERO, |acc, (id, weight)| acc + env.bone(offset + *id as usize) * weight)
}

/// The object-space position, normal and tangent of a vertex, skinned when
/// `skinned` is set.
pub(crate) fn object_space(env: &ShaderEnv<'_>, input: &VertexInput, skinned: bool) -> (Vec4, Vec3, Vec3) {
    let position = input.position.extend(1.0);
    if !skinned {
        return (position, input.normal, input.tangent);
    }
    let skin = skin_matrix(env, input);
    let linear = Mat3::from_mat4(skin);
    (skin * position, linear * input.normal, linear * input.tangent)
}

/// Passes a full-screen quad through and writes its UV to varying 0.
pub(crate) fn fullscreen_vertex(input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
    let uv = input.position.truncate() * 0.5 + Vec2::splat(0.5);
    varyings[0] = uv.extend(0.0).extend(0.0);
    input.position.extend(1.0)
}

/// The UV a full-screen vertex wrote.
pub(crate) fn fullscreen_uv(varyings: &Varyings) -> Vec2 {
    varyings[0].truncate().truncate()
}

/// Schlick's approximation of the Fresnel term.
pub(crate) fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Schlick's Fresnel with the roughness-limited grazing reflectance of
/// image-based lighting.
pub(crate) fn fresnel_schlick_roughness(cos_theta: f32, f0: Vec3, roughness: f32) -> Vec3 {
    let grazing = Vec3::splat(1.0 - roughness).max(f0);
    f0 + (grazing - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// The `i`-th of `n` points of the Hammersley set.
pub(crate) fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, i.reverse_bits() as f32 * 2.328_306_4e-10)
}

/// A GGX-distributed half vector around `normal`.
pub(crate) fn importance_sample_ggx(xi: Vec2, normal: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = std::f32::consts::TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).max(0.0).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    let (tangent, bitangent) = orthonormal_basis(normal);
    (tangent * h.x + bitangent * h.y + normal * h.z).normalize_or_zero()
}

/// Two unit vectors completing `normal` into an orthonormal basis.
pub(crate) fn orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(normal).normalize_or_zero();
    (tangent, normal.cross(tangent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::software::program::UniformSlot;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn bright_keeps_only_overexposed_colors() {
        assert_eq!(bright(Vec4::new(0.5, 0.5, 0.5, 1.0)), Vec4::W);
        assert_eq!(bright(Vec4::new(4.0, 4.0, 4.0, 0.5)), Vec4::new(4.0, 4.0, 4.0, 1.0));
    }

    #[test]
    fn missing_bones_leave_vertices_in_place() {
        let uniforms = HashMap::from([("boneOffset".to_string(), UniformSlot::Int(3))]);
        let (textures, units, blocks) = (HashMap::new(), HashMap::new(), HashMap::new());
        let env = ShaderEnv {
            uniforms: &uniforms,
            textures: &textures,
            units: &units,
            blocks: &blocks,
            viewport: umbra_core::math::Extent2D::square(1),
        };
        let input = VertexInput {
            position: Vec3::new(1.0, 2.0, 3.0),
            normal: Vec3::Y,
            uv: Vec2::ZERO,
            tangent: Vec3::X,
            bone_ids: [0, 1, 0, 0],
            bone_weights: [0.25, 0.75, 0.0, 0.0],
            color: Vec4::ONE,
        };
        let (position, normal, _) = object_space(&env, &input, true);
        assert_relative_eq!(position.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(position.z, 3.0, epsilon = 1e-6);
        assert_relative_eq!(normal.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn ggx_samples_stay_in_the_hemisphere() {
        for i in 0..16 {
            let h = importance_sample_ggx(hammersley(i, 16), Vec3::Y, 0.7);
            assert!(h.y >= -1e-5);
            assert_relative_eq!(h.length(), 1.0, epsilon = 1e-4);
        }
    }
}
