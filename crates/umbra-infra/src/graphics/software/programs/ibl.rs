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

//! Precomputation of image-based lighting: cube map projection, irradiance,
//! prefiltered specular and the BRDF lookup table.

use super::{fullscreen_uv, fullscreen_vertex, hammersley, importance_sample_ggx, orthonormal_basis};
use crate::graphics::software::program::{
    FragmentInput, FragmentOutput, ShaderEnv, SoftwareProgram, Varyings, VertexInput,
};
use std::f32::consts::{FRAC_PI_2, PI, TAU};
use umbra_core::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
use umbra_core::renderer::ProgramSource;

/// Angular step of the irradiance integration, in radians.
const IRRADIANCE_STEP: f32 = 0.25;
const PREFILTER_SAMPLES: u32 = 32;
const BRDF_SAMPLES: u32 = 64;

/// The unit cube seen from its centre: the local position goes to varying 0
/// and the view loses its translation.
fn cube_vertex(env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
    varyings[0] = input.position.extend(0.0);
    let rotation = Mat4::from_mat3(Mat3::from_mat4(env.mat4("view")));
    env.mat4("projection") * rotation * input.position.extend(1.0)
}

fn cube_direction(varyings: &Varyings) -> Vec3 {
    varyings[0].truncate().normalize_or_zero()
}

/// Texture coordinates of `direction` on an equirectangular map.
fn equirect_uv(direction: Vec3) -> Vec2 {
    Vec2::new(
        direction.z.atan2(direction.x) / TAU + 0.5,
        direction.y.clamp(-1.0, 1.0).asin() / PI + 0.5,
    )
}

/// Equirectangular map to the faces of a cube map.
#[derive(Debug)]
struct EquirectToCubemap;

impl SoftwareProgram for EquirectToCubemap {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        cube_vertex(env, input, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let color = env.sampler("equirectangularMap").sample(equirect_uv(cube_direction(varyings)));
        Some(FragmentOutput::color(color.truncate().extend(1.0)))
    }
}

pub(crate) fn equirect_to_cubemap(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(EquirectToCubemap)
}

/// Cosine-weighted integration of the environment over the hemisphere.
#[derive(Debug)]
struct IrradianceConvolution;

impl SoftwareProgram for IrradianceConvolution {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        cube_vertex(env, input, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let normal = cube_direction(varyings);
        let (right, up) = orthonormal_basis(normal);
        let environment = env.sampler("environmentMap");
        let mut irradiance = Vec3::ZERO;
        let mut samples = 0u32;
        let mut phi = 0.0;
        while phi < TAU {
            let mut theta = 0.0;
            while theta < FRAC_PI_2 {
                let tangent = Vec3::new(theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos());
                let direction = right * tangent.x + up * tangent.y + normal * tangent.z;
                irradiance += environment.sample_cube(direction, 0.0).truncate() * theta.cos() * theta.sin();
                samples += 1;
                theta += IRRADIANCE_STEP;
            }
            phi += IRRADIANCE_STEP;
        }
        let irradiance = irradiance * PI / samples.max(1) as f32;
        Some(FragmentOutput::color(irradiance.extend(1.0)))
    }
}

pub(crate) fn irradiance_convolution(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(IrradianceConvolution)
}

/// GGX importance-sampled environment for the `roughness` uniform, under
/// the view equals normal assumption.
#[derive(Debug)]
struct Prefilter;

impl SoftwareProgram for Prefilter {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        cube_vertex(env, input, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let normal = cube_direction(varyings);
        let roughness = env.float("roughness").clamp(0.0, 1.0);
        let environment = env.sampler("environmentMap");
        if roughness <= 0.0 {
            let color = environment.sample_cube(normal, 0.0).truncate();
            return Some(FragmentOutput::color(color.extend(1.0)));
        }
        let (mut color, mut weight) = (Vec3::ZERO, 0.0);
        for i in 0..PREFILTER_SAMPLES {
            let half = importance_sample_ggx(hammersley(i, PREFILTER_SAMPLES), normal, roughness);
            let light = (half * 2.0 * normal.dot(half) - normal).normalize_or_zero();
            let n_dot_l = normal.dot(light);
            if n_dot_l > 0.0 {
                color += environment.sample_cube(light, 0.0).truncate() * n_dot_l;
                weight += n_dot_l;
            }
        }
        let color = if weight > 0.0 { color / weight } else { color };
        Some(FragmentOutput::color(color.extend(1.0)))
    }
}

pub(crate) fn prefilter(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(Prefilter)
}

fn geometry_schlick_ibl(n_dot: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    n_dot / (n_dot * (1.0 - k) + k)
}

/// The split-sum scale (`x`) and bias (`y`) applied to `F0` for a view
/// angle and roughness.
fn integrate_brdf(n_dot_v: f32, roughness: f32) -> Vec2 {
    let n_dot_v = n_dot_v.max(1e-4);
    let view = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let (mut scale, mut bias) = (0.0, 0.0);
    for i in 0..BRDF_SAMPLES {
        let half = importance_sample_ggx(hammersley(i, BRDF_SAMPLES), Vec3::Z, roughness);
        let light = (half * 2.0 * view.dot(half) - view).normalize_or_zero();
        let n_dot_l = light.z.max(0.0);
        let n_dot_h = half.z.max(0.0);
        let v_dot_h = view.dot(half).max(0.0);
        if n_dot_l > 0.0 {
            let g = geometry_schlick_ibl(n_dot_v, roughness) * geometry_schlick_ibl(n_dot_l, roughness);
            let visibility = g * v_dot_h / (n_dot_h * n_dot_v).max(1e-6);
            let fresnel = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fresnel) * visibility;
            bias += fresnel * visibility;
        }
    }
    Vec2::new(scale, bias) / BRDF_SAMPLES as f32
}

/// Fills the lookup table: `x` is the view angle cosine, `y` the roughness.
#[derive(Debug)]
struct BrdfIntegration;

impl SoftwareProgram for BrdfIntegration {
    fn vertex(&self, _: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        fullscreen_vertex(input, varyings)
    }

    fn fragment(&self, _: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let uv = fullscreen_uv(varyings);
        let brdf = integrate_brdf(uv.x, uv.y);
        Some(FragmentOutput::color(Vec4::new(brdf.x, brdf.y, 0.0, 1.0)))
    }
}

pub(crate) fn brdf_integration(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(BrdfIntegration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn equirect_poles_and_seam() {
        assert_relative_eq!(equirect_uv(Vec3::Y).y, 1.0);
        assert_relative_eq!(equirect_uv(-Vec3::Y).y, 0.0);
        assert_eq!(equirect_uv(Vec3::X), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn brdf_scale_and_bias_stay_below_one() {
        for roughness in [0.1, 0.5, 1.0] {
            for n_dot_v in [0.1, 0.5, 1.0] {
                let brdf = integrate_brdf(n_dot_v, roughness);
                assert!(brdf.x >= 0.0 && brdf.y >= 0.0);
                assert!(brdf.x + brdf.y <= 1.05);
            }
        }
    }

    #[test]
    fn smooth_head_on_reflection_keeps_everything() {
        let brdf = integrate_brdf(1.0, 0.05);
        assert_relative_eq!(brdf.x + brdf.y, 1.0, epsilon = 0.05);
    }
}
