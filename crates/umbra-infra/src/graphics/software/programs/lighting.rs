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

//! Light evaluation, shadow lookups and the deferred lighting programs.

use super::{bright, fresnel_schlick, fresnel_schlick_roughness, object_space, skinned};
use crate::graphics::software::program::{
    define_u32, FragmentInput, FragmentOutput, ShaderEnv, SoftwareProgram, Varyings, VertexInput,
};
use std::f32::consts::PI;
use umbra_core::math::{Mat4, Vec2, Vec3, Vec4};
use umbra_core::renderer::{LightUniform, ProgramSource};

/// The lighting model, from the `SHADING` define.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shading {
    FullLit,
    Phong,
    CookTorrance,
}

impl Shading {
    pub fn from_source(source: &ProgramSource) -> Self {
        match define_u32(source, "SHADING") {
            0 => Shading::FullLit,
            1 => Shading::Phong,
            _ => Shading::CookTorrance,
        }
    }
}

/// Everything the lighting models need to know about a shaded point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Surface {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
    pub specular: f32,
    pub shininess: f32,
    pub roughness: f32,
    pub metallic: f32,
    pub ao: f32,
}

fn rgb(value: [f32; 4]) -> Vec3 {
    Vec3::new(value[0], value[1], value[2])
}

/// Direction to the light and how much of it reaches `position`: the
/// inverse-square attenuation windowed to zero at the volume radius, and the
/// cone falloff of spot lights.
fn incidence(light: &LightUniform, position: Vec3) -> (Vec3, f32) {
    let direction = rgb(light.direction).normalize_or_zero();
    if light.position[3] < 0.5 {
        return (-direction, 1.0);
    }
    let offset = rgb(light.position) - position;
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return (Vec3::ZERO, 1.0);
    }
    let to_light = offset / distance;
    let radius = light.direction[3];
    let window = if radius > 0.0 {
        (1.0 - (distance / radius).powi(4)).clamp(0.0, 1.0).powi(2)
    } else {
        0.0
    };
    let attenuation = window / (1.0 + light.params[0] * distance * distance);
    let cone = if light.position[3] > 1.5 {
        let (inner, outer) = (light.params[1], light.params[2]);
        let theta = to_light.dot(-direction);
        ((theta - outer) / (inner - outer).max(1e-4)).clamp(0.0, 1.0)
    } else {
        1.0
    };
    (to_light, attenuation * cone)
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a2 = (roughness * roughness).powi(2);
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom).max(1e-6)
}

fn geometry_schlick_ggx(n_dot: f32, k: f32) -> f32 {
    n_dot / (n_dot * (1.0 - k) + k)
}

/// Smith's shadowing-masking with the direct-lighting `k`.
fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = (roughness + 1.0).powi(2) / 8.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

/// The radiance one light sends from `surface` towards `view_pos`.
/// `shadow` is the occluded fraction in `[0, 1]`.
pub(crate) fn shade_light(light: &LightUniform, surface: &Surface, view_pos: Vec3, shading: Shading, shadow: f32) -> Vec3 {
    if shading == Shading::FullLit {
        return surface.albedo;
    }
    let (l, falloff) = incidence(light, surface.position);
    let n = surface.normal;
    let v = (view_pos - surface.position).normalize_or_zero();
    let ambient = rgb(light.ambient) * surface.albedo * surface.ao * falloff;
    let lit = 1.0 - shadow;
    let n_dot_l = n.dot(l).max(0.0);
    match shading {
        Shading::Phong => {
            let h = (l + v).normalize_or_zero();
            let spec = n.dot(h).max(0.0).powf(surface.shininess.max(1.0));
            let diffuse = rgb(light.diffuse) * surface.albedo * n_dot_l;
            let specular = rgb(light.specular) * surface.specular * spec;
            ambient + (diffuse + specular) * falloff * lit
        }
        _ => {
            let h = (l + v).normalize_or_zero();
            let n_dot_v = n.dot(v).max(1e-4);
            let f0 = Vec3::splat(0.04).lerp(surface.albedo, surface.metallic);
            let f = fresnel_schlick(h.dot(v).max(0.0), f0);
            let d = distribution_ggx(n.dot(h).max(0.0), surface.roughness);
            let g = geometry_smith(n_dot_v, n_dot_l, surface.roughness);
            let specular = f * (d * g / (4.0 * n_dot_v * n_dot_l).max(1e-4));
            let k_d = (Vec3::ONE - f) * (1.0 - surface.metallic);
            let radiance = rgb(light.diffuse) * falloff;
            ambient + (k_d * surface.albedo / PI + specular) * radiance * n_dot_l * lit
        }
    }
}

/// The occluded fraction of a light at `position`, 0 when shadows are off
/// or the light has no shadow map.
pub(crate) fn shadow(env: &ShaderEnv<'_>, light: &LightUniform, position: Vec3, normal: Vec3) -> f32 {
    let [far, slot, _, casts] = light.shadow;
    if !env.flag("shadowsEnabled") || casts < 0.5 || slot < 0.0 {
        return 0.0;
    }
    let slot = slot as u32;
    let bias = light.params[3];
    if light.position[3] > 0.5 && light.position[3] < 1.5 {
        let offset = position - rgb(light.position);
        let closest = env.sampler("shadowCubemaps").sample_cube_array(offset, slot, 0.0).x * far;
        return if offset.length() - bias * far > closest { 1.0 } else { 0.0 };
    }

    let clip = Mat4::from_cols_array_2d(&light.light_space) * position.extend(1.0);
    if clip.w.abs() <= f32::EPSILON {
        return 0.0;
    }
    let ndc = clip.truncate() / clip.w;
    let depth = ndc.z * 0.5 + 0.5;
    if depth > 1.0 {
        return 0.0;
    }
    let uv = ndc.truncate() * 0.5 + Vec2::splat(0.5);
    let (l, _) = incidence(light, position);
    let bias = (bias * 10.0 * (1.0 - normal.dot(l))).max(bias);
    let maps = env.sampler("shadowMaps");
    let size = maps.size(0);
    let texel = Vec2::new(1.0 / size.width as f32, 1.0 / size.height as f32);
    let mut occluded = 0.0;
    for y in -1..=1 {
        for x in -1..=1 {
            let stored = maps.sample_layer(uv + Vec2::new(x as f32, y as f32) * texel, slot).x;
            if depth - bias > stored {
                occluded += 1.0;
            }
        }
    }
    occluded / 9.0
}

/// Sums every light of the lights block at `surface`.
pub(crate) fn shade_all(env: &ShaderEnv<'_>, surface: &Surface, view_pos: Vec3, shading: Shading) -> Vec3 {
    if shading == Shading::FullLit {
        return surface.albedo;
    }
    (0..env.light_count())
        .filter_map(|index| env.light(index))
        .map(|light| {
            let occluded = shadow(env, &light, surface.position, surface.normal);
            shade_light(&light, surface, view_pos, shading, occluded)
        })
        .sum()
}

/// The G-buffer texels under a fragment. `None` where no geometry was drawn.
fn gbuffer_surface(env: &ShaderEnv<'_>, input: &FragmentInput) -> Option<Surface> {
    let mut screen = env.vec2("screenSize");
    if screen.x <= 0.0 || screen.y <= 0.0 {
        screen = Vec2::new(env.viewport.width as f32, env.viewport.height as f32);
    }
    let uv = input.frag_coord.truncate() / screen;
    let position = env.sampler("gPosition").sample(uv);
    if position.w <= 0.0 {
        return None;
    }
    let albedo_spec = env.sampler("gAlbedoSpec").sample(uv);
    let normal = env.sampler("gNormal").sample(uv);
    let pbr = env.sampler("gPbr").sample(uv);
    let occlusion = if env.flag("ssaoEnabled") {
        env.sampler("ssaoMap").sample(uv).x
    } else {
        1.0
    };
    Some(Surface {
        position: position.truncate(),
        normal: normal.truncate().normalize_or_zero(),
        albedo: albedo_spec.truncate(),
        specular: albedo_spec.w,
        shininess: normal.w,
        roughness: pbr.x,
        metallic: pbr.y,
        ao: pbr.z * occlusion,
    })
}

fn volume_vertex(env: &ShaderEnv<'_>, input: &VertexInput) -> Vec4 {
    env.mat4("mvp") * input.position.extend(1.0)
}

/// Only there to be depth tested, the stencil does the work.
#[derive(Debug)]
struct StencilMark;

impl SoftwareProgram for StencilMark {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, _: &mut Varyings) -> Vec4 {
        volume_vertex(env, input)
    }

    fn fragment(&self, _: &ShaderEnv<'_>, _: &FragmentInput, _: &Varyings) -> Option<FragmentOutput> {
        Some(FragmentOutput::default())
    }
}

pub(crate) fn stencil_mark(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(StencilMark)
}

/// Shades the G-buffer with light `lightIndex`.
#[derive(Debug)]
struct LightVolume {
    shading: Shading,
}

impl SoftwareProgram for LightVolume {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, _: &mut Varyings) -> Vec4 {
        volume_vertex(env, input)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, input: &FragmentInput, _: &Varyings) -> Option<FragmentOutput> {
        let surface = gbuffer_surface(env, input)?;
        let light = env.light(env.int("lightIndex").max(0) as usize)?;
        let occluded = shadow(env, &light, surface.position, surface.normal);
        let color = shade_light(&light, &surface, env.vec3("viewPos"), self.shading, occluded).extend(1.0);
        Some(FragmentOutput::color(color).with(1, bright(color)))
    }
}

pub(crate) fn light_volume(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(LightVolume {
        shading: Shading::from_source(source),
    })
}

/// Adds the image-based lighting of probe `probeIndex`.
#[derive(Debug)]
struct IblProbe;

impl SoftwareProgram for IblProbe {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, _: &mut Varyings) -> Vec4 {
        volume_vertex(env, input)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, input: &FragmentInput, _: &Varyings) -> Option<FragmentOutput> {
        let surface = gbuffer_surface(env, input)?;
        let radius = env.float("probeRadius");
        let weight = if radius.is_finite() {
            let distance = surface.position.distance(env.vec3("probePosition"));
            (1.0 - (distance / radius.max(1e-4)).powi(4)).clamp(0.0, 1.0).powi(2)
        } else {
            1.0
        };
        if weight <= 0.0 {
            return None;
        }
        let probe = env.int("probeIndex").max(0) as u32;
        let n = surface.normal;
        let v = (env.vec3("viewPos") - surface.position).normalize_or_zero();
        let r = (-v - 2.0 * (-v).dot(n) * n).normalize_or_zero();
        let n_dot_v = n.dot(v).max(0.0);

        let f0 = Vec3::splat(0.04).lerp(surface.albedo, surface.metallic);
        let f = fresnel_schlick_roughness(n_dot_v, f0, surface.roughness);
        let k_d = (Vec3::ONE - f) * (1.0 - surface.metallic);
        let irradiance = env.sampler("irradianceMaps").sample_cube_array(n, probe, 0.0).truncate();
        let prefilter = env.sampler("prefilterMaps");
        let max_lod = prefilter.mip_levels().saturating_sub(1) as f32;
        let prefiltered = prefilter.sample_cube_array(r, probe, surface.roughness * max_lod).truncate();
        let brdf = env.sampler("brdfLut").sample(Vec2::new(n_dot_v, surface.roughness));
        let specular = prefiltered * (f * brdf.x + Vec3::splat(brdf.y));
        let ambient = (k_d * irradiance * surface.albedo + specular) * surface.ao * weight;
        let color = ambient.extend(1.0);
        Some(FragmentOutput::color(color).with(1, bright(color)))
    }
}

pub(crate) fn ibl_probe(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(IblProbe)
}

/// Depth only, for directional and spot shadow maps.
#[derive(Debug)]
struct ShadowDepth {
    skinned: bool,
}

impl SoftwareProgram for ShadowDepth {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, _: &mut Varyings) -> Vec4 {
        let (position, _, _) = object_space(env, input, self.skinned);
        env.mat4("mvp") * position
    }

    fn fragment(&self, _: &ShaderEnv<'_>, _: &FragmentInput, _: &Varyings) -> Option<FragmentOutput> {
        Some(FragmentOutput::default())
    }
}

pub(crate) fn shadow_depth(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(ShadowDepth {
        skinned: skinned(source),
    })
}

/// Distance to the light over the far plane, for point-light cube maps.
#[derive(Debug)]
struct ShadowLinearDepth {
    skinned: bool,
}

impl SoftwareProgram for ShadowLinearDepth {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        let (position, _, _) = object_space(env, input, self.skinned);
        varyings[0] = env.mat4("model") * position;
        env.mat4("mvp") * position
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let far = env.float("farPlane");
        if far <= 0.0 {
            return None;
        }
        let distance = varyings[0].truncate().distance(env.vec3("lightPosition"));
        Some(FragmentOutput::default().with_depth(distance / far))
    }

    fn writes_depth(&self) -> bool {
        true
    }
}

pub(crate) fn shadow_linear_depth(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(ShadowLinearDepth {
        skinned: skinned(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use umbra_core::renderer::{LightComponent, LightType};

    fn surface() -> Surface {
        Surface {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            albedo: Vec3::ONE,
            specular: 0.5,
            shininess: 32.0,
            roughness: 0.5,
            metallic: 0.0,
            ao: 1.0,
        }
    }

    #[test]
    fn point_lights_stop_at_their_radius() {
        let light = LightComponent::new(LightType::Point).with_position(Vec3::new(0.0, 1.0, 0.0));
        let uniform = light.uniform();
        let radius = uniform.direction[3];
        let near = shade_light(&uniform, &surface(), Vec3::Y, Shading::Phong, 0.0);
        let mut far_surface = surface();
        far_surface.position = Vec3::new(radius + 1.0, 1.0, 0.0);
        let far = shade_light(&uniform, &far_surface, Vec3::Y, Shading::Phong, 0.0);
        assert!(near.x > 0.0);
        assert_eq!(far, Vec3::ZERO);
    }

    #[test]
    fn shadowed_points_keep_only_ambient() {
        let uniform = LightComponent::new(LightType::Directional)
            .with_direction(Vec3::NEG_Y)
            .uniform();
        let lit = shade_light(&uniform, &surface(), Vec3::Y, Shading::CookTorrance, 0.0);
        let shadowed = shade_light(&uniform, &surface(), Vec3::Y, Shading::CookTorrance, 1.0);
        assert!(lit.x > shadowed.x);
        assert_relative_eq!(shadowed.x, uniform.ambient[0], epsilon = 1e-6);
    }

    #[test]
    fn full_lit_returns_the_albedo() {
        let uniform = LightComponent::new(LightType::Point).uniform();
        let mut s = surface();
        s.albedo = Vec3::new(0.2, 0.4, 0.6);
        assert_eq!(shade_light(&uniform, &s, Vec3::Y, Shading::FullLit, 1.0), s.albedo);
    }

    #[test]
    fn spot_cones_cut_off_outside_the_outer_angle() {
        let uniform = LightComponent::new(LightType::Spot)
            .with_position(Vec3::new(0.0, 2.0, 0.0))
            .with_direction(Vec3::NEG_Y)
            .uniform();
        let (_, below) = incidence(&uniform, Vec3::ZERO);
        let (_, aside) = incidence(&uniform, Vec3::new(2.0, 1.9, 0.0));
        assert!(below > 0.0);
        assert_eq!(aside, 0.0);
    }
}
