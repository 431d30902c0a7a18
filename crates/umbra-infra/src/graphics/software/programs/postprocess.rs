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

//! Full-screen programs: blur, copy, tone mapping, ambient occlusion and the
//! anti-aliasing chain.

use super::{fullscreen_uv, fullscreen_vertex, luminance, orthonormal_basis};
use crate::graphics::software::program::{
    define_u32, FragmentInput, FragmentOutput, Sampler, ShaderEnv, SoftwareProgram, Varyings, VertexInput,
};
use umbra_core::math::{Mat3, Vec2, Vec3, Vec4};
use umbra_core::renderer::ProgramSource;

/// Luma difference above which the edge pass reports an edge.
const EDGE_THRESHOLD: f32 = 0.1;

/// Blend weight of each detected edge.
const EDGE_WEIGHT: f32 = 0.25;

/// Share of the reprojected history in the temporal resolve.
const HISTORY_WEIGHT: f32 = 0.5;

fn texel_size(sampler: &Sampler<'_>) -> Vec2 {
    let size = sampler.size(0);
    Vec2::new(1.0 / size.width.max(1) as f32, 1.0 / size.height.max(1) as f32)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Declares a full-screen program: the struct, its vertex stage and the
/// factory. The body receives the environment and the quad UV.
macro_rules! fullscreen_program {
    ($(#[$doc:meta])* $name:ident, $factory:ident, |$env:ident, $uv:ident| $body:block) => {
        $(#[$doc])*
        #[derive(Debug)]
        struct $name;

        impl SoftwareProgram for $name {
            fn vertex(&self, _: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
                fullscreen_vertex(input, varyings)
            }

            fn fragment(&self, $env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
                let $uv = fullscreen_uv(varyings);
                $body
            }
        }

        pub(crate) fn $factory(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
            Box::new($name)
        }
    };
}

fullscreen_program!(
    /// One direction of the separable blur. `weights` holds the centre tap
    /// then the taps on one side.
    GaussianBlur,
    gaussian_blur,
    |env, uv| {
        let source = env.sampler("source");
        let texel = texel_size(&source);
        let step = if env.flag("horizontal") { Vec2::new(texel.x, 0.0) } else { Vec2::new(0.0, texel.y) };
        let weights = env.floats("weights");
        let Some((centre, sides)) = weights.split_first() else {
            return Some(FragmentOutput::color(source.sample(uv)));
        };
        let mut color = source.sample(uv) * *centre;
        for (i, weight) in sides.iter().enumerate() {
            let offset = step * (i + 1) as f32;
            color += (source.sample(uv + offset) + source.sample(uv - offset)) * *weight;
        }
        Some(FragmentOutput::color(color))
    }
);

fullscreen_program!(
    /// Copies `source`.
    CopySource,
    copy,
    |env, uv| { Some(FragmentOutput::color(env.sampler("source").sample(uv))) }
);

/// Reinhard, per channel.
fn reinhard(color: Vec3) -> Vec3 {
    color / (color + Vec3::ONE)
}

/// Narkowicz's fit of the ACES filmic curve.
fn aces(color: Vec3) -> Vec3 {
    let numerator = color * (color * 2.51 + Vec3::splat(0.03));
    let denominator = color * (color * 2.43 + Vec3::splat(0.59)) + Vec3::splat(0.14);
    (numerator / denominator).clamp(Vec3::ZERO, Vec3::ONE)
}

fullscreen_program!(
    /// Exposure, tone mapping operator and monitor gamma.
    Tonemap,
    tonemap,
    |env, uv| {
        let hdr = env.sampler("source").sample(uv).truncate() * env.float("exposure");
        let mapped = match env.int("toneMapping") {
            1 => aces(hdr.max(Vec3::ZERO)),
            _ => reinhard(hdr.max(Vec3::ZERO)),
        };
        let gamma = env.float("gamma");
        let corrected = if gamma > 0.0 { mapped.powf(1.0 / gamma) } else { mapped };
        Some(FragmentOutput::color(corrected.extend(1.0)))
    }
);

/// Hemisphere-sampled ambient occlusion in view space.
#[derive(Debug)]
struct Ssao {
    kernel_size: usize,
}

impl SoftwareProgram for Ssao {
    fn vertex(&self, _: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        fullscreen_vertex(input, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let uv = fullscreen_uv(varyings);
        let positions = env.sampler("gPosition");
        let world = positions.sample(uv);
        let samples = env.vec3s("samples");
        let count = if self.kernel_size == 0 { samples.len() } else { self.kernel_size.min(samples.len()) };
        if world.w <= 0.0 || count == 0 {
            return Some(FragmentOutput::color(Vec4::ONE));
        }

        let view = env.mat4("view");
        let projection = env.mat4("projection");
        let (radius, bias) = (env.float("radius"), env.float("bias"));
        let position = (view * world.truncate().extend(1.0)).truncate();
        let normal = (Mat3::from_mat4(view) * env.sampler("gNormal").sample(uv).truncate()).normalize_or_zero();
        let random = env.sampler("noise").sample(uv * env.vec2("noiseScale")).truncate();
        let tangent = (random - normal * normal.dot(random)).normalize_or_zero();
        let tangent = if tangent == Vec3::ZERO { orthonormal_basis(normal).0 } else { tangent };
        let tbn = Mat3::from_cols(tangent, normal.cross(tangent), normal);

        let mut occlusion = 0.0;
        for sample in &samples[..count] {
            let point = position + tbn * *sample * radius;
            let clip = projection * point.extend(1.0);
            if clip.w <= f32::EPSILON {
                continue;
            }
            let screen = clip.truncate().truncate() / clip.w * 0.5 + Vec2::splat(0.5);
            let occluder = positions.sample(screen);
            if occluder.w <= 0.0 {
                continue;
            }
            let depth = (view * occluder.truncate().extend(1.0)).z;
            let range = smoothstep(0.0, 1.0, radius / (position.z - depth).abs().max(1e-4));
            if depth >= point.z + bias {
                occlusion += range;
            }
        }
        let ambient = 1.0 - occlusion / count as f32;
        Some(FragmentOutput::color(Vec4::new(ambient, ambient, ambient, 1.0)))
    }
}

pub(crate) fn ssao(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(Ssao {
        kernel_size: define_u32(source, "KERNEL_SIZE") as usize,
    })
}

fn luma_at(sampler: &Sampler<'_>, uv: Vec2) -> f32 {
    luminance(sampler.sample(uv).truncate())
}

fullscreen_program!(
    /// Luma edges against the left (`x`) and bottom (`y`) neighbours.
    SmaaEdge,
    smaa_edge,
    |env, uv| {
        let source = env.sampler("source");
        let texel = env.vec2("texelSize");
        let luma = luma_at(&source, uv);
        let left = (luma - luma_at(&source, uv - Vec2::new(texel.x, 0.0))).abs();
        let bottom = (luma - luma_at(&source, uv - Vec2::new(0.0, texel.y))).abs();
        let edge = |delta: f32| if delta > EDGE_THRESHOLD { 1.0 } else { 0.0 };
        Some(FragmentOutput::color(Vec4::new(edge(left), edge(bottom), 0.0, 1.0)))
    }
);

fullscreen_program!(
    /// How much each neighbour (left, bottom, right, top) bleeds into a pixel.
    SmaaWeights,
    smaa_weights,
    |env, uv| {
        let edges = env.sampler("source");
        let texel = env.vec2("texelSize");
        let own = edges.sample(uv);
        let right = edges.sample(uv + Vec2::new(texel.x, 0.0)).x;
        let top = edges.sample(uv + Vec2::new(0.0, texel.y)).y;
        Some(FragmentOutput::color(Vec4::new(own.x, own.y, right, top) * EDGE_WEIGHT))
    }
);

fullscreen_program!(
    /// Mixes each pixel with its neighbours by the blend weights.
    SmaaBlend,
    smaa_blend,
    |env, uv| {
        let source = env.sampler("source");
        let weights = env.sampler("auxiliary").sample(uv);
        let texel = env.vec2("texelSize");
        let neighbours = [
            Vec2::new(-texel.x, 0.0),
            Vec2::new(0.0, -texel.y),
            Vec2::new(texel.x, 0.0),
            Vec2::new(0.0, texel.y),
        ];
        let mut color = source.sample(uv);
        let mut total = 1.0;
        for (offset, weight) in neighbours.into_iter().zip(weights.to_array()) {
            color += source.sample(uv + offset) * weight;
            total += weight;
        }
        Some(FragmentOutput::color(color / total))
    }
);

/// Blends the current frame with the previous one reprojected by the
/// velocity, the history clamped to the current neighbourhood.
#[derive(Debug)]
struct SmaaResolve {
    history_weight: f32,
}

impl SoftwareProgram for SmaaResolve {
    fn vertex(&self, _: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        fullscreen_vertex(input, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let uv = fullscreen_uv(varyings);
        let current = env.sampler("source");
        let texel = env.vec2("texelSize");
        let color = current.sample(uv);
        let velocity = env.sampler("extra").sample(uv).truncate().truncate();
        let previous = env.sampler("auxiliary").sample(uv - velocity);

        let (mut low, mut high) = (color, color);
        for y in -1..=1 {
            for x in -1..=1 {
                let neighbour = current.sample(uv + Vec2::new(x as f32, y as f32) * texel);
                low = low.min(neighbour);
                high = high.max(neighbour);
            }
        }
        let history = previous.clamp(low, high);
        Some(FragmentOutput::color(color.lerp(history, self.history_weight)))
    }
}

pub(crate) fn smaa_resolve(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    let history_weight = if define_u32(source, "SMAA_T2X") != 0 { HISTORY_WEIGHT } else { 0.0 };
    Box::new(SmaaResolve { history_weight })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reinhard_and_aces_stay_in_range() {
        for value in [0.0, 0.5, 1.0, 8.0, 1000.0] {
            let color = Vec3::splat(value);
            assert!(reinhard(color).x < 1.0);
            assert!((0.0..=1.0).contains(&aces(color).x));
        }
        assert_relative_eq!(reinhard(Vec3::ONE).x, 0.5);
    }

    #[test]
    fn smoothstep_is_clamped() {
        assert_eq!(smoothstep(0.0, 1.0, -2.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 3.0), 1.0);
        assert_relative_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    }

    #[test]
    fn resolve_ignores_history_without_t2x() {
        assert_eq!(format!("{:?}", smaa_resolve(&ProgramSource::builtin("smaa_resolve"))), "SmaaResolve { history_weight: 0.0 }");
    }
}
