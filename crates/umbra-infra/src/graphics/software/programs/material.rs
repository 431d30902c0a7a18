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

//! Programs drawing meshes with their material: the forward programs, the
//! geometry pass and the debug lines.

use super::lighting::{shade_all, Shading, Surface};
use super::{bright, object_space, skinned};
use crate::graphics::software::program::{
    define_u32, FragmentInput, FragmentOutput, ShaderEnv, SoftwareProgram, Varyings, VertexInput,
};
use umbra_core::math::{Mat3, Vec2, Vec3, Vec4};
use umbra_core::renderer::{ProgramSource, GBUFFER_VELOCITY};

/// Varyings 0 to 2: world position, normal and tangent, with the UV packed
/// in the `w` of the first two.
fn material_vertex(env: &ShaderEnv<'_>, input: &VertexInput, skinned: bool, varyings: &mut Varyings) -> Vec4 {
    let (position, normal, tangent) = object_space(env, input, skinned);
    let model = env.mat4("model");
    let world = model * position;
    let normal = env.mat3("normalMatrix") * normal;
    let tangent = Mat3::from_mat4(model) * tangent;
    varyings[0] = world.truncate().extend(input.uv.x);
    varyings[1] = normal.extend(input.uv.y);
    varyings[2] = tangent.extend(0.0);
    env.mat4("mvp") * position
}

/// A material sampled at one fragment.
#[derive(Debug, Clone, Copy)]
struct MaterialSample {
    albedo: Vec4,
    surface: Surface,
}

/// Steep parallax mapping with a final linear refinement. Depth maps store
/// heights: white is the surface, black the deepest point.
fn parallax_uv(env: &ShaderEnv<'_>, uv: Vec2, view_tangent: Vec3, steps: u32) -> Vec2 {
    let scale = env.float("material.depthScale");
    if steps == 0 || scale <= 0.0 || view_tangent.z <= 1e-3 {
        return uv;
    }
    let depth_map = env.sampler("material.depthMap");
    let depth_at = |uv: Vec2| 1.0 - depth_map.sample(uv).x;
    let layer = 1.0 / steps as f32;
    let delta = view_tangent.truncate() / view_tangent.z * scale * layer;
    let (mut current, mut layer_depth) = (uv, 0.0);
    let mut depth = depth_at(current);
    let mut previous = (current, depth, layer_depth);
    for _ in 0..steps {
        if layer_depth >= depth {
            break;
        }
        previous = (current, depth, layer_depth);
        current -= delta;
        depth = depth_at(current);
        layer_depth += layer;
    }
    let (previous_uv, previous_depth, previous_layer) = previous;
    let after = depth - layer_depth;
    let before = previous_depth - previous_layer;
    let denom = after - before;
    if denom.abs() <= f32::EPSILON {
        return current;
    }
    let weight = after / denom;
    previous_uv * weight + current * (1.0 - weight)
}

fn sample_material(env: &ShaderEnv<'_>, varyings: &Varyings, parallax_steps: u32) -> MaterialSample {
    let position = varyings[0].truncate();
    let mut uv = Vec2::new(varyings[0].w, varyings[1].w);
    let mut normal = varyings[1].truncate().normalize_or_zero();
    let raw_tangent = varyings[2].truncate();
    let tangent = (raw_tangent - normal * normal.dot(raw_tangent)).normalize_or_zero();
    let bitangent = normal.cross(tangent);

    if parallax_steps > 0 && tangent != Vec3::ZERO {
        let view = (env.vec3("viewPos") - position).normalize_or_zero();
        let view_tangent = Vec3::new(view.dot(tangent), view.dot(bitangent), view.dot(normal));
        uv = parallax_uv(env, uv, view_tangent, parallax_steps);
    }
    if env.flag("material.normalMapping") && tangent != Vec3::ZERO {
        let mapped = env.sampler("material.normalMap").sample(uv).truncate() * 2.0 - Vec3::ONE;
        normal = (tangent * mapped.x + bitangent * mapped.y + normal * mapped.z).normalize_or_zero();
    }

    let albedo = env.vec4("material.albedo") * env.sampler("material.diffuseMap").sample(uv);
    let specular = env.float("material.specular") * env.sampler("material.specularMap").sample(uv).x;
    let pbr = env.vec3("material.pbr");
    MaterialSample {
        albedo,
        surface: Surface {
            position,
            normal,
            albedo: albedo.truncate(),
            specular,
            shininess: env.float("material.shininess"),
            roughness: pbr.x.clamp(0.04, 1.0),
            metallic: pbr.y.clamp(0.0, 1.0),
            ao: pbr.z,
        },
    }
}

/// The material albedo, no lighting.
#[derive(Debug)]
struct ForwardUnlit {
    skinned: bool,
}

impl SoftwareProgram for ForwardUnlit {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        material_vertex(env, input, self.skinned, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let color = sample_material(env, varyings, 0).albedo;
        Some(FragmentOutput::color(color).with(1, bright(color)))
    }
}

pub(crate) fn forward_unlit(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(ForwardUnlit {
        skinned: skinned(source),
    })
}

/// Every light of the lights block, with shadows.
#[derive(Debug)]
struct ForwardLit {
    skinned: bool,
    shading: Shading,
}

impl SoftwareProgram for ForwardLit {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        material_vertex(env, input, self.skinned, varyings)
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let sample = sample_material(env, varyings, 0);
        let lit = shade_all(env, &sample.surface, env.vec3("viewPos"), self.shading);
        let color = lit.extend(sample.albedo.w);
        Some(FragmentOutput::color(color).with(1, bright(color)))
    }
}

pub(crate) fn forward_lit(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(ForwardLit {
        skinned: skinned(source),
        shading: Shading::from_source(source),
    })
}

/// Fills the G-buffer, and the velocity target when `TEMPORAL` is set.
#[derive(Debug)]
struct Gbuffer {
    skinned: bool,
    parallax_steps: u32,
    temporal: bool,
}

impl SoftwareProgram for Gbuffer {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        let clip = material_vertex(env, input, self.skinned, varyings);
        if self.temporal {
            let (position, _, _) = object_space(env, input, self.skinned);
            varyings[3] = clip;
            varyings[4] = env.mat4("previousMvp") * position;
        }
        clip
    }

    fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        let sample = sample_material(env, varyings, self.parallax_steps);
        let s = sample.surface;
        let mut output = FragmentOutput::color(s.albedo.extend(s.specular))
            .with(1, s.position.extend(1.0))
            .with(2, s.normal.extend(s.shininess))
            .with(3, Vec4::new(s.roughness, s.metallic, s.ao, 1.0));
        if self.temporal {
            let ndc = |clip: Vec4| if clip.w.abs() > f32::EPSILON { clip.truncate().truncate() / clip.w } else { Vec2::ZERO };
            let velocity = (ndc(varyings[3]) - ndc(varyings[4])) * 0.5;
            output = output.with(GBUFFER_VELOCITY as usize, velocity.extend(0.0).extend(1.0));
        }
        Some(output)
    }
}

pub(crate) fn gbuffer(source: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(Gbuffer {
        skinned: skinned(source),
        parallax_steps: define_u32(source, "POM_STEPS"),
        temporal: define_u32(source, "TEMPORAL") != 0,
    })
}

/// Coloured line segments.
#[derive(Debug)]
struct DebugLines;

impl SoftwareProgram for DebugLines {
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
        varyings[0] = input.color;
        env.mat4("viewProjection") * input.position.extend(1.0)
    }

    fn fragment(&self, _: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
        Some(FragmentOutput::color(varyings[0]).with(1, bright(varyings[0])))
    }
}

pub(crate) fn debug_lines(_: &ProgramSource) -> Box<dyn SoftwareProgram> {
    Box::new(DebugLines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::software::program::UniformSlot;
    use std::collections::HashMap;
    use umbra_core::math::{Extent2D, Mat4};

    fn uniforms() -> HashMap<String, UniformSlot> {
        HashMap::from([
            ("model".to_string(), UniformSlot::Mat4(Mat4::IDENTITY)),
            ("mvp".to_string(), UniformSlot::Mat4(Mat4::IDENTITY)),
            ("normalMatrix".to_string(), UniformSlot::Mat3(Mat3::IDENTITY)),
            ("material.albedo".to_string(), UniformSlot::Vec4(Vec4::new(0.25, 0.5, 0.75, 1.0))),
        ])
    }

    fn input() -> VertexInput {
        VertexInput {
            position: Vec3::new(0.5, -0.5, 0.0),
            normal: Vec3::Z,
            uv: Vec2::new(0.25, 0.75),
            tangent: Vec3::X,
            bone_ids: [0; 4],
            bone_weights: [0.0; 4],
            color: Vec4::ONE,
        }
    }

    #[test]
    fn unlit_writes_the_albedo_with_unbound_maps() {
        let uniforms = uniforms();
        let (textures, units, blocks) = (HashMap::new(), HashMap::new(), HashMap::new());
        let env = ShaderEnv {
            uniforms: &uniforms,
            textures: &textures,
            units: &units,
            blocks: &blocks,
            viewport: Extent2D::square(4),
        };
        let program = forward_unlit(&ProgramSource::builtin("forward_unlit"));
        let mut varyings = Varyings::default();
        let clip = program.vertex(&env, &input(), &mut varyings);
        assert_eq!(clip, Vec4::new(0.5, -0.5, 0.0, 1.0));
        assert_eq!(Vec2::new(varyings[0].w, varyings[1].w), Vec2::new(0.25, 0.75));
        let fragment = FragmentInput {
            frag_coord: Vec3::ZERO,
            front_facing: true,
        };
        let output = program.fragment(&env, &fragment, &varyings).unwrap();
        // Unbound samplers read opaque black, bound ones are the empty texture in practice.
        assert_eq!(output.colors[0], Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(output.count, 2);
    }

    #[test]
    fn gbuffer_writes_every_target() {
        let uniforms = uniforms();
        let (textures, units, blocks) = (HashMap::new(), HashMap::new(), HashMap::new());
        let env = ShaderEnv {
            uniforms: &uniforms,
            textures: &textures,
            units: &units,
            blocks: &blocks,
            viewport: Extent2D::square(4),
        };
        let source = ProgramSource::builtin("gbuffer").with_define("TEMPORAL", 1);
        let program = gbuffer(&source);
        let mut varyings = Varyings::default();
        program.vertex(&env, &input(), &mut varyings);
        let fragment = FragmentInput {
            frag_coord: Vec3::ZERO,
            front_facing: true,
        };
        let output = program.fragment(&env, &fragment, &varyings).unwrap();
        assert_eq!(output.count, GBUFFER_VELOCITY as usize + 1);
        assert_eq!(output.colors[1], Vec4::new(0.5, -0.5, 0.0, 1.0));
        assert_eq!(output.colors[2].truncate(), Vec3::Z);
    }
}
