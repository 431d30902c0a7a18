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

//! The programmable stages of the software device.
//!
//! A [`SoftwareProgram`] is the Rust counterpart of a linked GLSL program:
//! a vertex function producing a clip-space position plus up to
//! [`MAX_VARYINGS`] interpolated vectors, and a fragment function writing up
//! to [`MAX_DRAW_BUFFERS`] colour outputs. Programs read their uniforms,
//! samplers and uniform blocks through a [`ShaderEnv`].

use super::texture::SoftTexture;
use std::collections::HashMap;
use std::fmt::Debug;
use umbra_core::math::{Extent2D, Mat3, Mat4, Vec2, Vec3, Vec4};
use umbra_core::renderer::{
    LightUniform, LineVertex, ProgramSource, TextureId, UniformValue, Vertex,
    BINDING_BONES, BINDING_LIGHTS, LIGHTS_BLOCK_HEADER,
};

/// Interpolated vectors a vertex function may write.
pub const MAX_VARYINGS: usize = 5;

/// Colour outputs a fragment function may write.
pub const MAX_DRAW_BUFFERS: usize = 8;

/// The interpolated outputs of the vertex stage.
pub type Varyings = [Vec4; MAX_VARYINGS];

/// One vertex as the vertex stage sees it. Line vertices only fill
/// `position` and `color`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexInput {
    /// Object-space position.
    pub position: Vec3,
    /// Object-space normal.
    pub normal: Vec3,
    /// Texture coordinates.
    pub uv: Vec2,
    /// Object-space tangent.
    pub tangent: Vec3,
    /// Up to four bone indices.
    pub bone_ids: [u32; 4],
    /// Weights of `bone_ids`.
    pub bone_weights: [f32; 4],
    /// Vertex colour.
    pub color: Vec4,
}

impl From<&Vertex> for VertexInput {
    fn from(vertex: &Vertex) -> Self {
        Self {
            position: Vec3::from(vertex.position),
            normal: Vec3::from(vertex.normal),
            uv: Vec2::from(vertex.uv),
            tangent: Vec3::from(vertex.tangent),
            bone_ids: vertex.bone_ids,
            bone_weights: vertex.bone_weights,
            color: Vec4::ONE,
        }
    }
}

impl From<&LineVertex> for VertexInput {
    fn from(vertex: &LineVertex) -> Self {
        Self {
            position: Vec3::from(vertex.position),
            normal: Vec3::ZERO,
            uv: Vec2::ZERO,
            tangent: Vec3::ZERO,
            bone_ids: [0; 4],
            bone_weights: [0.0; 4],
            color: Vec4::from(vertex.color),
        }
    }
}

/// Built-in inputs of the fragment stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentInput {
    /// Window coordinates of the pixel centre and the fragment depth in `[0, 1]`.
    pub frag_coord: Vec3,
    /// Whether the primitive is counter-clockwise on screen.
    pub front_facing: bool,
}

/// What a fragment function writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentOutput {
    /// Colour per output location.
    pub colors: [Vec4; MAX_DRAW_BUFFERS],
    /// Number of locations written.
    pub count: usize,
    /// A replacement depth, for programs that write it.
    pub depth: Option<f32>,
}

impl Default for FragmentOutput {
    fn default() -> Self {
        Self {
            colors: [Vec4::ZERO; MAX_DRAW_BUFFERS],
            count: 0,
            depth: None,
        }
    }
}

impl FragmentOutput {
    /// A single colour at location 0.
    pub fn color(color: Vec4) -> Self {
        Self::default().with(0, color)
    }

    /// Writes `color` at `location`. Locations past the last one are ignored.
    pub fn with(mut self, location: usize, color: Vec4) -> Self {
        if let Some(slot) = self.colors.get_mut(location) {
            *slot = color;
            self.count = self.count.max(location + 1);
        }
        self
    }

    /// Replaces the fragment depth.
    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// A program of the software device.
pub trait SoftwareProgram: Debug {
    /// Transforms one vertex, writing its varyings. Returns the clip-space position.
    fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4;

    /// Shades one fragment from the perspective-correct varyings. `None` discards it.
    fn fragment(
        &self,
        env: &ShaderEnv<'_>,
        input: &FragmentInput,
        varyings: &Varyings,
    ) -> Option<FragmentOutput>;

    /// Programs that replace the depth run before the depth test, all
    /// others after it.
    fn writes_depth(&self) -> bool {
        false
    }
}

/// Builds a program from its source, reading the defines it cares about.
pub type ProgramFactory = fn(&ProgramSource) -> Box<dyn SoftwareProgram>;

/// A stored uniform value. Booleans are stored as integers, like GL does.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UniformSlot {
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
    Floats(Vec<f32>),
    Vec3s(Vec<Vec3>),
    Mat4s(Vec<Mat4>),
}

impl From<UniformValue<'_>> for UniformSlot {
    fn from(value: UniformValue<'_>) -> Self {
        match value {
            UniformValue::Int(v) => Self::Int(v),
            UniformValue::Bool(v) => Self::Int(i32::from(v)),
            UniformValue::Float(v) => Self::Float(v),
            UniformValue::Vec2(v) => Self::Vec2(v),
            UniformValue::Vec3(v) => Self::Vec3(v),
            UniformValue::Vec4(v) => Self::Vec4(v),
            UniformValue::Mat3(v) => Self::Mat3(v),
            UniformValue::Mat4(v) => Self::Mat4(v),
            UniformValue::FloatArray(v) => Self::Floats(v.to_vec()),
            UniformValue::Vec3Array(v) => Self::Vec3s(v.to_vec()),
            UniformValue::Mat4Array(v) => Self::Mat4s(v.to_vec()),
        }
    }
}

/// Everything a program can read during a draw.
///
/// Uniforms that were never set read as zero, like in GL. Samplers resolve
/// their texture unit from the integer uniform of the same name.
#[derive(Debug, Clone, Copy)]
pub struct ShaderEnv<'a> {
    pub(crate) uniforms: &'a HashMap<String, UniformSlot>,
    pub(crate) textures: &'a HashMap<TextureId, SoftTexture>,
    pub(crate) units: &'a HashMap<u32, TextureId>,
    pub(crate) blocks: &'a HashMap<u32, &'a [u8]>,
    /// Size of the viewport in pixels.
    pub viewport: Extent2D,
}

impl<'a> ShaderEnv<'a> {
    fn slot(&self, name: &str) -> Option<&'a UniformSlot> {
        self.uniforms.get(name)
    }

    /// An `int` or `bool` uniform.
    pub fn int(&self, name: &str) -> i32 {
        match self.slot(name) {
            Some(UniformSlot::Int(v)) => *v,
            _ => 0,
        }
    }

    /// A `bool` uniform.
    pub fn flag(&self, name: &str) -> bool {
        self.int(name) != 0
    }

    /// A `float` uniform.
    pub fn float(&self, name: &str) -> f32 {
        match self.slot(name) {
            Some(UniformSlot::Float(v)) => *v,
            _ => 0.0,
        }
    }

    /// A `vec2` uniform.
    pub fn vec2(&self, name: &str) -> Vec2 {
        match self.slot(name) {
            Some(UniformSlot::Vec2(v)) => *v,
            _ => Vec2::ZERO,
        }
    }

    /// A `vec3` uniform.
    pub fn vec3(&self, name: &str) -> Vec3 {
        match self.slot(name) {
            Some(UniformSlot::Vec3(v)) => *v,
            _ => Vec3::ZERO,
        }
    }

    /// A `vec4` uniform.
    pub fn vec4(&self, name: &str) -> Vec4 {
        match self.slot(name) {
            Some(UniformSlot::Vec4(v)) => *v,
            _ => Vec4::ZERO,
        }
    }

    /// A `mat3` uniform.
    pub fn mat3(&self, name: &str) -> Mat3 {
        match self.slot(name) {
            Some(UniformSlot::Mat3(v)) => *v,
            _ => Mat3::ZERO,
        }
    }

    /// A `mat4` uniform.
    pub fn mat4(&self, name: &str) -> Mat4 {
        match self.slot(name) {
            Some(UniformSlot::Mat4(v)) => *v,
            _ => Mat4::ZERO,
        }
    }

    /// A `float[]` uniform.
    pub fn floats(&self, name: &str) -> &'a [f32] {
        match self.slot(name) {
            Some(UniformSlot::Floats(v)) => v,
            _ => &[],
        }
    }

    /// A `vec3[]` uniform.
    pub fn vec3s(&self, name: &str) -> &'a [Vec3] {
        match self.slot(name) {
            Some(UniformSlot::Vec3s(v)) => v,
            _ => &[],
        }
    }

    /// A `mat4[]` uniform.
    pub fn mat4s(&self, name: &str) -> &'a [Mat4] {
        match self.slot(name) {
            Some(UniformSlot::Mat4s(v)) => v,
            _ => &[],
        }
    }

    /// The sampler uniform `name`.
    pub fn sampler(&self, name: &str) -> Sampler<'a> {
        let unit = self.int(name).max(0) as u32;
        Sampler {
            texture: self.units.get(&unit).and_then(|id| self.textures.get(id)),
        }
    }

    /// The bytes of the uniform buffer bound at `binding`.
    pub fn block(&self, binding: u32) -> &'a [u8] {
        self.blocks.get(&binding).copied().unwrap_or(&[])
    }

    /// Number of lights in the lights block.
    pub fn light_count(&self) -> usize {
        let block = self.block(BINDING_LIGHTS);
        let Some(header) = block.get(..4) else {
            return 0;
        };
        let count = bytemuck::pod_read_unaligned::<i32>(header).max(0) as usize;
        let stored = block.len().saturating_sub(LIGHTS_BLOCK_HEADER) / std::mem::size_of::<LightUniform>();
        count.min(stored)
    }

    /// Light `index` of the lights block.
    pub fn light(&self, index: usize) -> Option<LightUniform> {
        if index >= self.light_count() {
            return None;
        }
        let size = std::mem::size_of::<LightUniform>();
        let start = LIGHTS_BLOCK_HEADER + index * size;
        self.block(BINDING_LIGHTS)
            .get(start..start + size)
            .map(bytemuck::pod_read_unaligned)
    }

    /// Bone `index` of the bones block. Missing bones read as identity.
    pub fn bone(&self, index: usize) -> Mat4 {
        let size = std::mem::size_of::<Mat4>();
        let start = index * size;
        self.block(BINDING_BONES)
            .get(start..start + size)
            .map_or(Mat4::IDENTITY, |bytes| {
                Mat4::from_cols_array(&bytemuck::pod_read_unaligned::<[f32; 16]>(bytes))
            })
    }
}

/// A texture bound to a sampler uniform. Sampling an empty unit returns
/// opaque black.
#[derive(Debug, Clone, Copy)]
pub struct Sampler<'a> {
    texture: Option<&'a SoftTexture>,
}

const UNBOUND: Vec4 = Vec4::W;

impl Sampler<'_> {
    /// Returns `true` if a texture is bound.
    pub fn is_bound(&self) -> bool {
        self.texture.is_some()
    }

    /// Samples the base level of a 2D texture.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        self.sample_lod(uv, 0.0)
    }

    /// Samples a 2D texture at an explicit level of detail.
    pub fn sample_lod(&self, uv: Vec2, lod: f32) -> Vec4 {
        self.texture.map_or(UNBOUND, |t| t.sample_2d(0, uv, lod))
    }

    /// Samples one layer of a 2D array.
    pub fn sample_layer(&self, uv: Vec2, layer: u32) -> Vec4 {
        self.texture.map_or(UNBOUND, |t| t.sample_2d(layer, uv, 0.0))
    }

    /// Samples a cube map at an explicit level of detail.
    pub fn sample_cube(&self, dir: Vec3, lod: f32) -> Vec4 {
        self.sample_cube_array(dir, 0, lod)
    }

    /// Samples the cube at index `cube` of a cube-map array.
    pub fn sample_cube_array(&self, dir: Vec3, cube: u32, lod: f32) -> Vec4 {
        self.texture.map_or(UNBOUND, |t| t.sample_cube(cube, dir, lod))
    }

    /// Reads one texel of the base level without filtering, clamped to the edge.
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        self.texture.map_or(UNBOUND, |t| {
            let size = t.size(0);
            let x = x.clamp(0, size.width as i32 - 1) as u32;
            let y = y.clamp(0, size.height as i32 - 1) as u32;
            t.texel(0, 0, x, y)
        })
    }

    /// Size of a mip level, `1x1` when nothing is bound.
    pub fn size(&self, mip: u32) -> Extent2D {
        self.texture.map_or(Extent2D::square(1), |t| t.size(mip))
    }

    /// Number of mip levels.
    pub fn mip_levels(&self) -> u32 {
        self.texture.map_or(1, SoftTexture::mip_levels)
    }
}

/// Reads an integer define, 0 when absent or malformed.
pub fn define_u32(source: &ProgramSource, name: &str) -> u32 {
    source
        .define(name)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(
        uniforms: &'a HashMap<String, UniformSlot>,
        textures: &'a HashMap<TextureId, SoftTexture>,
        units: &'a HashMap<u32, TextureId>,
        blocks: &'a HashMap<u32, &'a [u8]>,
    ) -> ShaderEnv<'a> {
        ShaderEnv {
            uniforms,
            textures,
            units,
            blocks,
            viewport: Extent2D::square(4),
        }
    }

    #[test]
    fn unset_uniforms_read_as_zero() {
        let (uniforms, textures, units, blocks) = (HashMap::new(), HashMap::new(), HashMap::new(), HashMap::new());
        let env = env(&uniforms, &textures, &units, &blocks);
        assert_eq!(env.float("exposure"), 0.0);
        assert_eq!(env.mat4("mvp"), Mat4::ZERO);
        assert!(!env.flag("shadowsEnabled"));
        assert_eq!(env.sampler("source").sample(Vec2::ZERO), Vec4::W);
    }

    #[test]
    fn lights_are_read_after_the_header() {
        let light = LightUniform {
            position: [1.0, 2.0, 3.0, 1.0],
            ..bytemuck::Zeroable::zeroed()
        };
        let mut block = vec![0u8; LIGHTS_BLOCK_HEADER];
        block[..4].copy_from_slice(&1i32.to_ne_bytes());
        block.extend_from_slice(bytemuck::bytes_of(&light));
        let blocks: HashMap<u32, &[u8]> = HashMap::from([(BINDING_LIGHTS, block.as_slice())]);
        let (uniforms, textures, units) = (HashMap::new(), HashMap::new(), HashMap::new());
        let env = env(&uniforms, &textures, &units, &blocks);
        assert_eq!(env.light_count(), 1);
        assert_eq!(env.light(0).map(|l| l.position), Some([1.0, 2.0, 3.0, 1.0]));
        assert!(env.light(1).is_none());
    }

    #[test]
    fn bools_are_stored_as_ints() {
        assert_eq!(UniformSlot::from(UniformValue::Bool(true)), UniformSlot::Int(1));
    }

    #[test]
    fn defines_parse_as_integers() {
        let source = ProgramSource::builtin("ssao").with_define("KERNEL_SIZE", 16);
        assert_eq!(define_u32(&source, "KERNEL_SIZE"), 16);
        assert_eq!(define_u32(&source, "SKINNED"), 0);
    }
}
