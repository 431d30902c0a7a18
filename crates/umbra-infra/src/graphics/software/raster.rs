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

//! Clipping, rasterization and the per-fragment operations.
//!
//! Triangles are clipped in homogeneous space against the near and far
//! planes and a guard band, then scanned with fixed-point edge functions
//! under the top-left fill rule. Varyings are interpolated perspective
//! correctly. Fragment operations run in GL order: stencil test, depth
//! test, blending, colour mask.

use super::program::{FragmentInput, FragmentOutput, ShaderEnv, SoftwareProgram, Varyings};
use super::texture::{decode, encode, stride};
use umbra_core::math::{Extent2D, Rect, Vec3, Vec4};
use umbra_core::renderer::{
    BlendFactor, BlendOperation, BlendState, ColorWrites, CullMode, RasterState, TextureFormat,
};

/// Sub-pixel precision of the edge functions.
const SUBPIXEL: f32 = 256.0;
const HALF_PIXEL: i64 = 128;

/// Clip-space `|x|` and `|y|` bound, in units of `w`, beyond which triangles are clipped.
const GUARD_BAND: f32 = 4.0;

/// Longest line, in pixels, drawn by [`Rasterizer::line`].
const MAX_LINE_STEPS: f32 = 65_536.0;

/// One level of one layer of an attachment, borrowed for a draw.
#[derive(Debug)]
pub(crate) struct Plane<'a> {
    data: &'a mut [f32],
    format: TextureFormat,
    stride: usize,
    extent: Extent2D,
}

impl<'a> Plane<'a> {
    pub fn new(data: &'a mut [f32], format: TextureFormat, extent: Extent2D) -> Self {
        Self {
            data,
            format,
            stride: stride(format),
            extent,
        }
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    fn range(&self, x: u32, y: u32) -> std::ops::Range<usize> {
        let start = (y as usize * self.extent.width as usize + x as usize) * self.stride;
        start..start + self.stride
    }

    pub fn read(&self, x: u32, y: u32) -> Vec4 {
        self.data
            .get(self.range(x, y))
            .map_or(Vec4::ZERO, |texel| decode(self.format, texel))
    }

    pub fn write(&mut self, x: u32, y: u32, value: Vec4) {
        let range = self.range(x, y);
        if let Some(texel) = self.data.get_mut(range) {
            encode(self.format, value, texel);
        }
    }

    fn depth(&self, x: u32, y: u32) -> f32 {
        self.read(x, y).x
    }

    fn stencil(&self, x: u32, y: u32) -> Option<u8> {
        if !self.format.has_stencil() {
            return None;
        }
        self.data.get(self.range(x, y)).and_then(|texel| texel.get(1)).map(|s| *s as u8)
    }

    fn set_stencil(&mut self, x: u32, y: u32, value: u8) {
        let range = self.range(x, y);
        if let Some(texel) = self.data.get_mut(range).and_then(|texel| texel.get_mut(1)) {
            *texel = f32::from(value);
        }
    }

    /// Fills the plane. `stencil` is ignored by formats without one.
    pub fn fill(&mut self, value: Vec4, stencil: Option<u8>) {
        let format = self.format;
        for texel in self.data.chunks_exact_mut(self.stride) {
            encode(format, value, texel);
            if let (Some(stencil), Some(slot)) = (stencil.filter(|_| format.has_stencil()), texel.get_mut(1)) {
                *slot = f32::from(stencil);
            }
        }
    }

    /// Fills only the stencil values.
    pub fn fill_stencil(&mut self, stencil: u8) {
        if !self.format.has_stencil() {
            return;
        }
        for texel in self.data.chunks_exact_mut(self.stride) {
            texel[1] = f32::from(stencil);
        }
    }

    /// The raw floats of one texel.
    pub fn raw(&self, x: u32, y: u32) -> Option<&[f32]> {
        self.data.get(self.range(x, y))
    }

    /// Overwrites the raw floats of one texel.
    pub fn set_raw(&mut self, x: u32, y: u32, raw: &[f32]) {
        let range = self.range(x, y);
        if let Some(texel) = self.data.get_mut(range) {
            let n = texel.len().min(raw.len());
            texel[..n].copy_from_slice(&raw[..n]);
        }
    }
}

/// The planes a draw writes: colour planes by fragment output location and
/// the depth (or depth-stencil) plane.
#[derive(Debug, Default)]
pub(crate) struct Targets<'a> {
    pub colors: Vec<Option<Plane<'a>>>,
    pub depth: Option<Plane<'a>>,
}

impl Targets<'_> {
    /// The extent every plane covers.
    pub fn extent(&self) -> Option<Extent2D> {
        self.colors
            .iter()
            .flatten()
            .chain(self.depth.iter())
            .map(Plane::extent)
            .reduce(|a, b| Extent2D::new(a.width.min(b.width), a.height.min(b.height)))
    }
}

/// A vertex after the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShadedVertex {
    pub clip: Vec4,
    pub varyings: Varyings,
}

impl ShadedVertex {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        let mut varyings = self.varyings;
        for (v, o) in varyings.iter_mut().zip(other.varyings.iter()) {
            *v = v.lerp(*o, t);
        }
        Self {
            clip: self.clip.lerp(other.clip, t),
            varyings,
        }
    }
}

/// Signed distance to the six clip planes, non-negative inside.
fn clip_distance(clip: Vec4, plane: usize) -> f32 {
    match plane {
        0 => clip.w + clip.z,
        1 => clip.w - clip.z,
        2 => GUARD_BAND * clip.w + clip.x,
        3 => GUARD_BAND * clip.w - clip.x,
        4 => GUARD_BAND * clip.w + clip.y,
        _ => GUARD_BAND * clip.w - clip.y,
    }
}

/// Sutherland-Hodgman clipping of a convex polygon against every plane.
fn clip_polygon(polygon: &mut Vec<ShadedVertex>, scratch: &mut Vec<ShadedVertex>) {
    for plane in 0..6 {
        if polygon.iter().all(|v| clip_distance(v.clip, plane) >= 0.0) {
            continue;
        }
        scratch.clear();
        for (i, a) in polygon.iter().enumerate() {
            let b = &polygon[(i + 1) % polygon.len()];
            let (da, db) = (clip_distance(a.clip, plane), clip_distance(b.clip, plane));
            if da >= 0.0 {
                scratch.push(*a);
            }
            if (da >= 0.0) != (db >= 0.0) {
                scratch.push(a.lerp(b, da / (da - db)));
            }
        }
        std::mem::swap(polygon, scratch);
        if polygon.len() < 3 {
            polygon.clear();
            return;
        }
    }
}

/// A vertex in window space.
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    inv_w: f32,
    varyings: Varyings,
}

fn edge(ax: i64, ay: i64, bx: i64, by: i64, px: i64, py: i64) -> i64 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

/// Whether a counter-clockwise edge owns the pixels lying exactly on it.
fn is_top_left(dx: i64, dy: i64) -> bool {
    dy < 0 || (dy == 0 && dx < 0)
}

fn blend_factor(factor: BlendFactor, src: Vec4, dst: Vec4) -> Vec4 {
    match factor {
        BlendFactor::Zero => Vec4::ZERO,
        BlendFactor::One => Vec4::ONE,
        BlendFactor::SrcColor => src,
        BlendFactor::OneMinusSrcColor => Vec4::ONE - src,
        BlendFactor::SrcAlpha => Vec4::splat(src.w),
        BlendFactor::OneMinusSrcAlpha => Vec4::splat(1.0 - src.w),
        BlendFactor::DstColor => dst,
        BlendFactor::DstAlpha => Vec4::splat(dst.w),
        BlendFactor::OneMinusDstAlpha => Vec4::splat(1.0 - dst.w),
    }
}

pub(crate) fn blend(state: &BlendState, src: Vec4, dst: Vec4) -> Vec4 {
    let s = src * blend_factor(state.src_factor, src, dst);
    let d = dst * blend_factor(state.dst_factor, src, dst);
    match state.operation {
        BlendOperation::Add => s + d,
        BlendOperation::Subtract => s - d,
        BlendOperation::ReverseSubtract => d - s,
        BlendOperation::Min => src.min(dst),
        BlendOperation::Max => src.max(dst),
    }
}

fn mask_channels(writes: ColorWrites, value: Vec4, previous: Vec4) -> Vec4 {
    Vec4::new(
        if writes.contains(ColorWrites::RED) { value.x } else { previous.x },
        if writes.contains(ColorWrites::GREEN) { value.y } else { previous.y },
        if writes.contains(ColorWrites::BLUE) { value.z } else { previous.z },
        if writes.contains(ColorWrites::ALPHA) { value.w } else { previous.w },
    )
}

/// Draws primitives of one program with one fixed-function state.
pub(crate) struct Rasterizer<'r, 'e> {
    program: &'r dyn SoftwareProgram,
    env: &'r ShaderEnv<'e>,
    state: &'r RasterState,
    viewport: Rect,
    /// Pixel bounds: the viewport clipped to the targets, `[x0, x1) x [y0, y1)`.
    bounds: [i64; 4],
}

impl<'r, 'e> Rasterizer<'r, 'e> {
    pub fn new(
        program: &'r dyn SoftwareProgram,
        env: &'r ShaderEnv<'e>,
        state: &'r RasterState,
        viewport: Rect,
        extent: Extent2D,
    ) -> Self {
        let x0 = i64::from(viewport.x).max(0);
        let y0 = i64::from(viewport.y).max(0);
        let x1 = (i64::from(viewport.x) + i64::from(viewport.width)).min(i64::from(extent.width));
        let y1 = (i64::from(viewport.y) + i64::from(viewport.height)).min(i64::from(extent.height));
        Self {
            program,
            env,
            state,
            viewport,
            bounds: [x0, y0, x1, y1],
        }
    }

    fn to_screen(&self, vertex: &ShadedVertex) -> ScreenVertex {
        let inv_w = 1.0 / vertex.clip.w;
        let ndc = vertex.clip.truncate() * inv_w;
        let vp = self.viewport;
        ScreenVertex {
            x: vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.width as f32,
            y: vp.y as f32 + (ndc.y + 1.0) * 0.5 * vp.height as f32,
            z: ndc.z * 0.5 + 0.5,
            inv_w,
            varyings: vertex.varyings,
        }
    }

    /// Draws an indexed triangle list. Returns the number of triangles submitted.
    pub fn triangles(&self, vertices: &[ShadedVertex], indices: &[u32], targets: &mut Targets<'_>) -> u64 {
        let mut polygon = Vec::with_capacity(9);
        let mut scratch = Vec::with_capacity(9);
        let mut count = 0;
        for triangle in indices.chunks_exact(3) {
            let fetch = |i: u32| vertices.get(i as usize).copied();
            let (Some(a), Some(b), Some(c)) = (fetch(triangle[0]), fetch(triangle[1]), fetch(triangle[2])) else {
                continue;
            };
            count += 1;
            polygon.clear();
            polygon.extend([a, b, c]);
            clip_polygon(&mut polygon, &mut scratch);
            if polygon.len() < 3 {
                continue;
            }
            let first = self.to_screen(&polygon[0]);
            for pair in polygon[1..].windows(2) {
                self.triangle(&first, &self.to_screen(&pair[0]), &self.to_screen(&pair[1]), targets);
            }
        }
        count
    }

    fn triangle(&self, a: &ScreenVertex, b: &ScreenVertex, c: &ScreenVertex, targets: &mut Targets<'_>) {
        let fixed = |v: f32| (v * SUBPIXEL).round() as i64;
        let (ax, ay) = (fixed(a.x), fixed(a.y));
        let (mut bx, mut by) = (fixed(b.x), fixed(b.y));
        let (mut cx, mut cy) = (fixed(c.x), fixed(c.y));
        let mut area = edge(ax, ay, bx, by, cx, cy);
        if area == 0 {
            return;
        }
        let front = area > 0;
        match self.state.cull {
            CullMode::Back if !front => return,
            CullMode::Front if front => return,
            _ => {}
        }
        let (mut b, mut c) = (b, c);
        if area < 0 {
            std::mem::swap(&mut b, &mut c);
            std::mem::swap(&mut bx, &mut cx);
            std::mem::swap(&mut by, &mut cy);
            area = -area;
        }

        let [bx0, by0, bx1, by1] = self.bounds;
        let x0 = (a.x.min(b.x).min(c.x).floor() as i64).max(bx0);
        let x1 = (a.x.max(b.x).max(c.x).ceil() as i64 + 1).min(bx1);
        let y0 = (a.y.min(b.y).min(c.y).floor() as i64).max(by0);
        let y1 = (a.y.max(b.y).max(c.y).ceil() as i64 + 1).min(by1);
        let owns = [
            is_top_left(cx - bx, cy - by),
            is_top_left(ax - cx, ay - cy),
            is_top_left(bx - ax, by - ay),
        ];
        let inside = |w: i64, owned: bool| w > 0 || (w == 0 && owned);
        let area = area as f32;
        let mut varyings = Varyings::default();

        for py in y0..y1 {
            let sy = py * SUBPIXEL as i64 + HALF_PIXEL;
            for px in x0..x1 {
                let sx = px * SUBPIXEL as i64 + HALF_PIXEL;
                let w0 = edge(bx, by, cx, cy, sx, sy);
                let w1 = edge(cx, cy, ax, ay, sx, sy);
                let w2 = edge(ax, ay, bx, by, sx, sy);
                if !(inside(w0, owns[0]) && inside(w1, owns[1]) && inside(w2, owns[2])) {
                    continue;
                }
                let (l0, l1, l2) = (w0 as f32 / area, w1 as f32 / area, w2 as f32 / area);
                let z = l0 * a.z + l1 * b.z + l2 * c.z;
                let inv_w = l0 * a.inv_w + l1 * b.inv_w + l2 * c.inv_w;
                let (p0, p1, p2) = (l0 * a.inv_w / inv_w, l1 * b.inv_w / inv_w, l2 * c.inv_w / inv_w);
                for (i, v) in varyings.iter_mut().enumerate() {
                    *v = a.varyings[i] * p0 + b.varyings[i] * p1 + c.varyings[i] * p2;
                }
                self.fragment(px as u32, py as u32, z, front, &varyings, targets);
            }
        }
    }

    /// Draws a line list. Returns the number of segments submitted.
    pub fn lines(&self, vertices: &[ShadedVertex], targets: &mut Targets<'_>) -> u64 {
        let mut count = 0;
        for segment in vertices.chunks_exact(2) {
            count += 1;
            let (a, b) = (&segment[0], &segment[1]);
            let (mut t0, mut t1) = (0.0f32, 1.0f32);
            let mut visible = true;
            for plane in 0..6 {
                let (da, db) = (clip_distance(a.clip, plane), clip_distance(b.clip, plane));
                if da < 0.0 && db < 0.0 {
                    visible = false;
                    break;
                }
                let t = da / (da - db);
                if da < 0.0 {
                    t0 = t0.max(t);
                } else if db < 0.0 {
                    t1 = t1.min(t);
                }
            }
            if !visible || t0 > t1 {
                continue;
            }
            let start = self.to_screen(&a.lerp(b, t0));
            let end = self.to_screen(&a.lerp(b, t1));
            self.line(&start, &end, targets);
        }
        count
    }

    fn line(&self, a: &ScreenVertex, b: &ScreenVertex, targets: &mut Targets<'_>) {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let steps = dx.abs().max(dy.abs()).ceil().clamp(1.0, MAX_LINE_STEPS) as u32;
        let [bx0, by0, bx1, by1] = self.bounds;
        let mut varyings = Varyings::default();
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let (x, y) = ((a.x + dx * t).floor() as i64, (a.y + dy * t).floor() as i64);
            if x < bx0 || x >= bx1 || y < by0 || y >= by1 {
                continue;
            }
            let z = a.z + (b.z - a.z) * t;
            let inv_w = a.inv_w + (b.inv_w - a.inv_w) * t;
            let (pa, pb) = ((1.0 - t) * a.inv_w / inv_w, t * b.inv_w / inv_w);
            for (i, v) in varyings.iter_mut().enumerate() {
                *v = a.varyings[i] * pa + b.varyings[i] * pb;
            }
            self.fragment(x as u32, y as u32, z, true, &varyings, targets);
        }
    }

    fn fragment(&self, x: u32, y: u32, z: f32, front_facing: bool, varyings: &Varyings, targets: &mut Targets<'_>) {
        let input = FragmentInput {
            frag_coord: Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z),
            front_facing,
        };
        if self.program.writes_depth() {
            let Some(output) = self.program.fragment(self.env, &input, varyings) else {
                return;
            };
            let depth = output.depth.unwrap_or(z).clamp(0.0, 1.0);
            if self.test(x, y, depth, targets) {
                self.commit(x, y, depth, &output, targets);
            }
        } else {
            let depth = z.clamp(0.0, 1.0);
            if !self.test(x, y, depth, targets) {
                return;
            }
            if let Some(output) = self.program.fragment(self.env, &input, varyings) {
                self.commit(x, y, depth, &output, targets);
            }
        }
    }

    /// Stencil then depth test. A failure applies the matching stencil
    /// operation and rejects the fragment.
    fn test(&self, x: u32, y: u32, depth: f32, targets: &mut Targets<'_>) -> bool {
        let Some(plane) = targets.depth.as_mut() else {
            return true;
        };
        let stencil = self.state.stencil.and_then(|s| plane.stencil(x, y).map(|stored| (s, stored)));
        if let Some((state, stored)) = stencil {
            if !state.passes(stored) {
                plane.set_stencil(x, y, state.fail_op.apply(stored, state.reference, state.write_mask));
                return false;
            }
        }
        if let Some(compare) = self.state.depth_test {
            if !compare.passes(depth, plane.depth(x, y)) {
                if let Some((state, stored)) = stencil {
                    plane.set_stencil(x, y, state.depth_fail_op.apply(stored, state.reference, state.write_mask));
                }
                return false;
            }
        }
        true
    }

    /// Stencil pass operation, depth write, then blending and the colour mask.
    fn commit(&self, x: u32, y: u32, depth: f32, output: &FragmentOutput, targets: &mut Targets<'_>) {
        if let Some(plane) = targets.depth.as_mut() {
            if let (Some(state), Some(stored)) = (self.state.stencil, plane.stencil(x, y)) {
                plane.set_stencil(x, y, state.pass_op.apply(stored, state.reference, state.write_mask));
            }
            if self.state.depth_test.is_some() && self.state.depth_write {
                plane.write(x, y, Vec4::splat(depth));
            }
        }
        let writes = self.state.color_writes;
        if writes.is_empty() {
            return;
        }
        for (location, color) in output.colors[..output.count].iter().enumerate() {
            let Some(Some(plane)) = targets.colors.get_mut(location) else {
                continue;
            };
            let mut value = *color;
            if matches!(plane.format, TextureFormat::Rgba8 | TextureFormat::R8) {
                value = value.clamp(Vec4::ZERO, Vec4::ONE);
            }
            let previous = plane.read(x, y);
            if let Some(state) = &self.state.blend {
                value = blend(state, value, previous);
            }
            if writes != ColorWrites::ALL {
                value = mask_channels(writes, value, previous);
            }
            plane.write(x, y, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::software::program::{UniformSlot, VertexInput};
    use std::collections::HashMap;
    use umbra_core::renderer::{CompareFunction, StencilOperation, StencilState, TextureId};

    /// Passes positions through and paints varying 0.
    #[derive(Debug)]
    struct Flat;

    impl SoftwareProgram for Flat {
        fn vertex(&self, _: &ShaderEnv<'_>, input: &VertexInput, varyings: &mut Varyings) -> Vec4 {
            varyings[0] = input.color;
            input.position.extend(1.0)
        }

        fn fragment(&self, _: &ShaderEnv<'_>, _: &FragmentInput, varyings: &Varyings) -> Option<FragmentOutput> {
            Some(FragmentOutput::color(varyings[0]))
        }
    }

    fn shaded(x: f32, y: f32, z: f32) -> ShadedVertex {
        let mut varyings = Varyings::default();
        varyings[0] = Vec4::new(0.25, 0.0, 0.0, 1.0);
        ShadedVertex {
            clip: Vec4::new(x, y, z, 1.0),
            varyings,
        }
    }

    fn quad(z: f32) -> Vec<ShadedVertex> {
        vec![shaded(-1.0, -1.0, z), shaded(1.0, -1.0, z), shaded(1.0, 1.0, z), shaded(-1.0, 1.0, z)]
    }

    struct Fixture {
        uniforms: HashMap<String, UniformSlot>,
        textures: HashMap<TextureId, super::super::texture::SoftTexture>,
        units: HashMap<u32, TextureId>,
        blocks: HashMap<u32, &'static [u8]>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                uniforms: HashMap::new(),
                textures: HashMap::new(),
                units: HashMap::new(),
                blocks: HashMap::new(),
            }
        }

        fn env(&self, size: u32) -> ShaderEnv<'_> {
            ShaderEnv {
                uniforms: &self.uniforms,
                textures: &self.textures,
                units: &self.units,
                blocks: &self.blocks,
                viewport: Extent2D::square(size),
            }
        }
    }

    const SIZE: u32 = 8;

    fn draw(state: &RasterState, vertices: &[ShadedVertex], indices: &[u32], color: &mut [f32], depth: &mut [f32]) {
        let fixture = Fixture::new();
        let env = fixture.env(SIZE);
        let extent = Extent2D::square(SIZE);
        let mut targets = Targets {
            colors: vec![Some(Plane::new(color, TextureFormat::Rgba32F, extent))],
            depth: Some(Plane::new(depth, TextureFormat::Depth24Stencil8, extent)),
        };
        let raster = Rasterizer::new(&Flat, &env, state, extent.rect(), extent);
        raster.triangles(vertices, indices, &mut targets);
    }

    fn buffers() -> (Vec<f32>, Vec<f32>) {
        let mut depth = vec![0.0; (SIZE * SIZE * 2) as usize];
        for texel in depth.chunks_exact_mut(2) {
            texel[0] = 1.0;
        }
        (vec![0.0; (SIZE * SIZE * 4) as usize], depth)
    }

    #[test]
    fn shared_edges_are_filled_exactly_once() {
        let (mut color, mut depth) = buffers();
        let state = RasterState {
            blend: Some(BlendState::ADDITIVE),
            ..RasterState::fullscreen()
        };
        // Two triangles sharing the diagonal, one of them clockwise.
        draw(&state, &quad(0.0), &[0, 1, 2, 0, 3, 2], &mut color, &mut depth);
        for texel in color.chunks_exact(4) {
            assert_eq!(texel[0], 0.25);
        }
    }

    #[test]
    fn back_faces_are_culled_by_default() {
        let (mut color, mut depth) = buffers();
        draw(&RasterState::default(), &quad(0.0), &[0, 2, 1], &mut color, &mut depth);
        assert!(color.iter().all(|v| *v == 0.0));
        draw(&RasterState::default(), &quad(0.0), &[0, 1, 2], &mut color, &mut depth);
        assert!(color.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn depth_test_rejects_farther_fragments() {
        let (mut color, mut depth) = buffers();
        let state = RasterState::default();
        draw(&state, &quad(0.0), &[0, 1, 2, 0, 2, 3], &mut color, &mut depth);
        assert_eq!(depth[0], 0.5);
        // Farther quad: nothing changes.
        let far: Vec<ShadedVertex> = quad(0.5)
            .into_iter()
            .map(|mut v| {
                v.varyings[0] = Vec4::ONE;
                v
            })
            .collect();
        draw(&state, &far, &[0, 1, 2, 0, 2, 3], &mut color, &mut depth);
        assert_eq!(color[0], 0.25);
        assert_eq!(depth[0], 0.5);
    }

    #[test]
    fn stencil_operations_follow_the_test_outcome() {
        let (mut color, mut depth) = buffers();
        let state = RasterState {
            depth_test: Some(CompareFunction::Less),
            depth_write: false,
            stencil: Some(StencilState {
                compare: CompareFunction::Always,
                reference: 0,
                read_mask: 0xFF,
                write_mask: 0xFF,
                fail_op: StencilOperation::Keep,
                depth_fail_op: StencilOperation::Keep,
                pass_op: StencilOperation::IncrementWrap,
            }),
            cull: CullMode::None,
            ..RasterState::default()
        };
        draw(&state, &quad(0.0), &[0, 1, 2, 0, 2, 3], &mut color, &mut depth);
        assert!(depth.chunks_exact(2).all(|t| t[1] == 1.0));
        let state = RasterState {
            stencil: state.stencil.map(|s| StencilState {
                compare: CompareFunction::Equal,
                reference: 2,
                fail_op: StencilOperation::Zero,
                ..s
            }),
            ..state
        };
        draw(&state, &quad(0.0), &[0, 1, 2, 0, 2, 3], &mut color, &mut depth);
        assert!(depth.chunks_exact(2).all(|t| t[1] == 0.0));
    }

    #[test]
    fn triangles_behind_the_near_plane_are_clipped() {
        let (mut color, mut depth) = buffers();
        let state = RasterState::fullscreen();
        draw(&state, &quad(-2.0), &[0, 1, 2, 0, 2, 3], &mut color, &mut depth);
        assert!(color.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn color_mask_keeps_disabled_channels() {
        let previous = Vec4::new(1.0, 1.0, 1.0, 1.0);
        let masked = mask_channels(ColorWrites::RED, Vec4::ZERO, previous);
        assert_eq!(masked, Vec4::new(0.0, 1.0, 1.0, 1.0));
    }
}
