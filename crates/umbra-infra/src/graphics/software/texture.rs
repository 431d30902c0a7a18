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

//! Texel storage, format conversion and sampling.
//!
//! Every texture keeps one `f32` plane per mip level and layer, with as many
//! floats per texel as its format has channels. Depth-stencil textures store
//! the stencil value as a second float. Row 0 is the bottom row.

use umbra_core::math::{Extent2D, Vec2, Vec3, Vec4};
use umbra_core::renderer::{
    full_mip_count, AddressMode, FilterMode, ResourceError, TexelData, TextureDescriptor,
    TextureFormat, TextureTarget,
};

/// What samples outside a [`AddressMode::ClampToBorder`] texture return.
const BORDER_COLOR: Vec4 = Vec4::ONE;

/// Floats stored per texel.
pub(crate) fn stride(format: TextureFormat) -> usize {
    match format {
        TextureFormat::Depth24Stencil8 => 2,
        format => format.channels(),
    }
}

/// Expands stored floats to RGBA: missing colour channels read 0, missing alpha 1.
pub(crate) fn decode(format: TextureFormat, texel: &[f32]) -> Vec4 {
    match texel {
        [r] => Vec4::new(*r, 0.0, 0.0, 1.0),
        [depth, _] if format.is_depth() => Vec4::new(*depth, 0.0, 0.0, 1.0),
        [r, g] => Vec4::new(*r, *g, 0.0, 1.0),
        [r, g, b, a] => Vec4::new(*r, *g, *b, *a),
        _ => Vec4::W,
    }
}

/// Stores an RGBA value in the floats of one texel. Normalized formats are
/// clamped and rounded to 8 bits, depth is clamped to `[0, 1]` and the
/// stencil float of a depth-stencil texel is left alone.
pub(crate) fn encode(format: TextureFormat, value: Vec4, texel: &mut [f32]) {
    match format {
        TextureFormat::Rgba8 | TextureFormat::R8 => {
            for (dst, v) in texel.iter_mut().zip(value.to_array()) {
                *dst = unorm8(v);
            }
        }
        TextureFormat::Depth32F | TextureFormat::Depth24Stencil8 => {
            if let Some(depth) = texel.first_mut() {
                *depth = value.x.clamp(0.0, 1.0);
            }
        }
        _ => {
            for (dst, v) in texel.iter_mut().zip(value.to_array()) {
                *dst = v;
            }
        }
    }
}

fn unorm8(value: f32) -> f32 {
    (value.clamp(0.0, 1.0) * 255.0).round() / 255.0
}

/// Resolves an integer texel coordinate, `None` for a border texel.
fn address(coord: i64, size: u32, mode: AddressMode) -> Option<u32> {
    let size = i64::from(size);
    match mode {
        AddressMode::Repeat => Some(coord.rem_euclid(size) as u32),
        AddressMode::ClampToEdge => Some(coord.clamp(0, size - 1) as u32),
        AddressMode::ClampToBorder => (0..size).contains(&coord).then_some(coord as u32),
    }
}

/// The cube face a direction points through and its face coordinates, with
/// the major-axis table of the GL specification (`+X, -X, +Y, -Y, +Z, -Z`).
pub(crate) fn cube_face_coords(dir: Vec3) -> (u32, Vec2) {
    let a = dir.abs();
    let (face, sc, tc, ma) = if a.x >= a.y && a.x >= a.z {
        if dir.x > 0.0 {
            (0, -dir.z, -dir.y, a.x)
        } else {
            (1, dir.z, -dir.y, a.x)
        }
    } else if a.y >= a.z {
        if dir.y > 0.0 {
            (2, dir.x, dir.z, a.y)
        } else {
            (3, dir.x, -dir.z, a.y)
        }
    } else if dir.z > 0.0 {
        (4, dir.x, -dir.y, a.z)
    } else {
        (5, -dir.x, -dir.y, a.z)
    };
    if ma <= 0.0 || !ma.is_finite() {
        return (0, Vec2::splat(0.5));
    }
    (face, Vec2::new((sc / ma + 1.0) * 0.5, (tc / ma + 1.0) * 0.5))
}

/// A texture of the software device.
#[derive(Debug, Clone)]
pub(crate) struct SoftTexture {
    descriptor: TextureDescriptor,
    /// Texels per mip level, then per layer.
    levels: Vec<Vec<Vec<f32>>>,
}

impl SoftTexture {
    /// Allocates zeroed storage for every level and layer.
    pub fn new(descriptor: &TextureDescriptor) -> Result<Self, ResourceError> {
        let size = descriptor.size;
        let invalid = |reason: &str| {
            Err(ResourceError::InvalidDescriptor(format!(
                "texture '{}' {reason}",
                descriptor.label
            )))
        };
        if size.width == 0 || size.height == 0 {
            return invalid("has a zero extent");
        }
        if matches!(descriptor.target, TextureTarget::Cube | TextureTarget::CubeArray)
            && size.width != size.height
        {
            return invalid("is a cube map with non-square faces");
        }
        let layers = descriptor.layer_count();
        if layers == 0 {
            return invalid("has no layers");
        }
        let mips = descriptor.mip_levels.max(1);
        if mips > full_mip_count(size) {
            return invalid("has more mip levels than its size allows");
        }
        let stride = stride(descriptor.format);
        let levels = (0..mips)
            .map(|mip| vec![vec![0.0; size.mip(mip).area() * stride]; layers as usize])
            .collect();
        Ok(Self {
            descriptor: descriptor.clone(),
            levels,
        })
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn mip_levels(&self) -> u32 {
        self.levels.len() as u32
    }

    pub fn layer_count(&self) -> u32 {
        self.levels.first().map_or(0, |level| level.len() as u32)
    }

    /// Size of a mip level.
    pub fn size(&self, mip: u32) -> Extent2D {
        self.descriptor.size.mip(mip)
    }

    pub fn plane(&self, mip: u32, layer: u32) -> Option<&[f32]> {
        self.levels
            .get(mip as usize)
            .and_then(|level| level.get(layer as usize))
            .map(Vec::as_slice)
    }

    pub fn plane_mut(&mut self, mip: u32, layer: u32) -> Option<&mut [f32]> {
        self.levels
            .get_mut(mip as usize)
            .and_then(|level| level.get_mut(layer as usize))
            .map(Vec::as_mut_slice)
    }

    /// Replaces one level of one layer. `data` holds the format's channels per
    /// texel, bottom row first; `U8` values are normalized.
    pub fn write(&mut self, mip: u32, layer: u32, data: TexelData<'_>) -> Result<(), ResourceError> {
        let format = self.format();
        let size = self.size(mip);
        let channels = format.channels();
        let expected = size.area() * channels;
        if data.len() != expected {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture '{}' mip {mip} expects {expected} values, got {}",
                self.descriptor.label,
                data.len()
            )));
        }
        let stride = stride(format);
        let plane = self.plane_mut(mip, layer).ok_or(ResourceError::OutOfBounds)?;
        for (i, texel) in plane.chunks_exact_mut(stride).enumerate() {
            let mut value = Vec4::W;
            for c in 0..channels {
                value[c] = match data {
                    TexelData::U8(bytes) => f32::from(bytes[i * channels + c]) / 255.0,
                    TexelData::F32(floats) => floats[i * channels + c],
                };
            }
            encode(format, value, texel);
        }
        Ok(())
    }

    /// Rebuilds every level below the base with a 2x2 box filter.
    pub fn generate_mipmaps(&mut self) {
        let format = self.format();
        let stride = stride(format);
        for mip in 1..self.levels.len() {
            let src_size = self.size(mip as u32 - 1);
            let dst_size = self.size(mip as u32);
            let (upper, lower) = self.levels.split_at_mut(mip);
            let (src_level, dst_level) = (&upper[mip - 1], &mut lower[0]);
            for (src, dst) in src_level.iter().zip(dst_level.iter_mut()) {
                let read = |x: u32, y: u32| {
                    let x = x.min(src_size.width - 1);
                    let y = y.min(src_size.height - 1);
                    let index = (y * src_size.width + x) as usize * stride;
                    decode(format, &src[index..index + stride])
                };
                for y in 0..dst_size.height {
                    for x in 0..dst_size.width {
                        let average = (read(2 * x, 2 * y)
                            + read(2 * x + 1, 2 * y)
                            + read(2 * x, 2 * y + 1)
                            + read(2 * x + 1, 2 * y + 1))
                            * 0.25;
                        let index = (y * dst_size.width + x) as usize * stride;
                        encode(format, average, &mut dst[index..index + stride]);
                    }
                }
            }
        }
    }

    /// One texel, expanded to RGBA. Out-of-range reads return transparent black.
    pub fn texel(&self, mip: u32, layer: u32, x: u32, y: u32) -> Vec4 {
        let size = self.size(mip);
        let stride = stride(self.format());
        let index = (y as usize * size.width as usize + x as usize) * stride;
        self.plane(mip, layer)
            .and_then(|plane| plane.get(index..index + stride))
            .map_or(Vec4::ZERO, |texel| decode(self.format(), texel))
    }

    fn fetch(&self, mip: u32, layer: u32, x: i64, y: i64, mode: AddressMode) -> Vec4 {
        let size = self.size(mip);
        match (address(x, size.width, mode), address(y, size.height, mode)) {
            (Some(x), Some(y)) => self.texel(mip, layer, x, y),
            _ => BORDER_COLOR,
        }
    }

    fn sample_level(&self, mip: u32, layer: u32, uv: Vec2, mode: AddressMode) -> Vec4 {
        let size = self.size(mip);
        let x = (uv.x * size.width as f32).clamp(-1.0e9, 1.0e9);
        let y = (uv.y * size.height as f32).clamp(-1.0e9, 1.0e9);
        match self.descriptor.filter {
            FilterMode::Nearest => self.fetch(mip, layer, x.floor() as i64, y.floor() as i64, mode),
            FilterMode::Linear => {
                let (x, y) = (x - 0.5, y - 0.5);
                let (x0, y0) = (x.floor(), y.floor());
                let (fx, fy) = (x - x0, y - y0);
                let (x0, y0) = (x0 as i64, y0 as i64);
                let bottom = self
                    .fetch(mip, layer, x0, y0, mode)
                    .lerp(self.fetch(mip, layer, x0 + 1, y0, mode), fx);
                let top = self
                    .fetch(mip, layer, x0, y0 + 1, mode)
                    .lerp(self.fetch(mip, layer, x0 + 1, y0 + 1, mode), fx);
                bottom.lerp(top, fy)
            }
        }
    }

    fn sample_layer(&self, layer: u32, uv: Vec2, lod: f32, mode: AddressMode) -> Vec4 {
        let last = self.mip_levels().saturating_sub(1);
        let lod = if lod.is_finite() { lod.clamp(0.0, last as f32) } else { 0.0 };
        match self.descriptor.mip_filter {
            None => self.sample_level(0, layer, uv, mode),
            Some(FilterMode::Nearest) => self.sample_level(lod.round() as u32, layer, uv, mode),
            Some(FilterMode::Linear) => {
                let low = lod.floor() as u32;
                let high = (low + 1).min(last);
                let t = lod - low as f32;
                let a = self.sample_level(low, layer, uv, mode);
                if high == low || t == 0.0 {
                    return a;
                }
                a.lerp(self.sample_level(high, layer, uv, mode), t)
            }
        }
    }

    /// Filtered sample of a 2D texture or of one layer of a 2D array.
    pub fn sample_2d(&self, layer: u32, uv: Vec2, lod: f32) -> Vec4 {
        self.sample_layer(layer, uv, lod, self.descriptor.address_mode)
    }

    /// Filtered sample of the cube at index `cube` (0 for a plain cube map).
    pub fn sample_cube(&self, cube: u32, dir: Vec3, lod: f32) -> Vec4 {
        let (face, st) = cube_face_coords(dir);
        self.sample_layer(cube * 6 + face, st, lod, AddressMode::ClampToEdge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn checker() -> SoftTexture {
        let descriptor = TextureDescriptor::d2("checker", Extent2D::square(2), TextureFormat::Rgba32F)
            .with_filter(FilterMode::Nearest)
            .with_full_mips();
        let mut texture = SoftTexture::new(&descriptor).unwrap();
        #[rustfmt::skip]
        let texels = [
            1.0, 0.0, 0.0, 1.0,   0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 1.0, 1.0,   1.0, 1.0, 1.0, 1.0,
        ];
        texture.write(0, 0, TexelData::F32(&texels)).unwrap();
        texture
    }

    #[test]
    fn unorm_formats_are_quantized_and_clamped() {
        let mut texel = [0.0; 4];
        encode(TextureFormat::Rgba8, Vec4::new(2.0, -1.0, 0.5, 1.0), &mut texel);
        assert_eq!(texel[0], 1.0);
        assert_eq!(texel[1], 0.0);
        assert_relative_eq!(texel[2], 128.0 / 255.0);
    }

    #[test]
    fn depth_encoding_keeps_the_stencil() {
        let mut texel = [0.0, 7.0];
        encode(TextureFormat::Depth24Stencil8, Vec4::splat(0.25), &mut texel);
        assert_eq!(texel, [0.25, 7.0]);
        assert_eq!(decode(TextureFormat::Depth24Stencil8, &texel), Vec4::new(0.25, 0.0, 0.0, 1.0));
    }

    #[test]
    fn nearest_sampling_reads_rows_bottom_up() {
        let texture = checker();
        assert_eq!(texture.sample_2d(0, Vec2::new(0.25, 0.25), 0.0), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(texture.sample_2d(0, Vec2::new(0.75, 0.75), 0.0), Vec4::ONE);
    }

    #[test]
    fn mipmaps_average_the_level_above() {
        let mut texture = checker();
        texture.generate_mipmaps();
        assert_eq!(texture.mip_levels(), 2);
        let top = texture.texel(1, 0, 0, 0);
        assert_relative_eq!(top.x, 0.5);
        assert_relative_eq!(top.y, 0.5);
        assert_relative_eq!(top.z, 0.5);
        assert_relative_eq!(top.w, 1.0);
    }

    #[test]
    fn border_sampling_is_white() {
        let descriptor = TextureDescriptor::d2("shadow", Extent2D::square(4), TextureFormat::Depth32F)
            .with_address_mode(AddressMode::ClampToBorder);
        let texture = SoftTexture::new(&descriptor).unwrap();
        assert_eq!(texture.sample_2d(0, Vec2::new(1.5, 0.5), 0.0), Vec4::ONE);
        assert_eq!(texture.sample_2d(0, Vec2::new(0.5, 0.5), 0.0).x, 0.0);
    }

    #[test]
    fn cube_faces_follow_the_major_axis() {
        assert_eq!(cube_face_coords(Vec3::X).0, 0);
        assert_eq!(cube_face_coords(Vec3::NEG_X).0, 1);
        assert_eq!(cube_face_coords(Vec3::Y).0, 2);
        assert_eq!(cube_face_coords(Vec3::NEG_Y).0, 3);
        assert_eq!(cube_face_coords(Vec3::Z).0, 4);
        assert_eq!(cube_face_coords(Vec3::NEG_Z).0, 5);
        // Below the horizon on +X lands in the upper half of the face.
        let (_, st) = cube_face_coords(Vec3::new(1.0, -0.5, 0.0));
        assert_relative_eq!(st.y, 0.75);
        assert_relative_eq!(st.x, 0.5);
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        let zero = TextureDescriptor::d2("zero", Extent2D::new(0, 4), TextureFormat::Rgba8);
        assert!(SoftTexture::new(&zero).is_err());
        let mut mips = TextureDescriptor::d2("mips", Extent2D::square(4), TextureFormat::Rgba8);
        mips.mip_levels = 8;
        assert!(SoftTexture::new(&mips).is_err());
    }
}
