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

//! Defines data structures related to GPU textures.

use crate::math::Extent2D;

/// An opaque handle to a texture owned by a [`GraphicsDevice`](crate::renderer::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// The kind of texture object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// A single two-dimensional image.
    D2,
    /// Six square faces.
    Cube,
    /// A stack of two-dimensional layers.
    D2Array,
    /// A stack of cube maps, six layers each.
    CubeArray,
}

/// The texel format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Four 8-bit normalized channels.
    Rgba8,
    /// Four 16-bit float channels (HDR targets, G-buffer).
    Rgba16F,
    /// Four 32-bit float channels (world positions).
    Rgba32F,
    /// Two 16-bit float channels (velocity, BRDF LUT).
    Rg16F,
    /// One 16-bit float channel (ambient occlusion).
    R16F,
    /// One 8-bit normalized channel.
    R8,
    /// 32-bit float depth (shadow maps).
    Depth32F,
    /// Packed 24-bit depth and 8-bit stencil.
    Depth24Stencil8,
}

impl TextureFormat {
    /// Returns `true` for depth or depth/stencil formats.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32F | Self::Depth24Stencil8)
    }

    /// Returns `true` if the format carries a stencil component.
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }

    /// Number of colour channels stored per texel (depth formats count as one).
    pub fn channels(self) -> usize {
        match self {
            Self::Rgba8 | Self::Rgba16F | Self::Rgba32F => 4,
            Self::Rg16F => 2,
            Self::R16F | Self::R8 | Self::Depth32F | Self::Depth24Stencil8 => 1,
        }
    }

    /// Returns `true` if the texels can hold values outside `[0, 1]`.
    pub fn is_hdr(self) -> bool {
        matches!(
            self,
            Self::Rgba16F | Self::Rgba32F | Self::Rg16F | Self::R16F | Self::Depth32F
        )
    }
}

/// Defines the filtering mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Point sampling. Returns the value of the nearest texel.
    Nearest,
    /// Linear interpolation. Returns a weighted average of the four nearest texels.
    #[default]
    Linear,
}

/// Defines how texture coordinates are handled when sampling outside the `[0, 1]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Coordinates wrap around. `1.1` becomes `0.1`.
    Repeat,
    /// Coordinates are clamped to the edge. `1.1` becomes `1.0`.
    #[default]
    ClampToEdge,
    /// Coordinates outside the range read the border colour (opaque white).
    ClampToBorder,
}

/// Describes a texture to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    /// A debug label.
    pub label: String,
    /// The kind of texture.
    pub target: TextureTarget,
    /// Texel format.
    pub format: TextureFormat,
    /// Size of mip level zero.
    pub size: Extent2D,
    /// Array length: layers for `D2Array`, cube maps for `CubeArray`. Ignored otherwise.
    pub array_len: u32,
    /// Number of mip levels (at least one).
    pub mip_levels: u32,
    /// Minification and magnification filter.
    pub filter: FilterMode,
    /// Filter between mip levels, `None` when mipmapping is off.
    pub mip_filter: Option<FilterMode>,
    /// Address mode on every axis.
    pub address_mode: AddressMode,
}

impl TextureDescriptor {
    /// A plain 2D texture with one mip level, linear filtering and edge clamping.
    pub fn d2(label: impl Into<String>, size: Extent2D, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            target: TextureTarget::D2,
            format,
            size,
            array_len: 1,
            mip_levels: 1,
            filter: FilterMode::Linear,
            mip_filter: None,
            address_mode: AddressMode::ClampToEdge,
        }
    }

    /// A cube map with square faces of `size` texels.
    pub fn cube(label: impl Into<String>, size: u32, format: TextureFormat) -> Self {
        Self {
            target: TextureTarget::Cube,
            ..Self::d2(label, Extent2D::square(size), format)
        }
    }

    /// A 2D texture array of `layers` layers.
    pub fn d2_array(
        label: impl Into<String>,
        size: Extent2D,
        layers: u32,
        format: TextureFormat,
    ) -> Self {
        Self {
            target: TextureTarget::D2Array,
            array_len: layers.max(1),
            ..Self::d2(label, size, format)
        }
    }

    /// An array of `cubes` cube maps.
    pub fn cube_array(label: impl Into<String>, size: u32, cubes: u32, format: TextureFormat) -> Self {
        Self {
            target: TextureTarget::CubeArray,
            array_len: cubes.max(1),
            ..Self::d2(label, Extent2D::square(size), format)
        }
    }

    /// Sets the sampling filter.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the address mode.
    pub fn with_address_mode(mut self, mode: AddressMode) -> Self {
        self.address_mode = mode;
        self
    }

    /// Enables a full mip chain down to 1x1, filtered linearly.
    pub fn with_full_mips(mut self) -> Self {
        self.mip_levels = full_mip_count(self.size);
        self.mip_filter = Some(FilterMode::Linear);
        self
    }

    /// Sets an explicit number of mip levels, clamped to the full chain.
    pub fn with_mips(mut self, levels: u32) -> Self {
        self.mip_levels = levels.clamp(1, full_mip_count(self.size));
        self.mip_filter = (self.mip_levels > 1).then_some(FilterMode::Linear);
        self
    }

    /// The number of two-dimensional layers the texture stores per mip level.
    pub fn layer_count(&self) -> u32 {
        match self.target {
            TextureTarget::D2 => 1,
            TextureTarget::Cube => 6,
            TextureTarget::D2Array => self.array_len,
            TextureTarget::CubeArray => 6 * self.array_len,
        }
    }
}

/// Number of mip levels in a full chain for `size`.
pub fn full_mip_count(size: Extent2D) -> u32 {
    32 - size.width.max(size.height).max(1).leading_zeros()
}

/// Texel data uploaded into one layer of one mip level.
#[derive(Debug, Clone, Copy)]
pub enum TexelData<'a> {
    /// 8-bit normalized channels, tightly packed.
    U8(&'a [u8]),
    /// 32-bit float channels, tightly packed.
    F32(&'a [f32]),
}

impl TexelData<'_> {
    /// Number of scalar channel values in the upload.
    pub fn len(&self) -> usize {
        match self {
            TexelData::U8(data) => data.len(),
            TexelData::F32(data) => data.len(),
        }
    }

    /// Returns `true` if there is nothing to upload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_count_depends_on_target() {
        let size = Extent2D::square(8);
        assert_eq!(TextureDescriptor::d2("a", size, TextureFormat::Rgba8).layer_count(), 1);
        assert_eq!(TextureDescriptor::cube("b", 8, TextureFormat::Rgba8).layer_count(), 6);
        assert_eq!(
            TextureDescriptor::d2_array("c", size, 4, TextureFormat::Depth32F).layer_count(),
            4
        );
        assert_eq!(
            TextureDescriptor::cube_array("d", 8, 3, TextureFormat::Depth32F).layer_count(),
            18
        );
    }

    #[test]
    fn full_mip_chain_reaches_one_texel() {
        assert_eq!(full_mip_count(Extent2D::new(256, 64)), 9);
        assert_eq!(full_mip_count(Extent2D::new(1, 1)), 1);
        let desc = TextureDescriptor::cube("env", 128, TextureFormat::Rgba16F).with_mips(20);
        assert_eq!(desc.mip_levels, 8);
        assert!(desc.mip_filter.is_some());
    }
}
