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

//! Defines the `LinearRgba` color type and associated operations.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

/// Represents a color in a **linear RGBA** color space using `f32` components.
///
/// Component values may exceed `1.0`; every HDR render target stores colours
/// in this form and only the tone-mapping pass brings them back to `[0, 1]`.
///
/// `#[repr(C)]` keeps the layout stable for uniform uploads.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct LinearRgba {
    /// The red component in linear space.
    pub r: f32,
    /// The green component in linear space.
    pub g: f32,
    /// The blue component in linear space.
    pub b: f32,
    /// The alpha (opacity) component.
    pub a: f32,
}

impl LinearRgba {
    /// Opaque white (`[1.0, 1.0, 1.0, 1.0]`).
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    /// Opaque black (`[0.0, 0.0, 0.0, 1.0]`).
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Fully transparent black (`[0.0, 0.0, 0.0, 0.0]`).
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new `LinearRgba` with explicit RGBA values.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque `LinearRgba` (alpha = 1.0).
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Creates a `LinearRgba` from a [`Vec4`].
    #[inline]
    pub fn from_vec4(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }

    /// Converts this colour to a [`Vec4`].
    #[inline]
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(self.r, self.g, self.b, self.a)
    }

    /// Returns the RGB part as a [`Vec3`].
    #[inline]
    pub fn rgb_vec(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    /// The largest of the three colour channels.
    #[inline]
    pub fn max_channel(self) -> f32 {
        self.r.max(self.g).max(self.b)
    }

    /// Returns a copy with a different alpha.
    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Converts an sRGB-encoded colour to linear space (alpha untouched).
    pub fn from_srgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgb(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b))
    }

    /// Encodes this colour to sRGB (alpha untouched).
    pub fn to_srgb(self) -> Self {
        Self::new(
            linear_to_srgb(self.r),
            linear_to_srgb(self.g),
            linear_to_srgb(self.b),
            self.a,
        )
    }

    /// Converts to 8-bit RGBA, clamping each channel to `[0, 1]`.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Returns `true` if every channel differs from `other` by at most `epsilon`.
    pub fn approx_eq(self, other: Self, epsilon: f32) -> bool {
        (self.r - other.r).abs() <= epsilon
            && (self.g - other.g).abs() <= epsilon
            && (self.b - other.b).abs() <= epsilon
            && (self.a - other.a).abs() <= epsilon
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

impl Default for LinearRgba {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<Vec4> for LinearRgba {
    fn from(v: Vec4) -> Self {
        Self::from_vec4(v)
    }
}

impl From<LinearRgba> for Vec4 {
    fn from(c: LinearRgba) -> Self {
        c.to_vec4()
    }
}

impl Add for LinearRgba {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b, self.a + rhs.a)
    }
}

impl Mul<f32> for LinearRgba {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.r * rhs, self.g * rhs, self.b * rhs, self.a * rhs)
    }
}

impl Mul for LinearRgba {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b, self.a * rhs.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn srgb_round_trip() {
        let c = LinearRgba::from_srgb(0.5, 0.25, 1.0).to_srgb();
        assert_relative_eq!(c.r, 0.5, epsilon = 1e-5);
        assert_relative_eq!(c.g, 0.25, epsilon = 1e-5);
        assert_relative_eq!(c.b, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn max_channel_ignores_alpha() {
        let c = LinearRgba::new(0.2, 0.9, 0.4, 5.0);
        assert_eq!(c.max_channel(), 0.9);
    }

    #[test]
    fn rgba8_clamps_hdr_values() {
        assert_eq!(LinearRgba::new(2.0, -1.0, 0.5, 1.0).to_rgba8(), [255, 0, 128, 255]);
    }
}
