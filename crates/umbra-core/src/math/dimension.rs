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

//! Integer extents and rectangles for render targets and viewports.

use serde::{Deserialize, Serialize};

/// A two-dimensional extent, typically a texture or framebuffer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// The width component of the extent.
    pub width: u32,
    /// The height component of the extent.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A square extent.
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Width divided by height, or `1.0` for a degenerate extent.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Number of pixels covered by the extent.
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The extent of mip level `level`, never smaller than 1x1.
    pub fn mip(&self, level: u32) -> Self {
        Self::new((self.width >> level).max(1), (self.height >> level).max(1))
    }

    /// The full rectangle starting at the origin.
    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// A pixel rectangle with its origin in the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Creates a new rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The size of the rectangle.
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_extent_never_reaches_zero() {
        let e = Extent2D::new(16, 4);
        assert_eq!(e.mip(1), Extent2D::new(8, 2));
        assert_eq!(e.mip(3), Extent2D::new(2, 1));
        assert_eq!(e.mip(10), Extent2D::new(1, 1));
    }

    #[test]
    fn aspect_ratio_of_empty_extent() {
        assert_eq!(Extent2D::default().aspect_ratio(), 1.0);
        assert_eq!(Extent2D::new(1920, 1080).aspect_ratio(), 1920.0 / 1080.0);
    }
}
