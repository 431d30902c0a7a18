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

//! Fixed-function raster state: depth, stencil, blending, culling and colour writes.
//!
//! The pipeline is immediate-mode: a [`RasterState`] is applied to the device
//! and stays in effect for every following draw until replaced.

use serde::{Deserialize, Serialize};

/// A comparison used by the depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the incoming value is less than the stored value.
    #[default]
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the incoming value is less than or equal to the stored value.
    LessEqual,
    /// Passes if the incoming value is greater than the stored value.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the incoming value is greater than or equal to the stored value.
    GreaterEqual,
    /// Always passes.
    Always,
}

impl CompareFunction {
    /// Evaluates `incoming <op> stored`.
    pub fn passes<T: PartialOrd>(self, incoming: T, stored: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => incoming < stored,
            Self::Equal => incoming == stored,
            Self::LessEqual => incoming <= stored,
            Self::Greater => incoming > stored,
            Self::NotEqual => incoming != stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Always => true,
        }
    }
}

/// What happens to a stencil value after a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set to zero.
    Zero,
    /// Set to the reference value.
    Replace,
    /// Increment, clamping at the maximum.
    IncrementClamp,
    /// Increment, wrapping to zero.
    IncrementWrap,
    /// Decrement, clamping at zero.
    DecrementClamp,
    /// Decrement, wrapping to the maximum.
    DecrementWrap,
    /// Bitwise invert.
    Invert,
}

impl StencilOperation {
    /// Applies the operation to `current`; only bits in `write_mask` change.
    pub fn apply(self, current: u8, reference: u8, write_mask: u8) -> u8 {
        let updated = match self {
            Self::Keep => current,
            Self::Zero => 0,
            Self::Replace => reference,
            Self::IncrementClamp => current.saturating_add(1),
            Self::IncrementWrap => current.wrapping_add(1),
            Self::DecrementClamp => current.saturating_sub(1),
            Self::DecrementWrap => current.wrapping_sub(1),
            Self::Invert => !current,
        };
        (current & !write_mask) | (updated & write_mask)
    }
}

/// The stencil test, shared by front and back faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// Comparison of `reference & read_mask` against `stored & read_mask`.
    pub compare: CompareFunction,
    /// The reference value.
    pub reference: u8,
    /// Bits taking part in the comparison.
    pub read_mask: u8,
    /// Bits the operations may change.
    pub write_mask: u8,
    /// Operation when the stencil test fails.
    pub fail_op: StencilOperation,
    /// Operation when the stencil test passes and the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// Operation when both tests pass.
    pub pass_op: StencilOperation,
}

impl StencilState {
    /// A test that never changes the buffer.
    pub fn test_only(compare: CompareFunction, reference: u8) -> Self {
        Self {
            compare,
            reference,
            read_mask: 0xFF,
            write_mask: 0x00,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
        }
    }

    /// Evaluates the stencil comparison against a stored value.
    pub fn passes(&self, stored: u8) -> bool {
        self.compare
            .passes(self.reference & self.read_mask, stored & self.read_mask)
    }
}

/// A blending coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0`.
    Zero,
    /// `1`.
    One,
    /// Source colour.
    SrcColor,
    /// `1 - source colour`.
    OneMinusSrcColor,
    /// Source alpha.
    SrcAlpha,
    /// `1 - source alpha`.
    OneMinusSrcAlpha,
    /// Destination colour.
    DstColor,
    /// Destination alpha.
    DstAlpha,
    /// `1 - destination alpha`.
    OneMinusDstAlpha,
}

/// How the weighted source and destination are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOperation {
    /// `src + dst`.
    #[default]
    Add,
    /// `src - dst`.
    Subtract,
    /// `dst - src`.
    ReverseSubtract,
    /// Component-wise minimum.
    Min,
    /// Component-wise maximum.
    Max,
}

/// Colour blending, applied to every draw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Source factor.
    pub src_factor: BlendFactor,
    /// Destination factor.
    pub dst_factor: BlendFactor,
    /// Combining operation.
    pub operation: BlendOperation,
}

impl BlendState {
    /// `src + dst`, used to accumulate light contributions.
    pub const ADDITIVE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    };

    /// Classic "over" compositing.
    pub const ALPHA_BLENDING: Self = Self {
        src_factor: BlendFactor::SrcAlpha,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

/// Which triangle faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Keep both.
    None,
    /// Discard counter-clockwise (front) faces.
    Front,
    /// Discard clockwise (back) faces.
    #[default]
    Back,
}

bitflags::bitflags! {
    /// Colour channels a draw may write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        /// The red channel.
        const RED = 1 << 0;
        /// The green channel.
        const GREEN = 1 << 1;
        /// The blue channel.
        const BLUE = 1 << 2;
        /// The alpha channel.
        const ALPHA = 1 << 3;
        /// All four channels.
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// The complete fixed-function state for subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterState {
    /// Depth comparison, `None` disables the depth test (and depth writes).
    pub depth_test: Option<CompareFunction>,
    /// Whether passing fragments write depth.
    pub depth_write: bool,
    /// Stencil test, `None` disables it.
    pub stencil: Option<StencilState>,
    /// Blending, `None` replaces the destination.
    pub blend: Option<BlendState>,
    /// Face culling.
    pub cull: CullMode,
    /// Channels written to the draw buffers.
    pub color_writes: ColorWrites,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            depth_test: Some(CompareFunction::Less),
            depth_write: true,
            stencil: None,
            blend: None,
            cull: CullMode::Back,
            color_writes: ColorWrites::ALL,
        }
    }
}

impl RasterState {
    /// No depth, no stencil, no culling, no blending: the state of full-screen passes.
    pub fn fullscreen() -> Self {
        Self {
            depth_test: None,
            depth_write: false,
            cull: CullMode::None,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_respects_write_mask() {
        assert_eq!(StencilOperation::Invert.apply(0x00, 0, 0xFF), 0xFF);
        assert_eq!(StencilOperation::Invert.apply(0xFF, 0, 0xFF), 0x00);
        assert_eq!(StencilOperation::Invert.apply(0x00, 0, 0x0F), 0x0F);
        assert_eq!(StencilOperation::Keep.apply(0x42, 0, 0xFF), 0x42);
    }

    #[test]
    fn stencil_equal_uses_read_mask() {
        let state = StencilState::test_only(CompareFunction::Equal, 0xFF);
        assert!(state.passes(0xFF));
        assert!(!state.passes(0x00));
    }

    #[test]
    fn compare_function_matches_gl_semantics() {
        assert!(CompareFunction::LessEqual.passes(0.5, 0.5));
        assert!(!CompareFunction::Less.passes(0.5, 0.5));
        assert!(CompareFunction::Always.passes(2.0, 0.0));
        assert!(!CompareFunction::Never.passes(0.0, 2.0));
    }
}
