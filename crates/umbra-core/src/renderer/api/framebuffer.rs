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

//! Framebuffers, attachments, clears and blits.

use crate::math::LinearRgba;
use std::fmt;

/// An opaque handle to a framebuffer object.
///
/// The default framebuffer (the window, or the software device's backbuffer)
/// is addressed as `None` wherever an `Option<FramebufferId>` is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub usize);

/// Where a texture is attached on a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    /// Color attachment `n`.
    Color(u32),
    /// Depth only.
    Depth,
    /// Combined depth and stencil.
    DepthStencil,
}

/// Which part of a layered texture an attachment covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttachmentLayer {
    /// Every layer (layered rendering, or a plain 2D texture).
    #[default]
    Whole,
    /// One layer. For cube maps this is the face, for cube arrays `slot * 6 + face`.
    Layer(u32),
}

/// The completeness of a framebuffer, decoded from the backend status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    /// Ready to render into.
    Complete,
    /// No image is attached at all.
    MissingAttachment,
    /// An attachment is not renderable (bad format, destroyed texture, bad layer).
    IncompleteAttachment,
    /// A draw buffer names a colour attachment that is absent.
    IncompleteDrawBuffer,
    /// Attachments do not share the same size.
    IncompleteDimensions,
    /// Some attachments are layered and others are not.
    IncompleteLayerTargets,
    /// The combination of formats is not supported by the implementation.
    Unsupported,
    /// A backend status code without a known meaning.
    Unknown(u32),
}

impl FramebufferStatus {
    /// Returns `true` for [`FramebufferStatus::Complete`].
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::MissingAttachment => write!(f, "no image is attached"),
            Self::IncompleteAttachment => {
                write!(f, "an attachment is incomplete or has an unrenderable format")
            }
            Self::IncompleteDrawBuffer => {
                write!(f, "a draw buffer points at a missing color attachment")
            }
            Self::IncompleteDimensions => write!(f, "attachments differ in size"),
            Self::IncompleteLayerTargets => {
                write!(f, "layered and non-layered attachments are mixed")
            }
            Self::Unsupported => write!(f, "the attachment formats are unsupported"),
            Self::Unknown(code) => write!(f, "unknown framebuffer status 0x{code:04X}"),
        }
    }
}

/// Which buffers a [`GraphicsDevice::clear`](crate::renderer::GraphicsDevice::clear) touches.
///
/// Clears ignore the colour, depth and stencil write masks of the current
/// raster state; colour is cleared on every active draw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearRequest {
    /// Clear every active draw buffer to this colour.
    pub color: Option<LinearRgba>,
    /// Clear depth to this value.
    pub depth: Option<f32>,
    /// Clear stencil to this value.
    pub stencil: Option<u8>,
}

impl ClearRequest {
    /// Colour, depth (1.0) and stencil (0).
    pub fn all(color: LinearRgba) -> Self {
        Self {
            color: Some(color),
            depth: Some(1.0),
            stencil: Some(0),
        }
    }

    /// Colour only.
    pub fn color(color: LinearRgba) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }

    /// Depth only, to the far plane.
    pub fn depth() -> Self {
        Self {
            depth: Some(1.0),
            ..Default::default()
        }
    }

    /// Stencil only.
    pub fn stencil(value: u8) -> Self {
        Self {
            stencil: Some(value),
            ..Default::default()
        }
    }
}

bitflags::bitflags! {
    /// The buffers copied by a blit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlitMask: u32 {
        /// The read colour buffer into the draw buffers.
        const COLOR = 1 << 0;
        /// The depth buffer.
        const DEPTH = 1 << 1;
        /// The stencil buffer.
        const STENCIL = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_reads_as_prose() {
        assert_eq!(
            FramebufferStatus::IncompleteDimensions.to_string(),
            "attachments differ in size"
        );
        assert_eq!(
            FramebufferStatus::Unknown(0x8CDD).to_string(),
            "unknown framebuffer status 0x8CDD"
        );
        assert!(FramebufferStatus::Complete.is_complete());
    }
}
