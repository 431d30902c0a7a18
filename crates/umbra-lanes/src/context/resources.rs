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

//! Generation-checked bookkeeping of the textures and framebuffers the
//! pipeline allocates.
//!
//! Textures are shared: a depth/stencil texture is attached to both the main
//! and the G-buffer framebuffers, ping-pong textures move between passes. Each
//! texture therefore carries an explicit reference count; framebuffers retain
//! what they attach and release it when destroyed. Handles are slotmap keys,
//! so a handle kept past its texture's destruction resolves to nothing instead
//! of to whatever reused the slot.

use slotmap::{new_key_type, SlotMap};
use umbra_core::math::Extent2D;
use umbra_core::renderer::{AttachmentLayer, AttachmentPoint, FramebufferId, TextureDescriptor, TextureId};

new_key_type! {
    /// A reference-counted texture owned by the [`GpuResources`] arena.
    pub struct TextureHandle;
    /// A framebuffer owned by the [`GpuResources`] arena.
    pub struct FramebufferHandle;
}

/// A live texture.
#[derive(Debug, Clone)]
pub struct TextureEntry {
    /// The device texture.
    pub id: TextureId,
    /// How it was created.
    pub descriptor: TextureDescriptor,
    refs: u32,
}

impl TextureEntry {
    /// Current reference count.
    pub fn refs(&self) -> u32 {
        self.refs
    }
}

/// One attachment of a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    /// Where it is attached.
    pub point: AttachmentPoint,
    /// The texture.
    pub texture: TextureHandle,
    /// The mip level rendered into.
    pub mip: u32,
    /// The layer rendered into.
    pub layer: AttachmentLayer,
}

/// A live framebuffer.
#[derive(Debug, Clone)]
pub struct FramebufferEntry {
    /// The device framebuffer.
    pub id: FramebufferId,
    /// A debug label.
    pub label: String,
    /// Current attachments, at most one per point.
    pub attachments: Vec<Attachment>,
    /// Size of the attached level.
    pub size: Extent2D,
}

impl FramebufferEntry {
    /// Number of colour attachment slots in use (highest index plus one).
    pub fn color_attachment_count(&self) -> u32 {
        self.attachments
            .iter()
            .filter_map(|a| match a.point {
                AttachmentPoint::Color(i) => Some(i + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// The texture attached at `point`.
    pub fn attachment(&self, point: AttachmentPoint) -> Option<TextureHandle> {
        self.attachments
            .iter()
            .find(|a| a.point == point)
            .map(|a| a.texture)
    }
}

/// The arena.
#[derive(Debug, Default)]
pub struct GpuResources {
    textures: SlotMap<TextureHandle, TextureEntry>,
    framebuffers: SlotMap<FramebufferHandle, FramebufferEntry>,
}

impl GpuResources {
    /// An empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly created texture with one reference.
    pub fn insert_texture(&mut self, id: TextureId, descriptor: TextureDescriptor) -> TextureHandle {
        self.textures.insert(TextureEntry {
            id,
            descriptor,
            refs: 1,
        })
    }

    /// Looks up a texture.
    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureEntry> {
        self.textures.get(handle)
    }

    /// Adds a reference. Returns `false` for a stale handle.
    pub fn retain_texture(&mut self, handle: TextureHandle) -> bool {
        match self.textures.get_mut(handle) {
            Some(entry) => {
                entry.refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drops a reference. When it was the last one the entry is removed and
    /// the device texture returned so the caller can destroy it.
    pub fn release_texture(&mut self, handle: TextureHandle) -> Option<TextureId> {
        let entry = self.textures.get_mut(handle)?;
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.textures.remove(handle).map(|entry| entry.id)
        } else {
            None
        }
    }

    /// Records a freshly created framebuffer.
    pub fn insert_framebuffer(&mut self, id: FramebufferId, label: &str, size: Extent2D) -> FramebufferHandle {
        self.framebuffers.insert(FramebufferEntry {
            id,
            label: label.to_string(),
            attachments: Vec::new(),
            size,
        })
    }

    /// Looks up a framebuffer.
    pub fn framebuffer(&self, handle: FramebufferHandle) -> Option<&FramebufferEntry> {
        self.framebuffers.get(handle)
    }

    /// Replaces the attachment at `attachment.point`, returning the texture it displaced.
    /// The caller is responsible for retaining the new texture and releasing the old one.
    pub fn set_attachment(
        &mut self,
        framebuffer: FramebufferHandle,
        attachment: Attachment,
        size: Extent2D,
    ) -> Option<Option<TextureHandle>> {
        let entry = self.framebuffers.get_mut(framebuffer)?;
        let previous = entry
            .attachments
            .iter()
            .position(|a| a.point == attachment.point)
            .map(|index| entry.attachments.swap_remove(index).texture);
        entry.attachments.push(attachment);
        entry.size = size;
        Some(previous)
    }

    /// Removes a framebuffer, returning its entry so the caller can release its attachments.
    pub fn remove_framebuffer(&mut self, handle: FramebufferHandle) -> Option<FramebufferEntry> {
        self.framebuffers.remove(handle)
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of live framebuffers.
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::TextureFormat;

    fn descriptor() -> TextureDescriptor {
        TextureDescriptor::d2("t", Extent2D::square(4), TextureFormat::Rgba8)
    }

    #[test]
    fn last_release_returns_device_texture() {
        let mut arena = GpuResources::new();
        let handle = arena.insert_texture(TextureId(7), descriptor());
        assert!(arena.retain_texture(handle));
        assert_eq!(arena.release_texture(handle), None);
        assert_eq!(arena.release_texture(handle), Some(TextureId(7)));
        assert!(arena.texture(handle).is_none());
    }

    #[test]
    fn stale_handle_does_not_alias_new_texture() {
        let mut arena = GpuResources::new();
        let old = arena.insert_texture(TextureId(1), descriptor());
        arena.release_texture(old);
        let new = arena.insert_texture(TextureId(2), descriptor());
        assert!(arena.texture(old).is_none());
        assert!(!arena.retain_texture(old));
        assert_eq!(arena.texture(new).map(|t| t.id), Some(TextureId(2)));
    }

    #[test]
    fn attachment_replacement_reports_previous_texture() {
        let mut arena = GpuResources::new();
        let fb = arena.insert_framebuffer(FramebufferId(0), "fb", Extent2D::square(4));
        let a = arena.insert_texture(TextureId(1), descriptor());
        let b = arena.insert_texture(TextureId(2), descriptor());
        let attach = |texture| Attachment {
            point: AttachmentPoint::Color(1),
            texture,
            mip: 0,
            layer: AttachmentLayer::Whole,
        };
        assert_eq!(arena.set_attachment(fb, attach(a), Extent2D::square(4)), Some(None));
        assert_eq!(arena.set_attachment(fb, attach(b), Extent2D::square(4)), Some(Some(a)));
        let entry = arena.framebuffer(fb).unwrap();
        assert_eq!(entry.color_attachment_count(), 2);
        assert_eq!(entry.attachment(AttachmentPoint::Color(1)), Some(b));
    }
}
