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

use super::{PingPong, SetupGuard};
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::error::ToolboxError;
use umbra_core::renderer::TextureFormat;

/// The current and previous anti-aliased frames of temporal SMAA.
#[derive(Debug)]
pub struct ComposedImageStorageToolbox {
    images: PingPong,
    current: usize,
}

impl ComposedImageStorageToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>) -> Result<Self, ToolboxError> {
        let size = guard.size();
        Ok(Self {
            images: PingPong::create(guard, "composed", size, TextureFormat::Rgba8)?,
            current: 0,
        })
    }

    /// Framebuffer of the frame being composed.
    pub fn current_framebuffer(&self) -> FramebufferHandle {
        self.images.framebuffers[self.current]
    }

    /// Texture of the frame being composed.
    pub fn current(&self) -> TextureHandle {
        self.images.textures[self.current]
    }

    /// Texture of the previous frame.
    pub fn previous(&self) -> TextureHandle {
        self.images.textures[1 - self.current]
    }

    /// Makes the current frame the previous one.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        self.images.release(ctx);
    }
}
