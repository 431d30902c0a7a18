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

//! RAII guards that put the mirrored device state back on drop.

use super::resources::FramebufferHandle;
use super::RenderContext;
use std::ops::{Deref, DerefMut};
use umbra_core::math::Rect;
use umbra_core::renderer::RasterState;

#[derive(Debug, Clone)]
pub(super) struct SavedState {
    pub raster: RasterState,
    pub framebuffer: Option<FramebufferHandle>,
    pub draw_buffers: Vec<u32>,
    pub viewport: Rect,
}

/// Borrows the context and restores raster state, framebuffer binding, draw
/// buffers and viewport when dropped, on every exit path.
///
/// Created by [`RenderContext::scope`] or, with a trace label,
/// [`RenderContext::pass`]. Scopes nest: a scope opened on a scope restores
/// to the inner state first.
pub struct StateScope<'a> {
    ctx: &'a mut RenderContext,
    saved: SavedState,
    pass: bool,
}

impl<'a> StateScope<'a> {
    pub(super) fn new(ctx: &'a mut RenderContext, pass: Option<&str>) -> Self {
        let saved = ctx.save_state();
        let pass = match pass {
            Some(label) => {
                ctx.begin_pass(label);
                true
            }
            None => false,
        };
        Self { ctx, saved, pass }
    }
}

impl Deref for StateScope<'_> {
    type Target = RenderContext;

    fn deref(&self) -> &RenderContext {
        self.ctx
    }
}

impl DerefMut for StateScope<'_> {
    fn deref_mut(&mut self) -> &mut RenderContext {
        self.ctx
    }
}

impl Drop for StateScope<'_> {
    fn drop(&mut self) {
        self.ctx.restore_state(&self.saved);
        if self.pass {
            self.ctx.end_pass();
        }
    }
}
