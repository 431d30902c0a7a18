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

use crate::context::RenderContext;
use umbra_core::math::Mat4;
use umbra_core::renderer::{BufferId, ResourceError, MAX_BONES};

/// Bone matrices shared by the skinned meshes of one skeleton, double buffered.
///
/// Animation writes into the CPU staging array during the frame;
/// [`SkeletonBatch::swap`] uploads it into the back buffer and makes that the
/// front buffer the renderers bind.
#[derive(Debug)]
pub struct SkeletonBatch {
    buffers: [BufferId; 2],
    front: usize,
    bones: Vec<Mat4>,
}

impl SkeletonBatch {
    /// Allocates both buffers for `bone_count` bones (at most [`MAX_BONES`]).
    pub fn new(ctx: &mut RenderContext, bone_count: usize) -> Result<Self, ResourceError> {
        if bone_count > MAX_BONES {
            return Err(ResourceError::InvalidDescriptor(format!(
                "{bone_count} bones exceed the limit of {MAX_BONES}"
            )));
        }
        let size = bone_count.max(1) * std::mem::size_of::<Mat4>();
        let front = ctx.create_uniform_buffer("bones_a", size)?;
        let back = ctx.create_uniform_buffer("bones_b", size)?;
        let bones = vec![Mat4::IDENTITY; bone_count];
        let mut batch = Self {
            buffers: [front, back],
            front: 0,
            bones,
        };
        // Both buffers start as the bind pose.
        batch.swap(ctx)?;
        batch.swap(ctx)?;
        Ok(batch)
    }

    /// The staging matrices written by animation.
    pub fn bones_mut(&mut self) -> &mut [Mat4] {
        &mut self.bones
    }

    /// The staging matrices.
    pub fn bones(&self) -> &[Mat4] {
        &self.bones
    }

    /// The buffer renderers bind this frame.
    pub fn front_buffer(&self) -> BufferId {
        self.buffers[self.front]
    }

    /// Uploads the staging matrices to the back buffer and flips.
    pub fn swap(&mut self, ctx: &mut RenderContext) -> Result<(), ResourceError> {
        let back = 1 - self.front;
        ctx.write_uniform_buffer(self.buffers[back], 0, bytemuck::cast_slice(&self.bones))?;
        self.front = back;
        Ok(())
    }

    /// Destroys both buffers.
    pub fn release(self, ctx: &mut RenderContext) {
        for buffer in self.buffers {
            ctx.destroy_uniform_buffer(buffer);
        }
    }
}
