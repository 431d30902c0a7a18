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
use crate::scene::{GameSceneRenderData, RenderInfo, Renderable};
use crate::shader::Shader;
use umbra_core::renderer::BINDING_BONES;

/// Draws skinned renderables with their skeleton's bone buffer bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkeletalMeshRenderer;

impl SkeletalMeshRenderer {
    /// Renders every skinned renderable accepted by `filter`, binding the
    /// front bone buffer of its batch first. Returns how many were drawn.
    pub fn render(
        ctx: &mut RenderContext,
        scene: &GameSceneRenderData,
        info: &RenderInfo<'_>,
        shader: Option<&Shader>,
        filter: impl Fn(&dyn Renderable) -> bool,
    ) -> usize {
        let mut drawn = 0;
        for renderable in scene.renderables() {
            let Some(skin) = renderable.skinning() else {
                continue;
            };
            if !filter(renderable) {
                continue;
            }
            let Some(batch) = scene.skeleton(skin.batch) else {
                log::warn!("Skinned renderable refers to a skeleton batch that is gone");
                continue;
            };
            ctx.bind_uniform_buffer(BINDING_BONES, Some(batch.front_buffer()));
            renderable.render(ctx, info, shader);
            drawn += 1;
        }
        if drawn > 0 {
            ctx.bind_uniform_buffer(BINDING_BONES, None);
        }
        drawn
    }
}
