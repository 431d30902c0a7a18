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

//! A settings-keyed bundle of toolboxes.

use super::{Toolbox, ToolboxDescriptor, ToolboxKind, ToolboxType};
use crate::context::RenderContext;
use crate::error::ToolboxError;
use std::collections::BTreeMap;
use umbra_core::math::Extent2D;
use umbra_core::renderer::{AntiAliasingAlgorithm, ShadingAlgorithm, ToneMapping, VideoSettings};

/// The toolboxes one [`VideoSettings`] profile needs, at most one per kind.
///
/// A collection is built lazily from its settings, used by every render
/// with that profile (main scene, HUD, editor preview...) and disposed as a
/// unit. It must be [`dispose`](Self::dispose)d before being dropped.
#[derive(Debug)]
pub struct RenderToolboxCollection {
    name: String,
    settings: VideoSettings,
    toolboxes: BTreeMap<ToolboxKind, Toolbox>,
}

fn shading_index(shading: ShadingAlgorithm) -> u32 {
    match shading {
        ShadingAlgorithm::FullLit => 0,
        ShadingAlgorithm::Phong => 1,
        ShadingAlgorithm::CookTorrance => 2,
    }
}

impl RenderToolboxCollection {
    /// An empty collection for `settings`.
    pub fn new(name: &str, settings: VideoSettings) -> Self {
        Self {
            name: name.to_string(),
            settings,
            toolboxes: BTreeMap::new(),
        }
    }

    /// The collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The settings the collection is built for.
    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// The toolboxes `settings` requires, in build order. Allocates nothing.
    pub fn required_toolboxes(settings: &VideoSettings) -> Vec<ToolboxDescriptor> {
        let size = settings.resolution;
        let shading = shading_index(settings.shading);
        let lighting = settings.needs_lighting();
        let mut required = vec![
            ToolboxDescriptor::new(ToolboxKind::MainFramebuffer, size),
            ToolboxDescriptor::new(ToolboxKind::ForwardShading, size).with_define("SHADING", shading),
        ];
        if lighting {
            required.push(
                ToolboxDescriptor::new(ToolboxKind::DeferredShading, size)
                    .with_define("SHADING", shading)
                    .with_define("POM_STEPS", settings.parallax_steps())
                    .with_define("TEMPORAL", u8::from(settings.temporal_aa())),
            );
        }
        if lighting && settings.shadows_enabled() {
            let edge = settings.shadow_map_resolution();
            required.push(ToolboxDescriptor::new(
                ToolboxKind::ShadowMapping,
                Extent2D::square(edge),
            ));
        }
        if lighting && settings.ssao_enabled() {
            required.push(ToolboxDescriptor::new(ToolboxKind::Ssao, size));
        }
        if settings.bloom {
            let half = Extent2D::new((size.width / 2).max(1), (size.height / 2).max(1));
            required.push(ToolboxDescriptor::new(ToolboxKind::GaussianBlur, half));
        }
        if settings.smaa_enabled() {
            required.push(
                ToolboxDescriptor::new(ToolboxKind::Smaa, size)
                    .with_define("SMAA_T2X", u8::from(settings.anti_aliasing == AntiAliasingAlgorithm::SmaaT2x)),
            );
        }
        if settings.temporal_aa() {
            required.push(ToolboxDescriptor::new(ToolboxKind::ComposedImageStorage, size));
        }
        let tone_mapping = match settings.tone_mapping {
            ToneMapping::Reinhard => 0,
            ToneMapping::Aces => 1,
        };
        required.push(
            ToolboxDescriptor::new(ToolboxKind::FinalRenderTarget, size)
                .with_define("TONE_MAPPING", tone_mapping),
        );
        required
    }

    /// Builds every required toolbox that is not present yet. Returns how many were added.
    ///
    /// ## Errors
    /// * Any [`ToolboxError`] from a toolbox setup. Toolboxes built before the
    ///   failure stay in the collection.
    pub fn add_tbs_required_by_settings(&mut self, ctx: &mut RenderContext) -> Result<usize, ToolboxError> {
        let mut added = 0;
        for descriptor in Self::required_toolboxes(&self.settings) {
            if self.toolboxes.contains_key(&descriptor.kind) {
                continue;
            }
            let toolbox = Toolbox::setup(ctx, &descriptor, &self.settings, &self.toolboxes)?;
            self.toolboxes.insert(descriptor.kind, toolbox);
            added += 1;
        }
        if added > 0 {
            log::info!(
                "Collection '{}' built {added} toolbox(es), {} in total",
                self.name,
                self.toolboxes.len()
            );
        }
        Ok(added)
    }

    /// Adds a toolbox built elsewhere.
    ///
    /// ## Errors
    /// * `ToolboxError::Duplicate` if one of its kind is present; the offered
    ///   toolbox is disposed.
    pub fn add_tb(&mut self, ctx: &mut RenderContext, toolbox: Toolbox) -> Result<(), ToolboxError> {
        let kind = toolbox.kind();
        if self.toolboxes.contains_key(&kind) {
            toolbox.dispose(ctx);
            return Err(ToolboxError::Duplicate(kind));
        }
        self.toolboxes.insert(kind, toolbox);
        Ok(())
    }

    /// The toolbox of type `T`.
    pub fn get_tb<T: ToolboxType>(&self) -> Option<&T> {
        self.toolboxes.get(&T::KIND).and_then(T::from_toolbox)
    }

    /// The toolbox of type `T`, mutably.
    pub fn get_tb_mut<T: ToolboxType>(&mut self) -> Option<&mut T> {
        self.toolboxes.get_mut(&T::KIND).and_then(T::from_toolbox_mut)
    }

    /// Removes and returns the toolbox of type `T`. The caller must dispose it.
    pub fn take_tb<T: ToolboxType>(&mut self) -> Option<Toolbox> {
        self.toolboxes.remove(&T::KIND)
    }

    /// Returns `true` if a toolbox of `kind` is present.
    pub fn contains(&self, kind: ToolboxKind) -> bool {
        self.toolboxes.contains_key(&kind)
    }

    /// The kinds present, in build order.
    pub fn kinds(&self) -> Vec<ToolboxKind> {
        self.toolboxes.keys().copied().collect()
    }

    /// Number of toolboxes.
    pub fn len(&self) -> usize {
        self.toolboxes.len()
    }

    /// Returns `true` if the collection holds no toolbox.
    pub fn is_empty(&self) -> bool {
        self.toolboxes.is_empty()
    }

    /// Releases every toolbox, last built first. The collection stays usable
    /// and can be rebuilt.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        let count = self.toolboxes.len();
        while let Some((_, toolbox)) = self.toolboxes.pop_last() {
            toolbox.dispose(ctx);
        }
        if count > 0 {
            log::info!("Collection '{}' disposed {count} toolbox(es)", self.name);
        }
    }

    /// Disposes everything and rebuilds for new settings.
    pub fn replace_settings(&mut self, ctx: &mut RenderContext, settings: VideoSettings) -> Result<usize, ToolboxError> {
        self.dispose(ctx);
        self.settings = settings;
        self.add_tbs_required_by_settings(ctx)
    }
}

impl Drop for RenderToolboxCollection {
    fn drop(&mut self) {
        if !self.toolboxes.is_empty() {
            log::warn!(
                "Collection '{}' dropped without dispose, leaking {} toolbox(es)",
                self.name,
                self.toolboxes.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::renderer::SettingLevel;

    fn kinds(settings: &VideoSettings) -> Vec<ToolboxKind> {
        RenderToolboxCollection::required_toolboxes(settings)
            .into_iter()
            .map(|d| d.kind)
            .collect()
    }

    #[test]
    fn full_lit_needs_only_the_forward_path() {
        let settings = VideoSettings {
            shading: ShadingAlgorithm::FullLit,
            bloom: false,
            ..Default::default()
        };
        assert_eq!(
            kinds(&settings),
            vec![
                ToolboxKind::MainFramebuffer,
                ToolboxKind::ForwardShading,
                ToolboxKind::FinalRenderTarget
            ]
        );
    }

    #[test]
    fn lighting_features_follow_the_settings() {
        let settings = VideoSettings {
            shading: ShadingAlgorithm::Phong,
            shadows: SettingLevel::High,
            ssao_samples: 8,
            bloom: true,
            anti_aliasing: AntiAliasingAlgorithm::SmaaT2x,
            ..Default::default()
        };
        assert_eq!(
            kinds(&settings),
            vec![
                ToolboxKind::MainFramebuffer,
                ToolboxKind::ForwardShading,
                ToolboxKind::DeferredShading,
                ToolboxKind::ShadowMapping,
                ToolboxKind::Ssao,
                ToolboxKind::GaussianBlur,
                ToolboxKind::Smaa,
                ToolboxKind::ComposedImageStorage,
                ToolboxKind::FinalRenderTarget,
            ]
        );
    }

    #[test]
    fn shadows_and_ssao_need_lighting() {
        let settings = VideoSettings {
            shading: ShadingAlgorithm::FullLit,
            shadows: SettingLevel::Ultra,
            ssao_samples: 16,
            ..Default::default()
        };
        let kinds = kinds(&settings);
        assert!(!kinds.contains(&ToolboxKind::ShadowMapping));
        assert!(!kinds.contains(&ToolboxKind::Ssao));
    }

    #[test]
    fn smaa_1x_keeps_no_history() {
        let settings = VideoSettings {
            anti_aliasing: AntiAliasingAlgorithm::Smaa1x,
            ..Default::default()
        };
        let kinds = kinds(&settings);
        assert!(kinds.contains(&ToolboxKind::Smaa));
        assert!(!kinds.contains(&ToolboxKind::ComposedImageStorage));
    }

    #[test]
    fn bloom_runs_at_half_resolution() {
        let settings = VideoSettings {
            resolution: Extent2D::new(640, 360),
            bloom: true,
            ..Default::default()
        };
        let blur = RenderToolboxCollection::required_toolboxes(&settings)
            .into_iter()
            .find(|d| d.kind == ToolboxKind::GaussianBlur);
        assert_eq!(blur.map(|d| d.size), Some(Extent2D::new(320, 180)));
    }
}
