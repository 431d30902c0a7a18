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

//! The video settings profile that decides which GPU resources exist.
//!
//! A [`VideoSettings`] value is the key of a toolbox collection: the pipeline
//! derives the set of toolboxes (and their sizes and shader defines) from it
//! and rebuilds them only when the profile is replaced.

use crate::math::Extent2D;
use crate::renderer::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The lighting model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShadingAlgorithm {
    /// No lighting at all: every material renders its albedo (forward only).
    FullLit,
    /// Blinn-Phong deferred lighting.
    Phong,
    /// Cook-Torrance PBR deferred lighting.
    #[default]
    CookTorrance,
}

/// The anti-aliasing technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AntiAliasingAlgorithm {
    /// No anti-aliasing.
    #[default]
    None,
    /// Morphological SMAA on the current frame only.
    Smaa1x,
    /// SMAA with temporal reprojection of the previous frame.
    SmaaT2x,
}

/// A generic quality ladder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum SettingLevel {
    /// Feature disabled.
    None,
    /// Lowest quality.
    Low,
    /// Medium quality.
    #[default]
    Medium,
    /// High quality.
    High,
    /// Ultra quality.
    Ultra,
    /// Everything maxed out.
    Max,
}

impl SettingLevel {
    /// Zero for `None`, up to five for `Max`.
    pub fn rank(self) -> u32 {
        self as u32
    }
}

/// The HDR to LDR operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneMapping {
    /// `c / (1 + c)`.
    Reinhard,
    /// The Narkowicz fit of the ACES filmic curve.
    #[default]
    Aces,
}

/// A collection of video settings that determine which passes run and how
/// their resources are sized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Size of every screen-sized render target.
    pub resolution: Extent2D,
    /// The lighting model.
    pub shading: ShadingAlgorithm,
    /// The anti-aliasing technique.
    pub anti_aliasing: AntiAliasingAlgorithm,
    /// Whether bright areas bleed through a blurred bloom buffer.
    pub bloom: bool,
    /// Number of SSAO kernel samples; zero disables SSAO.
    pub ssao_samples: u32,
    /// Shadow quality. Levels above `Medium` re-render every shadow map every frame.
    pub shadows: SettingLevel,
    /// Parallax occlusion mapping quality.
    pub parallax_occlusion: SettingLevel,
    /// The gamma of the output display.
    pub monitor_gamma: f32,
    /// The tone-mapping operator.
    pub tone_mapping: ToneMapping,
    /// Exposure applied before tone mapping.
    pub exposure: f32,
    /// Layers of the 2D shadow-map array (directional and spot lights).
    pub max_shadow_maps: u32,
    /// Slots of the shadow cube-map array (point lights).
    pub max_shadow_cubemaps: u32,
    /// Ping-pong passes of the bloom blur.
    pub bloom_blur_passes: u32,
    /// Ping-pong passes of the SSAO blur.
    pub ssao_blur_passes: u32,
    /// Slots of the irradiance / prefilter cube-map arrays.
    pub max_light_probes: u32,
    /// Face size of probe environment cube maps.
    pub probe_resolution: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: Extent2D::new(1280, 720),
            shading: ShadingAlgorithm::CookTorrance,
            anti_aliasing: AntiAliasingAlgorithm::None,
            bloom: true,
            ssao_samples: 16,
            shadows: SettingLevel::Medium,
            parallax_occlusion: SettingLevel::Medium,
            monitor_gamma: 2.2,
            tone_mapping: ToneMapping::Aces,
            exposure: 1.0,
            max_shadow_maps: 8,
            max_shadow_cubemaps: 4,
            bloom_blur_passes: 6,
            ssao_blur_passes: 2,
            max_light_probes: 8,
            probe_resolution: 128,
        }
    }
}

impl VideoSettings {
    /// Parses a RON document; missing fields take their default value.
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(text)?)
    }

    /// Reads and parses a RON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_ron_str(&text)?;
        log::debug!("Loaded video settings from {}", path.as_ref().display());
        Ok(settings)
    }

    /// Serializes to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Writes the settings to `path` as RON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Returns `true` if the shading model runs the deferred lighting path.
    pub fn needs_lighting(&self) -> bool {
        self.shading != ShadingAlgorithm::FullLit
    }

    /// Returns `true` if shadow maps are rendered at all.
    pub fn shadows_enabled(&self) -> bool {
        self.needs_lighting() && self.shadows > SettingLevel::None
    }

    /// Returns `true` if every shadow map is re-rendered each frame regardless of caching.
    pub fn forces_dynamic_shadows(&self) -> bool {
        self.shadows > SettingLevel::Medium
    }

    /// Returns `true` if the SSAO pass runs.
    pub fn ssao_enabled(&self) -> bool {
        self.needs_lighting() && self.ssao_samples > 0
    }

    /// Returns `true` for either SMAA mode.
    pub fn smaa_enabled(&self) -> bool {
        self.anti_aliasing != AntiAliasingAlgorithm::None
    }

    /// Returns `true` for temporal SMAA, which also tracks per-pixel velocity.
    pub fn temporal_aa(&self) -> bool {
        self.anti_aliasing == AntiAliasingAlgorithm::SmaaT2x
    }

    /// Edge size of 2D shadow-map layers for the shadow level.
    pub fn shadow_map_resolution(&self) -> u32 {
        match self.shadows {
            SettingLevel::None => 1,
            SettingLevel::Low => 512,
            SettingLevel::Medium => 1024,
            SettingLevel::High => 2048,
            SettingLevel::Ultra | SettingLevel::Max => 4096,
        }
    }

    /// Face size of shadow cube maps for the shadow level.
    pub fn shadow_cubemap_resolution(&self) -> u32 {
        (self.shadow_map_resolution() / 2).max(1)
    }

    /// Ray-march steps of parallax occlusion mapping; zero disables it.
    pub fn parallax_steps(&self) -> u32 {
        match self.parallax_occlusion {
            SettingLevel::None => 0,
            level => 8 << (level.rank() - 1).min(3),
        }
    }

    /// The profile the light-probe baker renders with: maximum quality
    /// shading, no anti-aliasing, bloom or SSAO, no shadow maps of its own
    /// (they are borrowed from the live profile), at probe resolution.
    pub fn for_probe_baking(&self) -> Self {
        Self {
            resolution: Extent2D::square(self.probe_resolution.max(1)),
            shading: ShadingAlgorithm::CookTorrance,
            anti_aliasing: AntiAliasingAlgorithm::None,
            bloom: false,
            ssao_samples: 0,
            shadows: SettingLevel::None,
            parallax_occlusion: SettingLevel::Max,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_fields_take_defaults() {
        let settings =
            VideoSettings::from_ron_str("(shading: Phong, shadows: High, bloom: false)").unwrap();
        assert_eq!(settings.shading, ShadingAlgorithm::Phong);
        assert_eq!(settings.shadows, SettingLevel::High);
        assert!(!settings.bloom);
        assert_eq!(settings.resolution, VideoSettings::default().resolution);
        assert!(settings.forces_dynamic_shadows());
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = VideoSettings::from_ron_str("(shading: Gouraud)").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn load_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "(resolution: (width: 64, height: 32), anti_aliasing: SmaaT2x)"
        )
        .unwrap();
        let settings = VideoSettings::load(file.path()).unwrap();
        assert_eq!(settings.resolution, Extent2D::new(64, 32));
        assert!(settings.temporal_aa());
        assert!(settings.smaa_enabled());
    }

    #[test]
    fn save_then_load_preserves_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video.ron");
        let settings = VideoSettings {
            ssao_samples: 0,
            tone_mapping: ToneMapping::Reinhard,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(VideoSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn full_lit_disables_lighting_features() {
        let settings = VideoSettings {
            shading: ShadingAlgorithm::FullLit,
            ..Default::default()
        };
        assert!(!settings.needs_lighting());
        assert!(!settings.shadows_enabled());
        assert!(!settings.ssao_enabled());
    }

    #[test]
    fn shadow_levels_above_medium_are_dynamic() {
        let mut settings = VideoSettings::default();
        for (level, dynamic) in [
            (SettingLevel::None, false),
            (SettingLevel::Low, false),
            (SettingLevel::Medium, false),
            (SettingLevel::High, true),
            (SettingLevel::Max, true),
        ] {
            settings.shadows = level;
            assert_eq!(settings.forces_dynamic_shadows(), dynamic, "{level:?}");
        }
    }

    #[test]
    fn probe_profile_is_max_quality_without_shadows() {
        let probe = VideoSettings::default().for_probe_baking();
        assert_eq!(probe.resolution, Extent2D::square(128));
        assert_eq!(probe.shading, ShadingAlgorithm::CookTorrance);
        assert!(!probe.bloom && !probe.smaa_enabled() && !probe.ssao_enabled());
        assert_eq!(probe.shadows, SettingLevel::None);
    }
}
