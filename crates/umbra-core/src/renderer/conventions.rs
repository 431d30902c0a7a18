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

//! Texture units, uniform binding points and attachment indices shared by
//! shaders and passes.

/// G-buffer albedo (rgb) and specular (a).
pub const UNIT_GBUFFER_ALBEDO_SPEC: u32 = 0;
/// G-buffer world position.
pub const UNIT_GBUFFER_POSITION: u32 = 1;
/// G-buffer world normal.
pub const UNIT_GBUFFER_NORMAL: u32 = 2;
/// G-buffer roughness, metallic, ambient occlusion.
pub const UNIT_GBUFFER_PBR: u32 = 3;
/// Blurred ambient occlusion.
pub const UNIT_SSAO: u32 = 4;
/// Generic unit for full-screen sources (blur input, tone-mapping input).
pub const UNIT_SOURCE: u32 = 5;
/// Second full-screen source (bloom, previous frame, velocity).
pub const UNIT_SOURCE_AUX: u32 = 6;
/// Third full-screen source (SMAA weights, SSAO noise).
pub const UNIT_SOURCE_EXTRA: u32 = 7;
/// 2D shadow-map array.
pub const UNIT_SHADOW_MAPS: u32 = 10;
/// Shadow cube-map array.
pub const UNIT_SHADOW_CUBEMAPS: u32 = 11;
/// Irradiance cube-map array.
pub const UNIT_IRRADIANCE: u32 = 12;
/// Prefiltered environment cube-map array.
pub const UNIT_PREFILTER: u32 = 13;
/// BRDF integration lookup table.
pub const UNIT_BRDF_LUT: u32 = 14;

/// Lights uniform block.
pub const BINDING_LIGHTS: u32 = 0;
/// Bone matrices uniform block.
pub const BINDING_BONES: u32 = 1;

/// Bytes before the first [`LightUniform`](crate::renderer::LightUniform) of
/// the lights block: the light count as an `i32`, padded to 16 bytes.
pub const LIGHTS_BLOCK_HEADER: usize = 16;

/// G-buffer colour attachment: albedo and specular.
pub const GBUFFER_ALBEDO_SPEC: u32 = 0;
/// G-buffer colour attachment: world position.
pub const GBUFFER_POSITION: u32 = 1;
/// G-buffer colour attachment: world normal.
pub const GBUFFER_NORMAL: u32 = 2;
/// G-buffer colour attachment: PBR parameters.
pub const GBUFFER_PBR: u32 = 3;
/// G-buffer colour attachment: velocity (temporal AA only).
pub const GBUFFER_VELOCITY: u32 = 4;

/// Main framebuffer colour attachment: HDR colour.
pub const MAIN_HDR_COLOR: u32 = 0;
/// Main framebuffer colour attachment: bright colour (bloom input).
pub const MAIN_BRIGHT_COLOR: u32 = 1;
/// Main framebuffer colour attachment: velocity (temporal AA only).
pub const MAIN_VELOCITY: u32 = 2;

/// Maximum bones a skeleton batch may upload.
pub const MAX_BONES: usize = 128;
