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

//! Helpers shared by the frame tests: a software-backed engine and a floor.

#![allow(dead_code)]

use std::f32::consts::FRAC_PI_3;
use std::sync::Arc;
use umbra_core::math::{Extent2D, LinearRgba, Mat4, Vec2, Vec3};
use umbra_core::renderer::{
    AntiAliasingAlgorithm, MemoryShaderSource, SettingLevel, ShadingAlgorithm, Vertex, VideoSettings,
};
use umbra_infra::SoftwareDevice;
use umbra_lanes::material::{Material, MaterialInstance};
use umbra_lanes::primitives::GpuMesh;
use umbra_lanes::scene::{Camera, MeshRenderable};
use umbra_lanes::{RenderContext, RenderEngine};

pub const SIZE: Extent2D = Extent2D::new(64, 48);

pub fn context() -> RenderContext {
    let device = SoftwareDevice::new(SIZE).expect("software device");
    RenderContext::new(Box::new(device), Box::new(MemoryShaderSource::builtin()), SIZE).expect("render context")
}

pub fn engine() -> RenderEngine {
    RenderEngine::new(context())
}

/// Small targets, no SSAO, bloom or anti-aliasing, and shadow arrays of one slot.
pub fn settings(shading: ShadingAlgorithm, shadows: SettingLevel) -> VideoSettings {
    VideoSettings {
        resolution: SIZE,
        shading,
        anti_aliasing: AntiAliasingAlgorithm::None,
        bloom: false,
        ssao_samples: 0,
        shadows,
        parallax_occlusion: SettingLevel::None,
        max_shadow_maps: 1,
        max_shadow_cubemaps: 1,
        max_light_probes: 1,
        probe_resolution: 8,
        ..VideoSettings::default()
    }
}

/// A 40 by 40 quad on the XZ plane, facing up.
pub fn floor(ctx: &mut RenderContext) -> GpuMesh {
    let s = 20.0;
    let corners = [(-s, -s, 0.0, 0.0), (-s, s, 0.0, 1.0), (s, s, 1.0, 1.0), (s, -s, 1.0, 0.0)];
    let vertices: Vec<Vertex> = corners
        .iter()
        .map(|&(x, z, u, v)| Vertex::new(Vec3::new(x, 0.0, z), Vec3::Y, Vec2::new(u, v)))
        .collect();
    ctx.create_mesh("floor", &vertices, &[0, 1, 2, 0, 2, 3]).expect("floor mesh")
}

pub fn floor_renderable(ctx: &mut RenderContext, albedo: LinearRgba) -> MeshRenderable {
    let material = MaterialInstance::new(Arc::new(Material::with_albedo(albedo)));
    MeshRenderable::new(floor(ctx), Mat4::IDENTITY, material)
}

/// Looks at the origin from above and behind; the centre pixel sees the origin.
pub fn camera() -> Camera {
    Camera::look_at(
        Vec3::new(0.0, 8.0, 8.0),
        Vec3::ZERO,
        FRAC_PI_3,
        SIZE.aspect_ratio(),
        0.1,
        100.0,
    )
}

pub fn pixel(pixels: &[LinearRgba], x: u32, y: u32) -> LinearRgba {
    pixels[(y * SIZE.width + x) as usize]
}

pub fn centre(pixels: &[LinearRgba]) -> LinearRgba {
    pixel(pixels, SIZE.width / 2, SIZE.height / 2)
}

pub fn corners(pixels: &[LinearRgba]) -> [LinearRgba; 4] {
    let (w, h) = (SIZE.width - 1, SIZE.height - 1);
    [pixel(pixels, 0, 0), pixel(pixels, w, 0), pixel(pixels, 0, h), pixel(pixels, w, h)]
}
