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

// Umbra sandbox
// Renders a small lit scene headless and writes the frame to a PNG.
//
// Usage: sandbox [settings.ron] [output.png]

use std::f32::consts::{FRAC_PI_2, FRAC_PI_3};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use umbra_core::math::{Extent2D, LinearRgba, Mat4, Quat, Vec3};
use umbra_core::renderer::{
    LightComponent, LightProbe, LightType, LineVertex, MemoryShaderSource, VideoSettings,
};
use umbra_infra::SoftwareDevice;
use umbra_lanes::material::{Material, MaterialInstance, MaterialShading};
use umbra_lanes::primitives::Primitives;
use umbra_lanes::render_lane::{RenderTarget, DEFAULT_BAKE_ITERATIONS};
use umbra_lanes::scene::{Camera, GameSceneRenderData, MeshRenderable};
use umbra_lanes::{RenderContext, RenderEngine};

const DEFAULT_SETTINGS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/settings.ron");
const FRAME_TIME: f32 = 1.0 / 60.0;

fn lit(albedo: LinearRgba, roughness: f32, metallic: f32) -> MaterialInstance {
    MaterialInstance::new(Arc::new(Material {
        albedo,
        roughness,
        metallic,
        ..Material::default()
    }))
}

fn transform(scale: f32, rotation: Quat, translation: Vec3) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, translation)
}

fn populate(scene: &mut GameSceneRenderData, primitives: Primitives, size: Extent2D) {
    let floor = transform(10.0, Quat::from_rotation_x(-FRAC_PI_2), Vec3::ZERO);
    scene.add_renderable(Box::new(MeshRenderable::new(
        primitives.quad,
        floor,
        lit(LinearRgba::rgb(0.6, 0.6, 0.55), 0.8, 0.0),
    )));
    scene.add_renderable(Box::new(MeshRenderable::new(
        primitives.cube,
        transform(1.0, Quat::from_rotation_y(0.6), Vec3::new(0.0, 1.0, 0.0)),
        lit(LinearRgba::rgb(0.8, 0.15, 0.1), 0.4, 0.0),
    )));
    scene.add_renderable(Box::new(MeshRenderable::new(
        primitives.sphere,
        transform(0.8, Quat::IDENTITY, Vec3::new(2.5, 0.8, 1.0)),
        lit(LinearRgba::rgb(0.9, 0.8, 0.5), 0.25, 1.0),
    )));

    let lamp = Vec3::new(-2.0, 2.5, 2.0);
    scene.add_renderable(Box::new(
        MeshRenderable::new(
            primitives.sphere,
            transform(0.15, Quat::IDENTITY, lamp),
            MaterialInstance::new(Arc::new(Material::with_albedo(LinearRgba::rgb(4.0, 3.0, 2.0)))),
        )
        .with_shading(MaterialShading::Unlit),
    ));

    scene.add_light(
        LightComponent::new(LightType::Directional)
            .with_direction(Vec3::new(-0.4, -1.0, -0.3).normalize())
            .with_colors(
                LinearRgba::rgb(0.05, 0.05, 0.07),
                LinearRgba::rgb(0.8, 0.8, 0.75),
                LinearRgba::WHITE,
            ),
    );
    scene.add_light(
        LightComponent::new(LightType::Point)
            .with_position(lamp)
            .with_colors(LinearRgba::BLACK, LinearRgba::rgb(1.0, 0.75, 0.5), LinearRgba::WHITE)
            .with_attenuation(0.3),
    );
    scene.add_light(
        LightComponent::new(LightType::Spot)
            .with_position(Vec3::new(3.0, 4.0, -2.0))
            .with_direction(Vec3::new(-0.5, -1.0, 0.4).normalize())
            .with_colors(LinearRgba::BLACK, LinearRgba::rgb(0.3, 0.5, 1.0), LinearRgba::WHITE)
            .with_attenuation(0.05),
    );

    let origin = Vec3::new(-4.0, 0.01, -4.0);
    for (axis, color) in [
        (Vec3::X, [1.0, 0.0, 0.0, 1.0]),
        (Vec3::Y, [0.0, 1.0, 0.0, 1.0]),
        (Vec3::Z, [0.0, 0.0, 1.0, 1.0]),
    ] {
        scene.debug_lines.push(LineVertex {
            position: origin.to_array(),
            color,
        });
        scene.debug_lines.push(LineVertex {
            position: (origin + axis).to_array(),
            color,
        });
    }

    scene.clear_color = LinearRgba::rgb(0.02, 0.03, 0.05);
    scene.camera = Camera::look_at(
        Vec3::new(6.0, 5.0, 8.0),
        Vec3::new(0.0, 0.5, 0.0),
        FRAC_PI_3,
        size.aspect_ratio(),
        0.1,
        100.0,
    );
}

/// Converts the bottom-up surface read-back into a top-down RGBA8 image.
fn to_image(pixels: &[LinearRgba], size: Extent2D) -> Vec<u8> {
    let width = size.width as usize;
    let mut bytes = Vec::with_capacity(pixels.len() * 4);
    for row in pixels.chunks(width).rev() {
        for pixel in row {
            bytes.extend_from_slice(&pixel.to_rgba8());
        }
    }
    bytes
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let settings_path = args.next().map_or_else(|| PathBuf::from(DEFAULT_SETTINGS), PathBuf::from);
    let output = args.next().map_or_else(|| PathBuf::from("frame.png"), PathBuf::from);

    let settings = VideoSettings::load(&settings_path)
        .with_context(|| format!("reading {}", settings_path.display()))?;
    let size = settings.resolution;
    log::info!("Rendering a {}x{} frame with {:?} shading", size.width, size.height, settings.shading);

    let device = SoftwareDevice::new(size)?;
    let ctx = RenderContext::new(Box::new(device), Box::new(MemoryShaderSource::builtin()), size)?;
    let mut engine = RenderEngine::new(ctx);
    let collection = engine.create_collection("sandbox", settings)?;
    let scene = engine
        .add_scene("sandbox", collection)
        .context("the collection was just created")?;
    let primitives = *engine.context().primitives();
    populate(
        engine.scene_mut(scene).context("the scene was just added")?,
        primitives,
        size,
    );
    engine.add_probe(scene, LightProbe::global(Vec3::new(0.0, 2.0, 0.0)), None);

    // The first frame fills the shadow maps the probe bake samples.
    engine.prepare_frame(FRAME_TIME);
    engine.render_scene(scene, collection, RenderTarget::default());
    let baked = engine.bake_light_probes(scene, collection, DEFAULT_BAKE_ITERATIONS)?;
    log::info!("Baked {baked} light probe(s)");

    engine.prepare_frame(FRAME_TIME);
    engine.render_scene(scene, collection, RenderTarget::default());
    let stats = engine.stats().clone();
    log::info!(
        "Frame {}: {} draw calls, {} triangles, {} shadow passes, {} light volumes",
        stats.frame_number,
        stats.draw_calls,
        stats.triangles_rendered,
        stats.shadow_passes,
        stats.light_volumes
    );

    let pixels = engine.context_mut().read_pixels(None, 0)?;
    image::save_buffer(&output, &to_image(&pixels, size), size.width, size.height, image::ExtendedColorType::Rgba8)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!("Wrote {}", output.display());

    engine.dispose();
    Ok(())
}
