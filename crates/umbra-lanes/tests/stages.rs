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

//! The optional stages of a frame: occlusion, bloom, anti-aliasing, point
//! light shadows, skinning and UI scenes.

mod common;

use common::{camera, centre, floor_renderable, settings};
use std::sync::Arc;
use umbra_core::math::{LinearRgba, Mat4, Vec2, Vec3};
use umbra_core::renderer::{
    AntiAliasingAlgorithm, LightComponent, LightType, SettingLevel, ShadingAlgorithm, Vertex,
    VideoSettings,
};
use umbra_lanes::engine::{CollectionKey, SceneKey};
use umbra_lanes::material::{Material, MaterialInstance};
use umbra_lanes::render_lane::RenderTarget;
use umbra_lanes::scene::{MeshRenderable, SkeletonBatch, SkinBinding, UiPlacement};
use umbra_lanes::toolbox::ComposedImageStorageToolbox;
use umbra_lanes::RenderEngine;

fn sun() -> LightComponent {
    LightComponent::new(LightType::Directional).with_direction(Vec3::new(-0.3, -1.0, -0.2).normalize())
}

/// An engine with one collection and a white floor under `light`.
fn lit_floor(profile: VideoSettings, light: Option<LightComponent>) -> (RenderEngine, CollectionKey, SceneKey) {
    let mut engine = common::engine();
    let collection = engine.create_collection("main", profile).unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
    let scene_data = engine.scene_mut(scene).unwrap();
    scene_data.add_renderable(Box::new(floor));
    if let Some(light) = light {
        scene_data.add_light(light);
    }
    scene_data.camera = camera();
    (engine, collection, scene)
}

fn traced_frame(engine: &mut RenderEngine, collection: CollectionKey, scene: SceneKey) {
    engine.context_mut().set_tracing(true);
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
}

#[test]
fn ssao_runs_between_geometry_and_lighting() {
    let profile = VideoSettings {
        ssao_samples: 8,
        ssao_blur_passes: 2,
        ..settings(ShadingAlgorithm::CookTorrance, SettingLevel::None)
    };
    let (mut engine, collection, scene) = lit_floor(profile, Some(sun()));
    traced_frame(&mut engine, collection, scene);

    let trace = engine.context().trace().unwrap();
    let passes = trace.passes();
    let position = |label: &str| passes.iter().position(|p| *p == label).unwrap();
    assert!(position("geometry") < position("ssao") && position("ssao") < position("lighting"));
    assert_eq!(trace.draws_in("ssao"), vec!["ssao", "ssao_blur", "ssao_blur"]);

    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    assert!(centre(&pixels).rgb_vec().max_element() > 0.0, "an open floor stays lit");
    engine.dispose();
}

#[test]
fn bloom_blurs_then_adds_the_bright_buffer() {
    let profile = VideoSettings {
        bloom: true,
        bloom_blur_passes: 3,
        ..settings(ShadingAlgorithm::CookTorrance, SettingLevel::None)
    };
    let (mut engine, collection, scene) = lit_floor(profile, Some(sun()));
    traced_frame(&mut engine, collection, scene);

    let trace = engine.context().trace().unwrap();
    assert_eq!(
        trace.draws_in("bloom"),
        vec!["gaussian_blur", "gaussian_blur", "gaussian_blur", "bloom_copy"]
    );
    let passes = trace.passes();
    let bloom = passes.iter().position(|p| *p == "bloom").unwrap();
    let tonemap = passes.iter().position(|p| *p == "tonemap").unwrap();
    assert!(bloom < tonemap, "bloom works on HDR colour");
    engine.dispose();
}

#[test]
fn smaa_1x_runs_three_steps_without_history() {
    let render = |anti_aliasing: AntiAliasingAlgorithm| {
        let profile = VideoSettings {
            anti_aliasing,
            ..settings(ShadingAlgorithm::FullLit, SettingLevel::None)
        };
        let (mut engine, collection, scene) = lit_floor(profile, None);
        let history = engine.collection(collection).unwrap().get_tb::<ComposedImageStorageToolbox>().is_some();
        traced_frame(&mut engine, collection, scene);
        let draws: Vec<String> = engine
            .context()
            .trace()
            .unwrap()
            .draws_in("smaa")
            .into_iter()
            .map(str::to_string)
            .collect();
        let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
        engine.dispose();
        (history, draws, centre(&pixels))
    };

    let (history, draws, smoothed) = render(AntiAliasingAlgorithm::Smaa1x);
    assert!(!history);
    assert_eq!(draws, vec!["smaa_edge", "smaa_weights", "smaa_blend"]);

    let (_, draws, plain) = render(AntiAliasingAlgorithm::None);
    assert!(draws.is_empty());
    assert!(smoothed.approx_eq(plain, 1e-2), "flat areas pass through: {smoothed:?} vs {plain:?}");
}

#[test]
fn smaa_t2x_resolves_against_the_previous_frame() {
    let profile = VideoSettings {
        anti_aliasing: AntiAliasingAlgorithm::SmaaT2x,
        ..settings(ShadingAlgorithm::CookTorrance, SettingLevel::None)
    };
    let (mut engine, collection, scene) = lit_floor(profile, Some(sun()));
    let history = |engine: &RenderEngine| {
        let tb = engine.collection(collection).unwrap().get_tb::<ComposedImageStorageToolbox>().unwrap();
        (tb.current(), tb.previous())
    };
    let (a, b) = history(&engine);
    assert_ne!(a, b);

    traced_frame(&mut engine, collection, scene);
    let trace = engine.context().trace().unwrap();
    assert_eq!(
        trace.draws_in("smaa"),
        vec!["smaa_edge", "smaa_weights", "smaa_blend", "smaa_resolve"]
    );
    assert_eq!(history(&engine), (b, a), "the frame just blended becomes the history");
    let first = engine.context_mut().read_pixels(None, 0).unwrap();

    traced_frame(&mut engine, collection, scene);
    assert_eq!(history(&engine), (a, b));
    let second = engine.context_mut().read_pixels(None, 0).unwrap();
    assert!(centre(&first).rgb_vec().max_element() > 0.0);
    assert!(
        centre(&second).approx_eq(centre(&first), 1e-2),
        "a still scene resolves to itself: {:?} vs {:?}",
        centre(&second),
        centre(&first)
    );
    engine.dispose();
}

#[test]
fn point_light_shadows_render_six_linear_depth_faces() {
    // The light sits above and to the side of the origin; the occluder is on
    // the light's path to the origin but off the camera's.
    let light = |shadows: bool| {
        LightComponent::new(LightType::Point)
            .with_position(Vec3::new(1.0, 1.0, 0.0))
            .with_attenuation(1.0)
            .with_shadows(shadows)
    };
    let render = |shadows: bool| {
        let profile = settings(ShadingAlgorithm::Phong, SettingLevel::Low);
        let (mut engine, collection, scene) = lit_floor(profile, Some(light(shadows)));
        let cube = engine.context().primitives().cube;
        let material = MaterialInstance::new(Arc::new(Material::with_albedo(LinearRgba::WHITE)));
        let transform = Mat4::from_translation(Vec3::new(0.5, 0.5, 0.0)) * Mat4::from_scale(Vec3::splat(0.15));
        engine
            .scene_mut(scene)
            .unwrap()
            .add_renderable(Box::new(MeshRenderable::new(cube, transform, material)));
        traced_frame(&mut engine, collection, scene);

        let passes = engine.stats().shadow_passes;
        let draws = engine.context().trace().unwrap().draws_in("shadow_maps").into_iter().map(String::from).collect::<Vec<_>>();
        let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
        engine.dispose();
        (passes, draws, centre(&pixels))
    };

    let (passes, draws, shadowed) = render(true);
    assert_eq!(passes, 6);
    // Floor and cube on each face.
    assert_eq!(draws.len(), 12);
    assert!(draws.iter().all(|p| *p == "shadow_linear_depth"), "{draws:?}");

    let (passes, _, open) = render(false);
    assert_eq!(passes, 0);
    assert!(
        shadowed.rgb_vec().max_element() < open.rgb_vec().max_element(),
        "the occluder darkens the origin: {shadowed:?} vs {open:?}"
    );
}

/// A floor whose every vertex follows bone 0.
fn skinned_floor(engine: &mut RenderEngine, batch: umbra_lanes::scene::SkeletonKey) -> MeshRenderable {
    let s = 20.0;
    let vertices: Vec<Vertex> = [(-s, -s), (-s, s), (s, s), (s, -s)]
        .iter()
        .map(|&(x, z)| Vertex {
            bone_ids: [0; 4],
            bone_weights: [1.0, 0.0, 0.0, 0.0],
            ..Vertex::new(Vec3::new(x, 0.0, z), Vec3::Y, Vec2::ZERO)
        })
        .collect();
    let mesh = engine
        .context_mut()
        .create_mesh("skinned_floor", &vertices, &[0, 1, 2, 0, 2, 3])
        .unwrap();
    let material = MaterialInstance::new(Arc::new(Material::with_albedo(LinearRgba::WHITE)));
    MeshRenderable::new(mesh, Mat4::IDENTITY, material).with_skin(SkinBinding { batch, bone_offset: 0 })
}

#[test]
fn bone_matrices_show_up_after_the_swap() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::FullLit, SettingLevel::None))
        .unwrap();
    let scene = engine.add_scene("rig", collection).unwrap();
    let batch = SkeletonBatch::new(engine.context_mut(), 1).unwrap();
    let batch = engine.scene_mut(scene).unwrap().add_skeleton(batch);
    let floor = skinned_floor(&mut engine, batch);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.camera = camera();
    }

    traced_frame(&mut engine, collection, scene);
    assert_eq!(
        engine.context().trace().unwrap().draws_in("forward"),
        vec!["forward_unlit_skinned"]
    );
    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    assert!(centre(&pixels).rgb_vec().max_element() > 0.5, "bind pose covers the centre");

    // Staged bones wait for the next swap.
    let moved = Mat4::from_translation(Vec3::new(1000.0, 0.0, 0.0));
    engine.scene_mut(scene).unwrap().skeleton_mut(batch).unwrap().bones_mut()[0] = moved;
    engine.render_scene(scene, collection, RenderTarget::default());
    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    assert!(centre(&pixels).rgb_vec().max_element() > 0.5, "the front buffer still holds the bind pose");

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    assert_eq!(centre(&pixels).rgb_vec(), Vec3::ZERO, "the floor moved out of view");
    engine.dispose();
}

#[test]
fn skinned_meshes_join_the_deferred_and_shadow_passes() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::CookTorrance, SettingLevel::Low))
        .unwrap();
    let scene = engine.add_scene("rig", collection).unwrap();
    let batch = SkeletonBatch::new(engine.context_mut(), 1).unwrap();
    let batch = engine.scene_mut(scene).unwrap().add_skeleton(batch);
    let floor = skinned_floor(&mut engine, batch);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.add_light(sun());
        scene.camera = camera();
    }

    traced_frame(&mut engine, collection, scene);
    let trace = engine.context().trace().unwrap();
    assert_eq!(trace.draws_in("geometry"), vec!["gbuffer_skinned"]);
    assert_eq!(trace.draws_in("shadow_maps"), vec!["shadow_depth_skinned"]);
    engine.dispose();
}

#[test]
fn ui_elements_stack_back_to_front_under_the_depth_test() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("hud", settings(ShadingAlgorithm::FullLit, SettingLevel::None))
        .unwrap();
    let scene = engine.add_scene("hud", collection).unwrap();
    let element = |engine: &mut RenderEngine, color: LinearRgba, depth: f32, z: f32| {
        floor_renderable(engine.context_mut(), color).with_ui(UiPlacement {
            depth,
            offset: Vec3::new(0.0, 0.0, z),
        })
    };
    // Inserted nearest first; drawing follows depth, not insertion.
    let blue = element(&mut engine, LinearRgba::rgb(0.0, 0.0, 1.0), 0.5, -2.0);
    let green = element(&mut engine, LinearRgba::rgb(0.0, 1.0, 0.0), 1.0, 0.5);
    let red = element(&mut engine, LinearRgba::rgb(1.0, 0.0, 0.0), 2.0, 0.0);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.is_ui = true;
        scene.camera = camera();
        for element in [blue, green, red] {
            scene.add_renderable(Box::new(element));
        }
    }

    traced_frame(&mut engine, collection, scene);
    assert_eq!(engine.context().trace().unwrap().draws_in("forward").len(), 3);
    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    let centre = centre(&pixels);
    // Red is drawn first, green is moved in front of it, and blue ends up
    // behind both once the offsets add up, so the depth test rejects it.
    assert!(centre.g > 0.5 && centre.r < 0.1 && centre.b < 0.1, "{centre:?}");
    engine.dispose();
}
