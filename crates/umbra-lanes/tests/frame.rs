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

//! Whole frames rendered on the software device.

mod common;

use common::{camera, centre, corners, floor_renderable, settings};
use std::sync::Arc;
use umbra_core::math::{LinearRgba, Mat4, Vec3};
use umbra_core::renderer::{LightComponent, LightProbe, LightType, SettingLevel, ShadingAlgorithm};
use umbra_lanes::engine::{CollectionKey, SceneKey};
use umbra_lanes::material::{Material, MaterialInstance, MaterialShading};
use umbra_lanes::render_lane::{FullRenderOptions, RenderTarget, SceneRenderer};
use umbra_lanes::scene::{GameSceneRenderData, LightKey, MeshRenderable};
use umbra_lanes::shader::{ExpectedMatrices, ShaderDescriptor};
use umbra_lanes::toolbox::ShadowMappingToolbox;
use umbra_lanes::{RenderEngine, RenderToolboxCollection};

fn point_light() -> LightComponent {
    // Attenuation 20 gives a volume radius of about 1.6.
    LightComponent::new(LightType::Point)
        .with_position(Vec3::new(0.0, 0.5, 0.0))
        .with_attenuation(20.0)
        .with_shadows(false)
}

fn sun() -> LightComponent {
    LightComponent::new(LightType::Directional).with_direction(Vec3::new(-0.3, -1.0, -0.2).normalize())
}

/// Whether the shadow atlas of `collection` holds an up-to-date map of `light`.
fn holds_shadow(engine: &RenderEngine, collection: CollectionKey, scene: SceneKey, light: LightKey) -> bool {
    let shadows = engine.collection(collection).unwrap().get_tb::<ShadowMappingToolbox>().unwrap();
    shadows.holds(engine.scene(scene).unwrap(), light)
}

/// A floor and a small shadow-casting cube under the sun.
fn sunlit_scene(engine: &mut RenderEngine, collection: CollectionKey) -> (SceneKey, LightKey) {
    let scene = engine.add_scene("room", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
    let cube = engine.context().primitives().cube;
    let material = MaterialInstance::new(Arc::new(Material::with_albedo(LinearRgba::WHITE)));
    let cube = MeshRenderable::new(cube, Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)), material);
    let scene_data = engine.scene_mut(scene).unwrap();
    scene_data.add_renderable(Box::new(floor));
    scene_data.add_renderable(Box::new(cube));
    scene_data.camera = camera();
    let light = scene_data.add_light(sun());
    (scene, light)
}

#[test]
fn deferred_frame_runs_the_core_stages() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::CookTorrance, SettingLevel::Low))
        .unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.add_light(point_light());
        scene.add_light(sun());
        scene.camera = camera();
    }

    engine.context_mut().set_tracing(true);
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());

    let stats = engine.stats().clone();
    assert_eq!(stats.light_volumes, 2);
    assert_eq!(stats.shadow_passes, 1, "only the sun casts shadows");
    let trace = engine.context().trace().unwrap();
    for pass in ["shadow_maps", "geometry", "lighting", "forward", "postprocess"] {
        assert!(trace.has_pass(pass), "missing pass {pass}");
    }
    let lighting = trace.draws_in("lighting");
    assert_eq!(lighting.iter().filter(|p| **p == "stencil_mark").count(), 1);
    assert_eq!(lighting.iter().filter(|p| **p == "light_volume").count(), 2);
    assert!(trace.draws_in("geometry").contains(&"gbuffer"));
    engine.dispose();
}

#[test]
fn point_lights_only_shade_inside_their_volume() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::CookTorrance, SettingLevel::None))
        .unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.add_light(point_light());
        scene.camera = camera();
    }

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();

    assert!(centre(&pixels).rgb_vec().max_element() > 0.0, "the floor under the light is lit");
    for corner in corners(&pixels) {
        assert_eq!(corner.rgb_vec(), Vec3::ZERO, "floor outside the volume stays unlit");
    }
    engine.dispose();
}

#[test]
fn shadow_maps_are_cached_up_to_medium_quality() {
    for (level, second_frame) in [(SettingLevel::Medium, 0), (SettingLevel::High, 1)] {
        let mut engine = common::engine();
        let collection = engine
            .create_collection("main", settings(ShadingAlgorithm::Phong, level))
            .unwrap();
        let scene = engine.add_scene("room", collection).unwrap();
        let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
        {
            let scene = engine.scene_mut(scene).unwrap();
            scene.add_renderable(Box::new(floor));
            scene.add_light(sun());
            scene.camera = camera();
        }

        engine.prepare_frame(1.0 / 60.0);
        engine.render_scene(scene, collection, RenderTarget::default());
        assert_eq!(engine.stats().shadow_passes, 1, "{level:?}, first frame");

        engine.prepare_frame(1.0 / 60.0);
        engine.render_scene(scene, collection, RenderTarget::default());
        assert_eq!(engine.stats().shadow_passes, second_frame, "{level:?}, second frame");
        engine.dispose();
    }
}

#[test]
fn replacing_the_settings_invalidates_cached_shadows() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::Phong, SettingLevel::Low))
        .unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let light = engine.scene_mut(scene).unwrap().add_light(sun());
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    assert!(holds_shadow(&engine, collection, scene, light));

    engine
        .replace_collection_settings(collection, settings(ShadingAlgorithm::Phong, SettingLevel::Medium))
        .unwrap();
    assert!(!holds_shadow(&engine, collection, scene, light));

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    assert_eq!(engine.stats().shadow_passes, 1);
    assert!(holds_shadow(&engine, collection, scene, light));
    engine.dispose();
}

#[test]
fn collections_keep_separate_shadow_caches() {
    let profile = settings(ShadingAlgorithm::Phong, SettingLevel::Low);
    let mut engine = common::engine();
    let main = engine.create_collection("main", profile.clone()).unwrap();
    let preview = engine.create_collection("preview", profile.clone()).unwrap();
    let (scene, light) = sunlit_scene(&mut engine, main);

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, main, RenderTarget::default());
    assert_eq!(engine.stats().shadow_passes, 1);
    assert!(holds_shadow(&engine, main, scene, light));
    assert!(!holds_shadow(&engine, preview, scene, light), "main's map says nothing about preview's atlas");

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, preview, RenderTarget::default());
    assert_eq!(engine.stats().shadow_passes, 1, "preview renders its own map");
    let shared = engine.context_mut().read_pixels(None, 0).unwrap();

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, main, RenderTarget::default());
    assert_eq!(engine.stats().shadow_passes, 0, "main's map is still valid");
    engine.dispose();

    let mut alone = common::engine();
    let preview = alone.create_collection("preview", profile).unwrap();
    let (scene, _) = sunlit_scene(&mut alone, preview);
    alone.prepare_frame(1.0 / 60.0);
    alone.render_scene(scene, preview, RenderTarget::default());
    let expected = alone.context_mut().read_pixels(None, 0).unwrap();
    alone.dispose();
    assert_eq!(shared, expected, "a collection renders the same image whoever rendered before it");
}

#[test]
fn moving_a_light_invalidates_every_atlas() {
    let profile = settings(ShadingAlgorithm::Phong, SettingLevel::Low);
    let mut engine = common::engine();
    let main = engine.create_collection("main", profile.clone()).unwrap();
    let preview = engine.create_collection("preview", profile).unwrap();
    let (scene, light) = sunlit_scene(&mut engine, main);
    for collection in [main, preview] {
        engine.prepare_frame(1.0 / 60.0);
        engine.render_scene(scene, collection, RenderTarget::default());
    }
    assert!(holds_shadow(&engine, main, scene, light) && holds_shadow(&engine, preview, scene, light));

    engine
        .scene_mut(scene)
        .unwrap()
        .update_light(light, |light| light.set_direction(Vec3::new(0.3, -1.0, 0.0)));
    assert!(!holds_shadow(&engine, main, scene, light));
    assert!(!holds_shadow(&engine, preview, scene, light));
    engine.dispose();
}

#[test]
fn collections_rebuilt_outside_the_engine_drop_their_shadow_cache() {
    let profile = settings(ShadingAlgorithm::Phong, SettingLevel::Low);
    let mut ctx = common::context();
    let mut collection = RenderToolboxCollection::new("main", profile.clone());
    collection.add_tbs_required_by_settings(&mut ctx).unwrap();
    let mut scene = GameSceneRenderData::new("room", &profile);
    let light = scene.add_light(sun());
    scene.camera = camera();

    let options = FullRenderOptions::default();
    ctx.begin_frame();
    SceneRenderer::full_render(&mut ctx, &mut collection, &mut scene, &options);
    assert_eq!(ctx.stats().shadow_passes, 1);

    collection.replace_settings(&mut ctx, profile).unwrap();
    assert!(!collection.get_tb::<ShadowMappingToolbox>().unwrap().holds(&scene, light));
    ctx.begin_frame();
    SceneRenderer::full_render(&mut ctx, &mut collection, &mut scene, &options);
    assert_eq!(ctx.stats().shadow_passes, 1, "the rebuilt atlas is empty");

    scene.dispose(&mut ctx);
    collection.dispose(&mut ctx);
}

#[test]
fn reloaded_shaders_live_until_their_last_material_goes() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::FullLit, SettingLevel::None))
        .unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let baseline = engine.context().program_count();
    let descriptor = ShaderDescriptor::new("forward_unlit")
        .with_label("flat")
        .with_matrices(ExpectedMatrices::all())
        .with_sampler("material.diffuseMap", 0);
    let first = engine.load_shader(&descriptor).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::rgb(0.5, 0.25, 0.125))
        .with_shading(MaterialShading::Custom(first));
    let key = {
        let scene = engine.scene_mut(scene).unwrap();
        scene.camera = camera();
        scene.add_renderable(Box::new(floor))
    };

    engine.load_shader(&descriptor).unwrap();
    assert_eq!(engine.shaders().len(), 1);
    assert_eq!(engine.shaders().retired_count(), 1);
    assert_eq!(engine.context().program_count(), baseline + 2, "the replaced program is still alive");

    engine.context_mut().set_tracing(true);
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    assert_eq!(engine.context().trace().unwrap().draws_in("forward"), vec!["flat"]);
    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    let centre = centre(&pixels);
    assert!(centre.r > centre.g && centre.g > centre.b, "the old program still draws: {centre:?}");

    assert!(engine.scene_mut(scene).unwrap().remove_renderable(key).is_some());
    engine.prepare_frame(1.0 / 60.0);
    assert_eq!(engine.shaders().retired_count(), 0);
    assert_eq!(engine.context().program_count(), baseline + 1);
    engine.dispose();
}

#[test]
fn full_lit_renders_everything_forward() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::FullLit, SettingLevel::High))
        .unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::rgb(0.5, 0.25, 0.125));
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.add_light(sun());
        scene.camera = camera();
    }

    engine.context_mut().set_tracing(true);
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());

    let stats = engine.stats().clone();
    assert_eq!(stats.light_volumes, 0);
    assert_eq!(stats.shadow_passes, 0);
    let trace = engine.context().trace().unwrap();
    assert!(!trace.has_pass("geometry"));
    assert!(!trace.has_pass("lighting"));
    assert_eq!(trace.draws_in("forward"), vec!["forward_unlit"]);

    let pixels = engine.context_mut().read_pixels(None, 0).unwrap();
    let centre = centre(&pixels);
    assert!(centre.r > centre.g && centre.g > centre.b, "albedo hue survives tone mapping: {centre:?}");
    engine.dispose();
}

#[test]
fn a_scene_without_lights_skips_the_deferred_path() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::CookTorrance, SettingLevel::Low))
        .unwrap();
    let scene = engine.add_scene("empty", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.camera = camera();
    }
    engine.context_mut().set_tracing(true);
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());

    let trace = engine.context().trace().unwrap();
    assert!(!trace.has_pass("geometry"));
    assert_eq!(trace.draws_in("forward"), vec!["forward_unlit"]);
    engine.dispose();
}

#[test]
fn baked_probes_join_the_lighting_pass() {
    let mut engine = common::engine();
    let collection = engine
        .create_collection("main", settings(ShadingAlgorithm::CookTorrance, SettingLevel::Low))
        .unwrap();
    let scene = engine.add_scene("room", collection).unwrap();
    let floor = floor_renderable(engine.context_mut(), LinearRgba::WHITE);
    {
        let scene = engine.scene_mut(scene).unwrap();
        scene.add_renderable(Box::new(floor));
        scene.add_light(sun());
        scene.camera = camera();
    }
    let probe = engine
        .add_probe(scene, LightProbe::local(Vec3::new(0.0, 1.0, 0.0), 5.0), None)
        .unwrap();
    assert_eq!(
        engine.add_probe(scene, LightProbe::global(Vec3::ZERO), None),
        None,
        "the settings allow a single probe"
    );

    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    assert_eq!(engine.bake_light_probes(scene, collection, 1).unwrap(), 1);
    let baked = engine.scene(scene).unwrap();
    assert!(baked.probes().all(|(_, entry)| entry.probe.is_baked()));
    assert!(baked.probe_textures().unwrap().brdf_ready);

    engine.context_mut().set_tracing(true);
    engine.prepare_frame(1.0 / 60.0);
    engine.render_scene(scene, collection, RenderTarget::default());
    let trace = engine.context().trace().unwrap();
    assert!(trace.draws_in("lighting").contains(&"ibl_probe"));

    assert!(engine.remove_probe(scene, probe).is_some());
    engine.dispose();
}
