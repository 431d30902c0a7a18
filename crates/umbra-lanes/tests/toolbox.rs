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

//! Toolbox collections built on the software device.

mod common;

use common::settings;
use umbra_core::math::{Extent2D, LinearRgba};
use umbra_core::renderer::{
    AttachmentPoint, SettingLevel, ShadingAlgorithm, TexelData, TextureDescriptor, TextureFormat,
    VideoSettings,
};
use umbra_lanes::render_lane::PostprocessRenderer;
use umbra_lanes::toolbox::{DeferredShadingToolbox, GaussianBlurToolbox, MainFramebufferToolbox};
use umbra_lanes::{RenderToolboxCollection, ToolboxKind};

#[test]
fn building_twice_allocates_nothing_new() {
    let mut ctx = common::context();
    let baseline = ctx.resources().texture_count();
    let profile = settings(ShadingAlgorithm::CookTorrance, SettingLevel::Low);
    let mut collection = RenderToolboxCollection::new("main", profile.clone());

    let built = collection.add_tbs_required_by_settings(&mut ctx).unwrap();
    assert_eq!(built, RenderToolboxCollection::required_toolboxes(&profile).len());
    let textures = ctx.resources().texture_count();
    let framebuffers = ctx.resources().framebuffer_count();

    assert_eq!(collection.add_tbs_required_by_settings(&mut ctx).unwrap(), 0);
    assert_eq!(ctx.resources().texture_count(), textures);
    assert_eq!(ctx.resources().framebuffer_count(), framebuffers);

    collection.dispose(&mut ctx);
    assert!(collection.is_empty());
    assert_eq!(ctx.resources().texture_count(), baseline);
    assert_eq!(ctx.resources().framebuffer_count(), 0);
}

#[test]
fn deferred_toolbox_shares_the_main_depth_stencil() {
    let mut ctx = common::context();
    let mut collection =
        RenderToolboxCollection::new("main", settings(ShadingAlgorithm::Phong, SettingLevel::None));
    collection.add_tbs_required_by_settings(&mut ctx).unwrap();

    let main = collection.get_tb::<MainFramebufferToolbox>().unwrap();
    let deferred = collection.get_tb::<DeferredShadingToolbox>().unwrap();
    assert_eq!(
        ctx.framebuffer_texture(deferred.gbuffer, AttachmentPoint::DepthStencil),
        Some(main.depth_stencil)
    );
    assert!(ctx.resources().texture(main.depth_stencil).unwrap().refs() >= 2);
    collection.dispose(&mut ctx);
}

#[test]
fn replacing_the_settings_rebuilds_the_toolboxes() {
    let mut ctx = common::context();
    let mut collection =
        RenderToolboxCollection::new("main", settings(ShadingAlgorithm::CookTorrance, SettingLevel::Low));
    collection.add_tbs_required_by_settings(&mut ctx).unwrap();
    assert!(collection.contains(ToolboxKind::ShadowMapping));

    collection
        .replace_settings(&mut ctx, settings(ShadingAlgorithm::FullLit, SettingLevel::Low))
        .unwrap();
    assert_eq!(
        collection.kinds(),
        vec![ToolboxKind::MainFramebuffer, ToolboxKind::ForwardShading, ToolboxKind::FinalRenderTarget]
    );
    collection.dispose(&mut ctx);
}

#[test]
fn blurring_a_flat_image_keeps_it_flat() {
    let mut ctx = common::context();
    let profile = VideoSettings {
        bloom: true,
        ..settings(ShadingAlgorithm::FullLit, SettingLevel::None)
    };
    let mut collection = RenderToolboxCollection::new("main", profile);
    collection.add_tbs_required_by_settings(&mut ctx).unwrap();
    let blur = collection.get_tb::<GaussianBlurToolbox>().unwrap();
    let size = ctx.texture_descriptor(blur.pair.textures[0]).unwrap().size;

    let source = ctx
        .create_texture(&TextureDescriptor::d2("flat", size, TextureFormat::Rgba16F))
        .unwrap();
    let texels = vec![0.25f32; size.area() * 4];
    ctx.write_texture(source, 0, 0, TexelData::F32(&texels)).unwrap();

    let shader = blur.blur.as_ref().unwrap();
    let flat = LinearRgba::new(0.25, 0.25, 0.25, 0.25);
    for passes in 1..=4u32 {
        let blurred = PostprocessRenderer::gaussian_blur(&mut ctx, shader, &blur.pair, source, passes);
        let index = (passes as usize - 1) % 2;
        assert_eq!(blurred, blur.pair.textures[index], "{passes} passes end in the wrong buffer");
        let pixels = ctx.read_pixels(Some(blur.pair.framebuffers[index]), 0).unwrap();
        assert_eq!(pixels.len(), size.area());
        assert!(pixels.iter().all(|p| p.approx_eq(flat, 1e-3)), "{passes} passes: {:?}", pixels[0]);
    }
    assert_eq!(PostprocessRenderer::gaussian_blur(&mut ctx, shader, &blur.pair, source, 0), source);
    assert_eq!(size, Extent2D::new(common::SIZE.width / 2, common::SIZE.height / 2));

    ctx.release_texture(source);
    collection.dispose(&mut ctx);
}
