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

use super::RenderTarget;
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::shader::Shader;
use crate::toolbox::{
    ComposedImageStorageToolbox, FinalRenderTargetToolbox, GaussianBlurToolbox,
    MainFramebufferToolbox, PingPong, RenderToolboxCollection, SmaaToolbox,
};
use umbra_core::math::{LinearRgba, Vec2};
use umbra_core::renderer::{
    BlendState, ClearRequest, RasterState, ToneMapping, UniformValue, VideoSettings,
    MAIN_HDR_COLOR, UNIT_SOURCE, UNIT_SOURCE_AUX, UNIT_SOURCE_EXTRA,
};

/// Taps on each side of the centre of the separable blur kernel.
pub const BLUR_RADIUS: usize = 4;
const BLUR_SIGMA: f32 = 2.0;

/// Weights of the centre tap and the taps on one side, normalized so that
/// the full kernel (centre once, side taps twice) sums to one.
pub fn gaussian_weights() -> [f32; BLUR_RADIUS + 1] {
    let mut weights: [f32; BLUR_RADIUS + 1] =
        std::array::from_fn(|i| (-((i * i) as f32) / (2.0 * BLUR_SIGMA * BLUR_SIGMA)).exp());
    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    for weight in &mut weights {
        *weight /= total;
    }
    weights
}

/// Bloom, tone mapping, anti-aliasing and presentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostprocessRenderer;

impl PostprocessRenderer {
    /// Runs the whole chain from the HDR buffer to `target`:
    /// bloom, tone mapping with gamma, SMAA, then a copy to the output.
    pub fn postprocess(ctx: &mut RenderContext, collection: &mut RenderToolboxCollection, target: &RenderTarget) {
        let settings = collection.settings().clone();
        let (Some(main), Some(final_tb)) = (
            collection.get_tb::<MainFramebufferToolbox>(),
            collection.get_tb::<FinalRenderTargetToolbox>(),
        ) else {
            log::error!("Postprocess needs the main and final toolboxes, skipping it");
            return;
        };
        let mut scope = ctx.pass("postprocess");

        if settings.bloom {
            match collection.get_tb::<GaussianBlurToolbox>() {
                Some(blur) => Self::bloom(&mut scope, blur, main, settings.bloom_blur_passes),
                None => log::error!("Bloom is enabled but the blur toolbox is missing"),
            }
        }

        Self::tonemap_gamma(&mut scope, final_tb, main.hdr, &settings);

        let mut output = final_tb.color;
        let mut swap_history = false;
        if settings.smaa_enabled() {
            match collection.get_tb::<SmaaToolbox>() {
                Some(smaa) => {
                    let history = collection.get_tb::<ComposedImageStorageToolbox>();
                    swap_history = history.is_some();
                    output = Self::smaa(&mut scope, smaa, history, final_tb.color, main.velocity, &settings);
                }
                None => log::error!("SMAA is enabled but its toolbox is missing"),
            }
        }

        match final_tb.copy.as_ref() {
            Some(copy) => Self::render_fullscreen(&mut scope, copy, output, target),
            None => log::error!("No copy shader, nothing presented"),
        }
        drop(scope);

        if swap_history {
            if let Some(history) = collection.get_tb_mut::<ComposedImageStorageToolbox>() {
                history.swap();
            }
        }
    }

    /// Blurs `source` back and forth through `pair`, alternating horizontal
    /// and vertical passes, and returns the texture holding the result.
    /// Zero passes return `source`.
    pub fn gaussian_blur(
        ctx: &mut RenderContext,
        shader: &Shader,
        pair: &PingPong,
        source: TextureHandle,
        passes: u32,
    ) -> TextureHandle {
        let mut scope = ctx.scope();
        scope.apply_state(RasterState::fullscreen());
        shader.bind(&mut scope);
        scope.set_uniform("weights", UniformValue::FloatArray(&gaussian_weights()));
        let mut input = source;
        for pass in 0..passes as usize {
            let target = pass % 2;
            scope.bind_framebuffer(Some(pair.framebuffers[target]));
            scope.bind_texture(UNIT_SOURCE, Some(input));
            scope.set_uniform("horizontal", UniformValue::Bool(target == 0));
            scope.draw_fullscreen_quad();
            input = pair.textures[target];
        }
        input
    }

    /// Blurs the bright buffer and adds it onto the HDR colour.
    pub fn bloom(ctx: &mut RenderContext, blur: &GaussianBlurToolbox, main: &MainFramebufferToolbox, passes: u32) {
        let (Some(blur_shader), Some(copy)) = (blur.blur.as_ref(), blur.copy.as_ref()) else {
            log::error!("Bloom shaders are missing, skipping bloom");
            return;
        };
        let mut scope = ctx.pass("bloom");
        let blurred = Self::gaussian_blur(&mut scope, blur_shader, &blur.pair, main.bright, passes);
        scope.bind_framebuffer(Some(main.framebuffer));
        scope.set_draw_buffers(&[MAIN_HDR_COLOR]);
        scope.apply_state(RasterState {
            blend: Some(BlendState::ADDITIVE),
            ..RasterState::fullscreen()
        });
        copy.bind(&mut scope);
        scope.bind_texture(UNIT_SOURCE, Some(blurred));
        scope.draw_fullscreen_quad();
    }

    /// Tone maps `hdr` into the final LDR target, applying exposure and monitor gamma.
    pub fn tonemap_gamma(ctx: &mut RenderContext, final_tb: &FinalRenderTargetToolbox, hdr: TextureHandle, settings: &VideoSettings) {
        let Some(tonemap) = final_tb.tonemap.as_ref() else {
            log::error!("No tone mapping shader, skipping tone mapping");
            return;
        };
        let mut scope = ctx.pass("tonemap");
        scope.bind_framebuffer(Some(final_tb.framebuffer));
        scope.apply_state(RasterState::fullscreen());
        tonemap.bind(&mut scope);
        scope.set_uniform("exposure", UniformValue::Float(settings.exposure));
        scope.set_uniform("gamma", UniformValue::Float(settings.monitor_gamma));
        let operator = match settings.tone_mapping {
            ToneMapping::Reinhard => 0,
            ToneMapping::Aces => 1,
        };
        scope.set_uniform("toneMapping", UniformValue::Int(operator));
        scope.bind_texture(UNIT_SOURCE, Some(hdr));
        scope.draw_fullscreen_quad();
    }

    /// Edge detection, blend weights and neighborhood blending of `source`.
    /// With a history toolbox the blended frame is then resolved against the
    /// previous one using `velocity`. Returns the anti-aliased texture.
    pub fn smaa(
        ctx: &mut RenderContext,
        smaa: &SmaaToolbox,
        history: Option<&ComposedImageStorageToolbox>,
        source: TextureHandle,
        velocity: Option<TextureHandle>,
        settings: &VideoSettings,
    ) -> TextureHandle {
        let (Some(edge), Some(weights), Some(blend)) =
            (smaa.edge.as_ref(), smaa.blend_weights.as_ref(), smaa.blend.as_ref())
        else {
            log::error!("SMAA shaders are missing, skipping anti-aliasing");
            return source;
        };
        let mut scope = ctx.pass("smaa");
        scope.apply_state(RasterState::fullscreen());
        let size = settings.resolution;
        let texel = Vec2::new(1.0 / size.width.max(1) as f32, 1.0 / size.height.max(1) as f32);
        Self::smaa_step(&mut scope, edge, smaa.edges_framebuffer, texel, [Some(source), None, None]);
        Self::smaa_step(&mut scope, weights, smaa.weights_framebuffer, texel, [Some(smaa.edges), None, None]);
        let history = history.filter(|_| settings.temporal_aa());
        let blend_target = history.map_or(smaa.output_framebuffer, |h| h.current_framebuffer());
        Self::smaa_step(&mut scope, blend, blend_target, texel, [Some(source), Some(smaa.weights), None]);

        let Some(history) = history else {
            return smaa.output;
        };
        let Some(resolve) = smaa.resolve.as_ref() else {
            log::error!("No SMAA resolve shader, using the unresolved frame");
            return history.current();
        };
        Self::smaa_step(
            &mut scope,
            resolve,
            smaa.output_framebuffer,
            texel,
            [Some(history.current()), Some(history.previous()), velocity],
        );
        smaa.output
    }

    fn smaa_step(
        ctx: &mut RenderContext,
        shader: &Shader,
        target: FramebufferHandle,
        texel: Vec2,
        inputs: [Option<TextureHandle>; 3],
    ) {
        ctx.bind_framebuffer(Some(target));
        ctx.clear(&ClearRequest::color(LinearRgba::TRANSPARENT));
        shader.bind(ctx);
        ctx.set_uniform("texelSize", UniformValue::Vec2(texel));
        for (unit, texture) in [UNIT_SOURCE, UNIT_SOURCE_AUX, UNIT_SOURCE_EXTRA].into_iter().zip(inputs) {
            ctx.bind_texture(unit, texture);
        }
        ctx.draw_fullscreen_quad();
    }

    /// Draws `source` over the whole of `target` with `shader`.
    pub fn render_fullscreen(ctx: &mut RenderContext, shader: &Shader, source: TextureHandle, target: &RenderTarget) {
        let mut scope = ctx.scope();
        scope.bind_framebuffer(target.framebuffer);
        if let Some(viewport) = target.viewport {
            scope.set_viewport(viewport);
        }
        scope.apply_state(RasterState::fullscreen());
        shader.bind(&mut scope);
        scope.bind_texture(UNIT_SOURCE, Some(source));
        scope.draw_fullscreen_quad();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_sums_to_one() {
        let weights = gaussian_weights();
        let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        assert_relative_eq!(total, 1.0, epsilon = 1e-6);
        assert!(weights.windows(2).all(|w| w[0] > w[1]));
    }
}
