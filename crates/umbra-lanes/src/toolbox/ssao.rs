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

use super::{release_shader, PingPong, SetupGuard};
use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::error::ToolboxError;
use crate::shader::{Shader, ShaderDescriptor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use umbra_core::math::{Extent2D, Vec3};
use umbra_core::renderer::{
    AddressMode, FilterMode, TexelData, TextureDescriptor, TextureFormat, VideoSettings,
    UNIT_GBUFFER_NORMAL, UNIT_GBUFFER_POSITION, UNIT_SOURCE, UNIT_SOURCE_AUX,
};

/// Edge length of the tiled rotation noise.
pub const SSAO_NOISE_SIZE: u32 = 4;
const SSAO_SEED: u64 = 0x55A0;

/// Screen-space ambient occlusion: a hemisphere kernel, a tiled rotation
/// noise, the raw occlusion target and a blur pair.
#[derive(Debug)]
pub struct SsaoToolbox {
    /// Raw occlusion.
    pub framebuffer: FramebufferHandle,
    /// Raw occlusion texture.
    pub occlusion: TextureHandle,
    /// Blur pair; the blurred result ends in one of them.
    pub blur: PingPong,
    /// Random rotations, tiled over the screen.
    pub noise: TextureHandle,
    /// Sample offsets in tangent space, denser near the origin.
    pub kernel: Vec<Vec3>,
    /// Occlusion program.
    pub ssao: Option<Shader>,
    /// Separable blur program.
    pub blur_shader: Option<Shader>,
}

/// A hemisphere kernel oriented along `+Z`, deterministic for a given size.
pub fn ssao_kernel(samples: u32) -> Vec<Vec3> {
    let mut rng = StdRng::seed_from_u64(SSAO_SEED);
    (0..samples)
        .map(|i| {
            let sample = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..1.0),
            )
            .normalize_or(Vec3::Z)
                * rng.gen_range(0.0f32..1.0);
            let t = i as f32 / samples as f32;
            sample * (0.1 + 0.9 * t * t)
        })
        .collect()
}

impl SsaoToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>, settings: &VideoSettings) -> Result<Self, ToolboxError> {
        let size = guard.size();
        let occlusion = guard.target("ssao", TextureFormat::R16F)?;
        let framebuffer = guard.framebuffer_with("ssao", &[occlusion], None)?;
        let blur = PingPong::create(guard, "ssao_blur", size, TextureFormat::R16F)?;

        let noise = guard.texture(
            &TextureDescriptor::d2("ssao_noise", Extent2D::square(SSAO_NOISE_SIZE), TextureFormat::Rgba32F)
                .with_filter(FilterMode::Nearest)
                .with_address_mode(AddressMode::Repeat),
        )?;
        let mut rng = StdRng::seed_from_u64(SSAO_SEED ^ 1);
        let texels: Vec<f32> = (0..SSAO_NOISE_SIZE * SSAO_NOISE_SIZE)
            .flat_map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0, 1.0])
            .collect();
        guard.ctx().write_texture(noise, 0, 0, TexelData::F32(&texels))?;

        let kernel = ssao_kernel(settings.ssao_samples);
        let ssao = guard.shader(
            ShaderDescriptor::new("ssao")
                .with_define("KERNEL_SIZE", settings.ssao_samples)
                .with_sampler("gPosition", UNIT_GBUFFER_POSITION)
                .with_sampler("gNormal", UNIT_GBUFFER_NORMAL)
                .with_sampler("noise", UNIT_SOURCE_AUX),
        );
        let blur_shader = guard.shader(ShaderDescriptor::new("gaussian_blur").with_label("ssao_blur").with_sampler("source", UNIT_SOURCE));
        Ok(Self {
            framebuffer,
            occlusion,
            blur,
            noise,
            kernel,
            ssao,
            blur_shader,
        })
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        ctx.release_framebuffer(self.framebuffer);
        ctx.release_texture(self.occlusion);
        ctx.release_texture(self.noise);
        self.blur.release(ctx);
        release_shader(ctx, self.ssao);
        release_shader(ctx, self.blur_shader);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_stays_in_the_unit_hemisphere() {
        let kernel = ssao_kernel(32);
        assert_eq!(kernel.len(), 32);
        assert!(kernel.iter().all(|s| s.z >= 0.0 && s.length() <= 1.0));
        assert_eq!(kernel, ssao_kernel(32));
    }
}
