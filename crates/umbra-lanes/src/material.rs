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

//! Materials and their per-instance animated overrides.

use crate::context::{RenderContext, TextureHandle};
use crate::shader::Shader;
use std::sync::Arc;
use umbra_core::math::{LinearRgba, Vec3};
use umbra_core::renderer::UniformValue;

/// Which pass renders an object, and with which program.
#[derive(Debug, Clone, Default)]
pub enum MaterialShading {
    /// Shaded by the lights: deferred, or forward-lit when the deferred path is off.
    #[default]
    Lit,
    /// Flat colour, rendered in the forward pass.
    Unlit,
    /// Rendered in the forward pass with its own program.
    Custom(Arc<Shader>),
}

impl MaterialShading {
    /// Returns `true` for [`MaterialShading::Lit`].
    pub fn is_lit(&self) -> bool {
        matches!(self, MaterialShading::Lit)
    }
}

/// Sampler names a material may fill. Samplers a shader declares under the
/// `material.` prefix are bound from [`Material::textures`].
pub const MATERIAL_SAMPLER_PREFIX: &str = "material.";

/// Surface parameters shared by every instance.
///
/// Materials do not own references to their textures; a texture destroyed
/// elsewhere simply falls back to the empty texture.
#[derive(Debug, Clone)]
pub struct Material {
    /// Base colour; alpha is opacity.
    pub albedo: LinearRgba,
    /// Specular intensity (Phong).
    pub specular: f32,
    /// Specular exponent (Phong).
    pub shininess: f32,
    /// Parallax occlusion height scale.
    pub depth_scale: f32,
    /// Microfacet roughness (Cook-Torrance).
    pub roughness: f32,
    /// Metalness (Cook-Torrance).
    pub metallic: f32,
    /// Baked ambient occlusion factor.
    pub ao: f32,
    /// Textures by sampler name, e.g. `material.diffuseMap`.
    pub textures: Vec<(String, TextureHandle)>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: LinearRgba::WHITE,
            specular: 0.5,
            shininess: 32.0,
            depth_scale: 0.05,
            roughness: 0.5,
            metallic: 0.0,
            ao: 1.0,
            textures: Vec::new(),
        }
    }
}

impl Material {
    /// A flat-coloured material.
    pub fn with_albedo(albedo: LinearRgba) -> Self {
        Self {
            albedo,
            ..Default::default()
        }
    }

    /// Sets (or replaces) the texture behind a sampler.
    pub fn set_texture(&mut self, sampler: &str, texture: TextureHandle) {
        match self.textures.iter_mut().find(|(name, _)| name == sampler) {
            Some(entry) => entry.1 = texture,
            None => self.textures.push((sampler.to_string(), texture)),
        }
    }

    /// The texture behind a sampler.
    pub fn texture(&self, sampler: &str) -> Option<TextureHandle> {
        self.textures
            .iter()
            .find(|(name, _)| name == sampler)
            .map(|(_, texture)| *texture)
    }

    /// Pushes every material uniform to the current program and binds the
    /// material textures the shader declares. A declared sampler with no
    /// texture, or a stale one, gets the empty texture.
    pub fn update_whole_ubo_data(&self, ctx: &mut RenderContext, shader: &Shader) {
        ctx.set_uniform("material.albedo", UniformValue::Vec4(self.albedo.to_vec4()));
        ctx.set_uniform("material.specular", UniformValue::Float(self.specular));
        ctx.set_uniform("material.shininess", UniformValue::Float(self.shininess));
        ctx.set_uniform("material.depthScale", UniformValue::Float(self.depth_scale));
        ctx.set_uniform(
            "material.pbr",
            UniformValue::Vec3(Vec3::new(self.roughness, self.metallic, self.ao)),
        );
        let normal_mapping = self
            .texture("material.normalMap")
            .and_then(|texture| ctx.texture_id(texture))
            .is_some();
        ctx.set_uniform("material.normalMapping", UniformValue::Bool(normal_mapping));

        for (sampler, unit) in shader.samplers() {
            if sampler.starts_with(MATERIAL_SAMPLER_PREFIX) {
                ctx.bind_texture(*unit, self.texture(sampler));
            }
        }
    }
}

/// How an [`Interpolator`] moves between keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Holds each keyframe until the next one (atlas frames).
    #[default]
    Step,
    /// Blends linearly.
    Linear,
}

/// A scalar curve over time.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolator {
    /// `(time, value)` pairs sorted by time.
    pub keyframes: Vec<(f32, f32)>,
    /// Blending mode.
    pub interpolation: Interpolation,
    /// Whether time wraps past the last keyframe.
    pub looping: bool,
}

impl Interpolator {
    /// Duration from time zero to the last keyframe.
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, |(t, _)| *t)
    }

    /// Value at `time`.
    pub fn sample(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keyframes.first(), self.keyframes.last()) else {
            return 0.0;
        };
        let duration = self.duration();
        let time = if self.looping && duration > 0.0 {
            time.rem_euclid(duration)
        } else {
            time
        };
        if time <= first.0 {
            return first.1;
        }
        if time >= last.0 {
            return last.1;
        }
        let next = self
            .keyframes
            .iter()
            .position(|(t, _)| *t > time)
            .unwrap_or(self.keyframes.len() - 1);
        let (t0, v0) = self.keyframes[next - 1];
        let (t1, v1) = self.keyframes[next];
        match self.interpolation {
            Interpolation::Step => v0,
            Interpolation::Linear => v0 + (v1 - v0) * ((time - t0) / (t1 - t0)),
        }
    }
}

/// Drives one float uniform of an instance over time.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformAnimation {
    /// The uniform overridden, e.g. `material.atlasIndex`.
    pub uniform: String,
    /// The curve.
    pub curve: Interpolator,
    time: f32,
}

impl UniformAnimation {
    /// An animation starting at time zero.
    pub fn new(uniform: &str, curve: Interpolator) -> Self {
        Self {
            uniform: uniform.to_string(),
            curve,
            time: 0.0,
        }
    }

    /// Current value.
    pub fn value(&self) -> f32 {
        self.curve.sample(self.time)
    }
}

/// A shared material plus an optional animated override, so many instances
/// of one material animate independently.
#[derive(Debug, Clone)]
pub struct MaterialInstance {
    /// The shared material.
    pub material: Arc<Material>,
    /// The override, if any.
    pub animation: Option<UniformAnimation>,
}

impl MaterialInstance {
    /// An instance without override.
    pub fn new(material: Arc<Material>) -> Self {
        Self {
            material,
            animation: None,
        }
    }

    /// Attaches an animated override.
    pub fn with_animation(mut self, animation: UniformAnimation) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Advances the override.
    pub fn advance(&mut self, dt: f32) {
        if let Some(animation) = self.animation.as_mut() {
            animation.time += dt;
        }
    }

    /// Pushes only the per-instance override.
    pub fn update_instance_ubo_data(&self, ctx: &mut RenderContext) {
        if let Some(animation) = &self.animation {
            ctx.set_uniform(&animation.uniform, UniformValue::Float(animation.value()));
        }
    }

    /// Pushes the material, then the override on top.
    pub fn update_ubo_data(&self, ctx: &mut RenderContext, shader: &Shader) {
        self.material.update_whole_ubo_data(ctx, shader);
        self.update_instance_ubo_data(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(interpolation: Interpolation, looping: bool) -> Interpolator {
        Interpolator {
            keyframes: vec![(0.0, 0.0), (1.0, 4.0), (2.0, 8.0)],
            interpolation,
            looping,
        }
    }

    #[test]
    fn step_holds_previous_keyframe() {
        let c = curve(Interpolation::Step, false);
        assert_eq!(c.sample(0.5), 0.0);
        assert_eq!(c.sample(1.5), 4.0);
        assert_eq!(c.sample(5.0), 8.0);
    }

    #[test]
    fn linear_blends_and_loops() {
        let c = curve(Interpolation::Linear, true);
        assert_eq!(c.sample(0.5), 2.0);
        assert_eq!(c.sample(2.5), 2.0);
    }

    #[test]
    fn instances_of_one_material_animate_independently() {
        let material = Arc::new(Material::default());
        let animation = UniformAnimation::new("material.atlasIndex", curve(Interpolation::Step, true));
        let mut a = MaterialInstance::new(material.clone()).with_animation(animation.clone());
        let b = MaterialInstance::new(material).with_animation(animation);
        a.advance(1.2);
        assert_eq!(a.animation.as_ref().map(UniformAnimation::value), Some(4.0));
        assert_eq!(b.animation.as_ref().map(UniformAnimation::value), Some(0.0));
    }
}
