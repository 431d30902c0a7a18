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

use super::{release_shader, SetupGuard};
use crate::context::RenderContext;
use crate::shader::{ExpectedMatrices, Shader, ShaderDescriptor};

/// Programs of the forward pass: unlit and lit materials, with skinned
/// variants, and the debug line program.
#[derive(Debug)]
pub struct ForwardShadingToolbox {
    /// Flat albedo.
    pub unlit: Option<Shader>,
    /// Flat albedo, skinned.
    pub unlit_skinned: Option<Shader>,
    /// Lit by every light in one pass, when the deferred path is off.
    pub lit: Option<Shader>,
    /// Lit, skinned.
    pub lit_skinned: Option<Shader>,
    /// Physics debug lines.
    pub debug_lines: Option<Shader>,
}

/// Sampler of a material's base colour texture.
pub const DIFFUSE_MAP: &str = "material.diffuseMap";
/// Sampler of a material's normal map.
pub const NORMAL_MAP: &str = "material.normalMap";
/// Sampler of a material's specular map.
pub const SPECULAR_MAP: &str = "material.specularMap";
/// Sampler of a material's height map.
pub const DEPTH_MAP: &str = "material.depthMap";

pub(crate) fn material_shader(name: &str, label: &str, skinned: bool) -> ShaderDescriptor {
    ShaderDescriptor::new(name)
        .with_label(label)
        .with_define("SKINNED", u8::from(skinned))
        .with_matrices(ExpectedMatrices::MODEL | ExpectedMatrices::VIEW_PROJECTION | ExpectedMatrices::MVP | ExpectedMatrices::NORMAL)
        .with_sampler(DIFFUSE_MAP, 0)
        .with_sampler(SPECULAR_MAP, 1)
        .with_sampler(NORMAL_MAP, 2)
        .with_sampler(DEPTH_MAP, 3)
}

impl ForwardShadingToolbox {
    pub(crate) fn setup(guard: &mut SetupGuard<'_>) -> Self {
        use umbra_core::renderer::{UNIT_SHADOW_CUBEMAPS, UNIT_SHADOW_MAPS};
        let lit = |label: &str, skinned: bool| {
            material_shader("forward_lit", label, skinned)
                .with_matrices(ExpectedMatrices::all())
                .with_sampler("shadowMaps", UNIT_SHADOW_MAPS)
                .with_sampler("shadowCubemaps", UNIT_SHADOW_CUBEMAPS)
        };
        Self {
            unlit: guard.shader(material_shader("forward_unlit", "forward_unlit", false)),
            unlit_skinned: guard.shader(material_shader("forward_unlit", "forward_unlit_skinned", true)),
            lit: guard.shader(lit("forward_lit", false)),
            lit_skinned: guard.shader(lit("forward_lit_skinned", true)),
            debug_lines: guard.shader(
                ShaderDescriptor::new("debug_lines").with_matrices(ExpectedMatrices::VIEW_PROJECTION),
            ),
        }
    }

    pub(crate) fn dispose(self, ctx: &mut RenderContext) {
        for shader in [self.unlit, self.unlit_skinned, self.lit, self.lit_skinned, self.debug_lines] {
            release_shader(ctx, shader);
        }
    }
}
