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

//! Compiled programs and the contract they declare to the renderers.
//!
//! A [`Shader`] knows which transformation matrices its program reads and
//! which sampler goes on which texture unit. It knows nothing about passes:
//! the toolbox that loaded it decides when it runs.

use crate::context::RenderContext;
use crate::scene::Camera;
use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::Arc;
use umbra_core::math::{normal_matrix, Mat4};
use umbra_core::renderer::{ProgramId, UniformValue};

bitflags! {
    /// The matrices a program reads. [`Shader::bind_matrices`] uploads only these.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExpectedMatrices: u32 {
        /// `model`
        const MODEL = 1 << 0;
        /// `view`
        const VIEW = 1 << 1;
        /// `projection`
        const PROJECTION = 1 << 2;
        /// `modelView`
        const MODEL_VIEW = 1 << 3;
        /// `viewProjection`
        const VIEW_PROJECTION = 1 << 4;
        /// `mvp`
        const MVP = 1 << 5;
        /// `normalMatrix`, the inverse transpose of the model matrix.
        const NORMAL = 1 << 6;
    }
}

/// How to build a [`Shader`]: a source name, settings-derived defines, the
/// matrices it expects and its sampler-to-unit assignments.
#[derive(Debug, Clone)]
pub struct ShaderDescriptor {
    /// Name asked of the [`ShaderSourceProvider`](umbra_core::renderer::ShaderSourceProvider).
    pub name: String,
    /// Label recorded in traces and logs. Defaults to `name`.
    pub label: String,
    /// `#define`s injected into every stage.
    pub defines: Vec<(String, String)>,
    /// Matrices the program reads.
    pub matrices: ExpectedMatrices,
    /// Sampler names and the units they read from.
    pub samplers: Vec<(String, u32)>,
}

impl ShaderDescriptor {
    /// A descriptor with no defines, matrices or samplers.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            defines: Vec::new(),
            matrices: ExpectedMatrices::empty(),
            samplers: Vec::new(),
        }
    }

    /// Overrides the trace label, for variants of one source.
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// Adds a `#define`.
    pub fn with_define(mut self, name: &str, value: impl ToString) -> Self {
        self.defines.push((name.to_string(), value.to_string()));
        self
    }

    /// Adds several `#define`s.
    pub fn with_defines(mut self, defines: &[(String, String)]) -> Self {
        self.defines.extend_from_slice(defines);
        self
    }

    /// Declares the matrices the program reads.
    pub fn with_matrices(mut self, matrices: ExpectedMatrices) -> Self {
        self.matrices = matrices;
        self
    }

    /// Assigns a sampler to a texture unit.
    pub fn with_sampler(mut self, name: &str, unit: u32) -> Self {
        self.samplers.push((name.to_string(), unit));
        self
    }
}

/// A compiled program with its declared contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    label: String,
    program: ProgramId,
    matrices: ExpectedMatrices,
    samplers: Vec<(String, u32)>,
}

impl Shader {
    /// Resolves, compiles and configures a program.
    ///
    /// Returns `None` after logging the reason if the source is missing or
    /// does not compile; callers skip whatever pass needed it.
    pub fn load(ctx: &mut RenderContext, descriptor: &ShaderDescriptor) -> Option<Self> {
        let mut source = match ctx.shader_source(&descriptor.name) {
            Ok(source) => source,
            Err(err) => {
                log::error!("Failed to load shader '{}': {err}", descriptor.label);
                return None;
            }
        };
        for (name, value) in &descriptor.defines {
            source.set_define(name.as_str(), value);
        }
        let program = match ctx.create_program(&source) {
            Ok(program) => program,
            Err(err) => {
                log::error!("{err}");
                return None;
            }
        };
        let shader = Self {
            label: descriptor.label.clone(),
            program,
            matrices: descriptor.matrices,
            samplers: descriptor.samplers.clone(),
        };
        // Sampler units never change, so set them once.
        shader.bind(ctx);
        for (name, unit) in &shader.samplers {
            ctx.set_uniform(name, UniformValue::Int(*unit as i32));
        }
        log::debug!("Loaded shader '{}'", shader.label);
        Some(shader)
    }

    /// The trace label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The device program.
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// The matrices the program reads.
    pub fn matrices(&self) -> ExpectedMatrices {
        self.matrices
    }

    /// The unit a sampler reads from.
    pub fn sampler_unit(&self, name: &str) -> Option<u32> {
        self.samplers
            .iter()
            .find(|(sampler, _)| sampler == name)
            .map(|(_, unit)| *unit)
    }

    /// All sampler assignments.
    pub fn samplers(&self) -> &[(String, u32)] {
        &self.samplers
    }

    /// Makes this program current.
    pub fn bind(&self, ctx: &mut RenderContext) {
        ctx.use_program(self.program, &self.label);
    }

    /// Uploads the declared matrices for one object seen by `camera`.
    pub fn bind_matrices(&self, ctx: &mut RenderContext, model: &Mat4, camera: &Camera) {
        let m = self.matrices;
        if m.contains(ExpectedMatrices::MODEL) {
            ctx.set_uniform("model", UniformValue::Mat4(*model));
        }
        if m.contains(ExpectedMatrices::VIEW) {
            ctx.set_uniform("view", UniformValue::Mat4(camera.view));
        }
        if m.contains(ExpectedMatrices::PROJECTION) {
            ctx.set_uniform("projection", UniformValue::Mat4(camera.projection));
        }
        if m.contains(ExpectedMatrices::MODEL_VIEW) {
            ctx.set_uniform("modelView", UniformValue::Mat4(camera.view * *model));
        }
        if m.contains(ExpectedMatrices::VIEW_PROJECTION) {
            ctx.set_uniform("viewProjection", UniformValue::Mat4(camera.view_projection()));
        }
        if m.contains(ExpectedMatrices::MVP) {
            ctx.set_uniform("mvp", UniformValue::Mat4(camera.view_projection() * *model));
        }
        if m.contains(ExpectedMatrices::NORMAL) {
            ctx.set_uniform("normalMatrix", UniformValue::Mat3(normal_matrix(model)));
        }
    }

    /// Destroys the program.
    pub fn release(&self, ctx: &mut RenderContext) {
        ctx.destroy_program(self.program);
    }
}

/// Named custom shaders that materials refer to.
///
/// Materials hold their custom shader through an [`Arc`]. A shader replaced
/// or disposed while materials still hold it is retired rather than
/// destroyed, and its program is released by [`ShaderLibrary::collect_garbage`]
/// once the last holder is gone.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: HashMap<String, Arc<Shader>>,
    retired: Vec<Arc<Shader>>,
}

impl ShaderLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a shader and registers it under its label, retiring the shader
    /// it replaces.
    pub fn load(&mut self, ctx: &mut RenderContext, descriptor: &ShaderDescriptor) -> Option<Arc<Shader>> {
        let shader = Arc::new(Shader::load(ctx, descriptor)?);
        if let Some(old) = self.shaders.insert(descriptor.label.clone(), shader.clone()) {
            self.retire(ctx, old);
        }
        Some(shader)
    }

    /// Releases the program now if nothing else holds the shader, otherwise
    /// keeps it until [`Self::collect_garbage`] finds it unused.
    fn retire(&mut self, ctx: &mut RenderContext, shader: Arc<Shader>) {
        match Arc::try_unwrap(shader) {
            Ok(shader) => shader.release(ctx),
            Err(shared) => {
                log::debug!("Shader '{}' is still in use, retiring it", shared.label());
                self.retired.push(shared);
            }
        }
    }

    /// Releases the programs of retired shaders nobody holds anymore.
    pub fn collect_garbage(&mut self, ctx: &mut RenderContext) {
        for shader in std::mem::take(&mut self.retired) {
            self.retire(ctx, shader);
        }
    }

    /// Looks a shader up. A missing name is logged.
    pub fn get(&self, name: &str) -> Option<Arc<Shader>> {
        let shader = self.shaders.get(name).cloned();
        if shader.is_none() {
            log::error!("Shader '{name}' is not in the library");
        }
        shader
    }

    /// Number of registered shaders.
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Number of replaced shaders waiting for their last holder to go.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Unregisters every shader and releases the programs nobody holds.
    pub fn dispose(&mut self, ctx: &mut RenderContext) {
        let shaders: Vec<Arc<Shader>> = self.shaders.drain().map(|(_, shader)| shader).collect();
        for shader in shaders {
            self.retire(ctx, shader);
        }
        self.collect_garbage(ctx);
        if !self.retired.is_empty() {
            log::warn!(
                "{} shader(s) still held by materials outlive the shader library",
                self.retired.len()
            );
        }
    }
}
