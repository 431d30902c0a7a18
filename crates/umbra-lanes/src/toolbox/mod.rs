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

//! Toolboxes: the long-lived GPU resources of one rendering feature.
//!
//! A toolbox owns the framebuffers, textures and shaders its feature needs,
//! sized for one [`VideoSettings`] profile. Toolboxes are created together by
//! a [`RenderToolboxCollection`] and disposed with it; nothing in a toolbox
//! changes between frames except the content of its render targets and the
//! record of what that content is.

mod collection;
mod composed_image;
mod deferred;
mod final_target;
mod forward;
mod gaussian_blur;
mod main_framebuffer;
mod shadow_mapping;
mod smaa;
mod ssao;

pub use collection::RenderToolboxCollection;
pub use composed_image::ComposedImageStorageToolbox;
pub use deferred::DeferredShadingToolbox;
pub use final_target::FinalRenderTargetToolbox;
pub use forward::ForwardShadingToolbox;
pub use gaussian_blur::GaussianBlurToolbox;
pub use main_framebuffer::MainFramebufferToolbox;
pub use shadow_mapping::ShadowMappingToolbox;
pub use smaa::SmaaToolbox;
pub use ssao::{ssao_kernel, SsaoToolbox, SSAO_NOISE_SIZE};

use crate::context::{FramebufferHandle, RenderContext, TextureHandle};
use crate::error::ToolboxError;
use crate::shader::{Shader, ShaderDescriptor};
use std::collections::BTreeMap;
use umbra_core::math::Extent2D;
use umbra_core::renderer::{
    AttachmentLayer, AttachmentPoint, ResourceError, TextureDescriptor, TextureFormat, VideoSettings,
};

/// The kinds of toolbox, in the order a collection builds them.
///
/// Later kinds may borrow resources from earlier ones (the deferred toolbox
/// shares the main framebuffer's depth/stencil), so the order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolboxKind {
    /// HDR colour, bright colour, velocity and depth/stencil.
    MainFramebuffer,
    /// Programs of the forward pass.
    ForwardShading,
    /// G-buffer and the deferred lighting programs.
    DeferredShading,
    /// Shadow-map arrays.
    ShadowMapping,
    /// Ambient occlusion target, kernel and noise.
    Ssao,
    /// Half-resolution ping-pong pair for bloom.
    GaussianBlur,
    /// SMAA intermediate targets.
    Smaa,
    /// Current and previous LDR frames for temporal SMAA.
    ComposedImageStorage,
    /// The LDR image handed to the output.
    FinalRenderTarget,
}

/// What to build: a kind, the size of its targets and settings-derived defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolboxDescriptor {
    /// The kind.
    pub kind: ToolboxKind,
    /// Size of its render targets.
    pub size: Extent2D,
    /// `#define`s injected into its programs.
    pub defines: Vec<(String, String)>,
}

impl ToolboxDescriptor {
    /// A descriptor without defines.
    pub fn new(kind: ToolboxKind, size: Extent2D) -> Self {
        Self {
            kind,
            size,
            defines: Vec::new(),
        }
    }

    /// Adds a define.
    pub fn with_define(mut self, name: &str, value: impl ToString) -> Self {
        self.defines.push((name.to_string(), value.to_string()));
        self
    }
}

/// One toolbox of any kind.
#[derive(Debug)]
pub enum Toolbox {
    /// See [`MainFramebufferToolbox`].
    MainFramebuffer(MainFramebufferToolbox),
    /// See [`ForwardShadingToolbox`].
    ForwardShading(ForwardShadingToolbox),
    /// See [`DeferredShadingToolbox`].
    DeferredShading(DeferredShadingToolbox),
    /// See [`ShadowMappingToolbox`].
    ShadowMapping(ShadowMappingToolbox),
    /// See [`SsaoToolbox`].
    Ssao(SsaoToolbox),
    /// See [`GaussianBlurToolbox`].
    GaussianBlur(GaussianBlurToolbox),
    /// See [`SmaaToolbox`].
    Smaa(SmaaToolbox),
    /// See [`ComposedImageStorageToolbox`].
    ComposedImageStorage(ComposedImageStorageToolbox),
    /// See [`FinalRenderTargetToolbox`].
    FinalRenderTarget(FinalRenderTargetToolbox),
}

impl Toolbox {
    /// Builds the toolbox a descriptor names.
    ///
    /// ## Errors
    /// * `ToolboxError::MissingDependency` if it shares resources with a toolbox not in `existing`.
    /// * `ToolboxError::Resource` if allocating a target fails. Whatever was
    ///   allocated before the failure is released.
    pub fn setup(
        ctx: &mut RenderContext,
        descriptor: &ToolboxDescriptor,
        settings: &VideoSettings,
        existing: &BTreeMap<ToolboxKind, Toolbox>,
    ) -> Result<Self, ToolboxError> {
        let mut guard = SetupGuard::new(ctx, descriptor);
        let toolbox = match descriptor.kind {
            ToolboxKind::MainFramebuffer => {
                Toolbox::MainFramebuffer(MainFramebufferToolbox::setup(&mut guard, settings)?)
            }
            ToolboxKind::ForwardShading => {
                Toolbox::ForwardShading(ForwardShadingToolbox::setup(&mut guard))
            }
            ToolboxKind::DeferredShading => {
                let main = existing
                    .get(&ToolboxKind::MainFramebuffer)
                    .and_then(MainFramebufferToolbox::from_toolbox)
                    .ok_or(ToolboxError::MissingDependency {
                        kind: ToolboxKind::DeferredShading,
                        dependency: ToolboxKind::MainFramebuffer,
                    })?;
                Toolbox::DeferredShading(DeferredShadingToolbox::setup(&mut guard, main)?)
            }
            ToolboxKind::ShadowMapping => {
                Toolbox::ShadowMapping(ShadowMappingToolbox::setup(&mut guard, settings)?)
            }
            ToolboxKind::Ssao => Toolbox::Ssao(SsaoToolbox::setup(&mut guard, settings)?),
            ToolboxKind::GaussianBlur => Toolbox::GaussianBlur(GaussianBlurToolbox::setup(&mut guard)?),
            ToolboxKind::Smaa => Toolbox::Smaa(SmaaToolbox::setup(&mut guard)?),
            ToolboxKind::ComposedImageStorage => {
                Toolbox::ComposedImageStorage(ComposedImageStorageToolbox::setup(&mut guard)?)
            }
            ToolboxKind::FinalRenderTarget => {
                Toolbox::FinalRenderTarget(FinalRenderTargetToolbox::setup(&mut guard)?)
            }
        };
        guard.commit();
        log::debug!("Set up {:?} toolbox", descriptor.kind);
        Ok(toolbox)
    }

    /// The kind of this toolbox.
    pub fn kind(&self) -> ToolboxKind {
        match self {
            Toolbox::MainFramebuffer(_) => ToolboxKind::MainFramebuffer,
            Toolbox::ForwardShading(_) => ToolboxKind::ForwardShading,
            Toolbox::DeferredShading(_) => ToolboxKind::DeferredShading,
            Toolbox::ShadowMapping(_) => ToolboxKind::ShadowMapping,
            Toolbox::Ssao(_) => ToolboxKind::Ssao,
            Toolbox::GaussianBlur(_) => ToolboxKind::GaussianBlur,
            Toolbox::Smaa(_) => ToolboxKind::Smaa,
            Toolbox::ComposedImageStorage(_) => ToolboxKind::ComposedImageStorage,
            Toolbox::FinalRenderTarget(_) => ToolboxKind::FinalRenderTarget,
        }
    }

    /// Releases everything the toolbox owns.
    pub fn dispose(self, ctx: &mut RenderContext) {
        let kind = self.kind();
        match self {
            Toolbox::MainFramebuffer(tb) => tb.dispose(ctx),
            Toolbox::ForwardShading(tb) => tb.dispose(ctx),
            Toolbox::DeferredShading(tb) => tb.dispose(ctx),
            Toolbox::ShadowMapping(tb) => tb.dispose(ctx),
            Toolbox::Ssao(tb) => tb.dispose(ctx),
            Toolbox::GaussianBlur(tb) => tb.dispose(ctx),
            Toolbox::Smaa(tb) => tb.dispose(ctx),
            Toolbox::ComposedImageStorage(tb) => tb.dispose(ctx),
            Toolbox::FinalRenderTarget(tb) => tb.dispose(ctx),
        }
        log::debug!("Disposed {kind:?} toolbox");
    }
}

/// Typed access to one variant of [`Toolbox`].
pub trait ToolboxType: Sized {
    /// The kind this type is stored under.
    const KIND: ToolboxKind;
    /// Borrows the variant, if `toolbox` is one.
    fn from_toolbox(toolbox: &Toolbox) -> Option<&Self>;
    /// Mutably borrows the variant, if `toolbox` is one.
    fn from_toolbox_mut(toolbox: &mut Toolbox) -> Option<&mut Self>;
    /// Wraps the value.
    fn into_toolbox(self) -> Toolbox;
}

macro_rules! impl_toolbox_type {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl ToolboxType for $ty {
                const KIND: ToolboxKind = ToolboxKind::$variant;

                fn from_toolbox(toolbox: &Toolbox) -> Option<&Self> {
                    match toolbox {
                        Toolbox::$variant(tb) => Some(tb),
                        _ => None,
                    }
                }

                fn from_toolbox_mut(toolbox: &mut Toolbox) -> Option<&mut Self> {
                    match toolbox {
                        Toolbox::$variant(tb) => Some(tb),
                        _ => None,
                    }
                }

                fn into_toolbox(self) -> Toolbox {
                    Toolbox::$variant(self)
                }
            }
        )*
    };
}

impl_toolbox_type! {
    MainFramebuffer => MainFramebufferToolbox,
    ForwardShading => ForwardShadingToolbox,
    DeferredShading => DeferredShadingToolbox,
    ShadowMapping => ShadowMappingToolbox,
    Ssao => SsaoToolbox,
    GaussianBlur => GaussianBlurToolbox,
    Smaa => SmaaToolbox,
    ComposedImageStorage => ComposedImageStorageToolbox,
    FinalRenderTarget => FinalRenderTargetToolbox,
}

/// Records what a toolbox allocates during setup and gives it all back if
/// setup fails before [`SetupGuard::commit`].
pub(crate) struct SetupGuard<'a> {
    ctx: &'a mut RenderContext,
    descriptor: &'a ToolboxDescriptor,
    textures: Vec<TextureHandle>,
    framebuffers: Vec<FramebufferHandle>,
    shaders: Vec<Shader>,
    committed: bool,
}

impl<'a> SetupGuard<'a> {
    fn new(ctx: &'a mut RenderContext, descriptor: &'a ToolboxDescriptor) -> Self {
        Self {
            ctx,
            descriptor,
            textures: Vec::new(),
            framebuffers: Vec::new(),
            shaders: Vec::new(),
            committed: false,
        }
    }

    pub(crate) fn ctx(&mut self) -> &mut RenderContext {
        self.ctx
    }

    pub(crate) fn size(&self) -> Extent2D {
        self.descriptor.size
    }

    pub(crate) fn texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureHandle, ResourceError> {
        let texture = self.ctx.create_texture(descriptor)?;
        self.textures.push(texture);
        Ok(texture)
    }

    /// A single-level 2D target of the toolbox size.
    pub(crate) fn target(&mut self, label: &str, format: TextureFormat) -> Result<TextureHandle, ResourceError> {
        let size = self.size();
        self.texture(&TextureDescriptor::d2(label, size, format))
    }

    pub(crate) fn framebuffer(&mut self, label: &str) -> Result<FramebufferHandle, ResourceError> {
        let framebuffer = self.ctx.create_framebuffer(label)?;
        self.framebuffers.push(framebuffer);
        Ok(framebuffer)
    }

    /// A framebuffer with the given colour attachments (in order) and optional depth.
    pub(crate) fn framebuffer_with(
        &mut self,
        label: &str,
        colors: &[TextureHandle],
        depth: Option<(AttachmentPoint, TextureHandle)>,
    ) -> Result<FramebufferHandle, ResourceError> {
        let framebuffer = self.framebuffer(label)?;
        for (index, texture) in colors.iter().enumerate() {
            self.ctx.attach(
                framebuffer,
                AttachmentPoint::Color(index as u32),
                *texture,
                0,
                AttachmentLayer::Whole,
            )?;
        }
        if let Some((point, texture)) = depth {
            self.ctx
                .attach(framebuffer, point, texture, 0, AttachmentLayer::Whole)?;
        }
        self.ctx.check_framebuffer(framebuffer);
        Ok(framebuffer)
    }

    /// Loads a shader with the toolbox defines. A failure is logged and yields `None`.
    pub(crate) fn shader(&mut self, descriptor: ShaderDescriptor) -> Option<Shader> {
        let descriptor = descriptor.with_defines(&self.descriptor.defines);
        let shader = Shader::load(self.ctx, &descriptor)?;
        self.shaders.push(shader.clone());
        Some(shader)
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SetupGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        log::warn!(
            "Setup of the {:?} toolbox failed, releasing its partial resources",
            self.descriptor.kind
        );
        for framebuffer in self.framebuffers.drain(..) {
            self.ctx.release_framebuffer(framebuffer);
        }
        for texture in self.textures.drain(..) {
            self.ctx.release_texture(texture);
        }
        for shader in self.shaders.drain(..) {
            shader.release(self.ctx);
        }
    }
}

/// Two same-sized targets that passes render back and forth between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    /// The framebuffers, each with one colour attachment.
    pub framebuffers: [FramebufferHandle; 2],
    /// Their colour textures.
    pub textures: [TextureHandle; 2],
}

impl PingPong {
    pub(crate) fn create(guard: &mut SetupGuard<'_>, label: &str, size: Extent2D, format: TextureFormat) -> Result<Self, ResourceError> {
        let a = guard.texture(&TextureDescriptor::d2(format!("{label}_a"), size, format))?;
        let b = guard.texture(&TextureDescriptor::d2(format!("{label}_b"), size, format))?;
        let fa = guard.framebuffer_with(&format!("{label}_a"), &[a], None)?;
        let fb = guard.framebuffer_with(&format!("{label}_b"), &[b], None)?;
        Ok(Self {
            framebuffers: [fa, fb],
            textures: [a, b],
        })
    }

    pub(crate) fn release(self, ctx: &mut RenderContext) {
        for framebuffer in self.framebuffers {
            ctx.release_framebuffer(framebuffer);
        }
        for texture in self.textures {
            ctx.release_texture(texture);
        }
    }
}

/// Releases an optional shader.
pub(crate) fn release_shader(ctx: &mut RenderContext, shader: Option<Shader>) {
    if let Some(shader) = shader {
        shader.release(ctx);
    }
}
