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

//! The immediate-mode device contract every pass is written against.

use crate::math::{LinearRgba, Rect};
use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError, ShaderError};
use std::fmt::Debug;

/// A GPU (or a CPU standing in for one) driven in immediate mode.
///
/// The device holds the process-wide binding state: the current framebuffer,
/// draw buffers, viewport, program, bound textures and uniform buffers, and
/// the active [`RasterState`]. Every setter changes that state until it is set
/// again; callers that need to restore it go through the render context's
/// scoped guards.
pub trait GraphicsDevice: Debug {
    /// Returns information about the adapter behind this device.
    fn adapter_info(&self) -> GraphicsAdapterInfo;

    /// Creates a texture with undefined (zeroed on the software device) contents.
    /// ## Errors
    /// * `ResourceError::InvalidDescriptor` - zero size, zero mips, or a size above the limit.
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Uploads one full layer of one mip level.
    /// ## Arguments
    /// * `layer` - the 2D layer (see [`TextureDescriptor::layer_count`]).
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - the mip, the layer or the data length does not fit.
    fn write_texture(
        &mut self,
        id: TextureId,
        mip: u32,
        layer: u32,
        data: TexelData<'_>,
    ) -> Result<(), ResourceError>;

    /// Regenerates every mip level below zero from level zero.
    fn generate_mipmaps(&mut self, id: TextureId) -> Result<(), ResourceError>;

    /// Releases a texture. Framebuffers still referencing it become incomplete.
    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates an empty framebuffer.
    fn create_framebuffer(&mut self, label: &str) -> Result<FramebufferId, ResourceError>;

    /// Attaches (or with `None`, detaches) a texture level/layer.
    fn attach_texture(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        texture: Option<TextureId>,
        mip: u32,
        layer: AttachmentLayer,
    ) -> Result<(), ResourceError>;

    /// Checks completeness.
    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;

    /// Releases a framebuffer. Attached textures are not destroyed.
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), ResourceError>;

    /// Makes `framebuffer` (or the default one) the draw and read target.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// Selects which colour attachments the fragment outputs go to:
    /// output `i` writes colour attachment `buffers[i]`.
    fn set_draw_buffers(&mut self, buffers: &[u32]);

    /// Sets the viewport of the current framebuffer.
    fn set_viewport(&mut self, viewport: Rect);

    /// Clears the current framebuffer.
    fn clear(&mut self, request: &ClearRequest);

    /// Copies a rectangle between framebuffers, scaling with `filter`.
    /// Colour is read from attachment `read_attachment` and written to the draw buffers of `dst`.
    #[allow(clippy::too_many_arguments)]
    fn blit_framebuffer(
        &mut self,
        src: Option<FramebufferId>,
        read_attachment: u32,
        src_rect: Rect,
        dst: Option<FramebufferId>,
        dst_rect: Rect,
        mask: BlitMask,
        filter: FilterMode,
    ) -> Result<(), ResourceError>;

    /// Reads back a colour attachment as linear floats, rows bottom-up.
    fn read_pixels(
        &mut self,
        framebuffer: Option<FramebufferId>,
        attachment: u32,
        rect: Rect,
    ) -> Result<Vec<LinearRgba>, ResourceError>;

    /// Compiles and links a program.
    /// ## Errors
    /// * `ShaderError::CompilationError` / `ShaderError::LinkError` with the driver log.
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ShaderError>;

    /// Releases a program.
    fn destroy_program(&mut self, id: ProgramId) -> Result<(), ResourceError>;

    /// Makes `id` the current program.
    fn use_program(&mut self, id: Option<ProgramId>);

    /// Uploads a uniform to the current program. Unknown names are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue<'_>);

    /// Binds a texture to a texture unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Creates a uniform buffer of `descriptor.size` zeroed bytes.
    fn create_uniform_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferId, ResourceError>;

    /// Writes bytes into a uniform buffer at `offset`.
    fn write_uniform_buffer(
        &mut self,
        id: BufferId,
        offset: usize,
        data: &[u8],
    ) -> Result<(), ResourceError>;

    /// Binds a uniform buffer to a binding point.
    fn bind_uniform_buffer(&mut self, binding: u32, id: Option<BufferId>);

    /// Releases a uniform buffer.
    fn destroy_uniform_buffer(&mut self, id: BufferId) -> Result<(), ResourceError>;

    /// Uploads an indexed triangle mesh.
    fn create_mesh(&mut self, descriptor: &MeshDescriptor<'_>) -> Result<MeshId, ResourceError>;

    /// Releases a mesh.
    fn destroy_mesh(&mut self, id: MeshId) -> Result<(), ResourceError>;

    /// Draws a mesh with the current program, state and bindings.
    fn draw_mesh(&mut self, id: MeshId) -> Result<(), RenderError>;

    /// Draws a line list with the current program, state and bindings.
    fn draw_lines(&mut self, vertices: &[LineVertex]) -> Result<(), RenderError>;

    /// Replaces the fixed-function state.
    fn apply_state(&mut self, state: &RasterState);
}
