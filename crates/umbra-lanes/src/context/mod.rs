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

//! The render context: the single owner of the graphics device.
//!
//! Every pass talks to the GPU through [`RenderContext`]. It mirrors the
//! process-wide binding state (raster state, framebuffer, draw buffers,
//! viewport, program) so that [`StateScope`] guards can restore it, keeps the
//! reference-counted [`GpuResources`] arena, owns the shared primitive meshes
//! and the empty fallback texture, and counts what a frame did.

mod resources;
mod scope;

pub use self::resources::{
    Attachment, FramebufferEntry, FramebufferHandle, GpuResources, TextureEntry, TextureHandle,
};
pub use self::scope::StateScope;

use self::scope::SavedState;
use crate::primitives::{GpuMesh, Primitives};
use umbra_core::math::{Extent2D, LinearRgba, Rect};
use umbra_core::renderer::{
    AttachmentLayer, AttachmentPoint, BlitMask, BufferDescriptor, BufferId, ClearRequest,
    FilterMode, FrameTrace, FramebufferStatus, GraphicsAdapterInfo, GraphicsDevice, LineVertex,
    MeshDescriptor, ProgramId, ProgramSource, RasterState, RenderStats, ResourceError,
    ShaderError, ShaderSourceProvider, TexelData, TextureDescriptor, TextureFormat, TextureId,
    TraceEvent, UniformValue, Vertex,
};

/// The owner of the device and of everything the pipeline allocates on it.
pub struct RenderContext {
    device: Box<dyn GraphicsDevice>,
    shader_sources: Box<dyn ShaderSourceProvider>,
    resources: GpuResources,
    default_size: Extent2D,
    state: RasterState,
    framebuffer: Option<FramebufferHandle>,
    draw_buffers: Vec<u32>,
    viewport: Rect,
    program: Option<(ProgramId, String)>,
    program_count: usize,
    primitives: Primitives,
    empty_texture: TextureHandle,
    stats: RenderStats,
    trace: Option<FrameTrace>,
    open_passes: Vec<String>,
    disposed: bool,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("device", &self.device)
            .field("resources", &self.resources)
            .field("default_size", &self.default_size)
            .field("state", &self.state)
            .field("framebuffer", &self.framebuffer)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl RenderContext {
    /// Takes ownership of `device`, uploads the shared primitives and the
    /// empty texture, and puts the device into the default state.
    ///
    /// `default_size` is the size of the default framebuffer (window or backbuffer).
    pub fn new(
        mut device: Box<dyn GraphicsDevice>,
        shader_sources: Box<dyn ShaderSourceProvider>,
        default_size: Extent2D,
    ) -> Result<Self, ResourceError> {
        let primitives = Primitives::upload(device.as_mut())?;
        let mut resources = GpuResources::new();

        let descriptor = TextureDescriptor::d2("empty", Extent2D::square(1), TextureFormat::Rgba8);
        let empty_id = device.create_texture(&descriptor)?;
        device.write_texture(empty_id, 0, 0, TexelData::U8(&[255, 255, 255, 255]))?;
        let empty_texture = resources.insert_texture(empty_id, descriptor);

        let state = RasterState::default();
        let viewport = default_size.rect();
        device.apply_state(&state);
        device.bind_framebuffer(None);
        device.set_draw_buffers(&[0]);
        device.set_viewport(viewport);

        let info = device.adapter_info();
        log::info!(
            "Render context created on '{}' ({:?}), {}x{}",
            info.name,
            info.backend_type,
            default_size.width,
            default_size.height
        );

        Ok(Self {
            device,
            shader_sources,
            resources,
            default_size,
            state,
            framebuffer: None,
            draw_buffers: vec![0],
            viewport,
            program: None,
            program_count: 0,
            primitives,
            empty_texture,
            stats: RenderStats::default(),
            trace: None,
            open_passes: Vec::new(),
            disposed: false,
        })
    }

    /// Direct access to the device, for operations the context does not wrap.
    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// Information about the adapter.
    pub fn adapter_info(&self) -> GraphicsAdapterInfo {
        self.device.adapter_info()
    }

    /// The resource arena.
    pub fn resources(&self) -> &GpuResources {
        &self.resources
    }

    /// The shared unit meshes.
    pub fn primitives(&self) -> &Primitives {
        &self.primitives
    }

    /// A 1x1 opaque white texture bound wherever a sampler has nothing better.
    pub fn empty_texture(&self) -> TextureHandle {
        self.empty_texture
    }

    /// Size of the default framebuffer.
    pub fn default_size(&self) -> Extent2D {
        self.default_size
    }

    /// Resizes the default framebuffer bookkeeping (window resize).
    pub fn set_default_size(&mut self, size: Extent2D) {
        self.default_size = size;
        if self.framebuffer.is_none() {
            self.set_viewport(size.rect());
        }
    }

    // --- Textures -------------------------------------------------------

    /// Creates a texture with one reference.
    pub fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureHandle, ResourceError> {
        let id = self.device.create_texture(descriptor)?;
        log::debug!(
            "Created texture '{}' {:?} {:?} {}x{} ({} layers, {} mips)",
            descriptor.label,
            descriptor.target,
            descriptor.format,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.layer_count(),
            descriptor.mip_levels
        );
        Ok(self.resources.insert_texture(id, descriptor.clone()))
    }

    /// The device id behind a handle.
    pub fn texture_id(&self, handle: TextureHandle) -> Option<TextureId> {
        self.resources.texture(handle).map(|t| t.id)
    }

    /// The descriptor a texture was created with.
    pub fn texture_descriptor(&self, handle: TextureHandle) -> Option<&TextureDescriptor> {
        self.resources.texture(handle).map(|t| &t.descriptor)
    }

    /// Adds a reference to a shared texture.
    pub fn retain_texture(&mut self, handle: TextureHandle) {
        if !self.resources.retain_texture(handle) {
            log::warn!("Tried to retain a texture that no longer exists");
        }
    }

    /// Drops a reference; the device texture is destroyed with the last one.
    pub fn release_texture(&mut self, handle: TextureHandle) {
        if let Some(id) = self.resources.release_texture(handle) {
            log::debug!("Destroying texture {id:?}");
            if let Err(err) = self.device.destroy_texture(id) {
                log::warn!("Failed to destroy texture {id:?}: {err}");
            }
        }
    }

    /// Uploads one layer of one mip level.
    pub fn write_texture(
        &mut self,
        handle: TextureHandle,
        mip: u32,
        layer: u32,
        data: TexelData<'_>,
    ) -> Result<(), ResourceError> {
        let id = self.texture_id(handle).ok_or(ResourceError::InvalidHandle)?;
        self.device.write_texture(id, mip, layer, data)
    }

    /// Rebuilds the mip chain of a texture from level zero.
    pub fn generate_mipmaps(&mut self, handle: TextureHandle) -> Result<(), ResourceError> {
        let id = self.texture_id(handle).ok_or(ResourceError::InvalidHandle)?;
        self.device.generate_mipmaps(id)
    }

    // --- Framebuffers ---------------------------------------------------

    /// Creates an empty framebuffer.
    pub fn create_framebuffer(&mut self, label: &str) -> Result<FramebufferHandle, ResourceError> {
        let id = self.device.create_framebuffer(label)?;
        log::debug!("Created framebuffer '{label}'");
        Ok(self
            .resources
            .insert_framebuffer(id, label, Extent2D::default()))
    }

    /// Attaches a level/layer of `texture`, retaining it and releasing
    /// whatever was attached at the same point before.
    pub fn attach(
        &mut self,
        framebuffer: FramebufferHandle,
        point: AttachmentPoint,
        texture: TextureHandle,
        mip: u32,
        layer: AttachmentLayer,
    ) -> Result<(), ResourceError> {
        let fb_id = self
            .resources
            .framebuffer(framebuffer)
            .map(|fb| fb.id)
            .ok_or(ResourceError::InvalidHandle)?;
        let entry = self
            .resources
            .texture(texture)
            .ok_or(ResourceError::InvalidHandle)?;
        let (tex_id, size) = (entry.id, entry.descriptor.size.mip(mip));

        self.device
            .attach_texture(fb_id, point, Some(tex_id), mip, layer)?;
        self.resources.retain_texture(texture);
        let attachment = Attachment {
            point,
            texture,
            mip,
            layer,
        };
        if let Some(Some(previous)) = self.resources.set_attachment(framebuffer, attachment, size) {
            self.release_texture(previous);
        }
        Ok(())
    }

    /// Checks completeness; an incomplete framebuffer is logged with a readable reason.
    pub fn check_framebuffer(&self, framebuffer: FramebufferHandle) -> FramebufferStatus {
        let Some(entry) = self.resources.framebuffer(framebuffer) else {
            log::error!("Checked a framebuffer that no longer exists");
            return FramebufferStatus::MissingAttachment;
        };
        let status = self.device.framebuffer_status(entry.id);
        if !status.is_complete() {
            log::error!("Framebuffer '{}' is incomplete: {status}", entry.label);
        }
        status
    }

    /// Destroys a framebuffer and releases its attachments.
    pub fn release_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        if self.framebuffer == Some(framebuffer) {
            self.bind_framebuffer(None);
        }
        let Some(entry) = self.resources.remove_framebuffer(framebuffer) else {
            return;
        };
        log::debug!("Destroying framebuffer '{}'", entry.label);
        if let Err(err) = self.device.destroy_framebuffer(entry.id) {
            log::warn!("Failed to destroy framebuffer '{}': {err}", entry.label);
        }
        for attachment in entry.attachments {
            self.release_texture(attachment.texture);
        }
    }

    /// The texture attached at `point`.
    pub fn framebuffer_texture(&self, framebuffer: FramebufferHandle, point: AttachmentPoint) -> Option<TextureHandle> {
        self.resources
            .framebuffer(framebuffer)
            .and_then(|fb| fb.attachment(point))
    }

    /// Size of a framebuffer (the default one for `None`).
    pub fn framebuffer_size(&self, framebuffer: Option<FramebufferHandle>) -> Extent2D {
        match framebuffer {
            None => self.default_size,
            Some(handle) => self
                .resources
                .framebuffer(handle)
                .map(|fb| fb.size)
                .unwrap_or_default(),
        }
    }

    /// Binds a framebuffer, enables all of its colour attachments as draw
    /// buffers and sets the viewport to its full size.
    ///
    /// A stale handle is logged and the default framebuffer bound instead.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        let (handle, id, buffers, size) = match framebuffer.and_then(|h| self.resources.framebuffer(h).map(|fb| (h, fb))) {
            Some((handle, fb)) => {
                let count = fb.color_attachment_count();
                (Some(handle), Some(fb.id), (0..count).collect::<Vec<_>>(), fb.size)
            }
            None => {
                if framebuffer.is_some() {
                    log::error!("Tried to bind a framebuffer that no longer exists");
                }
                (None, None, vec![0], self.default_size)
            }
        };
        self.device.bind_framebuffer(id);
        self.framebuffer = handle;
        self.set_draw_buffers(&buffers);
        self.set_viewport(size.rect());
    }

    /// The currently bound framebuffer.
    pub fn current_framebuffer(&self) -> Option<FramebufferHandle> {
        self.framebuffer
    }

    /// Selects the colour attachments fragment outputs go to.
    pub fn set_draw_buffers(&mut self, buffers: &[u32]) {
        self.device.set_draw_buffers(buffers);
        self.draw_buffers.clear();
        self.draw_buffers.extend_from_slice(buffers);
    }

    /// The current draw buffers.
    pub fn draw_buffers(&self) -> &[u32] {
        &self.draw_buffers
    }

    /// Sets the viewport.
    pub fn set_viewport(&mut self, viewport: Rect) {
        if self.viewport != viewport {
            self.device.set_viewport(viewport);
            self.viewport = viewport;
        }
    }

    /// The current viewport.
    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Clears the bound framebuffer.
    pub fn clear(&mut self, request: &ClearRequest) {
        self.device.clear(request);
    }

    /// Copies a whole colour attachment (and optionally depth/stencil)
    /// between framebuffers, scaling if their sizes differ.
    pub fn blit(
        &mut self,
        src: Option<FramebufferHandle>,
        read_attachment: u32,
        dst: Option<FramebufferHandle>,
        mask: BlitMask,
        filter: FilterMode,
    ) -> Result<(), ResourceError> {
        let src_id = self.resolve_framebuffer(src)?;
        let dst_id = self.resolve_framebuffer(dst)?;
        let src_rect = self.framebuffer_size(src).rect();
        let dst_rect = self.framebuffer_size(dst).rect();
        self.device
            .blit_framebuffer(src_id, read_attachment, src_rect, dst_id, dst_rect, mask, filter)
    }

    /// Reads back a whole colour attachment, rows bottom-up.
    pub fn read_pixels(&mut self, framebuffer: Option<FramebufferHandle>, attachment: u32) -> Result<Vec<LinearRgba>, ResourceError> {
        let id = self.resolve_framebuffer(framebuffer)?;
        let rect = self.framebuffer_size(framebuffer).rect();
        self.device.read_pixels(id, attachment, rect)
    }

    fn resolve_framebuffer(&self, framebuffer: Option<FramebufferHandle>) -> Result<Option<umbra_core::renderer::FramebufferId>, ResourceError> {
        match framebuffer {
            None => Ok(None),
            Some(handle) => self
                .resources
                .framebuffer(handle)
                .map(|fb| Some(fb.id))
                .ok_or(ResourceError::InvalidHandle),
        }
    }

    // --- Fixed-function state -------------------------------------------

    /// Replaces the raster state. Redundant changes are not sent to the device.
    pub fn apply_state(&mut self, state: RasterState) {
        if self.state != state {
            self.device.apply_state(&state);
            self.state = state;
        }
    }

    /// The current raster state.
    pub fn state(&self) -> &RasterState {
        &self.state
    }

    /// Opens a scope restoring state, framebuffer, draw buffers and viewport on drop.
    pub fn scope(&mut self) -> StateScope<'_> {
        StateScope::new(self, None)
    }

    /// Like [`Self::scope`], also recording a labelled pass in the frame trace.
    pub fn pass(&mut self, label: &str) -> StateScope<'_> {
        StateScope::new(self, Some(label))
    }

    fn save_state(&self) -> SavedState {
        SavedState {
            raster: self.state,
            framebuffer: self.framebuffer,
            draw_buffers: self.draw_buffers.clone(),
            viewport: self.viewport,
        }
    }

    fn restore_state(&mut self, saved: &SavedState) {
        self.apply_state(saved.raster);
        if self.framebuffer != saved.framebuffer {
            let id = saved
                .framebuffer
                .and_then(|h| self.resources.framebuffer(h))
                .map(|fb| fb.id);
            self.device.bind_framebuffer(id);
            self.framebuffer = saved.framebuffer.filter(|_| id.is_some());
        }
        if self.draw_buffers != saved.draw_buffers {
            self.set_draw_buffers(&saved.draw_buffers);
        }
        // The device may have been rebound above, so always resend the viewport.
        self.device.set_viewport(saved.viewport);
        self.viewport = saved.viewport;
    }

    // --- Programs -------------------------------------------------------

    /// Resolves a program source by name.
    pub fn shader_source(&self, name: &str) -> Result<ProgramSource, ShaderError> {
        self.shader_sources.source(name)
    }

    /// Compiles a program.
    pub fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ShaderError> {
        let program = self.device.create_program(source)?;
        self.program_count += 1;
        Ok(program)
    }

    /// Number of programs created and not yet destroyed.
    pub fn program_count(&self) -> usize {
        self.program_count
    }

    /// Destroys a program.
    pub fn destroy_program(&mut self, program: ProgramId) {
        if self.program.as_ref().is_some_and(|(id, _)| *id == program) {
            self.device.use_program(None);
            self.program = None;
        }
        match self.device.destroy_program(program) {
            Ok(()) => self.program_count = self.program_count.saturating_sub(1),
            Err(err) => log::warn!("Failed to destroy program {program:?}: {err}"),
        }
    }

    /// Makes a program current; `label` names it in the frame trace.
    pub fn use_program(&mut self, program: ProgramId, label: &str) {
        if self.program.as_ref().map(|(id, _)| *id) != Some(program) {
            self.device.use_program(Some(program));
            self.program = Some((program, label.to_string()));
        }
    }

    /// Label of the current program.
    pub fn current_program_label(&self) -> Option<&str> {
        self.program.as_ref().map(|(_, label)| label.as_str())
    }

    /// Uploads a uniform to the current program.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue<'_>) {
        self.device.set_uniform(name, value);
    }

    /// Binds a texture to a unit. `None`, or a handle whose texture is gone,
    /// binds the empty texture.
    pub fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        let id = texture
            .and_then(|handle| self.texture_id(handle))
            .or_else(|| self.texture_id(self.empty_texture));
        self.device.bind_texture(unit, id);
    }

    /// Leaves a unit with nothing bound.
    pub fn unbind_texture(&mut self, unit: u32) {
        self.device.bind_texture(unit, None);
    }

    // --- Buffers and meshes ---------------------------------------------

    /// Creates a zeroed uniform buffer.
    pub fn create_uniform_buffer(&mut self, label: &str, size: usize) -> Result<BufferId, ResourceError> {
        self.device.create_uniform_buffer(&BufferDescriptor {
            label: label.to_string(),
            size,
        })
    }

    /// Writes into a uniform buffer.
    pub fn write_uniform_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        self.device.write_uniform_buffer(buffer, offset, data)
    }

    /// Binds a uniform buffer to a binding point.
    pub fn bind_uniform_buffer(&mut self, binding: u32, buffer: Option<BufferId>) {
        self.device.bind_uniform_buffer(binding, buffer);
    }

    /// Destroys a uniform buffer.
    pub fn destroy_uniform_buffer(&mut self, buffer: BufferId) {
        if let Err(err) = self.device.destroy_uniform_buffer(buffer) {
            log::warn!("Failed to destroy uniform buffer {buffer:?}: {err}");
        }
    }

    /// Uploads an indexed triangle mesh.
    pub fn create_mesh(&mut self, label: &str, vertices: &[Vertex], indices: &[u32]) -> Result<GpuMesh, ResourceError> {
        let id = self.device.create_mesh(&MeshDescriptor {
            label,
            vertices,
            indices,
        })?;
        Ok(GpuMesh {
            id,
            triangles: (indices.len() / 3) as u32,
        })
    }

    /// Destroys a mesh.
    pub fn release_mesh(&mut self, mesh: GpuMesh) {
        if let Err(err) = self.device.destroy_mesh(mesh.id) {
            log::warn!("Failed to destroy mesh {:?}: {err}", mesh.id);
        }
    }

    /// Draws a mesh with the current program and state. Failures are logged.
    pub fn draw_mesh(&mut self, mesh: GpuMesh) {
        match self.device.draw_mesh(mesh.id) {
            Ok(()) => self.record_draw(mesh.triangles),
            Err(err) => log::error!("Draw call failed: {err}"),
        }
    }

    /// Draws the unit quad covering the whole viewport.
    pub fn draw_fullscreen_quad(&mut self) {
        let quad = self.primitives.quad;
        self.draw_mesh(quad);
    }

    /// Draws a line list.
    pub fn draw_lines(&mut self, vertices: &[LineVertex]) {
        if vertices.is_empty() {
            return;
        }
        match self.device.draw_lines(vertices) {
            Ok(()) => self.record_draw(0),
            Err(err) => log::error!("Line draw failed: {err}"),
        }
    }

    fn record_draw(&mut self, triangles: u32) {
        self.stats.draw_calls += 1;
        self.stats.triangles_rendered += triangles;
        if let Some(trace) = self.trace.as_mut() {
            let program = self
                .program
                .as_ref()
                .map(|(_, label)| label.clone())
                .unwrap_or_default();
            trace.events.push(TraceEvent::Draw { program, triangles });
        }
    }

    // --- Statistics and tracing -----------------------------------------

    /// Starts a new frame: resets the counters and, if tracing, the trace.
    pub fn begin_frame(&mut self) {
        let frame_number = self.stats.frame_number + 1;
        self.stats = RenderStats {
            frame_number,
            ..Default::default()
        };
        if let Some(trace) = self.trace.as_mut() {
            trace.events.clear();
        }
    }

    /// Counters of the current frame.
    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Counts one rendered shadow-map pass.
    pub fn count_shadow_pass(&mut self) {
        self.stats.shadow_passes += 1;
    }

    /// Counts one shaded light volume.
    pub fn count_light_volume(&mut self) {
        self.stats.light_volumes += 1;
    }

    /// Records how many toolboxes served the frame.
    pub fn set_toolbox_count(&mut self, count: usize) {
        self.stats.toolboxes = count as u32;
    }

    /// Turns frame tracing on or off.
    pub fn set_tracing(&mut self, enabled: bool) {
        self.trace = enabled.then(FrameTrace::default);
    }

    /// The trace of the current frame, if tracing.
    pub fn trace(&self) -> Option<&FrameTrace> {
        self.trace.as_ref()
    }

    /// Takes the trace recorded so far, leaving an empty one.
    pub fn take_trace(&mut self) -> Option<FrameTrace> {
        self.trace.as_mut().map(std::mem::take)
    }

    fn begin_pass(&mut self, label: &str) {
        self.open_passes.push(label.to_string());
        if let Some(trace) = self.trace.as_mut() {
            trace.events.push(TraceEvent::PassBegin(label.to_string()));
        }
    }

    fn end_pass(&mut self) {
        let label = self.open_passes.pop().unwrap_or_default();
        if let Some(trace) = self.trace.as_mut() {
            trace.events.push(TraceEvent::PassEnd(label));
        }
    }

    /// Releases the shared primitives and the empty texture. The context
    /// must not be used for drawing afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let primitives = self.primitives;
        primitives.release(self.device.as_mut());
        self.release_texture(self.empty_texture);
        log::debug!(
            "Render context disposed with {} textures and {} framebuffers still alive",
            self.resources.texture_count(),
            self.resources.framebuffer_count()
        );
    }
}
