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

use super::program::{
    ProgramFactory, ShaderEnv, SoftwareProgram, UniformSlot, VertexInput, MAX_DRAW_BUFFERS,
};
use super::programs;
use super::raster::{Plane, Rasterizer, ShadedVertex, Targets};
use super::texture::SoftTexture;
use std::collections::{BTreeMap, HashMap};
use umbra_core::math::{Extent2D, LinearRgba, Rect, Vec2, Vec4};
use umbra_core::renderer::{
    AttachmentLayer, AttachmentPoint, BlitMask, BufferDescriptor, BufferId, ClearRequest,
    FilterMode, FramebufferId, FramebufferStatus, GraphicsAdapterInfo, GraphicsBackendType,
    GraphicsDevice, LineVertex, MeshDescriptor, MeshId, ProgramId, ProgramSource, RasterState,
    RenderError, ResourceError, ShaderError, TexelData, TextureDescriptor, TextureFormat,
    TextureId, UniformValue,
};

/// Largest texture edge the device accepts.
const MAX_TEXTURE_SIZE: u32 = 16_384;

#[derive(Debug)]
struct SoftProgramEntry {
    label: String,
    program: Box<dyn SoftwareProgram>,
    /// Uniforms live with the program, like in GL.
    uniforms: HashMap<String, UniformSlot>,
}

#[derive(Debug)]
struct SoftBufferEntry {
    label: String,
    data: Vec<u8>,
}

#[derive(Debug)]
struct SoftMeshEntry {
    label: String,
    vertices: Vec<VertexInput>,
    indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AttachmentBinding {
    point: AttachmentPoint,
    texture: TextureId,
    mip: u32,
    layer: AttachmentLayer,
}

impl AttachmentBinding {
    /// The layer drawn into. A whole layered texture renders into layer 0.
    fn layer_index(&self) -> u32 {
        match self.layer {
            AttachmentLayer::Whole => 0,
            AttachmentLayer::Layer(layer) => layer,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SoftFramebufferEntry {
    label: String,
    colors: BTreeMap<u32, AttachmentBinding>,
    depth: Option<AttachmentBinding>,
}

impl SoftFramebufferEntry {
    fn bindings(&self) -> impl Iterator<Item = &AttachmentBinding> {
        self.colors.values().chain(self.depth.iter())
    }
}

/// Where a borrowed attachment goes in the [`Targets`] of a draw.
#[derive(Debug, Clone, Copy)]
enum TargetSlot {
    Color(usize),
    Depth,
}

/// An attachment moved out of the texture map for the duration of a draw.
#[derive(Debug)]
struct TakenAttachment {
    slot: TargetSlot,
    id: TextureId,
    texture: SoftTexture,
    mip: u32,
    layer: u32,
}

/// A [`GraphicsDevice`] that rasterizes on the CPU.
///
/// It follows GL semantics where the renderer depends on them: uniforms are
/// per-program state, draw buffers map fragment outputs to colour
/// attachments, rows are stored bottom-up and the fragment pipeline runs
/// stencil, depth, blend and colour-mask in that order. Programs are Rust
/// implementations of [`SoftwareProgram`], selected by the label of the
/// [`ProgramSource`]; every program the renderer loads is built in, and
/// [`SoftwareDevice::register_program`] adds more.
///
/// The default framebuffer is an `Rgba8` colour plus depth-stencil surface
/// of the size given at creation.
#[derive(Debug)]
pub struct SoftwareDevice {
    surface_size: Extent2D,
    surface: SoftFramebufferEntry,

    textures: HashMap<TextureId, SoftTexture>,
    framebuffers: HashMap<FramebufferId, SoftFramebufferEntry>,
    programs: HashMap<ProgramId, SoftProgramEntry>,
    buffers: HashMap<BufferId, SoftBufferEntry>,
    meshes: HashMap<MeshId, SoftMeshEntry>,
    registry: HashMap<String, ProgramFactory>,

    next_texture_id: usize,
    next_framebuffer_id: usize,
    next_program_id: usize,
    next_buffer_id: usize,
    next_mesh_id: usize,

    bound_framebuffer: Option<FramebufferId>,
    draw_buffers: Vec<u32>,
    viewport: Rect,
    current_program: Option<ProgramId>,
    texture_units: HashMap<u32, TextureId>,
    uniform_bindings: HashMap<u32, BufferId>,
    state: RasterState,
}

impl SoftwareDevice {
    /// Creates a device with a default framebuffer of `surface_size` and the
    /// built-in programs registered.
    pub fn new(surface_size: Extent2D) -> Result<Self, ResourceError> {
        let mut device = Self {
            surface_size,
            surface: SoftFramebufferEntry {
                label: "surface".to_string(),
                ..Default::default()
            },
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            meshes: HashMap::new(),
            registry: HashMap::new(),
            next_texture_id: 0,
            next_framebuffer_id: 0,
            next_program_id: 0,
            next_buffer_id: 0,
            next_mesh_id: 0,
            bound_framebuffer: None,
            draw_buffers: vec![0],
            viewport: surface_size.rect(),
            current_program: None,
            texture_units: HashMap::new(),
            uniform_bindings: HashMap::new(),
            state: RasterState::default(),
        };
        let color = device.create_texture(&TextureDescriptor::d2("surface_color", surface_size, TextureFormat::Rgba8))?;
        let depth = device.create_texture(&TextureDescriptor::d2(
            "surface_depth",
            surface_size,
            TextureFormat::Depth24Stencil8,
        ))?;
        device.surface.colors.insert(
            0,
            AttachmentBinding {
                point: AttachmentPoint::Color(0),
                texture: color,
                mip: 0,
                layer: AttachmentLayer::Whole,
            },
        );
        device.surface.depth = Some(AttachmentBinding {
            point: AttachmentPoint::DepthStencil,
            texture: depth,
            mip: 0,
            layer: AttachmentLayer::Whole,
        });
        for (name, factory) in programs::builtin() {
            device.register_program(name, factory);
        }
        log::info!(
            "Software device created with a {}x{} surface and {} built-in programs",
            surface_size.width,
            surface_size.height,
            device.registry.len()
        );
        Ok(device)
    }

    /// Makes `factory` the program built for sources labelled `name`.
    pub fn register_program(&mut self, name: &str, factory: ProgramFactory) {
        self.registry.insert(name.to_string(), factory);
    }

    /// Size of the default framebuffer.
    pub fn surface_size(&self) -> Extent2D {
        self.surface_size
    }

    /// Number of live textures, the two surface textures included.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of live framebuffers, the default one excluded.
    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of live programs.
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Number of live uniform buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// The current value of a uniform of a program, for inspection.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue<'_>> {
        let slot = self.programs.get(&program)?.uniforms.get(name)?;
        Some(match slot {
            UniformSlot::Int(v) => UniformValue::Int(*v),
            UniformSlot::Float(v) => UniformValue::Float(*v),
            UniformSlot::Vec2(v) => UniformValue::Vec2(*v),
            UniformSlot::Vec3(v) => UniformValue::Vec3(*v),
            UniformSlot::Vec4(v) => UniformValue::Vec4(*v),
            UniformSlot::Mat3(v) => UniformValue::Mat3(*v),
            UniformSlot::Mat4(v) => UniformValue::Mat4(*v),
            UniformSlot::Floats(v) => UniformValue::FloatArray(v),
            UniformSlot::Vec3s(v) => UniformValue::Vec3Array(v),
            UniformSlot::Mat4s(v) => UniformValue::Mat4Array(v),
        })
    }

    fn framebuffer(&self, id: Option<FramebufferId>) -> Option<&SoftFramebufferEntry> {
        match id {
            None => Some(&self.surface),
            Some(id) => self.framebuffers.get(&id),
        }
    }

    fn status_of(&self, framebuffer: &SoftFramebufferEntry) -> FramebufferStatus {
        let mut layered = None;
        for binding in framebuffer.bindings() {
            let Some(texture) = self.textures.get(&binding.texture) else {
                return FramebufferStatus::IncompleteAttachment;
            };
            if binding.mip >= texture.mip_levels() {
                return FramebufferStatus::IncompleteAttachment;
            }
            if let AttachmentLayer::Layer(layer) = binding.layer {
                if layer >= texture.layer_count() {
                    return FramebufferStatus::IncompleteAttachment;
                }
            }
            let format = texture.format();
            let renderable = match binding.point {
                AttachmentPoint::Color(_) => !format.is_depth(),
                AttachmentPoint::Depth => format.is_depth(),
                AttachmentPoint::DepthStencil => format.has_stencil(),
            };
            if !renderable {
                return FramebufferStatus::IncompleteAttachment;
            }
            let is_layered = binding.layer == AttachmentLayer::Whole && texture.layer_count() > 1;
            match layered {
                None => layered = Some(is_layered),
                Some(previous) if previous != is_layered => {
                    return FramebufferStatus::IncompleteLayerTargets;
                }
                Some(_) => {}
            }
        }
        if layered.is_none() {
            return FramebufferStatus::MissingAttachment;
        }
        FramebufferStatus::Complete
    }

    /// Moves the attachments the current draw buffers select out of the
    /// texture map, so they can be written while every other texture is sampled.
    fn take_targets(&mut self) -> Vec<TakenAttachment> {
        let Some(framebuffer) = self.framebuffer(self.bound_framebuffer).cloned() else {
            return Vec::new();
        };
        let draw_buffers = self.draw_buffers.clone();
        let mut taken = Vec::new();
        let slots = draw_buffers
            .iter()
            .enumerate()
            .filter_map(|(location, index)| framebuffer.colors.get(index).map(|b| (TargetSlot::Color(location), *b)))
            .chain(framebuffer.depth.map(|b| (TargetSlot::Depth, b)));
        for (slot, binding) in slots {
            if let Some(texture) = self.textures.remove(&binding.texture) {
                taken.push(TakenAttachment {
                    slot,
                    id: binding.texture,
                    texture,
                    mip: binding.mip,
                    layer: binding.layer_index(),
                });
            }
        }
        taken
    }

    fn restore_targets(&mut self, taken: Vec<TakenAttachment>) {
        for attachment in taken {
            self.textures.insert(attachment.id, attachment.texture);
        }
    }

    /// Runs `draw` with the planes of the bound framebuffer.
    fn with_targets<R>(&mut self, draw: impl FnOnce(&Self, &mut Targets<'_>) -> R) -> R {
        let mut taken = self.take_targets();
        let result = {
            let mut targets = Targets {
                colors: (0..self.draw_buffers.len().min(MAX_DRAW_BUFFERS)).map(|_| None).collect(),
                depth: None,
            };
            for attachment in taken.iter_mut() {
                let format = attachment.texture.format();
                let extent = attachment.texture.size(attachment.mip);
                let Some(data) = attachment.texture.plane_mut(attachment.mip, attachment.layer) else {
                    continue;
                };
                let plane = Plane::new(data, format, extent);
                match attachment.slot {
                    TargetSlot::Color(location) => {
                        if let Some(slot) = targets.colors.get_mut(location) {
                            *slot = Some(plane);
                        }
                    }
                    TargetSlot::Depth => targets.depth = Some(plane),
                }
            }
            draw(self, &mut targets)
        };
        self.restore_targets(taken);
        result
    }

    /// The bytes of every bound uniform buffer.
    fn blocks(&self) -> HashMap<u32, &[u8]> {
        self.uniform_bindings
            .iter()
            .filter_map(|(binding, id)| self.buffers.get(id).map(|b| (*binding, b.data.as_slice())))
            .collect()
    }

    fn env<'a>(&'a self, uniforms: &'a HashMap<String, UniformSlot>, blocks: &'a HashMap<u32, &'a [u8]>) -> ShaderEnv<'a> {
        ShaderEnv {
            uniforms,
            textures: &self.textures,
            units: &self.texture_units,
            blocks,
            viewport: self.viewport.extent(),
        }
    }

    fn current_program_entry(&self) -> Result<&SoftProgramEntry, RenderError> {
        self.current_program
            .and_then(|id| self.programs.get(&id))
            .ok_or(RenderError::NoProgramBound)
    }

    /// Shades `vertices` and hands them to `rasterize` along with the targets.
    fn draw(
        &mut self,
        vertices: &[VertexInput],
        rasterize: impl FnOnce(&Rasterizer<'_, '_>, &[ShadedVertex], &mut Targets<'_>),
    ) -> Result<(), RenderError> {
        self.current_program_entry()?;
        self.with_targets(|device, targets| {
            let Ok(entry) = device.current_program_entry() else {
                return;
            };
            let Some(extent) = targets.extent() else {
                return;
            };
            let blocks = device.blocks();
            let env = device.env(&entry.uniforms, &blocks);
            let program = entry.program.as_ref();
            let shaded: Vec<ShadedVertex> = vertices
                .iter()
                .map(|input| {
                    let mut varyings = Default::default();
                    let clip = program.vertex(&env, input, &mut varyings);
                    ShadedVertex { clip, varyings }
                })
                .collect();
            let rasterizer = Rasterizer::new(program, &env, &device.state, device.viewport, extent);
            rasterize(&rasterizer, &shaded, targets);
        });
        Ok(())
    }

    /// Reads `dst`-sized colour from a region of an attachment, scaled with `filter`.
    fn read_scaled(&self, binding: &AttachmentBinding, src: Rect, dst: Rect, filter: FilterMode) -> Result<Vec<Vec4>, ResourceError> {
        let texture = self.textures.get(&binding.texture).ok_or(ResourceError::NotFound)?;
        let (mip, layer) = (binding.mip, binding.layer_index());
        let size = texture.size(mip);
        let texel = |x: f32, y: f32| {
            let x = (x.floor() as i64).clamp(0, i64::from(size.width) - 1) as u32;
            let y = (y.floor() as i64).clamp(0, i64::from(size.height) - 1) as u32;
            texture.texel(mip, layer, x, y)
        };
        let scale = Vec2::new(
            src.width as f32 / dst.width.max(1) as f32,
            src.height as f32 / dst.height.max(1) as f32,
        );
        let mut out = Vec::with_capacity(dst.extent().area());
        for j in 0..dst.height {
            for i in 0..dst.width {
                let x = src.x as f32 + (i as f32 + 0.5) * scale.x;
                let y = src.y as f32 + (j as f32 + 0.5) * scale.y;
                out.push(match filter {
                    FilterMode::Nearest => texel(x, y),
                    FilterMode::Linear => {
                        let (x, y) = (x - 0.5, y - 0.5);
                        let (fx, fy) = (x - x.floor(), y - y.floor());
                        let bottom = texel(x, y).lerp(texel(x + 1.0, y), fx);
                        let top = texel(x, y + 1.0).lerp(texel(x + 1.0, y + 1.0), fx);
                        bottom.lerp(top, fy)
                    }
                });
            }
        }
        Ok(out)
    }

    /// Reads raw depth-stencil texels of a region, nearest, `dst`-sized.
    fn read_raw_scaled(&self, binding: &AttachmentBinding, src: Rect, dst: Rect) -> Result<Vec<[f32; 2]>, ResourceError> {
        let texture = self.textures.get(&binding.texture).ok_or(ResourceError::NotFound)?;
        let (mip, layer) = (binding.mip, binding.layer_index());
        let size = texture.size(mip);
        let plane = texture.plane(mip, layer).ok_or(ResourceError::OutOfBounds)?;
        let stride = super::texture::stride(texture.format());
        let mut out = Vec::with_capacity(dst.extent().area());
        for j in 0..dst.height {
            for i in 0..dst.width {
                let x = src.x as f32 + (i as f32 + 0.5) * src.width as f32 / dst.width.max(1) as f32;
                let y = src.y as f32 + (j as f32 + 0.5) * src.height as f32 / dst.height.max(1) as f32;
                let x = (x.floor() as i64).clamp(0, i64::from(size.width) - 1) as usize;
                let y = (y.floor() as i64).clamp(0, i64::from(size.height) - 1) as usize;
                let start = (y * size.width as usize + x) * stride;
                let texel = plane.get(start..start + stride).unwrap_or(&[]);
                out.push([texel.first().copied().unwrap_or(1.0), texel.get(1).copied().unwrap_or(0.0)]);
            }
        }
        Ok(out)
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn adapter_info(&self) -> GraphicsAdapterInfo {
        GraphicsAdapterInfo {
            name: "Umbra software rasterizer".to_string(),
            backend_type: GraphicsBackendType::Software,
            max_texture_size: MAX_TEXTURE_SIZE,
            max_color_attachments: MAX_DRAW_BUFFERS as u32,
        }
    }

    // --- Textures -------------------------------------------------------

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.width > MAX_TEXTURE_SIZE || descriptor.size.height > MAX_TEXTURE_SIZE {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture '{}' exceeds {MAX_TEXTURE_SIZE} texels",
                descriptor.label
            )));
        }
        let texture = SoftTexture::new(descriptor)?;
        let id = TextureId(self.next_texture_id);
        self.next_texture_id += 1;
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn write_texture(&mut self, id: TextureId, mip: u32, layer: u32, data: TexelData<'_>) -> Result<(), ResourceError> {
        self.textures.get_mut(&id).ok_or(ResourceError::NotFound)?.write(mip, layer, data)
    }

    fn generate_mipmaps(&mut self, id: TextureId) -> Result<(), ResourceError> {
        self.textures.get_mut(&id).ok_or(ResourceError::NotFound)?.generate_mipmaps();
        Ok(())
    }

    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError> {
        let texture = self.textures.remove(&id).ok_or(ResourceError::NotFound)?;
        self.texture_units.retain(|_, bound| *bound != id);
        log::trace!("Destroyed software texture '{}'", texture.descriptor().label);
        Ok(())
    }

    // --- Framebuffers ---------------------------------------------------

    fn create_framebuffer(&mut self, label: &str) -> Result<FramebufferId, ResourceError> {
        let id = FramebufferId(self.next_framebuffer_id);
        self.next_framebuffer_id += 1;
        self.framebuffers.insert(
            id,
            SoftFramebufferEntry {
                label: label.to_string(),
                ..Default::default()
            },
        );
        Ok(id)
    }

    fn attach_texture(
        &mut self,
        framebuffer: FramebufferId,
        point: AttachmentPoint,
        texture: Option<TextureId>,
        mip: u32,
        layer: AttachmentLayer,
    ) -> Result<(), ResourceError> {
        if texture.is_some_and(|id| !self.textures.contains_key(&id)) {
            return Err(ResourceError::NotFound);
        }
        let entry = self.framebuffers.get_mut(&framebuffer).ok_or(ResourceError::NotFound)?;
        let binding = texture.map(|texture| AttachmentBinding {
            point,
            texture,
            mip,
            layer,
        });
        match point {
            AttachmentPoint::Color(index) => match binding {
                Some(binding) => {
                    entry.colors.insert(index, binding);
                }
                None => {
                    entry.colors.remove(&index);
                }
            },
            AttachmentPoint::Depth | AttachmentPoint::DepthStencil => entry.depth = binding,
        }
        Ok(())
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        match self.framebuffers.get(&framebuffer) {
            Some(entry) => self.status_of(entry),
            None => FramebufferStatus::Unknown(0),
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), ResourceError> {
        let entry = self.framebuffers.remove(&framebuffer).ok_or(ResourceError::NotFound)?;
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
        log::trace!("Destroyed software framebuffer '{}'", entry.label);
        Ok(())
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        if framebuffer.is_some_and(|id| !self.framebuffers.contains_key(&id)) {
            log::warn!("Bound a framebuffer that does not exist, drawing to the surface");
            self.bound_framebuffer = None;
            return;
        }
        self.bound_framebuffer = framebuffer;
    }

    fn set_draw_buffers(&mut self, buffers: &[u32]) {
        self.draw_buffers.clear();
        self.draw_buffers.extend_from_slice(buffers);
    }

    fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    fn clear(&mut self, request: &ClearRequest) {
        self.with_targets(|_, targets| {
            if let Some(color) = request.color {
                for plane in targets.colors.iter_mut().flatten() {
                    plane.fill(color.to_vec4(), None);
                }
            }
            if let Some(plane) = targets.depth.as_mut() {
                match (request.depth, request.stencil) {
                    (Some(depth), stencil) => plane.fill(Vec4::splat(depth), stencil),
                    (None, Some(stencil)) => plane.fill_stencil(stencil),
                    (None, None) => {}
                }
            }
        });
    }

    fn blit_framebuffer(
        &mut self,
        src: Option<FramebufferId>,
        read_attachment: u32,
        src_rect: Rect,
        dst: Option<FramebufferId>,
        dst_rect: Rect,
        mask: BlitMask,
        filter: FilterMode,
    ) -> Result<(), ResourceError> {
        let source = self.framebuffer(src).ok_or(ResourceError::NotFound)?;
        let destination = self.framebuffer(dst).ok_or(ResourceError::NotFound)?;
        let color = if mask.contains(BlitMask::COLOR) {
            let binding = source.colors.get(&read_attachment).ok_or(ResourceError::NotFound)?;
            Some(self.read_scaled(binding, src_rect, dst_rect, filter)?)
        } else {
            None
        };
        let depth_stencil = if mask.intersects(BlitMask::DEPTH | BlitMask::STENCIL) {
            let binding = source.depth.as_ref().ok_or(ResourceError::NotFound)?;
            if destination.depth.is_none() {
                return Err(ResourceError::NotFound);
            }
            Some(self.read_raw_scaled(binding, src_rect, dst_rect)?)
        } else {
            None
        };

        let previous = self.bound_framebuffer;
        self.bound_framebuffer = dst;
        self.with_targets(|_, targets| {
            let Some(extent) = targets.extent() else {
                return;
            };
            let pixels = (0..dst_rect.height).flat_map(|j| (0..dst_rect.width).map(move |i| (i, j)));
            for (n, (i, j)) in pixels.enumerate() {
                let (x, y) = (dst_rect.x + i as i32, dst_rect.y + j as i32);
                if x < 0 || y < 0 || x as u32 >= extent.width || y as u32 >= extent.height {
                    continue;
                }
                let (x, y) = (x as u32, y as u32);
                if let Some(value) = color.as_ref().and_then(|c| c.get(n)) {
                    for plane in targets.colors.iter_mut().flatten() {
                        plane.write(x, y, *value);
                    }
                }
                if let (Some(raw), Some(plane)) = (depth_stencil.as_ref().and_then(|d| d.get(n)), targets.depth.as_mut()) {
                    let mut texel = [0.0f32; 2];
                    if let Some(current) = plane.raw(x, y) {
                        texel[..current.len().min(2)].copy_from_slice(&current[..current.len().min(2)]);
                    }
                    if mask.contains(BlitMask::DEPTH) {
                        texel[0] = raw[0];
                    }
                    if mask.contains(BlitMask::STENCIL) {
                        texel[1] = raw[1];
                    }
                    plane.set_raw(x, y, &texel);
                }
            }
        });
        self.bound_framebuffer = previous;
        Ok(())
    }

    fn read_pixels(
        &mut self,
        framebuffer: Option<FramebufferId>,
        attachment: u32,
        rect: Rect,
    ) -> Result<Vec<LinearRgba>, ResourceError> {
        let entry = self.framebuffer(framebuffer).ok_or(ResourceError::NotFound)?;
        let binding = entry.colors.get(&attachment).ok_or(ResourceError::NotFound)?;
        let texture = self.textures.get(&binding.texture).ok_or(ResourceError::NotFound)?;
        let size = texture.size(binding.mip);
        let fits = rect.x >= 0
            && rect.y >= 0
            && rect.x as u64 + u64::from(rect.width) <= u64::from(size.width)
            && rect.y as u64 + u64::from(rect.height) <= u64::from(size.height);
        if !fits {
            return Err(ResourceError::OutOfBounds);
        }
        let mut pixels = Vec::with_capacity(rect.extent().area());
        for y in rect.y as u32..rect.y as u32 + rect.height {
            for x in rect.x as u32..rect.x as u32 + rect.width {
                let texel = texture.texel(binding.mip, binding.layer_index(), x, y);
                pixels.push(LinearRgba::from_vec4(texel));
            }
        }
        Ok(pixels)
    }

    // --- Programs -------------------------------------------------------

    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramId, ShaderError> {
        let factory = self.registry.get(&source.label).ok_or_else(|| ShaderError::CompilationError {
            label: source.label.clone(),
            details: format!("the software device has no program named '{}'", source.label),
        })?;
        let program = factory(source);
        let id = ProgramId(self.next_program_id);
        self.next_program_id += 1;
        self.programs.insert(
            id,
            SoftProgramEntry {
                label: source.label.clone(),
                program,
                uniforms: HashMap::new(),
            },
        );
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) -> Result<(), ResourceError> {
        let entry = self
            .programs
            .remove(&id)
            .ok_or(ResourceError::Shader(ShaderError::NotFound { id }))?;
        if self.current_program == Some(id) {
            self.current_program = None;
        }
        log::trace!("Destroyed software program '{}'", entry.label);
        Ok(())
    }

    fn use_program(&mut self, id: Option<ProgramId>) {
        match id {
            Some(id) if !self.programs.contains_key(&id) => {
                log::warn!("Tried to use program {id:?}, which does not exist");
            }
            id => self.current_program = id,
        }
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue<'_>) {
        let Some(entry) = self.current_program.and_then(|id| self.programs.get_mut(&id)) else {
            log::warn!("Uniform '{name}' set with no program in use");
            return;
        };
        entry.uniforms.insert(name.to_string(), UniformSlot::from(value));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => self.texture_units.insert(unit, id),
            None => self.texture_units.remove(&unit),
        };
    }

    // --- Uniform buffers ------------------------------------------------

    fn create_uniform_buffer(&mut self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next_buffer_id);
        self.next_buffer_id += 1;
        self.buffers.insert(
            id,
            SoftBufferEntry {
                label: descriptor.label.clone(),
                data: vec![0; descriptor.size],
            },
        );
        Ok(id)
    }

    fn write_uniform_buffer(&mut self, id: BufferId, offset: usize, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let target = offset
            .checked_add(data.len())
            .and_then(|end| buffer.data.get_mut(offset..end))
            .ok_or(ResourceError::OutOfBounds)?;
        target.copy_from_slice(data);
        Ok(())
    }

    fn bind_uniform_buffer(&mut self, binding: u32, id: Option<BufferId>) {
        match id {
            Some(id) => self.uniform_bindings.insert(binding, id),
            None => self.uniform_bindings.remove(&binding),
        };
    }

    fn destroy_uniform_buffer(&mut self, id: BufferId) -> Result<(), ResourceError> {
        let buffer = self.buffers.remove(&id).ok_or(ResourceError::NotFound)?;
        self.uniform_bindings.retain(|_, bound| *bound != id);
        log::trace!("Destroyed software buffer '{}'", buffer.label);
        Ok(())
    }

    // --- Meshes ---------------------------------------------------------

    fn create_mesh(&mut self, descriptor: &MeshDescriptor<'_>) -> Result<MeshId, ResourceError> {
        if descriptor.indices.len() % 3 != 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "mesh '{}' has {} indices, not a triangle list",
                descriptor.label,
                descriptor.indices.len()
            )));
        }
        if let Some(index) = descriptor.indices.iter().find(|i| **i as usize >= descriptor.vertices.len()) {
            return Err(ResourceError::InvalidDescriptor(format!(
                "mesh '{}' indexes vertex {index} of {}",
                descriptor.label,
                descriptor.vertices.len()
            )));
        }
        let id = MeshId(self.next_mesh_id);
        self.next_mesh_id += 1;
        self.meshes.insert(
            id,
            SoftMeshEntry {
                label: descriptor.label.to_string(),
                vertices: descriptor.vertices.iter().map(VertexInput::from).collect(),
                indices: descriptor.indices.to_vec(),
            },
        );
        Ok(id)
    }

    fn destroy_mesh(&mut self, id: MeshId) -> Result<(), ResourceError> {
        let mesh = self.meshes.remove(&id).ok_or(ResourceError::NotFound)?;
        log::trace!("Destroyed software mesh '{}'", mesh.label);
        Ok(())
    }

    fn draw_mesh(&mut self, id: MeshId) -> Result<(), RenderError> {
        // Moved out so the draw can borrow the device mutably.
        let mesh = self
            .meshes
            .remove(&id)
            .ok_or(RenderError::ResourceError(ResourceError::NotFound))?;
        let result = self.draw(&mesh.vertices, |rasterizer, shaded, targets| {
            rasterizer.triangles(shaded, &mesh.indices, targets);
        });
        self.meshes.insert(id, mesh);
        result
    }

    fn draw_lines(&mut self, vertices: &[LineVertex]) -> Result<(), RenderError> {
        let inputs: Vec<VertexInput> = vertices.iter().map(VertexInput::from).collect();
        self.draw(&inputs, |rasterizer, shaded, targets| {
            rasterizer.lines(shaded, targets);
        })
    }

    fn apply_state(&mut self, state: &RasterState) {
        self.state = *state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::software::program::{FragmentInput, FragmentOutput, Varyings};
    use umbra_core::math::Vec3;
    use umbra_core::renderer::{ColorWrites, CullMode, Vertex};

    /// Fills with the `color` uniform at the `depth` uniform.
    #[derive(Debug)]
    struct Fill;

    impl SoftwareProgram for Fill {
        fn vertex(&self, env: &ShaderEnv<'_>, input: &VertexInput, _: &mut Varyings) -> Vec4 {
            Vec4::new(input.position.x, input.position.y, env.float("depth"), 1.0)
        }

        fn fragment(&self, env: &ShaderEnv<'_>, _: &FragmentInput, _: &Varyings) -> Option<FragmentOutput> {
            Some(FragmentOutput::color(env.vec4("color")).with(1, Vec4::ONE))
        }
    }

    fn device() -> SoftwareDevice {
        let mut device = SoftwareDevice::new(Extent2D::square(4)).unwrap();
        device.register_program("fill", |_| Box::new(Fill));
        device
    }

    fn quad(device: &mut SoftwareDevice) -> MeshId {
        let corner = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), Vec3::Z, Vec2::ZERO);
        let vertices = [corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)];
        device
            .create_mesh(&MeshDescriptor {
                label: "quad",
                vertices: &vertices,
                indices: &[0, 1, 2, 0, 2, 3],
            })
            .unwrap()
    }

    fn target(device: &mut SoftwareDevice, format: TextureFormat) -> TextureId {
        device
            .create_texture(&TextureDescriptor::d2("target", Extent2D::square(4), format))
            .unwrap()
    }

    #[test]
    fn unknown_programs_fail_to_compile() {
        let mut device = device();
        let err = device.create_program(&ProgramSource::builtin("no_such_program"));
        assert!(matches!(err, Err(ShaderError::CompilationError { .. })));
    }

    #[test]
    fn every_builtin_program_links() {
        let mut device = device();
        for (name, _) in programs::builtin() {
            assert!(device.create_program(&ProgramSource::builtin(name)).is_ok(), "{name}");
        }
    }

    #[test]
    fn uniforms_belong_to_their_program() {
        let mut device = device();
        let a = device.create_program(&ProgramSource::builtin("fill")).unwrap();
        let b = device.create_program(&ProgramSource::builtin("fill")).unwrap();
        device.use_program(Some(a));
        device.set_uniform("depth", UniformValue::Float(0.5));
        device.use_program(Some(b));
        device.set_uniform("depth", UniformValue::Float(0.25));
        assert_eq!(device.uniform(a, "depth"), Some(UniformValue::Float(0.5)));
        assert_eq!(device.uniform(b, "depth"), Some(UniformValue::Float(0.25)));
    }

    #[test]
    fn framebuffer_status_reports_problems() {
        let mut device = device();
        let fb = device.create_framebuffer("fb").unwrap();
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::MissingAttachment);
        let depth = target(&mut device, TextureFormat::Depth32F);
        device
            .attach_texture(fb, AttachmentPoint::Color(0), Some(depth), 0, AttachmentLayer::Whole)
            .unwrap();
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::IncompleteAttachment);
        device
            .attach_texture(fb, AttachmentPoint::Color(0), None, 0, AttachmentLayer::Whole)
            .unwrap();
        device
            .attach_texture(fb, AttachmentPoint::Depth, Some(depth), 0, AttachmentLayer::Whole)
            .unwrap();
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::Complete);
        device
            .attach_texture(fb, AttachmentPoint::Depth, Some(depth), 0, AttachmentLayer::Layer(3))
            .unwrap();
        assert_eq!(device.framebuffer_status(fb), FramebufferStatus::IncompleteAttachment);
    }

    #[test]
    fn draws_go_to_the_selected_draw_buffers() {
        let mut device = device();
        let (first, second) = (
            target(&mut device, TextureFormat::Rgba16F),
            target(&mut device, TextureFormat::Rgba16F),
        );
        let fb = device.create_framebuffer("mrt").unwrap();
        for (index, texture) in [(0, first), (1, second)] {
            device
                .attach_texture(fb, AttachmentPoint::Color(index), Some(texture), 0, AttachmentLayer::Whole)
                .unwrap();
        }
        device.bind_framebuffer(Some(fb));
        // Output 0 goes to attachment 1 only.
        device.set_draw_buffers(&[1]);
        device.apply_state(&RasterState::fullscreen());
        let program = device.create_program(&ProgramSource::builtin("fill")).unwrap();
        device.use_program(Some(program));
        device.set_uniform("color", UniformValue::Vec4(Vec4::new(2.0, 0.0, 0.0, 1.0)));
        let mesh = quad(&mut device);
        device.draw_mesh(mesh).unwrap();

        let rect = Rect::new(0, 0, 4, 4);
        let first_pixels = device.read_pixels(Some(fb), 0, rect).unwrap();
        let second_pixels = device.read_pixels(Some(fb), 1, rect).unwrap();
        assert!(first_pixels.iter().all(|p| *p == LinearRgba::TRANSPARENT));
        assert!(second_pixels.iter().all(|p| *p == LinearRgba::new(2.0, 0.0, 0.0, 1.0)));
    }

    #[test]
    fn drawing_without_a_program_fails() {
        let mut device = device();
        let mesh = quad(&mut device);
        assert!(matches!(device.draw_mesh(mesh), Err(RenderError::NoProgramBound)));
    }

    #[test]
    fn clears_ignore_the_color_mask() {
        let mut device = device();
        device.apply_state(&RasterState {
            color_writes: ColorWrites::empty(),
            cull: CullMode::None,
            ..RasterState::default()
        });
        device.clear(&ClearRequest::all(LinearRgba::WHITE));
        let pixels = device.read_pixels(None, 0, Rect::new(0, 0, 4, 4)).unwrap();
        assert!(pixels.iter().all(|p| *p == LinearRgba::WHITE));
    }

    #[test]
    fn blit_scales_with_nearest_filtering() {
        let mut device = device();
        let small = device
            .create_texture(&TextureDescriptor::d2("small", Extent2D::square(2), TextureFormat::Rgba32F))
            .unwrap();
        #[rustfmt::skip]
        let texels = [
            1.0, 0.0, 0.0, 1.0,   0.0, 1.0, 0.0, 1.0,
            0.0, 0.0, 1.0, 1.0,   1.0, 1.0, 1.0, 1.0,
        ];
        device.write_texture(small, 0, 0, TexelData::F32(&texels)).unwrap();
        let src = device.create_framebuffer("src").unwrap();
        device
            .attach_texture(src, AttachmentPoint::Color(0), Some(small), 0, AttachmentLayer::Whole)
            .unwrap();
        let big = target(&mut device, TextureFormat::Rgba32F);
        let dst = device.create_framebuffer("dst").unwrap();
        device
            .attach_texture(dst, AttachmentPoint::Color(0), Some(big), 0, AttachmentLayer::Whole)
            .unwrap();
        device
            .blit_framebuffer(
                Some(src),
                0,
                Rect::new(0, 0, 2, 2),
                Some(dst),
                Rect::new(0, 0, 4, 4),
                BlitMask::COLOR,
                FilterMode::Nearest,
            )
            .unwrap();
        let pixels = device.read_pixels(Some(dst), 0, Rect::new(0, 0, 4, 4)).unwrap();
        assert_eq!(pixels[0], LinearRgba::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(pixels[1], LinearRgba::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(pixels[15], LinearRgba::WHITE);
    }

    #[test]
    fn read_pixels_rejects_out_of_range_rects() {
        let mut device = device();
        assert!(matches!(
            device.read_pixels(None, 0, Rect::new(2, 2, 4, 4)),
            Err(ResourceError::OutOfBounds)
        ));
    }

    #[test]
    fn uniform_buffer_writes_are_bounds_checked() {
        let mut device = device();
        let buffer = device
            .create_uniform_buffer(&BufferDescriptor {
                label: "lights".into(),
                size: 8,
            })
            .unwrap();
        assert!(device.write_uniform_buffer(buffer, 4, &[1, 2, 3, 4]).is_ok());
        assert!(matches!(
            device.write_uniform_buffer(buffer, 6, &[1, 2, 3]),
            Err(ResourceError::OutOfBounds)
        ));
    }
}
