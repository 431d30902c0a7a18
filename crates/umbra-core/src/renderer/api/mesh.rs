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

//! Vertex layouts and mesh descriptors.

use crate::math::{LinearRgba, Vec2, Vec3};

/// An opaque handle to a mesh (vertex + index buffers) on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub usize);

/// The interleaved vertex layout shared by every mesh.
///
/// Attribute locations: 0 position, 1 normal, 2 uv, 3 tangent, 4 bone ids,
/// 5 bone weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Texture coordinate.
    pub uv: [f32; 2],
    /// Object-space tangent.
    pub tangent: [f32; 3],
    /// Up to four bone indices, relative to the mesh's bone offset.
    pub bone_ids: [u32; 4],
    /// Matching skinning weights; all zero for static meshes.
    pub bone_weights: [f32; 4],
}

impl Vertex {
    /// A static vertex.
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            ..Default::default()
        }
    }

    /// Returns the position as a [`Vec3`].
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Returns `true` if any bone weight is set.
    pub fn is_skinned(&self) -> bool {
        self.bone_weights.iter().any(|w| *w > 0.0)
    }
}

/// A coloured line endpoint, used for physics debug geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct LineVertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Line colour.
    pub color: [f32; 4],
}

impl LineVertex {
    /// Creates a line endpoint.
    pub fn new(position: Vec3, color: LinearRgba) -> Self {
        Self {
            position: position.to_array(),
            color: [color.r, color.g, color.b, color.a],
        }
    }
}

/// Describes an indexed triangle mesh to be uploaded.
#[derive(Debug, Clone, Copy)]
pub struct MeshDescriptor<'a> {
    /// A debug label.
    pub label: &'a str,
    /// Vertex data.
    pub vertices: &'a [Vertex],
    /// Triangle-list indices into `vertices`.
    pub indices: &'a [u32],
}
