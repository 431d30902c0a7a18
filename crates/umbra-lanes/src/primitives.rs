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

//! Unit meshes shared by every pass: the full-screen quad and the light volumes.

use umbra_core::math::{Vec2, Vec3};
use umbra_core::renderer::{GraphicsDevice, MeshDescriptor, MeshId, ResourceError, Vertex};

const SPHERE_STACKS: u32 = 12;
const SPHERE_SLICES: u32 = 24;
const CONE_SLICES: u32 = 24;

/// A mesh uploaded to the device, with what the draw counters need to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    /// The device mesh.
    pub id: MeshId,
    /// Triangles per draw.
    pub triangles: u32,
}

/// CPU-side geometry: vertices and a triangle list.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// Vertices.
    pub vertices: Vec<Vertex>,
    /// Indices, three per triangle, counter-clockwise when seen from outside.
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push_vertex(&mut self, position: Vec3, normal: Vec3, uv: Vec2) -> u32 {
        self.vertices.push(Vertex::new(position, normal, uv));
        (self.vertices.len() - 1) as u32
    }

    /// Adds a triangle, flipping it if needed so that it faces away from `center`.
    fn push_outward(&mut self, center: Vec3, a: u32, b: u32, c: u32) {
        let [pa, pb, pc] = [a, b, c].map(|i| self.vertices[i as usize].position());
        let normal = (pb - pa).cross(pc - pa);
        let outward = (pa + pb + pc) / 3.0 - center;
        if normal.dot(outward) >= 0.0 {
            self.indices.extend_from_slice(&[a, b, c]);
        } else {
            self.indices.extend_from_slice(&[a, c, b]);
        }
    }

    /// Uploads the data.
    pub fn upload(&self, device: &mut dyn GraphicsDevice, label: &str) -> Result<GpuMesh, ResourceError> {
        let id = device.create_mesh(&MeshDescriptor {
            label,
            vertices: &self.vertices,
            indices: &self.indices,
        })?;
        Ok(GpuMesh {
            id,
            triangles: (self.indices.len() / 3) as u32,
        })
    }
}

/// A quad covering `[-1, 1]²` at `z = 0`, facing `+Z`, with UVs spanning `[0, 1]²`.
pub fn quad() -> MeshData {
    let mut mesh = MeshData::default();
    for (x, y) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
        mesh.push_vertex(
            Vec3::new(x, y, 0.0),
            Vec3::Z,
            Vec2::new((x + 1.0) * 0.5, (y + 1.0) * 0.5),
        );
    }
    mesh.indices = vec![0, 1, 2, 0, 2, 3];
    mesh
}

/// A UV sphere around the origin whose facets all lie outside the unit sphere.
pub fn sphere() -> MeshData {
    use std::f32::consts::PI;
    // Push vertices out so that the flat facets, not just the vertices, enclose radius 1.
    let scale = 1.0
        / ((PI / SPHERE_STACKS as f32).cos() * (PI / SPHERE_SLICES as f32).cos());
    let mut mesh = MeshData::default();
    for stack in 0..=SPHERE_STACKS {
        let theta = PI * stack as f32 / SPHERE_STACKS as f32;
        for slice in 0..=SPHERE_SLICES {
            let phi = 2.0 * PI * slice as f32 / SPHERE_SLICES as f32;
            let normal = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            let uv = Vec2::new(
                slice as f32 / SPHERE_SLICES as f32,
                stack as f32 / SPHERE_STACKS as f32,
            );
            mesh.push_vertex(normal * scale, normal, uv);
        }
    }
    let row = SPHERE_SLICES + 1;
    for stack in 0..SPHERE_STACKS {
        for slice in 0..SPHERE_SLICES {
            let a = stack * row + slice;
            let (b, c, d) = (a + 1, a + row, a + row + 1);
            if stack != 0 {
                mesh.push_outward(Vec3::ZERO, a, c, b);
            }
            if stack != SPHERE_STACKS - 1 {
                mesh.push_outward(Vec3::ZERO, b, c, d);
            }
        }
    }
    mesh
}

/// A closed cone with its apex at the origin and a base of radius 1 at `z = -1`.
pub fn cone() -> MeshData {
    use std::f32::consts::TAU;
    let scale = 1.0 / (TAU / (2.0 * CONE_SLICES as f32)).cos();
    let mut mesh = MeshData::default();
    let center = Vec3::new(0.0, 0.0, -0.5);
    let apex = mesh.push_vertex(Vec3::ZERO, Vec3::Z, Vec2::ZERO);
    let base_center = mesh.push_vertex(Vec3::NEG_Z, Vec3::NEG_Z, Vec2::ONE);
    let first = mesh.vertices.len() as u32;
    for slice in 0..CONE_SLICES {
        let angle = TAU * slice as f32 / CONE_SLICES as f32;
        let rim = Vec3::new(angle.cos() * scale, angle.sin() * scale, -1.0);
        mesh.push_vertex(rim, rim.normalize(), Vec2::new(slice as f32 / CONE_SLICES as f32, 1.0));
    }
    for slice in 0..CONE_SLICES {
        let a = first + slice;
        let b = first + (slice + 1) % CONE_SLICES;
        mesh.push_outward(center, apex, a, b);
        mesh.push_outward(center, base_center, b, a);
    }
    mesh
}

/// A cube spanning `[-1, 1]³` with per-face normals.
pub fn cube() -> MeshData {
    let mut mesh = MeshData::default();
    for axis in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
        let tangent = if axis.y.abs() > 0.5 { Vec3::X } else { Vec3::Y };
        let bitangent = axis.cross(tangent);
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)].map(|(u, v)| {
            let position = axis + tangent * u + bitangent * v;
            mesh.push_vertex(position, axis, Vec2::new((u + 1.0) * 0.5, (v + 1.0) * 0.5))
        });
        mesh.push_outward(Vec3::ZERO, corners[0], corners[1], corners[2]);
        mesh.push_outward(Vec3::ZERO, corners[0], corners[2], corners[3]);
    }
    mesh
}

/// The shared unit meshes, uploaded once per [`RenderContext`](crate::context::RenderContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Primitives {
    /// Full-screen quad, drawn with identity matrices.
    pub quad: GpuMesh,
    /// Point light volume.
    pub sphere: GpuMesh,
    /// Spot light volume.
    pub cone: GpuMesh,
    /// Cube-map capture and skybox geometry.
    pub cube: GpuMesh,
}

impl Primitives {
    /// Uploads all primitives.
    pub fn upload(device: &mut dyn GraphicsDevice) -> Result<Self, ResourceError> {
        Ok(Self {
            quad: quad().upload(device, "quad")?,
            sphere: sphere().upload(device, "light_volume_sphere")?,
            cone: cone().upload(device, "light_volume_cone")?,
            cube: cube().upload(device, "cube")?,
        })
    }

    /// Destroys all primitives.
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        for mesh in [self.quad, self.sphere, self.cone, self.cube] {
            if let Err(err) = device.destroy_mesh(mesh.id) {
                log::warn!("Failed to destroy primitive mesh {:?}: {err}", mesh.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_closed_and_outward(mesh: &MeshData, center: Vec3) {
        assert_eq!(mesh.indices.len() % 3, 0);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position());
            let normal = (b - a).cross(c - a);
            assert!(normal.dot((a + b + c) / 3.0 - center) > 0.0);
        }
    }

    #[test]
    fn sphere_facets_enclose_unit_sphere() {
        let mesh = sphere();
        assert_closed_and_outward(&mesh, Vec3::ZERO);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position());
            let normal = (b - a).cross(c - a).normalize();
            // Distance from the centre to the facet plane.
            assert!(normal.dot(a) >= 0.999, "facet at {}", normal.dot(a));
        }
    }

    #[test]
    fn cone_opens_along_negative_z() {
        let mesh = cone();
        assert_closed_and_outward(&mesh, Vec3::new(0.0, 0.0, -0.5));
        let min_z = mesh.vertices.iter().map(|v| v.position[2]).fold(f32::MAX, f32::min);
        let max_z = mesh.vertices.iter().map(|v| v.position[2]).fold(f32::MIN, f32::max);
        assert_eq!((min_z, max_z), (-1.0, 0.0));
    }

    #[test]
    fn quad_faces_the_viewer() {
        let mesh = quad();
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize].position());
            assert!((b - a).cross(c - a).z > 0.0);
        }
    }

    #[test]
    fn cube_has_twelve_outward_triangles() {
        let mesh = cube();
        assert_eq!(mesh.indices.len(), 36);
        assert_closed_and_outward(&mesh, Vec3::ZERO);
    }
}
