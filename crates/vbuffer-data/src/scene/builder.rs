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

//! Incremental scene construction and parametric surface helpers.

use vbuffer_core::math::{Mat4, Vec2, Vec3, TAU};

use super::{Material, Mesh, Scene};
use crate::error::SceneError;

/// Vertex streams and triangle indices of one mesh, indices local to the mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Positions.
    pub positions: Vec<Vec3>,
    /// Unit normals.
    pub normals: Vec<Vec3>,
    /// Texture coordinates.
    pub texcoords: Vec<Vec2>,
    /// Triangle list, counter-clockwise seen from the front.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Tessellates a parametric surface over `[0, 1]²`.
    ///
    /// `eval(s, t)` returns position, normal and texture coordinate. The
    /// front face is the side `∂p/∂s × ∂p/∂t` points to.
    pub fn surface(
        segments_s: u32,
        segments_t: u32,
        mut eval: impl FnMut(f32, f32) -> (Vec3, Vec3, Vec2),
    ) -> Self {
        let (ns, nt) = (segments_s.max(1), segments_t.max(1));
        let mut data = Self::default();
        for j in 0..=nt {
            for i in 0..=ns {
                let (p, n, uv) = eval(i as f32 / ns as f32, j as f32 / nt as f32);
                data.positions.push(p);
                data.normals.push(n);
                data.texcoords.push(uv);
            }
        }
        let row = ns + 1;
        for j in 0..nt {
            for i in 0..ns {
                let p00 = j * row + i;
                let p10 = p00 + 1;
                let p01 = p00 + row;
                let p11 = p01 + 1;
                data.indices.extend_from_slice(&[p00, p10, p11, p00, p11, p01]);
            }
        }
        data
    }

    /// A flat parallelogram spanning `origin + s * u + t * v`.
    pub fn patch(origin: Vec3, u: Vec3, v: Vec3, segments_u: u32, segments_v: u32, uv_scale: f32) -> Self {
        let normal = u.cross(v).normalize();
        Self::surface(segments_u, segments_v, |s, t| {
            (
                origin + u * s + v * t,
                normal,
                Vec2::new(s * uv_scale, (1.0 - t) * uv_scale),
            )
        })
    }

    /// An axis-aligned box with outward faces, `segments` cuts per edge.
    pub fn cuboid(min: Vec3, max: Vec3, segments: u32, uv_scale: f32) -> Self {
        let d = max - min;
        let faces = [
            // +X, -X
            (Vec3::new(max.x, min.y, max.z), Vec3::new(0.0, 0.0, -d.z), Vec3::new(0.0, d.y, 0.0)),
            (Vec3::new(min.x, min.y, min.z), Vec3::new(0.0, 0.0, d.z), Vec3::new(0.0, d.y, 0.0)),
            // +Y, -Y
            (Vec3::new(min.x, max.y, max.z), Vec3::new(d.x, 0.0, 0.0), Vec3::new(0.0, 0.0, -d.z)),
            (Vec3::new(min.x, min.y, min.z), Vec3::new(d.x, 0.0, 0.0), Vec3::new(0.0, 0.0, d.z)),
            // +Z, -Z
            (Vec3::new(min.x, min.y, max.z), Vec3::new(d.x, 0.0, 0.0), Vec3::new(0.0, d.y, 0.0)),
            (Vec3::new(max.x, min.y, min.z), Vec3::new(-d.x, 0.0, 0.0), Vec3::new(0.0, d.y, 0.0)),
        ];
        let mut data = Self::default();
        for (origin, u, v) in faces {
            data.append(Self::patch(origin, u, v, segments, segments, uv_scale));
        }
        data
    }

    /// An open-ended vertical cylinder with a top cap.
    pub fn column(base: Vec3, radius: f32, height: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        // Decreasing angle keeps the outside as the front face.
        let mut data = Self::surface(segments, rings, |s, t| {
            let theta = -TAU * s;
            let normal = Vec3::new(theta.cos(), 0.0, theta.sin());
            (
                base + normal * radius + Vec3::Y * (height * t),
                normal,
                Vec2::new(s * 4.0, 1.0 - t),
            )
        });

        let top = base + Vec3::Y * height;
        let center = data.positions.len() as u32;
        data.positions.push(top);
        data.normals.push(Vec3::Y);
        data.texcoords.push(Vec2::splat(0.5));
        for i in 0..=segments {
            let theta = -TAU * i as f32 / segments as f32;
            let (sin, cos) = theta.sin_cos();
            data.positions.push(top + Vec3::new(cos, 0.0, sin) * radius);
            data.normals.push(Vec3::Y);
            data.texcoords.push(Vec2::new(0.5 + 0.5 * cos, 0.5 + 0.5 * sin));
        }
        for i in 0..segments {
            data.indices
                .extend_from_slice(&[center, center + 1 + i, center + 2 + i]);
        }
        data
    }

    /// Appends another mesh, rebasing its indices.
    pub fn append(&mut self, other: MeshData) {
        let base = self.positions.len() as u32;
        self.positions.extend(other.positions);
        self.normals.extend(other.normals);
        self.texcoords.extend(other.texcoords);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }

    /// Applies a rigid or uniformly scaled transform.
    pub fn transformed(mut self, matrix: &Mat4) -> Self {
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
        for n in &mut self.normals {
            *n = matrix.transform_vector3(*n).normalize();
        }
        self
    }

    /// Triangles held.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Accumulates meshes and materials into a [`Scene`].
#[derive(Debug, Default)]
pub struct SceneBuilder {
    scene: Scene,
}

impl SceneBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a material and returns its id.
    pub fn add_material(&mut self, material: Material) -> u32 {
        self.scene.materials.push(material);
        (self.scene.materials.len() - 1) as u32
    }

    /// Appends a mesh and returns its index.
    pub fn add_mesh(&mut self, name: impl Into<String>, material_id: u32, data: MeshData) -> u32 {
        let base_vertex = self.scene.positions.len() as u32;
        let start_index = self.scene.indices.len() as u32;
        let index_count = data.indices.len() as u32;

        self.scene.positions.extend(data.positions);
        self.scene.normals.extend(data.normals);
        self.scene.texcoords.extend(data.texcoords);
        self.scene
            .indices
            .extend(data.indices.into_iter().map(|i| i + base_vertex));
        self.scene.meshes.push(Mesh {
            name: name.into(),
            material_id,
            start_index,
            index_count,
        });
        (self.scene.meshes.len() - 1) as u32
    }

    /// Validates and returns the scene.
    pub fn build(self) -> Result<Scene, SceneError> {
        self.scene.validate()?;
        Ok(self.scene)
    }
}
