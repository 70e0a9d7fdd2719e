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

//! Read-only scene resources shared by both queues.

use vbuffer_core::math::{Aabb, Vec2, Vec3};
use vbuffer_core::renderer::{GeometrySet, LightData};
use vbuffer_data::{Material, Scene, SceneError};

/// Draw-time view of a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMesh {
    /// First index in [`GpuScene::indices`].
    pub start_index: u32,
    /// Index count, a multiple of 3.
    pub index_count: u32,
    /// Index into [`GpuScene::materials`].
    pub material_id: u32,
    /// Geometry set of the material.
    pub geometry_set: GeometrySet,
    /// Backface culling is skipped for two-sided materials.
    pub two_sided: bool,
}

impl GpuMesh {
    /// Triangles of the mesh.
    #[inline]
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// Vertex streams, index buffer, meshes, materials and lights of the scene.
///
/// Built once at load and shared behind an `Arc` by the compute and graphics
/// queues; nothing in it changes afterwards.
#[derive(Debug, Clone)]
pub struct GpuScene {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub indices: Vec<u32>,
    pub meshes: Vec<GpuMesh>,
    pub materials: Vec<Material>,
    pub lights: Vec<LightData>,
    /// Object-space bounds of the geometry.
    pub bounds: Aabb,
}

impl GpuScene {
    /// Uploads a validated scene.
    pub fn from_scene(scene: &Scene, lights: Vec<LightData>) -> Result<Self, SceneError> {
        scene.validate()?;
        let bounds = scene.bounds().ok_or(SceneError::Empty)?;
        let meshes = scene
            .meshes
            .iter()
            .map(|mesh| {
                let material = scene.material_of(mesh);
                GpuMesh {
                    start_index: mesh.start_index,
                    index_count: mesh.index_count,
                    material_id: mesh.material_id,
                    geometry_set: material.geometry_set(),
                    two_sided: material.two_sided,
                }
            })
            .collect();

        Ok(Self {
            positions: scene.positions.clone(),
            normals: scene.normals.clone(),
            texcoords: scene.texcoords.clone(),
            indices: scene.indices.clone(),
            meshes,
            materials: scene.materials.clone(),
            lights,
            bounds,
        })
    }

    /// Triangles over every mesh.
    pub fn total_triangles(&self) -> u32 {
        self.meshes.iter().map(GpuMesh::triangle_count).sum()
    }

    /// Material of a draw, falling back to the first material.
    pub fn material(&self, material_id: u32) -> Option<&Material> {
        self.materials
            .get(material_id as usize)
            .or_else(|| self.materials.first())
    }
}
