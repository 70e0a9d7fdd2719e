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

//! Scene geometry model.
//!
//! A [`Scene`] stores shared vertex streams and one index buffer; each
//! [`Mesh`] is a contiguous index range drawn with one [`Material`].

mod builder;
mod obj;
pub mod procedural;
mod texture;

use std::sync::Arc;

use vbuffer_core::math::{Aabb, Vec2, Vec3, Vec4};
use vbuffer_core::renderer::GeometrySet;

use crate::error::SceneError;

pub use self::builder::{MeshData, SceneBuilder};
pub use self::obj::load_obj;
pub use self::texture::Texture;

/// Surface description of a mesh.
#[derive(Debug, Clone)]
pub struct Material {
    /// Name, as found in the source asset.
    pub name: String,
    /// Albedo multiplier (`xyz`) and alpha (`w`).
    pub base_color: Vec4,
    /// Specular intensity in `[0, 1]`.
    pub specular: f32,
    /// GGX roughness in `[0, 1]`.
    pub roughness: f32,
    /// Drawn without backface culling; its clusters are never cone-culled.
    pub two_sided: bool,
    /// Texels with alpha below 0.5 are discarded.
    pub alpha_tested: bool,
    /// Albedo texture, sampled with the mesh texture coordinates.
    pub albedo: Option<Arc<Texture>>,
}

impl Material {
    /// An opaque, one-sided material of a flat colour.
    pub fn solid(name: impl Into<String>, color: Vec3) -> Self {
        Self {
            name: name.into(),
            base_color: color.extend(1.0),
            specular: 0.2,
            roughness: 0.7,
            two_sided: false,
            alpha_tested: false,
            albedo: None,
        }
    }

    /// Geometry set the material is drawn with.
    pub fn geometry_set(&self) -> GeometrySet {
        if self.alpha_tested {
            GeometrySet::AlphaTested
        } else {
            GeometrySet::Opaque
        }
    }

    /// Albedo and alpha at `uv`.
    pub fn albedo_at(&self, uv: Vec2) -> Vec4 {
        match &self.albedo {
            Some(texture) => texture.sample(uv) * self.base_color,
            None => self.base_color,
        }
    }
}

/// A contiguous index range of the scene drawn with one material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    /// Name, as found in the source asset.
    pub name: String,
    /// Index into [`Scene::materials`].
    pub material_id: u32,
    /// First index in [`Scene::indices`].
    pub start_index: u32,
    /// Index count, a multiple of 3.
    pub index_count: u32,
}

impl Mesh {
    /// Triangles of the mesh.
    #[inline]
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

/// Scene geometry: vertex streams, one index buffer, meshes and materials.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Object-space positions.
    pub positions: Vec<Vec3>,
    /// Object-space unit normals.
    pub normals: Vec<Vec3>,
    /// Texture coordinates.
    pub texcoords: Vec<Vec2>,
    /// Triangle list indices into the vertex streams.
    pub indices: Vec<u32>,
    /// Index ranges.
    pub meshes: Vec<Mesh>,
    /// Materials referenced by the meshes.
    pub materials: Vec<Material>,
}

impl Scene {
    /// Vertices in the streams.
    pub fn total_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Triangles over every mesh.
    pub fn total_triangles(&self) -> u32 {
        self.meshes.iter().map(Mesh::triangle_count).sum()
    }

    /// Material of a mesh.
    ///
    /// # Panics
    /// Panics on a mesh of another scene; [`Scene::validate`] guarantees
    /// every material id of this scene is in range.
    pub fn material_of(&self, mesh: &Mesh) -> &Material {
        &self.materials[mesh.material_id as usize]
    }

    /// Vertex indices of triangle `triangle` of `mesh`, relative to the mesh.
    pub fn triangle(&self, mesh: &Mesh, triangle: u32) -> Option<[u32; 3]> {
        if triangle >= mesh.triangle_count() {
            return None;
        }
        let base = (mesh.start_index + triangle * 3) as usize;
        let tri = self.indices.get(base..base + 3)?;
        Some([tri[0], tri[1], tri[2]])
    }

    /// Object-space bounds of every vertex referenced by a mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut aabb = Aabb::INVALID;
        for mesh in &self.meshes {
            let range = mesh.start_index as usize..(mesh.start_index + mesh.index_count) as usize;
            for &index in self.indices.get(range)? {
                aabb.grow(*self.positions.get(index as usize)?);
            }
        }
        aabb.is_valid().then_some(aabb)
    }

    /// Checks that every stream, range and reference is consistent.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.normals.len() != self.positions.len() || self.texcoords.len() != self.positions.len()
        {
            return Err(SceneError::MismatchedStreams {
                positions: self.positions.len(),
                normals: self.normals.len(),
                texcoords: self.texcoords.len(),
            });
        }
        if self.total_triangles() == 0 {
            return Err(SceneError::Empty);
        }
        for mesh in &self.meshes {
            let end = mesh.start_index as usize + mesh.index_count as usize;
            if mesh.index_count % 3 != 0 || end > self.indices.len() {
                return Err(SceneError::InvalidMeshRange(mesh.name.clone()));
            }
            if mesh.material_id as usize >= self.materials.len() {
                return Err(SceneError::UnknownMaterial {
                    mesh: mesh.name.clone(),
                    material_id: mesh.material_id,
                });
            }
            let vertex_count = self.positions.len();
            if let Some(&index) = self.indices[mesh.start_index as usize..end]
                .iter()
                .find(|&&i| i as usize >= vertex_count)
            {
                return Err(SceneError::IndexOutOfRange {
                    mesh: mesh.name.clone(),
                    index,
                    vertex_count,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_triangle() -> Scene {
        Scene {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            texcoords: vec![Vec2::ZERO; 3],
            indices: vec![0, 1, 2],
            meshes: vec![Mesh {
                name: "tri".into(),
                material_id: 0,
                start_index: 0,
                index_count: 3,
            }],
            materials: vec![Material::solid("white", Vec3::ONE)],
        }
    }

    #[test]
    fn test_valid_scene() {
        let scene = single_triangle();
        scene.validate().unwrap();
        assert_eq!(scene.total_triangles(), 1);
        assert_eq!(scene.triangle(&scene.meshes[0], 0), Some([0, 1, 2]));
        assert_eq!(scene.triangle(&scene.meshes[0], 1), None);
        let bounds = scene.bounds().unwrap();
        assert_eq!(bounds.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_validation_errors() {
        let mut scene = single_triangle();
        scene.indices[2] = 9;
        assert!(matches!(
            scene.validate(),
            Err(SceneError::IndexOutOfRange { index: 9, .. })
        ));

        let mut scene = single_triangle();
        scene.meshes[0].material_id = 3;
        assert!(matches!(
            scene.validate(),
            Err(SceneError::UnknownMaterial { .. })
        ));

        let mut scene = single_triangle();
        scene.meshes[0].index_count = 2;
        assert!(matches!(scene.validate(), Err(SceneError::Empty)));

        assert!(matches!(Scene::default().validate(), Err(SceneError::Empty)));
    }

    #[test]
    fn test_alpha_tested_material_uses_alpha_set() {
        let mut leaf = Material::solid("leaf", Vec3::Y);
        assert_eq!(leaf.geometry_set(), GeometrySet::Opaque);
        leaf.alpha_tested = true;
        assert_eq!(leaf.geometry_set(), GeometrySet::AlphaTested);
    }
}
