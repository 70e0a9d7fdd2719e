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

//! Wavefront OBJ import.

use std::path::Path;
use std::sync::Arc;

use vbuffer_core::math::{Vec2, Vec3, Vec4};

use super::builder::{MeshData, SceneBuilder};
use super::{Material, Scene, Texture};
use crate::error::SceneError;

/// Loads an OBJ file and its MTL library into a scene, one mesh per object.
///
/// Missing normals are rebuilt from the faces. Materials with a dissolve
/// value or a dissolve map are alpha-tested and two-sided. A texture that
/// fails to decode is reported and replaced by the flat diffuse colour.
pub fn load_obj(path: &Path) -> Result<Scene, SceneError> {
    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| SceneError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let materials = materials.unwrap_or_else(|e| {
        log::warn!("No usable material library for '{}': {e}", path.display());
        Vec::new()
    });
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut builder = SceneBuilder::new();
    let material_ids: Vec<u32> = materials
        .iter()
        .map(|m| builder.add_material(convert_material(m, base_dir)))
        .collect();
    let mut fallback_material = None;

    for model in models {
        let mesh = &model.mesh;
        if mesh.indices.is_empty() {
            log::debug!("Skipping empty OBJ object '{}'", model.name);
            continue;
        }
        let material_id = match mesh.material_id.and_then(|id| material_ids.get(id)) {
            Some(&id) => id,
            None => *fallback_material.get_or_insert_with(|| {
                builder.add_material(Material::solid("Default", Vec3::splat(0.8)))
            }),
        };
        builder.add_mesh(model.name.clone(), material_id, mesh_data(mesh));
    }

    let scene = builder.build()?;
    log::info!(
        "Loaded '{}': {} meshes, {} materials, {} triangles",
        path.display(),
        scene.meshes.len(),
        scene.materials.len(),
        scene.total_triangles()
    );
    Ok(scene)
}

fn mesh_data(mesh: &tobj::Mesh) -> MeshData {
    let positions: Vec<Vec3> = mesh
        .positions
        .chunks_exact(3)
        .map(|v| Vec3::new(v[0], v[1], v[2]))
        .collect();
    let vertex_count = positions.len();

    let normals = if mesh.normals.len() == vertex_count * 3 {
        mesh.normals
            .chunks_exact(3)
            .map(|n| Vec3::new(n[0], n[1], n[2]).normalize())
            .collect()
    } else {
        face_normals(&positions, &mesh.indices)
    };

    // OBJ texture space has v pointing up.
    let texcoords = if mesh.texcoords.len() == vertex_count * 2 {
        mesh.texcoords
            .chunks_exact(2)
            .map(|t| Vec2::new(t[0], 1.0 - t[1]))
            .collect()
    } else {
        vec![Vec2::ZERO; vertex_count]
    };

    MeshData {
        positions,
        normals,
        texcoords,
        indices: mesh.indices.clone(),
    }
}

/// Area-weighted vertex normals.
fn face_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let (Some(&pa), Some(&pb), Some(&pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };
        let n = (pb - pa).cross(pc - pa);
        for i in [a, b, c] {
            normals[i] += n;
        }
    }
    normals.into_iter().map(|n| n.normalize()).collect()
}

fn convert_material(material: &tobj::Material, base_dir: &Path) -> Material {
    let diffuse = material.diffuse.map(Vec3::from).unwrap_or(Vec3::splat(0.8));
    let alpha = material.dissolve.unwrap_or(1.0);
    let alpha_tested = material.dissolve_texture.is_some() || alpha < 1.0;
    let specular = material
        .specular
        .map(|s| (s[0] + s[1] + s[2]) / 3.0)
        .unwrap_or(0.2);
    let roughness = material
        .shininess
        .map(|ns| (2.0 / (ns.max(0.0) + 2.0)).sqrt())
        .unwrap_or(0.7);

    let albedo = material.diffuse_texture.as_ref().and_then(|name| {
        let texture_path = base_dir.join(name);
        match Texture::load(&texture_path) {
            Ok(texture) => Some(Arc::new(texture)),
            Err(e) => {
                log::warn!("Material '{}': {e}", material.name);
                None
            }
        }
    });

    Material {
        name: material.name.clone(),
        base_color: Vec4::new(diffuse.x, diffuse.y, diffuse.z, if alpha_tested { 1.0 } else { alpha }),
        specular,
        roughness,
        two_sided: alpha_tested,
        alpha_tested,
        albedo,
    }
}
