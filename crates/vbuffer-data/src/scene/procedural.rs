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

//! A procedural courtyard used when no asset is supplied.
//!
//! The layout is a walled square with a colonnade, covered galleries,
//! planters and alpha-tested foliage, in object space spanning
//! `[-12, 12]` on x and z and `[0, 5]` on y. `detail` scales the
//! tessellation of every part.

use std::sync::Arc;

use vbuffer_core::math::{Mat4, Vec3, Vec4, PI};

use super::builder::{MeshData, SceneBuilder};
use super::{Material, Scene, Texture};
use crate::error::SceneError;

const HALF_EXTENT: f32 = 12.0;
const WALL_HEIGHT: f32 = 5.0;
const COLUMN_HEIGHT: f32 = 4.0;

/// Builds the courtyard.
pub fn courtyard(detail: u32) -> Result<Scene, SceneError> {
    let detail = detail.max(1);
    let mut builder = SceneBuilder::new();

    let stone = Arc::new(Texture::checker(
        64,
        8,
        Vec4::new(0.62, 0.60, 0.55, 1.0),
        Vec4::new(0.48, 0.45, 0.42, 1.0),
    ));
    let floor = builder.add_material(Material {
        albedo: Some(stone),
        specular: 0.1,
        roughness: 0.9,
        ..Material::solid("Floor", Vec3::ONE)
    });
    let walls = builder.add_material(Material::solid("Walls", Vec3::new(0.85, 0.72, 0.55)));
    let columns = builder.add_material(Material {
        specular: 0.5,
        roughness: 0.35,
        ..Material::solid("Columns", Vec3::new(0.9, 0.9, 0.86))
    });
    let roof = builder.add_material(Material::solid("Roof", Vec3::new(0.55, 0.2, 0.15)));
    let planters = builder.add_material(Material::solid("Planters", Vec3::new(0.4, 0.26, 0.16)));
    let leaves = builder.add_material(Material {
        two_sided: true,
        alpha_tested: true,
        albedo: Some(Arc::new(Texture::leaf(32, Vec4::new(0.25, 0.55, 0.15, 1.0)))),
        ..Material::solid("Leaves", Vec3::ONE)
    });

    builder.add_mesh(
        "Floor",
        floor,
        MeshData::patch(
            Vec3::new(-HALF_EXTENT, 0.0, HALF_EXTENT),
            Vec3::new(2.0 * HALF_EXTENT, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -2.0 * HALF_EXTENT),
            8 * detail,
            8 * detail,
            6.0,
        ),
    );

    let wall_boxes = [
        ("WallNorth", Vec3::new(-12.0, 0.0, -12.0), Vec3::new(12.0, WALL_HEIGHT, -11.0)),
        ("WallSouth", Vec3::new(-12.0, 0.0, 11.0), Vec3::new(12.0, WALL_HEIGHT, 12.0)),
        ("WallWest", Vec3::new(-12.0, 0.0, -11.0), Vec3::new(-11.0, WALL_HEIGHT, 11.0)),
        ("WallEast", Vec3::new(11.0, 0.0, -11.0), Vec3::new(12.0, WALL_HEIGHT, 11.0)),
    ];
    for (name, min, max) in wall_boxes {
        builder.add_mesh(name, walls, MeshData::cuboid(min, max, 2 * detail, 4.0));
    }

    let mut colonnade = MeshData::default();
    for position in column_positions() {
        colonnade.append(MeshData::column(
            position,
            0.4,
            COLUMN_HEIGHT,
            8 + 4 * detail,
            2 * detail,
        ));
    }
    builder.add_mesh("Colonnade", columns, colonnade);

    let mut galleries = MeshData::default();
    for z in [-1.0f32, 1.0] {
        let inner = 7.0 * z;
        let outer = 11.0 * z;
        galleries.append(MeshData::cuboid(
            Vec3::new(-11.0, COLUMN_HEIGHT, inner.min(outer)),
            Vec3::new(11.0, COLUMN_HEIGHT + 0.3, inner.max(outer)),
            2 * detail,
            2.0,
        ));
    }
    builder.add_mesh("Galleries", roof, galleries);

    let mut planter_boxes = MeshData::default();
    let mut foliage = MeshData::default();
    for center in planter_positions() {
        planter_boxes.append(MeshData::cuboid(
            center - Vec3::new(0.75, 0.0, 0.75),
            center + Vec3::new(0.75, 0.6, 0.75),
            detail,
            1.0,
        ));
        foliage.append(leaf_cluster(center + Vec3::Y * 0.6, 6 * detail));
    }
    builder.add_mesh("Planters", planters, planter_boxes);
    builder.add_mesh("Foliage", leaves, foliage);

    let scene = builder.build()?;
    log::debug!(
        "Built courtyard: {} meshes, {} triangles, {} vertices",
        scene.meshes.len(),
        scene.total_triangles(),
        scene.total_vertices()
    );
    Ok(scene)
}

fn column_positions() -> Vec<Vec3> {
    let mut positions = Vec::new();
    for i in 0..5 {
        let x = -8.0 + 4.0 * i as f32;
        positions.push(Vec3::new(x, 0.0, -7.5));
        positions.push(Vec3::new(x, 0.0, 7.5));
    }
    positions
}

fn planter_positions() -> [Vec3; 4] {
    [
        Vec3::new(-5.0, 0.0, -3.0),
        Vec3::new(5.0, 0.0, -3.0),
        Vec3::new(-5.0, 0.0, 3.0),
        Vec3::new(5.0, 0.0, 3.0),
    ]
}

/// Leaf cards fanned around a vertical axis, spaced by the golden angle.
fn leaf_cluster(base: Vec3, cards: u32) -> MeshData {
    let golden_angle = PI * (3.0 - 5.0f32.sqrt());
    let mut data = MeshData::default();
    for i in 0..cards {
        let yaw = golden_angle * i as f32;
        let height = 0.1 + 0.9 * (i as f32 / cards as f32);
        let card = MeshData::patch(
            Vec3::new(-0.4, 0.0, 0.0),
            Vec3::new(0.8, 0.0, 0.0),
            Vec3::new(0.0, 0.8, 0.3),
            1,
            1,
            1.0,
        );
        let place = Mat4::from_translation(base + Vec3::Y * height)
            * Mat4::from_rotation_y(yaw)
            * Mat4::from_scale(Vec3::splat(1.0 + 0.3 * (i % 3) as f32));
        data.append(card.transformed(&place));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::GeometrySet;

    #[test]
    fn test_courtyard_is_valid_and_scales_with_detail() {
        let low = courtyard(1).unwrap();
        let high = courtyard(2).unwrap();
        assert!(high.total_triangles() > low.total_triangles());
        assert_eq!(low.meshes.len(), 9);

        let bounds = low.bounds().unwrap();
        assert!(bounds.min.x >= -HALF_EXTENT && bounds.max.x <= HALF_EXTENT);
        assert!(bounds.min.y >= 0.0 && bounds.max.y <= WALL_HEIGHT);
    }

    #[test]
    fn test_foliage_is_the_alpha_tested_set() {
        let scene = courtyard(1).unwrap();
        let alpha: Vec<_> = scene
            .meshes
            .iter()
            .filter(|m| scene.material_of(m).geometry_set() == GeometrySet::AlphaTested)
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(alpha, vec!["Foliage"]);
        assert!(scene.materials.iter().any(|m| m.two_sided));
    }
}
