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

//! Cluster builder.
//!
//! Splits every mesh into runs of [`CLUSTER_SIZE`] triangles and fits each
//! run with a bounding box and a visibility cone. A viewer inside the cone
//! sees only back faces of the cluster, so the whole cluster can be skipped
//! for that view.
//!
//! The cone is built in two passes over the triangles:
//!
//! 1. The axis is the negated sum of the unit triangle normals.
//! 2. Every triangle plane is intersected with the ray `center + t * axis`;
//!    the apex sits at the largest `t` and the opening is bounded by the
//!    triangle most parallel to the axis.
//!
//! Clusters of two-sided meshes, clusters whose triangles face each other,
//! and clusters whose apex ends up far away from their bounds are marked
//! invalid and never culled.

use std::sync::Arc;

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::{Aabb, Vec3};
use vbuffer_core::renderer::{Cluster, ClusterCompact, ClusterContainer, CLUSTER_SIZE};

use crate::gpu_scene::{GpuMesh, GpuScene};

/// Apex distance, in multiples of the cluster diagonal, beyond which the cone is unreliable.
const MAX_APEX_DISTANCE: f32 = 16.0;

/// Builds the clusters of one mesh.
///
/// Triangles referencing vertices outside `positions` are ignored for the
/// bounds and the cone; [`GpuScene::from_scene`] validates indices up front.
pub fn create_clusters(
    positions: &[Vec3],
    indices: &[u32],
    mesh: &GpuMesh,
    two_sided: bool,
) -> ClusterContainer {
    let triangle_count = mesh.triangle_count();
    let cluster_count = triangle_count.div_ceil(CLUSTER_SIZE);
    let mut container = ClusterContainer {
        clusters: Vec::with_capacity(cluster_count as usize),
        compacts: Vec::with_capacity(cluster_count as usize),
    };

    let mut cache: Vec<[Vec3; 3]> = Vec::with_capacity(CLUSTER_SIZE as usize);
    for cluster_index in 0..cluster_count {
        let cluster_start = cluster_index * CLUSTER_SIZE;
        let cluster_end = (cluster_start + CLUSTER_SIZE).min(triangle_count);

        cache.clear();
        for triangle in cluster_start..cluster_end {
            let base = (mesh.start_index + triangle * 3) as usize;
            if let Some(tri) = fetch_triangle(positions, indices, base) {
                cache.push(tri);
            }
        }

        container.clusters.push(fit_cluster(&cache, two_sided));
        container.compacts.push(ClusterCompact {
            triangle_count: cluster_end - cluster_start,
            cluster_start,
        });
    }

    container
}

fn fetch_triangle(positions: &[Vec3], indices: &[u32], base: usize) -> Option<[Vec3; 3]> {
    let tri = indices.get(base..base + 3)?;
    Some([
        *positions.get(tri[0] as usize)?,
        *positions.get(tri[1] as usize)?,
        *positions.get(tri[2] as usize)?,
    ])
}

#[inline]
fn face_normal(tri: &[Vec3; 3]) -> Vec3 {
    (tri[1] - tri[0]).cross(tri[2] - tri[0])
}

fn fit_cluster(triangles: &[[Vec3; 3]], two_sided: bool) -> Cluster {
    let mut aabb = Aabb::INVALID;
    let mut cone_axis = Vec3::ZERO;
    for tri in triangles {
        for v in tri {
            aabb.grow(*v);
        }
        cone_axis -= face_normal(tri).normalize();
    }
    if !aabb.is_valid() {
        return Cluster::default();
    }

    let center = aabb.center();
    let mut valid = !two_sided && cone_axis != Vec3::ZERO;
    let cone_axis = cone_axis.normalize();

    // Cosine of the opening, shrinks towards 0 as the cone widens to 90 degrees.
    let mut cone_opening = 1.0f32;
    let mut t = f32::NEG_INFINITY;
    if valid {
        for tri in triangles {
            let normal = face_normal(tri).normalize();
            let directional_part = cone_axis.dot(-normal);
            if directional_part <= 0.0 {
                // Two triangles face each other.
                valid = false;
                break;
            }
            let td = (center - tri[0]).dot(normal) / -directional_part;
            t = t.max(td);
            cone_opening = cone_opening.min(directional_part);
        }
    }

    let cone_center = if t.is_finite() {
        center + cone_axis * t
    } else {
        center
    };
    if valid && cone_center.distance(center) > MAX_APEX_DISTANCE * aabb.size().length() {
        valid = false;
    }

    Cluster {
        aabb_min: aabb.min,
        aabb_max: aabb.max,
        cone_center,
        cone_axis,
        cone_angle_cosine: (1.0 - cone_opening * cone_opening).max(0.0).sqrt(),
        distance_from_camera: 0.0,
        valid,
    }
}

/// Builds the cluster containers of every mesh of `scene`, in mesh order.
pub fn build_scene_clusters(scene: &GpuScene) -> Vec<ClusterContainer> {
    let containers: Vec<ClusterContainer> = scene
        .meshes
        .iter()
        .map(|mesh| create_clusters(&scene.positions, &scene.indices, mesh, mesh.two_sided))
        .collect();

    let total: usize = containers.iter().map(ClusterContainer::cluster_count).sum();
    let valid = containers
        .iter()
        .flat_map(|c| c.clusters.iter())
        .filter(|c| c.valid)
        .count();
    log::info!(
        "Built {} clusters for {} meshes ({} cullable)",
        total,
        containers.len(),
        valid
    );
    containers
}

/// Load-time lane turning the [`GpuScene`] of the context into cluster containers.
///
/// Reads `Arc<GpuScene>` and inserts `Vec<ClusterContainer>`.
#[derive(Debug, Default)]
pub struct ClusterLane;

impl ClusterLane {
    /// Creates the lane.
    pub fn new() -> Self {
        Self
    }
}

impl Lane for ClusterLane {
    fn strategy_name(&self) -> &'static str {
        "ClusterBuild"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Cluster
    }

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        ctx.get::<Arc<GpuScene>>()
            .map(|scene| scene.total_triangles() as f32 / CLUSTER_SIZE as f32)
            .unwrap_or(1.0)
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let scene = ctx.require::<Arc<GpuScene>>()?.clone();
        ctx.insert(build_scene_clusters(&scene));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::GeometrySet;

    fn mesh(index_count: u32) -> GpuMesh {
        GpuMesh {
            start_index: 0,
            index_count,
            material_id: 0,
            geometry_set: GeometrySet::Opaque,
            two_sided: false,
        }
    }

    /// A flat grid of `n * n` quads in the XZ plane facing +Y.
    fn grid(n: u32) -> (Vec<Vec3>, Vec<u32>) {
        let mut positions = Vec::new();
        for z in 0..=n {
            for x in 0..=n {
                positions.push(Vec3::new(x as f32, 0.0, z as f32));
            }
        }
        let mut indices = Vec::new();
        let row = n + 1;
        for z in 0..n {
            for x in 0..n {
                let i = z * row + x;
                indices.extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
            }
        }
        (positions, indices)
    }

    #[test]
    fn test_partitions_into_cluster_sized_runs() {
        let (positions, indices) = grid(12);
        let count = indices.len() as u32;
        let container = create_clusters(&positions, &indices, &mesh(count), false);
        // 288 triangles: one full cluster and one of 32.
        assert_eq!(container.cluster_count(), 2);
        assert_eq!(container.compacts[0].triangle_count, CLUSTER_SIZE);
        assert_eq!(container.compacts[1].triangle_count, 32);
        assert_eq!(container.compacts[1].cluster_start, CLUSTER_SIZE);
        assert_eq!(container.triangle_count(), 288);
    }

    #[test]
    fn test_flat_cluster_cone_points_away_from_normal() {
        let (positions, indices) = grid(2);
        let count = indices.len() as u32;
        let container = create_clusters(&positions, &indices, &mesh(count), false);
        let cluster = container.clusters[0];
        assert!(cluster.valid);
        // Up-facing triangles: the axis points down, the cone is a half space.
        assert!(cluster.cone_axis.dot(Vec3::Y) < -0.999);
        assert!(cluster.cone_angle_cosine < 1e-3);
        assert_eq!(cluster.aabb_min, Vec3::ZERO);
        assert_eq!(cluster.aabb_max, Vec3::new(2.0, 0.0, 2.0));
    }

    #[test]
    fn test_two_sided_and_opposing_faces_are_invalid() {
        let (positions, indices) = grid(2);
        let count = indices.len() as u32;
        assert!(!create_clusters(&positions, &indices, &mesh(count), true).clusters[0].valid);

        // The same triangle twice with opposite windings.
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::Z];
        let indices = vec![0, 2, 1, 0, 1, 2];
        let container = create_clusters(&positions, &indices, &mesh(6), false);
        assert!(!container.clusters[0].valid);
    }

    #[test]
    fn test_degenerate_triangles_give_invalid_cluster() {
        let positions = vec![Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        let container = create_clusters(&positions, &[0, 1, 2], &mesh(3), false);
        assert_eq!(container.cluster_count(), 1);
        assert!(!container.clusters[0].valid);
    }

    #[test]
    fn test_lane_inserts_containers() {
        let (positions, indices) = grid(4);
        let count = indices.len() as u32;
        let scene = GpuScene {
            normals: vec![Vec3::Y; positions.len()],
            texcoords: vec![Default::default(); positions.len()],
            positions,
            indices,
            meshes: vec![mesh(count)],
            materials: Vec::new(),
            lights: Vec::new(),
            bounds: Aabb::from_min_max(Vec3::ZERO, Vec3::new(4.0, 0.0, 4.0)),
        };
        let mut ctx = LaneContext::new();
        ctx.insert(Arc::new(scene));
        ClusterLane::new().execute(&mut ctx).unwrap();
        let containers = ctx.get::<Vec<ClusterContainer>>().unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].triangle_count(), 32);
    }
}
