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

//! Cluster culling, batch building, triangle filtering and compaction.
//!
//! The CPU half runs while recording a frame: [`build_filter_batches`] walks
//! every mesh, drops clusters whose cone hides them from both views and
//! packs the rest into [`FilterDispatch`]es. The GPU half is the set of
//! kernels executed by the queue: [`clear_draw_arguments`],
//! [`filter_triangles`] and [`compact_batches`].

mod batching;
mod compaction;
mod cull;
mod triangle_filter;

pub use batching::{BatchBuilder, BatchOutput, FilterDispatch};
pub use compaction::{clear_draw_arguments, compact_batches, CompactionStats};
pub use cull::{cull_cluster, sort_clusters, update_cluster_distances};
pub use triangle_filter::{
    filter_triangle, filter_triangles, FilterInputs, FilterStats, ViewOutput,
};

use std::sync::Arc;

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::Vec4;
use vbuffer_core::renderer::{ClusterContainer, NUM_CULLING_VIEWPORTS};

use crate::error::FilterError;
use crate::gpu_scene::GpuScene;

/// Per-frame switches of the CPU culling step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CullingParams {
    /// Object-space eye of every culling view.
    pub eyes: [Vec4; NUM_CULLING_VIEWPORTS],
    /// Cone culling on or off.
    pub cluster_culling: bool,
    /// Front-to-back ordering of clusters within each mesh.
    pub sort_clusters: bool,
}

/// Everything the frame needs to record its filter dispatches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPlan {
    /// Batches and draw accounting.
    pub batches: BatchOutput,
    /// Clusters visited.
    pub total_clusters: u32,
    /// Clusters rejected by the cone test.
    pub culled_clusters: u32,
}

/// Culls the clusters of every mesh and packs the survivors into batches.
pub fn build_filter_batches(
    scene: &GpuScene,
    clusters: &mut [ClusterContainer],
    params: &CullingParams,
    builder: &mut BatchBuilder,
) -> Result<FilterPlan, FilterError> {
    builder.begin_frame();
    let mut total_clusters = 0u32;
    let mut culled_clusters = 0u32;

    for (mesh_index, (mesh, container)) in scene.meshes.iter().zip(clusters.iter_mut()).enumerate()
    {
        if params.sort_clusters {
            sort_clusters(container);
        }
        for (cluster, compact) in container.iter() {
            total_clusters += 1;
            if params.cluster_culling && cull_cluster(cluster, &params.eyes) {
                culled_clusters += 1;
                continue;
            }
            builder.add_cluster_to_batch_chunk(mesh_index as u32, mesh, compact)?;
        }
        builder.end_mesh();
    }

    let batches = builder.finish();
    log::debug!(
        "Cluster culling: {}/{} clusters culled, {} draws, {} dispatches",
        culled_clusters,
        total_clusters,
        batches.draw_count,
        batches.dispatches.len()
    );
    Ok(FilterPlan {
        batches,
        total_clusters,
        culled_clusters,
    })
}

/// Record-time lane producing the frame's [`FilterPlan`].
///
/// Reads `Arc<GpuScene>` and [`CullingParams`], updates the
/// `Vec<ClusterContainer>` in place when sorting, keeps a [`BatchBuilder`]
/// in the context between frames and inserts the resulting [`FilterPlan`].
#[derive(Debug, Default)]
pub struct CullingLane;

impl CullingLane {
    /// Creates the lane.
    pub fn new() -> Self {
        Self
    }
}

impl Lane for CullingLane {
    fn strategy_name(&self) -> &'static str {
        "ClusterCulling"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Culling
    }

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        ctx.get::<Vec<ClusterContainer>>()
            .map(|c| c.iter().map(ClusterContainer::cluster_count).sum::<usize>() as f32 * 0.01)
            .unwrap_or(1.0)
    }

    fn on_initialize(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        if !ctx.contains::<BatchBuilder>() {
            ctx.insert(BatchBuilder::new());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let scene = ctx.require::<Arc<GpuScene>>()?.clone();
        let params = *ctx.require::<CullingParams>()?;
        let mut builder = ctx.remove::<BatchBuilder>().unwrap_or_default();
        let mut clusters = ctx
            .remove::<Vec<ClusterContainer>>()
            .ok_or(LaneError::missing("Vec<ClusterContainer>"))?;

        let result = build_filter_batches(&scene, &mut clusters, &params, &mut builder);
        ctx.insert(clusters);
        ctx.insert(builder);
        ctx.insert(result.map_err(LaneError::execution)?);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::math::{Aabb, Vec2, Vec3};
    use vbuffer_core::renderer::{GeometrySet, CLUSTER_SIZE};

    use crate::cluster_lane::build_scene_clusters;
    use crate::gpu_scene::GpuMesh;

    /// One mesh of two clusters: an up-facing floor and a down-facing ceiling.
    fn floor_and_ceiling() -> GpuScene {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for (y, up) in [(0.0f32, true), (10.0, false)] {
            for i in 0..CLUSTER_SIZE {
                let base = positions.len() as u32;
                let x = i as f32;
                positions.push(Vec3::new(x, y, 0.0));
                positions.push(Vec3::new(x, y, 1.0));
                positions.push(Vec3::new(x + 1.0, y, 0.0));
                if up {
                    indices.extend_from_slice(&[base, base + 1, base + 2]);
                } else {
                    indices.extend_from_slice(&[base, base + 2, base + 1]);
                }
            }
        }
        let count = positions.len();
        GpuScene {
            positions,
            normals: vec![Vec3::Y; count],
            texcoords: vec![Vec2::ZERO; count],
            indices,
            meshes: vec![GpuMesh {
                start_index: 0,
                index_count: CLUSTER_SIZE * 6,
                material_id: 0,
                geometry_set: GeometrySet::Opaque,
                two_sided: false,
            }],
            materials: Vec::new(),
            lights: Vec::new(),
            bounds: Aabb::from_min_max(Vec3::ZERO, Vec3::new(256.0, 10.0, 1.0)),
        }
    }

    #[test]
    fn test_clusters_facing_away_from_both_views_are_dropped() {
        let scene = floor_and_ceiling();
        let mut clusters = build_scene_clusters(&scene);
        assert!(clusters[0].clusters.iter().all(|c| c.valid));

        // Both eyes between the floor and the ceiling see both.
        let inside = Vec3::new(128.0, 5.0, 0.5).extend(1.0);
        let params = CullingParams {
            eyes: [inside; NUM_CULLING_VIEWPORTS],
            cluster_culling: true,
            sort_clusters: false,
        };
        let mut builder = BatchBuilder::new();
        let plan = build_filter_batches(&scene, &mut clusters, &params, &mut builder).unwrap();
        assert_eq!(plan.total_clusters, 2);
        assert_eq!(plan.culled_clusters, 0);

        // Below the floor the floor shows its back and is dropped.
        let below = Vec3::new(128.0, -50.0, 0.5).extend(1.0);
        let params = CullingParams {
            eyes: [below; NUM_CULLING_VIEWPORTS],
            ..params
        };
        let plan = build_filter_batches(&scene, &mut clusters, &params, &mut builder).unwrap();
        assert_eq!(plan.culled_clusters, 1);
        assert_eq!(plan.batches.dispatches[0].batches.len(), 1);
        assert_eq!(plan.batches.dispatches[0].batches[0].index_offset, CLUSTER_SIZE * 3);

        // Culling off keeps everything.
        let params = CullingParams {
            cluster_culling: false,
            ..params
        };
        let plan = build_filter_batches(&scene, &mut clusters, &params, &mut builder).unwrap();
        assert_eq!(plan.culled_clusters, 0);
        assert_eq!(plan.batches.triangle_count, 2 * CLUSTER_SIZE);
    }

    #[test]
    fn test_lane_round_trips_context() {
        let scene = Arc::new(floor_and_ceiling());
        let mut ctx = LaneContext::new();
        ctx.insert(build_scene_clusters(&scene));
        ctx.insert(scene);
        ctx.insert(CullingParams {
            eyes: [Vec4::W; NUM_CULLING_VIEWPORTS],
            cluster_culling: true,
            sort_clusters: true,
        });
        let lane = CullingLane::new();
        lane.on_initialize(&mut ctx).unwrap();
        lane.execute(&mut ctx).unwrap();
        assert!(ctx.contains::<Vec<ClusterContainer>>());
        assert!(ctx.contains::<BatchBuilder>());
        let plan = ctx.get::<FilterPlan>().unwrap();
        assert_eq!(plan.total_clusters, 2);
    }
}
