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

//! Screen-space light clustering.
//!
//! The screen is split into a `LIGHT_CLUSTER_WIDTH x LIGHT_CLUSTER_HEIGHT`
//! grid. Each point light is projected with the camera, approximated by a
//! screen-space circle and appended to the id list of every tile the circle
//! overlaps. Shading then loops over the lights of its tile only.
//!
//! ```text
//! clear (1 group)  →  compute (1 group per light)  →  read by shading
//! ```

use std::sync::Arc;

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::{circle_intersects_rect, Vec2};
use vbuffer_core::renderer::{
    LightData, PerFrameConstants, ResourceState, LIGHT_CLUSTER_HEIGHT, LIGHT_CLUSTER_WIDTH,
    LIGHT_COUNT, LIGHT_SIZE, VIEW_CAMERA,
};

use crate::error::PassError;
use crate::frame::FrameResources;
use crate::gpu_scene::GpuScene;

/// Outcome of one light clustering dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightClusterStats {
    /// Lights in front of the camera.
    pub lights_in_front: u32,
    /// Light-tile pairs written.
    pub assignments: u32,
    /// Light-tile pairs dropped because the tile was full.
    pub overflowed: u32,
}

/// Zeroes the per-tile light counts.
pub fn clear_light_clusters(counts: &mut [u32]) {
    counts.fill(0);
}

/// Bins `lights` into the tile grid.
///
/// `counts` holds one append cursor per tile and `clusters` `LIGHT_COUNT`
/// ids per tile. A tile never holds more than `LIGHT_COUNT` lights; further
/// lights are dropped from that tile.
pub fn compute_light_clusters(
    lights: &[LightData],
    constants: &PerFrameConstants,
    counts: &mut [u32],
    clusters: &mut [u32],
) -> LightClusterStats {
    let camera = &constants.transform[VIEW_CAMERA];
    let view_projection = camera.projection * camera.view;
    let proj_y = camera.projection.cols[1].y;
    let aspect = constants.camera_aspect();
    let mut stats = LightClusterStats::default();

    for (light_id, light) in lights.iter().enumerate().take(LIGHT_COUNT as usize) {
        let clip = view_projection * light.position.extend(1.0);
        if clip.w <= 0.0 {
            continue;
        }
        stats.lights_in_front += 1;

        let ndc = clip.truncate() / clip.w;
        let center = Vec2::new(ndc.x * aspect, ndc.y);
        let radius = 2.0 * LIGHT_SIZE * proj_y / clip.w;

        for y in 0..LIGHT_CLUSTER_HEIGHT {
            for x in 0..LIGHT_CLUSTER_WIDTH {
                let (rect_min, rect_max) = tile_rect(x, y, aspect);
                if !circle_intersects_rect(center, radius, rect_min, rect_max) {
                    continue;
                }
                let tile = (y * LIGHT_CLUSTER_WIDTH + x) as usize;
                let Some(cursor) = counts.get_mut(tile) else {
                    continue;
                };
                if *cursor >= LIGHT_COUNT {
                    stats.overflowed += 1;
                    continue;
                }
                if let Some(dst) = clusters.get_mut(tile * LIGHT_COUNT as usize + *cursor as usize) {
                    *dst = light_id as u32;
                    *cursor += 1;
                    stats.assignments += 1;
                }
            }
        }
    }

    stats
}

/// NDC rectangle of tile `(x, y)`, x scaled by the aspect ratio.
fn tile_rect(x: u32, y: u32, aspect: f32) -> (Vec2, Vec2) {
    let w = LIGHT_CLUSTER_WIDTH as f32;
    let h = LIGHT_CLUSTER_HEIGHT as f32;
    let min = Vec2::new(
        (-1.0 + 2.0 * x as f32 / w) * aspect,
        -1.0 + 2.0 * y as f32 / h,
    );
    let max = Vec2::new(
        (-1.0 + 2.0 * (x + 1) as f32 / w) * aspect,
        -1.0 + 2.0 * (y + 1) as f32 / h,
    );
    (min, max)
}

/// Tile holding pixel `(px, py)` of a `width x height` image, row 0 at the top.
pub fn light_cluster_of_pixel(px: u32, py: u32, width: u32, height: u32) -> usize {
    let tx = (px as u64 * LIGHT_CLUSTER_WIDTH as u64 / width.max(1) as u64) as u32;
    // NDC y grows upwards, image rows downwards.
    let row_from_bottom = height.saturating_sub(1).saturating_sub(py);
    let ty = (row_from_bottom as u64 * LIGHT_CLUSTER_HEIGHT as u64 / height.max(1) as u64) as u32;
    (ty.min(LIGHT_CLUSTER_HEIGHT - 1) * LIGHT_CLUSTER_WIDTH + tx.min(LIGHT_CLUSTER_WIDTH - 1))
        as usize
}

/// Compute-queue lane running the clear and binning dispatches of a frame.
///
/// Reads `Arc<GpuScene>` and `Arc<FrameResources>`; inserts the
/// [`LightClusterStats`] of the dispatch.
#[derive(Debug, Default)]
pub struct LightClusterLane;

impl LightClusterLane {
    /// Creates the lane.
    pub fn new() -> Self {
        Self
    }

    fn run(scene: &GpuScene, frame: &FrameResources) -> Result<LightClusterStats, PassError> {
        let constants = frame.read_constants(ResourceState::SHADER_RESOURCE)?;
        let mut counts = frame.light_cluster_counts.write()?;
        let mut clusters = frame.light_clusters.write()?;
        clear_light_clusters(&mut counts);
        Ok(compute_light_clusters(
            &scene.lights,
            &constants,
            &mut counts,
            &mut clusters,
        ))
    }
}

impl Lane for LightClusterLane {
    fn strategy_name(&self) -> &'static str {
        "LightClustering"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Lighting
    }

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        ctx.get::<Arc<GpuScene>>()
            .map(|s| (s.lights.len() as u32 * LIGHT_CLUSTER_WIDTH * LIGHT_CLUSTER_HEIGHT) as f32 * 1e-4)
            .unwrap_or(1.0)
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let scene = ctx.require::<Arc<GpuScene>>()?.clone();
        let frame = ctx.require::<Arc<FrameResources>>()?.clone();
        let stats = Self::run(&scene, &frame)?;
        if stats.overflowed > 0 {
            log::warn!(
                "Light clustering dropped {} light-tile pairs on full tiles",
                stats.overflowed
            );
        }
        log::trace!(
            "Light clustering: {} lights in front, {} assignments",
            stats.lights_in_front,
            stats.assignments
        );
        ctx.insert(stats);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::math::{Mat4, Vec3, FRAC_PI_2};
    use vbuffer_core::renderer::{CullingViewport, ViewTransform, LIGHT_CLUSTER_COUNT};

    fn constants() -> PerFrameConstants {
        let projection = Mat4::perspective_rh_zo(FRAC_PI_2, 1.0, 1.0, 5000.0).unwrap();
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2000.0), Vec3::ZERO, Vec3::Y).unwrap();
        let mut constants = PerFrameConstants::default();
        constants.transform[VIEW_CAMERA] = ViewTransform {
            mvp: projection * view,
            projection,
            view,
        };
        constants.cull_viewport[VIEW_CAMERA] = CullingViewport::new(512, 512, 1);
        constants
    }

    fn light(position: Vec3) -> LightData {
        LightData {
            position,
            color: Vec3::ONE,
        }
    }

    fn tiles_of(counts: &[u32], clusters: &[u32], light_id: u32) -> Vec<usize> {
        (0..LIGHT_CLUSTER_COUNT as usize)
            .filter(|&tile| {
                let n = counts[tile] as usize;
                let base = tile * LIGHT_COUNT as usize;
                clusters[base..base + n].contains(&light_id)
            })
            .collect()
    }

    #[test]
    fn test_centered_light_lands_in_central_tiles() {
        let lights = [light(Vec3::ZERO)];
        let mut counts = vec![7; LIGHT_CLUSTER_COUNT as usize];
        let mut clusters = vec![0; (LIGHT_CLUSTER_COUNT * LIGHT_COUNT) as usize];
        clear_light_clusters(&mut counts);
        let stats = compute_light_clusters(&lights, &constants(), &mut counts, &mut clusters);

        // Radius 2 * 150 / 2000 = 0.15 in NDC: the four tiles around the centre.
        assert_eq!(stats.lights_in_front, 1);
        let tiles = tiles_of(&counts, &clusters, 0);
        assert_eq!(tiles, vec![27, 28, 35, 36]);
        assert_eq!(stats.assignments, 4);
    }

    #[test]
    fn test_light_behind_camera_is_skipped() {
        let lights = [light(Vec3::new(0.0, 0.0, 3000.0))];
        let mut counts = vec![0; LIGHT_CLUSTER_COUNT as usize];
        let mut clusters = vec![0; (LIGHT_CLUSTER_COUNT * LIGHT_COUNT) as usize];
        let stats = compute_light_clusters(&lights, &constants(), &mut counts, &mut clusters);
        assert_eq!(stats, LightClusterStats::default());
        assert!(counts.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_light_in_the_eye_plane_is_skipped() {
        // Same depth as the eye: clip w is exactly zero.
        let lights = [light(Vec3::new(500.0, 0.0, 2000.0))];
        let mut counts = vec![0; LIGHT_CLUSTER_COUNT as usize];
        let mut clusters = vec![0; (LIGHT_CLUSTER_COUNT * LIGHT_COUNT) as usize];
        let stats = compute_light_clusters(&lights, &constants(), &mut counts, &mut clusters);
        assert_eq!(stats.lights_in_front, 0);
        assert_eq!(stats.assignments, 0);
        assert!(counts.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_every_assignment_overlaps_its_tile() {
        let lights: Vec<_> = (0..16)
            .map(|i| light(Vec3::new(i as f32 * 60.0 - 480.0, (i % 5) as f32 * 90.0 - 200.0, 0.0)))
            .collect();
        let constants = constants();
        let mut counts = vec![0; LIGHT_CLUSTER_COUNT as usize];
        let mut clusters = vec![0; (LIGHT_CLUSTER_COUNT * LIGHT_COUNT) as usize];
        compute_light_clusters(&lights, &constants, &mut counts, &mut clusters);

        let camera = constants.transform[VIEW_CAMERA];
        for (id, l) in lights.iter().enumerate() {
            let clip = camera.projection * camera.view * l.position.extend(1.0);
            let center = Vec2::new(clip.x / clip.w, clip.y / clip.w);
            let radius = 2.0 * LIGHT_SIZE * camera.projection.cols[1].y / clip.w;
            for tile in tiles_of(&counts, &clusters, id as u32) {
                let (x, y) = (tile as u32 % LIGHT_CLUSTER_WIDTH, tile as u32 / LIGHT_CLUSTER_WIDTH);
                let (min, max) = tile_rect(x, y, 1.0);
                assert!(circle_intersects_rect(center, radius, min, max));
            }
        }
    }

    #[test]
    fn test_pixel_to_tile_mapping() {
        assert_eq!(light_cluster_of_pixel(0, 511, 512, 512), 0);
        assert_eq!(
            light_cluster_of_pixel(511, 0, 512, 512),
            LIGHT_CLUSTER_COUNT as usize - 1
        );
        assert_eq!(light_cluster_of_pixel(256, 255, 512, 512), 36);
    }
}
