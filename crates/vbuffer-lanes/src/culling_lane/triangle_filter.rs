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

//! Per-triangle filtering kernel.
//!
//! One thread group per [`FilterBatchData`], one thread per triangle. Each
//! triangle is transformed into the clip space of every culling view and
//! tested independently; a view that keeps the triangle appends its three
//! indices to that view's filtered index buffer, inside the range of the
//! batch's draw.

use vbuffer_core::math::{Vec2, Vec4};
use vbuffer_core::renderer::{
    CullingViewport, FilterBatchData, FilterFlags, PerFrameConstants, UncompactedDrawArguments,
    NUM_CULLING_VIEWPORTS,
};

use crate::error::FilterError;
use crate::gpu_scene::GpuScene;

/// Returns `true` when the triangle survives every enabled test.
///
/// Tests in order:
/// 1. near plane: all `w <= 0` culls, any `w <= 0` keeps the triangle since
///    it crosses the eye plane and its projection is unbounded;
/// 2. backface: counter-clockwise triangles are front facing, so
///    `det([x y w]) <= 0` culls unless `two_sided`;
/// 3. far plane: all `z > w` culls;
/// 4. frustum: the screen bounding box misses the viewport;
/// 5. small primitive: the rounded bounding box is empty in x or y at the
///    viewport's sample resolution.
///
/// With no flag set the filter is off and every triangle is kept.
pub fn filter_triangle(
    clip: &[Vec4; 3],
    viewport: &CullingViewport,
    flags: FilterFlags,
    two_sided: bool,
) -> bool {
    if flags.is_empty() {
        return true;
    }

    let behind = clip.iter().filter(|v| v.w <= 0.0).count();
    if behind == 3 {
        return false;
    }
    if behind > 0 {
        return true;
    }

    if flags.contains(FilterFlags::CULL_BACKFACE) && !two_sided && determinant_xyw(clip) <= 0.0 {
        return false;
    }

    if flags.contains(FilterFlags::CULL_FRUSTUM) && clip.iter().all(|v| v.z > v.w) {
        return false;
    }

    let resolution = viewport.sample_resolution();
    let screen = clip.map(|v| (Vec2::new(v.x, v.y) / v.w * 0.5 + Vec2::splat(0.5)) * resolution);
    let mins = screen[0].min(screen[1]).min(screen[2]);
    let maxs = screen[0].max(screen[1]).max(screen[2]);

    if flags.contains(FilterFlags::CULL_FRUSTUM)
        && (maxs.x < 0.0 || maxs.y < 0.0 || mins.x > resolution.x || mins.y > resolution.y)
    {
        return false;
    }

    if flags.contains(FilterFlags::CULL_SMALL_PRIMITIVES) {
        let (lo, hi) = (mins.round(), maxs.round());
        if lo.x == hi.x || lo.y == hi.y {
            return false;
        }
    }

    true
}

/// Determinant of the 3x3 matrix whose rows are the `x y w` of each vertex.
///
/// Proportional to the signed screen-space area; positive for
/// counter-clockwise triangles in front of the eye.
#[inline]
fn determinant_xyw(clip: &[Vec4; 3]) -> f32 {
    let [a, b, c] = clip;
    a.x * (b.y * c.w - b.w * c.y) - a.y * (b.x * c.w - b.w * c.x) + a.w * (b.x * c.y - b.y * c.x)
}

/// Read-only inputs of a filter dispatch.
#[derive(Debug, Clone, Copy)]
pub struct FilterInputs<'a> {
    pub scene: &'a GpuScene,
    pub constants: &'a PerFrameConstants,
}

/// Writable outputs of one culling view.
#[derive(Debug)]
pub struct ViewOutput<'a> {
    pub uncompacted: &'a mut [UncompactedDrawArguments],
    pub filtered_indices: &'a mut [u32],
}

/// Counters of one or more filter dispatches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Triangles read from the scene.
    pub triangles_tested: u64,
    /// Triangles kept, per view.
    pub triangles_accepted: [u64; NUM_CULLING_VIEWPORTS],
}

impl FilterStats {
    /// Adds the counters of another dispatch.
    pub fn accumulate(&mut self, other: &FilterStats) {
        self.triangles_tested += other.triangles_tested;
        for (mine, theirs) in self
            .triangles_accepted
            .iter_mut()
            .zip(other.triangles_accepted.iter())
        {
            *mine += theirs;
        }
    }
}

/// Runs the filter over every batch of a dispatch.
///
/// `views` is indexed like [`PerFrameConstants::transform`]. Draw slots are
/// cleared beforehand by the clear kernel; this kernel only appends.
pub fn filter_triangles(
    batches: &[FilterBatchData],
    inputs: &FilterInputs<'_>,
    views: &mut [ViewOutput<'_>; NUM_CULLING_VIEWPORTS],
) -> Result<FilterStats, FilterError> {
    let scene = inputs.scene;
    let constants = inputs.constants;
    let flags = constants.filter_flags();
    let mut stats = FilterStats::default();

    for batch in batches {
        let mesh = scene
            .meshes
            .get(batch.mesh_index as usize)
            .ok_or(FilterError::UnknownMesh {
                mesh_index: batch.mesh_index,
                mesh_count: scene.meshes.len(),
            })?;
        let end = batch.index_offset + batch.face_count * 3;
        let indices = scene
            .indices
            .get(batch.index_offset as usize..end as usize)
            .ok_or(FilterError::IndexRange {
                start: batch.index_offset,
                end,
                len: scene.indices.len(),
            })?;

        for tri in indices.chunks_exact(3) {
            let tri = [tri[0], tri[1], tri[2]];
            let mut positions = [Vec4::ZERO; 3];
            for (slot, &index) in positions.iter_mut().zip(tri.iter()) {
                let p = scene.positions.get(index as usize).ok_or(
                    FilterError::VertexOutOfRange {
                        index,
                        vertex_count: scene.positions.len(),
                    },
                )?;
                *slot = p.extend(1.0);
            }
            stats.triangles_tested += 1;

            for (view, output) in views.iter_mut().enumerate() {
                let mvp = constants.transform[view].mvp;
                let clip = positions.map(|p| mvp * p);
                if !filter_triangle(&clip, &constants.cull_viewport[view], flags, mesh.two_sided)
                {
                    continue;
                }
                append_triangle(output, batch, mesh.material_id, tri)?;
                stats.triangles_accepted[view] += 1;
            }
        }
    }

    Ok(stats)
}

fn append_triangle(
    output: &mut ViewOutput<'_>,
    batch: &FilterBatchData,
    material_id: u32,
    tri: [u32; 3],
) -> Result<(), FilterError> {
    let len = output.uncompacted.len();
    let draw = output
        .uncompacted
        .get_mut(batch.accum_draw_index as usize)
        .ok_or(FilterError::DrawSlotOutOfRange {
            slot: batch.accum_draw_index,
            len,
        })?;

    let offset = batch.output_index_offset as u64 + draw.num_indices as u64;
    let filtered_len = output.filtered_indices.len();
    let dst = output
        .filtered_indices
        .get_mut(offset as usize..offset as usize + 3)
        .ok_or(FilterError::FilteredIndexOverflow {
            offset,
            len: filtered_len,
        })?;
    dst.copy_from_slice(&tri);

    draw.num_indices += 3;
    draw.start_index = batch.output_index_offset;
    draw.material_id = material_id;
    Ok(())
}
