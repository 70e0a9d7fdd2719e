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

//! Batch building: packs surviving clusters into filter dispatches.
//!
//! Each surviving cluster becomes one [`FilterBatchData`] in the current
//! [`FilterBatchChunk`]. Consecutive batches of one mesh within one chunk
//! form a *draw*: they share a draw slot and write their filtered indices
//! into one contiguous range starting at the draw's `output_index_offset`.
//!
//! ```text
//! chunk 0: [A A A B B | ... ]  → draws 0 (A), 1 (B) ...  dispatched when full
//! chunk 1: [B B C ...]        → draw n (rest of B), n+1 (C)
//! ```

use vbuffer_core::renderer::{
    ClusterCompact, FilterBatchChunk, FilterBatchData, GeometrySet, GEOMSET_COUNT,
    MAX_DRAWS_INDIRECT, SMALL_BATCH_CHUNK_COUNT,
};

use crate::error::FilterError;
use crate::gpu_scene::GpuMesh;

/// One `filter_triangles` dispatch: a full (or final) chunk of batches.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDispatch {
    /// Chunk record the batches were gathered in.
    pub chunk_index: u32,
    /// One thread group per batch.
    pub batches: Vec<FilterBatchData>,
}

#[derive(Debug, Clone, Copy)]
struct OpenDraw {
    geometry_set: GeometrySet,
}

/// Accumulates batches and draws over one frame.
#[derive(Debug)]
pub struct BatchBuilder {
    chunks: Vec<FilterBatchChunk>,
    current_chunk: usize,
    accum_draw_count: u32,
    accum_num_triangles: u32,
    draw_triangle_start: u32,
    draw_batch_start: u32,
    open_draw: Option<OpenDraw>,
    draw_counts: [u32; GEOMSET_COUNT],
    dispatches: Vec<FilterDispatch>,
}

impl BatchBuilder {
    /// Creates a builder cycling through [`SMALL_BATCH_CHUNK_COUNT`] chunk records.
    pub fn new() -> Self {
        Self {
            chunks: (0..SMALL_BATCH_CHUNK_COUNT)
                .map(|_| FilterBatchChunk::new())
                .collect(),
            current_chunk: 0,
            accum_draw_count: 0,
            accum_num_triangles: 0,
            draw_triangle_start: 0,
            draw_batch_start: 0,
            open_draw: None,
            draw_counts: [0; GEOMSET_COUNT],
            dispatches: Vec::new(),
        }
    }

    /// Forgets the previous frame.
    pub fn begin_frame(&mut self) {
        for chunk in &mut self.chunks {
            chunk.reset();
        }
        self.current_chunk = 0;
        self.accum_draw_count = 0;
        self.accum_num_triangles = 0;
        self.draw_triangle_start = 0;
        self.draw_batch_start = 0;
        self.open_draw = None;
        self.draw_counts = [0; GEOMSET_COUNT];
        self.dispatches.clear();
    }

    /// Draws opened so far, including an open one.
    pub fn draw_count(&self) -> u32 {
        self.accum_draw_count + u32::from(self.open_draw.is_some())
    }

    /// Triangles of every cluster added so far.
    pub fn triangle_count(&self) -> u32 {
        self.accum_num_triangles
    }

    /// Appends a surviving cluster of `mesh` to the current chunk.
    ///
    /// Opens a draw if none is open, and dispatches the chunk once it holds
    /// `BATCH_COUNT` batches.
    pub fn add_cluster_to_batch_chunk(
        &mut self,
        mesh_index: u32,
        mesh: &GpuMesh,
        compact: &ClusterCompact,
    ) -> Result<(), FilterError> {
        if self.open_draw.is_none() {
            if self.accum_draw_count >= MAX_DRAWS_INDIRECT {
                return Err(FilterError::TooManyDraws {
                    requested: self.accum_draw_count + 1,
                    max: MAX_DRAWS_INDIRECT,
                });
            }
            self.open_draw = Some(OpenDraw {
                geometry_set: mesh.geometry_set,
            });
        }

        let chunk = &mut self.chunks[self.current_chunk];
        chunk.batches.push(FilterBatchData {
            mesh_index,
            index_offset: mesh.start_index + compact.cluster_start * 3,
            face_count: compact.triangle_count,
            output_index_offset: self.draw_triangle_start * 3,
            draw_batch_start: self.draw_batch_start,
            accum_draw_index: self.accum_draw_count,
        });
        self.accum_num_triangles += compact.triangle_count;

        if chunk.is_full() {
            self.close_draw();
            self.dispatch_current();
        }
        Ok(())
    }

    /// Closes the draw of the mesh that just ended, if any.
    pub fn end_mesh(&mut self) {
        if self.open_draw.is_some() {
            self.close_draw();
            self.draw_batch_start = self.chunks[self.current_chunk].current_batch_count();
        }
    }

    /// Dispatches the last partial chunk and returns every dispatch of the frame.
    pub fn finish(&mut self) -> BatchOutput {
        self.end_mesh();
        if self.chunks[self.current_chunk].current_batch_count() > 0 {
            self.dispatch_current();
        }
        BatchOutput {
            dispatches: std::mem::take(&mut self.dispatches),
            draw_count: self.accum_draw_count,
            draw_counts: self.draw_counts,
            triangle_count: self.accum_num_triangles,
        }
    }

    fn close_draw(&mut self) {
        if let Some(draw) = self.open_draw.take() {
            self.accum_draw_count += 1;
            self.draw_counts[draw.geometry_set.index()] += 1;
        }
        self.draw_triangle_start = self.accum_num_triangles;
    }

    fn dispatch_current(&mut self) {
        let chunk = &mut self.chunks[self.current_chunk];
        let batches = std::mem::take(&mut chunk.batches);
        chunk.reset();
        log::trace!(
            "Filter dispatch: chunk {} with {} batches",
            self.current_chunk,
            batches.len()
        );
        self.dispatches.push(FilterDispatch {
            chunk_index: self.current_chunk as u32,
            batches,
        });
        self.current_chunk = (self.current_chunk + 1) % self.chunks.len();
        self.draw_batch_start = 0;
    }
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Batches and draw accounting of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    /// Filter dispatches in recording order.
    pub dispatches: Vec<FilterDispatch>,
    /// Draw slots used.
    pub draw_count: u32,
    /// Draws per geometry set.
    pub draw_counts: [u32; GEOMSET_COUNT],
    /// Triangles submitted to the filter.
    pub triangle_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::{BATCH_COUNT, CLUSTER_SIZE};

    fn mesh(start_index: u32, clusters: u32, set: GeometrySet) -> GpuMesh {
        GpuMesh {
            start_index,
            index_count: clusters * CLUSTER_SIZE * 3,
            material_id: 0,
            geometry_set: set,
            two_sided: false,
        }
    }

    fn compact(i: u32) -> ClusterCompact {
        ClusterCompact {
            triangle_count: CLUSTER_SIZE,
            cluster_start: i * CLUSTER_SIZE,
        }
    }

    #[test]
    fn test_draw_per_mesh_within_one_chunk() {
        let a = mesh(0, 3, GeometrySet::Opaque);
        let b = mesh(a.index_count, 2, GeometrySet::AlphaTested);
        let mut builder = BatchBuilder::new();
        builder.begin_frame();
        for i in 0..3 {
            builder.add_cluster_to_batch_chunk(0, &a, &compact(i)).unwrap();
        }
        builder.end_mesh();
        for i in 0..2 {
            builder.add_cluster_to_batch_chunk(1, &b, &compact(i)).unwrap();
        }
        builder.end_mesh();
        let out = builder.finish();

        assert_eq!(out.dispatches.len(), 1);
        assert_eq!(out.draw_count, 2);
        assert_eq!(out.draw_counts, [1, 1]);
        let batches = &out.dispatches[0].batches;
        assert_eq!(batches.len(), 5);
        assert!(batches[..3].iter().all(|b| b.accum_draw_index == 0
            && b.output_index_offset == 0
            && b.draw_batch_start == 0));
        assert!(batches[3..].iter().all(|b| b.accum_draw_index == 1
            && b.output_index_offset == 3 * 3 * CLUSTER_SIZE
            && b.draw_batch_start == 3));
        assert_eq!(batches[3].index_offset, a.index_count);
        assert_eq!(batches[4].index_offset, a.index_count + CLUSTER_SIZE * 3);
    }

    #[test]
    fn test_full_chunk_splits_the_draw() {
        let big = mesh(0, BATCH_COUNT + 4, GeometrySet::Opaque);
        let mut builder = BatchBuilder::new();
        builder.begin_frame();
        for i in 0..BATCH_COUNT + 4 {
            builder.add_cluster_to_batch_chunk(0, &big, &compact(i)).unwrap();
        }
        builder.end_mesh();
        let out = builder.finish();

        assert_eq!(out.dispatches.len(), 2);
        assert_eq!(out.dispatches[0].batches.len(), BATCH_COUNT as usize);
        assert_eq!(out.dispatches[1].chunk_index, 1);
        assert_eq!(out.draw_count, 2);
        let tail = &out.dispatches[1].batches[0];
        assert_eq!(tail.accum_draw_index, 1);
        assert_eq!(tail.draw_batch_start, 0);
        assert_eq!(tail.output_index_offset, BATCH_COUNT * CLUSTER_SIZE * 3);
        assert_eq!(out.triangle_count, (BATCH_COUNT + 4) * CLUSTER_SIZE);
    }

    #[test]
    fn test_mesh_without_survivors_opens_no_draw() {
        let a = mesh(0, 1, GeometrySet::Opaque);
        let mut builder = BatchBuilder::new();
        builder.begin_frame();
        builder.add_cluster_to_batch_chunk(0, &a, &compact(0)).unwrap();
        builder.end_mesh();
        // Every cluster of the next mesh was culled.
        builder.end_mesh();
        let out = builder.finish();
        assert_eq!(out.draw_count, 1);
    }

    #[test]
    fn test_draw_slots_are_bounded() {
        let one = GpuMesh {
            index_count: 3,
            ..mesh(0, 0, GeometrySet::Opaque)
        };
        let tiny = ClusterCompact {
            triangle_count: 1,
            cluster_start: 0,
        };
        let mut builder = BatchBuilder::new();
        builder.begin_frame();
        for _ in 0..MAX_DRAWS_INDIRECT {
            builder.add_cluster_to_batch_chunk(0, &one, &tiny).unwrap();
            builder.end_mesh();
        }
        assert_eq!(builder.draw_count(), MAX_DRAWS_INDIRECT);
        let err = builder
            .add_cluster_to_batch_chunk(0, &one, &tiny)
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::TooManyDraws {
                requested: MAX_DRAWS_INDIRECT + 1,
                max: MAX_DRAWS_INDIRECT
            }
        );
    }
}
