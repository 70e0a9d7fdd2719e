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

//! Per-frame-slot GPU buffers.
//!
//! One [`FrameResources`] exists per frame in flight. The compute work of a
//! frame writes into it, the graphics work of the same frame reads from it,
//! and the CPU only rewrites its constants and batch upload buffer once the
//! fences guarding the slot have signalled.

use vbuffer_core::renderer::{
    FilterBatchData, ResourceError, IndirectDrawBuffer, PerFrameConstants, ResourceState, TrackedBuffer,
    UncompactedDrawArguments, GEOMSET_COUNT, LIGHT_CLUSTER_COUNT, LIGHT_COUNT,
    MAX_DRAWS_INDIRECT, NUM_CULLING_VIEWPORTS,
};

/// Filter outputs of one culling view.
#[derive(Debug)]
pub struct ViewResources {
    /// Per-draw-slot counters written by the filter, `MAX_DRAWS_INDIRECT` entries.
    pub uncompacted: TrackedBuffer<UncompactedDrawArguments>,
    /// Surviving triangle indices, room for every scene triangle.
    pub filtered_indices: TrackedBuffer<u32>,
    /// Compacted draws, one entry per geometry set.
    pub indirect: TrackedBuffer<IndirectDrawBuffer>,
}

impl ViewResources {
    fn new(label: &str, max_filtered_indices: usize) -> Self {
        Self {
            uncompacted: TrackedBuffer::filled(
                format!("{label} uncompacted draw args"),
                MAX_DRAWS_INDIRECT as usize,
                UncompactedDrawArguments::default(),
                ResourceState::SHADER_RESOURCE,
            ),
            filtered_indices: TrackedBuffer::filled(
                format!("{label} filtered indices"),
                max_filtered_indices,
                0,
                ResourceState::UNORDERED_ACCESS,
            ),
            indirect: TrackedBuffer::filled(
                format!("{label} indirect draw args"),
                GEOMSET_COUNT,
                IndirectDrawBuffer::new(),
                ResourceState::UNORDERED_ACCESS,
            ),
        }
    }
}

/// All buffers of one frame slot.
#[derive(Debug)]
pub struct FrameResources {
    /// Slot index, `frame_count % data_buffer_count`.
    pub slot: usize,
    /// Per-frame constants, a single element.
    pub constants: TrackedBuffer<PerFrameConstants>,
    /// Batches uploaded for the filter dispatches of the frame.
    pub filter_batches: TrackedBuffer<FilterBatchData>,
    /// Outputs per culling view.
    pub views: [ViewResources; NUM_CULLING_VIEWPORTS],
    /// Lights binned into each screen tile.
    pub light_cluster_counts: TrackedBuffer<u32>,
    /// Light ids per tile, `LIGHT_COUNT` entries per tile.
    pub light_clusters: TrackedBuffer<u32>,
}

impl FrameResources {
    /// Allocates the buffers of slot `slot` for a scene of `total_triangles`
    /// split into at most `max_batches` clusters.
    pub fn new(slot: usize, total_triangles: u32, max_batches: usize) -> Self {
        let max_filtered_indices = total_triangles as usize * 3;
        Self {
            slot,
            constants: TrackedBuffer::filled(
                format!("frame {slot} constants"),
                1,
                PerFrameConstants::default(),
                ResourceState::SHADER_RESOURCE,
            ),
            filter_batches: TrackedBuffer::filled(
                format!("frame {slot} filter batches"),
                max_batches,
                FilterBatchData::default(),
                ResourceState::SHADER_RESOURCE,
            ),
            views: [
                ViewResources::new(&format!("frame {slot} shadow"), max_filtered_indices),
                ViewResources::new(&format!("frame {slot} camera"), max_filtered_indices),
            ],
            light_cluster_counts: TrackedBuffer::filled(
                format!("frame {slot} light cluster counts"),
                LIGHT_CLUSTER_COUNT as usize,
                0,
                ResourceState::UNORDERED_ACCESS,
            ),
            light_clusters: TrackedBuffer::filled(
                format!("frame {slot} light clusters"),
                (LIGHT_COUNT * LIGHT_CLUSTER_COUNT) as usize,
                0,
                ResourceState::UNORDERED_ACCESS,
            ),
        }
    }

    /// Copy of the per-frame constants, read in `usage` state.
    pub fn read_constants(&self, usage: ResourceState) -> Result<PerFrameConstants, ResourceError> {
        let constants = self.constants.read(usage)?;
        constants
            .first()
            .copied()
            .ok_or_else(|| ResourceError::OutOfBounds {
                label: self.constants.label().to_string(),
                index: 0,
                len: 0,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::VIEW_CAMERA;

    #[test]
    fn test_buffers_are_sized_for_the_scene() {
        let frame = FrameResources::new(1, 100, 7);
        assert_eq!(frame.views[VIEW_CAMERA].filtered_indices.len().unwrap(), 300);
        assert_eq!(
            frame.views[VIEW_CAMERA].uncompacted.len().unwrap(),
            MAX_DRAWS_INDIRECT as usize
        );
        assert_eq!(frame.views[0].indirect.len().unwrap(), GEOMSET_COUNT);
        assert_eq!(frame.filter_batches.len().unwrap(), 7);
        assert_eq!(
            frame.light_clusters.len().unwrap(),
            (LIGHT_COUNT * LIGHT_CLUSTER_COUNT) as usize
        );
        assert!(frame.views[0].uncompacted.label().contains("shadow"));
        assert_eq!(
            frame.views[0].uncompacted.state().unwrap(),
            ResourceState::SHADER_RESOURCE
        );
    }
}
