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

//! Records exchanged between cluster batching, triangle filtering, batch
//! compaction and the indirect geometry passes.

use serde::{Deserialize, Serialize};

use super::constants::{BATCH_COUNT, GEOMSET_COUNT, MAX_DRAWS_INDIRECT};

/// Work description for one filtering thread group: the triangles of one cluster.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FilterBatchData {
    /// Mesh the cluster belongs to.
    pub mesh_index: u32,
    /// First index of the cluster in the scene index buffer.
    pub index_offset: u32,
    /// Triangles to test.
    pub face_count: u32,
    /// First filtered index of the draw this batch contributes to.
    pub output_index_offset: u32,
    /// Position in the chunk of the first batch of the same draw.
    pub draw_batch_start: u32,
    /// Draw slot receiving the surviving triangles.
    pub accum_draw_index: u32,
}

/// Up to [`BATCH_COUNT`] batches submitted together as one filtering dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBatchChunk {
    /// Batches recorded since the last dispatch.
    pub batches: Vec<FilterBatchData>,
    /// Draws opened in this chunk since the last dispatch.
    pub current_draw_call_count: u32,
}

impl FilterBatchChunk {
    /// An empty chunk with room for [`BATCH_COUNT`] batches.
    pub fn new() -> Self {
        Self {
            batches: Vec::with_capacity(BATCH_COUNT as usize),
            current_draw_call_count: 0,
        }
    }

    /// Batches currently recorded.
    #[inline]
    pub fn current_batch_count(&self) -> u32 {
        self.batches.len() as u32
    }

    /// `true` once [`BATCH_COUNT`] batches are recorded.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.current_batch_count() >= BATCH_COUNT
    }

    /// Empties the chunk after its dispatch has been recorded.
    pub fn reset(&mut self) {
        self.batches.clear();
        self.current_draw_call_count = 0;
    }
}

impl Default for FilterBatchChunk {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-draw counters written by the filtering kernel, one buffer per view.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct UncompactedDrawArguments {
    /// Surviving indices (three per accepted triangle).
    pub num_indices: u32,
    /// First filtered index of the draw.
    pub start_index: u32,
    /// Mesh whose material the draw uses.
    pub material_id: u32,
}

/// Arguments of one indexed indirect draw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct IndirectDrawIndexArguments {
    /// Indices to draw.
    pub index_count: u32,
    /// Always 1.
    pub instance_count: u32,
    /// First index in the filtered index buffer.
    pub start_index: u32,
    /// Added to every index.
    pub vertex_offset: i32,
    /// Carries the draw id for the visibility buffer.
    pub start_instance: u32,
}

/// Compacted draws of one geometry set for one view.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectDrawBuffer {
    /// Valid entries at the front of `args`.
    pub draw_count: u32,
    /// Fixed-size argument storage, [`MAX_DRAWS_INDIRECT`] entries.
    pub args: Vec<IndirectDrawIndexArguments>,
}

impl IndirectDrawBuffer {
    /// A buffer sized for [`MAX_DRAWS_INDIRECT`] draws.
    pub fn new() -> Self {
        Self {
            draw_count: 0,
            args: vec![IndirectDrawIndexArguments::default(); MAX_DRAWS_INDIRECT as usize],
        }
    }

    /// Resets the draw count. Stale arguments past the count are ignored.
    pub fn clear(&mut self) {
        self.draw_count = 0;
    }

    /// Appends a draw, returning `false` when the buffer is full.
    pub fn push(&mut self, args: IndirectDrawIndexArguments) -> bool {
        match self.args.get_mut(self.draw_count as usize) {
            Some(slot) => {
                *slot = args;
                self.draw_count += 1;
                true
            }
            None => false,
        }
    }

    /// The valid draws.
    pub fn draws(&self) -> &[IndirectDrawIndexArguments] {
        &self.args[..self.draw_count as usize]
    }

    /// Sum of the index counts of the valid draws.
    pub fn total_indices(&self) -> u64 {
        self.draws().iter().map(|a| a.index_count as u64).sum()
    }
}

impl Default for IndirectDrawBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Geometry sets drawn with their own pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometrySet {
    /// Solid geometry, no alpha test.
    Opaque = 0,
    /// Geometry discarding texels below the alpha cutoff.
    AlphaTested = 1,
}

impl GeometrySet {
    /// Every set, in buffer order.
    pub const ALL: [GeometrySet; GEOMSET_COUNT] = [GeometrySet::Opaque, GeometrySet::AlphaTested];

    /// Buffer index of the set.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A packed visibility-buffer texel.
///
/// Bit 31 flags the alpha-tested set, bits 14..=30 hold the draw id and
/// bits 0..=13 the primitive id within the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisibilityId(pub u32);

impl VisibilityId {
    /// Texel not covered by any triangle.
    pub const EMPTY: Self = Self(u32::MAX);
    /// Primitive ids representable per draw.
    pub const MAX_PRIMITIVES: u32 = 1 << Self::DRAW_SHIFT;
    /// Draw ids representable.
    pub const MAX_DRAWS: u32 = 1 << (31 - Self::DRAW_SHIFT);

    const DRAW_SHIFT: u32 = 14;
    const PRIMITIVE_MASK: u32 = (1 << Self::DRAW_SHIFT) - 1;
    const DRAW_MASK: u32 = Self::MAX_DRAWS - 1;
    const ALPHA_BIT: u32 = 1 << 31;

    /// Packs the ids; values are masked to their bit ranges.
    #[inline]
    pub fn pack(geometry_set: GeometrySet, draw_id: u32, primitive_id: u32) -> Self {
        let alpha = match geometry_set {
            GeometrySet::Opaque => 0,
            GeometrySet::AlphaTested => Self::ALPHA_BIT,
        };
        Self(
            alpha
                | ((draw_id & Self::DRAW_MASK) << Self::DRAW_SHIFT)
                | (primitive_id & Self::PRIMITIVE_MASK),
        )
    }

    /// `true` for [`Self::EMPTY`].
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Geometry set of the texel.
    #[inline]
    pub fn geometry_set(self) -> GeometrySet {
        if self.0 & Self::ALPHA_BIT != 0 {
            GeometrySet::AlphaTested
        } else {
            GeometrySet::Opaque
        }
    }

    /// Draw id of the texel.
    #[inline]
    pub fn draw_id(self) -> u32 {
        (self.0 >> Self::DRAW_SHIFT) & Self::DRAW_MASK
    }

    /// Primitive id of the texel.
    #[inline]
    pub fn primitive_id(self) -> u32 {
        self.0 & Self::PRIMITIVE_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_id_fields_do_not_overlap() {
        let id = VisibilityId::pack(GeometrySet::AlphaTested, 1023, 16383);
        assert_eq!(id.geometry_set(), GeometrySet::AlphaTested);
        assert_eq!(id.draw_id(), 1023);
        assert_eq!(id.primitive_id(), 16383);
        assert!(!id.is_empty());

        let opaque = VisibilityId::pack(GeometrySet::Opaque, 0, 0);
        assert_eq!(opaque.0, 0);
        assert_eq!(opaque.geometry_set(), GeometrySet::Opaque);
    }

    #[test]
    fn test_indirect_buffer_is_bounded() {
        let mut buffer = IndirectDrawBuffer::new();
        for i in 0..MAX_DRAWS_INDIRECT {
            assert!(buffer.push(IndirectDrawIndexArguments {
                index_count: 3,
                instance_count: 1,
                start_instance: i,
                ..Default::default()
            }));
        }
        assert!(!buffer.push(IndirectDrawIndexArguments::default()));
        assert_eq!(buffer.total_indices(), 3 * MAX_DRAWS_INDIRECT as u64);
        buffer.clear();
        assert!(buffer.draws().is_empty());
    }

    #[test]
    fn test_chunk_fills_at_batch_count() {
        let mut chunk = FilterBatchChunk::new();
        for _ in 0..BATCH_COUNT {
            assert!(!chunk.is_full());
            chunk.batches.push(FilterBatchData::default());
        }
        assert!(chunk.is_full());
        chunk.reset();
        assert_eq!(chunk.current_batch_count(), 0);
    }
}
