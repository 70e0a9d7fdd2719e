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

//! Clear and compaction kernels around the filter.
//!
//! The filter leaves sparse per-slot counters; compaction turns every
//! non-empty slot into an indexed indirect draw of the geometry set of its
//! material.

use vbuffer_core::renderer::{
    GeometrySet, IndirectDrawBuffer, IndirectDrawIndexArguments, UncompactedDrawArguments,
    CLEAR_GROUP_COUNT, CLEAR_THREAD_COUNT, GEOMSET_COUNT,
};

use crate::error::FilterError;
use crate::gpu_scene::GpuScene;

/// Zeroes every draw slot and every indirect draw count of one view.
///
/// Runs as `CLEAR_GROUP_COUNT` groups of `CLEAR_THREAD_COUNT` threads; the
/// loop below walks the same thread ids.
pub fn clear_draw_arguments(
    uncompacted: &mut [UncompactedDrawArguments],
    indirect: &mut [IndirectDrawBuffer],
) {
    for thread_id in 0..(CLEAR_GROUP_COUNT * CLEAR_THREAD_COUNT) as usize {
        if let Some(slot) = uncompacted.get_mut(thread_id) {
            *slot = UncompactedDrawArguments::default();
        }
    }
    for buffer in indirect {
        buffer.clear();
    }
}

/// Counts written by one compaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Draws appended, per geometry set.
    pub draws: [u32; GEOMSET_COUNT],
    /// Indices appended, per geometry set.
    pub indices: [u64; GEOMSET_COUNT],
}

/// Appends one indirect draw per non-empty slot of one view.
///
/// Slots are visited in order, so draws of a geometry set keep the relative
/// order they were recorded in. `start_instance` carries the slot index.
pub fn compact_batches(
    scene: &GpuScene,
    uncompacted: &[UncompactedDrawArguments],
    indirect: &mut [IndirectDrawBuffer],
) -> Result<CompactionStats, FilterError> {
    let mut stats = CompactionStats::default();
    for (slot, draw) in uncompacted.iter().enumerate() {
        if draw.num_indices == 0 {
            continue;
        }
        let set = scene
            .material(draw.material_id)
            .map(|m| m.geometry_set())
            .unwrap_or(GeometrySet::Opaque)
            .index();
        let buffer = indirect
            .get_mut(set)
            .ok_or(FilterError::IndirectBufferFull { geometry_set: set })?;
        let pushed = buffer.push(IndirectDrawIndexArguments {
            index_count: draw.num_indices,
            instance_count: 1,
            start_index: draw.start_index,
            vertex_offset: 0,
            start_instance: slot as u32,
        });
        if !pushed {
            return Err(FilterError::IndirectBufferFull { geometry_set: set });
        }
        stats.draws[set] += 1;
        stats.indices[set] += draw.num_indices as u64;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::math::{Aabb, Vec3};
    use vbuffer_core::renderer::MAX_DRAWS_INDIRECT;
    use vbuffer_data::Material;

    fn scene() -> GpuScene {
        let leaves = Material {
            alpha_tested: true,
            two_sided: true,
            ..Material::solid("Leaves", Vec3::Y)
        };
        GpuScene {
            positions: Vec::new(),
            normals: Vec::new(),
            texcoords: Vec::new(),
            indices: Vec::new(),
            meshes: Vec::new(),
            materials: vec![Material::solid("Stone", Vec3::ONE), leaves],
            lights: Vec::new(),
            bounds: Aabb::from_min_max(Vec3::ZERO, Vec3::ONE),
        }
    }

    #[test]
    fn test_clear_resets_slots_and_counts() {
        let mut uncompacted = vec![
            UncompactedDrawArguments {
                num_indices: 9,
                start_index: 3,
                material_id: 1
            };
            MAX_DRAWS_INDIRECT as usize
        ];
        let mut indirect = vec![IndirectDrawBuffer::new(); GEOMSET_COUNT];
        indirect[1].push(IndirectDrawIndexArguments::default());
        clear_draw_arguments(&mut uncompacted, &mut indirect);
        assert!(uncompacted.iter().all(|u| u.num_indices == 0));
        assert!(indirect.iter().all(|b| b.draw_count == 0));
    }

    #[test]
    fn test_compaction_skips_empty_slots_and_splits_sets() {
        let scene = scene();
        let mut uncompacted = vec![UncompactedDrawArguments::default(); 8];
        uncompacted[1] = UncompactedDrawArguments {
            num_indices: 6,
            start_index: 0,
            material_id: 0,
        };
        uncompacted[4] = UncompactedDrawArguments {
            num_indices: 3,
            start_index: 30,
            material_id: 1,
        };
        uncompacted[6] = UncompactedDrawArguments {
            num_indices: 12,
            start_index: 60,
            material_id: 0,
        };
        let mut indirect = vec![IndirectDrawBuffer::new(); GEOMSET_COUNT];
        let stats = compact_batches(&scene, &uncompacted, &mut indirect).unwrap();

        assert_eq!(stats.draws, [2, 1]);
        assert_eq!(stats.indices, [18, 3]);
        let opaque = indirect[GeometrySet::Opaque.index()].draws();
        assert_eq!(opaque.len(), 2);
        assert_eq!(opaque[0].start_instance, 1);
        assert_eq!(opaque[1].start_index, 60);
        let alpha = indirect[GeometrySet::AlphaTested.index()].draws();
        assert_eq!(alpha[0].index_count, 3);
        assert_eq!(alpha[0].instance_count, 1);
        assert_eq!(alpha[0].start_instance, 4);
        // Compacted totals match what the filter kept.
        let kept: u64 = uncompacted.iter().map(|u| u.num_indices as u64).sum();
        assert_eq!(indirect.iter().map(|b| b.total_indices()).sum::<u64>(), kept);
    }
}
