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

//! Walks the compacted indirect draws of a view the way the input assembler
//! would: per geometry set, per draw, per filtered triangle.

use vbuffer_core::renderer::{
    GeometrySet, IndirectDrawIndexArguments, ResourceState, UncompactedDrawArguments,
};

use crate::error::PassError;
use crate::frame::ViewResources;

/// One triangle produced by an indirect draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawnTriangle {
    pub geometry_set: GeometrySet,
    /// Position of the draw in its geometry set's indirect buffer.
    pub draw_id: u32,
    /// Triangle within the draw.
    pub primitive_id: u32,
    /// Scene vertex indices.
    pub indices: [u32; 3],
    pub material_id: u32,
}

/// Material of a compacted draw, carried by its uncompacted slot.
#[inline]
pub(crate) fn draw_material(
    args: &IndirectDrawIndexArguments,
    uncompacted: &[UncompactedDrawArguments],
) -> u32 {
    uncompacted
        .get(args.start_instance as usize)
        .map_or(0, |slot| slot.material_id)
}

/// The filtered indices of a draw.
pub(crate) fn draw_indices<'a>(
    draw: usize,
    args: &IndirectDrawIndexArguments,
    filtered: &'a [u32],
) -> Result<&'a [u32], PassError> {
    let start = args.start_index;
    let end = start.saturating_add(args.index_count);
    filtered
        .get(start as usize..end as usize)
        .ok_or(PassError::DrawOutOfRange {
            draw,
            start,
            end,
            len: filtered.len(),
        })
}

/// Calls `visit` for every triangle of every compacted draw of `view`.
///
/// The indirect arguments must be in `INDIRECT_ARGUMENT`, the filtered
/// indices in `INDEX_BUFFER` and the uncompacted arguments in
/// `SHADER_RESOURCE` state.
pub fn for_each_drawn_triangle(
    view: &ViewResources,
    mut visit: impl FnMut(DrawnTriangle) -> Result<(), PassError>,
) -> Result<(), PassError> {
    let indirect = view.indirect.read(ResourceState::INDIRECT_ARGUMENT)?;
    let filtered = view.filtered_indices.read(ResourceState::INDEX_BUFFER)?;
    let uncompacted = view.uncompacted.read(ResourceState::SHADER_RESOURCE)?;

    for geometry_set in GeometrySet::ALL {
        let Some(buffer) = indirect.get(geometry_set.index()) else {
            continue;
        };
        for (draw, args) in buffer.draws().iter().enumerate() {
            let indices = draw_indices(draw, args, &filtered)?;
            let material_id = draw_material(args, &uncompacted);
            for (primitive_id, tri) in indices.chunks_exact(3).enumerate() {
                visit(DrawnTriangle {
                    geometry_set,
                    draw_id: draw as u32,
                    primitive_id: primitive_id as u32,
                    indices: [tri[0], tri[1], tri[2]],
                    material_id,
                })?;
            }
        }
    }
    Ok(())
}
