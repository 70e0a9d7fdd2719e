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

//! Visibility-buffer pass lane - rasterizes triangle ids and depth.
//!
//! Each covered pixel stores only a [`VisibilityId`]: the geometry set, the
//! draw's position in that set's indirect buffer and the triangle within the
//! draw. Attributes are fetched later by the shading pass.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::renderer::{PerFrameConstants, VisibilityId, VIEW_CAMERA};

use super::raster::{rasterize_triangle, CullMode, Viewport};
use super::{alpha_discarded, fetch, targets_mut, PassInputs, RenderTargets, DEPTH_CLEAR};
use crate::error::PassError;
use crate::frame::FrameResources;
use crate::gpu_scene::GpuScene;

/// Fills `targets.visibility` and `targets.depth` from the camera view's
/// indirect draws. Returns the number of covered pixels.
pub fn render_visibility_buffer(
    scene: &GpuScene,
    frame: &FrameResources,
    constants: &PerFrameConstants,
    targets: &mut RenderTargets,
) -> Result<u64, PassError> {
    targets.depth.fill(DEPTH_CLEAR);
    targets.visibility.fill(VisibilityId::EMPTY);
    let mvp = constants.transform[VIEW_CAMERA].mvp;
    let viewport = Viewport::new(targets.depth.width(), targets.depth.height());
    let RenderTargets {
        depth, visibility, ..
    } = targets;

    super::for_each_drawn_triangle(&frame.views[VIEW_CAMERA], |triangle| {
        let positions = fetch(&scene.positions, triangle.indices)?;
        let uvs = fetch(&scene.texcoords, triangle.indices)?;
        let clip = positions.map(|p| mvp * p.extend(1.0));
        let cull = match scene.material(triangle.material_id) {
            Some(m) if m.two_sided => CullMode::None,
            _ => CullMode::Back,
        };
        let id = VisibilityId::pack(triangle.geometry_set, triangle.draw_id, triangle.primitive_id);

        rasterize_triangle(clip, viewport, cull, |fragment| {
            let Some(z) = depth.get_mut(fragment.x, fragment.y) else {
                return;
            };
            if fragment.depth >= *z {
                return;
            }
            let uv = fragment.interpolate(uvs);
            if alpha_discarded(scene, triangle.geometry_set, triangle.material_id, uv) {
                return;
            }
            *z = fragment.depth;
            if let Some(texel) = visibility.get_mut(fragment.x, fragment.y) {
                *texel = id;
            }
        });
        Ok(())
    })?;

    Ok(visibility.pixels().iter().filter(|id| !id.is_empty()).count() as u64)
}

/// A rendering lane writing the visibility buffer.
#[derive(Debug, Default)]
pub struct VisibilityBufferPassLane;

impl VisibilityBufferPassLane {
    /// Registry name.
    pub const NAME: &'static str = "VisibilityBufferPass";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for VisibilityBufferPassLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let covered = render_visibility_buffer(&inputs.scene, &inputs.frame, &inputs.constants, targets)?;
        log::trace!("Visibility buffer pass: {covered} pixels covered");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
