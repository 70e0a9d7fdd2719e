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

//! Shadow pass lane - depth of both geometry sets from the sun's view.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::renderer::{PerFrameConstants, VIEW_SHADOW};

use super::raster::{rasterize_triangle, CullMode, Viewport};
use super::{alpha_discarded, fetch, targets_mut, Image, PassInputs, DEPTH_CLEAR};
use crate::error::PassError;
use crate::frame::FrameResources;
use crate::gpu_scene::GpuScene;

/// Rasterizes the shadow view's indirect draws into `shadow_depth`.
///
/// Returns the number of depth writes.
pub fn render_shadow_map(
    scene: &GpuScene,
    frame: &FrameResources,
    constants: &PerFrameConstants,
    shadow_depth: &mut Image<f32>,
) -> Result<u64, PassError> {
    shadow_depth.fill(DEPTH_CLEAR);
    let mvp = constants.transform[VIEW_SHADOW].mvp;
    let viewport = Viewport::new(shadow_depth.width(), shadow_depth.height());
    let mut writes = 0u64;

    super::for_each_drawn_triangle(&frame.views[VIEW_SHADOW], |triangle| {
        let positions = fetch(&scene.positions, triangle.indices)?;
        let uvs = fetch(&scene.texcoords, triangle.indices)?;
        let clip = positions.map(|p| mvp * p.extend(1.0));
        let cull = match scene.material(triangle.material_id) {
            Some(m) if m.two_sided => CullMode::None,
            _ => CullMode::Back,
        };
        rasterize_triangle(clip, viewport, cull, |fragment| {
            let Some(depth) = shadow_depth.get_mut(fragment.x, fragment.y) else {
                return;
            };
            if fragment.depth >= *depth {
                return;
            }
            let uv = fragment.interpolate(uvs);
            if alpha_discarded(scene, triangle.geometry_set, triangle.material_id, uv) {
                return;
            }
            *depth = fragment.depth;
            writes += 1;
        });
        Ok(())
    })?;
    Ok(writes)
}

/// A rendering lane producing the sun's shadow map.
#[derive(Debug, Default)]
pub struct ShadowPassLane;

impl ShadowPassLane {
    /// Registry name.
    pub const NAME: &'static str = "ShadowPass";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for ShadowPassLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Shadow
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let writes = render_shadow_map(
            &inputs.scene,
            &inputs.frame,
            &inputs.constants,
            &mut targets.shadow_depth,
        )?;
        log::trace!("Shadow pass: {writes} depth writes");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::test_support::*;
    use crate::render_lane::RenderTargets;

    #[test]
    fn test_floor_lands_in_shadow_map() {
        let scene = floor_scene();
        let settings = settings();
        let frame = drawable_frame(&scene, &settings);
        let mut ctx = context(scene, frame, &settings);
        ShadowPassLane::new().execute(&mut ctx).unwrap();

        let targets = ctx.get::<RenderTargets>().unwrap();
        let covered = targets
            .shadow_depth
            .pixels()
            .iter()
            .filter(|&&d| d < DEPTH_CLEAR)
            .count();
        // The projection is fitted to the floor, so it fills most of the map.
        assert!(covered > 64 * 64 / 4, "only {covered} texels covered");
        assert!(targets.shadow_depth.pixels().iter().all(|d| (0.0..=1.0).contains(d)));
    }

    #[test]
    fn test_missing_targets_is_a_context_error() {
        let scene = floor_scene();
        let settings = settings();
        let frame = drawable_frame(&scene, &settings);
        let mut ctx = context(scene, frame, &settings);
        ctx.remove::<RenderTargets>();
        assert!(matches!(
            ShadowPassLane::new().execute(&mut ctx),
            Err(LaneError::InvalidContext { .. })
        ));
    }
}
