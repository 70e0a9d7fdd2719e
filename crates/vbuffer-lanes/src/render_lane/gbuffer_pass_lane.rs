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

//! G-buffer pass lane - the deferred path's attribute rasterization.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::Vec4;
use vbuffer_core::renderer::{PerFrameConstants, VIEW_CAMERA};

use super::raster::{rasterize_triangle, CullMode, Viewport};
use super::{alpha_discarded, fetch, targets_mut, PassInputs, RenderTargets, DEPTH_CLEAR};
use crate::error::PassError;
use crate::frame::FrameResources;
use crate::gpu_scene::GpuScene;

/// Rasterizes albedo, normal, specular and depth of the camera view's
/// indirect draws. Returns the number of covered pixels.
pub fn render_gbuffer(
    scene: &GpuScene,
    frame: &FrameResources,
    constants: &PerFrameConstants,
    targets: &mut RenderTargets,
) -> Result<u64, PassError> {
    let view = constants.transform[VIEW_CAMERA];
    let camera_position = constants.camera_position.truncate();
    let viewport = Viewport::new(targets.depth.width(), targets.depth.height());
    let RenderTargets {
        depth,
        gbuffer_albedo,
        gbuffer_normal,
        gbuffer_specular,
        ..
    } = targets;
    depth.fill(DEPTH_CLEAR);
    gbuffer_albedo.fill(Vec4::ZERO);
    gbuffer_normal.fill(Vec4::ZERO);
    gbuffer_specular.fill(Vec4::ZERO);

    super::for_each_drawn_triangle(&frame.views[VIEW_CAMERA], |triangle| {
        let positions = fetch(&scene.positions, triangle.indices)?;
        let normals = fetch(&scene.normals, triangle.indices)?;
        let uvs = fetch(&scene.texcoords, triangle.indices)?;
        let Some(material) = scene.material(triangle.material_id) else {
            return Ok(());
        };
        let clip = positions.map(|p| view.mvp * p.extend(1.0));
        let cull = if material.two_sided {
            CullMode::None
        } else {
            CullMode::Back
        };
        let world = super::world_positions(scene, triangle.indices)?;

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

            let mut normal = fragment.interpolate(normals).normalize();
            if material.two_sided && normal.dot(camera_position - fragment.interpolate(world)) < 0.0 {
                normal = -normal;
            }
            let albedo = material.albedo_at(uv);
            let (x, y) = (fragment.x, fragment.y);
            if let Some(texel) = gbuffer_albedo.get_mut(x, y) {
                *texel = albedo.truncate().extend(1.0);
            }
            if let Some(texel) = gbuffer_normal.get_mut(x, y) {
                *texel = normal.extend(0.0);
            }
            if let Some(texel) = gbuffer_specular.get_mut(x, y) {
                *texel = Vec4::new(material.specular, material.roughness, 0.0, 0.0);
            }
        });
        Ok(())
    })?;

    Ok(gbuffer_albedo.pixels().iter().filter(|a| a.w > 0.0).count() as u64)
}

/// A rendering lane filling the G-buffer.
#[derive(Debug, Default)]
pub struct GBufferPassLane;

impl GBufferPassLane {
    /// Registry name.
    pub const NAME: &'static str = "GBufferPass";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for GBufferPassLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let covered = render_gbuffer(&inputs.scene, &inputs.frame, &inputs.constants, targets)?;
        log::trace!("G-buffer pass: {covered} pixels covered");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
