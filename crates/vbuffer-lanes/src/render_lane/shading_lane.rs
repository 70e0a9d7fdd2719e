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

//! Shading lanes - resolve the visibility buffer or the G-buffer into HDR
//! radiance.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::{Mat4, Vec3, Vec4};
use vbuffer_core::renderer::{
    IndirectDrawBuffer, PerFrameConstants, ResourceState, UncompactedDrawArguments,
    VisibilityId, VIEW_CAMERA,
};

use super::draws::{draw_indices, draw_material};
use super::raster::Viewport;
use super::shading::{ray_barycentrics, ShadingInputs, SurfaceSample, BACKGROUND_COLOR};
use super::{fetch, targets_mut, world_positions, PassInputs, RenderTargets, DEPTH_CLEAR};
use crate::error::PassError;
use crate::frame::FrameResources;
use crate::gpu_scene::GpuScene;

/// Inverse camera view-projection, clip space to world space.
pub(super) fn inverse_camera(constants: &PerFrameConstants) -> Result<Mat4, PassError> {
    let camera = constants.transform[VIEW_CAMERA];
    (camera.projection * camera.view)
        .inverse()
        .ok_or(PassError::SingularCamera)
}

#[inline]
pub(super) fn unproject(inverse_view_projection: &Mat4, x: f32, y: f32, depth: f32) -> Vec3 {
    let p = *inverse_view_projection * Vec4::new(x, y, depth, 1.0);
    p.truncate() / p.w
}

/// Runs `surface_at` and the lighting over every pixel of the camera targets with the light
/// clusters mapped when point lights are on.
fn shade_pixels(
    scene: &GpuScene,
    frame: &FrameResources,
    constants: &PerFrameConstants,
    targets: &mut RenderTargets,
    mut surface_at: impl FnMut(u32, u32, &RenderTargets) -> Result<Option<SurfaceSample>, PassError>,
) -> Result<u64, PassError> {
    let local_lights = constants.render_local_lights != 0;
    let counts = if local_lights {
        Some(frame.light_cluster_counts.read(ResourceState::SHADER_RESOURCE)?)
    } else {
        None
    };
    let ids = if local_lights {
        Some(frame.light_clusters.read(ResourceState::SHADER_RESOURCE)?)
    } else {
        None
    };

    let (width, height) = targets.size();
    let mut colors = Vec::with_capacity(width as usize * height as usize);
    let mut lit = 0u64;
    {
        let inputs = ShadingInputs::new(
            constants,
            &targets.shadow_depth,
            &scene.lights,
            counts.as_deref().zip(ids.as_deref()),
            (width, height),
        );
        for y in 0..height {
            for x in 0..width {
                let color = match surface_at(x, y, targets)? {
                    Some(surface) => {
                        lit += 1;
                        let ao = targets.ao.get(x, y).unwrap_or(1.0);
                        inputs.shade(x, y, &surface, ao)
                    }
                    None => BACKGROUND_COLOR,
                };
                colors.push(color);
            }
        }
    }
    for (texel, color) in targets.hdr.pixels_mut().iter_mut().zip(colors) {
        *texel = color;
    }
    Ok(lit)
}

/// Rebuilds the surface behind a visibility-buffer texel.
struct VisibilityResolver<'a> {
    scene: &'a GpuScene,
    indirect: &'a [IndirectDrawBuffer],
    filtered: &'a [u32],
    uncompacted: &'a [UncompactedDrawArguments],
    inverse_view_projection: Mat4,
    eye: Vec3,
    viewport: Viewport,
}

impl VisibilityResolver<'_> {
    fn resolve(&self, x: u32, y: u32, id: VisibilityId) -> Result<SurfaceSample, PassError> {
        let stale = || PassError::StaleVisibilityId(id.0);
        let draw = id.draw_id() as usize;
        let args = self
            .indirect
            .get(id.geometry_set().index())
            .and_then(|buffer| buffer.draws().get(draw))
            .ok_or_else(stale)?;
        let indices = draw_indices(draw, args, self.filtered)?;
        let first = id.primitive_id() as usize * 3;
        let triangle = indices.get(first..first + 3).ok_or_else(stale)?;
        let triangle = [triangle[0], triangle[1], triangle[2]];
        let material = self
            .scene
            .material(draw_material(args, self.uncompacted))
            .ok_or_else(stale)?;

        let world = world_positions(self.scene, triangle)?;
        let ndc = self.viewport.pixel_center_ndc(x, y);
        let far = unproject(&self.inverse_view_projection, ndc.x, ndc.y, 1.0);
        let ray = (far - self.eye).normalize();
        let w = ray_barycentrics(self.eye, ray, world);
        let interpolate = |v: [Vec3; 3]| v[0] * w.x + v[1] * w.y + v[2] * w.z;

        let position = interpolate(world);
        let mut normal = interpolate(fetch(&self.scene.normals, triangle)?).normalize();
        if material.two_sided && normal.dot(self.eye - position) < 0.0 {
            normal = -normal;
        }
        let uvs = fetch(&self.scene.texcoords, triangle)?;
        let uv = uvs[0] * w.x + uvs[1] * w.y + uvs[2] * w.z;
        Ok(SurfaceSample {
            position,
            normal,
            albedo: material.albedo_at(uv).truncate(),
            specular: material.specular,
            roughness: material.roughness,
        })
    }
}

/// Shades the visibility buffer into `targets.hdr`.
///
/// The camera view's indirect arguments and filtered indices are read as
/// shader resources to find each texel's triangle; attributes are fetched
/// from the scene streams and interpolated at the pixel centre.
pub fn shade_visibility_buffer(
    scene: &GpuScene,
    frame: &FrameResources,
    constants: &PerFrameConstants,
    targets: &mut RenderTargets,
) -> Result<u64, PassError> {
    let view = &frame.views[VIEW_CAMERA];
    let indirect = view.indirect.read(ResourceState::SHADER_RESOURCE)?;
    let filtered = view.filtered_indices.read(ResourceState::SHADER_RESOURCE)?;
    let uncompacted = view.uncompacted.read(ResourceState::SHADER_RESOURCE)?;
    let (width, height) = targets.size();
    let resolver = VisibilityResolver {
        scene,
        indirect: &indirect,
        filtered: &filtered,
        uncompacted: &uncompacted,
        inverse_view_projection: inverse_camera(constants)?,
        eye: constants.camera_position.truncate(),
        viewport: Viewport::new(width, height),
    };

    shade_pixels(scene, frame, constants, targets, |x, y, targets| {
        match targets.visibility.get(x, y) {
            Some(id) if !id.is_empty() => resolver.resolve(x, y, id).map(Some),
            _ => Ok(None),
        }
    })
}

/// Shades the G-buffer into `targets.hdr`, positions rebuilt from depth.
pub fn shade_gbuffer(
    scene: &GpuScene,
    frame: &FrameResources,
    constants: &PerFrameConstants,
    targets: &mut RenderTargets,
) -> Result<u64, PassError> {
    let inverse_view_projection = inverse_camera(constants)?;
    let viewport = Viewport::new(targets.depth.width(), targets.depth.height());

    shade_pixels(scene, frame, constants, targets, |x, y, targets| {
        let (Some(albedo), Some(depth)) = (targets.gbuffer_albedo.get(x, y), targets.depth.get(x, y))
        else {
            return Ok(None);
        };
        if albedo.w <= 0.0 || depth >= DEPTH_CLEAR {
            return Ok(None);
        }
        let normal = targets.gbuffer_normal.get(x, y).unwrap_or(Vec4::Y);
        let specular = targets.gbuffer_specular.get(x, y).unwrap_or(Vec4::ZERO);
        let ndc = viewport.pixel_center_ndc(x, y);
        Ok(Some(SurfaceSample {
            position: unproject(&inverse_view_projection, ndc.x, ndc.y, depth),
            normal: normal.truncate().normalize(),
            albedo: albedo.truncate(),
            specular: specular.x,
            roughness: specular.y,
        }))
    })
}

/// A rendering lane shading the visibility buffer.
#[derive(Debug, Default)]
pub struct VisibilityBufferShadeLane;

impl VisibilityBufferShadeLane {
    /// Registry name.
    pub const NAME: &'static str = "VisibilityBufferShade";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for VisibilityBufferShadeLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let lit = shade_visibility_buffer(&inputs.scene, &inputs.frame, &inputs.constants, targets)?;
        log::trace!("Visibility buffer shading: {lit} pixels lit");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A rendering lane shading the G-buffer.
#[derive(Debug, Default)]
pub struct DeferredShadeLane;

impl DeferredShadeLane {
    /// Registry name.
    pub const NAME: &'static str = "DeferredShade";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for DeferredShadeLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let lit = shade_gbuffer(&inputs.scene, &inputs.frame, &inputs.constants, targets)?;
        log::trace!("Deferred shading: {lit} pixels lit");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_lane::{clear_light_clusters, compute_light_clusters};
    use crate::render_lane::test_support::*;
    use crate::render_lane::{
        AmbientOcclusionLane, GBufferPassLane, Image, ShadowPassLane, VisibilityBufferPassLane,
    };
    use std::sync::Arc;

    fn run(ctx: &mut LaneContext, lanes: &[&dyn Lane]) {
        for lane in lanes {
            lane.execute(ctx).unwrap();
        }
    }

    fn hdr(ctx: &LaneContext) -> Image<Vec3> {
        ctx.get::<RenderTargets>().unwrap().hdr.clone()
    }

    #[test]
    fn test_visibility_and_deferred_paths_agree() {
        let scene = floor_scene();
        let settings = settings();
        let frame = drawable_frame(&scene, &settings);

        let mut vb = context(scene.clone(), frame.clone(), &settings);
        run(
            &mut vb,
            &[&ShadowPassLane, &VisibilityBufferPassLane, &AmbientOcclusionLane, &VisibilityBufferShadeLane],
        );
        let mut deferred = context(scene, frame, &settings);
        run(
            &mut deferred,
            &[&ShadowPassLane, &GBufferPassLane, &AmbientOcclusionLane, &DeferredShadeLane],
        );

        let (a, b) = (hdr(&vb), hdr(&deferred));
        let centre_a = a.get(16, 8).unwrap();
        let centre_b = b.get(16, 8).unwrap();
        assert!((centre_a - centre_b).length() < 1e-2 * centre_a.length().max(1.0));
        assert_ne!(centre_a, BACKGROUND_COLOR);
        assert_eq!(a.get(16, 0).unwrap(), BACKGROUND_COLOR);
        assert_eq!(b.get(16, 0).unwrap(), BACKGROUND_COLOR);
    }

    #[test]
    fn test_point_light_brightens_the_floor() {
        let scene = floor_scene();
        let settings = settings();
        let frame = drawable_frame(&scene, &settings);
        let shade = |frame: Arc<FrameResources>| {
            let mut ctx = context(scene.clone(), frame, &settings);
            run(&mut ctx, &[&VisibilityBufferPassLane, &VisibilityBufferShadeLane]);
            hdr(&ctx).get(16, 8).unwrap()
        };
        let without = shade(frame.clone());

        {
            let mut constants = frame.constants.map().unwrap();
            constants[0].render_local_lights = 1;
            let mut counts = frame.light_cluster_counts.map().unwrap();
            let mut clusters = frame.light_clusters.map().unwrap();
            clear_light_clusters(&mut counts);
            let stats = compute_light_clusters(&scene.lights, &constants[0], &mut counts, &mut clusters);
            assert!(stats.assignments > 0);
        }
        let with = shade(frame);
        assert!(with.x > without.x + 0.1);
        // The light is orange: red gains the most.
        assert!(with.x - without.x > with.z - without.z);
    }

    #[test]
    fn test_stale_visibility_id_is_an_error() {
        let scene = floor_scene();
        let settings = settings();
        let frame = drawable_frame(&scene, &settings);
        let mut ctx = context(scene, frame, &settings);
        VisibilityBufferPassLane.execute(&mut ctx).unwrap();
        if let Some(id) = ctx.get_mut::<RenderTargets>().unwrap().visibility.get_mut(16, 8) {
            *id = VisibilityId::pack(id.geometry_set(), 7, 0);
        }
        assert!(VisibilityBufferShadeLane.execute(&mut ctx).is_err());
    }
}
