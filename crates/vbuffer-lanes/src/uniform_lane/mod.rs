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

//! Per-frame uniform update.
//!
//! Builds the camera and shadow transforms, the culling viewports and the
//! lighting parameters of a frame, plus the object-space eye of each view
//! used by cluster culling.

use std::sync::Arc;

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::{Aabb, Mat4, Vec2, Vec3, Vec4, FRAC_PI_2};
use vbuffer_core::renderer::{
    AppSettings, ClusterContainer, CullingViewport, LightingMode, PerFrameConstants,
    ShadowFilter, ViewTransform, NUM_CULLING_VIEWPORTS, VIEW_CAMERA, VIEW_SHADOW,
};
use vbuffer_data::Camera;

use crate::culling_lane::{update_cluster_distances, CullingParams};
use crate::error::UniformError;
use crate::gpu_scene::GpuScene;

/// Uniform scale applied to the scene geometry.
pub const SCENE_SCALE: f32 = 50.0;
/// World-space offset of the scene origin.
pub const SCENE_OFFSET: Vec3 = Vec3::new(-20.0, 0.0, 0.0);
/// Vertical field of view of the camera.
pub const CAMERA_FOV_Y: f32 = FRAC_PI_2;
/// Extra distance between the scene bounds and the shadow eye.
const SHADOW_PULLBACK: f32 = 100.0;

/// Object-to-world transform shared by both views.
pub fn scene_model_matrix() -> Mat4 {
    Mat4::from_translation(SCENE_OFFSET) * Mat4::from_scale(Vec3::splat(SCENE_SCALE))
}

/// Direction the sun light travels, from pitch (`x`) and yaw (`y`).
pub fn sun_direction(sun_control: Vec2) -> Result<Vec3, UniformError> {
    let rotation = Mat4::from_rotation_x(sun_control.x) * Mat4::from_rotation_y(sun_control.y);
    let dir = rotation.transpose().transform_vector3(Vec3::Z).normalize();
    if dir == Vec3::ZERO || !dir.is_finite() {
        return Err(UniformError::DegenerateSun);
    }
    Ok(dir)
}

/// Orthographic shadow view fitted around `world_bounds` as seen along `light_dir`.
pub fn shadow_view_projection(
    light_dir: Vec3,
    world_bounds: &Aabb,
) -> Result<(Mat4, Mat4), UniformError> {
    let center = world_bounds.center();
    let radius = world_bounds.size().length() * 0.5;
    let eye = center - light_dir * (radius + SHADOW_PULLBACK);
    let up = if light_dir.y.abs() > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_to_rh(eye, light_dir, up).ok_or(UniformError::DegenerateSun)?;

    let light_space = world_bounds.transform(&view);
    let (min, max) = (light_space.min, light_space.max);
    // View space looks down -Z.
    let projection = Mat4::orthographic_rh_zo(min.x, max.x, min.y, max.y, -max.z, -min.z);
    Ok((view, projection))
}

/// Texture-space position of the sun seen through `view_projection`, row 0
/// at the top. `None` when the sun is behind the viewer.
///
/// The sun is a point at infinity against the direction the light travels,
/// so only the rotation part of the view applies.
pub fn sun_screen_position(view_projection: &Mat4, light_dir: Vec3) -> Option<Vec2> {
    let clip = *view_projection * (-light_dir).extend(0.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = Vec2::new(clip.x / clip.w, clip.y / clip.w);
    Some(Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5))
}

/// Uniforms of one frame and the culling eyes derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub constants: PerFrameConstants,
    /// Eye of each view in the scene's object space.
    pub eye_object_space: [Vec4; NUM_CULLING_VIEWPORTS],
}

/// Computes the constants of a frame for `camera` over a scene of
/// object-space bounds `scene_bounds`.
pub fn update_uniform_data(
    settings: &AppSettings,
    camera: &Camera,
    scene_bounds: &Aabb,
) -> Result<FrameUniforms, UniformError> {
    let model = scene_model_matrix();

    let aspect = settings.aspect_ratio();
    let camera_projection =
        Mat4::perspective_rh_zo(CAMERA_FOV_Y, aspect, settings.near_plane, settings.far_plane)
            .ok_or(UniformError::InvalidProjection {
                aspect,
                near: settings.near_plane,
                far: settings.far_plane,
            })?;
    let camera_view = camera
        .view_matrix()
        .ok_or(UniformError::DegenerateCamera {
            position: [camera.position.x, camera.position.y, camera.position.z],
        })?;

    let light_dir = sun_direction(settings.sun_control)?;
    let (shadow_view, shadow_projection) =
        shadow_view_projection(light_dir, &scene_bounds.transform(&model))?;

    let mut transform = [ViewTransform::default(); NUM_CULLING_VIEWPORTS];
    transform[VIEW_CAMERA] = ViewTransform {
        mvp: camera_projection * camera_view * model,
        projection: camera_projection,
        view: camera_view,
    };
    transform[VIEW_SHADOW] = ViewTransform {
        mvp: shadow_projection * shadow_view * model,
        projection: shadow_projection,
        view: shadow_view,
    };

    let mut eye_object_space = [Vec4::W; NUM_CULLING_VIEWPORTS];
    for (view, eye) in eye_object_space.iter_mut().enumerate() {
        let name = if view == VIEW_CAMERA { "camera" } else { "shadow" };
        let inverse = (transform[view].view * model)
            .inverse()
            .ok_or(UniformError::SingularTransform(name))?;
        *eye = inverse * Vec4::W;
    }

    let mut cull_viewport = [CullingViewport::default(); NUM_CULLING_VIEWPORTS];
    cull_viewport[VIEW_SHADOW] =
        CullingViewport::new(settings.shadow_map_size, settings.shadow_map_size, 1);
    cull_viewport[VIEW_CAMERA] =
        CullingViewport::new(settings.width, settings.height, settings.sample_count);

    let sun_screen = sun_screen_position(&(camera_projection * camera_view), light_dir);
    let godray = &settings.godray;

    let constants = PerFrameConstants {
        transform,
        cull_viewport,
        camera_position: camera.position.extend(1.0),
        light_dir: light_dir.extend(0.0),
        light_color: settings.light_color,
        two_over_res: Vec2::new(2.0 / settings.width as f32, 2.0 / settings.height as f32),
        near_plane: settings.near_plane,
        far_plane: settings.far_plane,
        esm_control: settings.esm_control,
        ao_intensity: settings.ao.intensity,
        ao_quality: settings.ao.quality,
        ao_enabled: u32::from(settings.ao.enabled),
        lighting_mode: match settings.lighting_mode {
            LightingMode::Phong => 0,
            LightingMode::Pbr => 1,
        },
        shadow_filter: match settings.shadow_filter {
            ShadowFilter::Esm => 0,
            ShadowFilter::Pcf => 1,
        },
        filter_flags: settings.filter_flags().bits(),
        render_local_lights: u32::from(settings.render_local_lights),
        sun_screen_position: sun_screen.unwrap_or(Vec2::new(0.5, 0.5)),
        godray_exposure: godray.exposure,
        godray_decay: godray.decay,
        godray_density: godray.density,
        godray_weight: godray.weight,
        godray_scatter: godray.scatter_factor,
        godray_blur_sigma: godray.blur_sigma,
        godray_samples: godray.sample_count,
        godray_blur_radius: godray.filter_radius,
        godray_enabled: u32::from(godray.enabled && sun_screen.is_some()),
        skybox_enabled: u32::from(settings.skybox),
    };

    Ok(FrameUniforms {
        constants,
        eye_object_space,
    })
}

/// Record-time lane computing [`FrameUniforms`].
///
/// Reads [`AppSettings`], [`Camera`] and `Arc<GpuScene>`; refreshes cluster
/// distances when a `Vec<ClusterContainer>` is present; inserts the
/// [`FrameUniforms`] and the [`CullingParams`] of the frame.
#[derive(Debug, Default)]
pub struct UniformLane;

impl UniformLane {
    /// Creates the lane.
    pub fn new() -> Self {
        Self
    }
}

impl Lane for UniformLane {
    fn strategy_name(&self) -> &'static str {
        "UniformUpdate"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Uniform
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let settings = ctx.require::<AppSettings>()?.clone();
        let camera = *ctx.require::<Camera>()?;
        let bounds = ctx.require::<Arc<GpuScene>>()?.bounds;

        let uniforms =
            update_uniform_data(&settings, &camera, &bounds).map_err(LaneError::execution)?;
        if let Some(clusters) = ctx.get_mut::<Vec<ClusterContainer>>() {
            update_cluster_distances(clusters, uniforms.eye_object_space[VIEW_CAMERA].truncate());
        }

        ctx.insert(CullingParams {
            eyes: uniforms.eye_object_space,
            cluster_culling: settings.cluster_culling,
            sort_clusters: settings.sort_clusters,
        });
        ctx.insert(uniforms);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
