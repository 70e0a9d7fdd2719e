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

//! Skybox lane - fills the pixels no geometry covered with a procedural sky.
//!
//! The view ray of each empty pixel is rebuilt from the inverse camera
//! view-projection. The sky blends from the horizon colour to the zenith
//! colour with height, darkens below the horizon, and carries a glow and a
//! disk around the sun.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::{saturate, Vec3};
use vbuffer_core::renderer::PerFrameConstants;

use super::raster::Viewport;
use super::shading_lane::{inverse_camera, unproject};
use super::{targets_mut, Image, PassInputs, DEPTH_CLEAR};
use crate::error::PassError;

/// Radiance straight up.
pub const SKY_ZENITH: Vec3 = Vec3::new(0.16, 0.3, 0.62);
/// Radiance at the horizon.
pub const SKY_HORIZON: Vec3 = Vec3::new(0.6, 0.68, 0.78);
/// Radiance below the horizon.
pub const SKY_GROUND: Vec3 = Vec3::new(0.22, 0.2, 0.18);
/// Cosine of the angular radius of the sun disk.
const SUN_DISK_COS: f32 = 0.9995;
const SUN_GLOW_POWER: f32 = 64.0;
const SUN_GLOW_STRENGTH: f32 = 0.25;

/// Sky radiance along the unit direction `dir`.
pub fn sky_radiance(dir: Vec3, constants: &PerFrameConstants) -> Vec3 {
    let base = if dir.y >= 0.0 {
        Vec3::lerp(SKY_HORIZON, SKY_ZENITH, dir.y.sqrt())
    } else {
        Vec3::lerp(SKY_HORIZON, SKY_GROUND, saturate(-dir.y * 4.0))
    };
    let sun = constants.light_color.truncate() * constants.light_color.w;
    let cos_sun = dir.dot(-constants.light_dir.truncate());
    let mut radiance = base + sun * (saturate(cos_sun).powf(SUN_GLOW_POWER) * SUN_GLOW_STRENGTH);
    if cos_sun > SUN_DISK_COS {
        radiance += sun;
    }
    radiance
}

/// Writes the sky into every texel of `hdr` whose depth is still cleared.
///
/// Returns the number of sky pixels; `0` with the sky disabled.
pub fn draw_skybox(
    depth: &Image<f32>,
    constants: &PerFrameConstants,
    hdr: &mut Image<Vec3>,
) -> Result<u64, PassError> {
    if constants.skybox_enabled == 0 {
        return Ok(0);
    }
    let inverse_view_projection = inverse_camera(constants)?;
    let eye = constants.camera_position.truncate();
    let viewport = Viewport::new(depth.width(), depth.height());

    let mut sky_pixels = 0u64;
    for y in 0..depth.height() {
        for x in 0..depth.width() {
            if depth.get(x, y).is_some_and(|d| d < DEPTH_CLEAR) {
                continue;
            }
            let ndc = viewport.pixel_center_ndc(x, y);
            let dir = (unproject(&inverse_view_projection, ndc.x, ndc.y, 1.0) - eye).normalize();
            if let Some(texel) = hdr.get_mut(x, y) {
                *texel = sky_radiance(dir, constants);
                sky_pixels += 1;
            }
        }
    }
    Ok(sky_pixels)
}

/// A rendering lane drawing the sky behind the shaded scene.
#[derive(Debug, Default)]
pub struct SkyboxLane;

impl SkyboxLane {
    /// Registry name.
    pub const NAME: &'static str = "Skybox";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for SkyboxLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let sky = draw_skybox(&targets.depth, &inputs.constants, &mut targets.hdr)?;
        log::trace!("Skybox pass: {sky} sky pixels");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vbuffer_core::math::{Mat4, Vec4, FRAC_PI_2};
    use vbuffer_core::renderer::{ViewTransform, VIEW_CAMERA};

    /// A level camera at the origin looking down -Z with the sun straight ahead.
    fn constants() -> PerFrameConstants {
        let projection = Mat4::perspective_rh_zo(FRAC_PI_2, 1.0, 1.0, 100.0).unwrap();
        let view = Mat4::look_to_rh(Vec3::ZERO, -Vec3::Z, Vec3::Y).unwrap();
        let mut constants = PerFrameConstants {
            camera_position: Vec4::W,
            light_dir: Vec4::Z,
            light_color: Vec4::new(1.0, 1.0, 1.0, 2.0),
            skybox_enabled: 1,
            ..Default::default()
        };
        constants.transform[VIEW_CAMERA] = ViewTransform {
            mvp: projection * view,
            projection,
            view,
        };
        constants
    }

    #[test]
    fn test_sky_gradient_and_sun_disk() {
        let c = constants();
        let zenith = sky_radiance(Vec3::Y, &c);
        let horizon = sky_radiance(Vec3::X, &c);
        assert_relative_eq!(zenith.distance(SKY_ZENITH), 0.0, epsilon = 1e-6);
        assert_relative_eq!(horizon.distance(SKY_HORIZON), 0.0, epsilon = 1e-6);
        assert_relative_eq!(sky_radiance(-Vec3::Y, &c).distance(SKY_GROUND), 0.0, epsilon = 1e-6);

        let sun = sky_radiance(-Vec3::Z, &c);
        assert!(sun.x > 2.0);
    }

    #[test]
    fn test_only_empty_pixels_get_the_sky() {
        let c = constants();
        let mut depth = Image::new(9, 9, DEPTH_CLEAR);
        *depth.get_mut(0, 8).unwrap() = 0.5;
        let mut hdr = Image::new(9, 9, Vec3::ZERO);

        assert_eq!(draw_skybox(&depth, &c, &mut hdr).unwrap(), 80);
        assert_eq!(hdr.get(0, 8), Some(Vec3::ZERO));
        // The centre pixel looks into the sun.
        assert!(hdr.get(4, 4).unwrap().x > 2.0);
        // Upper rows lean towards the zenith, lower ones towards the ground.
        let top = hdr.get(0, 0).unwrap();
        let bottom = hdr.get(1, 8).unwrap();
        assert!(top.z - top.x > bottom.z - bottom.x);
    }

    #[test]
    fn test_disabled_sky_leaves_the_background() {
        let c = PerFrameConstants {
            skybox_enabled: 0,
            ..constants()
        };
        let depth = Image::new(4, 4, DEPTH_CLEAR);
        let mut hdr = Image::new(4, 4, Vec3::ONE);
        assert_eq!(draw_skybox(&depth, &c, &mut hdr).unwrap(), 0);
        assert!(hdr.pixels().iter().all(|&t| t == Vec3::ONE));
    }
}
