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

//! Application settings of the pipeline.
//!
//! Every field has a default so partial configuration files deserialize.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{MAX_BLUR_KERNEL_SIZE, MAX_DATA_BUFFER_COUNT, MAX_GODRAY_SAMPLES};
use super::uniforms::FilterFlags;
use crate::math::{Vec2, Vec4};

/// Geometry path used to shade the frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Triangle ids are rasterized and attributes fetched at shading time.
    #[default]
    VisibilityBuffer,
    /// Attributes are rasterized into a G-buffer.
    Deferred,
}

/// Sun lighting model.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightingMode {
    /// Blinn-Phong with a fixed specular power.
    #[default]
    Phong,
    /// GGX microfacet model.
    Pbr,
}

/// Shadow-map filtering technique.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowFilter {
    /// Exponential shadow maps.
    #[default]
    Esm,
    /// Percentage-closer filtering.
    Pcf,
}

/// Ambient occlusion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientOcclusionSettings {
    /// Runs the AO pass.
    pub enabled: bool,
    /// Darkening strength.
    pub intensity: f32,
    /// Sample rings, `1..=4`.
    pub quality: u32,
}

impl Default for AmbientOcclusionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 3.0,
            quality: 2,
        }
    }
}

/// Light-shaft parameters.
///
/// The sky seen through the scene is blurred radially towards the sun,
/// softened by a separable Gaussian and added over the shaded image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GodraySettings {
    /// Runs the godray pass.
    pub enabled: bool,
    /// Scale of the accumulated shafts.
    pub exposure: f32,
    /// Falloff applied per radial sample.
    pub decay: f32,
    /// Fraction of the distance to the sun covered by the samples.
    pub density: f32,
    /// Contribution of each sample.
    pub weight: f32,
    /// Radial samples per texel, `1..=MAX_GODRAY_SAMPLES`.
    pub sample_count: u32,
    /// Fraction of the sun colour scattered into the shafts.
    pub scatter_factor: f32,
    /// Gaussian blur taps on each side, `0..MAX_BLUR_KERNEL_SIZE`.
    pub filter_radius: u32,
    /// Gaussian blur sigma in texels.
    pub blur_sigma: f32,
}

impl Default for GodraySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            exposure: 0.35,
            decay: 0.97,
            density: 0.9,
            weight: 0.08,
            sample_count: 48,
            scatter_factor: 0.5,
            filter_radius: 3,
            blur_sigma: 1.0,
        }
    }
}

/// Settings driving the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Render width in pixels.
    pub width: u32,
    /// Render height in pixels.
    pub height: u32,
    /// Samples per pixel used by the small-primitive test.
    pub sample_count: u32,
    /// Geometry path.
    pub render_mode: RenderMode,
    /// Runs filtering on the compute queue, one frame ahead of graphics.
    pub async_compute: bool,
    /// Keeps the filtered results of the previous frames.
    pub hold_filtered_results: bool,
    /// Runs the per-triangle tests; off accepts every triangle.
    pub filter_triangles: bool,
    /// Runs the per-cluster cone test.
    pub cluster_culling: bool,
    /// Sorts clusters front to back every frame.
    pub sort_clusters: bool,
    /// Bins and shades the point lights.
    pub render_local_lights: bool,
    /// Sun lighting model.
    pub lighting_mode: LightingMode,
    /// Shadow filtering.
    pub shadow_filter: ShadowFilter,
    /// Moves the camera along its path.
    pub camera_walking: bool,
    /// Path speed multiplier.
    pub camera_walking_speed: f32,
    /// Camera near plane.
    pub near_plane: f32,
    /// Camera far plane.
    pub far_plane: f32,
    /// Sun pitch (`x`) and yaw (`y`) in radians.
    pub sun_control: Vec2,
    /// Sun colour (`xyz`) and intensity (`w`).
    pub light_color: Vec4,
    /// Exponent of the exponential shadow map.
    pub esm_control: f32,
    /// Ambient occlusion.
    pub ao: AmbientOcclusionSettings,
    /// Light shafts.
    pub godray: GodraySettings,
    /// Draws the sky behind the scene.
    pub skybox: bool,
    /// Frames in flight.
    pub data_buffer_count: u32,
    /// Shadow map edge in texels.
    pub shadow_map_size: u32,
    /// Seed of the point-light generator.
    pub light_seed: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            sample_count: 1,
            render_mode: RenderMode::VisibilityBuffer,
            async_compute: true,
            hold_filtered_results: false,
            filter_triangles: true,
            cluster_culling: true,
            sort_clusters: false,
            render_local_lights: false,
            lighting_mode: LightingMode::Phong,
            shadow_filter: ShadowFilter::Esm,
            camera_walking: false,
            camera_walking_speed: 1.0,
            near_plane: 10.0,
            far_plane: 3000.0,
            sun_control: Vec2::new(-2.1, 0.164),
            light_color: Vec4::new(1.0, 0.8627, 0.78, 2.5),
            esm_control: 80.0,
            ao: AmbientOcclusionSettings::default(),
            godray: GodraySettings::default(),
            skybox: true,
            data_buffer_count: super::constants::DEFAULT_DATA_BUFFER_COUNT,
            shadow_map_size: 1024,
            light_seed: 0x5EED,
        }
    }
}

impl AppSettings {
    /// Width over height.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Tests run by the filtering kernel.
    pub fn filter_flags(&self) -> FilterFlags {
        if self.filter_triangles {
            FilterFlags::ALL
        } else {
            FilterFlags::empty()
        }
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 {
            return Err(SettingsError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        if !matches!(self.sample_count, 1 | 2 | 4 | 8) {
            return Err(SettingsError::InvalidSampleCount(self.sample_count));
        }
        if self.data_buffer_count == 0 || self.data_buffer_count > MAX_DATA_BUFFER_COUNT {
            return Err(SettingsError::InvalidDataBufferCount(self.data_buffer_count));
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err(SettingsError::InvalidClipPlanes {
                near: self.near_plane,
                far: self.far_plane,
            });
        }
        if self.shadow_map_size == 0 {
            return Err(SettingsError::InvalidShadowMapSize(self.shadow_map_size));
        }
        if !(1..=4).contains(&self.ao.quality) {
            return Err(SettingsError::InvalidAoQuality(self.ao.quality));
        }
        let godray = &self.godray;
        if !(1..=MAX_GODRAY_SAMPLES).contains(&godray.sample_count) {
            return Err(SettingsError::InvalidGodraySamples(godray.sample_count));
        }
        if godray.filter_radius >= MAX_BLUR_KERNEL_SIZE || !(godray.blur_sigma > 0.0) {
            return Err(SettingsError::InvalidGodrayBlur {
                radius: godray.filter_radius,
                sigma: godray.blur_sigma,
            });
        }
        if !self.camera_walking_speed.is_finite() || self.camera_walking_speed < 0.0 {
            return Err(SettingsError::InvalidWalkingSpeed(self.camera_walking_speed));
        }
        Ok(())
    }
}

/// A settings value the pipeline cannot run with.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    /// Zero-sized render target.
    InvalidResolution {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Sample count other than 1, 2, 4 or 8.
    InvalidSampleCount(u32),
    /// Frames in flight outside `1..=3`.
    InvalidDataBufferCount(u32),
    /// Near plane not positive or not in front of the far plane.
    InvalidClipPlanes {
        /// Requested near plane.
        near: f32,
        /// Requested far plane.
        far: f32,
    },
    /// Zero-sized shadow map.
    InvalidShadowMapSize(u32),
    /// AO quality outside `1..=4`.
    InvalidAoQuality(u32),
    /// Godray sample count outside `1..=MAX_GODRAY_SAMPLES`.
    InvalidGodraySamples(u32),
    /// Godray blur radius too wide or sigma not positive.
    InvalidGodrayBlur {
        /// Requested taps per side.
        radius: u32,
        /// Requested sigma.
        sigma: f32,
    },
    /// Negative or non-finite camera speed.
    InvalidWalkingSpeed(f32),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::InvalidResolution { width, height } => {
                write!(f, "Invalid resolution {width}x{height}")
            }
            SettingsError::InvalidSampleCount(n) => {
                write!(f, "Invalid sample count {n}, expected 1, 2, 4 or 8")
            }
            SettingsError::InvalidDataBufferCount(n) => write!(
                f,
                "Invalid data buffer count {n}, expected 1..={MAX_DATA_BUFFER_COUNT}"
            ),
            SettingsError::InvalidClipPlanes { near, far } => {
                write!(f, "Invalid clip planes near={near} far={far}")
            }
            SettingsError::InvalidShadowMapSize(n) => write!(f, "Invalid shadow map size {n}"),
            SettingsError::InvalidAoQuality(n) => {
                write!(f, "Invalid AO quality {n}, expected 1..=4")
            }
            SettingsError::InvalidGodraySamples(n) => write!(
                f,
                "Invalid godray sample count {n}, expected 1..={MAX_GODRAY_SAMPLES}"
            ),
            SettingsError::InvalidGodrayBlur { radius, sigma } => write!(
                f,
                "Invalid godray blur radius={radius} sigma={sigma}, expected a radius below {MAX_BLUR_KERNEL_SIZE} and a positive sigma"
            ),
            SettingsError::InvalidWalkingSpeed(s) => {
                write!(f, "Invalid camera walking speed {s}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}
