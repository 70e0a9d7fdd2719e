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

//! Per-view transforms and per-frame constants uploaded once per frame.

use super::constants::{GEOMSET_COUNT, NUM_CULLING_VIEWPORTS, VIEW_CAMERA};
use super::settings::{LightingMode, ShadowFilter};
use crate::math::{Mat4, Vec2, Vec4};

crate::vbuffer_bitflags! {
    /// Per-triangle tests run by the filtering kernel.
    pub struct FilterFlags: u32 {
        /// Reject triangles facing away from the view.
        const CULL_BACKFACE = 1 << 0;
        /// Reject triangles beyond the far plane or outside the viewport.
        const CULL_FRUSTUM = 1 << 1;
        /// Reject triangles that cover no sample.
        const CULL_SMALL_PRIMITIVES = 1 << 2;
    }
}

impl FilterFlags {
    /// Every test.
    pub const ALL: Self = Self(
        Self::CULL_BACKFACE.0 | Self::CULL_FRUSTUM.0 | Self::CULL_SMALL_PRIMITIVES.0,
    );
}

/// Matrices of one view.
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ViewTransform {
    /// `projection * view * model`.
    pub mvp: Mat4,
    /// Projection matrix.
    pub projection: Mat4,
    /// World-to-view matrix.
    pub view: Mat4,
}

/// Resolution a view is filtered against.
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct CullingViewport {
    /// Size in pixels.
    pub window_size: Vec2,
    /// Samples per pixel.
    pub sample_count: u32,
    _pad: u32,
}

impl CullingViewport {
    /// Creates a viewport.
    pub fn new(width: u32, height: u32, sample_count: u32) -> Self {
        Self {
            window_size: Vec2::new(width as f32, height as f32),
            sample_count,
            _pad: 0,
        }
    }

    /// Resolution of the sample grid.
    #[inline]
    pub fn sample_resolution(&self) -> Vec2 {
        // Samples are spread along x and y alike.
        let per_axis = (self.sample_count.max(1) as f32).sqrt();
        self.window_size * per_axis
    }
}

/// Uniforms shared by the filtering, light-clustering and shading stages.
#[derive(Debug, Default, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PerFrameConstants {
    /// Transforms, indexed by view.
    pub transform: [ViewTransform; NUM_CULLING_VIEWPORTS],
    /// Filtering resolution, indexed by view.
    pub cull_viewport: [CullingViewport; NUM_CULLING_VIEWPORTS],
    /// Camera position in world space.
    pub camera_position: Vec4,
    /// Direction the sun light travels along, world space.
    pub light_dir: Vec4,
    /// Sun colour (`xyz`) and intensity (`w`).
    pub light_color: Vec4,
    /// `2 / resolution` of the camera view.
    pub two_over_res: Vec2,
    /// Camera near plane.
    pub near_plane: f32,
    /// Camera far plane.
    pub far_plane: f32,
    /// Exponential shadow map exponent.
    pub esm_control: f32,
    /// AO strength.
    pub ao_intensity: f32,
    /// AO sample rings.
    pub ao_quality: u32,
    /// Non-zero when the AO pass runs.
    pub ao_enabled: u32,
    /// [`LightingMode`] as an integer.
    pub lighting_mode: u32,
    /// [`ShadowFilter`] as an integer.
    pub shadow_filter: u32,
    /// [`FilterFlags`] bits.
    pub filter_flags: u32,
    /// Non-zero when point lights are shaded.
    pub render_local_lights: u32,
    /// Sun position in camera texture space, `[0, 1]` with row 0 at the top.
    pub sun_screen_position: Vec2,
    /// Scale of the accumulated shafts.
    pub godray_exposure: f32,
    /// Falloff per radial sample.
    pub godray_decay: f32,
    /// Fraction of the distance to the sun the samples cover.
    pub godray_density: f32,
    /// Contribution of each sample.
    pub godray_weight: f32,
    /// Fraction of the sun colour scattered into the shafts.
    pub godray_scatter: f32,
    /// Gaussian blur sigma in texels.
    pub godray_blur_sigma: f32,
    /// Radial samples per texel.
    pub godray_samples: u32,
    /// Gaussian blur taps on each side.
    pub godray_blur_radius: u32,
    /// Non-zero when shafts are drawn: enabled and the sun in front of the camera.
    pub godray_enabled: u32,
    /// Non-zero when the sky is drawn behind the scene.
    pub skybox_enabled: u32,
}

impl PerFrameConstants {
    /// Decoded filter tests.
    #[inline]
    pub fn filter_flags(&self) -> FilterFlags {
        FilterFlags::from_bits_truncate(self.filter_flags)
    }

    /// Decoded lighting model.
    pub fn lighting_mode(&self) -> LightingMode {
        match self.lighting_mode {
            1 => LightingMode::Pbr,
            _ => LightingMode::Phong,
        }
    }

    /// Decoded shadow filter.
    pub fn shadow_filter(&self) -> ShadowFilter {
        match self.shadow_filter {
            1 => ShadowFilter::Pcf,
            _ => ShadowFilter::Esm,
        }
    }

    /// Width over height of the camera view.
    pub fn camera_aspect(&self) -> f32 {
        let size = self.cull_viewport[VIEW_CAMERA].window_size;
        if size.y > 0.0 {
            size.x / size.y
        } else {
            1.0
        }
    }
}

/// CPU-side per-frame state of one frame slot.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PerFrameData {
    /// Eye position in object space, indexed by view.
    pub eye_object_space: [Vec4; NUM_CULLING_VIEWPORTS],
    /// Valid and invalid clusters visited.
    pub total_clusters: u32,
    /// Clusters rejected by the cone test.
    pub culled_clusters: u32,
    /// Draws opened per geometry set.
    pub draw_count: [u32; GEOMSET_COUNT],
    /// Draws opened in total.
    pub total_draws: u32,
}

impl PerFrameData {
    /// Clears the counters, keeping the eye positions.
    pub fn reset_counters(&mut self) {
        self.total_clusters = 0;
        self.culled_clusters = 0;
        self.draw_count = [0; GEOMSET_COUNT];
        self.total_draws = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_round_trip_through_constants() {
        let constants = PerFrameConstants {
            filter_flags: (FilterFlags::CULL_BACKFACE | FilterFlags::CULL_FRUSTUM).bits(),
            lighting_mode: 1,
            ..Default::default()
        };
        assert!(constants.filter_flags().contains(FilterFlags::CULL_FRUSTUM));
        assert!(!constants.filter_flags().contains(FilterFlags::CULL_SMALL_PRIMITIVES));
        assert_eq!(constants.lighting_mode(), LightingMode::Pbr);
        assert_eq!(constants.shadow_filter(), ShadowFilter::Esm);
    }

    #[test]
    fn test_sample_resolution_scales_with_samples() {
        let viewport = CullingViewport::new(100, 50, 4);
        assert_eq!(viewport.sample_resolution(), Vec2::new(200.0, 100.0));
        assert_eq!(CullingViewport::new(100, 50, 1).sample_resolution(), Vec2::new(100.0, 50.0));
    }
}
