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

//! Ambient occlusion lane - a horizon-style screen-space test on the depth
//! buffer (HDAO).
//!
//! For every pixel, pairs of samples at opposite offsets are compared with
//! the centre. A pair whose two samples both lie in front of the centre by
//! more than a small accept distance, but not by more than a reject distance,
//! forms a valley around the pixel and counts as occluding. Quality selects
//! how many rings of pairs are tested.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::saturate;
use vbuffer_core::renderer::PerFrameConstants;

use super::{targets_mut, Image, PassInputs, DEPTH_CLEAR};

/// Highest supported ring count.
pub const MAX_AO_QUALITY: u32 = 4;
/// Pixels between two sample rings.
const RING_SPACING: i64 = 2;
/// Directions of the sample pairs of one ring.
const PAIR_DIRECTIONS: [(i64, i64); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];
/// Depth gap, relative to the centre's linear depth, that starts to occlude.
const ACCEPT_RATIO: f32 = 0.004;
/// Depth gap beyond which the sample belongs to an unrelated surface.
const REJECT_RATIO: f32 = 0.1;

/// View-space distance of a `[0, 1]` perspective depth.
#[inline]
pub fn linear_depth(depth: f32, near: f32, far: f32) -> f32 {
    near * far / (far - depth * (far - near))
}

/// Writes ambient visibility (`1` unoccluded) for every pixel of `depth`.
///
/// With AO disabled every texel becomes `1`. Returns the number of pixels
/// with some occlusion.
pub fn compute_ambient_occlusion(
    depth: &Image<f32>,
    constants: &PerFrameConstants,
    ao: &mut Image<f32>,
) -> u64 {
    ao.fill(1.0);
    if constants.ao_enabled == 0 {
        return 0;
    }
    let rings = constants.ao_quality.clamp(1, MAX_AO_QUALITY) as i64;
    let (near, far) = (constants.near_plane, constants.far_plane);
    let mut linear = Image::new(depth.width(), depth.height(), f32::INFINITY);
    for (out, &d) in linear.pixels_mut().iter_mut().zip(depth.pixels()) {
        if d < DEPTH_CLEAR {
            *out = linear_depth(d, near, far);
        }
    }

    let total_pairs = (rings as usize * PAIR_DIRECTIONS.len()) as f32;
    let mut occluded_pixels = 0u64;
    for y in 0..depth.height() {
        for x in 0..depth.width() {
            let Some(centre) = linear.get(x, y) else {
                continue;
            };
            if !centre.is_finite() {
                continue;
            }
            let accept = centre * ACCEPT_RATIO;
            let reject = centre * REJECT_RATIO;
            let in_front = |dx: i64, dy: i64| {
                let gap = centre - linear.get_clamped(x as i64 + dx, y as i64 + dy);
                gap > accept && gap < reject
            };

            let mut occluding = 0u32;
            for ring in 1..=rings {
                let radius = ring * RING_SPACING;
                for (dx, dy) in PAIR_DIRECTIONS {
                    if in_front(dx * radius, dy * radius) && in_front(-dx * radius, -dy * radius) {
                        occluding += 1;
                    }
                }
            }
            if occluding > 0 {
                occluded_pixels += 1;
                let occlusion = occluding as f32 / total_pairs;
                if let Some(texel) = ao.get_mut(x, y) {
                    *texel = saturate(1.0 - occlusion * constants.ao_intensity);
                }
            }
        }
    }
    occluded_pixels
}

/// A rendering lane computing the ambient occlusion target.
#[derive(Debug, Default)]
pub struct AmbientOcclusionLane;

impl AmbientOcclusionLane {
    /// Registry name.
    pub const NAME: &'static str = "AmbientOcclusionPass";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for AmbientOcclusionLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn estimate_cost(&self, ctx: &LaneContext) -> f32 {
        ctx.get::<super::RenderTargets>()
            .map(|t| (t.depth.width() * t.depth.height()) as f32 * 1e-5)
            .unwrap_or(1.0)
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let occluded = compute_ambient_occlusion(&targets.depth, &inputs.constants, &mut targets.ao);
        log::trace!("AO pass: {occluded} pixels occluded");
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

    fn constants(enabled: bool, quality: u32) -> PerFrameConstants {
        PerFrameConstants {
            ao_enabled: enabled as u32,
            ao_quality: quality,
            ao_intensity: 1.0,
            near_plane: 10.0,
            far_plane: 3000.0,
            ..Default::default()
        }
    }

    /// Depth of a view into a vertical crease: the centre column is the
    /// farthest, depth falls off linearly to both sides.
    fn crease(width: u32) -> Image<f32> {
        let mid = (width / 2) as f32;
        let mut depth = Image::new(width, 8, 0.0);
        for y in 0..8 {
            for x in 0..width {
                let d = 0.9 - (x as f32 - mid).abs() * 0.001;
                *depth.get_mut(x, y).unwrap() = d;
            }
        }
        depth
    }

    #[test]
    fn test_linear_depth_endpoints() {
        assert_relative_eq!(linear_depth(0.0, 10.0, 3000.0), 10.0, epsilon = 1e-3);
        assert_relative_eq!(linear_depth(1.0, 10.0, 3000.0), 3000.0, epsilon = 1e-1);
    }

    #[test]
    fn test_flat_depth_is_unoccluded() {
        let depth = Image::new(16, 8, 0.9);
        let mut ao = Image::new(16, 8, 0.0);
        assert_eq!(compute_ambient_occlusion(&depth, &constants(true, 4), &mut ao), 0);
        assert!(ao.pixels().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_crease_darkens_its_floor() {
        let depth = crease(17);
        let mut ao = Image::new(17, 8, 0.0);
        compute_ambient_occlusion(&depth, &constants(true, 2), &mut ao);
        let floor = ao.get(8, 4).unwrap();
        assert!(floor < 1.0);
        // Horizontal pairs and both diagonals straddle the crease.
        assert_relative_eq!(floor, 1.0 - 6.0 / 8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_more_rings_and_disable() {
        let depth = crease(17);
        let mut ao = Image::new(17, 8, 0.0);
        compute_ambient_occlusion(&depth, &constants(false, 2), &mut ao);
        assert!(ao.pixels().iter().all(|&v| v == 1.0));

        // Out-of-range quality is clamped to the supported rings.
        compute_ambient_occlusion(&depth, &constants(true, 9), &mut ao);
        let clamped = ao.get(8, 4).unwrap();
        compute_ambient_occlusion(&depth, &constants(true, MAX_AO_QUALITY), &mut ao);
        assert_eq!(ao.get(8, 4).unwrap(), clamped);
    }

    #[test]
    fn test_background_is_skipped() {
        let depth = Image::new(8, 8, DEPTH_CLEAR);
        let mut ao = Image::new(8, 8, 0.0);
        assert_eq!(compute_ambient_occlusion(&depth, &constants(true, 1), &mut ao), 0);
    }
}
