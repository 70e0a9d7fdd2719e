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

//! Godray lane - light shafts from the sun, blurred and added over the HDR image.
//!
//! Runs at [`GODRAY_SCALE`] times lower resolution in each axis:
//!
//! 1. occlusion mask, `1` where the sky is visible
//! 2. radial march from each texel towards the sun's screen position
//! 3. separable gaussian blur
//! 4. additive composite scaled by the sun colour

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::Vec2;
use vbuffer_core::renderer::{PerFrameConstants, GODRAY_SCALE, MAX_BLUR_KERNEL_SIZE, MAX_GODRAY_SAMPLES};

use super::{targets_mut, Image, PassInputs, RenderTargets, DEPTH_CLEAR};

/// Fills `mask` with `1` where the depth texel at the centre of its block is clear.
pub fn godray_mask(depth: &Image<f32>, mask: &mut Image<f32>) {
    let (scale, half) = (GODRAY_SCALE as i64, (GODRAY_SCALE / 2) as i64);
    for y in 0..mask.height() {
        for x in 0..mask.width() {
            let d = depth.get_clamped(x as i64 * scale + half, y as i64 * scale + half);
            if let Some(texel) = mask.get_mut(x, y) {
                *texel = if d >= DEPTH_CLEAR { 1.0 } else { 0.0 };
            }
        }
    }
}

/// Nearest `mask` texel at `uv`, clamped to the edges.
fn sample_mask(mask: &Image<f32>, uv: Vec2) -> f32 {
    let x = (uv.x * mask.width() as f32).floor() as i64;
    let y = (uv.y * mask.height() as f32).floor() as i64;
    mask.get_clamped(x, y)
}

/// Marches every texel of `shafts` towards the sun through `mask`.
///
/// Each step samples the mask, attenuated by `decay^step * weight`; the sum
/// is scaled by the exposure.
pub fn radial_blur(mask: &Image<f32>, constants: &PerFrameConstants, shafts: &mut Image<f32>) {
    let samples = constants.godray_samples.clamp(1, MAX_GODRAY_SAMPLES);
    let step_scale = constants.godray_density / samples as f32;
    let sun = constants.sun_screen_position;
    let (width, height) = shafts.size();

    for y in 0..height {
        for x in 0..width {
            let mut uv = Vec2::new(
                (x as f32 + 0.5) / width as f32,
                (y as f32 + 0.5) / height as f32,
            );
            let delta = (uv - sun) * step_scale;
            let mut illumination_decay = 1.0;
            let mut sum = 0.0;
            for _ in 0..samples {
                uv -= delta;
                sum += sample_mask(mask, uv) * illumination_decay * constants.godray_weight;
                illumination_decay *= constants.godray_decay;
            }
            if let Some(texel) = shafts.get_mut(x, y) {
                *texel = sum * constants.godray_exposure;
            }
        }
    }
}

/// Normalized gaussian taps `0..=radius`; tap `i` applies at offsets `±i`.
pub fn gaussian_weights(radius: u32, sigma: f32) -> Vec<f32> {
    let radius = radius.min(MAX_BLUR_KERNEL_SIZE - 1);
    let mut weights: Vec<f32> = (0..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// One axis of the separable blur, `src` into `dst`.
pub fn blur_axis(src: &Image<f32>, dst: &mut Image<f32>, weights: &[f32], horizontal: bool) {
    let (dx, dy) = if horizontal { (1, 0) } else { (0, 1) };
    for y in 0..src.height() {
        for x in 0..src.width() {
            let (x, y) = (x as i64, y as i64);
            let mut sum = src.get_clamped(x, y) * weights[0];
            for (i, w) in weights.iter().enumerate().skip(1) {
                let i = i as i64;
                sum += (src.get_clamped(x + i * dx, y + i * dy)
                    + src.get_clamped(x - i * dx, y - i * dy))
                    * w;
            }
            if let Some(texel) = dst.get_mut(x as u32, y as u32) {
                *texel = sum;
            }
        }
    }
}

/// Runs the godray chain on `targets` and adds the shafts into `targets.hdr`.
///
/// Returns the number of camera pixels that received light; `0` when godrays
/// are off or the sun is behind the camera.
pub fn apply_godrays(targets: &mut RenderTargets, constants: &PerFrameConstants) -> u64 {
    if constants.godray_enabled == 0 {
        return 0;
    }
    let [shafts, scratch] = &mut targets.godray;
    godray_mask(&targets.depth, scratch);
    radial_blur(scratch, constants, shafts);

    let weights = gaussian_weights(constants.godray_blur_radius, constants.godray_blur_sigma);
    blur_axis(shafts, scratch, &weights, true);
    blur_axis(scratch, shafts, &weights, false);

    let sun = constants.light_color.truncate() * (constants.light_color.w * constants.godray_scatter);
    let (width, height) = targets.hdr.size();
    let mut lit = 0u64;
    for y in 0..height {
        for x in 0..width {
            let shaft = shafts.get_clamped((x / GODRAY_SCALE) as i64, (y / GODRAY_SCALE) as i64);
            if shaft <= 0.0 {
                continue;
            }
            if let Some(texel) = targets.hdr.get_mut(x, y) {
                *texel += sun * shaft;
                lit += 1;
            }
        }
    }
    lit
}

/// A rendering lane adding sun shafts to the HDR image.
#[derive(Debug, Default)]
pub struct GodrayLane;

impl GodrayLane {
    /// Registry name.
    pub const NAME: &'static str = "Godray";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for GodrayLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Render
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let inputs = PassInputs::from_context(ctx)?;
        let targets = targets_mut(ctx)?;
        let lit = apply_godrays(targets, &inputs.constants);
        log::trace!("Godray pass: {lit} pixels lit");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
