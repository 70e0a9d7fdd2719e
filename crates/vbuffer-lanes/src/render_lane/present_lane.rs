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

//! Present lane - tone maps the HDR target into the acquired swapchain image.

use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
use vbuffer_core::math::{saturate, Vec3};

use super::{FrameInfo, Image, PresentTarget, RenderTargets};
use crate::error::PassError;

/// Display gamma.
pub const GAMMA: f32 = 2.2;

/// Reinhard tone mapping followed by gamma encoding to RGBA8.
#[inline]
pub fn tone_map(radiance: Vec3) -> [u8; 4] {
    let encode = |c: f32| {
        let c = c.max(0.0);
        let mapped = c / (1.0 + c);
        (saturate(mapped.powf(1.0 / GAMMA)) * 255.0).round() as u8
    };
    [encode(radiance.x), encode(radiance.y), encode(radiance.z), 255]
}

/// Writes the tone-mapped `hdr` image into `target`.
///
/// The image must be in a writable state (`RENDER_TARGET` once acquired).
pub fn present(hdr: &Image<Vec3>, target: &PresentTarget) -> Result<(), PassError> {
    let mut image = target.image.write()?;
    let expected = hdr.pixels().len();
    if image.len() != expected {
        return Err(PassError::TargetSize {
            name: "swapchain",
            expected: hdr.size(),
            actual: (image.len() as u32, 1),
        });
    }
    for (texel, radiance) in image.iter_mut().zip(hdr.pixels()) {
        *texel = tone_map(*radiance);
    }
    Ok(())
}

/// A rendering lane presenting the frame.
#[derive(Debug, Default)]
pub struct PresentLane;

impl PresentLane {
    /// Registry name.
    pub const NAME: &'static str = "Present";

    pub fn new() -> Self {
        Self
    }
}

impl Lane for PresentLane {
    fn strategy_name(&self) -> &'static str {
        Self::NAME
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Present
    }

    fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        let frame_count = ctx.get::<FrameInfo>().map_or(0, |f| f.frame_count);
        let target = ctx
            .get::<PresentTarget>()
            .ok_or(PassError::NoSwapchainImage(frame_count))?;
        let targets = ctx.require::<RenderTargets>()?;
        present(&targets.hdr, target)?;
        log::trace!(
            "Presented frame {} into swapchain image {}",
            target.frame,
            target.image_index
        );
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
