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

//! Render targets owned by the graphics queue.

use std::sync::Arc;

use vbuffer_core::math::{Vec3, Vec4};
use vbuffer_core::renderer::{ResourceState, TrackedBuffer, VisibilityId, GODRAY_SCALE};

use crate::error::PassError;

/// A 2D image of `T` texels, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: u32,
    height: u32,
    pixels: Vec<T>,
}

impl<T: Copy> Image<T> {
    /// An image with every texel set to `value`.
    pub fn new(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Texel at `(x, y)`, `None` outside the image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x < self.width && y < self.height {
            self.pixels.get(self.offset(x, y)).copied()
        } else {
            None
        }
    }

    /// Texel at signed coordinates clamped to the edges.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> T {
        let cx = x.clamp(0, self.width.saturating_sub(1) as i64) as u32;
        let cy = y.clamp(0, self.height.saturating_sub(1) as i64) as u32;
        self.pixels[self.offset(cx, cy)]
    }

    /// Mutable texel at `(x, y)`, `None` outside the image.
    #[inline]
    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut T> {
        if x < self.width && y < self.height {
            let offset = self.offset(x, y);
            self.pixels.get_mut(offset)
        } else {
            None
        }
    }

    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }
}

/// Godray texels along an axis of `extent` camera pixels.
#[inline]
pub fn godray_extent(extent: u32) -> u32 {
    extent.div_ceil(GODRAY_SCALE).max(1)
}

/// Depth cleared value: the far plane.
pub const DEPTH_CLEAR: f32 = 1.0;

/// Intermediate targets of the geometry and shading passes.
///
/// Lives in the graphics queue's lane context for the whole run; the passes
/// clear what they write at the start of each frame.
#[derive(Debug, Clone)]
pub struct RenderTargets {
    /// Depth of the sun's view, `shadow_map_size²`.
    pub shadow_depth: Image<f32>,
    /// Camera depth.
    pub depth: Image<f32>,
    /// Packed [`VisibilityId`] per pixel.
    pub visibility: Image<VisibilityId>,
    /// Albedo (`xyz`) and coverage (`w`).
    pub gbuffer_albedo: Image<Vec4>,
    /// World normal (`xyz`).
    pub gbuffer_normal: Image<Vec4>,
    /// Specular intensity (`x`) and roughness (`y`).
    pub gbuffer_specular: Image<Vec4>,
    /// Ambient visibility in `[0, 1]`.
    pub ao: Image<f32>,
    /// Linear lit colour before tone mapping.
    pub hdr: Image<Vec3>,
    /// Shaft intensity at `1 / GODRAY_SCALE` resolution; the second image
    /// holds the horizontal blur.
    pub godray: [Image<f32>; 2],
}

impl RenderTargets {
    pub fn new(width: u32, height: u32, shadow_map_size: u32) -> Self {
        Self {
            shadow_depth: Image::new(shadow_map_size, shadow_map_size, DEPTH_CLEAR),
            depth: Image::new(width, height, DEPTH_CLEAR),
            visibility: Image::new(width, height, VisibilityId::EMPTY),
            gbuffer_albedo: Image::new(width, height, Vec4::ZERO),
            gbuffer_normal: Image::new(width, height, Vec4::ZERO),
            gbuffer_specular: Image::new(width, height, Vec4::ZERO),
            ao: Image::new(width, height, 1.0),
            hdr: Image::new(width, height, Vec3::ZERO),
            godray: [
                Image::new(godray_extent(width), godray_extent(height), 0.0),
                Image::new(godray_extent(width), godray_extent(height), 0.0),
            ],
        }
    }

    /// Resolution of the camera targets.
    pub fn size(&self) -> (u32, u32) {
        self.depth.size()
    }

    /// Fails unless the camera targets are `expected` pixels large.
    pub fn check_size(&self, expected: (u32, u32)) -> Result<(), PassError> {
        let actual = self.size();
        if actual != expected {
            return Err(PassError::TargetSize {
                name: "depth",
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// An RGBA8 swapchain image.
pub type SwapchainImage = TrackedBuffer<[u8; 4]>;

/// Creates a swapchain image in the `PRESENT` state.
pub fn new_swapchain_image(index: usize, width: u32, height: u32) -> SwapchainImage {
    TrackedBuffer::filled(
        format!("swapchain image {index}"),
        width as usize * height as usize,
        [0, 0, 0, 255],
        ResourceState::PRESENT,
    )
}

/// The swapchain image acquired for the frame being drawn.
#[derive(Debug, Clone)]
pub struct PresentTarget {
    /// Frame that acquired the image.
    pub frame: u64,
    /// Index of the image in the swapchain.
    pub image_index: usize,
    pub image: Arc<SwapchainImage>,
}
