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

//! An emulated swapchain of RGBA8 images presented round robin.

use std::sync::Arc;

use vbuffer_core::renderer::{Fence, RenderError};
use vbuffer_lanes::render_lane::{new_swapchain_image, PresentTarget, SwapchainImage};

/// Images in the swapchain.
pub const SWAPCHAIN_IMAGE_COUNT: usize = 3;

/// A frame handed to the graphics queue for presentation.
#[derive(Debug, Clone)]
pub struct PresentedFrame {
    /// Frame drawn into the image.
    pub frame: u64,
    /// Swapchain image written.
    pub image_index: usize,
    /// Fence of the submission writing the image.
    pub fence: Arc<Fence>,
}

/// Round-robin swapchain.
///
/// An image is only handed out again once the submission that last wrote
/// it has completed.
#[derive(Debug)]
pub struct Swapchain {
    width: u32,
    height: u32,
    images: Vec<Arc<SwapchainImage>>,
    in_flight: Vec<Option<Arc<Fence>>>,
    next_image: usize,
    last_presented: Option<PresentedFrame>,
}

impl Swapchain {
    /// Creates [`SWAPCHAIN_IMAGE_COUNT`] images of `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            images: (0..SWAPCHAIN_IMAGE_COUNT)
                .map(|i| Arc::new(new_swapchain_image(i, width, height)))
                .collect(),
            in_flight: vec![None; SWAPCHAIN_IMAGE_COUNT],
            next_image: 0,
            last_presented: None,
        }
    }

    /// Image size in texels.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Acquires the next image for frame `frame`, waiting for its previous
    /// writer.
    pub fn acquire(&mut self, frame: u64) -> Result<PresentTarget, RenderError> {
        let index = self.next_image;
        if let Some(fence) = self.in_flight.get_mut(index).and_then(Option::take) {
            fence.wait()?;
        }
        let image = self
            .images
            .get(index)
            .cloned()
            .ok_or_else(|| RenderError::Internal(format!("swapchain has no image {index}")))?;
        self.next_image = (index + 1) % self.images.len();
        Ok(PresentTarget {
            frame,
            image_index: index,
            image,
        })
    }

    /// Records that `target` was submitted, completing with `fence`.
    pub fn submitted(&mut self, target: &PresentTarget, fence: Arc<Fence>) {
        if let Some(slot) = self.in_flight.get_mut(target.image_index) {
            *slot = Some(fence.clone());
        }
        self.last_presented = Some(PresentedFrame {
            frame: target.frame,
            image_index: target.image_index,
            fence,
        });
    }

    /// The most recently submitted frame.
    pub fn last_presented(&self) -> Option<&PresentedFrame> {
        self.last_presented.as_ref()
    }

    /// Image by index.
    pub fn image(&self, index: usize) -> Option<&Arc<SwapchainImage>> {
        self.images.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::ResourceState;

    #[test]
    fn test_images_rotate() {
        let mut swapchain = Swapchain::new(4, 2);
        let indices: Vec<usize> = (0..5)
            .map(|frame| swapchain.acquire(frame).unwrap().image_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1]);
        let image = swapchain.image(0).unwrap();
        assert_eq!(image.len().unwrap(), 8);
        assert_eq!(image.state().unwrap(), ResourceState::PRESENT);
    }

    #[test]
    fn test_acquire_surfaces_a_failed_present() {
        let mut swapchain = Swapchain::new(1, 1);
        let target = swapchain.acquire(0).unwrap();
        let fence = Arc::new(Fence::new("graphics fence 0"));
        fence.reset_for_submit().unwrap();
        fence.signal_failed("graphics", "lost").unwrap();
        swapchain.submitted(&target, fence);
        assert_eq!(swapchain.last_presented().unwrap().frame, 0);

        swapchain.acquire(1).unwrap();
        swapchain.acquire(2).unwrap();
        assert!(matches!(
            swapchain.acquire(3),
            Err(RenderError::QueueFailed { .. })
        ));
    }
}
