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

//! What the agent and the queues report about each frame.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use vbuffer_core::renderer::NUM_CULLING_VIEWPORTS;
use vbuffer_core::telemetry::QueueKind;
use vbuffer_lanes::culling_lane::{CompactionStats, FilterStats};
use vbuffer_lanes::light_lane::LightClusterStats;

/// Work recorded by [`crate::RenderAgent::draw`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Frame number the report belongs to.
    pub frame: u64,
    /// Frame slot written by the CPU.
    pub slot: usize,
    /// Whether the frame was split across the compute and graphics queues.
    pub async_compute: bool,
    /// `false` when filtered results were held from an earlier frame.
    pub filtered: bool,
    /// Frame whose graphics work was submitted and the swapchain image it
    /// presents into. `None` on the first frame of async compute.
    pub presented: Option<(u64, usize)>,
    /// Clusters visited by the culling step.
    pub total_clusters: u32,
    /// Clusters rejected by the cone test.
    pub culled_clusters: u32,
    /// Filter dispatches recorded.
    pub filter_dispatches: usize,
    /// Draw slots opened.
    pub draws: u32,
    /// Triangles handed to the filter.
    pub triangles_submitted: u32,
    /// CPU time spent recording.
    pub record_time: Duration,
}

/// Counters produced while a queue executed a command buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Triangle filter counters.
    pub filter: FilterStats,
    /// Compaction results per view.
    pub compaction: [CompactionStats; NUM_CULLING_VIEWPORTS],
    /// Set when the buffer ran light clustering.
    pub lights: Option<LightClusterStats>,
}

impl ExecutionStats {
    /// Indirect draws written for `view`, over both geometry sets.
    pub fn draws(&self, view: usize) -> u32 {
        self.compaction
            .get(view)
            .map_or(0, |c| c.draws.iter().sum())
    }
}

/// Outcome of one submission, sent back by the queue that ran it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Queue that ran the command buffer.
    pub queue: QueueKind,
    /// Frame the command buffer was recorded for.
    pub frame: u64,
    /// Command buffer label.
    pub label: String,
    /// Counters gathered while executing.
    pub stats: ExecutionStats,
    /// Time from dequeue to completion, semaphore waits included.
    pub duration: Duration,
    /// Failure message when the command buffer did not complete.
    pub error: Option<String>,
}

impl ExecutionReport {
    /// `true` when the command buffer completed.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// A copy of a presented swapchain image.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReadback {
    /// Frame the image shows.
    pub frame: u64,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// RGBA8 texels, rows top to bottom.
    pub pixels: Vec<[u8; 4]>,
}

impl FrameReadback {
    /// Texels as a flat byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Texel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Converts to an [`image::RgbaImage`].
    pub fn to_image(&self) -> anyhow::Result<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.as_bytes().to_vec())
            .with_context(|| {
                format!(
                    "{} texels do not fill a {}x{} image",
                    self.pixels.len(),
                    self.width,
                    self.height
                )
            })
    }

    /// Writes the image as a PNG file.
    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        self.to_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write frame {} to {}", self.frame, path.display()))
    }
}
