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

//! Command buffers recorded by the render agent and replayed by the queues.
//!
//! A [`CommandBuffer`] targets one frame slot. Its commands name the slot's
//! buffers through [`FrameBuffer`] instead of borrowing them, so the buffer
//! can be moved to a queue thread while the agent keeps recording the next
//! frame.

use std::sync::Arc;

use vbuffer_core::renderer::{BufferBarrier, RenderMode, ResourceState, NUM_CULLING_VIEWPORTS};
use vbuffer_lanes::culling_lane::BatchOutput;
use vbuffer_lanes::render_lane::{pass_sequence, PresentTarget};
use vbuffer_lanes::FrameResources;

/// Name of the light clustering lane.
pub const LIGHT_CLUSTERING_LANE: &str = "LightClustering";

/// Timing marker names of the compute work.
pub mod markers {
    /// Clearing the draw arguments.
    pub const CLEAR_BUFFERS: &str = "Clear Buffers";
    /// All filter dispatches of the frame.
    pub const TRIANGLE_FILTERING: &str = "Triangle Filtering";
    /// Compaction of both views.
    pub const BATCH_COMPACTION: &str = "Batch Compaction";
    /// Light binning.
    pub const LIGHT_CLUSTERING: &str = "Light Clustering";
}

/// A buffer of the frame slot a command buffer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBuffer {
    /// Per-frame constants.
    Constants,
    /// Uploaded filter batches.
    FilterBatches,
    /// Uncompacted draw arguments of a view.
    Uncompacted(usize),
    /// Filtered index buffer of a view.
    FilteredIndices(usize),
    /// Indirect draw arguments of a view.
    Indirect(usize),
    /// Lights per tile.
    LightClusterCounts,
    /// Light ids per tile.
    LightClusters,
}

/// A barrier on one buffer of the frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBarrier {
    /// Buffer to transition.
    pub buffer: FrameBuffer,
    /// The transition.
    pub barrier: BufferBarrier,
}

impl FrameBarrier {
    /// Barrier on `buffer` from `before` to `after`.
    pub fn new(buffer: FrameBuffer, before: ResourceState, after: ResourceState) -> Self {
        Self {
            buffer,
            barrier: BufferBarrier::new(before, after),
        }
    }

    /// The barrier restoring the previous state.
    pub fn reversed(self) -> Self {
        Self {
            buffer: self.buffer,
            barrier: self.barrier.reversed(),
        }
    }
}

/// One recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// State transitions of frame slot buffers, applied in order.
    Barrier(Vec<FrameBarrier>),
    /// State transition of the acquired swapchain image.
    SwapchainBarrier(BufferBarrier),
    /// Opens a timed range.
    BeginMarker(&'static str),
    /// Closes the innermost timed range.
    EndMarker,
    /// Zeroes the draw arguments of both views.
    ClearDrawArguments,
    /// Runs the triangle filter over `batch_count` uploaded batches starting
    /// at `first_batch`.
    FilterTriangles {
        /// First uploaded batch read.
        first_batch: u32,
        /// Batches read.
        batch_count: u32,
    },
    /// Compacts the draw arguments of both views.
    CompactBatches,
    /// Executes a lane registered on the queue.
    RunLane(&'static str),
}

/// Barriers moving the filter and light clustering outputs into the states
/// the graphics passes read them in.
pub fn graphics_read_barriers() -> Vec<FrameBarrier> {
    let mut barriers = Vec::with_capacity(NUM_CULLING_VIEWPORTS * 2 + 2);
    for view in 0..NUM_CULLING_VIEWPORTS {
        barriers.push(FrameBarrier::new(
            FrameBuffer::Indirect(view),
            ResourceState::UNORDERED_ACCESS,
            ResourceState::INDIRECT_ARGUMENT | ResourceState::SHADER_RESOURCE,
        ));
        barriers.push(FrameBarrier::new(
            FrameBuffer::FilteredIndices(view),
            ResourceState::UNORDERED_ACCESS,
            ResourceState::INDEX_BUFFER | ResourceState::SHADER_RESOURCE,
        ));
    }
    for buffer in [FrameBuffer::LightClusterCounts, FrameBuffer::LightClusters] {
        barriers.push(FrameBarrier::new(
            buffer,
            ResourceState::UNORDERED_ACCESS,
            ResourceState::SHADER_RESOURCE,
        ));
    }
    barriers
}

fn uncompacted_barriers(before: ResourceState, after: ResourceState) -> Vec<FrameBarrier> {
    (0..NUM_CULLING_VIEWPORTS)
        .map(|view| FrameBarrier::new(FrameBuffer::Uncompacted(view), before, after))
        .collect()
}

/// Commands for one queue submission.
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    label: String,
    frame: u64,
    resources: Arc<FrameResources>,
    present: Option<PresentTarget>,
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// An empty command buffer for frame `frame`, targeting `resources`.
    pub fn new(label: impl Into<String>, frame: u64, resources: Arc<FrameResources>) -> Self {
        Self {
            label: label.into(),
            frame,
            resources,
            present: None,
            commands: Vec::new(),
        }
    }

    /// Attaches the swapchain image the buffer presents into.
    pub fn with_present(mut self, target: PresentTarget) -> Self {
        self.present = Some(target);
        self
    }

    /// Debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Frame the commands belong to.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Frame slot the commands read and write.
    pub fn resources(&self) -> &Arc<FrameResources> {
        &self.resources
    }

    /// Swapchain image the buffer presents into, if any.
    pub fn present(&self) -> Option<&PresentTarget> {
        self.present.as_ref()
    }

    /// Recorded commands in execution order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Appends a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Appends a barrier command; empty lists are skipped.
    pub fn barrier(&mut self, barriers: Vec<FrameBarrier>) {
        if !barriers.is_empty() {
            self.commands.push(Command::Barrier(barriers));
        }
    }

    /// Records `record` between a begin and an end marker named `name`.
    pub fn timed(&mut self, name: &'static str, record: impl FnOnce(&mut Self)) {
        self.commands.push(Command::BeginMarker(name));
        record(self);
        self.commands.push(Command::EndMarker);
    }

    /// Clears, filters and compacts the frame's draws.
    ///
    /// Dispatches read the uploaded batches back to back, in the order of
    /// `batches.dispatches`. Afterwards the uncompacted arguments are back in
    /// `SHADER_RESOURCE`, the filtered indices and indirect arguments stay in
    /// `UNORDERED_ACCESS`.
    pub fn encode_filtering(&mut self, batches: &BatchOutput) {
        self.barrier(uncompacted_barriers(
            ResourceState::SHADER_RESOURCE,
            ResourceState::UNORDERED_ACCESS,
        ));
        self.timed(markers::CLEAR_BUFFERS, |cmd| cmd.push(Command::ClearDrawArguments));

        self.timed(markers::TRIANGLE_FILTERING, |cmd| {
            let mut first_batch = 0u32;
            for dispatch in &batches.dispatches {
                let batch_count = dispatch.batches.len() as u32;
                cmd.push(Command::FilterTriangles {
                    first_batch,
                    batch_count,
                });
                first_batch += batch_count;
            }
        });

        self.barrier(uncompacted_barriers(
            ResourceState::UNORDERED_ACCESS,
            ResourceState::SHADER_RESOURCE,
        ));
        self.timed(markers::BATCH_COMPACTION, |cmd| cmd.push(Command::CompactBatches));
    }

    /// Bins the scene lights into the tile grid.
    pub fn encode_light_clustering(&mut self) {
        self.timed(markers::LIGHT_CLUSTERING, |cmd| {
            cmd.push(Command::RunLane(LIGHT_CLUSTERING_LANE))
        });
    }

    /// Draws the frame into the attached swapchain image.
    ///
    /// Every read barrier is undone at the end so the next compute
    /// submission on the slot finds its outputs writable again.
    pub fn encode_graphics(&mut self, mode: RenderMode) {
        let reads = graphics_read_barriers();
        let restores = reads.iter().map(|b| b.reversed()).collect();
        let acquire = BufferBarrier::new(ResourceState::PRESENT, ResourceState::RENDER_TARGET);

        self.barrier(reads);
        self.push(Command::SwapchainBarrier(acquire));
        for pass in pass_sequence(mode) {
            self.timed(pass, |cmd| cmd.push(Command::RunLane(pass)));
        }
        self.barrier(restores);
        self.push(Command::SwapchainBarrier(acquire.reversed()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::FilterBatchData;
    use vbuffer_lanes::culling_lane::FilterDispatch;

    fn frame() -> Arc<FrameResources> {
        Arc::new(FrameResources::new(0, 12, 4))
    }

    fn dispatch(chunk_index: u32, batches: usize) -> FilterDispatch {
        FilterDispatch {
            chunk_index,
            batches: vec![FilterBatchData::default(); batches],
        }
    }

    #[test]
    fn test_filter_dispatches_read_consecutive_batches() {
        let output = BatchOutput {
            dispatches: vec![dispatch(0, 3), dispatch(1, 2)],
            ..Default::default()
        };
        let mut cmd = CommandBuffer::new("compute", 4, frame());
        cmd.encode_filtering(&output);

        let filters: Vec<_> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::FilterTriangles {
                    first_batch,
                    batch_count,
                } => Some((*first_batch, *batch_count)),
                _ => None,
            })
            .collect();
        assert_eq!(filters, vec![(0, 3), (3, 2)]);

        // Clear runs before any filter, compaction after all of them.
        let position = |wanted: &Command| cmd.commands().iter().position(|c| c == wanted);
        let clear = position(&Command::ClearDrawArguments).unwrap();
        let compact = position(&Command::CompactBatches).unwrap();
        let first_filter = cmd
            .commands()
            .iter()
            .position(|c| matches!(c, Command::FilterTriangles { .. }))
            .unwrap();
        assert!(clear < first_filter && first_filter < compact);
    }

    #[test]
    fn test_markers_are_balanced() {
        let mut cmd = CommandBuffer::new("graphics", 0, frame());
        cmd.encode_filtering(&BatchOutput::default());
        cmd.encode_light_clustering();
        cmd.encode_graphics(RenderMode::VisibilityBuffer);

        let mut depth = 0i32;
        for command in cmd.commands() {
            match command {
                Command::BeginMarker(_) => depth += 1,
                Command::EndMarker => {
                    depth -= 1;
                    assert!(depth >= 0);
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_graphics_restores_every_state_it_changes() {
        let mut cmd = CommandBuffer::new("graphics", 0, frame());
        cmd.encode_graphics(RenderMode::Deferred);

        let barriers: Vec<&Vec<FrameBarrier>> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::Barrier(b) => Some(b),
                _ => None,
            })
            .collect();
        assert_eq!(barriers.len(), 2);
        for (read, restore) in barriers[0].iter().zip(barriers[1].iter()) {
            assert_eq!(restore.buffer, read.buffer);
            assert_eq!(restore.barrier.after, read.barrier.before);
        }

        let lanes: Vec<&str> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::RunLane(name) => Some(*name),
                _ => None,
            })
            .collect();
        assert_eq!(lanes, pass_sequence(RenderMode::Deferred).to_vec());
        assert_eq!(
            cmd.commands().last(),
            Some(&Command::SwapchainBarrier(BufferBarrier::new(
                ResourceState::RENDER_TARGET,
                ResourceState::PRESENT
            )))
        );
    }
}
