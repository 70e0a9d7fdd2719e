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

//! The render agent and the emulated GPU it drives.
//!
//! ```text
//! draw(N)  ── record ──► compute queue:  clear → filter → compact → light clustering   (slot N)
//!          └─ record ──► graphics queue: shadow → VB/GBuffer → AO → shade → present  (slot N-1)
//! ```
//!
//! The compute submission of frame N signals the semaphore the graphics
//! submission of frame N waits on one draw later; fences let the CPU reuse a
//! slot only once both queues are done with it.

mod agent;
mod cmd_ring;
mod command;
mod metrics;
mod pipeline;
mod queue;
mod report;
mod swapchain;

pub use agent::{RenderAgent, CAMERA_WALK_STEP};
pub use cmd_ring::{CmdRing, CmdRingElement};
pub use command::{
    graphics_read_barriers, markers, Command, CommandBuffer, FrameBarrier, FrameBuffer,
    LIGHT_CLUSTERING_LANE,
};
pub use metrics::AgentMetrics;
pub use queue::{Queue, QueueSetup, Submission};
pub use report::{ExecutionReport, ExecutionStats, FrameReadback, FrameReport};
pub use swapchain::{PresentedFrame, Swapchain, SWAPCHAIN_IMAGE_COUNT};
