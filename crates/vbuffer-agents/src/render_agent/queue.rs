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

//! Emulated GPU queues.
//!
//! Each [`Queue`] owns a worker thread executing submissions in order. A
//! submission waits its semaphores, runs its command buffer, then always
//! signals its semaphores and its fence, so a failure never stalls the
//! other queue; the failure itself travels through the fence to the next
//! CPU wait.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context};
use crossbeam_channel::{Receiver, Sender};
use vbuffer_core::lane::{LaneContext, LaneRegistry};
use vbuffer_core::renderer::{
    BufferBarrier, Fence, RenderError, ResourceError, ResourceState, Semaphore,
};
use vbuffer_core::telemetry::{PassTiming, QueueKind, TimingSink};
use vbuffer_lanes::culling_lane::{
    clear_draw_arguments, compact_batches, filter_triangles, CompactionStats, FilterInputs,
    FilterStats, ViewOutput,
};
use vbuffer_lanes::light_lane::LightClusterStats;
use vbuffer_lanes::render_lane::{FrameInfo, PresentTarget};
use vbuffer_lanes::{FrameResources, GpuScene, ViewResources};

use super::command::{Command, CommandBuffer, FrameBarrier, FrameBuffer};
use super::report::{ExecutionReport, ExecutionStats};

/// A command buffer with its synchronisation.
#[derive(Debug)]
pub struct Submission {
    /// Commands to execute.
    pub cmd: CommandBuffer,
    /// Consumed before execution starts.
    pub wait_semaphores: Vec<Arc<Semaphore>>,
    /// Signalled once execution ends, successful or not.
    pub signal_semaphores: Vec<Arc<Semaphore>>,
    /// Signalled last.
    pub signal_fence: Option<Arc<Fence>>,
}

impl Submission {
    /// A submission without synchronisation.
    pub fn new(cmd: CommandBuffer) -> Self {
        Self {
            cmd,
            wait_semaphores: Vec::new(),
            signal_semaphores: Vec::new(),
            signal_fence: None,
        }
    }
}

enum QueueMessage {
    Submit(Box<Submission>),
    Shutdown,
}

/// What a queue worker starts from.
pub struct QueueSetup {
    /// Queue identity, used in thread names, logs and reports.
    pub kind: QueueKind,
    /// Scene read by the kernels and passes.
    pub scene: Arc<GpuScene>,
    /// Lanes reachable through [`Command::RunLane`].
    pub registry: LaneRegistry,
    /// Entries kept across submissions (render targets of the graphics queue).
    pub context: LaneContext,
    /// Receives the marker ranges.
    pub timings: Arc<dyn TimingSink>,
    /// Receives one report per submission.
    pub reports: Sender<ExecutionReport>,
}

/// A queue and its worker thread.
#[derive(Debug)]
pub struct Queue {
    kind: QueueKind,
    sender: Sender<QueueMessage>,
    handle: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for QueueMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueMessage::Submit(s) => write!(f, "Submit({})", s.cmd.label()),
            QueueMessage::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl Queue {
    /// Spawns the worker thread.
    pub fn spawn(setup: QueueSetup) -> Result<Self, RenderError> {
        let kind = setup.kind;
        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut executor = QueueExecutor::new(setup)?;
        let handle = thread::Builder::new()
            .name(format!("{kind}-queue"))
            .spawn(move || executor.run(receiver))
            .map_err(|e| RenderError::Internal(format!("failed to spawn the {kind} queue: {e}")))?;
        log::info!("RenderAgent: {kind} queue started");
        Ok(Self {
            kind,
            sender,
            handle: Some(handle),
        })
    }

    /// Queue identity.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Queues a submission. Its fence reads as incomplete from now on.
    pub fn submit(&self, submission: Submission) -> Result<(), RenderError> {
        let fence = submission.signal_fence.clone();
        if let Some(fence) = &fence {
            fence.reset_for_submit()?;
        }
        if self
            .sender
            .send(QueueMessage::Submit(Box::new(submission)))
            .is_err()
        {
            let message = format!("the {} queue worker has stopped", self.kind);
            if let Some(fence) = &fence {
                fence.signal_failed(self.kind.as_str(), message.clone())?;
            }
            return Err(RenderError::QueueDisconnected(self.kind.to_string()));
        }
        Ok(())
    }

    /// Stops the worker after the queued submissions ran.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(QueueMessage::Shutdown);
            if handle.join().is_err() {
                log::error!("RenderAgent: the {} queue worker panicked", self.kind);
            } else {
                log::info!("RenderAgent: {} queue stopped", self.kind);
            }
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct QueueExecutor {
    kind: QueueKind,
    scene: Arc<GpuScene>,
    registry: LaneRegistry,
    context: LaneContext,
    timings: Arc<dyn TimingSink>,
    reports: Sender<ExecutionReport>,
}

impl QueueExecutor {
    fn new(setup: QueueSetup) -> Result<Self, RenderError> {
        let QueueSetup {
            kind,
            scene,
            registry,
            mut context,
            timings,
            reports,
        } = setup;
        context.insert(scene.clone());
        registry.initialize_all(&mut context)?;
        Ok(Self {
            kind,
            scene,
            registry,
            context,
            timings,
            reports,
        })
    }

    fn run(&mut self, receiver: Receiver<QueueMessage>) {
        while let Ok(message) = receiver.recv() {
            match message {
                QueueMessage::Submit(submission) => self.process(*submission),
                QueueMessage::Shutdown => break,
            }
        }
        self.registry.shutdown_all(&mut self.context);
    }

    fn process(&mut self, submission: Submission) {
        let started = Instant::now();
        let cmd = &submission.cmd;
        let result = submission
            .wait_semaphores
            .iter()
            .try_for_each(|s| s.wait())
            .context("semaphore wait failed")
            .and_then(|()| self.execute(cmd));

        let (stats, error) = match result {
            Ok(stats) => (stats, None),
            Err(e) => {
                let message = format!("{e:#}");
                log::error!(
                    "RenderAgent: {} command buffer '{}' of frame {} failed: {}",
                    self.kind,
                    cmd.label(),
                    cmd.frame(),
                    message
                );
                (ExecutionStats::default(), Some(message))
            }
        };
        // Sent before the fence so a CPU wait on it also sees the report.
        let _ = self.reports.send(ExecutionReport {
            queue: self.kind,
            frame: cmd.frame(),
            label: cmd.label().to_string(),
            stats,
            duration: started.elapsed(),
            error: error.clone(),
        });

        for semaphore in &submission.signal_semaphores {
            if let Err(e) = semaphore.signal() {
                log::error!("RenderAgent: {} queue failed to signal: {}", self.kind, e);
            }
        }
        if let Some(fence) = &submission.signal_fence {
            let signalled = match error {
                None => fence.signal(),
                Some(message) => fence.signal_failed(self.kind.as_str(), message),
            };
            if let Err(e) = signalled {
                log::error!("RenderAgent: {} queue failed to signal: {}", self.kind, e);
            }
        }
    }

    /// Runs `cmd`. On failure the barriers it applied are undone in reverse
    /// order, so the slot and the swapchain image are back in the states the
    /// next submission was recorded against.
    fn execute(&mut self, cmd: &CommandBuffer) -> anyhow::Result<ExecutionStats> {
        let mut applied = AppliedBarriers::default();
        let result = self.run_commands(cmd, &mut applied);
        if result.is_err() {
            applied.roll_back(cmd);
        }
        result
    }

    fn run_commands(
        &mut self,
        cmd: &CommandBuffer,
        applied: &mut AppliedBarriers,
    ) -> anyhow::Result<ExecutionStats> {
        let frame = cmd.resources();
        self.context.insert(frame.clone());
        self.context.insert(FrameInfo {
            frame_count: cmd.frame(),
        });
        match cmd.present() {
            Some(target) => self.context.insert(target.clone()),
            None => {
                self.context.remove::<PresentTarget>();
            }
        }
        self.context.remove::<LightClusterStats>();

        let mut stats = ExecutionStats::default();
        let mut markers: Vec<(&'static str, Instant)> = Vec::new();

        for (index, command) in cmd.commands().iter().enumerate() {
            let step = || format!("command {index} of '{}'", cmd.label());
            match command {
                Command::Barrier(barriers) => {
                    for barrier in barriers {
                        apply_barrier(frame, barrier).with_context(step)?;
                        applied.frame.push(*barrier);
                    }
                }
                Command::SwapchainBarrier(barrier) => {
                    let target = cmd
                        .present()
                        .ok_or_else(|| anyhow!("no swapchain image attached"))
                        .with_context(step)?;
                    target.image.transition(*barrier).with_context(step)?;
                    applied.swapchain.push(*barrier);
                }
                Command::BeginMarker(name) => markers.push((*name, Instant::now())),
                Command::EndMarker => {
                    if let Some((name, start)) = markers.pop() {
                        self.timings.record(PassTiming {
                            queue: self.kind,
                            name: name.to_string(),
                            frame: cmd.frame(),
                            duration: start.elapsed(),
                        });
                    }
                }
                Command::ClearDrawArguments => {
                    for view in &frame.views {
                        let mut uncompacted = view.uncompacted.write().with_context(step)?;
                        let mut indirect = view.indirect.write().with_context(step)?;
                        clear_draw_arguments(&mut uncompacted[..], &mut indirect[..]);
                    }
                }
                Command::FilterTriangles {
                    first_batch,
                    batch_count,
                } => {
                    let dispatch = self
                        .filter(frame, *first_batch, *batch_count)
                        .with_context(step)?;
                    stats.filter.accumulate(&dispatch);
                }
                Command::CompactBatches => {
                    for (view, resources) in frame.views.iter().enumerate() {
                        stats.compaction[view] = self.compact(resources).with_context(step)?;
                    }
                }
                Command::RunLane(name) => {
                    let lane = self.registry.get(name).ok_or_else(|| {
                        anyhow!("lane '{name}' is not registered on the {} queue", self.kind)
                    })?;
                    lane.execute(&mut self.context)
                        .with_context(|| format!("lane '{name}' of '{}'", cmd.label()))?;
                }
            }
        }

        stats.lights = self.context.remove::<LightClusterStats>();
        Ok(stats)
    }

    fn filter(
        &self,
        frame: &FrameResources,
        first_batch: u32,
        batch_count: u32,
    ) -> anyhow::Result<FilterStats> {
        let constants = frame.read_constants(ResourceState::SHADER_RESOURCE)?;
        let uploaded = frame
            .filter_batches
            .read(ResourceState::SHADER_RESOURCE)?;
        let range = first_batch as usize..(first_batch + batch_count) as usize;
        let batches = uploaded.get(range.clone()).ok_or_else(|| {
            anyhow!(
                "dispatch reads batches {range:?}, {} were uploaded",
                uploaded.len()
            )
        })?;

        let [shadow, camera] = &frame.views;
        let mut shadow_uncompacted = shadow.uncompacted.write()?;
        let mut shadow_indices = shadow.filtered_indices.write()?;
        let mut camera_uncompacted = camera.uncompacted.write()?;
        let mut camera_indices = camera.filtered_indices.write()?;
        // Indexed like the per-frame view transforms.
        let mut outputs = [
            ViewOutput {
                uncompacted: &mut shadow_uncompacted[..],
                filtered_indices: &mut shadow_indices[..],
            },
            ViewOutput {
                uncompacted: &mut camera_uncompacted[..],
                filtered_indices: &mut camera_indices[..],
            },
        ];
        let inputs = FilterInputs {
            scene: &self.scene,
            constants: &constants,
        };
        Ok(filter_triangles(batches, &inputs, &mut outputs)?)
    }

    fn compact(&self, view: &ViewResources) -> anyhow::Result<CompactionStats> {
        let uncompacted = view.uncompacted.read(ResourceState::SHADER_RESOURCE)?;
        let mut indirect = view.indirect.write()?;
        Ok(compact_batches(&self.scene, &uncompacted[..], &mut indirect[..])?)
    }
}

/// Barriers applied so far by the running command buffer.
#[derive(Default)]
struct AppliedBarriers {
    frame: Vec<FrameBarrier>,
    swapchain: Vec<BufferBarrier>,
}

impl AppliedBarriers {
    fn roll_back(self, cmd: &CommandBuffer) {
        let frame = cmd.resources();
        for barrier in self.frame.into_iter().rev() {
            if let Err(e) = apply_barrier(frame, &barrier.reversed()) {
                log::error!(
                    "RenderAgent: could not restore {:?} of frame slot {}: {}",
                    barrier.buffer,
                    frame.slot,
                    e
                );
            }
        }
        if let Some(target) = cmd.present() {
            for barrier in self.swapchain.into_iter().rev() {
                if let Err(e) = target.image.transition(barrier.reversed()) {
                    log::error!(
                        "RenderAgent: could not restore swapchain image {}: {}",
                        target.image_index,
                        e
                    );
                }
            }
        }
    }
}

fn apply_barrier(frame: &FrameResources, barrier: &FrameBarrier) -> Result<(), ResourceError> {
    let b = barrier.barrier;
    let view = |index: usize| {
        frame.views.get(index).ok_or_else(|| ResourceError::OutOfBounds {
            label: format!("frame {} views", frame.slot),
            index,
            len: frame.views.len(),
        })
    };
    match barrier.buffer {
        FrameBuffer::Constants => frame.constants.transition(b),
        FrameBuffer::FilterBatches => frame.filter_batches.transition(b),
        FrameBuffer::Uncompacted(v) => view(v)?.uncompacted.transition(b),
        FrameBuffer::FilteredIndices(v) => view(v)?.filtered_indices.transition(b),
        FrameBuffer::Indirect(v) => view(v)?.indirect.transition(b),
        FrameBuffer::LightClusterCounts => frame.light_cluster_counts.transition(b),
        FrameBuffer::LightClusters => frame.light_clusters.transition(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vbuffer_core::renderer::FenceStatus;
    use vbuffer_core::telemetry::NullTimingSink;

    fn empty_scene() -> Arc<GpuScene> {
        Arc::new(GpuScene {
            positions: Vec::new(),
            normals: Vec::new(),
            texcoords: Vec::new(),
            indices: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            lights: Vec::new(),
            bounds: vbuffer_core::math::Aabb::INVALID,
        })
    }

    fn spawn(kind: QueueKind) -> (Queue, Receiver<ExecutionReport>) {
        let (reports, receiver) = crossbeam_channel::unbounded();
        let queue = Queue::spawn(QueueSetup {
            kind,
            scene: empty_scene(),
            registry: LaneRegistry::new(),
            context: LaneContext::new(),
            timings: Arc::new(NullTimingSink),
            reports,
        })
        .unwrap();
        (queue, receiver)
    }

    fn frame() -> Arc<FrameResources> {
        Arc::new(FrameResources::new(0, 4, 2))
    }

    #[test]
    fn test_clear_and_compact_on_an_empty_frame() {
        let (queue, reports) = spawn(QueueKind::Compute);
        let resources = frame();
        let mut cmd = CommandBuffer::new("compute", 0, resources.clone());
        cmd.encode_filtering(&Default::default());

        let fence = Arc::new(Fence::new("compute fence 0"));
        let mut submission = Submission::new(cmd);
        submission.signal_fence = Some(fence.clone());
        queue.submit(submission).unwrap();
        fence.wait().unwrap();

        let report = reports.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.stats.draws(1), 0);
        assert_eq!(
            resources.views[1].uncompacted.state().unwrap(),
            ResourceState::SHADER_RESOURCE
        );
    }

    #[test]
    fn test_failure_reaches_the_fence_and_still_signals() {
        let (queue, reports) = spawn(QueueKind::Graphics);
        let mut cmd = CommandBuffer::new("graphics", 7, frame());
        cmd.push(Command::RunLane("Missing"));

        let fence = Arc::new(Fence::new("graphics fence 1"));
        let semaphore = Arc::new(Semaphore::new("graphics semaphore 1"));
        let mut submission = Submission::new(cmd);
        submission.signal_fence = Some(fence.clone());
        submission.signal_semaphores.push(semaphore.clone());
        queue.submit(submission).unwrap();

        let err = fence.wait().unwrap_err();
        assert!(matches!(&err, RenderError::QueueFailed { queue, .. } if queue == "graphics"));
        assert!(err.to_string().contains("Missing"));
        assert!(semaphore.wait_timeout(Duration::from_secs(5)).unwrap());
        let report = reports.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.frame, 7);
        assert!(!report.succeeded());
    }

    #[test]
    fn test_submission_waits_its_semaphore() {
        let (queue, _reports) = spawn(QueueKind::Graphics);
        let gate = Arc::new(Semaphore::new("gate"));
        let fence = Arc::new(Fence::new("graphics fence 0"));
        let mut submission = Submission::new(CommandBuffer::new("graphics", 0, frame()));
        submission.wait_semaphores.push(gate.clone());
        submission.signal_fence = Some(fence.clone());
        queue.submit(submission).unwrap();

        assert!(!fence.wait_timeout(Duration::from_millis(50)).unwrap());
        assert_eq!(fence.status().unwrap(), FenceStatus::Incomplete);
        gate.signal().unwrap();
        assert!(fence.wait_timeout(Duration::from_secs(5)).unwrap());
    }

    #[test]
    fn test_failed_submission_restores_slot_states() {
        let (queue, _reports) = spawn(QueueKind::Compute);
        let resources = frame();
        let mut cmd = CommandBuffer::new("compute", 0, resources.clone());
        cmd.barrier(vec![FrameBarrier::new(
            FrameBuffer::Uncompacted(1),
            ResourceState::SHADER_RESOURCE,
            ResourceState::UNORDERED_ACCESS,
        )]);
        cmd.push(Command::RunLane("Missing"));
        cmd.barrier(vec![FrameBarrier::new(
            FrameBuffer::Uncompacted(1),
            ResourceState::UNORDERED_ACCESS,
            ResourceState::SHADER_RESOURCE,
        )]);
        let fence = Arc::new(Fence::new("compute fence 0"));
        let mut submission = Submission::new(cmd);
        submission.signal_fence = Some(fence.clone());
        queue.submit(submission).unwrap();
        assert!(fence.wait().is_err());
        assert_eq!(
            resources.views[1].uncompacted.state().unwrap(),
            ResourceState::SHADER_RESOURCE
        );

        // The slot is usable again by the next frame's filtering.
        let mut cmd = CommandBuffer::new("compute", 1, resources.clone());
        cmd.encode_filtering(&Default::default());
        let mut submission = Submission::new(cmd);
        submission.signal_fence = Some(fence.clone());
        queue.submit(submission).unwrap();
        fence.wait().unwrap();
    }

    #[test]
    fn test_bad_barrier_fails_the_submission() {
        let (queue, _reports) = spawn(QueueKind::Compute);
        let mut cmd = CommandBuffer::new("compute", 0, frame());
        // Filtered indices start in UNORDERED_ACCESS.
        cmd.barrier(vec![FrameBarrier::new(
            FrameBuffer::FilteredIndices(0),
            ResourceState::SHADER_RESOURCE,
            ResourceState::UNORDERED_ACCESS,
        )]);
        let fence = Arc::new(Fence::new("compute fence 0"));
        let mut submission = Submission::new(cmd);
        submission.signal_fence = Some(fence.clone());
        queue.submit(submission).unwrap();
        assert!(matches!(fence.wait(), Err(RenderError::QueueFailed { .. })));
    }
}
