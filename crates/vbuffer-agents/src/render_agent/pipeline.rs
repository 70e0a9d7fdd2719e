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

//! Everything that exists while a scene is loaded: frame slots, queues,
//! cmd rings, the swapchain and the record-time lanes.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use vbuffer_core::lane::{LaneContext, LaneError, LaneRegistry};
use vbuffer_core::renderer::{
    AppSettings, ClusterContainer, FrameRing, PerFrameConstants, RenderError, Semaphore,
};
use vbuffer_core::telemetry::{QueueKind, TimingSink};
use vbuffer_data::Camera;
use vbuffer_lanes::cluster_lane::ClusterLane;
use vbuffer_lanes::culling_lane::{CullingLane, FilterPlan};
use vbuffer_lanes::light_lane::LightClusterLane;
use vbuffer_lanes::render_lane::{register_render_lanes, RenderTargets};
use vbuffer_lanes::uniform_lane::{FrameUniforms, UniformLane};
use vbuffer_lanes::{FilterError, FrameResources, GpuScene, UniformError};

use super::cmd_ring::CmdRing;
use super::command::CommandBuffer;
use super::queue::{Queue, QueueSetup, Submission};
use super::report::{ExecutionReport, FrameReadback, FrameReport};
use super::swapchain::Swapchain;

const CLUSTER_BUILD_LANE: &str = "ClusterBuild";
const UNIFORM_UPDATE_LANE: &str = "UniformUpdate";
const CLUSTER_CULLING_LANE: &str = "ClusterCulling";

/// Maps a record-time lane failure to the error the caller acts on.
fn lane_failure(error: LaneError) -> RenderError {
    match error {
        LaneError::ExecutionFailed(inner) => match inner.downcast::<FilterError>() {
            Ok(filter) => RenderError::from(*filter),
            Err(inner) => match inner.downcast::<UniformError>() {
                Ok(uniform) => RenderError::from(*uniform),
                Err(inner) => RenderError::Lane(LaneError::ExecutionFailed(inner)),
            },
        },
        other => RenderError::Lane(other),
    }
}

struct RecordedFrame {
    slot: usize,
    resources: Arc<FrameResources>,
    plan: Option<FilterPlan>,
}

pub(crate) struct Pipeline {
    scene: Arc<GpuScene>,
    record_lanes: LaneRegistry,
    // Scene, clusters, batch builder, settings and camera of the CPU side.
    record_ctx: LaneContext,
    frames: FrameRing<Arc<FrameResources>>,
    // Slots holding filtered results, for hold mode.
    filtered: Vec<bool>,
    graphics: Queue,
    compute: Queue,
    graphics_ring: CmdRing,
    compute_ring: CmdRing,
    swapchain: Swapchain,
    reports: Receiver<ExecutionReport>,
    cluster_count: usize,
}

impl Pipeline {
    /// Builds the pipeline for `scene`. Clusters are built when not given.
    pub fn new(
        scene: Arc<GpuScene>,
        clusters: Option<Vec<ClusterContainer>>,
        settings: &AppSettings,
        timings: Arc<dyn TimingSink>,
    ) -> Result<Self, RenderError> {
        let mut record_lanes = LaneRegistry::new();
        record_lanes.register(Box::new(ClusterLane::new()));
        record_lanes.register(Box::new(UniformLane::new()));
        record_lanes.register(Box::new(CullingLane::new()));

        let mut record_ctx = LaneContext::new();
        record_ctx.insert(scene.clone());
        record_ctx.insert(settings.clone());
        record_lanes.initialize_all(&mut record_ctx)?;
        match clusters {
            Some(clusters) => record_ctx.insert(clusters),
            None => run_lane(&record_lanes, &mut record_ctx, CLUSTER_BUILD_LANE)?,
        }
        let cluster_count = record_ctx
            .get::<Vec<ClusterContainer>>()
            .map_or(0, |c| c.iter().map(ClusterContainer::cluster_count).sum());

        let slot_count = settings.data_buffer_count as usize;
        let total_triangles = scene.total_triangles();
        let frames = FrameRing::new(slot_count, |slot| {
            Arc::new(FrameResources::new(slot, total_triangles, cluster_count.max(1)))
        })
        .ok_or_else(|| RenderError::Internal("no frame slots requested".into()))?;

        let (report_tx, reports) = crossbeam_channel::unbounded();

        let mut graphics_registry = LaneRegistry::new();
        register_render_lanes(&mut graphics_registry);
        graphics_registry.register(Box::new(LightClusterLane::new()));
        let mut graphics_ctx = LaneContext::new();
        graphics_ctx.insert(RenderTargets::new(
            settings.width,
            settings.height,
            settings.shadow_map_size,
        ));
        let graphics = Queue::spawn(QueueSetup {
            kind: QueueKind::Graphics,
            scene: scene.clone(),
            registry: graphics_registry,
            context: graphics_ctx,
            timings: timings.clone(),
            reports: report_tx.clone(),
        })?;

        let mut compute_registry = LaneRegistry::new();
        compute_registry.register(Box::new(LightClusterLane::new()));
        let compute = Queue::spawn(QueueSetup {
            kind: QueueKind::Compute,
            scene: scene.clone(),
            registry: compute_registry,
            context: LaneContext::new(),
            timings,
            reports: report_tx,
        })?;

        log::info!(
            "RenderAgent: pipeline ready - {} triangles, {} clusters, {} frame slots, {}x{}",
            total_triangles,
            cluster_count,
            slot_count,
            settings.width,
            settings.height
        );

        Ok(Self {
            scene,
            record_lanes,
            record_ctx,
            frames,
            filtered: vec![false; slot_count],
            graphics,
            compute,
            graphics_ring: CmdRing::new(QueueKind::Graphics, slot_count)?,
            compute_ring: CmdRing::new(QueueKind::Compute, slot_count)?,
            swapchain: Swapchain::new(settings.width, settings.height),
            reports,
            cluster_count,
        })
    }

    /// Scene shared with both queues.
    pub fn scene(&self) -> &Arc<GpuScene> {
        &self.scene
    }

    /// Clusters built at load.
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Resources of frame slot `slot`.
    pub fn frame_resources(&self, slot: usize) -> Option<&Arc<FrameResources>> {
        self.frames.get(slot)
    }

    /// Stops the queues and hands back the scene and its clusters.
    pub fn into_scene(mut self) -> (Arc<GpuScene>, Option<Vec<ClusterContainer>>) {
        let clusters = self.record_ctx.remove::<Vec<ClusterContainer>>();
        self.graphics.shutdown();
        self.compute.shutdown();
        (self.scene, clusters)
    }

    /// Async compute: filters frame `frame` on the compute queue and draws
    /// frame `frame - 1` on the graphics queue.
    pub fn draw_async(
        &mut self,
        frame: u64,
        async_start_frame: u64,
        settings: &AppSettings,
        camera: &Camera,
    ) -> Result<FrameReport, RenderError> {
        let slot = self.frames.index_of(frame);
        let compute = self.compute_ring.element(slot)?.clone();
        compute.fence.wait()?;
        // The graphics submission that last read this slot.
        self.graphics_ring.element(slot)?.fence.wait()?;

        let recorded = self.record_frame(frame, settings, camera)?;
        let mut cmd = CommandBuffer::new("compute", frame, recorded.resources.clone());
        if let Some(plan) = &recorded.plan {
            cmd.encode_filtering(&plan.batches);
        }
        if settings.render_local_lights {
            cmd.encode_light_clustering();
        }

        let mut submission = Submission::new(cmd);
        if frame > async_start_frame + 1 {
            // Graphics submitted by the previous draw, which read slot frame - 2.
            let previous = self.graphics_ring.for_frame(frame - 2);
            submission.wait_semaphores.push(previous.semaphore.clone());
        }
        submission.signal_semaphores.push(compute.semaphore.clone());
        submission.signal_fence = Some(compute.fence.clone());
        self.compute.submit(submission)?;

        let presented = if frame > async_start_frame {
            let drawn = frame - 1;
            let filtered = self.compute_ring.for_frame(drawn).semaphore.clone();
            let resources = self.frames.for_frame(drawn).clone();
            let cmd = CommandBuffer::new("graphics", drawn, resources);
            Some(self.submit_graphics(cmd, settings, Some(filtered), true)?)
        } else {
            None
        };

        Ok(Self::report(frame, &recorded, true, presented))
    }

    /// Without async compute: filtering, light clustering and drawing of
    /// frame `frame` in one graphics submission.
    pub fn draw_sync(
        &mut self,
        frame: u64,
        settings: &AppSettings,
        camera: &Camera,
    ) -> Result<FrameReport, RenderError> {
        let slot = self.frames.index_of(frame);
        self.compute_ring.element(slot)?.fence.wait()?;
        self.graphics_ring.element(slot)?.fence.wait()?;

        let recorded = self.record_frame(frame, settings, camera)?;
        let mut cmd = CommandBuffer::new("graphics", frame, recorded.resources.clone());
        if let Some(plan) = &recorded.plan {
            cmd.encode_filtering(&plan.batches);
        }
        if settings.render_local_lights {
            cmd.encode_light_clustering();
        }
        let presented = self.submit_graphics(cmd, settings, None, false)?;
        Ok(Self::report(frame, &recorded, false, Some(presented)))
    }

    /// Appends the passes to `cmd` and submits it to the graphics queue
    /// with the cmd-ring element of the frame it draws.
    fn submit_graphics(
        &mut self,
        cmd: CommandBuffer,
        settings: &AppSettings,
        wait: Option<Arc<Semaphore>>,
        signal_semaphore: bool,
    ) -> Result<(u64, usize), RenderError> {
        let drawn = cmd.frame();
        let element = self.graphics_ring.for_frame(drawn).clone();
        element.fence.wait()?;

        let target = self.swapchain.acquire(drawn)?;
        let mut cmd = cmd.with_present(target.clone());
        cmd.encode_graphics(settings.render_mode);

        let mut submission = Submission::new(cmd);
        submission.wait_semaphores.extend(wait);
        if signal_semaphore {
            submission.signal_semaphores.push(element.semaphore.clone());
        }
        submission.signal_fence = Some(element.fence.clone());
        self.graphics.submit(submission)?;
        self.swapchain.submitted(&target, element.fence);
        Ok((drawn, target.image_index))
    }

    /// Updates the uniforms of the frame's slot and, unless filtered results
    /// are held, culls and uploads its batches. The slot's fences must have
    /// been waited on.
    fn record_frame(
        &mut self,
        frame: u64,
        settings: &AppSettings,
        camera: &Camera,
    ) -> Result<RecordedFrame, RenderError> {
        let slot = self.frames.select(frame);
        let resources = self.frames.current().clone();

        self.record_ctx.insert(settings.clone());
        self.record_ctx.insert(*camera);
        run_lane(&self.record_lanes, &mut self.record_ctx, UNIFORM_UPDATE_LANE)?;
        let constants = self
            .record_ctx
            .get::<FrameUniforms>()
            .map(|u| u.constants)
            .ok_or(RenderError::Lane(LaneError::missing("FrameUniforms")))?;

        let filter = !settings.hold_filtered_results || !self.filtered[slot];
        let plan = if filter {
            run_lane(&self.record_lanes, &mut self.record_ctx, CLUSTER_CULLING_LANE)?;
            let plan = self
                .record_ctx
                .remove::<FilterPlan>()
                .ok_or(RenderError::Lane(LaneError::missing("FilterPlan")))?;
            self.filtered[slot] = true;
            Some(plan)
        } else {
            None
        };

        upload(&resources, constants, plan.as_ref())?;
        Ok(RecordedFrame {
            slot,
            resources,
            plan,
        })
    }

    fn report(
        frame: u64,
        recorded: &RecordedFrame,
        async_compute: bool,
        presented: Option<(u64, usize)>,
    ) -> FrameReport {
        let mut report = FrameReport {
            frame,
            slot: recorded.slot,
            async_compute,
            filtered: recorded.plan.is_some(),
            presented,
            ..Default::default()
        };
        if let Some(plan) = &recorded.plan {
            report.total_clusters = plan.total_clusters;
            report.culled_clusters = plan.culled_clusters;
            report.filter_dispatches = plan.batches.dispatches.len();
            report.draws = plan.batches.draw_count;
            report.triangles_submitted = plan.batches.triangle_count;
        }
        report
    }

    /// Waits for both queues; the first failure is returned.
    pub fn wait_idle(&self) -> Result<(), RenderError> {
        let compute = self.compute_ring.wait_idle();
        let graphics = self.graphics_ring.wait_idle();
        compute.and(graphics)
    }

    /// Drops leftover semaphore signals once both queues are idle.
    pub fn reset_semaphores(&self) -> Result<(), RenderError> {
        let drained =
            self.compute_ring.drain_semaphores()? + self.graphics_ring.drain_semaphores()?;
        if drained > 0 {
            log::debug!("RenderAgent: dropped {drained} unconsumed semaphore signals");
        }
        Ok(())
    }

    /// Reports received from the queues since the last call.
    pub fn drain_reports(&self) -> Vec<ExecutionReport> {
        self.reports.try_iter().collect()
    }

    /// Waits for the last presented frame and copies its image.
    pub fn readback(&self) -> Result<Option<FrameReadback>, RenderError> {
        let Some(presented) = self.swapchain.last_presented() else {
            return Ok(None);
        };
        presented.fence.wait()?;
        let image = self
            .swapchain
            .image(presented.image_index)
            .ok_or_else(|| {
                RenderError::Internal(format!(
                    "swapchain has no image {}",
                    presented.image_index
                ))
            })?;
        let (width, height) = self.swapchain.size();
        Ok(Some(FrameReadback {
            frame: presented.frame,
            width,
            height,
            pixels: image.snapshot()?,
        }))
    }
}

fn run_lane(
    registry: &LaneRegistry,
    ctx: &mut LaneContext,
    name: &str,
) -> Result<(), RenderError> {
    let lane = registry
        .get(name)
        .ok_or_else(|| RenderError::Internal(format!("lane '{name}' is not registered")))?;
    lane.execute(ctx).map_err(lane_failure)
}

/// Writes the constants and the batches of every dispatch, back to back,
/// into the slot's upload buffers.
fn upload(
    resources: &FrameResources,
    constants: PerFrameConstants,
    plan: Option<&FilterPlan>,
) -> Result<(), RenderError> {
    {
        let mut mapped = resources.constants.map()?;
        let slot = mapped
            .first_mut()
            .ok_or_else(|| RenderError::Internal("constants buffer is empty".into()))?;
        *slot = constants;
    }

    let Some(plan) = plan else {
        return Ok(());
    };
    let mut batches = resources.filter_batches.map()?;
    let capacity = batches.len();
    let mut offset = 0usize;
    for dispatch in &plan.batches.dispatches {
        let end = offset + dispatch.batches.len();
        let target = batches.get_mut(offset..end).ok_or_else(|| {
            RenderError::Internal(format!(
                "{end} filter batches do not fit the upload buffer of {capacity}"
            ))
        })?;
        target.copy_from_slice(&dispatch.batches);
        offset = end;
    }
    Ok(())
}
