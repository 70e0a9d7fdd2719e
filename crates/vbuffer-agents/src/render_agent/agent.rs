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

//! Defines the RenderAgent, the frame driver of the pipeline.

use std::collections::VecDeque;
use std::sync::Arc;

use vbuffer_core::math::Vec3;
use vbuffer_core::renderer::{AppSettings, LightData, RenderError};
use vbuffer_core::telemetry::{NullTimingSink, TimingSink};
use vbuffer_core::utils::timer::Stopwatch;
use vbuffer_data::{Camera, CameraPath, CameraWalker, Scene};
use vbuffer_lanes::uniform_lane::scene_model_matrix;
use vbuffer_lanes::{FrameResources, GpuScene};
use vbuffer_telemetry::MetricsRegistry;

use super::metrics::AgentMetrics;
use super::pipeline::Pipeline;
use super::report::{ExecutionReport, FrameReadback, FrameReport};

/// Fixed step of the camera walk, in seconds.
pub const CAMERA_WALK_STEP: f32 = 1.0 / 120.0;

/// Duration of one lap of the default orbit path, in seconds.
const DEFAULT_ORBIT_SECONDS: f32 = 30.0;

/// Reports kept for inspection.
const REPORT_HISTORY: usize = 120;

/// The agent responsible for recording and submitting every frame.
///
/// The agent keeps the CPU at most `data_buffer_count` frames ahead of the
/// queues: before a frame slot is rewritten, the fences of the submissions
/// that last used it are waited on.
pub struct RenderAgent {
    // Settings applied to the next recorded frame.
    settings: AppSettings,
    // Camera of the next recorded frame.
    camera: Camera,
    // Plays the camera path while walking is enabled.
    walker: Option<CameraWalker>,
    // Time not yet consumed by fixed walking steps.
    walk_accumulator: f32,
    // Loaded scene with its queues and frame slots.
    pipeline: Option<Pipeline>,
    // Frames recorded since the scene was loaded.
    frame_count: u64,
    // First frame of the current async compute run.
    async_start_frame: u64,
    // Mode of the previous frame, `None` before the first frame.
    last_async: Option<bool>,
    // Receives the pass timings of both queues.
    timings: Arc<dyn TimingSink>,
    metrics: Option<AgentMetrics>,
    // --- Reports, newest last ---
    frame_reports: VecDeque<FrameReport>,
    execution_reports: VecDeque<ExecutionReport>,
}

impl RenderAgent {
    /// Creates an agent with validated settings. Nothing renders until
    /// [`RenderAgent::load`] is called.
    pub fn new(settings: AppSettings) -> Result<Self, RenderError> {
        settings.validate().map_err(RenderError::InvalidSettings)?;
        warn_single_slot_async(&settings);
        Ok(Self {
            settings,
            camera: Camera::new(Vec3::new(0.0, 400.0, 1000.0), Vec3::ZERO),
            walker: None,
            walk_accumulator: 0.0,
            pipeline: None,
            frame_count: 0,
            async_start_frame: 0,
            last_async: None,
            timings: Arc::new(NullTimingSink),
            metrics: None,
            frame_reports: VecDeque::with_capacity(REPORT_HISTORY),
            execution_reports: VecDeque::with_capacity(REPORT_HISTORY),
        })
    }

    /// Publishes metrics into `registry` and pass timings into `sink`.
    ///
    /// A loaded pipeline is rebuilt so its queues report to the new sink.
    pub fn set_telemetry(
        &mut self,
        registry: &MetricsRegistry,
        sink: Arc<dyn TimingSink>,
    ) -> Result<(), RenderError> {
        let metrics = AgentMetrics::register(registry)
            .map_err(|e| RenderError::Internal(format!("failed to register metrics: {e}")))?;
        self.metrics = Some(metrics);
        self.timings = sink;
        self.rebuild()
    }

    /// Uploads `scene` with `lights`, builds its clusters and starts the
    /// queues. A previously loaded scene is unloaded first.
    ///
    /// Without a camera path set, an orbit around the scene is used. The
    /// camera starts at the beginning of the path.
    pub fn load(&mut self, scene: &Scene, lights: Vec<LightData>) -> Result<(), RenderError> {
        self.unload();
        let gpu_scene = GpuScene::from_scene(scene, lights)
            .map_err(|e| RenderError::Internal(format!("scene upload failed: {e}")))?;
        log::info!(
            "RenderAgent: loading {} meshes, {} triangles, {} lights",
            gpu_scene.meshes.len(),
            gpu_scene.total_triangles(),
            gpu_scene.lights.len()
        );
        let gpu_scene = Arc::new(gpu_scene);

        if self.walker.is_none() {
            let walker = CameraWalker::new(default_camera_path(&gpu_scene))
                .map_err(|e| RenderError::Internal(format!("invalid orbit path: {e}")))?;
            self.walker = Some(walker);
        }
        if let Some(walker) = &self.walker {
            self.camera = walker.camera();
        }

        self.pipeline = Some(Pipeline::new(
            gpu_scene,
            None,
            &self.settings,
            self.timings.clone(),
        )?);
        self.frame_count = 0;
        self.async_start_frame = 0;
        self.last_async = None;
        Ok(())
    }

    /// Waits for the queues, stops them and releases the scene.
    pub fn unload(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.wait_idle() {
                log::warn!("RenderAgent: queue failure while unloading: {e}");
            }
            self.record_executions(pipeline.drain_reports());
            let _ = pipeline.into_scene();
            log::info!("RenderAgent: unloaded after {} frames", self.frame_count);
        }
    }

    /// Replaces the settings.
    ///
    /// Changes to the resolution, the shadow map size or the number of frame
    /// slots rebuild the pipeline; everything else applies to the next frame.
    pub fn update_settings(&mut self, settings: AppSettings) -> Result<(), RenderError> {
        settings.validate().map_err(RenderError::InvalidSettings)?;
        warn_single_slot_async(&settings);
        let structural = settings.width != self.settings.width
            || settings.height != self.settings.height
            || settings.shadow_map_size != self.settings.shadow_map_size
            || settings.data_buffer_count != self.settings.data_buffer_count;
        self.settings = settings;
        if structural {
            self.rebuild()?;
        }
        Ok(())
    }

    /// Restarts the queues and frame slots for the current settings,
    /// keeping the scene and its clusters.
    fn rebuild(&mut self) -> Result<(), RenderError> {
        let Some(pipeline) = self.pipeline.take() else {
            return Ok(());
        };
        if let Err(e) = pipeline.wait_idle() {
            log::warn!("RenderAgent: queue failure before rebuilding: {e}");
        }
        self.record_executions(pipeline.drain_reports());
        let (scene, clusters) = pipeline.into_scene();
        log::info!(
            "RenderAgent: rebuilding for {}x{}, {} frame slots",
            self.settings.width,
            self.settings.height,
            self.settings.data_buffer_count
        );
        self.pipeline = Some(Pipeline::new(
            scene,
            clusters,
            &self.settings,
            self.timings.clone(),
        )?);
        self.last_async = None;
        Ok(())
    }

    /// Sets the camera of the next frame.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Walks `path` from its start while camera walking is enabled.
    pub fn set_camera_path(&mut self, path: CameraPath) -> Result<(), RenderError> {
        let walker = CameraWalker::new(path)
            .map_err(|e| RenderError::Internal(format!("invalid camera path: {e}")))?;
        self.camera = walker.camera();
        self.walker = Some(walker);
        self.walk_accumulator = 0.0;
        Ok(())
    }

    /// Advances the camera walk by `dt` seconds, in fixed steps scaled by
    /// the walking speed.
    pub fn update(&mut self, dt: f32) {
        if !self.settings.camera_walking {
            return;
        }
        let Some(walker) = self.walker.as_mut() else {
            return;
        };
        self.walk_accumulator += dt.max(0.0);
        while self.walk_accumulator >= CAMERA_WALK_STEP {
            self.camera = walker.advance(CAMERA_WALK_STEP, self.settings.camera_walking_speed);
            self.walk_accumulator -= CAMERA_WALK_STEP;
        }
    }

    /// Records and submits one frame.
    ///
    /// With async compute, the compute queue filters this frame while the
    /// graphics queue draws the previous one; the first async frame draws
    /// nothing. Without it, one graphics submission does everything.
    ///
    /// # Errors
    ///
    /// [`RenderError::TooManyDraws`] when batching overflows the draw slots;
    /// the frame is not submitted. [`RenderError::QueueFailed`] when an
    /// earlier submission sharing this frame's slot failed.
    pub fn draw(&mut self) -> Result<FrameReport, RenderError> {
        if self.pipeline.is_none() {
            return Err(RenderError::NotInitialized);
        }
        let stopwatch = Stopwatch::new();
        let async_compute = self.async_compute_active();
        if self.last_async != Some(async_compute) {
            self.switch_mode(async_compute)?;
        }

        let frame = self.frame_count;
        let mut report = {
            let _record_timer = self.metrics.as_ref().map(AgentMetrics::record_timer);
            let pipeline = self.pipeline.as_mut().ok_or(RenderError::NotInitialized)?;
            if async_compute {
                pipeline.draw_async(frame, self.async_start_frame, &self.settings, &self.camera)?
            } else {
                pipeline.draw_sync(frame, &self.settings, &self.camera)?
            }
        };
        report.record_time = stopwatch.elapsed().unwrap_or_default();
        self.frame_count += 1;

        log::debug!(
            "RenderAgent: frame {} slot {} - {}/{} clusters culled, {} draws, {} triangles",
            report.frame,
            report.slot,
            report.culled_clusters,
            report.total_clusters,
            report.draws,
            report.triangles_submitted
        );
        if let Some(metrics) = &self.metrics {
            metrics.observe_frame(&report);
        }
        let executions = self
            .pipeline
            .as_ref()
            .map(Pipeline::drain_reports)
            .unwrap_or_default();
        self.record_executions(executions);
        push_bounded(&mut self.frame_reports, report.clone());
        Ok(report)
    }

    fn async_compute_active(&self) -> bool {
        self.settings.async_compute && self.settings.data_buffer_count > 1
    }

    /// Drains the queues when async compute is toggled so no semaphore
    /// signal of the old mode is consumed by the new one.
    fn switch_mode(&mut self, async_compute: bool) -> Result<(), RenderError> {
        if let (Some(pipeline), Some(_)) = (&self.pipeline, self.last_async) {
            pipeline.wait_idle()?;
            pipeline.reset_semaphores()?;
        }
        if async_compute {
            self.async_start_frame = self.frame_count;
        }
        self.last_async = Some(async_compute);
        log::info!(
            "RenderAgent: async compute {} from frame {}",
            if async_compute { "on" } else { "off" },
            self.frame_count
        );
        Ok(())
    }

    /// Blocks until every submitted command buffer completed.
    pub fn wait_idle(&mut self) -> Result<(), RenderError> {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Ok(());
        };
        let result = pipeline.wait_idle();
        let executions = pipeline.drain_reports();
        self.record_executions(executions);
        result
    }

    /// Copy of the most recently presented image, `None` before the first
    /// presentation.
    pub fn readback(&mut self) -> Result<Option<FrameReadback>, RenderError> {
        let pipeline = self.pipeline.as_ref().ok_or(RenderError::NotInitialized)?;
        pipeline.readback()
    }

    fn record_executions(&mut self, reports: Vec<ExecutionReport>) {
        for report in reports {
            if let Some(metrics) = &self.metrics {
                metrics.observe_execution(&report);
            }
            push_bounded(&mut self.execution_reports, report);
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Camera of the next frame.
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Frames recorded since the scene was loaded.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// `true` while a scene is loaded.
    pub fn is_loaded(&self) -> bool {
        self.pipeline.is_some()
    }

    /// The loaded scene.
    pub fn scene(&self) -> Option<&Arc<GpuScene>> {
        self.pipeline.as_ref().map(Pipeline::scene)
    }

    /// Clusters built for the loaded scene.
    pub fn cluster_count(&self) -> usize {
        self.pipeline.as_ref().map_or(0, Pipeline::cluster_count)
    }

    /// Buffers of frame slot `slot`.
    pub fn frame_resources(&self, slot: usize) -> Option<&Arc<FrameResources>> {
        self.pipeline.as_ref()?.frame_resources(slot)
    }

    /// Recent frame reports, oldest first.
    pub fn frame_reports(&self) -> impl Iterator<Item = &FrameReport> {
        self.frame_reports.iter()
    }

    /// Recent queue reports, oldest first. Reports arrive as submissions
    /// complete; [`RenderAgent::wait_idle`] collects all outstanding ones.
    pub fn execution_reports(&self) -> impl Iterator<Item = &ExecutionReport> {
        self.execution_reports.iter()
    }
}

impl Drop for RenderAgent {
    fn drop(&mut self) {
        self.unload();
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T) {
    if queue.len() == REPORT_HISTORY {
        queue.pop_front();
    }
    queue.push_back(item);
}

fn warn_single_slot_async(settings: &AppSettings) {
    if settings.async_compute && settings.data_buffer_count < 2 {
        log::warn!("RenderAgent: async compute needs two frame slots, running synchronously");
    }
}

/// An orbit around the world-space bounds of `scene`.
fn default_camera_path(scene: &GpuScene) -> CameraPath {
    let world = scene.bounds.transform(&scene_model_matrix());
    let extent = world.size().max_element().max(1.0);
    CameraPath::orbit(world.center(), extent * 0.75, extent * 0.5, DEFAULT_ORBIT_SECONDS)
}
