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

// Headless sandbox: renders a scene for a number of frames and writes the
// last presented image and a metrics snapshot.

mod config;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use vbuffer_agents::RenderAgent;
use vbuffer_core::renderer::LIGHT_COUNT;
use vbuffer_data::scene::{load_obj, procedural::courtyard};
use vbuffer_data::{generate_point_lights, CameraPath};
use vbuffer_telemetry::logging::init_logging;
use vbuffer_telemetry::TelemetryService;

use crate::config::{resolve_settings, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log);
    let settings = resolve_settings(&args)?;
    log::info!(
        "Sandbox: {}x{}, {:?}, async compute {}, {} frame slots",
        settings.width,
        settings.height,
        settings.render_mode,
        settings.async_compute,
        settings.data_buffer_count
    );

    let scene = match &args.obj {
        Some(path) => load_obj(path)
            .with_context(|| format!("cannot load scene '{}'", path.display()))?,
        None => courtyard(args.detail).context("cannot build the courtyard")?,
    };
    let lights = generate_point_lights(LIGHT_COUNT, settings.light_seed);

    let mut telemetry = TelemetryService::new(Duration::from_secs(1));
    let mut agent = RenderAgent::new(settings)?;
    agent.set_telemetry(telemetry.metrics_registry(), telemetry.timing_sink())?;
    if let Some(path) = &args.camera_path {
        let camera_path = CameraPath::load(path)
            .with_context(|| format!("cannot load camera path '{}'", path.display()))?;
        agent.set_camera_path(camera_path)?;
    }
    agent.load(&scene, lights)?;
    log::info!(
        "Sandbox: {} triangles in {} clusters",
        scene.total_triangles(),
        agent.cluster_count()
    );

    for _ in 0..args.frames {
        agent.update(args.dt);
        let report = agent.draw()?;
        telemetry.tick();
        log::debug!(
            "Sandbox: frame {} presented {:?}",
            report.frame,
            report.presented
        );
    }
    agent.wait_idle()?;

    let failures = agent.execution_reports().filter(|r| !r.succeeded()).count();
    if failures > 0 {
        log::warn!("Sandbox: {failures} submissions failed");
    }

    match agent.readback()? {
        Some(readback) => {
            readback.save_png(&args.output)?;
            log::info!(
                "Sandbox: frame {} written to '{}'",
                readback.frame,
                args.output.display()
            );
        }
        None => log::warn!("Sandbox: no frame was presented, nothing to write"),
    }

    if let Some(path) = &args.metrics {
        let snapshot = telemetry.snapshot(false);
        snapshot.write_json(path)?;
        log::info!(
            "Sandbox: {} metrics written to '{}'",
            snapshot.metrics.len(),
            path.display()
        );
    }

    agent.unload();
    Ok(())
}
