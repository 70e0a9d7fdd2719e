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

//! Command line and configuration file handling.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use vbuffer_core::renderer::{AppSettings, LightingMode, RenderMode, ShadowFilter};

/// Renders a scene headless through the visibility-buffer pipeline.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// RON file with the initial settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// OBJ scene; the procedural courtyard is used when absent.
    #[arg(long)]
    pub obj: Option<PathBuf>,
    /// Subdivision of the procedural courtyard.
    #[arg(long, default_value_t = 4)]
    pub detail: u32,
    /// RON camera path; an orbit around the scene when absent.
    #[arg(long)]
    pub camera_path: Option<PathBuf>,
    /// Frames to render.
    #[arg(short, long, default_value_t = 8)]
    pub frames: u32,
    /// Simulated time between frames, in seconds.
    #[arg(long, default_value_t = 1.0 / 60.0)]
    pub dt: f32,
    /// Where the last presented image is written.
    #[arg(short, long, default_value = "frame.png")]
    pub output: PathBuf,
    /// Where the metrics snapshot is written.
    #[arg(long)]
    pub metrics: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    pub log: String,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Command line overrides applied on top of the configuration file.
#[derive(Debug, Default, clap::Args)]
pub struct Overrides {
    /// Render width in pixels.
    #[arg(long)]
    pub width: Option<u32>,
    /// Render height in pixels.
    #[arg(long)]
    pub height: Option<u32>,
    /// Geometry path.
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Sun lighting model.
    #[arg(long, value_enum)]
    pub lighting: Option<LightingArg>,
    /// Shadow filtering.
    #[arg(long, value_enum)]
    pub shadows: Option<ShadowArg>,
    /// Filter on the compute queue one frame ahead.
    #[arg(long)]
    pub async_compute: Option<bool>,
    /// Reuse the filtered results of earlier frames.
    #[arg(long)]
    pub hold_filtered_results: Option<bool>,
    /// Per-triangle culling.
    #[arg(long)]
    pub filter_triangles: Option<bool>,
    /// Per-cluster cone culling.
    #[arg(long)]
    pub cluster_culling: Option<bool>,
    /// Front-to-back cluster ordering.
    #[arg(long)]
    pub sort_clusters: Option<bool>,
    /// Bin and shade the point lights.
    #[arg(long)]
    pub local_lights: Option<bool>,
    /// Move the camera along its path.
    #[arg(long)]
    pub camera_walking: Option<bool>,
    /// Sun shafts over the sky.
    #[arg(long)]
    pub godrays: Option<bool>,
    /// Procedural sky behind the scene.
    #[arg(long)]
    pub skybox: Option<bool>,
    /// Camera path speed multiplier.
    #[arg(long)]
    pub walking_speed: Option<f32>,
    /// Frames in flight.
    #[arg(long)]
    pub data_buffers: Option<u32>,
    /// Seed of the point-light generator.
    #[arg(long)]
    pub light_seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Vb,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LightingArg {
    Phong,
    Pbr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShadowArg {
    Esm,
    Pcf,
}

impl Overrides {
    /// Writes every given flag into `settings`.
    pub fn apply(&self, settings: &mut AppSettings) {
        macro_rules! set {
            ($($flag:ident => $field:ident),+ $(,)?) => {
                $(if let Some(value) = self.$flag {
                    settings.$field = value;
                })+
            };
        }
        set!(
            width => width,
            height => height,
            async_compute => async_compute,
            hold_filtered_results => hold_filtered_results,
            filter_triangles => filter_triangles,
            cluster_culling => cluster_culling,
            sort_clusters => sort_clusters,
            local_lights => render_local_lights,
            camera_walking => camera_walking,
            walking_speed => camera_walking_speed,
            data_buffers => data_buffer_count,
            light_seed => light_seed,
            skybox => skybox,
        );
        if let Some(enabled) = self.godrays {
            settings.godray.enabled = enabled;
        }
        if let Some(mode) = self.mode {
            settings.render_mode = match mode {
                ModeArg::Vb => RenderMode::VisibilityBuffer,
                ModeArg::Deferred => RenderMode::Deferred,
            };
        }
        if let Some(lighting) = self.lighting {
            settings.lighting_mode = match lighting {
                LightingArg::Phong => LightingMode::Phong,
                LightingArg::Pbr => LightingMode::Pbr,
            };
        }
        if let Some(shadows) = self.shadows {
            settings.shadow_filter = match shadows {
                ShadowArg::Esm => ShadowFilter::Esm,
                ShadowArg::Pcf => ShadowFilter::Pcf,
            };
        }
    }
}

/// Reads a RON settings file. Missing fields keep their defaults.
pub fn load_settings(path: &Path) -> Result<AppSettings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read settings '{}'", path.display()))?;
    ron::from_str(&text).with_context(|| format!("invalid settings '{}'", path.display()))
}

/// Settings from the optional file with the command line applied.
pub fn resolve_settings(args: &Args) -> Result<AppSettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings(path)?,
        None => AppSettings::default(),
    };
    args.overrides.apply(&mut settings);
    settings
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid settings: {e}"))?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_then_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(width: 320, height: 200, async_compute: false, data_buffer_count: 3)").unwrap();

        let args = Args::parse_from([
            "sandbox",
            "--config",
            file.path().to_str().unwrap(),
            "--height",
            "180",
            "--mode",
            "deferred",
            "--local-lights",
            "true",
            "--godrays",
            "false",
        ]);
        let settings = resolve_settings(&args).unwrap();
        assert_eq!((settings.width, settings.height), (320, 180));
        assert!(!settings.async_compute);
        assert_eq!(settings.data_buffer_count, 3);
        assert_eq!(settings.render_mode, RenderMode::Deferred);
        assert!(settings.render_local_lights);
        assert!(!settings.godray.enabled);
        assert!(settings.skybox);
        // Untouched fields keep their defaults.
        assert_eq!(settings.shadow_map_size, AppSettings::default().shadow_map_size);
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let args = Args::parse_from(["sandbox", "--data-buffers", "0"]);
        assert!(resolve_settings(&args).is_err());
    }
}
