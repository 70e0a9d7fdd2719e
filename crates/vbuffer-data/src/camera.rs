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

//! Camera and cinematic camera path.

use serde::{Deserialize, Serialize};
use std::path::Path;

use vbuffer_core::math::{Mat4, Vec3, TAU};

use crate::error::CameraPathError;

/// A look-at camera in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position.
    pub position: Vec3,
    /// Point the camera looks at.
    pub look_at: Vec3,
}

impl Camera {
    /// Creates a camera.
    pub fn new(position: Vec3, look_at: Vec3) -> Self {
        Self { position, look_at }
    }

    /// World-to-view matrix, `None` when eye and target coincide.
    pub fn view_matrix(&self) -> Option<Mat4> {
        Mat4::look_at_rh(self.position, self.look_at, Vec3::Y)
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vec3 {
        (self.look_at - self.position).normalize()
    }
}

/// One sample of a camera path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPathPoint {
    /// Eye position.
    pub position: Vec3,
    /// Look-at target.
    pub look_at: Vec3,
}

/// Camera samples spaced by a fixed time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPath {
    /// Seconds between consecutive points.
    pub step_seconds: f32,
    /// Samples in playback order.
    pub points: Vec<CameraPathPoint>,
}

impl CameraPath {
    /// Default spacing of recorded paths, 120 samples per second.
    pub const DEFAULT_STEP: f32 = 1.0 / 120.0;

    /// Parses a RON path.
    pub fn from_ron(text: &str) -> Result<Self, CameraPathError> {
        let path: Self = ron::from_str(text)?;
        path.validate()?;
        Ok(path)
    }

    /// Reads a RON path file.
    pub fn load(path: &Path) -> Result<Self, CameraPathError> {
        let text = std::fs::read_to_string(path).map_err(|source| CameraPathError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text)
    }

    /// A closed circle around `center` looking at it, one lap per `lap_seconds`.
    pub fn orbit(center: Vec3, radius: f32, height: f32, lap_seconds: f32) -> Self {
        let step = Self::DEFAULT_STEP;
        let count = ((lap_seconds / step).ceil() as usize).max(2);
        let points = (0..=count)
            .map(|i| {
                let angle = TAU * i as f32 / count as f32;
                CameraPathPoint {
                    position: center
                        + Vec3::new(angle.cos() * radius, height, angle.sin() * radius),
                    look_at: center,
                }
            })
            .collect();
        Self {
            step_seconds: step,
            points,
        }
    }

    /// Rejects paths that cannot be played.
    pub fn validate(&self) -> Result<(), CameraPathError> {
        if self.points.len() < 2 {
            return Err(CameraPathError::TooFewPoints(self.points.len()));
        }
        if !(self.step_seconds > 0.0 && self.step_seconds.is_finite()) {
            return Err(CameraPathError::InvalidStep(self.step_seconds));
        }
        Ok(())
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f32 {
        self.step_seconds * (self.points.len().saturating_sub(1)) as f32
    }

    /// Camera at `time`, clamped to the path.
    pub fn sample(&self, time: f32) -> Option<Camera> {
        let last = self.points.len().checked_sub(1)?;
        let t = (time / self.step_seconds).max(0.0);
        let frame = (t.floor() as usize).min(last);
        let next = (frame + 1).min(last);
        let blend = (t - frame as f32).clamp(0.0, 1.0);
        let (a, b) = (self.points[frame], self.points[next]);
        Some(Camera {
            position: Vec3::lerp(a.position, b.position, blend),
            look_at: Vec3::lerp(a.look_at, b.look_at, blend),
        })
    }
}

/// Plays a [`CameraPath`] in a loop.
#[derive(Debug, Clone)]
pub struct CameraWalker {
    path: CameraPath,
    time: f32,
}

impl CameraWalker {
    /// Seconds kept clear of the path end before looping.
    const LOOP_MARGIN: f32 = 1.0 / 30.0;

    /// Starts at the first point.
    pub fn new(path: CameraPath) -> Result<Self, CameraPathError> {
        path.validate()?;
        Ok(Self { path, time: 0.0 })
    }

    /// Current playback time.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// The path being played.
    pub fn path(&self) -> &CameraPath {
        &self.path
    }

    /// Advances by `dt * speed` and returns the camera at the new time.
    pub fn advance(&mut self, dt: f32, speed: f32) -> Camera {
        if self.path.duration() - Self::LOOP_MARGIN * speed <= self.time {
            self.time = 0.0;
        }
        self.time += dt * speed;
        self.camera()
    }

    /// Camera at the current time.
    pub fn camera(&self) -> Camera {
        // A validated path has at least two points.
        self.path
            .sample(self.time)
            .unwrap_or_else(|| Camera::new(Vec3::Z, Vec3::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_path() -> CameraPath {
        CameraPath {
            step_seconds: 0.5,
            points: vec![
                CameraPathPoint {
                    position: Vec3::ZERO,
                    look_at: Vec3::Z,
                },
                CameraPathPoint {
                    position: Vec3::new(10.0, 0.0, 0.0),
                    look_at: Vec3::new(10.0, 0.0, 1.0),
                },
                CameraPathPoint {
                    position: Vec3::new(20.0, 0.0, 0.0),
                    look_at: Vec3::new(20.0, 0.0, 1.0),
                },
            ],
        }
    }

    #[test]
    fn test_sample_interpolates_between_points() {
        let path = straight_path();
        assert_relative_eq!(path.duration(), 1.0);
        assert_relative_eq!(path.sample(0.25).unwrap().position.x, 5.0);
        assert_relative_eq!(path.sample(0.75).unwrap().position.x, 15.0);
        assert_relative_eq!(path.sample(3.0).unwrap().position.x, 20.0);
    }

    #[test]
    fn test_walker_loops() {
        let mut walker = CameraWalker::new(straight_path()).unwrap();
        let cam = walker.advance(0.25, 2.0);
        assert_relative_eq!(cam.position.x, 10.0);
        walker.advance(0.47, 1.0);
        assert!(walker.time() > 0.9);
        walker.advance(0.1, 1.0);
        assert_relative_eq!(walker.time(), 0.1);
    }

    #[test]
    fn test_ron_round_trip_and_validation() {
        let text = ron::to_string(&straight_path()).unwrap();
        assert_eq!(CameraPath::from_ron(&text).unwrap(), straight_path());

        let err = CameraPath::from_ron("(step_seconds: 0.1, points: [])").unwrap_err();
        assert!(matches!(err, CameraPathError::TooFewPoints(0)));
        assert!(matches!(
            CameraPath::from_ron("not ron"),
            Err(CameraPathError::Parse(_))
        ));
    }

    #[test]
    fn test_orbit_is_closed() {
        let path = CameraPath::orbit(Vec3::ZERO, 10.0, 2.0, 1.0);
        let first = path.points[0].position;
        let last = path.points[path.points.len() - 1].position;
        assert_relative_eq!(first.distance(last), 0.0, epsilon = 1e-3);
        assert!(path.sample(0.3).unwrap().view_matrix().is_some());
    }
}
