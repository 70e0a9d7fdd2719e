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

//! Wall-clock timing helpers.

use std::time::{Duration, Instant};

/// A simple restartable stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Option<Instant>,
}

impl Stopwatch {
    /// Creates a stopwatch that is already running.
    pub fn new() -> Self {
        Self {
            start: Some(Instant::now()),
        }
    }

    /// Creates a stopped stopwatch.
    pub fn stopped() -> Self {
        Self { start: None }
    }

    /// Restarts the measurement from now.
    pub fn restart(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Stops the stopwatch, returning the elapsed time if it was running.
    pub fn stop(&mut self) -> Option<Duration> {
        self.start.take().map(|s| s.elapsed())
    }

    /// Elapsed time since start, `None` when stopped.
    pub fn elapsed(&self) -> Option<Duration> {
        self.start.map(|s| s.elapsed())
    }

    /// Elapsed seconds since start, `None` when stopped.
    pub fn elapsed_secs_f64(&self) -> Option<f64> {
        self.elapsed().map(|d| d.as_secs_f64())
    }

    /// Elapsed milliseconds since start, `None` when stopped.
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.elapsed_secs_f64().map(|s| s * 1000.0)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
