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

//! Pass timings reported by the queue workers.
//!
//! Every begin/end marker range a command buffer executes becomes one
//! sample in a `pass:duration_ms` histogram labelled with the marker name and
//! the queue. The most recent frame's timings are also kept verbatim for
//! per-frame reports.

use crate::metrics::registry::{HistogramHandle, MetricsRegistry};
use std::collections::HashMap;
use std::sync::Mutex;
use vbuffer_core::telemetry::{MetricId, PassTiming, QueueKind, TimingSink};

/// Namespace of pass timing histograms.
pub const PASS_NAMESPACE: &str = "pass";

/// Id of the histogram holding the timings of `pass` on `queue`.
pub fn pass_metric_id(pass: &str, queue: QueueKind) -> MetricId {
    MetricId::new(PASS_NAMESPACE, "duration_ms")
        .with_label("pass", pass)
        .with_label("queue", queue.as_str())
}

#[derive(Debug, Default)]
struct RecorderState {
    handles: HashMap<MetricId, HistogramHandle>,
    latest_frame: u64,
    latest: Vec<PassTiming>,
}

/// [`TimingSink`] storing timings into a [`MetricsRegistry`].
#[derive(Debug)]
pub struct PassTimingRecorder {
    registry: MetricsRegistry,
    state: Mutex<RecorderState>,
}

impl PassTimingRecorder {
    /// Records into `registry`.
    pub fn new(registry: MetricsRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(RecorderState::default()),
        }
    }

    /// Timings of the most recent frame that reported any, in report order.
    pub fn latest_frame(&self) -> (u64, Vec<PassTiming>) {
        match self.state.lock() {
            Ok(state) => (state.latest_frame, state.latest.clone()),
            Err(_) => (0, Vec::new()),
        }
    }
}

impl TimingSink for PassTimingRecorder {
    fn record(&self, timing: PassTiming) {
        let Ok(mut state) = self.state.lock() else {
            log::warn!("Pass timing recorder poisoned, dropping '{}'", timing.name);
            return;
        };

        let id = pass_metric_id(&timing.name, timing.queue);
        if !state.handles.contains_key(&id) {
            match self.registry.timing_histogram(&id, "Time between pass markers") {
                Ok(handle) => {
                    state.handles.insert(id.clone(), handle);
                }
                Err(e) => {
                    log::warn!("Cannot register timing '{id}': {e}");
                    return;
                }
            }
        }
        if let Some(handle) = state.handles.get(&id) {
            if let Err(e) = handle.observe(timing.duration.as_secs_f64() * 1000.0) {
                log::warn!("Cannot record timing '{id}': {e}");
            }
        }

        log::trace!(
            "[{}] frame {} '{}' took {:?}",
            timing.queue,
            timing.frame,
            timing.name,
            timing.duration
        );

        if timing.frame != state.latest_frame {
            // Queues can report an older frame late; keep the newest.
            if timing.frame < state.latest_frame {
                return;
            }
            state.latest_frame = timing.frame;
            state.latest.clear();
        }
        state.latest.push(timing);
    }
}
