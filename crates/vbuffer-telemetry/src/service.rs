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

//! Service owning the metrics registry and pass timing recorder.

use crate::export::MetricsSnapshot;
use crate::metrics::registry::MetricsRegistry;
use crate::timing::PassTimingRecorder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vbuffer_core::telemetry::{MetricType, TimingSink};

/// Owns the metrics of a run and logs a summary at a fixed interval.
#[derive(Debug)]
pub struct TelemetryService {
    metrics: MetricsRegistry,
    timings: Arc<PassTimingRecorder>,
    last_update: Instant,
    update_interval: Duration,
    frames: u64,
}

impl TelemetryService {
    /// Creates a service logging a summary every `update_interval`.
    pub fn new(update_interval: Duration) -> Self {
        let metrics = MetricsRegistry::new();
        Self {
            timings: Arc::new(PassTimingRecorder::new(metrics.clone())),
            metrics,
            last_update: Instant::now(),
            update_interval,
            frames: 0,
        }
    }

    /// Should be called once per presented frame.
    /// Returns `true` when the interval elapsed and a summary was logged.
    pub fn tick(&mut self) -> bool {
        self.frames += 1;
        if self.last_update.elapsed() < self.update_interval {
            return false;
        }
        self.log_summary();
        self.last_update = Instant::now();
        true
    }

    fn log_summary(&self) {
        log::debug!("Telemetry after {} frames:", self.frames);
        for metric in self.metrics.get_metrics_of_type(MetricType::Histogram) {
            if let Some(summary) = metric.value.histogram_summary() {
                log::debug!(
                    "  {}: mean {:.3} {}, p95 {:.3}, max {:.3} ({} samples)",
                    metric.metadata.id,
                    summary.mean,
                    metric.metadata.unit,
                    summary.p95,
                    summary.max,
                    summary.count
                );
            }
        }
    }

    /// Frames counted by [`Self::tick`].
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns a reference to the metrics registry.
    pub fn metrics_registry(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// The recorder, for direct queries.
    pub fn pass_timings(&self) -> &Arc<PassTimingRecorder> {
        &self.timings
    }

    /// The recorder as a sink to hand to the queues.
    pub fn timing_sink(&self) -> Arc<dyn TimingSink> {
        self.timings.clone()
    }

    /// Snapshot of every metric.
    pub fn snapshot(&self, keep_samples: bool) -> MetricsSnapshot {
        MetricsSnapshot::capture(&self.metrics, self.frames, keep_samples)
    }
}

impl Default for TelemetryService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
