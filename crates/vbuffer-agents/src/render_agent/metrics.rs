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

//! Metrics published by the render agent.

use vbuffer_core::renderer::{VIEW_CAMERA, VIEW_SHADOW};
use vbuffer_core::telemetry::{MetricsError, QueueKind};
use vbuffer_telemetry::{
    CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry, ScopedMetricTimer,
};
use vbuffer_telemetry::metrics::registry::TIMING_BUCKETS_MS;

use super::report::{ExecutionReport, FrameReport};

const FRAME_NAMESPACE: &str = "frame";
const FILTER_NAMESPACE: &str = "filter";
const QUEUE_NAMESPACE: &str = "queue";
const LIGHT_NAMESPACE: &str = "light";

#[derive(Debug, Clone)]
struct QueueCounters {
    submissions: CounterHandle,
    failures: CounterHandle,
}

impl QueueCounters {
    fn register(registry: &MetricsRegistry, queue: QueueKind) -> Result<Self, MetricsError> {
        let labels = || vec![("queue".to_string(), queue.as_str().to_string())];
        Ok(Self {
            submissions: registry.register_counter_with_labels(
                QUEUE_NAMESPACE,
                "submissions",
                "Command buffers executed",
                labels(),
            )?,
            failures: registry.register_counter_with_labels(
                QUEUE_NAMESPACE,
                "failures",
                "Command buffers that failed",
                labels(),
            )?,
        })
    }
}

/// Handles to every metric the agent updates.
#[derive(Debug, Clone)]
pub struct AgentMetrics {
    frames: CounterHandle,
    record_time: HistogramHandle,
    total_clusters: GaugeHandle,
    culled_clusters: GaugeHandle,
    draws: GaugeHandle,
    triangles_submitted: GaugeHandle,
    triangles_accepted: [GaugeHandle; 2],
    compacted_draws: [GaugeHandle; 2],
    light_assignments: GaugeHandle,
    light_overflow: CounterHandle,
    graphics: QueueCounters,
    compute: QueueCounters,
}

impl AgentMetrics {
    /// Registers the agent metrics in `registry`.
    pub fn register(registry: &MetricsRegistry) -> Result<Self, MetricsError> {
        let per_view = |name: &str, description: &str| -> Result<[GaugeHandle; 2], MetricsError> {
            let shadow = registry.register_gauge(
                FILTER_NAMESPACE,
                format!("{name}_shadow"),
                format!("{description} (shadow view)"),
                "count",
            )?;
            let camera = registry.register_gauge(
                FILTER_NAMESPACE,
                format!("{name}_camera"),
                format!("{description} (camera view)"),
                "count",
            )?;
            // Indexed by view.
            Ok([shadow, camera])
        };

        Ok(Self {
            frames: registry.register_counter(FRAME_NAMESPACE, "count", "Frames recorded")?,
            record_time: registry.register_histogram(
                FRAME_NAMESPACE,
                "record_time_ms",
                "CPU time spent recording a frame",
                "ms",
                TIMING_BUCKETS_MS.to_vec(),
            )?,
            total_clusters: registry.register_gauge(
                FILTER_NAMESPACE,
                "total_clusters",
                "Clusters visited by culling",
                "count",
            )?,
            culled_clusters: registry.register_gauge(
                FILTER_NAMESPACE,
                "culled_clusters",
                "Clusters rejected by the cone test",
                "count",
            )?,
            draws: registry.register_gauge(FILTER_NAMESPACE, "draws", "Draw slots opened", "count")?,
            triangles_submitted: registry.register_gauge(
                FILTER_NAMESPACE,
                "triangles_submitted",
                "Triangles handed to the filter",
                "count",
            )?,
            triangles_accepted: per_view("triangles_accepted", "Triangles kept by the filter")?,
            compacted_draws: per_view("compacted_draws", "Indirect draws after compaction")?,
            light_assignments: registry.register_gauge(
                LIGHT_NAMESPACE,
                "assignments",
                "Light-tile pairs written",
                "count",
            )?,
            light_overflow: registry.register_counter(
                LIGHT_NAMESPACE,
                "overflow",
                "Light-tile pairs dropped on full tiles",
            )?,
            graphics: QueueCounters::register(registry, QueueKind::Graphics)?,
            compute: QueueCounters::register(registry, QueueKind::Compute)?,
        })
    }

    /// Times a frame recording into the record-time histogram until dropped.
    pub fn record_timer(&self) -> ScopedMetricTimer<'_> {
        ScopedMetricTimer::new(&self.record_time)
    }

    /// Publishes the recording side of a frame.
    pub fn observe_frame(&self, report: &FrameReport) {
        let result = (|| {
            self.frames.increment()?;
            if report.filtered {
                self.total_clusters.set(report.total_clusters as f64)?;
                self.culled_clusters.set(report.culled_clusters as f64)?;
                self.draws.set(report.draws as f64)?;
                self.triangles_submitted
                    .set(report.triangles_submitted as f64)?;
            }
            Ok::<_, MetricsError>(())
        })();
        if let Err(e) = result {
            log::warn!("RenderAgent: failed to publish frame metrics: {e}");
        }
    }

    /// Publishes what a queue reported for one submission.
    pub fn observe_execution(&self, report: &ExecutionReport) {
        let counters = match report.queue {
            QueueKind::Graphics => &self.graphics,
            QueueKind::Compute => &self.compute,
        };
        let result = (|| {
            counters.submissions.increment()?;
            if !report.succeeded() {
                counters.failures.increment()?;
                return Ok(());
            }
            let stats = &report.stats;
            if stats.filter.triangles_tested > 0 {
                for view in [VIEW_SHADOW, VIEW_CAMERA] {
                    self.triangles_accepted[view].set(stats.filter.triangles_accepted[view] as f64)?;
                    self.compacted_draws[view].set(stats.draws(view) as f64)?;
                }
            }
            if let Some(lights) = stats.lights {
                self.light_assignments.set(lights.assignments as f64)?;
                self.light_overflow.increment_by(lights.overflowed as u64)?;
            }
            Ok::<_, MetricsError>(())
        })();
        if let Err(e) = result {
            log::warn!("RenderAgent: failed to publish queue metrics: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vbuffer_core::telemetry::MetricId;
    use vbuffer_lanes::light_lane::LightClusterStats;

    use crate::render_agent::report::ExecutionStats;

    fn gauge(registry: &MetricsRegistry, namespace: &str, name: &str) -> f64 {
        registry
            .get_metric(&MetricId::new(namespace, name))
            .unwrap()
            .value
            .as_gauge()
            .unwrap()
    }

    #[test]
    fn test_frame_report_updates_gauges() {
        let registry = MetricsRegistry::new();
        let metrics = AgentMetrics::register(&registry).unwrap();
        metrics.observe_frame(&FrameReport {
            filtered: true,
            total_clusters: 40,
            culled_clusters: 12,
            draws: 5,
            record_time: Duration::from_millis(2),
            ..Default::default()
        });
        assert_eq!(gauge(&registry, "filter", "culled_clusters"), 12.0);
        assert_eq!(gauge(&registry, "filter", "total_clusters"), 40.0);
        let frames = registry
            .get_metric(&MetricId::new("frame", "count"))
            .unwrap();
        assert_eq!(frames.value.as_counter(), Some(1));
    }

    #[test]
    fn test_record_timer_fills_the_histogram() {
        let registry = MetricsRegistry::new();
        let metrics = AgentMetrics::register(&registry).unwrap();
        drop(metrics.record_timer());
        {
            let _timer = metrics.record_timer();
        }
        let summary = registry
            .get_metric(&MetricId::new("frame", "record_time_ms"))
            .unwrap()
            .value
            .histogram_summary()
            .unwrap();
        assert_eq!(summary.count, 2);
    }

    #[test]
    fn test_failed_execution_counts_against_its_queue() {
        let registry = MetricsRegistry::new();
        let metrics = AgentMetrics::register(&registry).unwrap();
        let mut stats = ExecutionStats::default();
        stats.lights = Some(LightClusterStats {
            lights_in_front: 4,
            assignments: 9,
            overflowed: 0,
        });
        let ok = ExecutionReport {
            queue: QueueKind::Compute,
            frame: 0,
            label: "compute".into(),
            stats,
            duration: Duration::ZERO,
            error: None,
        };
        metrics.observe_execution(&ok);
        metrics.observe_execution(&ExecutionReport {
            error: Some("boom".into()),
            ..ok.clone()
        });

        let failures = MetricId::new("queue", "failures").with_label("queue", "compute");
        let submissions = MetricId::new("queue", "submissions").with_label("queue", "compute");
        assert_eq!(registry.get_metric(&failures).unwrap().value.as_counter(), Some(1));
        assert_eq!(registry.get_metric(&submissions).unwrap().value.as_counter(), Some(2));
        assert_eq!(gauge(&registry, "light", "assignments"), 9.0);
    }
}
