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

//! JSON export of the registry contents.

use crate::metrics::registry::MetricsRegistry;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use vbuffer_core::telemetry::{HistogramSummary, Metric, MetricValue};

/// One exported metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricEntry {
    /// Formatted id, `namespace:name[labels]`.
    pub id: String,
    /// Namespace of the id.
    pub namespace: String,
    /// Name of the id.
    pub name: String,
    /// Labels of the id.
    pub labels: Vec<(String, String)>,
    /// Description given at registration.
    pub description: String,
    /// Unit given at registration.
    pub unit: String,
    /// Raw value. Histogram samples are left out when `summary` is present.
    pub value: MetricValue,
    /// Histogram statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<HistogramSummary>,
}

impl MetricEntry {
    fn from_metric(metric: Metric, keep_samples: bool) -> Self {
        let summary = metric.value.histogram_summary();
        let mut value = metric.value;
        if let MetricValue::Histogram { samples, .. } = &mut value {
            if !keep_samples {
                samples.clear();
            }
        }
        let id = metric.metadata.id;
        Self {
            id: id.to_string(),
            namespace: id.namespace,
            name: id.name,
            labels: id.labels,
            description: metric.metadata.description,
            unit: metric.metadata.unit,
            value,
            summary,
        }
    }
}

/// Serializable copy of every metric at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Frames presented when the snapshot was taken.
    pub frames: u64,
    /// Metrics sorted by id.
    pub metrics: Vec<MetricEntry>,
}

impl MetricsSnapshot {
    /// Copies the registry. Histogram samples are only kept with
    /// `keep_samples`; the summary is always present.
    pub fn capture(registry: &MetricsRegistry, frames: u64, keep_samples: bool) -> Self {
        Self {
            frames,
            metrics: registry
                .all_metrics()
                .into_iter()
                .map(|m| MetricEntry::from_metric(m, keep_samples))
                .collect(),
        }
    }

    /// Entry with the formatted id `id`.
    pub fn find(&self, id: &str) -> Option<&MetricEntry> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metrics snapshot")
    }

    /// Writes the pretty-printed JSON to `path`.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        log::info!("Wrote {} metrics to {}", self.metrics.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MetricsRegistry {
        let registry = MetricsRegistry::new();
        registry
            .register_counter("filter", "culled_clusters", "Clusters culled")
            .unwrap()
            .increment_by(12)
            .unwrap();
        let hist = registry
            .register_histogram("frame", "cpu_ms", "Frame CPU time", "ms", vec![1.0, 2.0])
            .unwrap();
        hist.observe(0.5).unwrap();
        hist.observe(1.5).unwrap();
        registry
    }

    #[test]
    fn test_snapshot_json_layout() {
        let snapshot = MetricsSnapshot::capture(&registry(), 7, false);
        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(json["frames"], 7);
        let metrics = json["metrics"].as_array().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0]["id"], "filter:culled_clusters");
        assert_eq!(metrics[0]["value"]["type"], "counter");
        assert_eq!(metrics[0]["value"]["value"], 12);
        assert!(metrics[0].get("summary").is_none());

        assert_eq!(metrics[1]["value"]["type"], "histogram");
        assert_eq!(metrics[1]["value"]["samples"].as_array().unwrap().len(), 0);
        assert_eq!(metrics[1]["summary"]["count"], 2);
        assert_eq!(metrics[1]["summary"]["mean"], 1.0);
    }

    #[test]
    fn test_samples_kept_on_request() {
        let snapshot = MetricsSnapshot::capture(&registry(), 1, true);
        match &snapshot.find("frame:cpu_ms").unwrap().value {
            MetricValue::Histogram { samples, .. } => assert_eq!(samples, &vec![0.5, 1.5]),
            other => panic!("expected histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_write_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        MetricsSnapshot::capture(&registry(), 3, false)
            .write_json(&path)
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"filter:culled_clusters\""));

        let missing = dir.path().join("no_such_dir").join("metrics.json");
        let err = MetricsSnapshot::capture(&registry(), 3, false)
            .write_json(&missing)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to write metrics"));
    }
}
