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

//! Metric identifiers, values and errors.

use serde::Serialize;
use std::fmt::{self, Display};
use std::time::Instant;

/// Identifies a metric: a namespace, a name and sorted labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricId {
    /// Broad category (`"filter"`, `"pass"`, `"frame"`).
    pub namespace: String,
    /// Metric name (`"culled_clusters"`).
    pub name: String,
    /// Key/value pairs sorted by key.
    pub labels: Vec<(String, String)>,
}

impl MetricId {
    /// Creates an id without labels.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            labels: Vec::new(),
        }
    }

    /// Adds a label, keeping labels sorted by key.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self.labels.sort_by(|a, b| a.0.cmp(&b.0));
        self
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)?;
        if !self.labels.is_empty() {
            let labels = self
                .labels
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "[{labels}]")?;
        }
        Ok(())
    }
}

/// Kind of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricType {
    /// Monotonic count.
    Counter,
    /// Last written value.
    Gauge,
    /// Distribution of samples.
    Histogram,
}

/// Current value of a metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricValue {
    /// Count.
    Counter {
        /// Accumulated count.
        value: u64,
    },
    /// Gauge.
    Gauge {
        /// Last value.
        value: f64,
    },
    /// Histogram over fixed buckets.
    Histogram {
        /// Samples in recording order.
        samples: Vec<f64>,
        /// Inclusive upper bounds of the buckets.
        bucket_bounds: Vec<f64>,
        /// Samples per bucket; the last entry counts samples above every bound.
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// Kind of the value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter { .. } => MetricType::Counter,
            MetricValue::Gauge { .. } => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// Counter value.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter { value } => Some(*value),
            _ => None,
        }
    }

    /// Gauge value.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge { value } => Some(*value),
            _ => None,
        }
    }

    /// Summary of a histogram, `None` for other kinds or without samples.
    pub fn histogram_summary(&self) -> Option<HistogramSummary> {
        match self {
            MetricValue::Histogram { samples, .. } => HistogramSummary::from_samples(samples),
            _ => None,
        }
    }
}

/// Condensed statistics of histogram samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramSummary {
    /// Sample count.
    pub count: usize,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// 95th percentile (nearest rank).
    pub p95: f64,
}

impl HistogramSummary {
    /// Summarizes `samples`, `None` when empty.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len();
        let rank = ((0.95 * count as f64).ceil() as usize).clamp(1, count);
        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: sorted.iter().sum::<f64>() / count as f64,
            p95: sorted[rank - 1],
        })
    }
}

/// Static description of a metric.
#[derive(Debug, Clone)]
pub struct MetricMetadata {
    /// Identifier.
    pub id: MetricId,
    /// Kind.
    pub metric_type: MetricType,
    /// Human-readable description.
    pub description: String,
    /// Unit (`"ms"`, `"count"`).
    pub unit: String,
    /// Registration time.
    pub created_at: Instant,
    /// Last update time.
    pub last_updated: Instant,
}

impl MetricMetadata {
    /// Creates metadata stamped with the current time.
    pub fn new(
        id: MetricId,
        metric_type: MetricType,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            metric_type,
            description: description.into(),
            unit: unit.into(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Refreshes `last_updated`.
    pub fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

/// A metric with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// Description.
    pub metadata: MetricMetadata,
    /// Value.
    pub value: MetricValue,
}

impl Metric {
    /// A counter starting at `initial`.
    pub fn counter(id: MetricId, description: impl Into<String>, initial: u64) -> Self {
        Self {
            metadata: MetricMetadata::new(id, MetricType::Counter, description, "count"),
            value: MetricValue::Counter { value: initial },
        }
    }

    /// A gauge starting at `initial`.
    pub fn gauge(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        initial: f64,
    ) -> Self {
        Self {
            metadata: MetricMetadata::new(id, MetricType::Gauge, description, unit),
            value: MetricValue::Gauge { value: initial },
        }
    }

    /// An empty histogram over `bucket_bounds`.
    pub fn histogram(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> Self {
        let bucket_counts = vec![0; bucket_bounds.len() + 1];
        Self {
            metadata: MetricMetadata::new(id, MetricType::Histogram, description, unit),
            value: MetricValue::Histogram {
                samples: Vec::new(),
                bucket_bounds,
                bucket_counts,
            },
        }
    }
}

/// Result of metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error of the metrics system.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// No metric registered under the id.
    MetricNotFound(MetricId),
    /// The operation does not fit the metric's kind.
    TypeMismatch {
        /// Kind the operation needs.
        expected: MetricType,
        /// Kind of the registered metric.
        found: MetricType,
    },
    /// The storage failed.
    StorageError(String),
    /// The operation is not valid (unsorted histogram bounds).
    InvalidOperation(String),
}

impl Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::MetricNotFound(id) => write!(f, "Metric not found: {id}"),
            MetricsError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected:?}, found {found:?}")
            }
            MetricsError::StorageError(msg) => write!(f, "Storage error: {msg}"),
            MetricsError::InvalidOperation(msg) => write!(f, "Invalid operation: {msg}"),
        }
    }
}

impl std::error::Error for MetricsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_id_labels_sorted_and_formatted() {
        let id = MetricId::new("pass", "duration_ms")
            .with_label("queue", "graphics")
            .with_label("pass", "shadow");
        assert_eq!(id.labels[0].0, "pass");
        assert_eq!(id.to_string(), "pass:duration_ms[pass=shadow,queue=graphics]");
        assert_eq!(MetricId::new("filter", "culled_clusters").to_string(), "filter:culled_clusters");
    }

    #[test]
    fn test_histogram_summary() {
        let samples: Vec<f64> = (1..=20).map(f64::from).collect();
        let summary = HistogramSummary::from_samples(&samples).unwrap();
        assert_eq!(summary.count, 20);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 20.0);
        assert_eq!(summary.mean, 10.5);
        assert_eq!(summary.p95, 19.0);
        assert!(HistogramSummary::from_samples(&[]).is_none());
    }

    #[test]
    fn test_value_accessors() {
        let metric = Metric::counter(MetricId::new("frame", "presented"), "Frames", 3);
        assert_eq!(metric.value.as_counter(), Some(3));
        assert_eq!(metric.value.as_gauge(), None);
        let hist = Metric::histogram(MetricId::new("pass", "t"), "", "ms", vec![1.0, 2.0]);
        assert_eq!(hist.value.metric_type(), MetricType::Histogram);
        assert!(hist.value.histogram_summary().is_none());
    }
}
