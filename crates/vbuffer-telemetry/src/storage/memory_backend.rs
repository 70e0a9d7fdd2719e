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

use crate::storage::backend::{BackendStats, MetricsBackend};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use vbuffer_core::telemetry::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};

/// In-memory metrics storage behind a `RwLock`.
///
/// Metrics are kept in a `BTreeMap` so listings and exports come out in a
/// stable order from frame to frame.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: RwLock<BTreeMap<MetricId, Metric>>,
}

impl InMemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> MetricsResult<RwLockReadGuard<'_, BTreeMap<MetricId, Metric>>> {
        self.storage
            .read()
            .map_err(|_| MetricsError::StorageError("Failed to acquire read lock".to_string()))
    }

    fn write(&self) -> MetricsResult<RwLockWriteGuard<'_, BTreeMap<MetricId, Metric>>> {
        self.storage
            .write()
            .map_err(|_| MetricsError::StorageError("Failed to acquire write lock".to_string()))
    }

    /// Statistics about the stored metrics
    pub fn get_stats(&self) -> BackendStats {
        let Ok(storage) = self.read() else {
            return BackendStats::default();
        };

        let mut stats = BackendStats {
            total_metrics: storage.len(),
            ..Default::default()
        };
        for metric in storage.values() {
            match &metric.value {
                MetricValue::Counter { .. } => stats.counter_count += 1,
                MetricValue::Gauge { .. } => stats.gauge_count += 1,
                MetricValue::Histogram { samples, .. } => {
                    stats.histogram_count += 1;
                    stats.histogram_samples += samples.len();
                }
            }
        }
        stats
    }

    /// Metrics of one namespace
    pub fn get_metrics_by_namespace(&self, namespace: &str) -> Vec<Metric> {
        self.filtered(|metric| metric.metadata.id.namespace == namespace)
    }

    /// Metrics of one kind
    pub fn get_metrics_by_type(&self, metric_type: MetricType) -> Vec<Metric> {
        self.filtered(|metric| metric.metadata.metric_type == metric_type)
    }

    fn filtered(&self, keep: impl Fn(&Metric) -> bool) -> Vec<Metric> {
        match self.read() {
            Ok(storage) => storage.values().filter(|m| keep(*m)).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Remove every metric of a namespace, returning how many were removed
    pub fn remove_metrics_by_namespace(&self, namespace: &str) -> MetricsResult<usize> {
        let mut storage = self.write()?;
        let before = storage.len();
        storage.retain(|id, _| id.namespace != namespace);
        Ok(before - storage.len())
    }
}

impl MetricsBackend for InMemoryBackend {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn put_metric(&self, metric: Metric) -> MetricsResult<()> {
        self.write()?.insert(metric.metadata.id.clone(), metric);
        Ok(())
    }

    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    fn contains_metric(&self, id: &MetricId) -> bool {
        self.read().map(|s| s.contains_key(id)).unwrap_or(false)
    }

    fn remove_metric(&self, id: &MetricId) -> MetricsResult<()> {
        self.write()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    fn list_metric_ids(&self) -> Vec<MetricId> {
        self.read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn list_all_metrics(&self) -> Vec<Metric> {
        self.read()
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_all(&self) -> MetricsResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn metric_count(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    // Updates happen under one write lock so concurrent queue workers never
    // lose increments between the read and the write.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut storage = self.write()?;
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        match metric.value {
            MetricValue::Counter { ref mut value } => {
                *value = value.saturating_add(delta);
                let result = *value;
                metric.metadata.touch();
                Ok(result)
            }
            _ => Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: metric.value.metric_type(),
            }),
        }
    }

    fn record_histogram_sample(&self, id: &MetricId, sample: f64) -> MetricsResult<()> {
        let mut storage = self.write()?;
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        match metric.value {
            MetricValue::Histogram {
                ref mut samples,
                ref bucket_bounds,
                ref mut bucket_counts,
            } => {
                samples.push(sample);
                let bucket = bucket_bounds
                    .iter()
                    .position(|&bound| sample <= bound)
                    .unwrap_or(bucket_bounds.len());
                if let Some(count) = bucket_counts.get_mut(bucket) {
                    *count += 1;
                }
                metric.metadata.touch();
                Ok(())
            }
            _ => Err(MetricsError::TypeMismatch {
                expected: MetricType::Histogram,
                found: metric.value.metric_type(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn counter(namespace: &str, name: &str) -> Metric {
        Metric::counter(MetricId::new(namespace, name), "test counter", 0)
    }

    #[test]
    fn test_put_get_remove() {
        let backend = InMemoryBackend::new();
        let metric = counter("filter", "culled_clusters");
        let id = metric.metadata.id.clone();

        backend.put_metric(metric).unwrap();
        assert!(backend.contains_metric(&id));
        assert_eq!(backend.get_metric(&id).unwrap().value.as_counter(), Some(0));

        backend.remove_metric(&id).unwrap();
        assert!(!backend.contains_metric(&id));
        assert!(matches!(
            backend.remove_metric(&id),
            Err(MetricsError::MetricNotFound(_))
        ));
    }

    #[test]
    fn test_listing_is_sorted() {
        let backend = InMemoryBackend::new();
        for (ns, name) in [("pass", "shadow"), ("filter", "draws"), ("filter", "batches")] {
            backend.put_metric(counter(ns, name)).unwrap();
        }
        let names: Vec<String> = backend
            .list_metric_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(names, vec!["filter:batches", "filter:draws", "pass:shadow"]);
    }

    #[test]
    fn test_stats_and_namespace_removal() {
        let backend = InMemoryBackend::new();
        backend.put_metric(counter("filter", "a")).unwrap();
        backend.put_metric(counter("filter", "b")).unwrap();
        let hist_id = MetricId::new("pass", "time");
        backend
            .put_metric(Metric::histogram(hist_id.clone(), "t", "ms", vec![1.0]))
            .unwrap();
        backend.record_histogram_sample(&hist_id, 0.5).unwrap();
        backend.record_histogram_sample(&hist_id, 3.0).unwrap();

        let stats = backend.get_stats();
        assert_eq!(stats.total_metrics, 3);
        assert_eq!(stats.counter_count, 2);
        assert_eq!(stats.histogram_count, 1);
        assert_eq!(stats.histogram_samples, 2);

        assert_eq!(backend.remove_metrics_by_namespace("filter").unwrap(), 2);
        assert_eq!(backend.metric_count(), 1);
        assert_eq!(backend.get_metrics_by_type(MetricType::Histogram).len(), 1);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let backend = Arc::new(InMemoryBackend::new());
        let metric = counter("queue", "submissions");
        let id = metric.metadata.id.clone();
        backend.put_metric(metric).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let backend = backend.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        backend.increment_counter(&id, 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(backend.get_metric(&id).unwrap().value.as_counter(), Some(1000));
    }
}
