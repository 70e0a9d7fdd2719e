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

//! Metric and timing contracts of the pipeline.
//!
//! The types here are the vocabulary shared by the stages that report
//! (queues, frame driver) and `vbuffer-telemetry`, which stores and exports
//! them.

pub mod metrics;
pub mod timing;

pub use self::metrics::{
    HistogramSummary, Metric, MetricId, MetricMetadata, MetricType, MetricValue, MetricsError,
    MetricsResult,
};
pub use self::timing::{NullTimingSink, PassTiming, QueueKind, TimingSink};
