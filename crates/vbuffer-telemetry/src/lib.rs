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

//! # VBuffer Telemetry
//!
//! Storage and export of the numbers the pipeline reports: per-frame
//! counters (clusters culled, triangles surviving the filter, draws
//! compacted, lights binned), pass timings recorded by the queue workers,
//! and the logger installed by binaries.

#![warn(missing_docs)]

pub mod export;
pub mod logging;
pub mod metrics;
pub mod service;
pub mod storage;
pub mod timing;
pub mod utils;

pub use export::MetricsSnapshot;
pub use metrics::registry::{CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry};
pub use service::TelemetryService;
pub use timing::PassTimingRecorder;
pub use utils::timer::ScopedMetricTimer;
