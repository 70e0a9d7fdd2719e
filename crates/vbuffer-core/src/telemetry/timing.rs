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

use std::fmt;
use std::time::Duration;

/// Queue a command buffer ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Graphics queue: render passes and, without async compute, everything.
    Graphics,
    /// Compute queue: filtering and light clustering.
    Compute,
}

impl QueueKind {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueKind::Graphics => "graphics",
            QueueKind::Compute => "compute",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time spent between a begin and an end marker of a command buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PassTiming {
    /// Queue that executed the range.
    pub queue: QueueKind,
    /// Marker name (`"Triangle Filtering"`).
    pub name: String,
    /// Frame the command buffer was recorded for.
    pub frame: u64,
    /// Wall-clock duration.
    pub duration: Duration,
}

/// Receives pass timings from the queues.
///
/// Implementations are called from the queue worker threads.
pub trait TimingSink: Send + Sync {
    /// Records one timed range.
    fn record(&self, timing: PassTiming);
}

/// Discards every timing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTimingSink;

impl TimingSink for NullTimingSink {
    fn record(&self, _timing: PassTiming) {}
}
