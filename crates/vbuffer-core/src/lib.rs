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

//! # VBuffer Core
//!
//! Foundational crate of the visibility-buffer pipeline. It holds the math
//! primitives, the GPU-facing data records shared by every stage (clusters,
//! filter batches, draw arguments, lights, per-frame constants), the resource
//! state tracking used by barriers, the fence/semaphore primitives used by the
//! queues, the application settings and the [`lane::Lane`] abstraction.
//!
//! Nothing in this crate executes pipeline work; the algorithms live in
//! `vbuffer-lanes` and the frame orchestration in `vbuffer-agents`.

#![warn(missing_docs)]

pub mod lane;
pub mod math;
pub mod renderer;
pub mod telemetry;
pub mod utils;
