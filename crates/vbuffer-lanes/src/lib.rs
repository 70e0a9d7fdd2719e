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

//! # VBuffer Lanes
//!
//! The algorithms of the pipeline, each grouped in a lane:
//!
//! - [`cluster_lane`]: splits meshes into clusters and fits their visibility cones.
//! - [`culling_lane`]: cone culling, batch building, the per-triangle filter
//!   and batch compaction.
//! - [`light_lane`]: screen-space binning of point lights.
//! - [`uniform_lane`]: per-frame view transforms and constants.
//! - [`render_lane`]: software rasterizer and the shadow, visibility-buffer,
//!   G-buffer, ambient occlusion, shading and present passes.
//!
//! Compute kernels are plain functions over buffer slices so the queues can
//! run them on whatever buffers a command references. Render passes
//! implement [`vbuffer_core::lane::Lane`] and are looked up by name.

pub mod cluster_lane;
pub mod culling_lane;
pub mod error;
pub mod frame;
pub mod gpu_scene;
pub mod light_lane;
pub mod render_lane;
pub mod uniform_lane;

pub use error::{FilterError, PassError, UniformError};
pub use frame::{FrameResources, ViewResources};
pub use gpu_scene::{GpuMesh, GpuScene};
