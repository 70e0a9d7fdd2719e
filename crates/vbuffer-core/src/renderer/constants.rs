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

//! Fixed sizes of the pipeline.
//!
//! These mirror the values baked into the filtering and light-clustering
//! kernels and size every per-frame buffer.

/// Triangles per cluster.
pub const CLUSTER_SIZE: u32 = 256;

/// Filter batches (clusters) per batch chunk, i.e. thread groups per
/// filtering dispatch.
pub const BATCH_COUNT: u32 = 64;

/// Batch chunk records cycled through during a frame.
pub const SMALL_BATCH_CHUNK_COUNT: u32 = max_u32(1, 512 / CLUSTER_SIZE) * 16;

/// Draw slots per view in the uncompacted and compacted argument buffers.
pub const MAX_DRAWS_INDIRECT: u32 = 1024;

/// Threads per group of the clear and compaction kernels.
pub const CLEAR_THREAD_COUNT: u32 = 256;

/// Thread groups dispatched by the clear and compaction kernels.
pub const CLEAR_GROUP_COUNT: u32 = (MAX_DRAWS_INDIRECT / CLEAR_THREAD_COUNT) + 1;

/// Views filtered simultaneously.
pub const NUM_CULLING_VIEWPORTS: usize = 2;
/// Index of the shadow (sun) view.
pub const VIEW_SHADOW: usize = 0;
/// Index of the main camera view.
pub const VIEW_CAMERA: usize = 1;

/// Geometry sets drawn with separate indirect argument buffers.
pub const GEOMSET_COUNT: usize = 2;

/// Point lights binned every frame.
pub const LIGHT_COUNT: u32 = 128;
/// Horizontal light-grid tiles.
pub const LIGHT_CLUSTER_WIDTH: u32 = 8;
/// Vertical light-grid tiles.
pub const LIGHT_CLUSTER_HEIGHT: u32 = 8;
/// Total light-grid tiles.
pub const LIGHT_CLUSTER_COUNT: u32 = LIGHT_CLUSTER_WIDTH * LIGHT_CLUSTER_HEIGHT;
/// World-space radius of every point light.
pub const LIGHT_SIZE: f32 = 150.0;

/// Largest triangle count a single draw can reach.
pub const MAX_TRIANGLES_PER_DRAW: u32 = BATCH_COUNT * CLUSTER_SIZE;

/// Frames in flight when the settings do not say otherwise.
pub const DEFAULT_DATA_BUFFER_COUNT: u32 = 2;
/// Upper bound on frames in flight.
pub const MAX_DATA_BUFFER_COUNT: u32 = 3;

/// Highest radial sample count of the godray pass.
pub const MAX_GODRAY_SAMPLES: u32 = 128;
/// Godray blur weights, centre tap included.
pub const MAX_BLUR_KERNEL_SIZE: u32 = 8;
/// Camera pixels per godray texel along each axis.
pub const GODRAY_SCALE: u32 = 2;

const fn max_u32(a: u32, b: u32) -> u32 {
    if a > b {
        a
    } else {
        b
    }
}
