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

//! # Renderer data model
//!
//! Types shared by every stage of the visibility-buffer pipeline:
//!
//! - [`constants`]: cluster, batch, draw and light-grid sizes.
//! - [`cluster`]: per-mesh cluster cones and bounds.
//! - [`filter`]: batch records, uncompacted and compacted draw arguments,
//!   visibility-buffer id packing.
//! - [`light`]: point lights.
//! - [`uniforms`]: per-view transforms, culling viewports and per-frame constants.
//! - [`resource`]: resource states, barriers and state-tracked buffers.
//! - [`sync`]: fences and semaphores.
//! - [`ring`]: per-frame-in-flight slot rings.
//! - [`settings`]: application settings.

pub mod cluster;
pub mod constants;
pub mod error;
pub mod filter;
pub mod light;
pub mod resource;
pub mod ring;
pub mod settings;
pub mod sync;
pub mod uniforms;

pub use self::cluster::{Cluster, ClusterCompact, ClusterContainer};
pub use self::constants::*;
pub use self::error::{RenderError, ResourceError};
pub use self::filter::{
    FilterBatchChunk, FilterBatchData, GeometrySet, IndirectDrawBuffer,
    IndirectDrawIndexArguments, UncompactedDrawArguments, VisibilityId,
};
pub use self::light::LightData;
pub use self::resource::{BufferBarrier, ResourceState, TrackedBuffer};
pub use self::ring::FrameRing;
pub use self::settings::{
    AmbientOcclusionSettings, AppSettings, GodraySettings, LightingMode, RenderMode,
    SettingsError, ShadowFilter,
};
pub use self::sync::{Fence, FenceStatus, Semaphore};
pub use self::uniforms::{
    CullingViewport, FilterFlags, PerFrameConstants, PerFrameData, ViewTransform,
};
