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

//! # Lane Abstraction
//!
//! A **Lane** is one self-contained processing stage of the pipeline: a
//! render pass, a compute kernel wrapper, the uniform update. The owning
//! agent (or the queue executing a command buffer) fills a [`LaneContext`]
//! with the data the stage needs and calls [`Lane::execute`].
//!
//! ```text
//! on_initialize(ctx)  →  [ execute(ctx) ]*  →  on_shutdown(ctx)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use vbuffer_core::lane::{Lane, LaneContext, LaneError, LaneKind};
//!
//! struct CountingLane;
//!
//! impl Lane for CountingLane {
//!     fn strategy_name(&self) -> &'static str { "Counting" }
//!     fn lane_kind(&self) -> LaneKind { LaneKind::Culling }
//!
//!     fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
//!         let counter = ctx.get_mut::<u32>().ok_or(LaneError::missing("u32"))?;
//!         *counter += 1;
//!         Ok(())
//!     }
//!
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//! }
//!
//! let mut ctx = LaneContext::new();
//! ctx.insert(0u32);
//! CountingLane.execute(&mut ctx).unwrap();
//! assert_eq!(ctx.get::<u32>(), Some(&1));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Error type for lane operations.
#[derive(Debug)]
pub enum LaneError {
    /// The lane has not been initialized yet.
    NotInitialized,
    /// The context does not hold an entry the lane requires.
    InvalidContext {
        /// What the lane expected.
        expected: &'static str,
        /// Description of what was received.
        received: String,
    },
    /// A domain-specific error occurred during execution.
    ExecutionFailed(Box<dyn std::error::Error + Send + Sync>),
    /// A domain-specific error occurred during initialization.
    InitializationFailed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::NotInitialized => write!(f, "Lane not initialized"),
            LaneError::InvalidContext { expected, received } => {
                write!(f, "Invalid lane context: expected {expected}, got {received}")
            }
            LaneError::ExecutionFailed(e) => write!(f, "Lane execution failed: {e}"),
            LaneError::InitializationFailed(e) => write!(f, "Lane initialization failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::ExecutionFailed(e) | LaneError::InitializationFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl LaneError {
    /// Convenience constructor for a missing context entry.
    pub fn missing(type_name: &'static str) -> Self {
        LaneError::InvalidContext {
            expected: type_name,
            received: "not found in LaneContext".into(),
        }
    }

    /// Wraps any error raised while executing.
    pub fn execution<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LaneError::ExecutionFailed(Box::new(error))
    }
}

/// Classification of lanes, used for routing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Load-time cluster construction.
    Cluster,
    /// Cluster culling, triangle filtering and batch compaction.
    Culling,
    /// Light clustering.
    Lighting,
    /// Per-frame uniform and camera state.
    Uniform,
    /// Shadow map generation.
    Shadow,
    /// Geometry and shading passes.
    Render,
    /// Tone mapping and presentation.
    Present,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaneKind::Cluster => "Cluster",
            LaneKind::Culling => "Culling",
            LaneKind::Lighting => "Lighting",
            LaneKind::Uniform => "Uniform",
            LaneKind::Shadow => "Shadow",
            LaneKind::Render => "Render",
            LaneKind::Present => "Present",
        };
        f.write_str(name)
    }
}

/// A type-map carrying the inputs and outputs of a lane invocation.
///
/// Values are keyed by their concrete type; inserting a second value of the
/// same type replaces the first.
pub struct LaneContext {
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl LaneContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Inserts a value, keyed by its concrete type.
    pub fn insert<T: 'static + Send + Sync>(&mut self, value: T) {
        self.data.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Shared reference to a value by type.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Mutable reference to a value by type.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    /// Shared reference to a required value, or [`LaneError::missing`].
    pub fn require<T: 'static>(&self) -> Result<&T, LaneError> {
        self.get::<T>()
            .ok_or_else(|| LaneError::missing(std::any::type_name::<T>()))
    }

    /// Checks whether a value of the given type is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a value by type.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast().ok().map(|b| *b))
    }
}

impl Default for LaneContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LaneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneContext")
            .field("entries", &self.data.len())
            .finish()
    }
}

/// Stores [`Lane`] trait objects and finds them by name or kind.
pub struct LaneRegistry {
    lanes: Vec<Box<dyn Lane>>,
}

impl LaneRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { lanes: Vec::new() }
    }

    /// Adds a lane.
    pub fn register(&mut self, lane: Box<dyn Lane>) {
        log::debug!(
            "Registering lane '{}' ({})",
            lane.strategy_name(),
            lane.lane_kind()
        );
        self.lanes.push(lane);
    }

    /// Finds a lane by strategy name.
    pub fn get(&self, name: &str) -> Option<&dyn Lane> {
        self.lanes
            .iter()
            .find(|l| l.strategy_name() == name)
            .map(|b| b.as_ref())
    }

    /// All lanes of a given kind, in registration order.
    pub fn find_by_kind(&self, kind: LaneKind) -> Vec<&dyn Lane> {
        self.lanes
            .iter()
            .filter(|l| l.lane_kind() == kind)
            .map(|b| b.as_ref())
            .collect()
    }

    /// Calls [`Lane::on_initialize`] on every lane.
    pub fn initialize_all(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
        self.lanes.iter().try_for_each(|l| l.on_initialize(ctx))
    }

    /// Calls [`Lane::on_shutdown`] on every lane.
    pub fn shutdown_all(&self, ctx: &mut LaneContext) {
        self.lanes.iter().for_each(|l| l.on_shutdown(ctx));
    }

    /// Number of registered lanes.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// `true` if no lanes are registered.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

impl Default for LaneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LaneRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.lanes.iter().map(|l| l.strategy_name()))
            .finish()
    }
}

/// Base trait of every pipeline stage.
pub trait Lane: Send + Sync {
    /// Unique human-readable name of the strategy (`"VisibilityBufferPass"`).
    fn strategy_name(&self) -> &'static str;

    /// The kind of processing this lane performs.
    fn lane_kind(&self) -> LaneKind;

    /// Relative cost estimate; `1.0` by default.
    fn estimate_cost(&self, _ctx: &LaneContext) -> f32 {
        1.0
    }

    /// Called once before the first execution.
    fn on_initialize(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Ok(())
    }

    /// Runs the stage.
    fn execute(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Ok(())
    }

    /// Called when the owner shuts down.
    fn on_shutdown(&self, _ctx: &mut LaneContext) {}

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}
