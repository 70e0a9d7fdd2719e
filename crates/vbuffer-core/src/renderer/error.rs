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

//! Error types of the pipeline resources and the frame driver.

use std::fmt;

use super::resource::ResourceState;
use super::settings::SettingsError;
use crate::lane::LaneError;

/// An error raised while accessing or transitioning a tracked resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The resource was accessed in a state that does not allow the access.
    StateMismatch {
        /// Label of the resource.
        label: String,
        /// States any of which would have allowed the access.
        required: ResourceState,
        /// State the resource was in.
        actual: ResourceState,
    },
    /// A barrier's `before` state does not match the tracked state.
    InvalidBarrier {
        /// Label of the resource.
        label: String,
        /// State declared by the barrier.
        before: ResourceState,
        /// State the resource was in.
        actual: ResourceState,
    },
    /// A lock guarding the resource was poisoned by a panicking thread.
    Poisoned(String),
    /// An element index fell outside the resource.
    OutOfBounds {
        /// Label of the resource.
        label: String,
        /// Offending index.
        index: usize,
        /// Element count of the resource.
        len: usize,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::StateMismatch {
                label,
                required,
                actual,
            } => write!(
                f,
                "Resource '{label}' accessed in state {actual:?}, expected one of {required:?}"
            ),
            ResourceError::InvalidBarrier {
                label,
                before,
                actual,
            } => write!(
                f,
                "Barrier on '{label}' declares before-state {before:?} but the resource is in {actual:?}"
            ),
            ResourceError::Poisoned(label) => write!(f, "Lock of resource '{label}' is poisoned"),
            ResourceError::OutOfBounds { label, index, len } => {
                write!(f, "Index {index} out of bounds for '{label}' ({len} elements)")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// A high-level error of the frame driver.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the pipeline was loaded.
    NotInitialized,
    /// The settings were rejected.
    InvalidSettings(SettingsError),
    /// A tracked resource was misused.
    Resource(ResourceError),
    /// A lane failed.
    Lane(LaneError),
    /// Batching produced more draws than the argument buffers hold.
    TooManyDraws {
        /// Draw slots needed.
        requested: u32,
        /// Draw slots available.
        max: u32,
    },
    /// A queue worker is gone.
    QueueDisconnected(String),
    /// A submitted command buffer failed on its queue.
    QueueFailed {
        /// Queue name.
        queue: String,
        /// Failure description.
        message: String,
    },
    /// An unexpected internal error.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => write!(f, "The pipeline is not loaded."),
            RenderError::InvalidSettings(err) => write!(f, "Invalid settings: {err}"),
            RenderError::Resource(err) => write!(f, "Resource error: {err}"),
            RenderError::Lane(err) => write!(f, "Lane error: {err}"),
            RenderError::TooManyDraws { requested, max } => write!(
                f,
                "Batching needs {requested} draw slots but only {max} are available"
            ),
            RenderError::QueueDisconnected(queue) => {
                write!(f, "The {queue} queue is disconnected")
            }
            RenderError::QueueFailed { queue, message } => {
                write!(f, "Command buffer failed on the {queue} queue: {message}")
            }
            RenderError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::InvalidSettings(err) => Some(err),
            RenderError::Resource(err) => Some(err),
            RenderError::Lane(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::Resource(err)
    }
}

impl From<LaneError> for RenderError {
    fn from(err: LaneError) -> Self {
        RenderError::Lane(err)
    }
}

impl From<SettingsError> for RenderError {
    fn from(err: SettingsError) -> Self {
        RenderError::InvalidSettings(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn resource_error_display() {
        let err = ResourceError::InvalidBarrier {
            label: "uncompacted_args[1]".to_string(),
            before: ResourceState::SHADER_RESOURCE,
            actual: ResourceState::UNORDERED_ACCESS,
        };
        assert_eq!(
            format!("{err}"),
            "Barrier on 'uncompacted_args[1]' declares before-state ResourceState(SHADER_RESOURCE) \
             but the resource is in ResourceState(UNORDERED_ACCESS)"
        );
    }

    #[test]
    fn render_error_wraps_resource_error() {
        let err: RenderError = ResourceError::Poisoned("constants".to_string()).into();
        assert_eq!(
            format!("{err}"),
            "Resource error: Lock of resource 'constants' is poisoned"
        );
        assert!(err.source().is_some());
    }
}
