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

//! Errors raised by the compute kernels and render passes.

use thiserror::Error;
use vbuffer_core::lane::LaneError;
use vbuffer_core::renderer::{RenderError, ResourceError};

/// A failure while batching, filtering or compacting triangles.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// More draws were opened in one frame than there are draw slots.
    #[error("frame needs {requested} draws, only {max} draw slots exist")]
    TooManyDraws {
        /// Draw slots the frame asked for.
        requested: u32,
        /// Draw slots available.
        max: u32,
    },
    /// A batch references a mesh that does not exist.
    #[error("batch references mesh {mesh_index}, scene has {mesh_count}")]
    UnknownMesh {
        /// Mesh index stored in the batch.
        mesh_index: u32,
        /// Meshes in the scene.
        mesh_count: usize,
    },
    /// A batch reads past the end of the scene index buffer.
    #[error("batch reads indices {start}..{end}, index buffer holds {len}")]
    IndexRange {
        /// First index read.
        start: u32,
        /// One past the last index read.
        end: u32,
        /// Index buffer length.
        len: usize,
    },
    /// A triangle references a vertex outside the vertex streams.
    #[error("vertex {index} out of range ({vertex_count} vertices)")]
    VertexOutOfRange {
        /// Offending vertex index.
        index: u32,
        /// Vertices in the scene.
        vertex_count: usize,
    },
    /// A batch writes to a draw slot outside the uncompacted buffer.
    #[error("draw slot {slot} outside the {len} uncompacted draw arguments")]
    DrawSlotOutOfRange {
        /// Draw slot written.
        slot: u32,
        /// Uncompacted buffer length.
        len: usize,
    },
    /// Filtered indices overflow the per-view index buffer.
    #[error("filtered index {offset} overflows the index buffer of {len} entries")]
    FilteredIndexOverflow {
        /// Write position.
        offset: u64,
        /// Filtered index buffer length.
        len: usize,
    },
    /// Compaction found more non-empty draws than fit an indirect buffer.
    #[error("indirect draw buffer of geometry set {geometry_set} is full")]
    IndirectBufferFull {
        /// Geometry set index.
        geometry_set: usize,
    },
}

impl From<FilterError> for RenderError {
    fn from(error: FilterError) -> Self {
        match error {
            FilterError::TooManyDraws { requested, max } => {
                RenderError::TooManyDraws { requested, max }
            }
            other => RenderError::Internal(other.to_string()),
        }
    }
}

/// Camera or light parameters that yield no usable transform.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UniformError {
    /// The camera position coincides with its target.
    #[error("camera at {position:?} looks at itself")]
    DegenerateCamera {
        /// Camera position.
        position: [f32; 3],
    },
    /// Projection parameters rejected by the perspective builder.
    #[error("invalid projection: aspect {aspect}, near {near}, far {far}")]
    InvalidProjection {
        /// Width over height.
        aspect: f32,
        /// Near plane.
        near: f32,
        /// Far plane.
        far: f32,
    },
    /// The sun direction is zero or not finite.
    #[error("sun direction is degenerate")]
    DegenerateSun,
    /// A view transform cannot be inverted.
    #[error("{0} view transform is singular")]
    SingularTransform(&'static str),
}

impl From<UniformError> for RenderError {
    fn from(error: UniformError) -> Self {
        RenderError::Internal(error.to_string())
    }
}

/// A failure inside a render pass.
#[derive(Debug, Error)]
pub enum PassError {
    /// A buffer was accessed in the wrong state or its lock was poisoned.
    #[error(transparent)]
    Resource(#[from] ResourceError),
    /// The indirect arguments point outside the filtered index buffer.
    #[error("indirect draw {draw} reads indices {start}..{end}, buffer holds {len}")]
    DrawOutOfRange {
        /// Draw index within its geometry set.
        draw: usize,
        /// First index read.
        start: u32,
        /// One past the last index read.
        end: u32,
        /// Filtered index buffer length.
        len: usize,
    },
    /// The render targets do not match the frame resolution.
    #[error("render target '{name}' is {actual:?}, expected {expected:?}")]
    TargetSize {
        /// Target name.
        name: &'static str,
        /// Expected `(width, height)`.
        expected: (u32, u32),
        /// Actual `(width, height)`.
        actual: (u32, u32),
    },
    /// A filtered index references a vertex outside the vertex streams.
    #[error("vertex {index} out of range ({vertex_count} vertices)")]
    VertexOutOfRange {
        /// Offending vertex index.
        index: u32,
        /// Vertices in the scene.
        vertex_count: usize,
    },
    /// A visibility-buffer texel names a draw or triangle that does not exist.
    #[error("visibility id {0:#010x} does not match any drawn triangle")]
    StaleVisibilityId(u32),
    /// The camera view-projection cannot be inverted.
    #[error("camera view-projection is singular")]
    SingularCamera,
    /// No swapchain image was provided to the present pass.
    #[error("no swapchain image acquired for frame {0}")]
    NoSwapchainImage(u64),
}

impl From<PassError> for LaneError {
    fn from(error: PassError) -> Self {
        LaneError::execution(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_draws_maps_to_render_error() {
        let err: RenderError = FilterError::TooManyDraws {
            requested: 1025,
            max: 1024,
        }
        .into();
        assert!(matches!(
            err,
            RenderError::TooManyDraws {
                requested: 1025,
                max: 1024
            }
        ));

        let err: RenderError = FilterError::IndirectBufferFull { geometry_set: 1 }.into();
        assert!(matches!(err, RenderError::Internal(msg) if msg.contains("geometry set 1")));
    }

    #[test]
    fn test_pass_error_wraps_resource_error() {
        let err: PassError = ResourceError::Poisoned("depth".into()).into();
        let lane: LaneError = err.into();
        assert!(lane.to_string().contains("depth"));
    }
}
