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

//! Errors of scene loading and camera path loading.

use std::path::PathBuf;
use thiserror::Error;

/// An error raised while building, importing or validating a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The OBJ importer failed.
    #[error("Failed to load OBJ '{path}': {source}")]
    Obj {
        /// File being imported.
        path: PathBuf,
        /// Importer error.
        #[source]
        source: tobj::LoadError,
    },
    /// A texture could not be decoded.
    #[error("Failed to load texture '{path}': {source}")]
    Texture {
        /// Texture file.
        path: PathBuf,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },
    /// The scene holds no triangle.
    #[error("The scene contains no triangles")]
    Empty,
    /// An index points past the vertex streams.
    #[error("Mesh '{mesh}' references vertex {index} but the scene has {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending mesh.
        mesh: String,
        /// Offending index.
        index: u32,
        /// Vertices in the scene.
        vertex_count: usize,
    },
    /// A mesh range is not a whole number of triangles inside the index buffer.
    #[error("Mesh '{0}' has an invalid index range")]
    InvalidMeshRange(String),
    /// A mesh refers to a material that does not exist.
    #[error("Mesh '{mesh}' uses unknown material {material_id}")]
    UnknownMaterial {
        /// Offending mesh.
        mesh: String,
        /// Material id.
        material_id: u32,
    },
    /// Vertex streams disagree in length.
    #[error("Vertex streams have mismatched lengths ({positions} positions, {normals} normals, {texcoords} texcoords)")]
    MismatchedStreams {
        /// Positions.
        positions: usize,
        /// Normals.
        normals: usize,
        /// Texture coordinates.
        texcoords: usize,
    },
}

/// An error raised while loading a camera path.
#[derive(Debug, Error)]
pub enum CameraPathError {
    /// The file could not be read.
    #[error("Failed to read camera path '{path}': {source}")]
    Io {
        /// Path file.
        path: PathBuf,
        /// I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid RON camera path.
    #[error("Failed to parse camera path: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Interpolation needs at least two points.
    #[error("A camera path needs at least two points, found {0}")]
    TooFewPoints(usize),
    /// The time step must be positive.
    #[error("Invalid camera path step {0}")]
    InvalidStep(f32),
}
