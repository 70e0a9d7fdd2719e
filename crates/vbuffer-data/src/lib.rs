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

//! # VBuffer Data
//!
//! Everything the pipeline renders: the [`scene::Scene`] geometry model with
//! its meshes and materials, a procedural scene builder, Wavefront OBJ
//! import, the camera and its walking path, and the point-light generator.

#![warn(missing_docs)]

pub mod camera;
pub mod error;
pub mod lights;
pub mod scene;

pub use camera::{Camera, CameraPath, CameraPathPoint, CameraWalker};
pub use error::{CameraPathError, SceneError};
pub use lights::generate_point_lights;
pub use scene::{Material, Mesh, Scene, SceneBuilder, Texture};
