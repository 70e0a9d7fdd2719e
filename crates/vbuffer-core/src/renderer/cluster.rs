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

//! Clusters: fixed-size triangle groups, the unit of coarse culling.

use crate::math::Vec3;

/// Culling data of one cluster of a mesh.
///
/// Built once at load time. Only [`Cluster::distance_from_camera`] changes
/// afterwards, refreshed every frame for front-to-back sorting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cluster {
    /// Smallest corner of the cluster bounds (object space).
    pub aabb_min: Vec3,
    /// Largest corner of the cluster bounds (object space).
    pub aabb_max: Vec3,
    /// Apex of the visibility cone.
    pub cone_center: Vec3,
    /// Unit axis of the visibility cone, pointing away from the visible side.
    pub cone_axis: Vec3,
    /// Cosine of the cone half-angle.
    pub cone_angle_cosine: f32,
    /// Distance from the camera eye, refreshed per frame.
    pub distance_from_camera: f32,
    /// Invalid clusters (two-sided, degenerate, or too wide a cone) are never culled.
    pub valid: bool,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ZERO,
            cone_center: Vec3::ZERO,
            cone_axis: Vec3::ZERO,
            cone_angle_cosine: 0.0,
            distance_from_camera: 0.0,
            valid: false,
        }
    }
}

impl Cluster {
    /// Centre of the cluster bounds.
    #[inline]
    pub fn aabb_center(&self) -> Vec3 {
        (self.aabb_min + self.aabb_max) * 0.5
    }
}

/// Location of a cluster's triangles inside its mesh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ClusterCompact {
    /// Triangles in the cluster, at most `CLUSTER_SIZE`.
    pub triangle_count: u32,
    /// First triangle of the cluster, relative to the mesh.
    pub cluster_start: u32,
}

/// All clusters of one mesh, in triangle order.
///
/// `clusters[i]` and `compacts[i]` describe the same cluster; sorting keeps
/// them paired.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterContainer {
    /// Culling data.
    pub clusters: Vec<Cluster>,
    /// Triangle ranges.
    pub compacts: Vec<ClusterCompact>,
}

impl ClusterContainer {
    /// Number of clusters.
    #[inline]
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Number of triangles covered by all clusters.
    pub fn triangle_count(&self) -> u32 {
        self.compacts.iter().map(|c| c.triangle_count).sum()
    }

    /// Iterates clusters with their triangle ranges.
    pub fn iter(&self) -> impl Iterator<Item = (&Cluster, &ClusterCompact)> {
        self.clusters.iter().zip(self.compacts.iter())
    }
}
