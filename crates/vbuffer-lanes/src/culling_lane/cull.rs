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

//! Cone culling and front-to-back sorting of clusters.

use std::cmp::Ordering;

use vbuffer_core::math::{Vec3, Vec4};
use vbuffer_core::renderer::{Cluster, ClusterContainer, NUM_CULLING_VIEWPORTS};

/// Returns `true` when no view can see a front face of `cluster`.
///
/// A view sees the cluster unless its eye lies inside the back-facing cone,
/// i.e. `dot(normalize(eye - cone_center), cone_axis) >= cone_angle_cosine`.
/// Eyes are in object space. Invalid clusters are never culled.
pub fn cull_cluster(cluster: &Cluster, eyes: &[Vec4; NUM_CULLING_VIEWPORTS]) -> bool {
    if !cluster.valid {
        return false;
    }
    !eyes.iter().any(|eye| {
        let test_vec = (eye.truncate() - cluster.cone_center).normalize();
        test_vec.dot(cluster.cone_axis) < cluster.cone_angle_cosine
    })
}

/// Refreshes `distance_from_camera` of every cluster against an object-space eye.
pub fn update_cluster_distances(containers: &mut [ClusterContainer], eye: Vec3) {
    for cluster in containers.iter_mut().flat_map(|c| c.clusters.iter_mut()) {
        cluster.distance_from_camera = cluster.aabb_center().distance(eye);
    }
}

/// Orders the clusters of a mesh front to back, keeping each compact paired
/// with its cluster.
pub fn sort_clusters(container: &mut ClusterContainer) {
    let mut pairs: Vec<_> = container
        .clusters
        .drain(..)
        .zip(container.compacts.drain(..))
        .collect();
    pairs.sort_by(|a, b| {
        a.0.distance_from_camera
            .partial_cmp(&b.0.distance_from_camera)
            .unwrap_or(Ordering::Equal)
    });
    for (cluster, compact) in pairs {
        container.clusters.push(cluster);
        container.compacts.push(compact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vbuffer_core::renderer::ClusterCompact;

    /// An up-facing cluster whose cone opens 60 degrees downwards from the origin.
    fn floor_cluster() -> Cluster {
        Cluster {
            aabb_min: Vec3::new(-1.0, 0.0, -1.0),
            aabb_max: Vec3::new(1.0, 0.0, 1.0),
            cone_center: Vec3::ZERO,
            cone_axis: -Vec3::Y,
            cone_angle_cosine: 0.5,
            distance_from_camera: 0.0,
            valid: true,
        }
    }

    #[test]
    fn test_culled_only_when_every_view_is_inside_the_cone() {
        let cluster = floor_cluster();
        let below = Vec3::new(0.0, -10.0, 0.0).extend(1.0);
        let above = Vec3::new(0.0, 10.0, 0.0).extend(1.0);
        assert!(cull_cluster(&cluster, &[below, below]));
        assert!(!cull_cluster(&cluster, &[below, above]));
        assert!(!cull_cluster(&cluster, &[above, above]));

        // Below the plane but outside the cone: still visible.
        let grazing = Vec3::new(10.0, -1.0, 0.0).extend(1.0);
        assert!(!cull_cluster(&cluster, &[grazing, grazing]));
    }

    #[test]
    fn test_invalid_cluster_is_never_culled() {
        let cluster = Cluster {
            valid: false,
            ..floor_cluster()
        };
        let below = Vec3::new(0.0, -10.0, 0.0).extend(1.0);
        assert!(!cull_cluster(&cluster, &[below, below]));
    }

    #[test]
    fn test_sort_keeps_compacts_paired() {
        let mut container = ClusterContainer::default();
        for (i, x) in [30.0f32, 10.0, 20.0].into_iter().enumerate() {
            container.clusters.push(Cluster {
                aabb_min: Vec3::new(x, 0.0, 0.0),
                aabb_max: Vec3::new(x, 0.0, 0.0),
                ..floor_cluster()
            });
            container.compacts.push(ClusterCompact {
                triangle_count: 1,
                cluster_start: i as u32,
            });
        }
        update_cluster_distances(std::slice::from_mut(&mut container), Vec3::ZERO);
        sort_clusters(&mut container);

        let starts: Vec<u32> = container.compacts.iter().map(|c| c.cluster_start).collect();
        assert_eq!(starts, vec![1, 2, 0]);
        let distances: Vec<f32> = container
            .clusters
            .iter()
            .map(|c| c.distance_from_camera)
            .collect();
        assert_eq!(distances, vec![10.0, 20.0, 30.0]);
    }
}
