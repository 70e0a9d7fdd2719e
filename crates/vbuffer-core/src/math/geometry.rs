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

//! Bounding volumes and 2D overlap tests used by culling and light binning.

use super::{Mat4, Vec2, Vec3};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Smallest corner.
    pub min: Vec3,
    /// Largest corner.
    pub max: Vec3,
}

impl Aabb {
    /// An empty box: merging anything into it yields that thing.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a box from two corners in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Tight box around a set of points, `None` for an empty set.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut aabb = Self::from_min_max(*first, *first);
        for p in rest {
            aabb.grow(*p);
        }
        Some(aabb)
    }

    /// Extends the box to contain `point`.
    #[inline]
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Union of two boxes.
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// `true` once at least one point has been added.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Centre point.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Full size along each axis.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// The eight corners.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing this one after an affine transform.
    pub fn transform(&self, matrix: &Mat4) -> Self {
        let mut out = Self::INVALID;
        for corner in self.corners() {
            out.grow(matrix.transform_point3(corner));
        }
        out
    }
}

/// Returns `true` when the circle `(center, radius)` overlaps the rectangle
/// spanning `rect_min..rect_max`.
///
/// The test clamps the centre onto the rectangle and compares the squared
/// distance against the squared radius, so touching counts as overlap.
#[inline]
pub fn circle_intersects_rect(center: Vec2, radius: f32, rect_min: Vec2, rect_max: Vec2) -> bool {
    let closest = center.max(rect_min).min(rect_max);
    (center - closest).length_squared() <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_and_grow() {
        let aabb = Aabb::from_points(&[
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 5.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 5.0));
        assert_eq!(aabb.center(), Vec3::new(0.0, 1.0, 2.5));
        assert!(Aabb::from_points(&[]).is_none());
        assert!(!Aabb::INVALID.is_valid());
    }

    #[test]
    fn test_transform_scales_box() {
        let aabb = Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0));
        let moved = aabb.transform(&(Mat4::from_translation(Vec3::X * 10.0)
            * Mat4::from_scale(Vec3::splat(2.0))));
        assert_eq!(moved.min, Vec3::new(8.0, -2.0, -2.0));
        assert_eq!(moved.max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[test]
    fn test_circle_rect_overlap() {
        let (min, max) = (Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        // Centre inside.
        assert!(circle_intersects_rect(Vec2::new(0.5, 0.5), 0.01, min, max));
        // Near an edge.
        assert!(circle_intersects_rect(Vec2::new(1.2, 0.5), 0.25, min, max));
        assert!(!circle_intersects_rect(Vec2::new(1.3, 0.5), 0.25, min, max));
        // Near a corner: the axis-aligned distance is within the radius but the
        // diagonal one is not.
        assert!(!circle_intersects_rect(Vec2::new(1.2, 1.2), 0.25, min, max));
    }
}
