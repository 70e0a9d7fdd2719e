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

//! Triangle rasterizer shared by the depth, visibility and G-buffer passes.
//!
//! Triangles arrive in clip space and are clipped against the near plane
//! (`z >= 0`) before projection. Each covered pixel centre produces a
//! [`Fragment`] whose barycentrics refer to the three *input* vertices and
//! are perspective correct, so callers interpolate attributes without
//! knowing whether the triangle was clipped.

use vbuffer_core::math::{Vec2, Vec3, Vec4};

/// Pixel grid a triangle is rasterized onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel coordinates of an NDC position, row 0 at the top.
    #[inline]
    pub fn ndc_to_screen(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            (ndc.x * 0.5 + 0.5) * self.width as f32,
            (0.5 - ndc.y * 0.5) * self.height as f32,
        )
    }

    /// NDC position of the centre of pixel `(x, y)`.
    #[inline]
    pub fn pixel_center_ndc(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width.max(1) as f32 * 2.0 - 1.0,
            1.0 - (y as f32 + 0.5) / self.height.max(1) as f32 * 2.0,
        )
    }
}

/// Which faces the rasterizer discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    /// Counter-clockwise triangles are front facing.
    Back,
}

/// A covered pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Depth in `[0, 1]`.
    pub depth: f32,
    /// Perspective-correct weights of the three input vertices.
    pub barycentric: Vec3,
}

impl Fragment {
    /// Interpolates a per-vertex attribute.
    #[inline]
    pub fn interpolate<T>(&self, values: [T; 3]) -> T
    where
        T: Copy + std::ops::Mul<f32, Output = T> + std::ops::Add<Output = T>,
    {
        values[0] * self.barycentric.x
            + values[1] * self.barycentric.y
            + values[2] * self.barycentric.z
    }
}

#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    position: Vec4,
    weights: Vec3,
}

impl ClipVertex {
    fn lerp(a: Self, b: Self, t: f32) -> Self {
        Self {
            position: Vec4::lerp(a.position, b.position, t),
            weights: Vec3::lerp(a.weights, b.weights, t),
        }
    }
}

/// `det([x y w])` of the clip-space vertices; positive for counter-clockwise
/// triangles in front of the eye.
#[inline]
pub fn facing_determinant(clip: &[Vec4; 3]) -> f32 {
    let [a, b, c] = clip;
    a.x * (b.y * c.w - c.y * b.w) - b.x * (a.y * c.w - c.y * a.w) + c.x * (a.y * b.w - b.y * a.w)
}

/// Sutherland-Hodgman against `z >= 0`. A triangle becomes at most a quad.
fn clip_near(input: &[ClipVertex; 3]) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let a = input[i];
        let b = input[(i + 1) % 3];
        let (da, db) = (a.position.z, b.position.z);
        if da >= 0.0 {
            out.push(a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            out.push(ClipVertex::lerp(a, b, da / (da - db)));
        }
    }
    out
}

/// Rasterizes one clip-space triangle, calling `emit` for each covered pixel
/// centre whose depth lies in `[0, 1]`.
pub fn rasterize_triangle(
    clip: [Vec4; 3],
    viewport: Viewport,
    cull: CullMode,
    mut emit: impl FnMut(Fragment),
) {
    if viewport.width == 0 || viewport.height == 0 {
        return;
    }
    if !clip.iter().all(Vec4::is_finite) {
        return;
    }
    if cull == CullMode::Back && facing_determinant(&clip) <= 0.0 {
        return;
    }

    let input = [
        ClipVertex { position: clip[0], weights: Vec3::X },
        ClipVertex { position: clip[1], weights: Vec3::Y },
        ClipVertex { position: clip[2], weights: Vec3::Z },
    ];
    let polygon = clip_near(&input);
    if polygon.len() < 3 {
        return;
    }
    for i in 1..polygon.len() - 1 {
        rasterize_clipped(
            [polygon[0], polygon[i], polygon[i + 1]],
            viewport,
            &mut emit,
        );
    }
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn rasterize_clipped(vertices: [ClipVertex; 3], viewport: Viewport, emit: &mut impl FnMut(Fragment)) {
    let mut screen = [Vec2::ZERO; 3];
    let mut depth = [0.0f32; 3];
    let mut inv_w = [0.0f32; 3];
    for (i, v) in vertices.iter().enumerate() {
        let w = v.position.w;
        if w <= 0.0 {
            return;
        }
        inv_w[i] = 1.0 / w;
        screen[i] = viewport.ndc_to_screen(Vec2::new(v.position.x, v.position.y) * inv_w[i]);
        depth[i] = v.position.z * inv_w[i];
    }

    let area = edge(screen[0], screen[1], screen[2]);
    if area.abs() < 1e-12 || !area.is_finite() {
        return;
    }
    let inv_area = 1.0 / area;

    let lo = screen[0].min(screen[1]).min(screen[2]);
    let hi = screen[0].max(screen[1]).max(screen[2]);
    let min_x = lo.x.floor().max(0.0) as i64;
    let min_y = lo.y.floor().max(0.0) as i64;
    let max_x = (hi.x.ceil() as i64).min(viewport.width as i64 - 1);
    let max_y = (hi.y.ceil() as i64).min(viewport.height as i64 - 1);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let l0 = edge(screen[1], screen[2], p) * inv_area;
            let l1 = edge(screen[2], screen[0], p) * inv_area;
            let l2 = 1.0 - l0 - l1;
            if l0 < 0.0 || l1 < 0.0 || l2 < 0.0 {
                continue;
            }
            let z = l0 * depth[0] + l1 * depth[1] + l2 * depth[2];
            if !(0.0..=1.0).contains(&z) {
                continue;
            }
            let q = [l0 * inv_w[0], l1 * inv_w[1], l2 * inv_w[2]];
            let sum = q[0] + q[1] + q[2];
            if sum <= 0.0 {
                continue;
            }
            let barycentric = (vertices[0].weights * q[0]
                + vertices[1].weights * q[1]
                + vertices[2].weights * q[2])
                * (1.0 / sum);
            emit(Fragment {
                x: x as u32,
                y: y as u32,
                depth: z,
                barycentric,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn collect(clip: [Vec4; 3], cull: CullMode) -> Vec<Fragment> {
        let mut out = Vec::new();
        rasterize_triangle(clip, Viewport::new(8, 8), cull, |f| out.push(f));
        out
    }

    // Covers the whole [-1, 1] square.
    fn big_ccw(z: f32) -> [Vec4; 3] {
        [
            Vec4::new(-1.0, -1.0, z, 1.0),
            Vec4::new(3.0, -1.0, z, 1.0),
            Vec4::new(-1.0, 3.0, z, 1.0),
        ]
    }

    #[test]
    fn test_covering_triangle_fills_viewport() {
        let fragments = collect(big_ccw(0.25), CullMode::Back);
        assert_eq!(fragments.len(), 64);
        for f in &fragments {
            assert_relative_eq!(f.depth, 0.25);
            assert_relative_eq!(f.barycentric.x + f.barycentric.y + f.barycentric.z, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_back_faces_are_culled_only_when_asked() {
        let mut cw = big_ccw(0.5);
        cw.swap(1, 2);
        assert!(collect(cw, CullMode::Back).is_empty());
        assert_eq!(collect(cw, CullMode::None).len(), 64);
    }

    #[test]
    fn test_fragments_outside_depth_range_are_dropped() {
        assert!(collect(big_ccw(1.5), CullMode::None).is_empty());
    }

    #[test]
    fn test_perspective_correct_weights() {
        // Same screen-space triangle, vertex 0 twice as far away.
        let mut clip = big_ccw(0.5);
        clip[0] = clip[0] * 2.0;
        let fragments = collect(clip, CullMode::None);
        assert_eq!(fragments.len(), 64);
        // Pixel (0, 7) is closest to vertex 0 on screen; perspective pulls
        // weight away from the far vertex.
        let near_v0 = fragments.iter().find(|f| f.x == 0 && f.y == 7).unwrap();
        let affine_weight = 1.0 - (0.5 / 8.0) * 2.0 / 4.0 * 2.0;
        assert!(near_v0.barycentric.x < affine_weight);
        assert!(near_v0.barycentric.x > 0.5);
    }

    #[test]
    fn test_near_clipped_triangle_keeps_input_weights() {
        // Vertex 2 lies behind the near plane.
        let clip = [
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
            Vec4::new(1.0, -1.0, 0.5, 1.0),
            Vec4::new(0.0, 1.0, -0.5, 1.0),
        ];
        let fragments = collect(clip, CullMode::None);
        assert!(!fragments.is_empty());
        // Only the lower half survives clipping.
        assert!(fragments.iter().all(|f| f.y >= 4));
        for f in &fragments {
            assert!(f.barycentric.z >= -1e-5 && f.barycentric.z <= 0.5 + 1e-5);
            assert!(f.depth >= 0.0);
        }
    }

    #[test]
    fn test_interpolate_attribute() {
        let fragment = Fragment {
            x: 0,
            y: 0,
            depth: 0.0,
            barycentric: Vec3::new(0.5, 0.25, 0.25),
        };
        let value = fragment.interpolate([Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), Vec2::new(0.0, 8.0)]);
        assert_eq!(value, Vec2::new(1.0, 2.0));
    }
}
