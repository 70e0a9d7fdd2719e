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

//! CPU textures sampled by the shading passes.

use std::path::Path;

use vbuffer_core::math::{Vec2, Vec4};

use crate::error::SceneError;

/// An RGBA texture of linear `f32` texels, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl Texture {
    /// Builds a texture by evaluating `texel(x, y)` for every texel.
    pub fn from_fn(width: u32, height: u32, mut texel: impl FnMut(u32, u32) -> Vec4) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut texels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                texels.push(texel(x, y));
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    /// A two-colour checkerboard of `cells` by `cells` squares.
    pub fn checker(size: u32, cells: u32, a: Vec4, b: Vec4) -> Self {
        let cell = (size / cells.max(1)).max(1);
        Self::from_fn(size, size, |x, y| if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b })
    }

    /// A leaf card: opaque inside a pointed ellipse, transparent outside.
    pub fn leaf(size: u32, color: Vec4) -> Self {
        let inv = 1.0 / size.max(1) as f32;
        Self::from_fn(size, size, |x, y| {
            let u = (x as f32 + 0.5) * inv * 2.0 - 1.0;
            let v = (y as f32 + 0.5) * inv * 2.0 - 1.0;
            // Narrower towards the tips.
            let half_width = 0.55 * (1.0 - v * v);
            let alpha = if u.abs() <= half_width { 1.0 } else { 0.0 };
            let vein = if u.abs() < 0.04 { 0.8 } else { 1.0 };
            Vec4::new(color.x * vein, color.y * vein, color.z * vein, alpha)
        })
    }

    /// Decodes an image file into linear texels.
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let image = image::open(path)
            .map_err(|source| SceneError::Texture {
                path: path.to_path_buf(),
                source,
            })?
            .into_rgba32f();
        let (width, height) = image.dimensions();
        let texels = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                Vec4::new(srgb_to_linear(r), srgb_to_linear(g), srgb_to_linear(b), a)
            })
            .collect();
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest-texel lookup with repeat addressing; `v = 0` is the top row.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
