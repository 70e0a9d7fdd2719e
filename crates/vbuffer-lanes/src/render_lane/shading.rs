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

//! Lighting shared by the visibility-buffer and deferred shading passes.
//!
//! The sun is shaded with Phong or GGX and attenuated by the
//! shadow map; point lights come from the light-cluster tile of the pixel.

use vbuffer_core::math::{saturate, Mat4, Vec3, PI};
use vbuffer_core::renderer::{
    LightData, LightingMode, PerFrameConstants, ShadowFilter, LIGHT_COUNT, LIGHT_SIZE,
    VIEW_SHADOW,
};

use super::Image;
use crate::light_lane::light_cluster_of_pixel;

/// Ambient light intensity, scaled by AO.
pub const AMBIENT_LIGHT: f32 = 0.12;
/// Radiance of pixels no triangle covers.
pub const BACKGROUND_COLOR: Vec3 = Vec3::new(0.05, 0.07, 0.1);

const PHONG_POWER: f32 = 128.0;
const SHADOW_BIAS: f32 = 0.004;
/// Normal-incidence reflectance of dielectrics.
const DIELECTRIC_F0: f32 = 0.04;

/// Attributes of the surface seen through a pixel, world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    /// Unit normal.
    pub normal: Vec3,
    pub albedo: Vec3,
    pub specular: f32,
    pub roughness: f32,
}

/// Everything a pixel needs to be lit.
pub struct ShadingInputs<'a> {
    pub constants: &'a PerFrameConstants,
    /// World to shadow clip space.
    pub shadow_view_projection: Mat4,
    pub shadow_map: &'a Image<f32>,
    pub lights: &'a [LightData],
    /// Per-tile light counts and light ids, `None` when point lights are off.
    pub light_clusters: Option<(&'a [u32], &'a [u32])>,
    pub width: u32,
    pub height: u32,
}

impl<'a> ShadingInputs<'a> {
    pub fn new(
        constants: &'a PerFrameConstants,
        shadow_map: &'a Image<f32>,
        lights: &'a [LightData],
        light_clusters: Option<(&'a [u32], &'a [u32])>,
        (width, height): (u32, u32),
    ) -> Self {
        let shadow = constants.transform[VIEW_SHADOW];
        Self {
            constants,
            shadow_view_projection: shadow.projection * shadow.view,
            shadow_map,
            lights,
            light_clusters,
            width,
            height,
        }
    }

    /// Outgoing radiance of pixel `(x, y)`.
    pub fn shade(&self, x: u32, y: u32, surface: &SurfaceSample, ambient_occlusion: f32) -> Vec3 {
        let c = self.constants;
        let view_dir = (c.camera_position.truncate() - surface.position).normalize();
        let to_sun = -c.light_dir.truncate();
        let sun = c.light_color.truncate() * c.light_color.w;

        let mut color = self.reflectance(surface, to_sun, view_dir) * sun * self.shadow_factor(surface.position);
        color += surface.albedo * (AMBIENT_LIGHT * ambient_occlusion);

        if let Some((counts, ids)) = self.light_clusters {
            let tile = light_cluster_of_pixel(x, y, self.width, self.height);
            let count = counts.get(tile).copied().unwrap_or(0).min(LIGHT_COUNT) as usize;
            let base = tile * LIGHT_COUNT as usize;
            for &id in ids.get(base..base + count).unwrap_or(&[]) {
                let Some(light) = self.lights.get(id as usize) else {
                    continue;
                };
                let to_light = light.position - surface.position;
                let attenuation = point_light_attenuation(to_light.length());
                if attenuation > 0.0 {
                    color += self.reflectance(surface, to_light.normalize(), view_dir)
                        * light.color
                        * attenuation;
                }
            }
        }
        color
    }

    fn reflectance(&self, surface: &SurfaceSample, to_light: Vec3, view_dir: Vec3) -> Vec3 {
        match self.constants.lighting_mode() {
            LightingMode::Phong => phong(surface, to_light, view_dir),
            LightingMode::Pbr => ggx(surface, to_light, view_dir),
        }
    }

    /// Fraction of sun light reaching `position`, `1` outside the shadow map.
    pub fn shadow_factor(&self, position: Vec3) -> f32 {
        let clip = self.shadow_view_projection * position.extend(1.0);
        if clip.w <= 0.0 {
            return 1.0;
        }
        let ndc = clip.truncate() / clip.w;
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || !(0.0..=1.0).contains(&ndc.z) {
            return 1.0;
        }
        let tx = (ndc.x * 0.5 + 0.5) * self.shadow_map.width() as f32;
        let ty = (0.5 - ndc.y * 0.5) * self.shadow_map.height() as f32;
        match self.constants.shadow_filter() {
            ShadowFilter::Esm => self.esm(tx, ty, ndc.z),
            ShadowFilter::Pcf => self.pcf(tx, ty, ndc.z),
        }
    }

    /// Exponential shadow test averaged over a 3x3 texel neighbourhood.
    fn esm(&self, tx: f32, ty: f32, receiver: f32) -> f32 {
        let (cx, cy) = (tx.floor() as i64, ty.floor() as i64);
        let c = self.constants.esm_control;
        let mut sum = 0.0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let occluder = self.shadow_map.get_clamped(cx + dx, cy + dy);
                sum += saturate((c * (occluder - receiver + SHADOW_BIAS)).exp());
            }
        }
        sum / 9.0
    }

    /// 16-tap percentage-closer filter on a 4x4 texel grid.
    fn pcf(&self, tx: f32, ty: f32, receiver: f32) -> f32 {
        const OFFSETS: [f32; 4] = [-1.5, -0.5, 0.5, 1.5];
        let mut lit = 0u32;
        for oy in OFFSETS {
            for ox in OFFSETS {
                let occluder = self
                    .shadow_map
                    .get_clamped((tx + ox).floor() as i64, (ty + oy).floor() as i64);
                if receiver - SHADOW_BIAS <= occluder {
                    lit += 1;
                }
            }
        }
        lit as f32 / 16.0
    }
}

/// Point-light falloff, reaching zero at [`LIGHT_SIZE`].
#[inline]
pub fn point_light_attenuation(distance: f32) -> f32 {
    let d = distance / LIGHT_SIZE;
    saturate(1.0 - d * d)
}

/// Lambert diffuse plus a Phong lobe of power 128.
pub fn phong(surface: &SurfaceSample, to_light: Vec3, view_dir: Vec3) -> Vec3 {
    let n_dot_l = surface.normal.dot(to_light);
    if n_dot_l <= 0.0 {
        return Vec3::ZERO;
    }
    let reflected = surface.normal * (2.0 * n_dot_l) - to_light;
    let highlight = reflected.dot(view_dir).max(0.0).powf(PHONG_POWER) * surface.specular;
    surface.albedo * n_dot_l + Vec3::splat(highlight)
}

/// Cook-Torrance with a GGX distribution, Schlick-GGX geometry and Schlick Fresnel.
pub fn ggx(surface: &SurfaceSample, to_light: Vec3, view_dir: Vec3) -> Vec3 {
    let n = surface.normal;
    let n_dot_l = n.dot(to_light);
    if n_dot_l <= 0.0 {
        return Vec3::ZERO;
    }
    let n_dot_v = n.dot(view_dir).max(1e-4);
    let half = (to_light + view_dir).normalize();
    let n_dot_h = n.dot(half).max(0.0);
    let v_dot_h = view_dir.dot(half).max(0.0);

    let alpha = (surface.roughness * surface.roughness).max(1e-3);
    let a2 = alpha * alpha;
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    let distribution = a2 / (PI * denom * denom);

    let k = (surface.roughness + 1.0).powi(2) / 8.0;
    let geometry = (n_dot_v / (n_dot_v * (1.0 - k) + k)) * (n_dot_l / (n_dot_l * (1.0 - k) + k));

    let fresnel = DIELECTRIC_F0 + (1.0 - DIELECTRIC_F0) * (1.0 - v_dot_h).powi(5);
    let specular = distribution * geometry * fresnel / (4.0 * n_dot_v * n_dot_l);
    let diffuse = surface.albedo * ((1.0 - fresnel) / PI);
    (diffuse + Vec3::splat(specular)) * n_dot_l
}

/// Barycentrics of the point where the ray `origin + t * dir` crosses the
/// plane of `triangle`, clamped onto the triangle.
///
/// Used to recover attributes from a visibility-buffer texel: the ray goes
/// through the pixel centre, so the result is perspective correct.
pub fn ray_barycentrics(origin: Vec3, dir: Vec3, triangle: [Vec3; 3]) -> Vec3 {
    let [a, b, c] = triangle;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-12 {
        return Vec3::splat(1.0 / 3.0);
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv;
    let v = dir.dot(s.cross(e1)) * inv;
    let weights = Vec3::new(1.0 - u - v, u, v).max(Vec3::ZERO);
    let sum = weights.x + weights.y + weights.z;
    if sum > 0.0 && sum.is_finite() {
        weights / sum
    } else {
        Vec3::splat(1.0 / 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vbuffer_core::math::Vec4;

    fn surface() -> SurfaceSample {
        SurfaceSample {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            albedo: Vec3::new(0.5, 0.5, 0.5),
            specular: 1.0,
            roughness: 0.5,
        }
    }

    #[test]
    fn test_lights_below_the_horizon_contribute_nothing() {
        let s = surface();
        assert_eq!(phong(&s, -Vec3::Y, Vec3::Y), Vec3::ZERO);
        assert_eq!(ggx(&s, -Vec3::Y, Vec3::Y), Vec3::ZERO);
    }

    #[test]
    fn test_phong_highlight_follows_the_mirror_direction() {
        let s = surface();
        let l = Vec3::new(1.0, 1.0, 0.0).normalize();
        let mirror = Vec3::new(-1.0, 1.0, 0.0).normalize();
        let aside = Vec3::new(-1.0, 1.0, 0.5).normalize();
        let on_peak = phong(&s, l, mirror);
        assert_relative_eq!(on_peak.x, 0.5 * l.y + 1.0, epsilon = 1e-4);
        assert!(phong(&s, l, aside).x < on_peak.x);
    }

    #[test]
    fn test_rough_ggx_has_a_lower_peak() {
        let mut s = surface();
        s.roughness = 0.2;
        let smooth = ggx(&s, Vec3::Y, Vec3::Y);
        s.roughness = 0.9;
        let rough = ggx(&s, Vec3::Y, Vec3::Y);
        assert!(smooth.x > rough.x);
        assert!(rough.x > 0.0);
    }

    #[test]
    fn test_attenuation_range() {
        assert_relative_eq!(point_light_attenuation(0.0), 1.0);
        assert_relative_eq!(point_light_attenuation(LIGHT_SIZE * 0.5), 0.75);
        assert_eq!(point_light_attenuation(LIGHT_SIZE * 2.0), 0.0);
    }

    #[test]
    fn test_ray_barycentrics() {
        let triangle = [Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0)];
        let w = ray_barycentrics(Vec3::new(1.0, 10.0, 2.0), -Vec3::Y, triangle);
        assert_relative_eq!(w.x, 0.25, epsilon = 1e-5);
        assert_relative_eq!(w.y, 0.25, epsilon = 1e-5);
        assert_relative_eq!(w.z, 0.5, epsilon = 1e-5);
        // Misses are clamped onto the triangle.
        let w = ray_barycentrics(Vec3::new(8.0, 10.0, 0.0), -Vec3::Y, triangle);
        assert_relative_eq!(w.y, 1.0, epsilon = 1e-5);
    }

    fn constants(shadow_filter: u32) -> PerFrameConstants {
        let mut constants = PerFrameConstants {
            esm_control: 80.0,
            shadow_filter,
            light_dir: Vec4::new(0.0, -1.0, 0.0, 0.0),
            ..Default::default()
        };
        // Sun looking straight down onto a 20 x 20 area, depth 0..1 over y 10..-10.
        constants.transform[VIEW_SHADOW].view =
            Mat4::look_to_rh(Vec3::new(0.0, 10.0, 0.0), -Vec3::Y, Vec3::Z).unwrap();
        constants.transform[VIEW_SHADOW].projection =
            Mat4::orthographic_rh_zo(-10.0, 10.0, -10.0, 10.0, 0.0, 20.0);
        constants
    }

    #[test]
    fn test_shadow_filters_agree_on_lit_and_occluded_points() {
        // An occluder at y = 0 everywhere: depth 0.5.
        let map = Image::new(16, 16, 0.5);
        for filter in [0, 1] {
            let c = constants(filter);
            let inputs = ShadingInputs::new(&c, &map, &[], None, (1, 1));
            assert_relative_eq!(inputs.shadow_factor(Vec3::new(0.0, 5.0, 0.0)), 1.0);
            assert!(inputs.shadow_factor(Vec3::new(0.0, -5.0, 0.0)) < 0.01);
            // Outside the map is lit.
            assert_relative_eq!(inputs.shadow_factor(Vec3::new(50.0, -5.0, 0.0)), 1.0);
        }
    }
}
