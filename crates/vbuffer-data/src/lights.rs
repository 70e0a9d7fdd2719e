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

//! Deterministic point-light placement.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use vbuffer_core::math::Vec3;
use vbuffer_core::renderer::LightData;

/// Horizontal extent of the light field in world units.
pub const LIGHT_FIELD_EXTENT: f32 = 1000.0;
/// Height of every light in world units.
pub const LIGHT_HEIGHT: f32 = 100.0;

/// Scatters `count` lights over `[-1000, 1000]` on x and z at a fixed height,
/// with random colours. The same seed always yields the same lights.
pub fn generate_point_lights(count: u32, seed: u64) -> Vec<LightData> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let x = rng.random_range(-LIGHT_FIELD_EXTENT..=LIGHT_FIELD_EXTENT);
            let z = rng.random_range(-LIGHT_FIELD_EXTENT..=LIGHT_FIELD_EXTENT);
            let color = Vec3::new(rng.random::<f32>(), rng.random::<f32>(), rng.random::<f32>());
            LightData {
                position: Vec3::new(x, LIGHT_HEIGHT, z),
                color,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lights_are_deterministic_and_in_range() {
        let a = generate_point_lights(128, 7);
        let b = generate_point_lights(128, 7);
        assert_eq!(a, b);
        assert_ne!(a, generate_point_lights(128, 8));
        for light in &a {
            assert!(light.position.x.abs() <= LIGHT_FIELD_EXTENT);
            assert!(light.position.z.abs() <= LIGHT_FIELD_EXTENT);
            assert_eq!(light.position.y, LIGHT_HEIGHT);
            assert!((0.0..1.0).contains(&light.color.x));
        }
    }
}
