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

//! Rendering lanes - the graphics-queue passes of a frame.
//!
//! Each pass is a [`Lane`](vbuffer_core::lane::Lane) executed by the graphics
//! queue in the order given by [`pass_sequence`]. Passes read the scene and
//! the frame slot from the lane context (`Arc<GpuScene>`,
//! `Arc<FrameResources>`), write into the [`RenderTargets`] stored there, and
//! the present pass writes the acquired [`PresentTarget`].
//!
//! ```text
//! VisibilityBuffer: Shadow → VisibilityBuffer → AO → VisibilityBufferShade → Skybox → Godray → Present
//! Deferred:         Shadow → GBuffer          → AO → DeferredShade         → Skybox → Godray → Present
//! ```

use std::sync::Arc;

use vbuffer_core::lane::{LaneContext, LaneError, LaneRegistry};
use vbuffer_core::math::{Vec2, Vec3};
use vbuffer_core::renderer::{GeometrySet, PerFrameConstants, RenderMode, ResourceState};

use crate::error::PassError;
use crate::frame::FrameResources;
use crate::gpu_scene::GpuScene;

mod ao_lane;
mod draws;
mod gbuffer_pass_lane;
mod godray_lane;
mod present_lane;
pub mod raster;
mod shading;
mod shading_lane;
mod shadow_pass_lane;
mod skybox_lane;
mod targets;
mod visibility_pass_lane;

pub use ao_lane::*;
pub use draws::{for_each_drawn_triangle, DrawnTriangle};
pub use gbuffer_pass_lane::*;
pub use godray_lane::*;
pub use present_lane::*;
pub use shading::{ShadingInputs, SurfaceSample, AMBIENT_LIGHT, BACKGROUND_COLOR};
pub use shading_lane::*;
pub use shadow_pass_lane::*;
pub use skybox_lane::*;
pub use targets::*;
pub use visibility_pass_lane::*;

/// Number of the frame the graphics queue is drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub frame_count: u64,
}

/// Lane names of the graphics work of one frame, in execution order.
pub fn pass_sequence(mode: RenderMode) -> [&'static str; 7] {
    match mode {
        RenderMode::VisibilityBuffer => [
            ShadowPassLane::NAME,
            VisibilityBufferPassLane::NAME,
            AmbientOcclusionLane::NAME,
            VisibilityBufferShadeLane::NAME,
            SkyboxLane::NAME,
            GodrayLane::NAME,
            PresentLane::NAME,
        ],
        RenderMode::Deferred => [
            ShadowPassLane::NAME,
            GBufferPassLane::NAME,
            AmbientOcclusionLane::NAME,
            DeferredShadeLane::NAME,
            SkyboxLane::NAME,
            GodrayLane::NAME,
            PresentLane::NAME,
        ],
    }
}

/// Registers every graphics pass.
pub fn register_render_lanes(registry: &mut LaneRegistry) {
    registry.register(Box::new(ShadowPassLane::new()));
    registry.register(Box::new(VisibilityBufferPassLane::new()));
    registry.register(Box::new(GBufferPassLane::new()));
    registry.register(Box::new(AmbientOcclusionLane::new()));
    registry.register(Box::new(VisibilityBufferShadeLane::new()));
    registry.register(Box::new(DeferredShadeLane::new()));
    registry.register(Box::new(SkyboxLane::new()));
    registry.register(Box::new(GodrayLane::new()));
    registry.register(Box::new(PresentLane::new()));
}

/// Scene, frame slot and constants every pass starts from.
pub(crate) struct PassInputs {
    pub scene: Arc<GpuScene>,
    pub frame: Arc<FrameResources>,
    pub constants: PerFrameConstants,
}

impl PassInputs {
    pub fn from_context(ctx: &LaneContext) -> Result<Self, LaneError> {
        let scene = ctx.require::<Arc<GpuScene>>()?.clone();
        let frame = ctx.require::<Arc<FrameResources>>()?.clone();
        let constants = frame
            .read_constants(ResourceState::SHADER_RESOURCE)
            .map_err(PassError::from)?;
        Ok(Self {
            scene,
            frame,
            constants,
        })
    }
}

pub(crate) fn targets_mut(ctx: &mut LaneContext) -> Result<&mut RenderTargets, LaneError> {
    ctx.get_mut::<RenderTargets>()
        .ok_or(LaneError::missing("RenderTargets"))
}

/// Attributes of the three vertices of a triangle.
#[inline]
pub(crate) fn fetch<T: Copy>(stream: &[T], indices: [u32; 3]) -> Result<[T; 3], PassError> {
    let get = |i: u32| {
        stream.get(i as usize).copied().ok_or(PassError::VertexOutOfRange {
            index: i,
            vertex_count: stream.len(),
        })
    };
    Ok([get(indices[0])?, get(indices[1])?, get(indices[2])?])
}

/// `true` when an alpha-tested texel must be discarded.
#[inline]
pub(crate) fn alpha_discarded(
    scene: &GpuScene,
    geometry_set: GeometrySet,
    material_id: u32,
    uv: Vec2,
) -> bool {
    if geometry_set != GeometrySet::AlphaTested {
        return false;
    }
    scene
        .material(material_id)
        .is_some_and(|m| m.albedo_at(uv).w < ALPHA_CUTOFF)
}

/// Alpha below which alpha-tested texels are discarded.
pub const ALPHA_CUTOFF: f32 = 0.5;

/// World-space positions of a triangle.
#[inline]
pub(crate) fn world_positions(scene: &GpuScene, indices: [u32; 3]) -> Result<[Vec3; 3], PassError> {
    let model = crate::uniform_lane::scene_model_matrix();
    let p = fetch(&scene.positions, indices)?;
    Ok(p.map(|v| model.transform_point3(v)))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! A one-quad scene filtered and compacted into a frame slot, ready to draw.

    use super::*;
    use vbuffer_core::renderer::{
        AppSettings, BufferBarrier, IndirectDrawIndexArguments, LightData,
        UncompactedDrawArguments, VIEW_CAMERA, VIEW_SHADOW,
    };
    use vbuffer_data::scene::MeshData;
    use vbuffer_data::{Camera, Material, SceneBuilder};

    use crate::uniform_lane::update_uniform_data;

    /// A floor quad at y = 0 spanning `[-4, 4]` in x and z, with one point
    /// light hovering over its centre.
    pub fn floor_scene() -> Arc<GpuScene> {
        let mut builder = SceneBuilder::new();
        let material = builder.add_material(Material::solid("Floor", Vec3::new(0.8, 0.7, 0.6)));
        builder.add_mesh(
            "Floor",
            material,
            MeshData::patch(
                Vec3::new(-4.0, 0.0, 4.0),
                Vec3::new(8.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -8.0),
                1,
                1,
                1.0,
            ),
        );
        let scene = builder.build().unwrap();
        let lights = vec![LightData {
            position: Vec3::new(-20.0, 50.0, 0.0),
            color: Vec3::new(1.0, 0.5, 0.25),
        }];
        Arc::new(GpuScene::from_scene(&scene, lights).unwrap())
    }

    pub fn settings() -> AppSettings {
        AppSettings {
            width: 32,
            height: 16,
            shadow_map_size: 64,
            sample_count: 1,
            ..AppSettings::default()
        }
    }

    /// Camera above the floor looking down at its centre.
    pub fn camera() -> Camera {
        Camera::new(Vec3::new(-20.0, 150.0, 250.0), Vec3::new(-20.0, 0.0, 0.0))
    }

    /// A frame slot with both floor triangles drawn unfiltered in both views,
    /// its buffers already in the states the graphics queue expects.
    pub fn drawable_frame(scene: &GpuScene, settings: &AppSettings) -> Arc<FrameResources> {
        let uniforms = update_uniform_data(settings, &camera(), &scene.bounds).unwrap();
        let frame = FrameResources::new(0, scene.total_triangles(), 4);
        frame.constants.map().unwrap()[0] = uniforms.constants;
        for view in [VIEW_SHADOW, VIEW_CAMERA] {
            let resources = &frame.views[view];
            resources.filtered_indices.write().unwrap()[..6]
                .copy_from_slice(&scene.indices[..6]);
            resources.uncompacted.map().unwrap()[0] = UncompactedDrawArguments {
                num_indices: 6,
                start_index: 0,
                material_id: 0,
            };
            resources.indirect.write().unwrap()[GeometrySet::Opaque.index()].push(
                IndirectDrawIndexArguments {
                    index_count: 6,
                    instance_count: 1,
                    start_index: 0,
                    vertex_offset: 0,
                    start_instance: 0,
                },
            );
            resources
                .indirect
                .transition(BufferBarrier::new(
                    ResourceState::UNORDERED_ACCESS,
                    ResourceState::INDIRECT_ARGUMENT | ResourceState::SHADER_RESOURCE,
                ))
                .unwrap();
            resources
                .filtered_indices
                .transition(BufferBarrier::new(
                    ResourceState::UNORDERED_ACCESS,
                    ResourceState::INDEX_BUFFER | ResourceState::SHADER_RESOURCE,
                ))
                .unwrap();
        }
        frame
            .light_cluster_counts
            .transition(BufferBarrier::new(
                ResourceState::UNORDERED_ACCESS,
                ResourceState::SHADER_RESOURCE,
            ))
            .unwrap();
        frame
            .light_clusters
            .transition(BufferBarrier::new(
                ResourceState::UNORDERED_ACCESS,
                ResourceState::SHADER_RESOURCE,
            ))
            .unwrap();
        Arc::new(frame)
    }

    /// Lane context of the graphics queue for `frame`.
    pub fn context(scene: Arc<GpuScene>, frame: Arc<FrameResources>, settings: &AppSettings) -> LaneContext {
        let mut ctx = LaneContext::new();
        ctx.insert(scene);
        ctx.insert(frame);
        ctx.insert(RenderTargets::new(settings.width, settings.height, settings.shadow_map_size));
        ctx.insert(FrameInfo { frame_count: 1 });
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_share_shadow_ao_sky_and_present() {
        let vb = pass_sequence(RenderMode::VisibilityBuffer);
        let deferred = pass_sequence(RenderMode::Deferred);
        assert_eq!(vb[0], deferred[0]);
        assert_eq!(vb[2], deferred[2]);
        assert_eq!(vb[4..], deferred[4..]);
        assert_eq!(vb[6], "Present");
        assert_ne!(vb[1], deferred[1]);
    }

    #[test]
    fn test_registry_holds_every_pass_of_both_modes() {
        let mut registry = LaneRegistry::new();
        register_render_lanes(&mut registry);
        for mode in [RenderMode::VisibilityBuffer, RenderMode::Deferred] {
            for name in pass_sequence(mode) {
                assert!(registry.get(name).is_some(), "{name} not registered");
            }
        }
    }

    #[test]
    fn test_fetch_reports_bad_vertex() {
        let stream = [1.0f32, 2.0];
        assert_eq!(fetch(&stream, [1, 0, 1]).unwrap(), [2.0, 1.0, 2.0]);
        assert!(matches!(
            fetch(&stream, [0, 2, 1]),
            Err(PassError::VertexOutOfRange { index: 2, vertex_count: 2 })
        ));
    }
}
