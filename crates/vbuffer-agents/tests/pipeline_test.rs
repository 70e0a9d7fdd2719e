use std::sync::Arc;

use vbuffer_agents::render_agent::{markers, RenderAgent};
use vbuffer_core::math::Vec3;
use vbuffer_core::renderer::{AppSettings, LightData, RenderError, VIEW_CAMERA};
use vbuffer_core::telemetry::{MetricId, TimingSink};
use vbuffer_data::scene::MeshData;
use vbuffer_data::{Camera, Material, Scene, SceneBuilder};
use vbuffer_telemetry::{MetricsRegistry, PassTimingRecorder};

/// An 8x8 floor split into 4x4 quads, lit by one point light.
fn floor_scene() -> (Scene, Vec<LightData>) {
    let mut builder = SceneBuilder::new();
    let material = builder.add_material(Material::solid("Floor", Vec3::new(0.8, 0.7, 0.6)));
    builder.add_mesh(
        "Floor",
        material,
        MeshData::patch(
            Vec3::new(-4.0, 0.0, 4.0),
            Vec3::new(8.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -8.0),
            4,
            4,
            1.0,
        ),
    );
    let lights = vec![LightData {
        position: Vec3::new(0.0, 50.0, 0.0),
        color: Vec3::new(1.0, 0.5, 0.25),
    }];
    (builder.build().unwrap(), lights)
}

fn sync_settings() -> AppSettings {
    AppSettings {
        width: 32,
        height: 16,
        shadow_map_size: 64,
        async_compute: false,
        ..AppSettings::default()
    }
}

fn loaded_agent(settings: AppSettings) -> RenderAgent {
    let (scene, lights) = floor_scene();
    let mut agent = RenderAgent::new(settings).unwrap();
    agent.load(&scene, lights).unwrap();
    agent.set_camera(Camera::new(
        Vec3::new(-20.0, 150.0, 250.0),
        Vec3::new(-20.0, 0.0, 0.0),
    ));
    agent
}

#[test]
fn test_sync_frame_is_filtered_and_presented_by_itself() {
    let mut agent = loaded_agent(AppSettings {
        cluster_culling: false,
        ..sync_settings()
    });
    assert!(agent.is_loaded());
    assert!(agent.cluster_count() > 0);

    let report = agent.draw().unwrap();
    assert_eq!(report.frame, 0);
    assert!(!report.async_compute);
    assert!(report.filtered);
    assert_eq!(report.presented.map(|(frame, _)| frame), Some(0));
    assert_eq!(report.triangles_submitted, 32);
    assert_eq!(agent.frame_count(), 1);

    agent.wait_idle().unwrap();
    let readback = agent.readback().unwrap().unwrap();
    assert_eq!(readback.frame, 0);
    assert_eq!((readback.width, readback.height), (32, 16));
    assert_eq!(readback.pixels.len(), 32 * 16);
}

#[test]
fn test_slots_rotate_and_every_submission_succeeds() {
    let mut agent = loaded_agent(sync_settings());
    let slots: Vec<usize> = (0..4).map(|_| agent.draw().unwrap().slot).collect();
    assert_eq!(slots, vec![0, 1, 0, 1]);

    agent.wait_idle().unwrap();
    let executions: Vec<_> = agent.execution_reports().collect();
    assert_eq!(executions.len(), 4);
    assert!(executions.iter().all(|r| r.succeeded()));
    // Without async compute, filtering runs on the graphics queue.
    assert!(executions.iter().all(|r| r.label == "graphics"));
    let camera_draws: u32 = executions.iter().map(|r| r.stats.draws(VIEW_CAMERA)).sum();
    assert!(camera_draws > 0);

    let resources = agent.frame_resources(1).unwrap();
    assert_eq!(resources.slot, 1);
    assert!(agent.frame_resources(2).is_none());
}

#[test]
fn test_held_results_filter_each_slot_once() {
    let mut agent = loaded_agent(AppSettings {
        hold_filtered_results: true,
        ..sync_settings()
    });
    let filtered: Vec<bool> = (0..4).map(|_| agent.draw().unwrap().filtered).collect();
    assert_eq!(filtered, vec![true, true, false, false]);
    agent.wait_idle().unwrap();
    assert!(agent.execution_reports().all(|r| r.succeeded()));
}

#[test]
fn test_too_many_draws_aborts_the_frame() {
    let mut builder = SceneBuilder::new();
    let material = builder.add_material(Material::solid("Tile", Vec3::ONE));
    for i in 0..1100 {
        let x = (i % 40) as f32 * 2.0;
        let z = (i / 40) as f32 * 2.0;
        builder.add_mesh(
            format!("Tile {i}"),
            material,
            MeshData::patch(
                Vec3::new(x, 0.0, z + 1.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, -1.0),
                1,
                1,
                1.0,
            ),
        );
    }
    let scene = builder.build().unwrap();

    let mut agent = RenderAgent::new(AppSettings {
        cluster_culling: false,
        ..sync_settings()
    })
    .unwrap();
    agent.load(&scene, Vec::new()).unwrap();

    match agent.draw() {
        Err(RenderError::TooManyDraws { requested, max }) => assert!(requested > max),
        other => panic!("expected TooManyDraws, got {other:?}"),
    }
    assert_eq!(agent.frame_count(), 0);
    assert!(agent.wait_idle().is_ok());
}

#[test]
fn test_resolution_change_rebuilds_and_keeps_the_scene() {
    let mut agent = loaded_agent(sync_settings());
    agent.draw().unwrap();
    let clusters = agent.cluster_count();

    agent
        .update_settings(AppSettings {
            width: 16,
            height: 8,
            ..sync_settings()
        })
        .unwrap();
    assert_eq!(agent.cluster_count(), clusters);
    assert!(agent.readback().unwrap().is_none());

    agent.draw().unwrap();
    agent.wait_idle().unwrap();
    let readback = agent.readback().unwrap().unwrap();
    assert_eq!((readback.width, readback.height), (16, 8));

    let invalid = AppSettings {
        data_buffer_count: 0,
        ..sync_settings()
    };
    assert!(matches!(
        agent.update_settings(invalid),
        Err(RenderError::InvalidSettings(_))
    ));
    assert_eq!(agent.settings().width, 16);
}

#[test]
fn test_telemetry_records_frames_and_pass_timings() {
    let registry = MetricsRegistry::new();
    let recorder = Arc::new(PassTimingRecorder::new(registry.clone()));
    let mut agent = loaded_agent(sync_settings());
    agent
        .set_telemetry(&registry, recorder.clone() as Arc<dyn TimingSink>)
        .unwrap();

    for _ in 0..3 {
        agent.draw().unwrap();
    }
    agent.wait_idle().unwrap();

    let frames = registry
        .get_metric(&MetricId::new("frame", "count"))
        .unwrap();
    assert_eq!(frames.value.as_counter(), Some(3));
    let record_time = registry
        .get_metric(&MetricId::new("frame", "record_time_ms"))
        .unwrap()
        .value
        .histogram_summary()
        .unwrap();
    assert_eq!(record_time.count, 3);

    let (frame, timings) = recorder.latest_frame();
    assert_eq!(frame, 2);
    let names: Vec<&str> = timings.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&markers::TRIANGLE_FILTERING));
    assert!(names.contains(&markers::BATCH_COMPACTION));
}

#[test]
fn test_unload_releases_the_scene() {
    let mut agent = loaded_agent(sync_settings());
    agent.draw().unwrap();
    agent.unload();
    assert!(!agent.is_loaded());
    assert!(agent.scene().is_none());
    assert!(matches!(agent.draw(), Err(RenderError::NotInitialized)));
}
