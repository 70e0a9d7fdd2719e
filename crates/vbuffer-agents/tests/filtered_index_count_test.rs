use vbuffer_agents::render_agent::{ExecutionReport, RenderAgent};
use vbuffer_core::math::Vec3;
use vbuffer_core::renderer::{AppSettings, NUM_CULLING_VIEWPORTS};
use vbuffer_core::telemetry::QueueKind;
use vbuffer_data::scene::procedural::courtyard;
use vbuffer_data::scene::MeshData;
use vbuffer_data::{Camera, Material, Scene, SceneBuilder};

const FRAMES: usize = 6;

fn settings(async_compute: bool, sort_clusters: bool) -> AppSettings {
    AppSettings {
        width: 32,
        height: 16,
        shadow_map_size: 64,
        async_compute,
        sort_clusters,
        ..AppSettings::default()
    }
}

fn run(scene: &Scene, settings: AppSettings) -> RenderAgent {
    let mut agent = RenderAgent::new(settings).unwrap();
    agent.load(scene, Vec::new()).unwrap();
    agent.set_camera(Camera::new(
        Vec3::new(0.0, 400.0, 900.0),
        Vec3::new(-20.0, 0.0, 0.0),
    ));
    for _ in 0..FRAMES {
        agent.draw().unwrap();
    }
    agent.wait_idle().unwrap();
    agent
}

/// Reports of the submissions that ran the filter and compaction.
fn filtering_reports(agent: &RenderAgent) -> Vec<&ExecutionReport> {
    let reports: Vec<_> = agent
        .execution_reports()
        .filter(|r| r.stats.filter.triangles_tested > 0)
        .collect();
    assert!(reports.iter().all(|r| r.succeeded()));
    reports
}

fn assert_compacted_indices_match_accepted_triangles(agent: &RenderAgent) {
    let reports = filtering_reports(agent);
    assert_eq!(reports.len(), FRAMES);
    for report in reports {
        for view in 0..NUM_CULLING_VIEWPORTS {
            let accepted = report.stats.filter.triangles_accepted[view] * 3;
            let compacted: u64 = report.stats.compaction[view].indices.iter().sum();
            assert_eq!(
                accepted, compacted,
                "frame {} view {view}: {accepted} accepted indices, {compacted} compacted",
                report.frame
            );
            assert!(report.stats.draws(view) > 0);
        }
    }
}

#[test]
fn test_async_frames_compact_every_accepted_index() {
    let scene = courtyard(8).unwrap();
    let agent = run(&scene, settings(true, false));

    // More surviving clusters than one chunk holds.
    for report in agent.frame_reports() {
        assert!(report.filter_dispatches >= 2, "{report:?}");
    }
    assert_compacted_indices_match_accepted_triangles(&agent);
}

#[test]
fn test_sorted_sync_frames_compact_every_accepted_index() {
    let scene = courtyard(8).unwrap();
    let agent = run(&scene, settings(false, true));

    for report in agent.frame_reports() {
        assert!(report.filter_dispatches >= 2, "{report:?}");
        assert!(report.presented.is_some());
    }
    assert_compacted_indices_match_accepted_triangles(&agent);
}

#[test]
fn test_fully_cone_culled_scene_compacts_nothing() {
    // Faces down, away from the camera and the sun above it.
    let mut builder = SceneBuilder::new();
    let material = builder.add_material(Material::solid("Ceiling", Vec3::ONE));
    builder.add_mesh(
        "Ceiling",
        material,
        MeshData::patch(
            Vec3::new(-4.0, 0.0, -4.0),
            Vec3::new(8.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 8.0),
            8,
            8,
            1.0,
        ),
    );
    let scene = builder.build().unwrap();
    let agent = run(&scene, settings(false, false));

    for report in agent.frame_reports() {
        assert!(report.total_clusters > 0);
        assert_eq!(report.culled_clusters, report.total_clusters);
        assert_eq!(report.draws, 0);
        assert_eq!(report.filter_dispatches, 0);
    }
    let graphics: Vec<_> = agent
        .execution_reports()
        .filter(|r| r.queue == QueueKind::Graphics)
        .collect();
    assert_eq!(graphics.len(), FRAMES);
    for report in graphics {
        assert!(report.succeeded());
        for view in 0..NUM_CULLING_VIEWPORTS {
            assert_eq!(report.stats.draws(view), 0);
            assert_eq!(report.stats.compaction[view].indices.iter().sum::<u64>(), 0);
        }
    }
}
