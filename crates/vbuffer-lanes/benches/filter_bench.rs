use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vbuffer_core::math::Vec3;
use vbuffer_core::renderer::{
    AppSettings, IndirectDrawBuffer, UncompactedDrawArguments, GEOMSET_COUNT, MAX_DRAWS_INDIRECT,
    VIEW_CAMERA,
};
use vbuffer_data::scene::procedural;
use vbuffer_data::Camera;
use vbuffer_lanes::cluster_lane::build_scene_clusters;
use vbuffer_lanes::culling_lane::{
    build_filter_batches, clear_draw_arguments, compact_batches, filter_triangles, BatchBuilder,
    CullingParams, FilterInputs, ViewOutput,
};
use vbuffer_lanes::uniform_lane::update_uniform_data;
use vbuffer_lanes::GpuScene;

fn bench_filtering(c: &mut Criterion) {
    let scene = procedural::courtyard(4).expect("courtyard scene");
    let scene = GpuScene::from_scene(&scene, Vec::new()).expect("gpu scene");
    let mut clusters = build_scene_clusters(&scene);
    let settings = AppSettings::default();
    let camera = Camera::new(Vec3::new(-600.0, 250.0, 500.0), Vec3::new(0.0, 100.0, 0.0));
    let uniforms = update_uniform_data(&settings, &camera, &scene.bounds).expect("uniforms");
    let params = CullingParams {
        eyes: uniforms.eye_object_space,
        cluster_culling: true,
        sort_clusters: false,
    };
    let mut builder = BatchBuilder::new();

    let max_indices = scene.total_triangles() as usize * 3;
    let mut uncompacted =
        [(); 2].map(|_| vec![UncompactedDrawArguments::default(); MAX_DRAWS_INDIRECT as usize]);
    let mut filtered = [(); 2].map(|_| vec![0u32; max_indices]);
    let mut indirect = vec![IndirectDrawBuffer::new(); GEOMSET_COUNT];

    let mut group = c.benchmark_group("Triangle filtering");

    group.bench_function("Cluster culling + batching", |b| {
        b.iter(|| {
            let plan =
                build_filter_batches(&scene, &mut clusters, &params, &mut builder).expect("plan");
            black_box(plan.batches.draw_count);
        });
    });

    let plan = build_filter_batches(&scene, &mut clusters, &params, &mut builder).expect("plan");
    let inputs = FilterInputs {
        scene: &scene,
        constants: &uniforms.constants,
    };

    group.bench_function("Filter + compact (both views)", |b| {
        b.iter(|| {
            let [shadow_args, camera_args] = &mut uncompacted;
            let [shadow_indices, camera_indices] = &mut filtered;
            clear_draw_arguments(shadow_args, &mut []);
            clear_draw_arguments(camera_args, &mut indirect);
            let mut views = [
                ViewOutput {
                    uncompacted: shadow_args,
                    filtered_indices: shadow_indices,
                },
                ViewOutput {
                    uncompacted: camera_args,
                    filtered_indices: camera_indices,
                },
            ];
            for dispatch in &plan.batches.dispatches {
                black_box(filter_triangles(&dispatch.batches, &inputs, &mut views).expect("filter"));
            }
            let stats = compact_batches(&scene, &uncompacted[VIEW_CAMERA], &mut indirect)
                .expect("compact");
            black_box(stats);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_filtering);
criterion_main!(benches);
