//! Benchmarks for curvilinear regridding and AMF correction.
//!
//! Run with: cargo bench --package column-processor --bench regrid_benchmarks

use column_common::CurvilinearGrid;
use column_processor::{
    AmfCorrector, ModelProfileOnSwath, RegridMethod, Regridder, SwathGranule,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use test_utils::{create_kernel_per_pixel, create_levels_per_pixel, create_swath_coords};

/// Model domain of `n x n` points at 0.1 degree.
fn model_grid(n: usize) -> CurvilinearGrid {
    CurvilinearGrid::regular(n, n, -100.0, 30.0, 0.1, 0.1).unwrap()
}

/// Tilted swath covering the middle of the model domain.
fn swath_grid(model_n: usize, swath_n: usize) -> CurvilinearGrid {
    let half = (model_n - 1) as f64 * 0.05;
    let spacing = half / swath_n as f64;
    let (lon, lat) = create_swath_coords(swath_n, swath_n, -100.0 + half, 30.0 + half, spacing, 12.0);
    CurvilinearGrid::new(swath_n, swath_n, lon, lat).unwrap()
}

/// Column-like field with random noise.
fn generate_column_field(len: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(1.0e15..8.0e15)).collect()
}

// =============================================================================
// WEIGHT CONSTRUCTION BENCHMARKS
// =============================================================================

fn bench_regridder_new(c: &mut Criterion) {
    let mut group = c.benchmark_group("regridder_new");

    for n in [50usize, 100, 200] {
        let model = model_grid(n);
        let swath = swath_grid(n, n / 2);
        group.throughput(Throughput::Elements(swath.len() as u64));

        group.bench_with_input(BenchmarkId::new("model_to_swath", n), &n, |b, _| {
            b.iter(|| {
                Regridder::new(
                    black_box(&model),
                    black_box(&swath),
                    RegridMethod::Bilinear,
                    true,
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("swath_to_model", n), &n, |b, _| {
            b.iter(|| {
                Regridder::new(
                    black_box(&swath),
                    black_box(&model),
                    RegridMethod::Bilinear,
                    true,
                )
            });
        });
    }

    group.finish();
}

// =============================================================================
// WEIGHT APPLICATION BENCHMARKS
// =============================================================================

fn bench_regridder_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("regridder_apply");

    let model = model_grid(200);
    let swath = swath_grid(200, 100);
    let regridder = Regridder::new(&model, &swath, RegridMethod::Bilinear, true).unwrap();
    let field = generate_column_field(model.len());
    group.throughput(Throughput::Elements(swath.len() as u64));

    group.bench_function("single_field", |b| {
        b.iter(|| regridder.apply(black_box(&field)));
    });

    for nlayers in [10usize, 35] {
        let layers = generate_column_field(model.len() * nlayers);
        group.bench_with_input(BenchmarkId::new("layers", nlayers), &layers, |b, layers| {
            b.iter(|| regridder.apply_layers(black_box(layers), nlayers));
        });
    }

    group.finish();
}

fn bench_nearest_vs_bilinear(c: &mut Criterion) {
    let mut group = c.benchmark_group("regrid_method");

    let model = model_grid(100);
    let swath = swath_grid(100, 60);
    let field = generate_column_field(model.len());

    for (method, name) in [
        (RegridMethod::Bilinear, "bilinear"),
        (RegridMethod::Nearest, "nearest"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                column_processor::regrid(black_box(&model), black_box(&field), &swath, method, true)
            });
        });
    }

    group.finish();
}

// =============================================================================
// AMF CORRECTION BENCHMARKS
// =============================================================================

fn bench_recompute_ratio(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute_ratio");

    let levels: Vec<f32> = (0..34).map(|k| 101_325.0 - k as f32 * 2_900.0).collect();
    let model_layers: Vec<f32> = (0..35).map(|k| 100_000.0 - k as f32 * 2_800.0).collect();

    for n in [50usize, 100] {
        let swath_grid = swath_grid(200, n);
        let npix = swath_grid.len();
        let mut rng = rand::thread_rng();
        let kernel: Vec<f32> = (0..levels.len()).map(|_| rng.gen_range(0.5..2.0)).collect();

        let swath = SwathGranule::new(swath_grid, generate_column_field(npix))
            .unwrap()
            .with_kernel(
                levels.len(),
                create_kernel_per_pixel(&kernel, npix),
                create_levels_per_pixel(&levels, npix),
                vec![20_000.0; npix],
                vec![1.4; npix],
                vec![1.1; npix],
            )
            .unwrap();
        let profile = ModelProfileOnSwath::new(
            model_layers.len(),
            create_levels_per_pixel(&model_layers, npix),
            generate_column_field(npix * model_layers.len()),
        )
        .unwrap();
        let corrector = AmfCorrector::default();

        group.throughput(Throughput::Elements(npix as u64));
        group.bench_with_input(BenchmarkId::new("pixels", npix), &npix, |b, _| {
            b.iter(|| corrector.recompute_ratio(black_box(&swath), black_box(&profile), None));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_regridder_new,
    bench_regridder_apply,
    bench_nearest_vs_bilinear,
    bench_recompute_ratio,
);
criterion_main!(benches);
