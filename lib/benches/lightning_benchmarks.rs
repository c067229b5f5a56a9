//! Lightning infill benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lightning_infill::geometry::{ExPolygon, ExPolygons, Point, Polygon};
use lightning_infill::infill::lightning::{Generator, InfillOutline, Layer, LightningConfig};
use lightning_infill::scale;

fn square(min: f64, max: f64) -> ExPolygon {
    ExPolygon::from(Polygon::rectangle(
        Point::new(scale(min), scale(min)),
        Point::new(scale(max), scale(max)),
    ))
}

fn pyramid(layers: usize, base: f64) -> Vec<ExPolygons> {
    (0..layers)
        .map(|i| {
            let inset = i as f64 * 0.1;
            vec![square(inset, base - inset)]
        })
        .collect()
}

fn bench_single_layer_trees(c: &mut Criterion) {
    let ex = square(0.0, 40.0);
    let outline = InfillOutline::new(vec![ex.clone()]);
    let config = LightningConfig::default();
    let params = config.params().unwrap();
    let locator = outline.build_locator(params.locator_cell_size);

    c.bench_function("generate_new_trees 40mm square", |b| {
        b.iter(|| {
            let mut layer = Layer::new();
            layer.generate_new_trees(
                black_box(&[ex.clone()]),
                &outline,
                &locator,
                params.supporting_radius,
                params.wall_supporting_radius,
            )
        })
    });
}

fn bench_generator(c: &mut Criterion) {
    let slices = pyramid(50, 40.0);

    c.bench_function("generator 50 layer pyramid", |b| {
        b.iter(|| Generator::new(LightningConfig::default(), black_box(&slices)).unwrap())
    });

    let generator = Generator::new(LightningConfig::default(), &slices).unwrap();
    c.bench_function("generate_polylines 50 layer pyramid", |b| {
        b.iter(|| black_box(&generator).generate_polylines())
    });
}

criterion_group!(benches, bench_single_layer_trees, bench_generator);
criterion_main!(benches);
