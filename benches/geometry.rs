use criterion::{black_box, criterion_group, criterion_main, Criterion};

use shortbox::{Canvas, Resolution, Transform};

fn bench_fit(c: &mut Criterion) {
    c.bench_function("transform_fit_1080p", |b| {
        b.iter(|| Transform::fit(black_box(Resolution::new(1920, 1080)), Canvas::SHORTS))
    });

    c.bench_function("transform_fit_sweep", |b| {
        b.iter(|| {
            for w in (100..4000u32).step_by(100) {
                let _ = Transform::fit(black_box(Resolution::new(w, 1080)), Canvas::SHORTS);
            }
        })
    });
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
