use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::irt::{estimate_ability, EstimatorConfig};
use adaptest_core::model::IrtParams;

fn make_history(len: usize) -> Vec<(IrtParams, bool)> {
    (0..len)
        .map(|i| {
            (
                IrtParams {
                    a: 0.8 + (i % 5) as f64 * 0.2,
                    b: -2.0 + (i % 9) as f64 * 0.5,
                    c: 0.2,
                },
                i % 3 != 0,
            )
        })
        .collect()
}

fn bench_estimation(c: &mut Criterion) {
    let config = EstimatorConfig::default();
    let mut group = c.benchmark_group("estimate_ability");

    for len in [5, 20, 50] {
        let history = make_history(len);
        group.bench_function(format!("responses={len}"), |b| {
            b.iter(|| estimate_ability(black_box(&history), black_box(&config)))
        });
    }

    // Degenerate all-correct pattern, worst case for the clamp path.
    let all_correct: Vec<_> = make_history(20)
        .into_iter()
        .map(|(p, _)| (p, true))
        .collect();
    group.bench_function("all_correct_20", |b| {
        b.iter(|| estimate_ability(black_box(&all_correct), black_box(&config)))
    });

    group.finish();
}

criterion_group!(benches, bench_estimation);
criterion_main!(benches);
