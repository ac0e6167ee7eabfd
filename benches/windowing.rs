use actimate::dataset::{Sample, build_windows};
use actimate::defaults::{NUM_CHANNELS, WINDOW_LEN};
use actimate::features::reduce_windows;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ndarray::Array2;
use std::hint::black_box;
use std::path::PathBuf;

/// Deterministic sinusoidal recording of `len` rows.
fn synthetic_sample(len: usize) -> Sample {
    let signal = Array2::from_shape_fn((len, NUM_CHANNELS), |(t, c)| {
        ((t as f32) * 0.05 + c as f32).sin() * (c + 1) as f32
    });
    Sample {
        label: 0,
        activity: "walking".to_string(),
        sample_id: "bench".to_string(),
        path: PathBuf::from("bench"),
        signal,
    }
}

fn bench_windowing(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_windows");
    for len in [1_000usize, 10_000, 100_000] {
        let samples = vec![synthetic_sample(len)];
        group.bench_with_input(BenchmarkId::from_parameter(len), &samples, |b, samples| {
            b.iter(|| build_windows(black_box(samples), WINDOW_LEN));
        });
    }
    group.finish();
}

fn bench_reduction(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_windows");
    for len in [1_000usize, 10_000] {
        let windows = build_windows(&[synthetic_sample(len)], WINDOW_LEN);
        group.bench_with_input(
            BenchmarkId::from_parameter(windows.len()),
            &windows,
            |b, windows| {
                b.iter(|| reduce_windows(black_box(windows)));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_windowing, bench_reduction);
criterion_main!(benches);
