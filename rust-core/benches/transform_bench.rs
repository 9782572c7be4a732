//! Criterion benchmarks for the constant-Q transforms
//!
//! Run with: cargo bench -p constant-q-core

use constant_q::{CqKernel, CqParams, ForwardTransform, InverseTransform, Spectrogram};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::f64::consts::PI;

const SAMPLE_RATE: f64 = 44100.0;
const CHUNK: usize = 8192;

fn params(bins_per_octave: usize) -> CqParams {
    CqParams::new(SAMPLE_RATE, 110.0, 14080.0, bins_per_octave).unwrap()
}

/// A few harmonics of A4
fn generate_signal(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            let f1 = (2.0 * PI * 440.0 * t).sin();
            let f2 = 0.5 * (2.0 * PI * 880.0 * t).sin();
            let f3 = 0.25 * (2.0 * PI * 1320.0 * t).sin();
            (f1 + f2 + f3) * 0.4
        })
        .collect()
}

fn bench_kernel_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Kernel_Build");

    for bpo in [12, 24, 48] {
        let params = params(bpo);
        group.bench_with_input(BenchmarkId::from_parameter(bpo), &bpo, |b, _| {
            b.iter(|| black_box(CqKernel::new(black_box(&params)).unwrap()))
        });
    }

    group.finish();
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("Forward_Process");
    let input = generate_signal(CHUNK);

    for bpo in [12, 24, 48] {
        let mut forward = ForwardTransform::new(&params(bpo)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(bpo), &bpo, |b, _| {
            b.iter(|| black_box(forward.process(black_box(&input)).unwrap()))
        });
    }

    group.finish();
}

fn bench_inverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("Inverse_Process");

    for bpo in [12, 24, 48] {
        let mut forward = ForwardTransform::new(&params(bpo)).unwrap();
        let mut columns = forward.process(&generate_signal(SAMPLE_RATE as usize)).unwrap();
        columns.extend(forward.flush().unwrap());
        let block = &columns[..forward.block_width()];

        let mut inverse = InverseTransform::new(&params(bpo)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(bpo), &bpo, |b, _| {
            b.iter(|| black_box(inverse.process(black_box(block)).unwrap()))
        });
    }

    group.finish();
}

fn bench_spectrogram(c: &mut Criterion) {
    let input = generate_signal(CHUNK);
    let mut spectrogram = Spectrogram::new(&params(24)).unwrap();

    c.bench_function("Spectrogram_Process", |b| {
        b.iter(|| black_box(spectrogram.process(black_box(&input)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_kernel_build,
    bench_forward,
    bench_inverse,
    bench_spectrogram,
);

criterion_main!(benches);
