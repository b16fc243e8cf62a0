//! Indicator throughput over long candle histories.

use chainbot_core::traits::{Indicator, StreamingIndicator};
use chainbot_indicators::{Ema, Rsi, StreamingEma};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn closes(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 2000.0 + (i as f64 * 0.1).sin() * 50.0)
        .collect()
}

fn benchmark_ema(c: &mut Criterion) {
    let mut group = c.benchmark_group("EMA");
    for size in [500, 5_000, 50_000] {
        let data = closes(size);
        group.bench_with_input(BenchmarkId::new("batch_200", size), &data, |b, data| {
            let ema = Ema::new(200);
            b.iter(|| ema.calculate(black_box(data)))
        });
        group.bench_with_input(BenchmarkId::new("streaming_7", size), &data, |b, data| {
            b.iter(|| {
                let mut ema = StreamingEma::new(7);
                for &v in data {
                    black_box(ema.update(v));
                }
            })
        });
    }
    group.finish();
}

fn benchmark_rsi(c: &mut Criterion) {
    let mut group = c.benchmark_group("RSI");
    for size in [500, 5_000, 50_000] {
        let data = closes(size);
        group.bench_with_input(BenchmarkId::new("batch_14", size), &data, |b, data| {
            let rsi = Rsi::new(14);
            b.iter(|| rsi.calculate(black_box(data)))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_ema, benchmark_rsi);
criterion_main!(benches);
