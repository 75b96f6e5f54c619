//! Benchmarks for the per-frame analysis and mapping path
//!
//! Run with: cargo bench --bench pipeline

use beat_stage::audio::{AnalyserConfig, EnergyReducer, FrequencySnapshot, SpectrumAnalyser};
use beat_stage::effects::{Timeline, VariantConfig, VisualParameterMapper, BUILTIN_VARIANTS};
use beat_stage::scene::VisualParameterSet;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::hint::black_box;

fn bench_analyse(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyse");

    for fft_size in [64usize, 1024, 8192].iter() {
        let config = AnalyserConfig {
            fft_size: *fft_size,
            ..AnalyserConfig::default()
        };
        let mut analyser = SpectrumAnalyser::new(config);
        let samples: Vec<f32> = (0..*fft_size)
            .map(|i| (i as f32 * 0.3).sin() * 0.5)
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(fft_size), &samples, |b, samples| {
            b.iter(|| black_box(analyser.analyse(samples)));
        });
    }

    group.finish();
}

fn bench_classify_and_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_and_map");

    // A busy frame: most bins land in some band
    let snapshot = FrequencySnapshot::new((0..32).map(|i| 120 + (i * 4) as u8).collect());

    for name in BUILTIN_VARIANTS.iter() {
        let variant = VariantConfig::builtin(name).expect("built-in variant");
        let mut params = VisualParameterSet::from_layout(&variant.layout);
        let mut mapper = VisualParameterMapper::new(&variant, &params, StdRng::seed_from_u64(3))
            .expect("built-in variant resolves");
        let mut timeline = Timeline::new();

        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.iter(|| {
                let energy = EnergyReducer::reduce(&snapshot);
                let outcomes = mapper.classifier().classify(energy, &snapshot);
                black_box(mapper.map_frame(10.0, energy, &outcomes, &mut params, &mut timeline));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_analyse, bench_classify_and_map);
criterion_main!(benches);
