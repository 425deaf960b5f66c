use candle_core::Device;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use locfind::{Config, DesignNetworkType, LocationFinding, PriorContrastiveEstimation, Sampler};

fn bench_pce(c: &mut Criterion) {
    let mut group = c.benchmark_group("pce");
    group.sample_size(20);

    for kind in [DesignNetworkType::Adaptive, DesignNetworkType::Static] {
        // Small sample counts keep a single estimate in the millisecond range.
        let config = Config::quick().design_network(kind).num_rounds(5).num_sources(2);
        let mut sampler = Sampler::new(1, &Device::Cpu);
        let experiment = LocationFinding::new(&config, &mut sampler).unwrap();
        let estimator = PriorContrastiveEstimation::new(64, 32).unwrap();

        group.bench_function(format!("{}_differentiable", kind), |b| {
            b.iter(|| {
                let loss = estimator.differentiable_loss(&experiment, &mut sampler).unwrap();
                black_box(loss.backward().unwrap());
            });
        });

        group.bench_function(format!("{}_evaluate", kind), |b| {
            b.iter(|| black_box(estimator.evaluate_loss(&experiment, &mut sampler).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pce);
criterion_main!(benches);
