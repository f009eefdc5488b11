use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use ecotune_core::config::SimConfig;
use ecotune_sim::EcosystemWorld;
use std::time::Duration;

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    let samples: usize = std::env::var("ECOTUNE_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(20);
    let steps: usize = std::env::var("ECOTUNE_BENCH_STEPS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(60);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(8));

    for &(prey, pred) in &[(160_usize, 20_usize), (800, 100)] {
        group.bench_function(format!("steps{steps}_prey{prey}_pred{pred}"), |b| {
            b.iter_batched(
                || {
                    let mut config = SimConfig::default();
                    config.population.initial_prey = prey;
                    config.population.initial_pred = pred;
                    EcosystemWorld::new(0xBEEF, config).expect("bench world")
                },
                |mut world| {
                    for _ in 0..steps {
                        world.step();
                    }
                    world
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
