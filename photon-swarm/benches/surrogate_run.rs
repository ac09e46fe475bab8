//! Criterion benchmarks for short end-to-end runs against the area surrogate.

use criterion::{criterion_group, criterion_main, Criterion};

use photon_swarm::prelude::*;

fn short_run(topology: Topology, workers: usize) -> OptimizationResult {
    let space = DesignSpace::new(&DesignConfig {
        topology,
        resolution: 64,
        ..DesignConfig::default()
    })
    .expect("space");
    let config = SwarmConfig::builder()
        .particle_count(24)
        .bounds(space.bounds().clone())
        .max_iter(5)
        .worker_count(workers)
        .seed(1)
        .build()
        .expect("config");
    let objective = TargetArea::for_radius(250e-9, topology).with_resolution(64);
    Optimizer::new(config, space)
        .expect("optimizer")
        .run(&objective)
        .expect("run")
}

fn bench_runs(c: &mut Criterion) {
    for topology in [Topology::FreeForm, Topology::Quadrant, Topology::Disk] {
        c.bench_function(&format!("surrogate_run_{topology}_sequential"), |b| {
            b.iter(|| short_run(topology, 0))
        });
    }
    c.bench_function("surrogate_run_free-form_pool4", |b| {
        b.iter(|| short_run(Topology::FreeForm, 4))
    });
}

criterion_group!(benches, bench_runs);
criterion_main!(benches);
