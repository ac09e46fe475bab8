//! Criterion benchmarks for one swarm update under both best topologies.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use photon_swarm_core::prelude::*;

fn sphere_costs(swarm: &Swarm) -> Vec<f64> {
    swarm
        .particles()
        .iter()
        .map(|p| p.position.iter().map(|x| x * x).sum())
        .collect()
}

fn bench_step(c: &mut Criterion) {
    let dims = 52;
    let bounds = Bounds::new(vec![-5.0; dims], vec![5.0; dims]).expect("bounds");
    for topology in [BestTopology::Global, BestTopology::Local] {
        let config = SwarmConfig::builder()
            .particle_count(dims * 10)
            .bounds(bounds.clone())
            .best_topology(topology)
            .build()
            .expect("config");
        let mut rng = StdRng::seed_from_u64(42);
        let mut swarm = Swarm::initialize(&config, &mut rng).expect("swarm");
        let boundary = BoundaryMode::Periodic.handler();
        c.bench_function(&format!("swarm_step_{topology:?}"), |b| {
            b.iter(|| {
                let costs = sphere_costs(&swarm);
                swarm.update_personal_bests(black_box(&costs)).expect("costs");
                swarm.update_bests(topology);
                swarm.step(&mut rng, &Unbounded, boundary.as_ref(), &bounds);
            })
        });
    }
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
