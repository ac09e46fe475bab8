//! End-to-end runs of the optimizer against small analytic objectives.

use std::sync::atomic::{AtomicUsize, Ordering};

use photon_swarm::artifacts::{load_checkpoint, CheckpointDirectory, CheckpointFormat, CheckpointNaming};
use photon_swarm::prelude::*;
use photon_swarm::Error;

fn free_form_space(anchors: usize, limits: DesignLimits) -> DesignSpace {
    DesignSpace::new(&DesignConfig {
        topology: Topology::FreeForm,
        num_anchors: Some(anchors),
        seed_radius: 200e-9,
        resolution: 64,
        limits,
    })
    .unwrap()
}

fn disk_space() -> DesignSpace {
    DesignSpace::new(&DesignConfig {
        topology: Topology::Disk,
        num_anchors: Some(24),
        resolution: 64,
        ..DesignConfig::default()
    })
    .unwrap()
}

fn mean_radius(anchors: &AnchorSet) -> f64 {
    anchors.radii().sum::<f64>() / anchors.len() as f64
}

fn temp_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("photon_swarm_it_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn five_anchor_free_form_converges_on_target_radius() {
    let limits = DesignLimits {
        radius: Span::new(199.5e-9, 200.5e-9),
        ..DesignLimits::default()
    };
    let space = free_form_space(5, limits);
    assert_eq!(space.dimensions(), 12);
    let config = SwarmConfig::builder()
        .particle_count(20)
        .bounds(space.bounds().clone())
        .max_iter(50)
        .ftol(1e-4, 5)
        .seed(2024)
        .build()
        .unwrap();

    let objective = |anchors: &AnchorSet, _: &LayerStack| -> Result<f64, ObjectiveError> {
        Ok((mean_radius(anchors) - 200e-9).powi(2))
    };
    let result = Optimizer::new(config, space).unwrap().run(&objective).unwrap();

    assert_eq!(result.termination, Termination::Converged);
    assert!(result.iterations < 50);
    assert!(result.best_cost < 1e-12);
    assert!(
        result.best_cost < result.history[0].best_cost,
        "no improvement over the first iteration: {} vs {}",
        result.best_cost,
        result.history[0].best_cost
    );
    let design = result.best_design.unwrap();
    assert_eq!(design.anchors.len(), 5);
    for r in design.anchors.radii() {
        assert!((r - 200e-9).abs() <= 1e-9, "radius {r}");
    }
    assert!(result.sanity.is_consistent());
}

#[test]
fn constant_objective_converges_within_the_window() {
    let space = disk_space();
    let config = SwarmConfig::builder()
        .particle_count(8)
        .bounds(space.bounds().clone())
        .ftol(1e-6, 4)
        .seed(5)
        .build()
        .unwrap();
    let flat = |_: &AnchorSet, _: &LayerStack| -> Result<f64, ObjectiveError> { Ok(3.5) };
    let result = Optimizer::new(config, space).unwrap().run(&flat).unwrap();
    assert_eq!(result.termination, Termination::Converged);
    assert!(result.iterations <= 4, "took {} iterations", result.iterations);
    assert_eq!(result.history.len(), result.iterations);
}

#[test]
fn mismatched_bounds_are_rejected_before_any_evaluation() {
    assert!(matches!(
        Bounds::new(vec![0.0; 3], vec![1.0; 4]),
        Err(Error::Configuration(_))
    ));

    let space = disk_space();
    let config = SwarmConfig {
        dimensions: space.dimensions(),
        bounds: Bounds::new(vec![0.0; 3], vec![1.0; 3]).unwrap(),
        ..SwarmConfig::default()
    };
    assert!(matches!(
        Optimizer::new(config, space),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn failing_particle_in_third_iteration_aborts_with_prior_history() {
    let space = disk_space();
    let config = SwarmConfig::builder()
        .particle_count(6)
        .bounds(space.bounds().clone())
        .ftol(0.0, 3)
        .seed(9)
        .build()
        .unwrap();
    let calls = AtomicUsize::new(0);
    let flaky = |anchors: &AnchorSet, _: &LayerStack| -> Result<f64, ObjectiveError> {
        // Sequential dispatch: call 15 is particle 3 of the third batch.
        if calls.fetch_add(1, Ordering::SeqCst) == 2 * 6 + 3 {
            return Err("mesh generation failed".into());
        }
        Ok(mean_radius(anchors))
    };

    let mut optimizer = Optimizer::new(config, space).unwrap();
    let err = optimizer.run(&flaky).unwrap_err();
    match err {
        Error::Evaluation {
            iteration,
            particle,
            message,
            history,
        } => {
            assert_eq!(iteration, 3);
            assert_eq!(particle, 3);
            assert!(message.contains("mesh generation failed"));
            let iterations: Vec<usize> = history.iter().map(|r| r.iteration).collect();
            assert_eq!(iterations, vec![1, 2]);
            assert!(history.iter().all(|r| r.costs.len() == 6));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(optimizer.state(), OptimizerState::Failed);
}

#[test]
fn best_cost_is_monotone_and_particles_stay_in_bounds() {
    let space = free_form_space(7, DesignLimits::default());
    let bounds = space.bounds().clone();
    let limits = DesignLimits::default();
    let config = SwarmConfig::builder()
        .particle_count(15)
        .bounds(bounds.clone())
        .ftol(0.0, 5)
        .max_iter(25)
        .seed(77)
        .build()
        .unwrap();

    let objective = TargetArea::for_radius(300e-9, Topology::FreeForm).with_resolution(64);
    let checked = |anchors: &AnchorSet, layers: &LayerStack| -> Result<f64, ObjectiveError> {
        let r = limits.radius;
        if anchors.radii().any(|x| x < r.min || x > r.max) {
            return Err("radius left its limits".into());
        }
        if layers.period < limits.period.min || layers.period > limits.period.max {
            return Err("period left its limits".into());
        }
        objective.evaluate(anchors, layers)
    };

    let mut optimizer = Optimizer::new(config, space).unwrap();
    let result = optimizer.run(&checked).unwrap();
    assert_eq!(result.termination, Termination::MaxIterReached);
    assert_eq!(result.iterations, 25);
    for pair in result.history.windows(2) {
        assert!(pair[1].best_cost <= pair[0].best_cost);
    }
    for particle in optimizer.swarm().particles() {
        assert!(bounds.contains(&particle.position));
    }
}

#[test]
fn maximizing_keeps_the_best_non_decreasing() {
    let space = disk_space();
    let config = SwarmConfig::builder()
        .particle_count(10)
        .bounds(space.bounds().clone())
        .minimize(false)
        .ftol(0.0, 5)
        .max_iter(15)
        .seed(13)
        .build()
        .unwrap();
    let area = |anchors: &AnchorSet, _: &LayerStack| -> Result<f64, ObjectiveError> {
        Ok(mean_radius(anchors) * 1e9)
    };
    let result = Optimizer::new(config, space).unwrap().run(&area).unwrap();
    for pair in result.history.windows(2) {
        assert!(pair[1].best_cost >= pair[0].best_cost);
    }
    let r_max = DesignLimits::default().radius.max * 1e9;
    assert!(result.best_cost <= r_max + 1e-9);
}

#[test]
fn local_best_runs_are_reproducible_across_worker_counts() {
    let run = |workers: usize| {
        let space = free_form_space(6, DesignLimits::default());
        let config = SwarmConfig::builder()
            .particle_count(12)
            .bounds(space.bounds().clone())
            .best_topology(BestTopology::Local)
            .worker_count(workers)
            .ftol(0.0, 5)
            .max_iter(10)
            .seed(31)
            .build()
            .unwrap();
        let objective = TargetArea::for_radius(280e-9, Topology::FreeForm).with_resolution(48);
        Optimizer::new(config, space).unwrap().run(&objective).unwrap()
    };
    let sequential = run(0);
    let pooled = run(3);
    assert_eq!(sequential.history, pooled.history);
    assert_eq!(sequential.best_position, pooled.best_position);
}

#[test]
fn stop_signal_raised_mid_run_ends_at_the_next_boundary() {
    let space = disk_space();
    let config = SwarmConfig::builder()
        .particle_count(5)
        .bounds(space.bounds().clone())
        .ftol(0.0, 5)
        .seed(4)
        .build()
        .unwrap();
    let stop = StopSignal::new();
    let trigger = stop.clone();
    let calls = AtomicUsize::new(0);
    let objective = |anchors: &AnchorSet, _: &LayerStack| -> Result<f64, ObjectiveError> {
        // Raised during the second batch.
        if calls.fetch_add(1, Ordering::SeqCst) == 7 {
            trigger.trigger();
        }
        Ok(mean_radius(anchors))
    };
    let mut optimizer = Optimizer::new(config, space).unwrap().with_stop_signal(stop);
    let result = optimizer.run(&objective).unwrap();
    assert_eq!(result.termination, Termination::Cancelled);
    assert_eq!(result.iterations, 2);
    assert!(result.best_design.is_some());
    assert_eq!(optimizer.state(), OptimizerState::Cancelled);
}

#[test]
fn checkpoint_directory_round_trip_and_resume() {
    let dir = temp_dir("resume");
    let space = free_form_space(6, DesignLimits::default());
    let config = SwarmConfig::builder()
        .particle_count(10)
        .bounds(space.bounds().clone())
        .ftol(0.0, 5)
        .max_iter(12)
        .seed(21)
        .build()
        .unwrap();
    let objective = TargetArea::for_radius(260e-9, Topology::FreeForm).with_resolution(48);

    let mut sink =
        CheckpointDirectory::create(&dir, CheckpointFormat::Postcard, CheckpointNaming::PerIteration).unwrap();
    let result = Optimizer::new(config.clone(), space.clone())
        .unwrap()
        .with_sink(&mut sink)
        .run(&objective)
        .unwrap();
    assert_eq!(result.checkpoint_failures, 0);
    for iteration in [5, 10, 12] {
        assert!(sink.checkpoint_path(iteration).exists(), "missing iteration {iteration}");
    }
    sink.validate_manifest().unwrap();

    let last = load_checkpoint(sink.checkpoint_path(12)).unwrap();
    assert_eq!(last.iteration, 12);
    assert_eq!(last.cost_history.len(), 12);
    assert_eq!(last.best_cost, result.best_cost);
    assert_eq!(Some(last.design()), result.best_design);

    let mut resumed = Optimizer::new(config, space.clone()).unwrap();
    resumed.seed_design(0, &last.design()).unwrap();
    let expected = space.encode(&last.design()).unwrap();
    let seeded = &resumed.swarm().particles()[0].position;
    for (a, b) in seeded.iter().zip(&expected) {
        assert!((a - b).abs() <= 1e-15 * (1.0 + b.abs()));
    }

    let _ = std::fs::remove_dir_all(&dir);
}
