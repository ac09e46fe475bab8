//! The optimization loop.
//!
//! One [`Optimizer`] owns the swarm, the convergence window and the cost
//! history. Per iteration it:
//!
//! 1. checks the stop signal and the time limit,
//! 2. scores every particle through the dispatcher,
//! 3. refreshes personal, neighbourhood and swarm-wide bests,
//! 4. pushes the relative-improvement flag into the convergence window and
//!    stops once the window is full of stalls,
//! 5. anneals the coefficients and moves the swarm,
//! 6. snapshots the best design every `snapshot_interval` iterations.
//!
//! After the loop the best design is snapshotted once more and the objective
//! is re-evaluated at the reported best as a consistency check.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use photon_swarm_core::prelude::*;
use photon_swarm_core::{Error, Result};
use photon_swarm_geometry::objective::DesignObjective;
use photon_swarm_geometry::space::DesignSpace;
use photon_swarm_geometry::{Checkpoint, Design};
use photon_swarm_runtime::dispatch::Dispatcher;
use photon_swarm_runtime::{Clock, StopSignal, SystemClock};

use crate::artifacts::CheckpointSink;

/// `|a - b| <= atol + rtol * |b|`
pub fn isclose(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// Outcome of re-evaluating the objective at the reported best
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SanityCheck {
    Consistent { recorded: f64, observed: f64 },
    /// The objective disagrees with the cost recorded during the loop
    Mismatch { recorded: f64, observed: f64 },
    /// The re-evaluation itself failed
    Failed { message: String },
    /// Nothing to check: no iteration completed
    Skipped,
}

impl SanityCheck {
    pub fn is_consistent(&self) -> bool {
        matches!(self, SanityCheck::Consistent { .. })
    }
}

/// What a finished run reports, however it ended
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    pub termination: Termination,
    /// Completed iterations
    pub iterations: usize,
    pub best_cost: f64,
    pub best_position: Vec<f64>,
    /// Decoded best; absent when no iteration completed
    pub best_design: Option<Design>,
    pub history: Vec<IterationRecord>,
    pub sanity: SanityCheck,
    /// Snapshots the sink failed to store
    pub checkpoint_failures: usize,
}

/// Decodes a particle position and scores the resulting design
struct DecodingEvaluator<'a, O: ?Sized> {
    space: &'a DesignSpace,
    objective: &'a O,
}

impl<O: DesignObjective + ?Sized> ParticleEvaluator for DecodingEvaluator<'_, O> {
    fn evaluate(&self, position: &[f64]) -> std::result::Result<f64, ObjectiveError> {
        let design = self.space.decode(position)?;
        self.objective.evaluate(&design.anchors, &design.layers)
    }
}

/// Particle swarm optimizer over a [`DesignSpace`]
pub struct Optimizer<'a> {
    config: SwarmConfig,
    space: DesignSpace,
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    velocity: Box<dyn VelocityHandler>,
    boundary: Box<dyn BoundaryHandler>,
    swarm: Swarm,
    window: ConvergenceWindow,
    state: OptimizerState,
    history: Vec<IterationRecord>,
    rng: StdRng,
    stop: StopSignal,
    clock: Arc<dyn Clock>,
    sink: Option<Box<dyn CheckpointSink + 'a>>,
    checkpoint_failures: usize,
    last_snapshot: Option<usize>,
}

impl<'a> Optimizer<'a> {
    /// Validate the configuration against the design space and scatter the
    /// swarm. Nothing is evaluated yet.
    pub fn new(config: SwarmConfig, space: DesignSpace) -> Result<Self> {
        config.validate()?;
        if config.dimensions != space.dimensions() {
            return Err(Error::config(format!(
                "config has {} dimensions but the {} design space has {}",
                config.dimensions,
                space.topology(),
                space.dimensions()
            )));
        }
        let expected = space.bounds();
        if let Some(d) = (0..config.dimensions).find(|&d| {
            config.bounds.min()[d] != expected.min()[d] || config.bounds.max()[d] != expected.max()[d]
        }) {
            return Err(Error::config(format!(
                "bounds of dimension {d} are [{}, {}] but the design space needs [{}, {}]",
                config.bounds.min()[d],
                config.bounds.max()[d],
                expected.min()[d],
                expected.max()[d]
            )));
        }
        let scheduler = Scheduler::new(
            config.start_opts,
            config.end_opts,
            config.annealing,
            config.max_iter,
        )?;
        let dispatcher =
            Dispatcher::new(config.worker_count).map_err(|e| Error::config(e.to_string()))?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let swarm = Swarm::initialize(&config, &mut rng)?;

        Ok(Self {
            velocity: velocity_handler(config.velocity_clamp),
            boundary: config.boundary_mode.handler(),
            window: ConvergenceWindow::new(config.ftol_window),
            config,
            space,
            scheduler,
            dispatcher,
            swarm,
            state: OptimizerState::Initialized,
            history: Vec::new(),
            rng,
            stop: StopSignal::new(),
            clock: Arc::new(SystemClock::new()),
            sink: None,
            checkpoint_failures: 0,
            last_snapshot: None,
        })
    }

    /// Persist snapshots through `sink`
    pub fn with_sink(mut self, sink: impl CheckpointSink + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Observe `stop` at every iteration boundary
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Measure the time limit with `clock`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start particle `index` from a known position
    pub fn seed_particle(&mut self, index: usize, position: &[f64]) -> Result<()> {
        if self.state != OptimizerState::Initialized {
            return Err(Error::config("particles can only be seeded before the run"));
        }
        self.swarm.seed_particle(index, position, &self.config.bounds)
    }

    /// Start particle `index` from a known design, e.g. a loaded checkpoint
    pub fn seed_design(&mut self, index: usize, design: &Design) -> Result<()> {
        let position = self.space.encode(design)?;
        self.seed_particle(index, &position)
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    pub fn swarm(&self) -> &Swarm {
        &self.swarm
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn space(&self) -> &DesignSpace {
        &self.space
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Run to a terminal state.
    ///
    /// An evaluation failure aborts with [`Error::Evaluation`], which carries
    /// the history of every iteration completed before it.
    pub fn run<O>(&mut self, objective: &O) -> Result<OptimizationResult>
    where
        O: DesignObjective + ?Sized,
    {
        if self.state != OptimizerState::Initialized {
            return Err(Error::config(format!(
                "optimizer already ran (state {:?})",
                self.state
            )));
        }
        let direction = self.config.direction();
        let deadline = self
            .config
            .time_limit_secs
            .map(|secs| self.clock.now_ms().saturating_add((secs * 1000.0) as u64));

        tracing::info!(
            particles = self.config.particle_count,
            dimensions = self.config.dimensions,
            workers = self.dispatcher.workers(),
            topology = ?self.config.best_topology,
            design = %self.space.topology(),
            ?direction,
            "starting optimization"
        );
        self.state = OptimizerState::Iterating;

        let mut iteration = 0;
        let termination = loop {
            // A run that finished its budget reports that, not a late stop.
            if iteration == self.config.max_iter {
                break Termination::MaxIterReached;
            }
            if self.stop.is_triggered() {
                break Termination::Cancelled;
            }
            if deadline.is_some_and(|d| self.clock.now_ms() >= d) {
                break Termination::TimedOut;
            }
            iteration += 1;

            let evaluator = DecodingEvaluator {
                space: &self.space,
                objective,
            };
            let costs = match self.dispatcher.evaluate(self.swarm.positions(), &evaluator) {
                Ok(costs) => costs,
                Err(e) => {
                    self.state = OptimizerState::Failed;
                    tracing::error!(iteration, error = %e, "evaluation failed, aborting run");
                    return Err(Error::Evaluation {
                        iteration,
                        particle: e.particle().unwrap_or(0),
                        message: e.to_string(),
                        history: self.history.clone(),
                    });
                }
            };

            let previous_best = self.swarm.best_cost();
            self.swarm.update_personal_bests(&costs)?;
            self.swarm.update_bests(self.config.best_topology);
            let best = self.swarm.best_cost();
            self.window.push(stalled(previous_best, best, self.config.ftol));

            self.history.push(IterationRecord {
                iteration,
                best_cost: best,
                mean_personal_best: self.swarm.mean_personal_best(),
                mean_neighbor_best: self.swarm.mean_social_best(),
                costs,
            });

            let opts = *self.swarm.options();
            tracing::info!(
                iteration,
                best_cost = best,
                w = opts.w,
                c1 = opts.c1,
                c2 = opts.c2,
                "iteration complete"
            );

            if self.window.converged() {
                break Termination::Converged;
            }

            self.swarm.set_options(self.scheduler.schedule(iteration - 1));
            self.swarm.step(
                &mut self.rng,
                self.velocity.as_ref(),
                self.boundary.as_ref(),
                &self.config.bounds,
            );

            if iteration % self.config.snapshot_interval == 0 {
                self.snapshot(iteration);
            }
        };

        if iteration > 0 && self.last_snapshot != Some(iteration) {
            self.snapshot(iteration);
        }
        self.state = termination.into();

        let sanity = self.sanity_check(objective, iteration);
        let best_design = if iteration > 0 {
            self.space.decode(self.swarm.best_position()).ok()
        } else {
            None
        };
        tracing::info!(
            ?termination,
            iterations = iteration,
            best_cost = self.swarm.best_cost(),
            "optimization finished"
        );

        Ok(OptimizationResult {
            termination,
            iterations: iteration,
            best_cost: self.swarm.best_cost(),
            best_position: self.swarm.best_position().to_vec(),
            best_design,
            history: self.history.clone(),
            sanity,
            checkpoint_failures: self.checkpoint_failures,
        })
    }

    fn snapshot(&mut self, iteration: usize) {
        self.last_snapshot = Some(iteration);
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let design = match self.space.decode(self.swarm.best_position()) {
            Ok(design) => design,
            Err(e) => {
                tracing::warn!(iteration, error = %e, "cannot decode best position for checkpoint");
                self.checkpoint_failures += 1;
                return;
            }
        };
        tracing::debug!(
            iteration,
            top = design.layers.top_thickness,
            bottom = design.layers.bottom_thickness,
            height = design.layers.height,
            period = design.layers.period,
            "snapshot of best design"
        );
        let checkpoint = Checkpoint {
            iteration,
            topology: self.space.topology(),
            anchors: design.anchors,
            layers: design.layers,
            best_cost: self.swarm.best_cost(),
            cost_history: self.history.clone(),
        };
        if let Err(e) = sink.persist(&checkpoint) {
            tracing::warn!(iteration, error = %e, "checkpoint sink failed");
            self.checkpoint_failures += 1;
        }
    }

    fn sanity_check<O>(&self, objective: &O, iterations: usize) -> SanityCheck
    where
        O: DesignObjective + ?Sized,
    {
        let recorded = self.swarm.best_cost();
        if iterations == 0 || !recorded.is_finite() {
            return SanityCheck::Skipped;
        }
        let evaluator = DecodingEvaluator {
            space: &self.space,
            objective,
        };
        match evaluator.evaluate(self.swarm.best_position()) {
            Ok(observed) if isclose(observed, recorded, self.config.sanity_rtol, self.config.sanity_atol) => {
                tracing::info!(recorded, observed, "sanity check passed");
                SanityCheck::Consistent { recorded, observed }
            }
            Ok(observed) => {
                tracing::error!(recorded, observed, "sanity check mismatch: objective disagrees with recorded best");
                SanityCheck::Mismatch { recorded, observed }
            }
            Err(e) => {
                tracing::error!(error = %e, "sanity re-evaluation failed");
                SanityCheck::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::MemorySink;
    use photon_swarm_geometry::prelude::*;
    use photon_swarm_runtime::MockClock;
    use std::time::Duration;

    fn disk_space() -> DesignSpace {
        DesignSpace::new(&DesignConfig {
            topology: Topology::Disk,
            num_anchors: Some(16),
            ..DesignConfig::default()
        })
        .unwrap()
    }

    fn config(space: &DesignSpace) -> SwarmConfig {
        SwarmConfig::builder()
            .particle_count(12)
            .bounds(space.bounds().clone())
            .max_iter(20)
            .seed(3)
            .build()
            .unwrap()
    }

    fn radius_cost(anchors: &AnchorSet, _: &LayerStack) -> std::result::Result<f64, ObjectiveError> {
        let r = anchors.radii().next().unwrap_or(0.0);
        Ok(((r - 300e-9) / 1e-9).powi(2))
    }

    #[test]
    fn isclose_matches_relative_and_absolute_terms() {
        assert!(isclose(1.0 + 1e-6, 1.0, 1e-5, 1e-8));
        assert!(!isclose(1.0 + 1e-4, 1.0, 1e-5, 1e-8));
        assert!(isclose(1e-9, 0.0, 1e-5, 1e-8));
    }

    #[test]
    fn snapshots_follow_interval_and_final_iteration() {
        let space = disk_space();
        let mut cfg = config(&space);
        cfg.max_iter = 12;
        cfg.ftol = 0.0;
        let mut sink = MemorySink::default();
        let result = Optimizer::new(cfg, space)
            .unwrap()
            .with_sink(&mut sink)
            .run(&radius_cost)
            .unwrap();
        assert_eq!(result.termination, Termination::MaxIterReached);
        let iterations: Vec<usize> = sink.checkpoints.iter().map(|c| c.iteration).collect();
        assert_eq!(iterations, vec![5, 10, 12]);
        assert_eq!(sink.checkpoints[2].cost_history.len(), 12);
        assert!(result.sanity.is_consistent());
    }

    #[test]
    fn stop_signal_cancels_before_the_first_batch() {
        let space = disk_space();
        let stop = StopSignal::new();
        stop.trigger();
        let mut optimizer = Optimizer::new(config(&space), space)
            .unwrap()
            .with_stop_signal(stop);
        let result = optimizer.run(&radius_cost).unwrap();
        assert_eq!(result.termination, Termination::Cancelled);
        assert_eq!(result.iterations, 0);
        assert!(result.best_design.is_none());
        assert_eq!(result.sanity, SanityCheck::Skipped);
        assert_eq!(optimizer.state(), OptimizerState::Cancelled);
    }

    #[test]
    fn time_limit_stops_at_an_iteration_boundary() {
        let space = disk_space();
        let clock = Arc::new(MockClock::new());
        let mut cfg = config(&space);
        cfg.time_limit_secs = Some(1.0);
        cfg.ftol = 0.0;
        let ticking = clock.clone();
        let slow = move |anchors: &AnchorSet, layers: &LayerStack| {
            ticking.advance(Duration::from_millis(30));
            radius_cost(anchors, layers)
        };
        let result = Optimizer::new(cfg, space)
            .unwrap()
            .with_clock(clock)
            .run(&slow)
            .unwrap();
        // 12 particles x 30 ms = 360 ms per batch; the third batch crosses 1 s.
        assert_eq!(result.termination, Termination::TimedOut);
        assert_eq!(result.iterations, 3);
        assert_eq!(result.history.len(), 3);
    }

    #[test]
    fn mismatched_sanity_check_is_reported_not_raised() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let space = disk_space();
        let mut cfg = config(&space);
        cfg.max_iter = 2;
        let calls = AtomicUsize::new(0);
        let drifting = |anchors: &AnchorSet, layers: &LayerStack| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            // Every call after both batches returns a shifted value.
            let shift = if n >= 24 { 1e3 } else { 0.0 };
            radius_cost(anchors, layers).map(|c| c + shift)
        };
        let result = Optimizer::new(cfg, space).unwrap().run(&drifting).unwrap();
        assert!(matches!(result.sanity, SanityCheck::Mismatch { .. }));
    }

    #[test]
    fn dimension_mismatch_with_design_space() {
        let space = disk_space();
        let cfg = SwarmConfig::builder()
            .bounds(Bounds::new(vec![0.0; 3], vec![1.0; 3]).unwrap())
            .build()
            .unwrap();
        assert!(matches!(
            Optimizer::new(cfg, space),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn bounds_that_differ_from_the_design_space_are_rejected() {
        let space = disk_space();
        let mut min = space.bounds().min().to_vec();
        let mut max = space.bounds().max().to_vec();
        // Same dimensionality, but the period window is shifted.
        let last = min.len() - 1;
        min[last] *= 0.5;
        max[last] *= 0.5;
        let cfg = SwarmConfig::builder()
            .bounds(Bounds::new(min, max).unwrap())
            .build()
            .unwrap();
        assert_eq!(cfg.dimensions, space.dimensions());
        match Optimizer::new(cfg, space) {
            Err(Error::Configuration(message)) => assert!(message.contains("dimension")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn completing_max_iter_wins_over_a_late_stop() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let space = disk_space();
        let mut cfg = config(&space);
        cfg.particle_count = 4;
        cfg.max_iter = 2;
        cfg.ftol = 0.0;
        let stop = StopSignal::new();
        let trigger = stop.clone();
        let calls = AtomicUsize::new(0);
        let objective = |anchors: &AnchorSet, layers: &LayerStack| {
            // Raised while the final batch is being evaluated.
            if calls.fetch_add(1, Ordering::SeqCst) == 5 {
                trigger.trigger();
            }
            radius_cost(anchors, layers)
        };
        let mut optimizer = Optimizer::new(cfg, space).unwrap().with_stop_signal(stop.clone());
        let result = optimizer.run(&objective).unwrap();
        assert!(stop.is_triggered());
        assert_eq!(result.termination, Termination::MaxIterReached);
        assert_eq!(result.iterations, 2);
        assert_eq!(optimizer.state(), OptimizerState::MaxIterReached);
    }

    #[test]
    fn a_finished_optimizer_cannot_rerun() {
        let space = disk_space();
        let mut cfg = config(&space);
        cfg.max_iter = 1;
        let mut optimizer = Optimizer::new(cfg, space).unwrap();
        optimizer.run(&radius_cost).unwrap();
        assert!(optimizer.run(&radius_cost).is_err());
        assert!(optimizer.seed_particle(0, &[3e-7, 6e-8, 6e-8, 5e-7, 7e-7]).is_err());
    }
}
