//! Swarm state and the PSO update rule
//!
//! The swarm owns every particle. Each iteration the loop feeds it one cost
//! per particle, the swarm refreshes its personal, neighbourhood and global
//! bests, and then moves every particle:
//!
//! ```text
//! v' = w v + c1 r1 (pbest - x) + c2 r2 (social - x)
//! x' = x + v'
//! ```
//!
//! `social` is the swarm-wide best under [`BestTopology::Global`] and the
//! best personal best among the `k` nearest particles under
//! [`BestTopology::Local`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Bounds, SwarmConfig};
use crate::handlers::{BoundaryHandler, VelocityHandler};
use crate::schedule::SwarmOptions;
use crate::traits::Direction;
use crate::{Error, Result};

/// Which best feeds the social term
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BestTopology {
    /// One swarm-wide best shared by every particle
    #[default]
    Global,
    /// Best of the `k` nearest particles under the Minkowski-`p` distance,
    /// recomputed every iteration
    Local,
}

/// Particle state in PSO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Current position
    pub position: Vec<f64>,
    /// Current velocity
    pub velocity: Vec<f64>,
    /// Personal best position
    pub best_position: Vec<f64>,
    /// Personal best cost
    pub best_cost: f64,
}

impl Particle {
    /// A particle that has not been evaluated yet
    pub fn new(position: Vec<f64>, velocity: Vec<f64>, direction: Direction) -> Self {
        Self {
            best_position: position.clone(),
            position,
            velocity,
            best_cost: direction.worst(),
        }
    }
}

/// Minkowski distance of order `p`; `p = inf` is the Chebyshev distance
pub fn minkowski(a: &[f64], b: &[f64], p: f64) -> f64 {
    let diffs = a.iter().zip(b).map(|(x, y)| (x - y).abs());
    if p.is_infinite() {
        diffs.fold(0.0, f64::max)
    } else if p == 1.0 {
        diffs.sum()
    } else {
        diffs.map(|d| d.powf(p)).sum::<f64>().powf(p.recip())
    }
}

/// A fixed-size swarm
#[derive(Debug, Clone)]
pub struct Swarm {
    particles: Vec<Particle>,
    best_position: Vec<f64>,
    best_cost: f64,
    // False until the first `update_bests`; the origin is not a real best.
    has_best: bool,
    options: SwarmOptions,
    direction: Direction,
    social_position: Vec<Vec<f64>>,
    social_cost: Vec<f64>,
}

impl Swarm {
    /// Scatter `config.particle_count` particles uniformly over the bounds.
    ///
    /// Velocities start uniform inside the clamp range when one is
    /// configured and at zero otherwise.
    pub fn initialize<R: Rng>(config: &SwarmConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let bounds = &config.bounds;
        let direction = config.direction();
        let particles = (0..config.particle_count)
            .map(|_| {
                let position = bounds
                    .min()
                    .iter()
                    .zip(bounds.max())
                    .map(|(&lo, &hi)| if hi > lo { rng.gen_range(lo..=hi) } else { lo })
                    .collect::<Vec<_>>();
                let velocity = match config.velocity_clamp {
                    Some(c) if c.max > c.min => {
                        (0..config.dimensions).map(|_| rng.gen_range(c.min..=c.max)).collect()
                    }
                    Some(c) => vec![c.min; config.dimensions],
                    None => vec![0.0; config.dimensions],
                };
                Particle::new(position, velocity, direction)
            })
            .collect();
        Ok(Self::from_particles(particles, config.start_opts, direction))
    }

    /// Build a swarm from explicit particles
    pub fn from_particles(
        particles: Vec<Particle>,
        options: SwarmOptions,
        direction: Direction,
    ) -> Self {
        let dims = particles.first().map_or(0, |p| p.position.len());
        let n = particles.len();
        Self {
            particles,
            best_position: vec![0.0; dims],
            best_cost: direction.worst(),
            has_best: false,
            options,
            direction,
            social_position: vec![vec![0.0; dims]; n],
            social_cost: vec![direction.worst(); n],
        }
    }

    /// Replace particle `index`'s position with a known design, clamped
    /// into `bounds`.
    pub fn seed_particle(&mut self, index: usize, position: &[f64], bounds: &Bounds) -> Result<()> {
        let count = self.particles.len();
        let particle = self.particles.get_mut(index).ok_or_else(|| {
            Error::config(format!("seed index {index} out of range for {count} particles"))
        })?;
        if position.len() != particle.position.len() {
            return Err(Error::Dimension {
                expected: particle.position.len(),
                actual: position.len(),
            });
        }
        particle.position.copy_from_slice(position);
        bounds.clamp(&mut particle.position);
        particle.best_position.clone_from(&particle.position);
        Ok(())
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn best_cost(&self) -> f64 {
        self.best_cost
    }

    pub fn best_position(&self) -> &[f64] {
        &self.best_position
    }

    pub fn options(&self) -> &SwarmOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SwarmOptions) {
        self.options = options;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Owned copies of every current position, in particle order
    pub fn positions(&self) -> Vec<Vec<f64>> {
        self.particles.iter().map(|p| p.position.clone()).collect()
    }

    /// Replace personal bests that `costs` improve on
    pub fn update_personal_bests(&mut self, costs: &[f64]) -> Result<()> {
        if costs.len() != self.particles.len() {
            return Err(Error::Dimension {
                expected: self.particles.len(),
                actual: costs.len(),
            });
        }
        for (particle, &cost) in self.particles.iter_mut().zip(costs) {
            if self.direction.improves(cost, particle.best_cost) {
                particle.best_cost = cost;
                particle.best_position.clone_from(&particle.position);
            }
        }
        Ok(())
    }

    /// Refresh the swarm-wide best and the per-particle social attractors.
    ///
    /// The swarm-wide best only ever improves. The first call always adopts
    /// the best particle, even when every cost is infinite.
    pub fn update_bests(&mut self, topology: BestTopology) {
        if let Some(best) = self.best_particle(0..self.particles.len()) {
            let particle = &self.particles[best];
            if !self.has_best || self.direction.improves(particle.best_cost, self.best_cost) {
                debug!(
                    particle = best,
                    cost = particle.best_cost,
                    previous = self.best_cost,
                    "swarm best updated"
                );
                self.best_cost = particle.best_cost;
                self.best_position.clone_from(&particle.best_position);
                self.has_best = true;
            }
        }

        match topology {
            BestTopology::Global => {
                for (pos, cost) in self.social_position.iter_mut().zip(&mut self.social_cost) {
                    pos.clone_from(&self.best_position);
                    *cost = self.best_cost;
                }
            }
            BestTopology::Local => {
                for i in 0..self.particles.len() {
                    let neighbours = self.nearest(i);
                    if let Some(best) = self.best_particle(neighbours.into_iter()) {
                        let particle = &self.particles[best];
                        self.social_position[i].clone_from(&particle.best_position);
                        self.social_cost[i] = particle.best_cost;
                    }
                }
            }
        }
    }

    /// Indices of the `k` particles closest to particle `i`, itself included
    fn nearest(&self, i: usize) -> Vec<usize> {
        let origin = &self.particles[i].position;
        let mut distances: Vec<(usize, f64)> = self
            .particles
            .iter()
            .enumerate()
            .map(|(j, p)| (j, minkowski(origin, &p.position, self.options.p)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances
            .into_iter()
            .take(self.options.k.max(1))
            .map(|(j, _)| j)
            .collect()
    }

    fn best_particle(&self, candidates: impl Iterator<Item = usize>) -> Option<usize> {
        candidates.fold(None, |best: Option<usize>, j| match best {
            Some(b)
                if !self
                    .direction
                    .improves(self.particles[j].best_cost, self.particles[b].best_cost) =>
            {
                Some(b)
            }
            _ => Some(j),
        })
    }

    /// Move every particle once with the current options
    pub fn step<R: Rng>(
        &mut self,
        rng: &mut R,
        velocity: &dyn VelocityHandler,
        boundary: &dyn BoundaryHandler,
        bounds: &Bounds,
    ) {
        let SwarmOptions { w, c1, c2, .. } = self.options;
        for (particle, social) in self.particles.iter_mut().zip(&self.social_position) {
            let dims = particle.position.len();
            for d in 0..dims {
                let r1: f64 = rng.gen();
                let r2: f64 = rng.gen();
                let x = particle.position[d];
                particle.velocity[d] = w * particle.velocity[d]
                    + c1 * r1 * (particle.best_position[d] - x)
                    + c2 * r2 * (social[d] - x);
            }
            velocity.apply(&mut particle.velocity);
            for (x, v) in particle.position.iter_mut().zip(&particle.velocity) {
                *x += v;
            }
            boundary.apply(&mut particle.position, &mut particle.velocity, bounds);
        }
    }

    /// Mean personal best cost over the swarm
    pub fn mean_personal_best(&self) -> f64 {
        mean(self.particles.iter().map(|p| p.best_cost))
    }

    /// Mean cost of the social attractors
    pub fn mean_social_best(&self) -> f64 {
        mean(self.social_cost.iter().copied())
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sum::<f64>() / n as f64
}
