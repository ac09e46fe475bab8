//! Evaluation dispatch
//!
//! One call scores one swarm batch. Positions are handed over as owned
//! copies, results come back in input order, and a failure of any particle
//! fails the whole batch.

use rayon::prelude::*;

use photon_swarm_core::traits::ParticleEvaluator;

/// Error raised while scoring a batch
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The objective returned an error
    #[error("particle {particle} failed: {message}")]
    Objective { particle: usize, message: String },

    /// The objective returned NaN, which cannot be ranked
    #[error("particle {particle} returned a NaN cost")]
    NotANumber { particle: usize },

    /// The worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

impl DispatchError {
    /// Index of the failing particle, if the error concerns one
    pub fn particle(&self) -> Option<usize> {
        match self {
            DispatchError::Objective { particle, .. } | DispatchError::NotANumber { particle } => {
                Some(*particle)
            }
            DispatchError::Pool(_) => None,
        }
    }
}

/// Sequential or fixed-size pool evaluation
#[derive(Debug)]
pub enum Dispatcher {
    /// Evaluate in particle order on the calling thread
    Sequential,
    /// Evaluate on a dedicated pool of worker threads
    Pool(rayon::ThreadPool),
}

impl Dispatcher {
    /// `worker_count == 0` evaluates sequentially
    pub fn new(worker_count: usize) -> Result<Self, DispatchError> {
        if worker_count == 0 {
            return Ok(Dispatcher::Sequential);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("photon-swarm-eval-{i}"))
            .build()
            .map_err(|e| DispatchError::Pool(e.to_string()))?;
        tracing::debug!(workers = worker_count, "evaluation pool ready");
        Ok(Dispatcher::Pool(pool))
    }

    /// Number of concurrent evaluations
    pub fn workers(&self) -> usize {
        match self {
            Dispatcher::Sequential => 1,
            Dispatcher::Pool(pool) => pool.current_num_threads(),
        }
    }

    /// Score every position; `costs[i]` belongs to `positions[i]`.
    ///
    /// On failure the error names the lowest failing particle index.
    pub fn evaluate<E>(&self, positions: Vec<Vec<f64>>, evaluator: &E) -> Result<Vec<f64>, DispatchError>
    where
        E: ParticleEvaluator + ?Sized,
    {
        match self {
            Dispatcher::Sequential => positions
                .iter()
                .enumerate()
                .map(|(i, x)| score(i, x, evaluator))
                .collect(),
            Dispatcher::Pool(pool) => {
                let results: Vec<Result<f64, DispatchError>> = pool.install(|| {
                    positions
                        .par_iter()
                        .enumerate()
                        .map(|(i, x)| score(i, x, evaluator))
                        .collect()
                });
                results.into_iter().collect()
            }
        }
    }
}

fn score<E>(particle: usize, position: &[f64], evaluator: &E) -> Result<f64, DispatchError>
where
    E: ParticleEvaluator + ?Sized,
{
    match evaluator.evaluate(position) {
        Ok(cost) if cost.is_nan() => Err(DispatchError::NotANumber { particle }),
        Ok(cost) => Ok(cost),
        Err(e) => Err(DispatchError::Objective {
            particle,
            message: e.to_string(),
        }),
    }
}
