//! Optimizer configuration surface

use serde::{Deserialize, Serialize};

use crate::algorithms::BestTopology;
use crate::handlers::{BoundaryMode, VelocityClamp};
use crate::schedule::{AnnealingPlan, SwarmOptions};
use crate::traits::Direction;
use crate::{Error, Result};

/// Element-wise search box. Only constructed through [`Bounds::new`], so
/// both vectors always have equal length, finite entries and `min <= max`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
pub struct Bounds {
    min: Vec<f64>,
    max: Vec<f64>,
}

#[derive(Deserialize)]
struct RawBounds {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl TryFrom<RawBounds> for Bounds {
    type Error = Error;

    fn try_from(raw: RawBounds) -> Result<Self> {
        Bounds::new(raw.min, raw.max)
    }
}

impl Bounds {
    /// Validate and build a search box
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Result<Self> {
        if min.len() != max.len() {
            return Err(Error::config(format!(
                "bounds length mismatch: min has {} entries, max has {}",
                min.len(),
                max.len()
            )));
        }
        for (i, (lo, hi)) in min.iter().zip(&max).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(Error::config(format!("bound {i} is not finite: [{lo}, {hi}]")));
            }
            if lo > hi {
                return Err(Error::config(format!("bound {i} has min > max: [{lo}, {hi}]")));
            }
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    pub fn len(&self) -> usize {
        self.min.len()
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_empty()
    }

    /// Width of each dimension
    pub fn spans(&self) -> impl Iterator<Item = f64> + '_ {
        self.min.iter().zip(&self.max).map(|(lo, hi)| hi - lo)
    }

    /// Whether every component of `position` lies inside the box
    pub fn contains(&self, position: &[f64]) -> bool {
        position.len() == self.len()
            && position
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(x, (lo, hi))| *lo <= *x && *x <= *hi)
    }

    /// Clamp `position` into the box
    pub fn clamp(&self, position: &mut [f64]) {
        for (x, (lo, hi)) in position.iter_mut().zip(self.min.iter().zip(&self.max)) {
            *x = x.clamp(*lo, *hi);
        }
    }
}

/// Full optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Number of particles, fixed for the run
    pub particle_count: usize,
    /// Length of every parameter vector
    pub dimensions: usize,
    /// Coefficients at iteration 0
    pub start_opts: SwarmOptions,
    /// Coefficients at `max_iter`
    pub end_opts: SwarmOptions,
    /// Annealing law per coefficient
    pub annealing: AnnealingPlan,
    /// Search box
    pub bounds: Bounds,
    /// Optional component-wise velocity limit
    pub velocity_clamp: Option<VelocityClamp>,
    pub boundary_mode: BoundaryMode,
    pub best_topology: BestTopology,
    /// Minimize when true, maximize otherwise
    pub minimize: bool,
    /// Relative improvement tolerance
    pub ftol: f64,
    /// Consecutive below-tolerance iterations required to stop
    pub ftol_window: usize,
    pub max_iter: usize,
    /// Checkpoint every this many iterations
    pub snapshot_interval: usize,
    /// Evaluation workers; 0 evaluates sequentially
    pub worker_count: usize,
    /// RNG seed; a fresh seed is drawn when absent
    pub seed: Option<u64>,
    /// Wall-clock limit, checked at iteration boundaries
    pub time_limit_secs: Option<f64>,
    /// Relative tolerance of the post-run sanity check
    pub sanity_rtol: f64,
    /// Absolute tolerance of the post-run sanity check
    pub sanity_atol: f64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            particle_count: 20,
            dimensions: 0,
            start_opts: SwarmOptions::exploratory(),
            end_opts: SwarmOptions::exploitative(),
            annealing: AnnealingPlan::default(),
            bounds: Bounds::default(),
            velocity_clamp: None,
            boundary_mode: BoundaryMode::Periodic,
            best_topology: BestTopology::Global,
            minimize: true,
            ftol: 1e-4,
            ftol_window: 10,
            max_iter: 60,
            snapshot_interval: 5,
            worker_count: 0,
            seed: None,
            time_limit_secs: None,
            sanity_rtol: 1e-5,
            sanity_atol: 1e-8,
        }
    }
}

impl SwarmConfig {
    /// Create a new configuration builder
    pub fn builder() -> SwarmConfigBuilder {
        SwarmConfigBuilder::new()
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Adopt `bounds` as the search box, resizing `dimensions` to match
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.dimensions = bounds.len();
        self.bounds = bounds;
        self
    }

    pub fn direction(&self) -> Direction {
        Direction::from_minimize(self.minimize)
    }

    /// Reject configurations the optimizer cannot run
    pub fn validate(&self) -> Result<()> {
        if self.particle_count == 0 {
            return Err(Error::config("particle_count must be > 0"));
        }
        if self.dimensions == 0 {
            return Err(Error::config("dimensions must be > 0"));
        }
        if self.bounds.len() != self.dimensions {
            return Err(Error::config(format!(
                "bounds have {} entries but dimensions is {}",
                self.bounds.len(),
                self.dimensions
            )));
        }
        self.start_opts.validate("start_opts")?;
        self.end_opts.validate("end_opts")?;
        if let Some(clamp) = &self.velocity_clamp {
            clamp.validate()?;
        }
        if self.best_topology == BestTopology::Local && self.start_opts.k > self.particle_count {
            return Err(Error::config(format!(
                "local topology needs k <= particle_count, got k = {} with {} particles",
                self.start_opts.k, self.particle_count
            )));
        }
        if !self.ftol.is_finite() || self.ftol < 0.0 {
            return Err(Error::config(format!("ftol must be finite and >= 0, got {}", self.ftol)));
        }
        if self.ftol_window == 0 {
            return Err(Error::config("ftol_window must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::config("max_iter must be > 0"));
        }
        if self.snapshot_interval == 0 {
            return Err(Error::config("snapshot_interval must be > 0"));
        }
        if let Some(limit) = self.time_limit_secs {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(Error::config(format!("time_limit_secs must be > 0, got {limit}")));
            }
        }
        if self.sanity_rtol < 0.0 || self.sanity_atol < 0.0 {
            return Err(Error::config("sanity tolerances must be >= 0"));
        }
        Ok(())
    }
}

/// Builder for SwarmConfig
#[derive(Debug, Default)]
pub struct SwarmConfigBuilder {
    config: SwarmConfig,
}

impl SwarmConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of particles
    pub fn particle_count(mut self, n: usize) -> Self {
        self.config.particle_count = n;
        self
    }

    /// Set the parameter vector length
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = dimensions;
        self
    }

    /// Set the search box and its dimension count
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.config = self.config.with_bounds(bounds);
        self
    }

    /// Set starting and ending coefficients
    pub fn options(mut self, start: SwarmOptions, end: SwarmOptions) -> Self {
        self.config.start_opts = start;
        self.config.end_opts = end;
        self
    }

    /// Set the annealing law per coefficient
    pub fn annealing(mut self, plan: AnnealingPlan) -> Self {
        self.config.annealing = plan;
        self
    }

    pub fn velocity_clamp(mut self, clamp: Option<VelocityClamp>) -> Self {
        self.config.velocity_clamp = clamp;
        self
    }

    pub fn best_topology(mut self, topology: BestTopology) -> Self {
        self.config.best_topology = topology;
        self
    }

    pub fn minimize(mut self, minimize: bool) -> Self {
        self.config.minimize = minimize;
        self
    }

    /// Set the convergence tolerance and window
    pub fn ftol(mut self, ftol: f64, window: usize) -> Self {
        self.config.ftol = ftol;
        self.config.ftol_window = window;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn snapshot_interval(mut self, interval: usize) -> Self {
        self.config.snapshot_interval = interval;
        self
    }

    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn time_limit_secs(mut self, secs: f64) -> Self {
        self.config.time_limit_secs = Some(secs);
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<SwarmConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(n: usize) -> Bounds {
        Bounds::new(vec![0.0; n], vec![1.0; n]).unwrap()
    }

    #[test]
    fn test_config_builder() {
        let config = SwarmConfig::builder()
            .particle_count(12)
            .bounds(unit_box(3))
            .ftol(1e-6, 4)
            .max_iter(30)
            .build()
            .unwrap();

        assert_eq!(config.dimensions, 3);
        assert_eq!(config.ftol_window, 4);
        assert_eq!(config.max_iter, 30);
    }

    #[test]
    fn test_bounds_reject_mismatch_and_inversion() {
        assert!(matches!(
            Bounds::new(vec![0.0, 0.0], vec![1.0]),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Bounds::new(vec![2.0], vec![1.0]),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Bounds::new(vec![f64::NAN], vec![1.0]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut config = SwarmConfig::default().with_bounds(unit_box(4));
        config.dimensions = 5;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_particles_rejected() {
        let err = SwarmConfig::builder()
            .particle_count(0)
            .bounds(unit_box(2))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("particle_count"));
    }

    #[test]
    fn test_from_json_validates_bounds() {
        let ok = SwarmConfig::from_json(
            r#"{"dimensions": 2, "bounds": {"min": [0, 0], "max": [1, 2]}, "max_iter": 7}"#,
        )
        .unwrap();
        assert_eq!(ok.max_iter, 7);
        assert_eq!(ok.particle_count, 20);

        let bad = SwarmConfig::from_json(
            r#"{"dimensions": 2, "bounds": {"min": [0, 3], "max": [1, 2]}}"#,
        );
        assert!(bad.is_err());
    }
}
