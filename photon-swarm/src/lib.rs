//! # PhotonSwarm
//!
//! Particle swarm optimization of the cross-section of a photonic
//! nanostructure. A design is a ring of polar anchor points, interpolated
//! into a smooth outline, plus the thicknesses and period of the layer stack
//! it is extruded through. The swarm searches that space against an external
//! figure of merit, with annealed coefficients, a global or local-best social
//! term, periodic boundaries and a relative-tolerance stopping rule.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use photon_swarm::prelude::*;
//!
//! fn main() -> photon_swarm::Result<()> {
//!     let space = DesignSpace::new(&DesignConfig {
//!         topology: Topology::Disk,
//!         ..DesignConfig::default()
//!     })?;
//!     let config = SwarmConfig::builder()
//!         .particle_count(space.suggested_particle_count())
//!         .bounds(space.bounds().clone())
//!         .max_iter(40)
//!         .build()?;
//!
//!     let objective = TargetArea::for_radius(250e-9, Topology::Disk);
//!     let result = Optimizer::new(config, space)?.run(&objective)?;
//!     println!("{:?} after {} iterations", result.termination, result.iterations);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `tokio-runtime` (default): ctrl-c handling and the `photon_swarm_run`
//!   binary
//!
//! ## Crate Structure
//!
//! - [`photon_swarm_core`]: swarm state, update rule, schedules, convergence
//! - [`photon_swarm_geometry`]: anchors, codec, splines, bounds, checkpoints
//! - [`photon_swarm_runtime`]: evaluation dispatch, stop signal, clocks

#![forbid(unsafe_code)]

pub use photon_swarm_core as swarm;
pub use photon_swarm_geometry as geometry;
pub use photon_swarm_runtime as runtime;

pub use photon_swarm_core::{
    algorithms::BestTopology,
    config::{Bounds, SwarmConfig},
    convergence::{IterationRecord, Termination},
    Error, Result,
};
pub use photon_swarm_geometry::{Checkpoint, Design, Topology};
pub use photon_swarm_runtime::StopSignal;

pub mod artifacts;
pub mod optimizer;
pub mod surrogate;

pub use optimizer::{OptimizationResult, Optimizer, SanityCheck};
pub use surrogate::TargetArea;

use serde::{Deserialize, Serialize};

use artifacts::{CheckpointFormat, CheckpointNaming};
use photon_swarm_geometry::space::{DesignConfig, DesignSpace};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::swarm::prelude::*;
    pub use crate::geometry::prelude::*;

    pub use crate::artifacts::{CheckpointDirectory, CheckpointSink, MemorySink};
    pub use crate::optimizer::{OptimizationResult, Optimizer, SanityCheck};
    pub use crate::runtime::StopSignal;
    pub use crate::surrogate::TargetArea;
    pub use crate::RunConfig;
}

/// How checkpoints are written to disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    pub format: CheckpointFormat,
    pub naming: CheckpointNaming,
}

/// One complete run description, as read by `photon_swarm_run`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Swarm settings; `bounds` and `dimensions` come from the design space
    pub swarm: SwarmConfig,
    pub design: DesignConfig,
    /// Replace `swarm.particle_count` with the design space suggestion
    pub auto_particle_count: bool,
    pub checkpoint: CheckpointSettings,
    /// Radius of the circle whose area the surrogate objective targets
    pub target_radius: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            swarm: SwarmConfig::default(),
            design: DesignConfig::default(),
            auto_particle_count: false,
            checkpoint: CheckpointSettings::default(),
            target_radius: 250e-9,
        }
    }
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.target_radius.is_finite() || self.target_radius <= 0.0 {
            return Err(Error::config(format!(
                "target_radius must be positive, got {}",
                self.target_radius
            )));
        }
        self.design.limits.validate()
    }

    /// Build the design space and the matching swarm configuration.
    pub fn prepare(&self) -> Result<(SwarmConfig, DesignSpace)> {
        let space = DesignSpace::new(&self.design)?;
        let mut swarm = self.swarm.clone().with_bounds(space.bounds().clone());
        if self.auto_particle_count {
            swarm.particle_count = space.suggested_particle_count();
        }
        swarm.validate()?;
        tracing::debug!(
            topology = %space.topology(),
            anchors = space.num_anchors(),
            dimensions = space.dimensions(),
            particles = swarm.particle_count,
            "run prepared"
        );
        Ok((swarm, space))
    }

    /// The surrogate objective this run is scored against
    pub fn objective(&self) -> TargetArea {
        TargetArea::for_radius(self.target_radius, self.design.topology)
            .with_resolution(self.design.resolution)
    }
}
