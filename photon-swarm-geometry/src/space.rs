//! The design space seen by the optimizer

use serde::{Deserialize, Serialize};

use photon_swarm_core::config::Bounds;
use photon_swarm_core::{Error, Result};

use crate::codec;
use crate::constraints::{self, DesignLimits};
use crate::design::{AnchorSet, Design, LayerStack, Point2, Topology};

/// Interpolation resolution used when none is configured
pub const DEFAULT_RESOLUTION: usize = 200;

/// Radius of the seed circle used when none is configured, metres
pub const DEFAULT_SEED_RADIUS: f64 = 275e-9;

/// Particles per dimension for [`DesignSpace::suggested_particle_count`]
pub const PARTICLES_PER_DIMENSION: usize = 10;

/// What is being designed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    pub topology: Topology,
    /// Anchor count; the topology default when absent
    pub num_anchors: Option<usize>,
    /// Radius of the seed circle
    pub seed_radius: f64,
    /// Points per interpolated arc
    pub resolution: usize,
    pub limits: DesignLimits,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            topology: Topology::FreeForm,
            num_anchors: None,
            seed_radius: DEFAULT_SEED_RADIUS,
            resolution: DEFAULT_RESOLUTION,
            limits: DesignLimits::default(),
        }
    }
}

impl DesignConfig {
    pub fn anchor_count(&self) -> usize {
        self.num_anchors
            .unwrap_or_else(|| self.topology.default_anchor_count())
    }
}

/// Seed outline, bounds and codec bound together for one run
#[derive(Debug, Clone)]
pub struct DesignSpace {
    topology: Topology,
    num_anchors: usize,
    resolution: usize,
    seed: AnchorSet,
    bounds: Bounds,
    limits: DesignLimits,
}

impl DesignSpace {
    pub fn new(config: &DesignConfig) -> Result<Self> {
        let num_anchors = config.anchor_count();
        if config.resolution < 2 {
            return Err(Error::config(format!(
                "resolution must be >= 2, got {}",
                config.resolution
            )));
        }
        let seed = constraints::seed_anchors(config.topology, num_anchors, config.seed_radius)?;
        let bounds = constraints::build(config.topology, &config.limits, &seed)?;
        Ok(Self {
            topology: config.topology,
            num_anchors,
            resolution: config.resolution,
            seed,
            bounds,
            limits: config.limits,
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn num_anchors(&self) -> usize {
        self.num_anchors
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn dimensions(&self) -> usize {
        self.bounds.len()
    }

    pub fn seed(&self) -> &AnchorSet {
        &self.seed
    }

    /// Swarm size scaled to the number of free parameters
    pub fn suggested_particle_count(&self) -> usize {
        self.dimensions() * PARTICLES_PER_DIMENSION
    }

    /// Seed outline with every layer scalar at the middle of its range
    pub fn seed_design(&self) -> Design {
        let l = &self.limits;
        Design {
            anchors: self.seed.clone(),
            layers: LayerStack {
                top_thickness: l.top_thickness.midpoint(),
                bottom_thickness: l.bottom_thickness.midpoint(),
                height: l.height.midpoint(),
                period: l.period.midpoint(),
            },
        }
    }

    /// Parameter vector of [`DesignSpace::seed_design`]
    pub fn seed_position(&self) -> Result<Vec<f64>> {
        self.encode(&self.seed_design())
    }

    pub fn encode(&self, design: &Design) -> Result<Vec<f64>> {
        if design.anchors.len() != self.num_anchors {
            return Err(Error::Dimension {
                expected: self.num_anchors,
                actual: design.anchors.len(),
            });
        }
        codec::encode(design, self.topology)
    }

    pub fn decode(&self, params: &[f64]) -> Result<Design> {
        codec::decode(params, self.topology, self.num_anchors)
    }

    /// Interpolated outline of `design` at the configured resolution
    pub fn outline(&self, design: &Design) -> Result<Vec<Point2>> {
        codec::outline(design, self.resolution, self.topology)
    }
}
