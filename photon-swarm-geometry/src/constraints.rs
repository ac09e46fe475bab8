//! Search bounds for a topology
//!
//! Angle bounds always come from the seed anchors: anchor `i` may move
//! between the seed angles of `V{i-1}` and `V{i}`. Because the seed never
//! changes during a run, neighbouring anchors can never cross.

use serde::{Deserialize, Serialize};

use photon_swarm_core::config::Bounds;
use photon_swarm_core::{Error, Result};

use crate::design::{AnchorSet, Topology};
use crate::spline::linspace;

/// Design wavelength the default limits are scaled to, metres
pub const DESIGN_WAVELENGTH: f64 = 1.55e-6;

/// Closed interval with independent ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(Error::config(format!(
                "{name} must be a finite range with min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Global limits of the design, metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignLimits {
    pub radius: Span,
    pub top_thickness: Span,
    pub bottom_thickness: Span,
    pub height: Span,
    pub period: Span,
}

impl Default for DesignLimits {
    fn default() -> Self {
        let max_period = 0.9 * DESIGN_WAVELENGTH;
        Self {
            radius: Span::new(100e-9, max_period / 2.0 - 50e-9),
            top_thickness: Span::new(50e-9, 100e-9),
            bottom_thickness: Span::new(50e-9, 100e-9),
            height: Span::new(250e-9, 850e-9),
            period: Span::new(250e-9, max_period),
        }
    }
}

impl DesignLimits {
    pub fn validate(&self) -> Result<()> {
        self.radius.validate("radius")?;
        if self.radius.min <= 0.0 {
            return Err(Error::config(format!(
                "radius.min must be > 0, got {}",
                self.radius.min
            )));
        }
        self.top_thickness.validate("top_thickness")?;
        self.bottom_thickness.validate("bottom_thickness")?;
        self.height.validate("height")?;
        self.period.validate("period")?;
        Ok(())
    }

    fn layer_spans(&self) -> [Span; 4] {
        [
            self.top_thickness,
            self.bottom_thickness,
            self.height,
            self.period,
        ]
    }
}

/// Circle of `num_anchors` anchors at `linspace(0, arc, N)`
pub fn seed_anchors(topology: Topology, num_anchors: usize, radius: f64) -> Result<AnchorSet> {
    topology.check_anchor_count(num_anchors)?;
    if !(radius > 0.0) || !radius.is_finite() {
        return Err(Error::config(format!("seed radius must be > 0, got {radius}")));
    }
    Ok(AnchorSet::from_polar(
        linspace(0.0, topology.arc(), num_anchors)
            .into_iter()
            .map(|angle| (radius, angle)),
    ))
}

/// Per-parameter bounds for `topology`, anchored on the `seed` outline
pub fn build(topology: Topology, limits: &DesignLimits, seed: &AnchorSet) -> Result<Bounds> {
    limits.validate()?;
    let n = seed.len();
    topology.check_anchor_count(n)?;
    let seed_angles: Vec<f64> = seed.angles().collect();
    let r = limits.radius;

    let mut min = Vec::with_capacity(topology.parameter_count(n));
    let mut max = Vec::with_capacity(topology.parameter_count(n));
    let mut push = |lo: f64, hi: f64| {
        min.push(lo);
        max.push(hi);
    };

    match topology {
        Topology::Disk => push(r.min, r.max),
        Topology::FreeForm | Topology::Quadrant => {
            let free = if topology == Topology::FreeForm { n - 1 } else { n };
            for i in 0..free {
                push(r.min, r.max);
                if i == 0 {
                    push(0.0, 0.0);
                } else if topology == Topology::Quadrant && i == n - 1 {
                    let end = topology.arc();
                    push(end, end);
                } else {
                    push(seed_angles[i - 1], seed_angles[i]);
                }
            }
        }
    }
    for span in limits.layer_spans() {
        push(span.min, span.max);
    }
    tracing::debug!(%topology, anchors = n, dims = min.len(), "built design bounds");
    Bounds::new(min, max)
}
