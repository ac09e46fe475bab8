//! Cheap stand-in for an electromagnetic solver.
//!
//! Scores how close the interpolated outline's area is to a target area and
//! penalizes outlines that spill out of the unit cell. It has the same
//! contract as a real simulator, so it drives the run binary, the demos and
//! the tests.

use serde::{Deserialize, Serialize};

use photon_swarm_core::traits::ObjectiveError;
use photon_swarm_geometry::codec::{interpolate, polygon_area};
use photon_swarm_geometry::objective::DesignObjective;
use photon_swarm_geometry::space::DEFAULT_RESOLUTION;
use photon_swarm_geometry::{AnchorSet, LayerStack, Topology};

/// Squared relative area error plus a cell overflow penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetArea {
    /// Area to reach, square metres
    pub target_area: f64,
    pub resolution: usize,
    pub topology: Topology,
}

impl TargetArea {
    /// Target the area of a circle of `radius`
    pub fn for_radius(radius: f64, topology: Topology) -> Self {
        Self {
            target_area: std::f64::consts::PI * radius * radius,
            resolution: DEFAULT_RESOLUTION,
            topology,
        }
    }

    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }
}

impl DesignObjective for TargetArea {
    fn evaluate(&self, anchors: &AnchorSet, layers: &LayerStack) -> Result<f64, ObjectiveError> {
        if !self.target_area.is_finite() || self.target_area <= 0.0 {
            return Err(format!("target area must be positive, got {}", self.target_area).into());
        }
        let outline = interpolate(anchors, self.resolution, self.topology)?;
        let area = polygon_area(&outline).abs();
        let area_error = ((area - self.target_area) / self.target_area).powi(2);

        // Relative overflow of the outline past the half period.
        let half_cell = layers.period / 2.0;
        let extent = outline
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()))
            .fold(0.0_f64, f64::max);
        let overflow = if half_cell > 0.0 && extent > half_cell {
            ((extent - half_cell) / half_cell).powi(2)
        } else {
            0.0
        };

        Ok(area_error + overflow)
    }
}
