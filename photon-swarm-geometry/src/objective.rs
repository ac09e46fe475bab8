//! The figure-of-merit contract
//!
//! The optimizer never owns the simulator. It receives something that can
//! score a decoded design and calls it once per particle per iteration,
//! possibly from several worker threads.

use photon_swarm_core::traits::ObjectiveError;

use crate::design::{AnchorSet, LayerStack};

/// Scores one design
pub trait DesignObjective: Send + Sync {
    /// Figure of merit of the outline `anchors` extruded through `layers`
    fn evaluate(&self, anchors: &AnchorSet, layers: &LayerStack) -> Result<f64, ObjectiveError>;
}

impl<F> DesignObjective for F
where
    F: Fn(&AnchorSet, &LayerStack) -> Result<f64, ObjectiveError> + Send + Sync,
{
    fn evaluate(&self, anchors: &AnchorSet, layers: &LayerStack) -> Result<f64, ObjectiveError> {
        self(anchors, layers)
    }
}
