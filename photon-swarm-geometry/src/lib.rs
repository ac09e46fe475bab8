//! # PhotonSwarm Geometry
//!
//! Meaning for the flat parameter vectors the swarm moves around.
//!
//! This crate provides:
//! - Polar anchor outlines with a layer stack ([`Design`])
//! - Encoding and decoding for free-form, quadrant and disk topologies
//! - Periodic and not-a-knot cubic spline interpolation of outlines
//! - Bounds derived from the seed outline and global design limits
//! - The objective contract for external simulators
//! - Checkpoint records

#![forbid(unsafe_code)]

pub mod codec;
pub mod constraints;
pub mod design;
pub mod objective;
pub mod space;
pub mod spline;

pub use design::{AnchorSet, AnchorVertex, Design, LayerStack, Point2, Topology};

use photon_swarm_core::convergence::IterationRecord;
use photon_swarm_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::codec::{decode, encode, interpolate, polygon_area};
    pub use crate::constraints::{DesignLimits, Span};
    pub use crate::design::*;
    pub use crate::objective::DesignObjective;
    pub use crate::space::{DesignConfig, DesignSpace};
    pub use crate::Checkpoint;
}

/// Snapshot of the best design found so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Iteration the snapshot was taken after
    pub iteration: usize,
    pub topology: Topology,
    pub anchors: AnchorSet,
    pub layers: LayerStack,
    pub best_cost: f64,
    /// Every completed iteration up to `iteration`
    pub cost_history: Vec<IterationRecord>,
}

impl Checkpoint {
    /// Serialize to compact bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from compact bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn design(&self) -> Design {
        Design {
            anchors: self.anchors.clone(),
            layers: self.layers,
        }
    }
}
