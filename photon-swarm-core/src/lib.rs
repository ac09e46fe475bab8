//! # PhotonSwarm Core
//!
//! Core particle swarm primitives for PhotonSwarm.
//!
//! This crate provides:
//! - Swarm state and the PSO velocity/position update
//! - Global-best and local-best (k nearest, Minkowski-p) social terms
//! - Annealing schedules for the inertia, cognitive and social coefficients
//! - Velocity clamping and periodic boundary handling
//! - The relative-tolerance convergence window
//! - The configuration surface shared by every PhotonSwarm crate
//!
//! Everything here is independent of what the parameter vector encodes; the
//! geometry crate gives it meaning.

pub mod algorithms;
pub mod config;
pub mod convergence;
pub mod handlers;
pub mod schedule;
pub mod traits;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithms::*;
    pub use crate::config::*;
    pub use crate::convergence::*;
    pub use crate::handlers::*;
    pub use crate::schedule::*;
    pub use crate::traits::*;
}

/// Result type for PhotonSwarm operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for PhotonSwarm core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed configuration, rejected before any iteration runs
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A parameter vector does not have the length its layout requires
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// A design cannot be built or interpolated
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The objective failed for a particle; the run cannot continue without
    /// a complete cost vector.
    #[error("evaluation failed at iteration {iteration} for particle {particle}: {message}")]
    Evaluation {
        iteration: usize,
        particle: usize,
        message: String,
        /// Records of every iteration that completed before the failure
        history: Vec<convergence::IterationRecord>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
