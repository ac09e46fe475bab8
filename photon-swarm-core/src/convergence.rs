//! Convergence tracking
//!
//! An iteration "stalls" when the swarm-wide best moved less than
//! `ftol * (1 + |previous best|)`. The run converges once the last
//! `ftol_window` iterations all stalled.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Relative improvement test against the best from before the iteration.
///
/// With no earlier best (the first iteration compares against ±∞) there is
/// nothing to improve on, so the iteration counts as stalled. A constant
/// objective therefore converges after exactly `ftol_window` iterations.
pub fn stalled(previous_best: f64, new_best: f64, ftol: f64) -> bool {
    if !previous_best.is_finite() {
        return true;
    }
    if !new_best.is_finite() {
        return false;
    }
    (new_best - previous_best).abs() < ftol * (1.0 + previous_best.abs())
}

/// Fixed-size window of stall flags
#[derive(Debug, Clone)]
pub struct ConvergenceWindow {
    flags: VecDeque<bool>,
    capacity: usize,
}

impl ConvergenceWindow {
    /// Create an empty window of `capacity` (at least 1) entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            flags: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record one iteration, evicting the oldest entry when full
    pub fn push(&mut self, stalled: bool) {
        if self.flags.len() == self.capacity {
            self.flags.pop_front();
        }
        self.flags.push_back(stalled);
    }

    pub fn is_full(&self) -> bool {
        self.flags.len() == self.capacity
    }

    /// Full and every entry stalled
    pub fn converged(&self) -> bool {
        self.is_full() && self.flags.iter().all(|&f| f)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Lifecycle of one optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerState {
    Initialized,
    Iterating,
    Converged,
    MaxIterReached,
    /// Stop signal or time limit observed at an iteration boundary
    Cancelled,
    /// An evaluation failed; no result is available
    Failed,
}

impl OptimizerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OptimizerState::Initialized | OptimizerState::Iterating)
    }
}

/// How a finished run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    MaxIterReached,
    Cancelled,
    TimedOut,
}

impl From<Termination> for OptimizerState {
    fn from(t: Termination) -> Self {
        match t {
            Termination::Converged => OptimizerState::Converged,
            Termination::MaxIterReached => OptimizerState::MaxIterReached,
            Termination::Cancelled | Termination::TimedOut => OptimizerState::Cancelled,
        }
    }
}

/// One completed iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: usize,
    /// Swarm-wide best after this iteration
    pub best_cost: f64,
    /// Mean personal best after this iteration
    pub mean_personal_best: f64,
    /// Mean social attractor cost after this iteration
    pub mean_neighbor_best: f64,
    /// Cost of every particle, in particle order
    pub costs: Vec<f64>,
}
