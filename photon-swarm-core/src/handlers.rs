//! Velocity and position handlers
//!
//! After every velocity update the velocity handler limits each component,
//! then the boundary handler brings positions that left the search box back
//! inside it.

use serde::{Deserialize, Serialize};

use crate::config::Bounds;
use crate::{Error, Result};

/// Trait for velocity limiting strategies
pub trait VelocityHandler: Send + Sync {
    /// Limit a freshly computed velocity in place
    fn apply(&self, velocity: &mut [f64]);
}

/// Trait for position boundary strategies
pub trait BoundaryHandler: Send + Sync {
    /// Move `position` back inside `bounds`.
    ///
    /// `velocity` is the velocity that produced `position`; handlers may
    /// adjust it for dimensions they pin.
    fn apply(&self, position: &mut [f64], velocity: &mut [f64], bounds: &Bounds);
}

/// Leaves velocities untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl VelocityHandler for Unbounded {
    fn apply(&self, _velocity: &mut [f64]) {}
}

/// Component-wise clamp to a fixed `[min, max]` range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityClamp {
    pub min: f64,
    pub max: f64,
}

impl VelocityClamp {
    /// Create a clamp, rejecting inverted or non-finite ranges
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let clamp = Self { min, max };
        clamp.validate()?;
        Ok(clamp)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(Error::config(format!(
                "velocity_clamp must be a finite range with min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

impl VelocityHandler for VelocityClamp {
    fn apply(&self, velocity: &mut [f64]) {
        for v in velocity.iter_mut() {
            *v = v.clamp(self.min, self.max);
        }
    }
}

/// Periodic wraparound.
///
/// Overshoot past one edge re-enters from the opposite edge, reduced modulo
/// the span, so particles do not pile up on the boundary. Dimensions whose
/// span is zero are pinned to their bound and lose their velocity.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodicWrap;

impl PeriodicWrap {
    /// Wrap a single coordinate into `[lo, hi]`
    pub fn wrap(x: f64, lo: f64, hi: f64) -> f64 {
        let span = hi - lo;
        if span <= 0.0 {
            return lo;
        }
        let wrapped = if x < lo {
            hi - (lo - x) % span
        } else if x > hi {
            lo + (x - hi) % span
        } else {
            x
        };
        // Rounding in the remainder must not leave the box.
        wrapped.clamp(lo, hi)
    }
}

impl BoundaryHandler for PeriodicWrap {
    fn apply(&self, position: &mut [f64], velocity: &mut [f64], bounds: &Bounds) {
        let dims = position.iter_mut().zip(velocity.iter_mut());
        for ((x, v), (&lo, &hi)) in dims.zip(bounds.min().iter().zip(bounds.max())) {
            if hi <= lo {
                *x = lo;
                *v = 0.0;
            } else {
                *x = Self::wrap(*x, lo, hi);
            }
        }
    }
}

/// Configuration for boundary handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    #[default]
    Periodic,
}

impl BoundaryMode {
    /// The handler implementing this mode
    pub fn handler(self) -> Box<dyn BoundaryHandler> {
        match self {
            BoundaryMode::Periodic => Box::new(PeriodicWrap),
        }
    }
}

/// The velocity handler for an optional clamp
pub fn velocity_handler(clamp: Option<VelocityClamp>) -> Box<dyn VelocityHandler> {
    match clamp {
        Some(c) => Box::new(c),
        None => Box::new(Unbounded),
    }
}
