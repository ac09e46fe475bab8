//! Hyperparameter annealing
//!
//! The inertia, cognitive and social coefficients move from a starting
//! triple to an ending triple over the run, each along its own law. The
//! neighbourhood parameters `k` and `p` never change.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Default exponent of [`AnnealingLaw::Nonlinear`]
pub const DEFAULT_NONLINEAR_EXPONENT: f64 = 1.2;

/// PSO coefficients for one iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwarmOptions {
    /// Inertia weight
    pub w: f64,
    /// Cognitive coefficient (attraction to personal best)
    pub c1: f64,
    /// Social coefficient (attraction to global or neighbourhood best)
    pub c2: f64,
    /// Number of neighbours for the local-best topology
    pub k: usize,
    /// Minkowski exponent for the local-best topology (`inf` = Chebyshev)
    pub p: f64,
}

impl SwarmOptions {
    /// Exploration-heavy starting coefficients
    pub const fn exploratory() -> Self {
        Self {
            w: 0.9,
            c1: 2.5,
            c2: 0.5,
            k: 4,
            p: 2.0,
        }
    }

    /// Exploitation-heavy ending coefficients
    pub const fn exploitative() -> Self {
        Self {
            w: 0.4,
            c1: 0.5,
            c2: 2.5,
            k: 4,
            p: 2.0,
        }
    }

    pub(crate) fn validate(&self, label: &str) -> Result<()> {
        for (name, v) in [("w", self.w), ("c1", self.c1), ("c2", self.c2)] {
            if !v.is_finite() {
                return Err(Error::config(format!("{label}.{name} must be finite, got {v}")));
            }
        }
        if self.k == 0 {
            return Err(Error::config(format!("{label}.k must be > 0")));
        }
        if self.p.is_nan() || self.p < 1.0 {
            return Err(Error::config(format!("{label}.p must be >= 1, got {}", self.p)));
        }
        Ok(())
    }
}

impl Default for SwarmOptions {
    fn default() -> Self {
        Self::exploratory()
    }
}

/// How a single coefficient travels from its start to its end value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnealingLaw {
    /// `start * (end/start)^(t/T)`
    ExpDecay,
    /// `start + (end - start) * t/T`
    #[serde(alias = "lin_variation")]
    Linear,
    /// `end + (start - end) * ((T - t)/T)^exponent`
    #[serde(alias = "nonlin_mod")]
    Nonlinear,
}

impl AnnealingLaw {
    /// Value of the coefficient at iteration `t` of `max_iter`.
    pub fn value(self, start: f64, end: f64, t: usize, max_iter: usize, exponent: f64) -> f64 {
        if max_iter == 0 {
            return start;
        }
        let t = t.min(max_iter) as f64;
        let total = max_iter as f64;
        match self {
            AnnealingLaw::ExpDecay => start * (end / start).powf(t / total),
            AnnealingLaw::Linear => start + (end - start) * (t / total),
            AnnealingLaw::Nonlinear => end + (start - end) * ((total - t) / total).powf(exponent),
        }
    }
}

/// Which law drives each annealed coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingPlan {
    pub w: AnnealingLaw,
    pub c1: AnnealingLaw,
    pub c2: AnnealingLaw,
    /// Exponent used by every [`AnnealingLaw::Nonlinear`] entry
    pub nonlinear_exponent: f64,
}

impl Default for AnnealingPlan {
    fn default() -> Self {
        Self {
            w: AnnealingLaw::ExpDecay,
            c1: AnnealingLaw::Nonlinear,
            c2: AnnealingLaw::Linear,
            nonlinear_exponent: DEFAULT_NONLINEAR_EXPONENT,
        }
    }
}

impl AnnealingPlan {
    /// Every coefficient annealed by the same law
    pub fn uniform(law: AnnealingLaw) -> Self {
        Self {
            w: law,
            c1: law,
            c2: law,
            ..Self::default()
        }
    }
}

/// Anneals [`SwarmOptions`] over a run of `max_iter` iterations
#[derive(Debug, Clone)]
pub struct Scheduler {
    start: SwarmOptions,
    end: SwarmOptions,
    plan: AnnealingPlan,
    max_iter: usize,
}

impl Scheduler {
    /// Create a scheduler, rejecting plans that cannot be evaluated.
    ///
    /// Exponential decay needs both endpoints strictly positive.
    pub fn new(
        start: SwarmOptions,
        end: SwarmOptions,
        plan: AnnealingPlan,
        max_iter: usize,
    ) -> Result<Self> {
        start.validate("start_opts")?;
        end.validate("end_opts")?;
        if !plan.nonlinear_exponent.is_finite() || plan.nonlinear_exponent <= 0.0 {
            return Err(Error::config(format!(
                "nonlinear_exponent must be a positive number, got {}",
                plan.nonlinear_exponent
            )));
        }
        let pairs = [
            ("w", plan.w, start.w, end.w),
            ("c1", plan.c1, start.c1, end.c1),
            ("c2", plan.c2, start.c2, end.c2),
        ];
        for (name, law, s, e) in pairs {
            if law == AnnealingLaw::ExpDecay && (s <= 0.0 || e <= 0.0) {
                return Err(Error::config(format!(
                    "exp_decay on {name} needs positive endpoints, got {s} -> {e}"
                )));
            }
        }
        debug!(?plan, max_iter, w0 = start.w, w1 = end.w, "annealing plan accepted");
        Ok(Self {
            start,
            end,
            plan,
            max_iter,
        })
    }

    /// Coefficients for iteration `t` (0-based)
    pub fn schedule(&self, t: usize) -> SwarmOptions {
        schedule(&self.start, &self.end, t, self.max_iter, &self.plan)
    }

    pub fn start(&self) -> &SwarmOptions {
        &self.start
    }

    pub fn end(&self) -> &SwarmOptions {
        &self.end
    }
}

/// Anneal `w`, `c1` and `c2` independently; `k` and `p` keep their start
/// values.
pub fn schedule(
    start: &SwarmOptions,
    end: &SwarmOptions,
    t: usize,
    max_iter: usize,
    plan: &AnnealingPlan,
) -> SwarmOptions {
    let e = plan.nonlinear_exponent;
    SwarmOptions {
        w: plan.w.value(start.w, end.w, t, max_iter, e),
        c1: plan.c1.value(start.c1, end.c1, t, max_iter, e),
        c2: plan.c2.value(start.c2, end.c2, t, max_iter, e),
        k: start.k,
        p: start.p,
    }
}
