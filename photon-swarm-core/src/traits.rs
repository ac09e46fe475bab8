//! Core traits for PhotonSwarm
//!
//! These traits define the seams between the swarm loop and the code that
//! gives a parameter vector its meaning.

/// Error returned by user-supplied objectives.
pub type ObjectiveError = Box<dyn std::error::Error + Send + Sync>;

/// Scores one flat parameter vector.
///
/// Implementations must not depend on optimizer state: the dispatcher hands
/// each call an owned copy of the particle position and may call
/// `evaluate` from several threads at once.
pub trait ParticleEvaluator: Send + Sync {
    /// Evaluate the cost of a single position
    fn evaluate(&self, position: &[f64]) -> Result<f64, ObjectiveError>;
}

impl<F> ParticleEvaluator for F
where
    F: Fn(&[f64]) -> Result<f64, ObjectiveError> + Send + Sync,
{
    fn evaluate(&self, position: &[f64]) -> Result<f64, ObjectiveError> {
        self(position)
    }
}

/// Optimization direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Build from the `minimize` flag of the configuration surface
    pub const fn from_minimize(minimize: bool) -> Self {
        if minimize {
            Direction::Minimize
        } else {
            Direction::Maximize
        }
    }

    /// Whether `candidate` is strictly better than `incumbent`
    pub fn improves(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }

    /// The cost every personal best starts from
    pub const fn worst(self) -> f64 {
        match self {
            Direction::Minimize => f64::INFINITY,
            Direction::Maximize => f64::NEG_INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_improvement_is_strict() {
        assert!(Direction::Minimize.improves(1.0, 2.0));
        assert!(!Direction::Minimize.improves(2.0, 2.0));
        assert!(Direction::Maximize.improves(3.0, 2.0));
        assert!(Direction::Maximize.improves(-1e300, Direction::Maximize.worst()));
    }

    #[test]
    fn closures_are_evaluators() {
        let sum = |x: &[f64]| -> Result<f64, ObjectiveError> { Ok(x.iter().sum()) };
        assert_eq!(sum.evaluate(&[1.0, 2.0]).unwrap(), 3.0);
    }
}
