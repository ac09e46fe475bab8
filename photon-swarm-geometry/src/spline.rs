//! Interpolating cubic splines
//!
//! Second-derivative formulation: for knots `t_i` with spacing `h_i` the
//! spline on `[t_i, t_{i+1}]` is determined by the values `y_i` and the
//! second derivatives `M_i`, which solve a small linear system whose closing
//! rows come from the boundary condition.

use nalgebra::{DMatrix, DVector};

use photon_swarm_core::{Error, Result};

/// Closing condition for the spline system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryCondition {
    /// First and second derivatives match across the endpoints. The first
    /// and last values must agree.
    Periodic,
    /// The third derivative is continuous across the second and the
    /// penultimate knots.
    NotAKnot,
}

/// A cubic spline through `(knots[i], values[i])`
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline. Knots must be strictly increasing.
    ///
    /// Two points give the straight line between them; three points under
    /// [`BoundaryCondition::NotAKnot`] give the interpolating parabola.
    pub fn new(knots: &[f64], values: &[f64], bc: BoundaryCondition) -> Result<Self> {
        let n = knots.len();
        if values.len() != n {
            return Err(Error::Dimension {
                expected: n,
                actual: values.len(),
            });
        }
        if n < 2 {
            return Err(Error::Geometry(format!("a spline needs at least 2 points, got {n}")));
        }
        if knots.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(Error::Geometry("spline knots must be strictly increasing".into()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Geometry("spline values must be finite".into()));
        }
        let second = match bc {
            BoundaryCondition::Periodic => {
                let scale = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
                if (values[0] - values[n - 1]).abs() > 1e-9 * scale {
                    return Err(Error::Geometry(format!(
                        "periodic spline needs matching endpoints, got {} and {}",
                        values[0],
                        values[n - 1]
                    )));
                }
                periodic_second_derivatives(knots, values)?
            }
            BoundaryCondition::NotAKnot => not_a_knot_second_derivatives(knots, values)?,
        };
        Ok(Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
            second,
        })
    }

    /// Evaluate at `t`; outside the knot range the end polynomials extend.
    pub fn eval(&self, t: f64) -> f64 {
        let n = self.knots.len();
        let i = self
            .knots
            .partition_point(|&k| k <= t)
            .saturating_sub(1)
            .min(n - 2);
        let (t0, t1) = (self.knots[i], self.knots[i + 1]);
        let h = t1 - t0;
        let (m0, m1) = (self.second[i], self.second[i + 1]);
        let (y0, y1) = (self.values[i], self.values[i + 1]);
        let a = t1 - t;
        let b = t - t0;
        m0 * a.powi(3) / (6.0 * h)
            + m1 * b.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * a
            + (y1 / h - m1 * h / 6.0) * b
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }
}

fn spacing(knots: &[f64]) -> Vec<f64> {
    knots.windows(2).map(|w| w[1] - w[0]).collect()
}

fn slope_jump(values: &[f64], h: &[f64], i: usize) -> f64 {
    6.0 * ((values[i + 1] - values[i]) / h[i] - (values[i] - values[i - 1]) / h[i - 1])
}

fn not_a_knot_second_derivatives(knots: &[f64], values: &[f64]) -> Result<Vec<f64>> {
    let n = knots.len();
    if n == 2 {
        return Ok(vec![0.0; 2]);
    }
    let h = spacing(knots);
    let mut a = DMatrix::<f64>::zeros(n, n);
    let mut rhs = DVector::<f64>::zeros(n);
    for i in 1..n - 1 {
        a[(i, i - 1)] = h[i - 1];
        a[(i, i)] = 2.0 * (h[i - 1] + h[i]);
        a[(i, i + 1)] = h[i];
        rhs[i] = slope_jump(values, &h, i);
    }
    if n == 3 {
        // Both conditions collapse to one; a single parabola has constant M.
        a[(0, 0)] = 1.0;
        a[(0, 1)] = -1.0;
        a[(2, 1)] = 1.0;
        a[(2, 2)] = -1.0;
    } else {
        a[(0, 0)] = h[1];
        a[(0, 1)] = -(h[0] + h[1]);
        a[(0, 2)] = h[0];
        a[(n - 1, n - 3)] = h[n - 2];
        a[(n - 1, n - 2)] = -(h[n - 3] + h[n - 2]);
        a[(n - 1, n - 1)] = h[n - 3];
    }
    solve(a, rhs)
}

fn periodic_second_derivatives(knots: &[f64], values: &[f64]) -> Result<Vec<f64>> {
    let n = knots.len();
    let h = spacing(knots);
    // M_{n-1} == M_0, so there are n - 1 unknowns indexed cyclically.
    let m = n - 1;
    let mut a = DMatrix::<f64>::zeros(m, m);
    let mut rhs = DVector::<f64>::zeros(m);
    for i in 0..m {
        let (prev, h_prev, y_prev) = if i == 0 {
            (m - 1, h[m - 1], values[m - 1])
        } else {
            (i - 1, h[i - 1], values[i - 1])
        };
        let next = (i + 1) % m;
        let h_next = h[i];
        a[(i, prev)] += h_prev;
        a[(i, i)] += 2.0 * (h_prev + h_next);
        a[(i, next)] += h_next;
        rhs[i] = 6.0 * ((values[i + 1] - values[i]) / h_next - (values[i] - y_prev) / h_prev);
    }
    let mut second = solve(a, rhs)?;
    second.push(second[0]);
    Ok(second)
}

/// LU solve of the second-derivative system
fn solve(a: DMatrix<f64>, rhs: DVector<f64>) -> Result<Vec<f64>> {
    let x = a
        .lu()
        .solve(&rhs)
        .ok_or_else(|| Error::Geometry("singular spline system".into()))?;
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::Geometry("spline system produced non-finite curvature".into()));
    }
    Ok(x.iter().copied().collect())
}

/// `count` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i + 1 == count { end } else { start + step * i as f64 })
                .collect()
        }
    }
}
