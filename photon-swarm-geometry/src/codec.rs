//! Parameter vector codec and outline interpolation
//!
//! Layouts, `N` anchors, trailing `[top, bottom, height, period]`:
//!
//! | topology  | outline entries                          |
//! |-----------|------------------------------------------|
//! | free-form | `(r, θ)` for anchors `1..N-1`; `V_N = V_1` |
//! | quadrant  | `(r, θ)` for anchors `1..N`              |
//! | disk      | one shared `r`                           |

use photon_swarm_core::{Error, Result};

use crate::design::{AnchorSet, Design, LayerStack, Point2, Topology};
use crate::spline::{linspace, BoundaryCondition, CubicSpline};

/// Flatten a design into a parameter vector
pub fn encode(design: &Design, topology: Topology) -> Result<Vec<f64>> {
    let anchors = &design.anchors;
    let n = anchors.len();
    topology.check_anchor_count(n)?;
    let mut params = Vec::with_capacity(topology.parameter_count(n));
    match topology {
        Topology::FreeForm => {
            for a in anchors.iter().take(n - 1) {
                params.extend([a.radius, a.angle]);
            }
        }
        Topology::Quadrant => {
            for a in anchors.iter() {
                params.extend([a.radius, a.angle]);
            }
        }
        Topology::Disk => params.extend(anchors.get(0).map(|a| a.radius)),
    }
    params.extend(design.layers.to_array());
    Ok(params)
}

/// Rebuild a design from a parameter vector
pub fn decode(params: &[f64], topology: Topology, num_anchors: usize) -> Result<Design> {
    topology.check_anchor_count(num_anchors)?;
    let expected = topology.parameter_count(num_anchors);
    if params.len() != expected {
        return Err(Error::Dimension {
            expected,
            actual: params.len(),
        });
    }
    let (outline, tail) = params.split_at(expected - LayerStack::PARAMETERS);
    let pairs = outline.chunks_exact(2).map(|c| (c[0], c[1]));
    let anchors = match topology {
        Topology::FreeForm => {
            let first = (outline[0], outline[1]);
            AnchorSet::from_polar(pairs.chain(std::iter::once(first)))
        }
        Topology::Quadrant => AnchorSet::from_polar(pairs),
        Topology::Disk => {
            let radius = outline[0];
            AnchorSet::from_polar(
                linspace(0.0, topology.arc(), num_anchors)
                    .into_iter()
                    .map(|angle| (radius, angle)),
            )
        }
    };
    Ok(Design {
        anchors,
        layers: LayerStack::from_slice(tail)?,
    })
}

/// Sample a smooth closed outline through the anchors.
///
/// Splines are fitted to the cartesian anchor coordinates against the
/// uniform grid `linspace(0, arc, N)`. Full-circle outlines come back as
/// `resolution` points with the last equal to the first. Quadrant outlines
/// are mirrored counter-clockwise into all four quadrants without repeating
/// the shared axis points, giving `4 * resolution - 3` points.
pub fn interpolate(anchors: &AnchorSet, resolution: usize, topology: Topology) -> Result<Vec<Point2>> {
    topology.check_anchor_count(anchors.len())?;
    if resolution < 2 {
        return Err(Error::Geometry(format!(
            "interpolation resolution must be >= 2, got {resolution}"
        )));
    }
    let arc = topology.arc();
    let grid = linspace(0.0, arc, anchors.len());
    let points: Vec<Point2> = anchors.iter().map(|a| a.to_point()).collect();
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();

    let bc = match topology {
        Topology::FreeForm | Topology::Disk => BoundaryCondition::Periodic,
        Topology::Quadrant => BoundaryCondition::NotAKnot,
    };
    let sx = CubicSpline::new(&grid, &xs, bc)?;
    let sy = CubicSpline::new(&grid, &ys, bc)?;
    let samples = linspace(0.0, arc, resolution);
    let mut arc_points: Vec<Point2> = samples
        .iter()
        .map(|&t| Point2::new(sx.eval(t), sy.eval(t)))
        .collect();

    match topology {
        Topology::FreeForm | Topology::Disk => Ok(arc_points),
        Topology::Quadrant => {
            // Spline overshoot near the axes must not fold the outline.
            for p in arc_points.iter_mut() {
                p.x = p.x.max(0.0);
                p.y = p.y.max(0.0);
            }
            Ok(mirror_quadrant(&arc_points))
        }
    }
}

/// Mirror a first-quadrant arc (from the +x axis to the +y axis) into a
/// closed counter-clockwise ring.
pub fn mirror_quadrant(q1: &[Point2]) -> Vec<Point2> {
    if q1.is_empty() {
        return Vec::new();
    }
    let mut ring = Vec::with_capacity(4 * q1.len() - 3);
    ring.extend_from_slice(q1);
    ring.extend(q1.iter().rev().skip(1).map(|p| Point2::new(-p.x, p.y)));
    ring.extend(q1.iter().skip(1).map(|p| Point2::new(-p.x, -p.y)));
    ring.extend(q1.iter().rev().skip(1).map(|p| Point2::new(p.x, -p.y)));
    ring
}

/// Signed shoelace area; positive for counter-clockwise rings
pub fn polygon_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice / 2.0
}

/// Interpolate a whole design with the outline at `resolution`
pub fn outline(design: &Design, resolution: usize, topology: Topology) -> Result<Vec<Point2>> {
    interpolate(&design.anchors, resolution, topology)
}
