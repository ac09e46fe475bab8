//! Design data model
//!
//! A design is an outline given by named polar anchors plus the scalars of
//! the layer stack the outline is extruded through.

use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

use serde::{Deserialize, Serialize};

use photon_swarm_core::{Error, Result};

/// How the outline is parameterized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Full circle of free anchors; the last anchor closes onto the first
    FreeForm,
    /// One quadrant of anchors mirrored into the other three
    Quadrant,
    /// A single radius shared by every anchor
    Disk,
}

impl Topology {
    /// Angular extent covered by the anchors
    pub fn arc(self) -> f64 {
        match self {
            Topology::FreeForm | Topology::Disk => 2.0 * PI,
            Topology::Quadrant => FRAC_PI_2,
        }
    }

    /// Anchor count used when none is configured
    pub fn default_anchor_count(self) -> usize {
        match self {
            Topology::FreeForm => 25,
            Topology::Quadrant => 10,
            Topology::Disk => 100,
        }
    }

    /// Fewest anchors that still describe a closed outline
    pub fn min_anchor_count(self) -> usize {
        match self {
            Topology::Quadrant => 2,
            Topology::FreeForm | Topology::Disk => 3,
        }
    }

    /// Length of the parameter vector for `num_anchors` anchors
    pub fn parameter_count(self, num_anchors: usize) -> usize {
        let outline = match self {
            Topology::FreeForm => 2 * num_anchors.saturating_sub(1),
            Topology::Quadrant => 2 * num_anchors,
            Topology::Disk => 1,
        };
        outline + LayerStack::PARAMETERS
    }

    pub(crate) fn check_anchor_count(self, num_anchors: usize) -> Result<()> {
        if num_anchors < self.min_anchor_count() {
            return Err(Error::Geometry(format!(
                "{self} needs at least {} anchors, got {num_anchors}",
                self.min_anchor_count()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::FreeForm => write!(f, "free-form"),
            Topology::Quadrant => write!(f, "quadrant"),
            Topology::Disk => write!(f, "disk"),
        }
    }
}

/// A named polar control point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorVertex {
    /// `V1`, `V2`, ...
    pub name: String,
    /// Distance from the origin, metres
    pub radius: f64,
    /// Polar angle, radians
    pub angle: f64,
}

impl AnchorVertex {
    /// The anchor at 1-based position `index`
    pub fn new(index: usize, radius: f64, angle: f64) -> Self {
        Self {
            name: format!("V{index}"),
            radius,
            angle,
        }
    }

    /// Cartesian position
    pub fn to_point(&self) -> Point2 {
        Point2::from_polar(self.radius, self.angle)
    }
}

/// Ordered anchors of one outline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnchorSet {
    anchors: Vec<AnchorVertex>,
}

impl AnchorSet {
    /// Build from `(radius, angle)` pairs, naming them `V1..VN`
    pub fn from_polar(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let anchors = pairs
            .into_iter()
            .enumerate()
            .map(|(i, (r, a))| AnchorVertex::new(i + 1, r, a))
            .collect();
        Self { anchors }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchorVertex> {
        self.anchors.iter()
    }

    pub fn get(&self, index: usize) -> Option<&AnchorVertex> {
        self.anchors.get(index)
    }

    /// Look up an anchor by its `V<i>` name
    pub fn by_name(&self, name: &str) -> Option<&AnchorVertex> {
        self.anchors.iter().find(|a| a.name == name)
    }

    pub fn radii(&self) -> impl Iterator<Item = f64> + '_ {
        self.anchors.iter().map(|a| a.radius)
    }

    pub fn angles(&self) -> impl Iterator<Item = f64> + '_ {
        self.anchors.iter().map(|a| a.angle)
    }

    pub fn as_slice(&self) -> &[AnchorVertex] {
        &self.anchors
    }
}

/// Scalars of the extruded layer stack, metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    pub top_thickness: f64,
    pub bottom_thickness: f64,
    /// Total height of the stack
    pub height: f64,
    /// Lattice period of the unit cell
    pub period: f64,
}

impl LayerStack {
    /// Number of trailing entries in every parameter vector
    pub const PARAMETERS: usize = 4;

    /// Read the trailing `[top, bottom, height, period]` entries
    pub fn from_slice(tail: &[f64]) -> Result<Self> {
        match *tail {
            [top_thickness, bottom_thickness, height, period] => Ok(Self {
                top_thickness,
                bottom_thickness,
                height,
                period,
            }),
            _ => Err(Error::Dimension {
                expected: Self::PARAMETERS,
                actual: tail.len(),
            }),
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.top_thickness, self.bottom_thickness, self.height, self.period]
    }

    /// Height left between the two cladding layers
    pub fn middle_thickness(&self) -> f64 {
        self.height - self.top_thickness - self.bottom_thickness
    }

    /// Interface positions from the substrate up: `[0, bottom, bottom + middle, height]`
    pub fn interfaces(&self) -> [f64; 4] {
        let middle = self.middle_thickness();
        [
            0.0,
            self.bottom_thickness,
            self.bottom_thickness + middle,
            self.height,
        ]
    }
}

/// An outline and its layer stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub anchors: AnchorSet,
    pub layers: LayerStack,
}

/// A cartesian point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_polar(radius: f64, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x: radius * cos,
            y: radius * sin,
        }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
}
