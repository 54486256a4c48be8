use tracing::debug;

use super::element::{Element, Shape};
use super::grid::Grid;
use crate::error::MeshError;
use crate::math::intersect_3d::polygon_normal;
use crate::math::{opening_angle, Point3, Vector3};

/// Smallest and largest of a set of angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl Default for AngleRange {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl AngleRange {
    /// `true` until an angle has been included.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn include(&mut self, degrees: f64) {
        self.min = self.min.min(degrees);
        self.max = self.max.max(degrees);
    }

    pub fn merge(&mut self, other: &Self) {
        if !other.is_empty() {
            self.include(other.min);
            self.include(other.max);
        }
    }

    /// `true` when some angle lies within `threshold` degrees of 0 or 180.
    #[must_use]
    pub fn is_near_flat(&self, threshold: f64) -> bool {
        !self.is_empty() && (self.min < threshold || self.max > 180.0 - threshold)
    }
}

/// Corner angles of the faces of one element and, for cells, the interior
/// angles between faces that share an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElementQuality {
    pub face_angle: AngleRange,
    pub dihedral_angle: AngleRange,
}

impl ElementQuality {
    /// Measures `element` over `points`. Lines have no angles.
    ///
    /// # Panics
    ///
    /// Panics if a point index is out of range for `points`.
    #[must_use]
    pub fn of(element: &Element, points: &[Point3]) -> Self {
        let faces: Vec<Vec<Point3>> = local_faces(element)
            .iter()
            .map(|face| face.iter().map(|&k| points[element.points[k]]).collect())
            .collect();

        let mut quality = Self::default();
        for corners in &faces {
            let n = corners.len();
            for k in 0..n {
                let prev = &corners[(k + n - 1) % n];
                let next = &corners[(k + 1) % n];
                quality
                    .face_angle
                    .include(opening_angle(&corners[k], prev, next).to_degrees());
            }
        }

        if element.dim() == 3 {
            let shared = element.shape.faces();
            let normals: Vec<Vector3> = faces.iter().map(|c| polygon_normal(c)).collect();
            for i in 0..shared.len() {
                for j in i + 1..shared.len() {
                    let common = shared[i].iter().filter(|&k| shared[j].contains(k)).count();
                    if common != 2 {
                        continue;
                    }
                    quality
                        .dihedral_angle
                        .include(interior_angle(&normals[i], &normals[j]));
                }
            }
        }
        quality
    }

    /// `true` when a face or dihedral angle is within `threshold` degrees of
    /// collapsing.
    #[must_use]
    pub fn is_bad(&self, threshold: f64) -> bool {
        self.face_angle.is_near_flat(threshold) || self.dihedral_angle.is_near_flat(threshold)
    }
}

fn local_faces(element: &Element) -> Vec<Vec<usize>> {
    if element.shape == Shape::Polygon {
        return vec![(0..element.points.len()).collect()];
    }
    element.shape.faces().iter().map(|f| f.to_vec()).collect()
}

/// Angle inside the cell between two faces with consistently wound normals.
/// A degenerate face counts as fully folded.
fn interior_angle(a: &Vector3, b: &Vector3) -> f64 {
    match (a.try_normalize(0.0), b.try_normalize(0.0)) {
        (Some(u), Some(v)) => 180.0 - u.dot(&v).clamp(-1.0, 1.0).acos().to_degrees(),
        _ => 0.0,
    }
}

/// Angle ranges over a whole grid and the elements that fail the threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshQuality {
    pub face_angle: AngleRange,
    pub dihedral_angle: AngleRange,
    pub bad_elements: Vec<usize>,
}

/// Measures element angles across a grid.
pub struct QualityCheck {
    threshold: f64,
}

impl Default for QualityCheck {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl QualityCheck {
    /// Angle threshold in degrees used by [`Default`].
    pub const DEFAULT_THRESHOLD: f64 = 1.0;

    /// Creates a check that flags elements with an angle closer than
    /// `threshold` degrees to 0 or 180.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Executes the check.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid fails [`Grid::check_integrity`].
    pub fn execute(&self, grid: &Grid) -> Result<MeshQuality, MeshError> {
        grid.check_integrity()?;
        let mut result = MeshQuality::default();
        for (i, element) in grid.elements.iter().enumerate() {
            let quality = ElementQuality::of(element, &grid.points);
            result.face_angle.merge(&quality.face_angle);
            result.dihedral_angle.merge(&quality.dihedral_angle);
            if quality.is_bad(self.threshold) {
                result.bad_elements.push(i);
            }
        }
        debug!(
            elements = grid.elements.len(),
            bad = result.bad_elements.len(),
            threshold = self.threshold,
            "measured element angles"
        );
        Ok(result)
    }
}
