use std::fmt;

use crate::math::intersect_3d::polygon_center;
use crate::math::{Point3, Vector3};

/// Element shapes, numbered as in the legacy VTK cell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shape {
    Line,
    Triangle,
    Quad,
    Polygon,
    Tetra,
    Hexa,
    Wedge,
    Pyramid,
}

impl Shape {
    pub const ALL: [Self; 8] = [
        Self::Line,
        Self::Triangle,
        Self::Quad,
        Self::Polygon,
        Self::Tetra,
        Self::Hexa,
        Self::Wedge,
        Self::Pyramid,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Line => "Line",
            Self::Triangle => "Triangle",
            Self::Quad => "Quad",
            Self::Polygon => "Polygon",
            Self::Tetra => "Tetra",
            Self::Hexa => "Hexa",
            Self::Wedge => "Wedge",
            Self::Pyramid => "Pyramid",
        }
    }

    /// Topological dimension.
    #[must_use]
    pub const fn dim(self) -> usize {
        match self {
            Self::Line => 1,
            Self::Triangle | Self::Quad | Self::Polygon => 2,
            Self::Tetra | Self::Hexa | Self::Wedge | Self::Pyramid => 3,
        }
    }

    /// Fixed point count, or `None` for polygons.
    #[must_use]
    pub const fn n_points(self) -> Option<usize> {
        match self {
            Self::Line => Some(2),
            Self::Triangle => Some(3),
            Self::Quad | Self::Tetra => Some(4),
            Self::Polygon => None,
            Self::Hexa => Some(8),
            Self::Wedge => Some(6),
            Self::Pyramid => Some(5),
        }
    }

    /// Local point indices of every face, wound so that all normals of a
    /// cell point the same way. Polygons and lines have no fixed table.
    #[must_use]
    pub const fn faces(self) -> &'static [&'static [usize]] {
        match self {
            Self::Line | Self::Polygon => &[],
            Self::Triangle => &[&[0, 1, 2]],
            Self::Quad => &[&[0, 1, 2, 3]],
            Self::Tetra => &[&[0, 1, 2], &[0, 3, 1], &[1, 3, 2], &[2, 3, 0]],
            Self::Wedge => &[
                &[0, 1, 2],
                &[3, 5, 4],
                &[1, 0, 3, 4],
                &[2, 1, 4, 5],
                &[0, 2, 5, 3],
            ],
            Self::Pyramid => &[
                &[0, 1, 2, 3],
                &[1, 0, 4],
                &[2, 1, 4],
                &[3, 2, 4],
                &[0, 3, 4],
            ],
            Self::Hexa => &[
                &[0, 1, 2, 3],
                &[4, 7, 6, 5],
                &[1, 0, 4, 5],
                &[2, 1, 5, 6],
                &[3, 2, 6, 7],
                &[0, 3, 7, 4],
            ],
        }
    }

    #[must_use]
    pub const fn vtk_id(self) -> u8 {
        match self {
            Self::Line => 3,
            Self::Triangle => 5,
            Self::Polygon => 7,
            Self::Quad => 9,
            Self::Tetra => 10,
            Self::Hexa => 12,
            Self::Wedge => 13,
            Self::Pyramid => 14,
        }
    }

    #[must_use]
    pub fn from_vtk_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.vtk_id() == id)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mesh element: a shape, indices into the owning grid's points, and the
/// index of its boundary or zone name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub shape: Shape,
    pub name: usize,
    pub points: Vec<usize>,
}

impl Element {
    /// Creates an element carrying name 0.
    #[must_use]
    pub fn new(shape: Shape, points: Vec<usize>) -> Self {
        Self {
            shape,
            name: 0,
            points,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: usize) -> Self {
        self.name = name;
        self
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.shape.dim()
    }

    /// Returns `true` when some point index appears twice.
    #[must_use]
    pub fn has_repeated_points(&self) -> bool {
        let pts = &self.points;
        (0..pts.len()).any(|i| pts[i + 1..].contains(&pts[i]))
    }

    /// Point indices in ascending order, used to match elements regardless of
    /// their starting vertex or winding.
    #[must_use]
    pub fn sorted_points(&self) -> Vec<usize> {
        let mut pts = self.points.clone();
        pts.sort_unstable();
        pts
    }

    /// Same shape over the same set of points.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        self.shape == other.shape && self.sorted_points() == other.sorted_points()
    }

    /// Signed volume of a 3D element; 0 for lines and faces.
    ///
    /// Point ordering follows the VTK conventions, so a positive volume means
    /// a correctly oriented cell. Wedges and hexahedra use the average of the
    /// two cap areas projected on the cap-to-cap axis.
    ///
    /// # Panics
    ///
    /// Panics if a point index is out of range for `points`.
    #[must_use]
    pub fn volume(&self, points: &[Point3]) -> f64 {
        let p = |k: usize| points[self.points[k]];
        match self.shape {
            Shape::Line | Shape::Triangle | Shape::Quad | Shape::Polygon => 0.0,
            Shape::Tetra => {
                let n = (p(1) - p(0)).cross(&(p(2) - p(1)));
                n.dot(&(p(3) - p(1))) / 6.0
            }
            Shape::Pyramid => {
                let n = (p(2) - p(0)).cross(&(p(3) - p(1)));
                (p(4) - p(0)).dot(&n) / 12.0 + (p(4) - p(1)).dot(&n) / 12.0
            }
            Shape::Wedge => {
                let bottom = [p(0), p(1), p(2)];
                let top = [p(3), p(4), p(5)];
                let axis = polygon_center(&bottom) - polygon_center(&top);
                let n1: Vector3 = (p(1) - p(0)).cross(&(p(2) - p(1))) / 2.0;
                let n2: Vector3 = (p(4) - p(3)).cross(&(p(5) - p(4))) / 2.0;
                (axis.dot(&n1) + axis.dot(&n2)) / 2.0
            }
            Shape::Hexa => {
                let bottom = [p(0), p(1), p(2), p(3)];
                let top = [p(4), p(5), p(6), p(7)];
                let axis = polygon_center(&top) - polygon_center(&bottom);
                let n1: Vector3 = (p(2) - p(0)).cross(&(p(3) - p(1))) / 2.0;
                let n2: Vector3 = (p(6) - p(4)).cross(&(p(7) - p(5))) / 2.0;
                (axis.dot(&n1) + axis.dot(&n2)) / 2.0
            }
        }
    }
}
