use tracing::{debug, info};

use super::collapse::{collapse, Collapsed};
use super::element::Element;
use crate::error::MeshError;
use crate::math::{Aabb, Point3};

/// A boundary or zone name, tagged with the dimension of the elements that
/// carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub dim: usize,
    pub name: String,
}

impl Name {
    #[must_use]
    pub fn new(dim: usize, name: impl Into<String>) -> Self {
        Self {
            dim,
            name: name.into(),
        }
    }
}

/// Unstructured grid: owns the point array, elements refer to points and
/// names by index.
///
/// A fresh grid carries one name, `"default"`, at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub points: Vec<Point3>,
    pub elements: Vec<Element>,
    pub names: Vec<Name>,
    pub dim: usize,
}

impl Grid {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            points: Vec::new(),
            elements: Vec::new(),
            names: vec![Name::new(dim, "default")],
            dim,
        }
    }

    /// Appends a name and returns its index.
    pub fn add_name(&mut self, dim: usize, name: impl Into<String>) -> usize {
        self.names.push(Name::new(dim, name));
        self.names.len() - 1
    }

    /// Index of the first name equal to `name`.
    #[must_use]
    pub fn find_name(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.name == name)
    }

    /// Welds points whose coordinates differ by at most `tol` on every axis
    /// and renumbers the elements. Returns the number of removed points.
    ///
    /// Points are sorted by `x + y + z`, so only neighbours within `3 * tol`
    /// of that key are compared. The first point of a cluster survives.
    pub fn merge_points(&mut self, tol: f64) -> usize {
        let n = self.points.len();
        let mut order: Vec<(f64, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (p.x + p.y + p.z, i))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut merged_into: Vec<usize> = (0..n).collect();
        for (a, &(sa, i)) in order.iter().enumerate() {
            if merged_into[i] != i {
                continue;
            }
            for &(sb, j) in &order[a + 1..] {
                if (sa - sb).abs() > 3.0 * tol {
                    break;
                }
                if merged_into[j] != j {
                    continue;
                }
                let d = self.points[i] - self.points[j];
                if d.iter().all(|c| c.abs() <= tol) {
                    merged_into[j] = i;
                }
            }
        }

        let mut new_index = vec![usize::MAX; n];
        let mut kept = Vec::with_capacity(n);
        for i in 0..n {
            if merged_into[i] == i {
                new_index[i] = kept.len();
                kept.push(self.points[i]);
            }
        }
        for i in 0..n {
            if merged_into[i] != i {
                new_index[i] = new_index[merged_into[i]];
            }
        }
        let n_merged = n - kept.len();
        self.points = kept;
        for e in &mut self.elements {
            for p in &mut e.points {
                *p = new_index[*p];
            }
        }
        info!(merged = n_merged, remaining = self.points.len(), "merged points");
        n_merged
    }

    /// Deletes pairs of identical lower-dimensional elements, i.e. faces
    /// shared by two cells. Returns the number of deleted elements.
    pub fn delete_inner_faces(&mut self) -> usize {
        let mut keyed: Vec<(Vec<usize>, usize)> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.dim() < self.dim)
            .map(|(i, e)| (e.sorted_points(), i))
            .collect();
        keyed.sort();

        let mut deleted = vec![false; self.elements.len()];
        for pair in keyed.windows(2) {
            let (i, j) = (pair[0].1, pair[1].1);
            if !deleted[i] && self.elements[i].same(&self.elements[j]) {
                deleted[i] = true;
                deleted[j] = true;
            }
        }

        let n_deleted = deleted.iter().filter(|&&d| d).count();
        let mut k = 0;
        self.elements.retain(|_| {
            let keep = !deleted[k];
            k += 1;
            keep
        });
        info!(deleted = n_deleted, "deleted inner faces");
        n_deleted
    }

    /// Collapses elements with repeated points into smaller shapes.
    ///
    /// Replacements take the place of the collapsed element; extra pieces
    /// from splitting hexahedra are appended. With `split == false` a
    /// collapse that needs more than one output element is an error.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CannotCollapse`] when no collapse rule matches.
    pub fn collapse_elements(&mut self, split: bool) -> Result<usize, MeshError> {
        let mut kept = Vec::with_capacity(self.elements.len());
        let mut appended = Vec::new();
        let mut n_collapsed = 0;
        let mut n_deleted = 0;
        for (i, e) in self.elements.iter().enumerate() {
            match collapse(e, split) {
                Some(Collapsed::Intact) => kept.push(e.clone()),
                Some(Collapsed::Removed) => {
                    n_collapsed += 1;
                    n_deleted += 1;
                }
                Some(Collapsed::Replaced(mut pieces)) => {
                    n_collapsed += 1;
                    let rest = pieces.split_off(1);
                    kept.extend(pieces);
                    appended.extend(rest);
                }
                None => {
                    return Err(MeshError::CannotCollapse {
                        element: i,
                        shape: e.shape,
                    })
                }
            }
        }
        let n_created = appended.len();
        kept.extend(appended);
        self.elements = kept;
        info!(
            collapsed = n_collapsed,
            created = n_created,
            deleted = n_deleted,
            "collapsed elements"
        );
        Ok(n_collapsed)
    }

    /// Appends `other`, shifting its point and name indices.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DimensionMismatch`] when the dimensions differ.
    pub fn add_grid(&mut self, other: &Self) -> Result<(), MeshError> {
        if self.dim != other.dim {
            return Err(MeshError::DimensionMismatch {
                left: self.dim,
                right: other.dim,
            });
        }
        let point_offset = self.points.len();
        let name_offset = self.names.len();
        self.points.extend_from_slice(&other.points);
        self.names.extend_from_slice(&other.names);
        self.elements.extend(other.elements.iter().map(|e| Element {
            shape: e.shape,
            name: e.name + name_offset,
            points: e.points.iter().map(|p| p + point_offset).collect(),
        }));
        Ok(())
    }

    /// Bounding box of all points, `None` for an empty grid.
    #[must_use]
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(&self.points)
    }

    /// Multiplies every coordinate by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for p in &mut self.points {
            p.coords *= factor;
        }
    }

    /// Extracts the listed elements into a new grid holding only the points
    /// they use, renumbered in first-use order. Names are carried over.
    ///
    /// # Panics
    ///
    /// Panics if an index in `elements` is out of range.
    #[must_use]
    pub fn grid_from_element_index(&self, elements: &[usize]) -> Self {
        let mut grid = Self {
            points: Vec::new(),
            elements: Vec::with_capacity(elements.len()),
            names: self.names.clone(),
            dim: self.dim,
        };
        let mut index = vec![usize::MAX; self.points.len()];
        for &ei in elements {
            let e = &self.elements[ei];
            let points = e
                .points
                .iter()
                .map(|&p| {
                    if index[p] == usize::MAX {
                        index[p] = grid.points.len();
                        grid.points.push(self.points[p]);
                    }
                    index[p]
                })
                .collect();
            grid.elements.push(Element {
                shape: e.shape,
                name: e.name,
                points,
            });
        }
        grid
    }

    /// Drops names no element refers to and renumbers the rest.
    pub fn delete_empty_names(&mut self) {
        let mut used = vec![false; self.names.len()];
        for e in &self.elements {
            if let Some(u) = used.get_mut(e.name) {
                *u = true;
            }
        }
        let mut map = vec![usize::MAX; self.names.len()];
        let mut names = Vec::new();
        for (i, name) in self.names.drain(..).enumerate() {
            if used[i] {
                map[i] = names.len();
                names.push(name);
            }
        }
        self.names = names;
        for e in &mut self.elements {
            if let Some(&m) = map.get(e.name) {
                e.name = m;
            }
        }
        debug!(names = self.names.len(), "deleted empty names");
    }

    /// Checks the grid dimension, element point counts, and point and name
    /// references.
    ///
    /// # Errors
    ///
    /// Returns the first [`MeshError`] found.
    pub fn check_integrity(&self) -> Result<(), MeshError> {
        if !(2..=3).contains(&self.dim) {
            return Err(MeshError::InvalidDimension(self.dim));
        }
        let n_points = self.points.len();
        for (i, e) in self.elements.iter().enumerate() {
            if let Some(expected) = e.shape.n_points() {
                if expected != e.points.len() {
                    return Err(MeshError::WrongPointCount {
                        element: i,
                        shape: e.shape,
                        expected,
                        found: e.points.len(),
                    });
                }
            }
            if e.name >= self.names.len() {
                return Err(MeshError::NameOutOfRange {
                    element: i,
                    name: e.name,
                    n_names: self.names.len(),
                });
            }
            if let Some(&p) = e.points.iter().find(|&&p| p >= n_points) {
                return Err(MeshError::PointOutOfRange {
                    element: i,
                    point: p,
                    n_points,
                });
            }
        }
        if let Some(name) = self.names.iter().find(|n| !(1..=3).contains(&n.dim)) {
            return Err(MeshError::InvalidDimension(name.dim));
        }
        Ok(())
    }
}
