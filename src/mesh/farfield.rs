use super::element::{Element, Shape};
use super::grid::{Grid, Name};
use crate::error::GeometryError;
use crate::math::Point3;

/// Quads of the box, indices into the eight corners ordered bottom
/// (`z = min`) then top, each counter-clockwise seen from above.
const BOX_FACES: [[usize; 4]; 6] = [
    [0, 1, 2, 3],
    [4, 5, 6, 7],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [1, 2, 6, 5],
    [3, 0, 4, 7],
];

/// Builds the outer boundary of the computational domain around `surface`:
/// its bounding box enlarged by ten times its largest extent on every side.
///
/// The six quads carry the single name `"farfield"`.
///
/// # Errors
///
/// Returns [`GeometryError::Degenerate`] if `surface` has no points.
pub fn create_farfield_box(surface: &Grid) -> Result<Grid, GeometryError> {
    let bb = surface
        .bounding_box()
        .ok_or_else(|| GeometryError::Degenerate("farfield around an empty grid".into()))?;
    let d = bb.extent();
    let max_length = d.x.max(d.y).max(d.z);
    let bb = bb.expanded(10.0 * max_length);
    let (lo, hi) = (bb.min, bb.max);

    let mut farfield = Grid::new(3);
    farfield.names[0] = Name::new(2, "farfield");
    farfield.points = vec![
        Point3::new(lo.x, lo.y, lo.z),
        Point3::new(hi.x, lo.y, lo.z),
        Point3::new(hi.x, hi.y, lo.z),
        Point3::new(lo.x, hi.y, lo.z),
        Point3::new(lo.x, lo.y, hi.z),
        Point3::new(hi.x, lo.y, hi.z),
        Point3::new(hi.x, hi.y, hi.z),
        Point3::new(lo.x, hi.y, hi.z),
    ];
    farfield.elements = BOX_FACES
        .iter()
        .map(|f| Element::new(Shape::Quad, f.to_vec()))
        .collect();
    Ok(farfield)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_around_unit_segment() {
        let mut surface = Grid::new(3);
        surface.points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.5, 0.0)];
        let farfield = create_farfield_box(&surface).unwrap();
        let bb = farfield.bounding_box().unwrap();
        assert_relative_eq!(bb.min, Point3::new(-10.0, -10.0, -10.0));
        assert_relative_eq!(bb.max, Point3::new(11.0, 10.5, 10.0));
        assert_eq!(farfield.elements.len(), 6);
        assert_eq!(farfield.names[0].name, "farfield");
        farfield.check_integrity().unwrap();
    }

    #[test]
    fn every_corner_used_three_times() {
        let mut surface = Grid::new(3);
        surface.points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)];
        let farfield = create_farfield_box(&surface).unwrap();
        let mut uses = [0; 8];
        for e in &farfield.elements {
            for &p in &e.points {
                uses[p] += 1;
            }
        }
        assert_eq!(uses, [3; 8]);
    }

    #[test]
    fn empty_surface_rejected() {
        assert!(create_farfield_box(&Grid::new(3)).is_err());
    }
}
