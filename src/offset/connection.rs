use tracing::{debug, warn};

use super::params::OffsetParams;
use crate::error::{OffsetError, Result};
use crate::math::intersect_3d::polygon_normal;
use crate::math::{opening_angle, Point3, Vector3, TOLERANCE};
use crate::mesh::{Grid, Shape};

const MAX_REFLECTIONS: usize = 10;
const REFLECTION_NUDGE: f64 = 1e-3;

/// Offset state of one surface point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointConnection {
    /// Neighbor indices and their relaxation weights, summing to 1.
    pub neighbors: Vec<(usize, f64)>,
    /// Incident surface elements.
    pub elements: Vec<usize>,
    /// Unit growth direction.
    pub direction: Vector3,
    pub offset: Vector3,
    /// Offset assigned at construction.
    pub target: Vector3,
    pub convex: bool,
    /// Smallest projection of the direction on an incident face normal; 1 on
    /// planar patches.
    pub severity: f64,
    pub stretch: f64,
    /// Admissible normal component of the offset is
    /// `[min * damping, max]`.
    pub min: f64,
    pub max: f64,
    pub damping: f64,
    /// Largest allowed angle between the offset and the direction.
    pub skew_ceiling: f64,
    /// The normal could not be made valid; the point does not move.
    pub bad: bool,
    /// Zeroed during repair; the point never moves again.
    pub radical: bool,
}

impl PointConnection {
    fn isolated(skew_ceiling: f64) -> Self {
        Self {
            neighbors: Vec::new(),
            elements: Vec::new(),
            direction: Vector3::zeros(),
            offset: Vector3::zeros(),
            target: Vector3::zeros(),
            convex: false,
            severity: 1.0,
            stretch: 1.0,
            min: 0.0,
            max: 0.0,
            damping: 1.0,
            skew_ceiling,
            bad: true,
            radical: false,
        }
    }

    /// Bad and radical points are excluded from all smoothing.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.bad || self.radical
    }

    /// Component of the offset along the direction.
    #[must_use]
    pub fn normal_component(&self) -> f64 {
        self.offset.dot(&self.direction)
    }

    #[must_use]
    pub fn lateral(&self) -> Vector3 {
        self.offset - self.direction * self.normal_component()
    }

    /// Current lower bound on the normal component.
    #[must_use]
    pub fn lower_bound(&self) -> f64 {
        self.min * self.damping
    }

    fn zero_out(&mut self) {
        self.direction = Vector3::zeros();
        self.offset = Vector3::zeros();
        self.target = Vector3::zeros();
        self.min = 0.0;
        self.max = 0.0;
    }
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    elements: Vec<usize>,
    normal: Vector3,
    bisector: Vector3,
    neighbors: Vec<(usize, f64)>,
}

impl Accumulator {
    fn add_weight(&mut self, neighbor: usize, weight: f64) {
        match self.neighbors.iter_mut().find(|(j, _)| *j == neighbor) {
            Some((_, w)) => *w += weight,
            None => self.neighbors.push((neighbor, weight)),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn normalized(mut neighbors: Vec<(usize, f64)>) -> Vec<(usize, f64)> {
    neighbors.sort_by_key(|(j, _)| *j);
    let total: f64 = neighbors.iter().map(|(_, w)| w).sum();
    let n = neighbors.len() as f64;
    for (_, w) in &mut neighbors {
        *w = if total > 0.0 { *w / total } else { 1.0 / n };
    }
    neighbors
}

/// Connectivity of a surface with per-point offset state.
///
/// Built once per layer from a frozen surface and mutated in place by
/// smoothing and repair.
#[derive(Debug, Clone)]
pub struct ConnectionGraph {
    pub points: Vec<PointConnection>,
    /// Unit element normals, pointing in the growth direction.
    pub face_normals: Vec<Vector3>,
    /// Requested layer thickness, signed.
    pub thickness: f64,
}

impl ConnectionGraph {
    /// Builds the graph for `surface`.
    ///
    /// Growth directions are the opening-angle-weighted face normals. A
    /// direction that points behind an incident face is reflected off that
    /// face; if that fails the point is marked bad and stays in place.
    ///
    /// # Errors
    ///
    /// - [`OffsetError::InvalidParams`] if `params` fail validation.
    /// - [`MeshError`](crate::error::MeshError) if the surface references
    ///   missing points or names.
    /// - [`OffsetError::NonTriangleElement`] for any element that is not a
    ///   triangle.
    /// - [`OffsetError::DegenerateElement`] for a triangle without area.
    /// - [`OffsetError::ZeroNormal`] when the face normals around a point
    ///   cancel out.
    pub fn build(surface: &Grid, params: &OffsetParams) -> Result<Self> {
        params.validate()?;
        surface.check_integrity()?;
        let pts = &surface.points;
        let sign = params.thickness.signum();

        let mut face_normals = Vec::with_capacity(surface.elements.len());
        let mut acc = vec![Accumulator::default(); pts.len()];
        for (ei, e) in surface.elements.iter().enumerate() {
            let tri: [usize; 3] = match (e.shape, e.points.as_slice()) {
                (Shape::Triangle, &[a, b, c]) => [a, b, c],
                _ => {
                    return Err(OffsetError::NonTriangleElement {
                        element: ei,
                        shape: e.shape,
                    }
                    .into())
                }
            };
            let corners = tri.map(|k| pts[k]);
            let raw = polygon_normal(&corners);
            let longest = (0..3)
                .map(|k| (corners[(k + 1) % 3] - corners[k]).norm_squared())
                .fold(0.0, f64::max);
            if raw.norm() <= TOLERANCE * longest || longest == 0.0 {
                return Err(OffsetError::DegenerateElement { element: ei }.into());
            }
            let normal = raw.normalize() * sign;
            face_normals.push(normal);

            for k in 0..3 {
                let (i, next, prev) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
                let theta = opening_angle(&pts[i], &pts[next], &pts[prev]);
                let to_next = pts[next] - pts[i];
                let to_prev = pts[prev] - pts[i];
                let a = &mut acc[i];
                a.elements.push(ei);
                a.normal += normal * theta;
                let unit = |v: &Vector3| v.try_normalize(0.0).unwrap_or_else(Vector3::zeros);
                if let Some(b) = (unit(&to_next) + unit(&to_prev)).try_normalize(0.0) {
                    a.bisector += b * theta;
                }
                a.add_weight(next, params.weights.weight(theta, to_next.norm()));
                a.add_weight(prev, params.weights.weight(theta, to_prev.norm()));
            }
        }

        let mut points = Vec::with_capacity(pts.len());
        let mut n_isolated = 0;
        let mut n_bad = 0;
        for (i, a) in acc.into_iter().enumerate() {
            if a.elements.is_empty() {
                n_isolated += 1;
                points.push(PointConnection::isolated(params.max_skew_angle));
                continue;
            }
            let raw = a
                .normal
                .try_normalize(TOLERANCE)
                .ok_or(OffsetError::ZeroNormal { point: i })?;
            let convex = is_convex(&a.bisector, &raw);
            let mut pc = PointConnection {
                neighbors: normalized(a.neighbors),
                elements: a.elements,
                direction: raw,
                offset: Vector3::zeros(),
                target: Vector3::zeros(),
                convex,
                severity: 1.0,
                stretch: 1.0,
                min: 0.0,
                max: 0.0,
                damping: 1.0,
                skew_ceiling: params.max_skew_angle,
                bad: false,
                radical: false,
            };
            match correct_direction(raw, &pc.elements, &face_normals) {
                Some(direction) => {
                    let severity = pc
                        .elements
                        .iter()
                        .map(|&e| direction.dot(&face_normals[e]))
                        .fold(1.0, f64::min);
                    let stretch = (1.0 / severity).min(params.max_stretch);
                    let m = params.thickness.abs() * stretch;
                    let (lo, hi) = if convex {
                        params.convex_bounds
                    } else {
                        params.concave_bounds
                    };
                    pc.direction = direction;
                    pc.severity = severity;
                    pc.stretch = stretch;
                    pc.target = direction * m;
                    pc.offset = pc.target;
                    pc.min = lo * m;
                    pc.max = hi * m;
                }
                None => {
                    warn!(point = i, "normal could not be corrected, point stays in place");
                    n_bad += 1;
                    pc.zero_out();
                    pc.bad = true;
                }
            }
            points.push(pc);
        }
        debug!(
            points = points.len(),
            faces = face_normals.len(),
            isolated = n_isolated,
            bad = n_bad,
            "built connection graph"
        );
        Ok(Self {
            points,
            face_normals,
            thickness: params.thickness,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns `true` when `v` projects positively on every face incident
    /// to point `i`.
    #[must_use]
    pub fn admits(&self, i: usize, v: &Vector3) -> bool {
        self.points[i]
            .elements
            .iter()
            .all(|&e| v.dot(&self.face_normals[e]) > 0.0)
    }

    /// Projects a candidate offset for point `i` onto its constraints.
    ///
    /// The normal component is clamped to `[min * damping, max]` and the
    /// lateral part to `tan(skew_ceiling)` times the normal component.
    /// Returns `None` when the result points behind an incident face.
    #[must_use]
    pub fn constrain(&self, i: usize, candidate: &Vector3) -> Option<Vector3> {
        let pc = &self.points[i];
        let d = pc.direction;
        let along = candidate.dot(&d);
        let nc = along.clamp(pc.lower_bound(), pc.max);
        let mut lateral = candidate - d * along;
        let cap = pc.skew_ceiling.tan() * nc;
        let len = lateral.norm();
        if len > cap {
            lateral *= cap / len;
        }
        let out = d * nc + lateral;
        self.admits(i, &out).then_some(out)
    }

    /// Rescales every offset onto the current direction, keeping its length.
    pub fn realign_offsets(&mut self) {
        for pc in self.points.iter_mut().filter(|pc| !pc.is_frozen()) {
            pc.offset = pc.direction * pc.offset.norm();
        }
    }

    /// Zeroes point `i` for good.
    pub fn make_radical(&mut self, i: usize) {
        let pc = &mut self.points[i];
        pc.zero_out();
        pc.radical = true;
    }

    /// Surface points moved by their offsets.
    #[must_use]
    pub fn offset_points(&self, surface: &[Point3]) -> Vec<Point3> {
        surface
            .iter()
            .zip(&self.points)
            .map(|(p, pc)| p + pc.offset)
            .collect()
    }

    #[must_use]
    pub fn count_bad(&self) -> usize {
        self.points.iter().filter(|pc| pc.bad).count()
    }

    #[must_use]
    pub fn count_radical(&self) -> usize {
        self.points.iter().filter(|pc| pc.radical).count()
    }
}

/// Reflects `n` off incident faces it points behind, at most
/// [`MAX_REFLECTIONS`] times.
/// Convex when the angle-weighted edge bisectors point away from the unit
/// normal, comparing the bisector sum as a unit vector.
fn is_convex(bisector: &Vector3, normal: &Vector3) -> bool {
    bisector
        .try_normalize(TOLERANCE)
        .is_some_and(|b| b.dot(normal) < -TOLERANCE)
}

fn correct_direction(mut n: Vector3, elements: &[usize], normals: &[Vector3]) -> Option<Vector3> {
    for _ in 0..MAX_REFLECTIONS {
        let Some(f) = elements.iter().map(|&e| normals[e]).find(|f| n.dot(f) <= 0.0) else {
            return Some(n);
        };
        let d = n.dot(&f);
        n = (n - f * (2.0 * d - REFLECTION_NUDGE)).try_normalize(0.0)?;
    }
    elements
        .iter()
        .all(|&e| n.dot(&normals[e]) > 0.0)
        .then_some(n)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::mesh::Element;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// Closed unit cube with outward-facing triangles. Point `k` sits at
    /// `(k & 1, (k >> 1) & 1, (k >> 2) & 1)`.
    pub(crate) fn cube() -> Grid {
        let mut g = Grid::new(3);
        for k in 0..8u8 {
            g.points.push(p(f64::from(k & 1), f64::from((k >> 1) & 1), f64::from((k >> 2) & 1)));
        }
        let tris = [
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
        ];
        g.elements = tris
            .iter()
            .map(|t| Element::new(Shape::Triangle, t.to_vec()))
            .collect();
        g
    }

    /// Flat `n x n` grid of unit cells in the `z = 0` plane, normals `+z`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn flat_patch(n: usize) -> Grid {
        let mut g = Grid::new(3);
        for j in 0..=n {
            for i in 0..=n {
                g.points.push(p(i as f64, j as f64, 0.0));
            }
        }
        let id = |i: usize, j: usize| j * (n + 1) + i;
        for j in 0..n {
            for i in 0..n {
                g.elements.push(Element::new(
                    Shape::Triangle,
                    vec![id(i, j), id(i + 1, j), id(i + 1, j + 1)],
                ));
                g.elements.push(Element::new(
                    Shape::Triangle,
                    vec![id(i, j), id(i + 1, j + 1), id(i, j + 1)],
                ));
            }
        }
        g
    }

    #[test]
    fn cube_corners_point_diagonally() {
        let g = ConnectionGraph::build(&cube(), &OffsetParams::new(0.1)).unwrap();
        assert_eq!(g.len(), 8);
        let s = 1.0 / 3f64.sqrt();
        assert_relative_eq!(g.points[0].direction, Vector3::new(-s, -s, -s), epsilon = 1e-12);
        assert_relative_eq!(g.points[7].direction, Vector3::new(s, s, s), epsilon = 1e-12);
        for pc in &g.points {
            assert!(pc.convex);
            assert_relative_eq!(pc.severity, s, epsilon = 1e-12);
            assert_relative_eq!(pc.stretch, 3f64.sqrt(), epsilon = 1e-12);
            assert_relative_eq!(pc.offset.norm(), 0.1 * 3f64.sqrt(), epsilon = 1e-12);
            assert_relative_eq!(pc.min, 0.5 * 0.1 * 3f64.sqrt(), epsilon = 1e-12);
        }
    }

    #[test]
    fn negative_thickness_grows_inward() {
        let g = ConnectionGraph::build(&cube(), &OffsetParams::new(-0.1)).unwrap();
        assert!(g.points[0].direction.x > 0.0);
        assert!(g.points.iter().all(|pc| !pc.convex));
        assert_relative_eq!(g.points[0].offset, Vector3::repeat(0.1), epsilon = 1e-12);
    }

    #[test]
    fn weights_sum_to_one() {
        let g = ConnectionGraph::build(&flat_patch(3), &OffsetParams::new(0.1)).unwrap();
        for pc in &g.points {
            let sum: f64 = pc.neighbors.iter().map(|(_, w)| w).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
            assert!(pc.neighbors.iter().all(|(_, w)| *w >= 0.0));
        }
        // interior point of a 3x3 patch has six neighbors
        assert_eq!(g.points[5].neighbors.len(), 6);
    }

    #[test]
    fn flat_patch_is_planar() {
        let g = ConnectionGraph::build(&flat_patch(2), &OffsetParams::new(0.5)).unwrap();
        for pc in &g.points {
            assert_relative_eq!(pc.direction, Vector3::z(), epsilon = 1e-12);
            assert_relative_eq!(pc.severity, 1.0, epsilon = 1e-12);
            assert_relative_eq!(pc.max, 0.5, epsilon = 1e-12);
            assert_relative_eq!(pc.min, 0.4, epsilon = 1e-12);
            assert!(!pc.convex);
        }
    }

    #[test]
    fn quads_are_rejected() {
        let mut s = flat_patch(1);
        s.elements = vec![Element::new(Shape::Quad, vec![0, 1, 3, 2])];
        let err = ConnectionGraph::build(&s, &OffsetParams::new(0.1)).unwrap_err();
        assert!(matches!(
            err,
            crate::UnstrucError::Offset(OffsetError::NonTriangleElement { element: 0, .. })
        ));
    }

    #[test]
    fn sliver_is_degenerate() {
        let mut s = Grid::new(3);
        s.points = vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0)];
        s.elements = vec![Element::new(Shape::Triangle, vec![0, 1, 2])];
        let err = ConnectionGraph::build(&s, &OffsetParams::new(0.1)).unwrap_err();
        assert!(matches!(
            err,
            crate::UnstrucError::Offset(OffsetError::DegenerateElement { element: 0 })
        ));
    }

    #[test]
    fn opposed_faces_give_zero_normal() {
        let mut s = Grid::new(3);
        s.points = vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)];
        s.elements = vec![
            Element::new(Shape::Triangle, vec![0, 1, 2]),
            Element::new(Shape::Triangle, vec![0, 2, 1]),
        ];
        let err = ConnectionGraph::build(&s, &OffsetParams::new(0.1)).unwrap_err();
        assert!(matches!(
            err,
            crate::UnstrucError::Offset(OffsetError::ZeroNormal { point: 0 })
        ));
    }

    #[test]
    fn unused_point_is_isolated() {
        let mut s = flat_patch(1);
        s.points.push(p(5.0, 5.0, 5.0));
        let g = ConnectionGraph::build(&s, &OffsetParams::new(0.1)).unwrap();
        let last = g.points.last().unwrap();
        assert!(last.bad && last.neighbors.is_empty());
        assert_eq!(last.offset, Vector3::zeros());
        assert_eq!(g.count_bad(), 1);
    }

    #[test]
    fn constrain_clamps_skew() {
        let g = ConnectionGraph::build(&flat_patch(1), &OffsetParams::new(1.0)).unwrap();
        let v = g.constrain(0, &Vector3::new(10.0, 0.0, 2.0)).unwrap();
        assert_relative_eq!(v.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(v.x, 60f64.to_radians().tan(), epsilon = 1e-12);
        assert!(g.constrain(0, &Vector3::new(0.0, 0.0, -1.0)).is_some());
    }

    #[test]
    fn fold_is_reflected() {
        // shallow fold; the shared edge keeps a direction valid for both faces
        let mut s = Grid::new(3);
        s.points = vec![
            p(0.0, 0.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(-1.0, 0.0, 0.2),
        ];
        s.elements = vec![
            Element::new(Shape::Triangle, vec![0, 2, 1]),
            Element::new(Shape::Triangle, vec![0, 1, 3]),
        ];
        let g = ConnectionGraph::build(&s, &OffsetParams::new(0.1)).unwrap();
        for i in 0..2 {
            let d = g.points[i].direction;
            assert!(g.admits(i, &d));
        }
    }

    #[test]
    fn convexity_ignores_bisector_length() {
        let n = Vector3::z();
        // the raw dot product, -5e-11, is inside the tolerance
        let shallow = Vector3::new(1e-9, 0.0, -5e-11);
        assert!(is_convex(&shallow, &n));
        assert!(is_convex(&(shallow * 1e6), &n));
        assert!(!is_convex(&-shallow, &n));
        assert!(!is_convex(&Vector3::x(), &n));
        assert!(!is_convex(&Vector3::zeros(), &n));
    }
}
