use super::{Point3, Vector3};

/// Relationship of a segment `start + s * edge` with a face plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentPlaneRelation {
    /// The segment crosses the plane. `scale` is in `[-1, 0]` and the
    /// crossing is `start - edge * scale`.
    Crossing { point: Point3, scale: f64 },
    /// The segment is parallel to the plane within floating tolerance.
    Coplanar,
    /// The supporting line crosses the plane outside the segment.
    Outside,
}

/// Normal of a planar polygon, not normalized.
///
/// Triangles use `(p1 - p0) x (p2 - p1)`, quads the cross product of their
/// diagonals. Larger polygons use Newell's method.
#[must_use]
pub fn polygon_normal(polygon: &[Point3]) -> Vector3 {
    match polygon {
        [p0, p1, p2] => (p1 - p0).cross(&(p2 - p1)),
        [p0, p1, p2, p3] => (p2 - p0).cross(&(p3 - p1)),
        _ => {
            let mut n = Vector3::zeros();
            for (k, a) in polygon.iter().enumerate() {
                let b = polygon[(k + 1) % polygon.len()];
                n.x += (a.y - b.y) * (a.z + b.z);
                n.y += (a.z - b.z) * (a.x + b.x);
                n.z += (a.x - b.x) * (a.y + b.y);
            }
            n
        }
    }
}

/// Center of a polygon.
///
/// Triangles use the vertex average. Larger polygons weight each edge
/// midpoint by the edge length, which keeps the center stable on
/// non-uniform quads.
#[must_use]
pub fn polygon_center(polygon: &[Point3]) -> Point3 {
    if polygon.len() <= 3 {
        return vertex_average(polygon);
    }
    let mut sum = Vector3::zeros();
    let mut total = 0.0;
    for (k, a) in polygon.iter().enumerate() {
        let b = polygon[(k + 1) % polygon.len()];
        let len = (b - a).norm();
        sum += (a.coords + b.coords) * (0.5 * len);
        total += len;
    }
    if total > 0.0 {
        Point3::from(sum / total)
    } else {
        vertex_average(polygon)
    }
}

#[allow(clippy::cast_precision_loss)]
fn vertex_average(polygon: &[Point3]) -> Point3 {
    if polygon.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3 = polygon.iter().map(|p| p.coords).sum();
    Point3::from(sum / polygon.len() as f64)
}

/// Intersects the segment from `start` to `start + edge` with the plane
/// through `center` with normal `normal`.
///
/// A pair with `|edge . normal|` below `f64::EPSILON * |edge| * |normal|` is
/// reported as [`Coplanar`](SegmentPlaneRelation::Coplanar).
#[must_use]
pub fn segment_plane_intersect(
    start: &Point3,
    edge: &Vector3,
    center: &Point3,
    normal: &Vector3,
) -> SegmentPlaneRelation {
    let denom = edge.dot(normal);
    if denom.abs() <= f64::EPSILON * edge.norm() * normal.norm() {
        return SegmentPlaneRelation::Coplanar;
    }
    let scale = (start - center).dot(normal) / denom;
    if !(-1.0..=0.0).contains(&scale) {
        return SegmentPlaneRelation::Outside;
    }
    SegmentPlaneRelation::Crossing {
        point: start - edge * scale,
        scale,
    }
}

/// Returns `true` when `point`, assumed on the polygon's plane, lies strictly
/// inside the polygon. Points on an edge or vertex are outside.
///
/// `normal` must follow the polygon winding, as returned by
/// [`polygon_normal`].
#[must_use]
pub fn point_strictly_inside(point: &Point3, polygon: &[Point3], normal: &Vector3) -> bool {
    let n = polygon.len();
    (0..n).all(|k| {
        let a = polygon[k];
        let b = polygon[(k + 1) % n];
        (b - a).cross(&(point - b)).dot(normal) > 0.0
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn v(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3::new(x, y, z)
    }

    fn unit_tri() -> [Point3; 3] {
        [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0)]
    }

    #[test]
    fn triangle_normal_follows_winding() {
        let n = polygon_normal(&unit_tri());
        assert_relative_eq!(n, v(0.0, 0.0, 1.0));
        let [a, b, c] = unit_tri();
        assert_relative_eq!(polygon_normal(&[a, c, b]), v(0.0, 0.0, -1.0));
    }

    #[test]
    fn quad_normal_from_diagonals() {
        let quad = [p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 1.0, 0.0), p(0.0, 1.0, 0.0)];
        // |d1 x d2| is twice the quad area.
        assert_relative_eq!(polygon_normal(&quad), v(0.0, 0.0, 4.0));
        assert_relative_eq!(polygon_center(&quad), p(1.0, 0.5, 0.0));
    }

    #[test]
    fn segment_crosses_plane() {
        let r = segment_plane_intersect(
            &p(0.2, 0.2, -1.0),
            &v(0.0, 0.0, 2.0),
            &p(0.0, 0.0, 0.0),
            &v(0.0, 0.0, 1.0),
        );
        match r {
            SegmentPlaneRelation::Crossing { point, scale } => {
                assert_relative_eq!(scale, -0.5);
                assert_relative_eq!(point, p(0.2, 0.2, 0.0));
            }
            other => panic!("expected Crossing, got {other:?}"),
        }
    }

    #[test]
    fn short_segment_is_outside() {
        let r = segment_plane_intersect(
            &p(0.2, 0.2, -1.0),
            &v(0.0, 0.0, 0.5),
            &p(0.0, 0.0, 0.0),
            &v(0.0, 0.0, 1.0),
        );
        assert_eq!(r, SegmentPlaneRelation::Outside);
    }

    #[test]
    fn parallel_segment_is_coplanar() {
        let r = segment_plane_intersect(
            &p(0.2, 0.2, 0.0),
            &v(1.0, 0.0, 0.0),
            &p(0.0, 0.0, 0.0),
            &v(0.0, 0.0, 1.0),
        );
        assert_eq!(r, SegmentPlaneRelation::Coplanar);
    }

    #[test]
    fn strict_containment_excludes_boundary() {
        let tri = unit_tri();
        let n = polygon_normal(&tri);
        assert!(point_strictly_inside(&p(0.2, 0.2, 0.0), &tri, &n));
        assert!(!point_strictly_inside(&p(0.5, 0.5, 0.0), &tri, &n));
        assert!(!point_strictly_inside(&p(0.0, 0.0, 0.0), &tri, &n));
        assert!(!point_strictly_inside(&p(1.0, 1.0, 0.0), &tri, &n));
    }
}
