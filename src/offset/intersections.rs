use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use super::octree::Octree;
use crate::math::intersect_3d::{
    point_strictly_inside, polygon_center, polygon_normal, segment_plane_intersect,
    SegmentPlaneRelation,
};
use crate::math::{Aabb, Point3, Vector3};
use crate::mesh::{Grid, Shape};

const TRIANGLE_EDGES: &[[usize; 2]] = &[[0, 1], [1, 2], [2, 0]];
const TRIANGLE_FACES: &[&[usize]] = &[&[0, 1, 2]];
const QUAD_EDGES: &[[usize; 2]] = &[[0, 1], [1, 2], [2, 3], [3, 0]];
const QUAD_FACES: &[&[usize]] = &[&[0, 1, 2, 3]];
const WEDGE_EDGES: &[[usize; 2]] = &[
    [0, 1],
    [1, 2],
    [2, 0],
    [3, 4],
    [4, 5],
    [5, 3],
    [0, 3],
    [1, 4],
    [2, 5],
];
const WEDGE_FACES: &[&[usize]] = &[&[0, 1, 2], &[3, 4, 5], &[0, 1, 4, 3], &[1, 2, 5, 4], &[2, 0, 3, 5]];
const TETRA_EDGES: &[[usize; 2]] = &[[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];
const TETRA_FACES: &[&[usize]] = &[&[0, 1, 2], &[0, 3, 1], &[1, 3, 2], &[2, 3, 0]];

type LocalTopology = (&'static [[usize; 2]], &'static [&'static [usize]]);

/// Local edges and faces of a shape, or `None` for shapes the detector
/// ignores.
fn local_topology(shape: Shape) -> Option<LocalTopology> {
    match shape {
        Shape::Triangle => Some((TRIANGLE_EDGES, TRIANGLE_FACES)),
        Shape::Quad => Some((QUAD_EDGES, QUAD_FACES)),
        Shape::Wedge => Some((WEDGE_EDGES, WEDGE_FACES)),
        Shape::Tetra => Some((TETRA_EDGES, TETRA_FACES)),
        _ => None,
    }
}

/// Elements and points implicated in intersections, as sorted index lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntersectionSet {
    pub points: Vec<usize>,
    pub elements: Vec<usize>,
}

impl IntersectionSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Edge {
    points: [usize; 2],
    elements: Vec<usize>,
    bounds: Aabb,
}

#[derive(Debug, Clone)]
struct Face {
    /// In winding order.
    points: Vec<usize>,
    elements: Vec<usize>,
    bounds: Aabb,
    normal: Vector3,
    center: Point3,
}

/// Unique edges and faces of a grid, indexed in an octree.
///
/// Edges shared by several elements and quads shared by two wedges are
/// stored once, remembering every element they belong to.
pub struct IntersectionFinder<'a> {
    grid: &'a Grid,
    edges: Vec<Edge>,
    faces: Vec<Face>,
    tree: Octree,
}

impl<'a> IntersectionFinder<'a> {
    /// Derives the edges and faces of `grid` and indexes them.
    #[must_use]
    pub fn new(grid: &'a Grid, capacity: usize, max_depth: usize) -> Self {
        let pts = &grid.points;
        let bounds = |ids: &[usize]| {
            Aabb::from_points(ids.iter().map(|&i| &pts[i])).unwrap_or(Aabb {
                min: Point3::origin(),
                max: Point3::origin(),
            })
        };

        let mut edges: Vec<Edge> = Vec::new();
        let mut faces: Vec<Face> = Vec::new();
        let mut edge_index: HashMap<[usize; 2], usize> = HashMap::new();
        let mut face_index: HashMap<Vec<usize>, usize> = HashMap::new();
        for (ei, e) in grid.elements.iter().enumerate() {
            let Some((local_edges, local_faces)) = local_topology(e.shape) else {
                continue;
            };
            for [a, b] in local_edges {
                let (a, b) = (e.points[*a], e.points[*b]);
                if a == b {
                    continue;
                }
                let key = [a.min(b), a.max(b)];
                let k = *edge_index.entry(key).or_insert_with(|| {
                    edges.push(Edge {
                        points: key,
                        elements: Vec::new(),
                        bounds: bounds(&key),
                    });
                    edges.len() - 1
                });
                edges[k].elements.push(ei);
            }
            for local in local_faces {
                let points: Vec<usize> = local.iter().map(|&k| e.points[k]).collect();
                let mut key = points.clone();
                key.sort_unstable();
                let k = *face_index.entry(key).or_insert_with(|| {
                    let corners: Vec<Point3> = points.iter().map(|&i| pts[i]).collect();
                    faces.push(Face {
                        bounds: bounds(&points),
                        normal: polygon_normal(&corners),
                        center: polygon_center(&corners),
                        points,
                        elements: Vec::new(),
                    });
                    faces.len() - 1
                });
                faces[k].elements.push(ei);
            }
        }

        let mut tree = Octree::new(pts, capacity, max_depth);
        for (i, e) in edges.iter().enumerate() {
            tree.insert_edge(i, &e.bounds);
        }
        for (i, f) in faces.iter().enumerate() {
            tree.insert_face(i, &f.bounds);
        }
        let finder = Self {
            grid,
            edges,
            faces,
            tree,
        };
        debug!(
            edges = finder.edge_count(),
            faces = finder.face_count(),
            nodes = finder.tree.node_count(),
            depth = finder.tree.depth(),
            "indexed edges and faces"
        );
        finder
    }

    /// Crossing of edge `e` with the interior of face `f`, if any.
    fn pierce(&self, e: &Edge, f: &Face) -> Option<Point3> {
        if !e.bounds.overlaps(&f.bounds) {
            return None;
        }
        let pts = &self.grid.points;
        let touches = e
            .points
            .iter()
            .any(|&a| f.points.iter().any(|&b| a == b || pts[a] == pts[b]));
        if touches {
            return None;
        }
        let start = pts[e.points[0]];
        let edge = pts[e.points[1]] - start;
        match segment_plane_intersect(&start, &edge, &f.center, &f.normal) {
            SegmentPlaneRelation::Crossing { point, .. } => {
                let polygon: Vec<Point3> = f.points.iter().map(|&i| pts[i]).collect();
                point_strictly_inside(&point, &polygon, &f.normal).then_some(point)
            }
            SegmentPlaneRelation::Coplanar | SegmentPlaneRelation::Outside => None,
        }
    }

    /// Calls `hit` for every piercing edge/face pair sharing a leaf where
    /// `wanted(edge, face)` holds. A pair in several leaves is reported
    /// once.
    fn for_each_hit<W, H>(&self, wanted: W, mut hit: H)
    where
        W: Fn(usize, usize) -> bool,
        H: FnMut(&Edge, &Face, Point3),
    {
        let mut tested: BTreeSet<(usize, usize)> = BTreeSet::new();
        for leaf in self.tree.leaves() {
            for &ei in &leaf.edges {
                for &fi in &leaf.faces {
                    if !wanted(ei, fi) || !tested.insert((ei, fi)) {
                        continue;
                    }
                    let (e, f) = (&self.edges[ei], &self.faces[fi]);
                    if let Some(x) = self.pierce(e, f) {
                        hit(e, f, x);
                    }
                }
            }
        }
    }

    fn collect(&self, wanted: impl Fn(usize, usize) -> bool) -> IntersectionSet {
        let mut elements = BTreeSet::new();
        self.for_each_hit(wanted, |e, f, _| {
            elements.extend(e.elements.iter().chain(&f.elements).copied());
        });
        let points: BTreeSet<usize> = elements
            .iter()
            .flat_map(|&i| self.grid.elements[i].points.iter().copied())
            .collect();
        IntersectionSet {
            points: points.into_iter().collect(),
            elements: elements.into_iter().collect(),
        }
    }

    /// All intersections in the grid.
    #[must_use]
    pub fn find(&self) -> IntersectionSet {
        let set = self.collect(|_, _| true);
        debug!(elements = set.elements.len(), "full intersection check");
        set
    }

    /// Intersections involving an edge or face of one of `elements`, tested
    /// against the whole grid.
    #[must_use]
    pub fn find_in(&self, elements: &[usize]) -> IntersectionSet {
        let mut selected = vec![false; self.grid.elements.len()];
        for &e in elements {
            if let Some(s) = selected.get_mut(e) {
                *s = true;
            }
        }
        let edge_on: Vec<bool> = self
            .edges
            .iter()
            .map(|e| e.elements.iter().any(|&i| selected[i]))
            .collect();
        let face_on: Vec<bool> = self
            .faces
            .iter()
            .map(|f| f.elements.iter().any(|&i| selected[i]))
            .collect();
        let set = self.collect(|e, f| edge_on[e] || face_on[f]);
        debug!(
            bounded = elements.len(),
            elements = set.elements.len(),
            "bounded intersection check"
        );
        set
    }

    /// For every grid point, the distance to the nearest crossing on an
    /// edge through it that passes `filter`.
    #[must_use]
    pub fn find_nearest(&self, filter: impl Fn(&[usize; 2]) -> bool) -> Vec<Option<f64>> {
        let selected: Vec<bool> = self.edges.iter().map(|e| filter(&e.points)).collect();
        let pts = &self.grid.points;
        let mut nearest: Vec<Option<f64>> = vec![None; pts.len()];
        self.for_each_hit(
            |e, _| selected[e],
            |e, _, x| {
                for &i in &e.points {
                    let d = (x - pts[i]).norm();
                    let slot = &mut nearest[i];
                    *slot = Some(slot.map_or(d, |old| old.min(d)));
                }
            },
        );
        nearest
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::Element;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// Triangle in `z = 0` and a second triangle standing in the `x = y`
    /// plane whose vertical edge crosses it at `(0.5, 0.5)`.
    fn crossing_triangles(dz: f64) -> Grid {
        let mut g = Grid::new(3);
        g.points = vec![
            p(0.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(0.0, 2.0, 0.0),
            p(0.5, 0.5, -1.0 + dz),
            p(0.5, 0.5, 1.0 + dz),
            p(3.0, 3.0, 1.0 + dz),
        ];
        g.elements = vec![
            Element::new(Shape::Triangle, vec![0, 1, 2]),
            Element::new(Shape::Triangle, vec![3, 4, 5]),
        ];
        g
    }

    fn prism_pair() -> Grid {
        // two wedges sharing the lateral quad over the edge (1, 2)
        let mut g = Grid::new(3);
        g.points = vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(0.0, 1.0, 1.0),
            p(1.0, 1.0, 1.0),
        ];
        g.elements = vec![
            Element::new(Shape::Wedge, vec![0, 1, 2, 4, 5, 6]),
            Element::new(Shape::Wedge, vec![1, 3, 2, 5, 7, 6]),
        ];
        g
    }

    #[test]
    fn shared_quad_stored_once() {
        let g = prism_pair();
        let finder = IntersectionFinder::new(&g, 20, 10);
        assert_eq!(finder.face_count(), 2 * 5 - 1);
        assert_eq!(finder.edge_count(), 2 * 9 - 4);
    }

    #[test]
    fn clean_prisms_do_not_intersect() {
        let g = prism_pair();
        assert!(IntersectionFinder::new(&g, 2, 10).find().is_empty());
    }

    #[test]
    fn piercing_segment_found() {
        let g = crossing_triangles(0.0);
        let set = IntersectionFinder::new(&g, 20, 10).find();
        assert_eq!(set.elements, vec![0, 1]);
        assert_eq!(set.points, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn segment_short_of_plane_misses() {
        let g = crossing_triangles(1.5);
        assert!(IntersectionFinder::new(&g, 20, 10).find().is_empty());
    }

    #[test]
    fn shared_coordinates_are_skipped() {
        let mut g = crossing_triangles(0.0);
        g.points[3] = g.points[0];
        g.points[4] = p(0.0, 0.0, 1.0);
        assert!(IntersectionFinder::new(&g, 20, 10).find().is_empty());
    }

    #[test]
    fn bounded_query_sees_outside_partners() {
        let g = crossing_triangles(0.0);
        let finder = IntersectionFinder::new(&g, 1, 10);
        assert_eq!(finder.find_in(&[0]).elements, vec![0, 1]);
        assert_eq!(finder.find_in(&[1]).elements, vec![0, 1]);
        assert!(finder.find_in(&[]).is_empty());
    }

    #[test]
    fn nearest_hit_distance() {
        let g = crossing_triangles(0.0);
        let finder = IntersectionFinder::new(&g, 20, 10);
        let nearest = finder.find_nearest(|e| *e == [3, 4]);
        assert_relative_eq!(nearest[3].unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(nearest[4].unwrap(), 1.0, epsilon = 1e-12);
        assert!(nearest[0].is_none() && nearest[5].is_none());
        assert!(finder.find_nearest(|_| false).iter().all(Option::is_none));
    }

    #[test]
    fn repeated_runs_identical() {
        let g = crossing_triangles(0.0);
        let a = IntersectionFinder::new(&g, 1, 10).find();
        let b = IntersectionFinder::new(&g, 1, 10).find();
        assert_eq!(a, b);
    }
}
