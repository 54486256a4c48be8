use slotmap::SlotMap;

use crate::math::{Aabb, Point3, Vector3};

slotmap::new_key_type! {
    /// Handle to an octree node.
    pub struct NodeId;
}

/// Items stored in a leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bucket {
    pub points: Vec<usize>,
    pub edges: Vec<usize>,
    pub faces: Vec<usize>,
}

#[derive(Debug, Clone)]
enum Content {
    Leaf(Bucket),
    Internal([NodeId; 8]),
}

#[derive(Debug, Clone)]
struct Node {
    center: Point3,
    /// Half the side length of the cube.
    radius: f64,
    depth: usize,
    content: Content,
}

#[derive(Debug, Clone, Copy)]
enum Item {
    Edge(usize),
    Face(usize),
}

/// Octree over a fixed point set.
///
/// All points are inserted at construction; edges and faces are added
/// afterwards by bounding box and land in every leaf they overlap.
#[derive(Debug, Clone)]
pub struct Octree {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    positions: Vec<Point3>,
    capacity: usize,
    max_depth: usize,
}

/// Index of the child octant of `center` containing `p`. Bits 0, 1 and 2
/// are set when x, y and z are at or above the center.
fn octant(center: &Point3, p: &Point3) -> usize {
    usize::from(p.x >= center.x) | usize::from(p.y >= center.y) << 1 | usize::from(p.z >= center.z) << 2
}

/// Octants of `center` a box may overlap.
fn overlap_mask(center: &Point3, bounds: &Aabb) -> u8 {
    let mut mask = 0xFF;
    if bounds.min.x > center.x {
        mask &= 0xAA;
    }
    if bounds.max.x < center.x {
        mask &= 0x55;
    }
    if bounds.min.y > center.y {
        mask &= 0xCC;
    }
    if bounds.max.y < center.y {
        mask &= 0x33;
    }
    if bounds.min.z > center.z {
        mask &= 0xF0;
    }
    if bounds.max.z < center.z {
        mask &= 0x0F;
    }
    mask
}

impl Octree {
    /// Builds the tree over `points`. A leaf splits once it holds more than
    /// `capacity` points, unless it is already at `max_depth`.
    #[must_use]
    pub fn new(points: &[Point3], capacity: usize, max_depth: usize) -> Self {
        let (center, radius) = match Aabb::from_points(points) {
            Some(bb) => {
                let half = bb.extent().max() / 2.0;
                (bb.center(), half * 1.001 + f64::EPSILON.max(half * 1e-9))
            }
            None => (Point3::origin(), 1.0),
        };
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node {
            center,
            radius,
            depth: 0,
            content: Content::Leaf(Bucket::default()),
        });
        let mut tree = Self {
            nodes,
            root,
            positions: points.to_vec(),
            capacity: capacity.max(1),
            max_depth,
        };
        for i in 0..points.len() {
            tree.insert_point(i);
        }
        tree
    }

    fn insert_point(&mut self, i: usize) {
        let p = self.positions[i];
        let mut id = self.root;
        loop {
            let node = &mut self.nodes[id];
            match &mut node.content {
                Content::Internal(children) => id = children[octant(&node.center, &p)],
                Content::Leaf(bucket) => {
                    bucket.points.push(i);
                    if bucket.points.len() > self.capacity && node.depth < self.max_depth {
                        self.split(id);
                    }
                    return;
                }
            }
        }
    }

    /// Turns leaf `id` into an internal node and redistributes its points,
    /// splitting children that overflow in turn.
    fn split(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let node = &mut self.nodes[id];
            let (center, radius, depth) = (node.center, node.radius, node.depth);
            let points = match std::mem::replace(&mut node.content, Content::Leaf(Bucket::default())) {
                Content::Leaf(bucket) => bucket.points,
                internal @ Content::Internal(_) => {
                    node.content = internal;
                    continue;
                }
            };
            let half = radius / 2.0;
            let children: [NodeId; 8] = std::array::from_fn(|k| {
                let sign = |bit: usize| if k & bit == 0 { -half } else { half };
                self.nodes.insert(Node {
                    center: center + Vector3::new(sign(1), sign(2), sign(4)),
                    radius: half,
                    depth: depth + 1,
                    content: Content::Leaf(Bucket::default()),
                })
            });
            for i in points {
                let child = children[octant(&center, &self.positions[i])];
                if let Content::Leaf(bucket) = &mut self.nodes[child].content {
                    bucket.points.push(i);
                }
            }
            self.nodes[id].content = Content::Internal(children);
            for child in children {
                let node = &self.nodes[child];
                if let Content::Leaf(bucket) = &node.content {
                    if bucket.points.len() > self.capacity && node.depth < self.max_depth {
                        pending.push(child);
                    }
                }
            }
        }
    }

    fn insert_item(&mut self, item: Item, bounds: &Aabb) {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            match &mut node.content {
                Content::Leaf(bucket) => match item {
                    Item::Edge(e) => bucket.edges.push(e),
                    Item::Face(f) => bucket.faces.push(f),
                },
                Content::Internal(children) => {
                    let mask = overlap_mask(&node.center, bounds);
                    stack.extend((0..8).filter(|k| mask & (1 << k) != 0).map(|k| children[k]));
                }
            }
        }
    }

    /// Adds edge `id` to every leaf its bounds overlap.
    pub fn insert_edge(&mut self, id: usize, bounds: &Aabb) {
        self.insert_item(Item::Edge(id), bounds);
    }

    /// Adds face `id` to every leaf its bounds overlap.
    pub fn insert_face(&mut self, id: usize, bounds: &Aabb) {
        self.insert_item(Item::Face(id), bounds);
    }

    /// Leaf buckets in depth-first order, children visited by octant index.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Bucket> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match &self.nodes[id].content {
                Content::Leaf(bucket) => out.push(bucket),
                Content::Internal(children) => stack.extend(children.iter().rev()),
            }
        }
        out
    }

    /// Total number of nodes, internal ones included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes.values().map(|n| n.depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[allow(clippy::cast_precision_loss)]
    fn lattice(n: usize) -> Vec<Point3> {
        let mut pts = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    pts.push(p(i as f64, j as f64, k as f64));
                }
            }
        }
        pts
    }

    #[test]
    fn octant_bits() {
        let c = p(0.0, 0.0, 0.0);
        assert_eq!(octant(&c, &p(-1.0, -1.0, -1.0)), 0);
        assert_eq!(octant(&c, &p(1.0, -1.0, -1.0)), 1);
        assert_eq!(octant(&c, &p(-1.0, 1.0, -1.0)), 2);
        assert_eq!(octant(&c, &p(0.0, 0.0, 0.0)), 7);
    }

    #[test]
    fn masks_select_sides() {
        let c = p(0.0, 0.0, 0.0);
        let upper_x = Aabb::from_points(&[p(1.0, -1.0, -1.0), p(2.0, 1.0, 1.0)]).unwrap();
        assert_eq!(overlap_mask(&c, &upper_x), 0xAA);
        let corner = Aabb::from_points(&[p(-2.0, -2.0, -2.0), p(-1.0, -1.0, -1.0)]).unwrap();
        assert_eq!(overlap_mask(&c, &corner), 0x01);
        let straddle = Aabb::from_points(&[p(-1.0, -1.0, -1.0), p(1.0, 1.0, 1.0)]).unwrap();
        assert_eq!(overlap_mask(&c, &straddle), 0xFF);
    }

    #[test]
    fn every_point_in_exactly_one_leaf() {
        let pts = lattice(6);
        let tree = Octree::new(&pts, 4, 10);
        assert!(tree.node_count() > 1);
        let mut seen = vec![0; pts.len()];
        for leaf in tree.leaves() {
            assert!(leaf.points.len() <= 4);
            for &i in &leaf.points {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn coincident_points_stop_at_max_depth() {
        let pts = vec![p(1.0, 1.0, 1.0); 10];
        let tree = Octree::new(&pts, 2, 3);
        assert_eq!(tree.depth(), 3);
        let total: usize = tree.leaves().iter().map(|l| l.points.len()).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn items_reach_every_overlapping_leaf() {
        let pts = lattice(4);
        let mut tree = Octree::new(&pts, 2, 10);
        let bounds = Aabb::from_points(&[p(0.0, 0.0, 0.0), p(3.0, 3.0, 3.0)]).unwrap();
        tree.insert_face(7, &bounds);
        let small = Aabb::from_points(&[p(0.0, 0.0, 0.0), p(0.1, 0.1, 0.1)]).unwrap();
        tree.insert_edge(3, &small);
        let leaves = tree.leaves();
        assert!(leaves.iter().all(|l| l.faces == vec![7]));
        let with_edge = leaves.iter().filter(|l| l.edges.contains(&3)).count();
        assert!(with_edge >= 1 && with_edge < leaves.len());
        let holder = leaves.iter().find(|l| l.points.contains(&0)).unwrap();
        assert!(holder.edges.contains(&3));
    }

    #[test]
    fn leaf_order_is_stable() {
        let pts = lattice(5);
        let a = Octree::new(&pts, 3, 10);
        let b = Octree::new(&pts, 3, 10);
        assert_eq!(a.leaves(), b.leaves());
    }

    #[test]
    fn empty_tree_has_one_leaf() {
        let tree = Octree::new(&[], 20, 10);
        assert_eq!(tree.leaves().len(), 1);
    }
}
