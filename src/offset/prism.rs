use super::connection::ConnectionGraph;
use crate::math::{Point3, Vector3};
use crate::mesh::{Element, Grid, Name, Shape};

/// Wedge grid whose points are the surface points followed by the offset
/// points. Wedge `i` sits on surface triangle `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismVolume {
    pub grid: Grid,
    n_surface: usize,
}

impl PrismVolume {
    /// Builds the wedges over `surface` with point `i` moved by
    /// `offsets[i]`.
    ///
    /// Wedges are ordered so their volume is positive for a valid layer:
    /// growing along the face normals (`thickness > 0`) reverses the
    /// triangle winding.
    ///
    /// # Panics
    ///
    /// Panics if `offsets` is shorter than the point list or an element has
    /// fewer than three points.
    #[must_use]
    pub fn new(surface: &Grid, offsets: &[Vector3], thickness: f64) -> Self {
        let n = surface.points.len();
        let mut grid = Grid::new(3);
        grid.names[0] = Name::new(3, "layer");
        grid.points.reserve(2 * n);
        grid.points.extend_from_slice(&surface.points);
        grid.points
            .extend(surface.points.iter().zip(offsets).map(|(p, o)| p + o));
        grid.elements = surface
            .elements
            .iter()
            .map(|e| {
                let [a, b, c] = [e.points[0], e.points[1], e.points[2]];
                let points = if thickness > 0.0 {
                    vec![c, b, a, c + n, b + n, a + n]
                } else {
                    vec![a, b, c, a + n, b + n, c + n]
                };
                Element::new(Shape::Wedge, points)
            })
            .collect();
        Self { grid, n_surface: n }
    }

    #[must_use]
    pub fn from_graph(surface: &Grid, graph: &ConnectionGraph) -> Self {
        let offsets: Vec<Vector3> = graph.points.iter().map(|pc| pc.offset).collect();
        Self::new(surface, &offsets, graph.thickness)
    }

    /// Rewrites the offset half of the points from the graph.
    pub fn refresh_offsets(&mut self, surface: &[Point3], graph: &ConnectionGraph) {
        let n = self.n_surface;
        for (i, p) in graph.offset_points(surface).into_iter().enumerate() {
            self.grid.points[n + i] = p;
        }
    }

    /// Indices of wedges with negative volume.
    #[must_use]
    pub fn negative_volumes(&self) -> Vec<usize> {
        self.grid
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.volume(&self.grid.points) < 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    #[must_use]
    pub fn n_surface_points(&self) -> usize {
        self.n_surface
    }

    /// Offset points, in surface order.
    #[must_use]
    pub fn offset_points(&self) -> &[Point3] {
        &self.grid.points[self.n_surface..]
    }

    #[must_use]
    pub fn into_grid(self) -> Grid {
        self.grid
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::offset::connection::tests::{cube, flat_patch};
    use crate::offset::OffsetParams;
    use approx::assert_relative_eq;

    #[test]
    fn flat_layer_volume() {
        let s = flat_patch(2);
        let offsets = vec![Vector3::new(0.0, 0.0, 0.25); s.points.len()];
        let prism = PrismVolume::new(&s, &offsets, 0.25);
        assert_eq!(prism.grid.points.len(), 18);
        assert!(prism.negative_volumes().is_empty());
        let total: f64 = prism.grid.elements.iter().map(|e| e.volume(&prism.grid.points)).sum();
        assert_relative_eq!(total, 4.0 * 0.25, epsilon = 1e-12);
        prism.grid.check_integrity().unwrap();
    }

    #[test]
    fn inward_layer_keeps_winding() {
        let s = flat_patch(1);
        let offsets = vec![Vector3::new(0.0, 0.0, -0.5); s.points.len()];
        let prism = PrismVolume::new(&s, &offsets, -0.5);
        assert_eq!(prism.grid.elements[0].points, vec![0, 1, 3, 4, 5, 7]);
        assert!(prism.negative_volumes().is_empty());
    }

    #[test]
    fn inverted_wedges_detected() {
        let s = flat_patch(1);
        let offsets = vec![Vector3::new(0.0, 0.0, -0.5); s.points.len()];
        let prism = PrismVolume::new(&s, &offsets, 0.5);
        assert_eq!(prism.negative_volumes(), vec![0, 1]);
    }

    #[test]
    fn cube_wedge_volume() {
        let t = 0.1;
        let s = cube();
        let graph = ConnectionGraph::build(&s, &OffsetParams::new(t)).unwrap();
        let prism = PrismVolume::from_graph(&s, &graph);
        let expected = 0.25 * t * (1.0 + (1.0 + 2.0 * t).powi(2));
        for e in &prism.grid.elements {
            assert_relative_eq!(e.volume(&prism.grid.points), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn refresh_moves_only_offset_half() {
        let s = flat_patch(1);
        let mut graph = ConnectionGraph::build(&s, &OffsetParams::new(1.0)).unwrap();
        let mut prism = PrismVolume::from_graph(&s, &graph);
        graph.points[2].offset = Vector3::new(0.0, 0.0, 0.9);
        prism.refresh_offsets(&s.points, &graph);
        assert_eq!(&prism.grid.points[..4], s.points.as_slice());
        assert_relative_eq!(prism.offset_points()[2].z, 0.9);
        assert_relative_eq!(prism.offset_points()[1].z, 1.0);
    }
}
