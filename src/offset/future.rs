use tracing::debug;

use super::connection::ConnectionGraph;
use super::intersections::IntersectionFinder;
use super::params::OffsetParams;
use super::prism::PrismVolume;
use super::smoothing::{relax, Correction};
use crate::math::Vector3;
use crate::mesh::Grid;

const SPREAD_PASSES: usize = 5;

/// Shrink factor for a collision at distance `d`, in units of the layer
/// thickness.
#[must_use]
pub fn shrink_factor(d: f64, scale_constant: f64) -> f64 {
    let d2 = d * d;
    d2 / (d2 + scale_constant)
}

/// Extrapolates every offset by `future_extrapolation`, finds where the
/// extended growth rays hit the extrapolated layer, and scales offsets,
/// targets and bounds down by [`shrink_factor`]. Factors are spread to
/// neighbors without ever raising one. Directions stay unit length.
///
/// Returns the number of shortened points.
pub fn future_check(surface: &Grid, graph: &mut ConnectionGraph, params: &OffsetParams) -> usize {
    let extrapolated: Vec<Vector3> = graph
        .points
        .iter()
        .map(|pc| pc.offset * params.future_extrapolation)
        .collect();
    let prism = PrismVolume::new(surface, &extrapolated, graph.thickness);
    let n = prism.n_surface_points();
    let finder = IntersectionFinder::new(&prism.grid, params.octree_capacity, params.octree_depth);
    let nearest = finder.find_nearest(|&[a, b]| b == a + n);

    let unit = graph.thickness.abs();
    let mut factors: Vec<f64> = nearest[..n]
        .iter()
        .map(|hit| hit.map_or(1.0, |d| shrink_factor(d / unit, params.future_scale_constant)))
        .collect();
    let hits = factors.iter().filter(|&&f| f < 1.0).count();
    relax(graph, &mut factors, params.relaxation, SPREAD_PASSES, Correction::LowerOnly);

    let mut shrunk = 0;
    for (pc, f) in graph.points.iter_mut().zip(factors) {
        if pc.is_frozen() || f >= 1.0 {
            continue;
        }
        pc.offset *= f;
        pc.target *= f;
        pc.min *= f;
        pc.max *= f;
        shrunk += 1;
    }
    debug!(hits, shrunk, "future collision check");
    shrunk
}
