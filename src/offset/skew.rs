use tracing::debug;

use super::connection::ConnectionGraph;

/// Pulls every offset longer than `skew_limit * |thickness|` back along its
/// direction until it has that length, keeping the lateral part. When the
/// lateral part alone is longer, the normal component drops to zero.
///
/// Returns the number of moved points. Running it twice moves nothing the
/// second time.
pub fn correct_skew(graph: &mut ConnectionGraph, skew_limit: f64) -> usize {
    let limit = skew_limit * graph.thickness.abs();
    let mut moved = 0;
    for pc in &mut graph.points {
        if pc.direction.norm_squared() == 0.0 || pc.offset.norm() <= limit * (1.0 + 1e-9) {
            continue;
        }
        let lateral = pc.lateral();
        let len = lateral.norm();
        let nc = if len < limit {
            (limit * limit - len * len).sqrt()
        } else {
            0.0
        };
        let corrected = lateral + pc.direction * nc;
        if (corrected - pc.offset).norm() < 1e-12 * limit {
            continue;
        }
        pc.offset = corrected;
        moved += 1;
    }
    debug!(moved, limit, "skew correction");
    moved
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use crate::offset::connection::tests::{cube, flat_patch};
    use crate::offset::OffsetParams;
    use approx::assert_relative_eq;

    #[test]
    fn short_offsets_untouched() {
        let mut g = ConnectionGraph::build(&cube(), &OffsetParams::new(0.1)).unwrap();
        let before = g.points.clone();
        assert_eq!(correct_skew(&mut g, 2.0), 0);
        assert_eq!(g.points, before);
    }

    #[test]
    fn long_offset_pulled_back() {
        let mut g = ConnectionGraph::build(&flat_patch(1), &OffsetParams::new(1.0)).unwrap();
        g.points[0].offset = Vector3::new(1.2, 0.0, 3.0);
        g.points[1].offset = Vector3::new(0.0, 2.5, 0.5);
        assert_eq!(correct_skew(&mut g, 2.0), 2);
        assert_relative_eq!(g.points[0].offset.norm(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(g.points[0].offset.x, 1.2, epsilon = 1e-12);
        assert_relative_eq!(g.points[0].offset.z, 1.6, epsilon = 1e-12);
        assert_relative_eq!(g.points[1].offset, Vector3::new(0.0, 2.5, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn idempotent() {
        let mut g = ConnectionGraph::build(&flat_patch(2), &OffsetParams::new(0.5)).unwrap();
        for (k, pc) in g.points.iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let k = k as f64;
            pc.offset = Vector3::new(0.3 * k, -0.1 * k, 0.5 + 0.2 * k);
        }
        assert!(correct_skew(&mut g, 2.0) > 0);
        let once = g.points.clone();
        assert_eq!(correct_skew(&mut g, 2.0), 0);
        assert_eq!(g.points, once);
    }
}
