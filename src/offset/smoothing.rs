use std::ops::{Add, Mul, Sub};

use tracing::trace;

use super::connection::ConnectionGraph;
use crate::math::{Vector3, TOLERANCE};

/// Which sign of correction a relaxation pass may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Correction {
    #[default]
    Any,
    RaiseOnly,
    LowerOnly,
}

/// A per-point quantity that can be relaxed.
pub trait Field: Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self> {
    fn zero() -> Self;

    /// Drops the parts of a correction that `correction` forbids.
    #[must_use]
    fn restrict(self, correction: Correction) -> Self;
}

impl Field for f64 {
    fn zero() -> Self {
        0.0
    }

    fn restrict(self, correction: Correction) -> Self {
        match correction {
            Correction::Any => self,
            Correction::RaiseOnly => self.max(0.0),
            Correction::LowerOnly => self.min(0.0),
        }
    }
}

/// Vectors are restricted componentwise.
impl Field for Vector3 {
    fn zero() -> Self {
        Self::zeros()
    }

    fn restrict(self, correction: Correction) -> Self {
        self.map(|c| c.restrict(correction))
    }
}

/// One Jacobi pass over `values`, returning the candidates.
///
/// `value[i] + damping[i] * rate * sum_j w(i, j) * (value[j] - value[i])`.
/// Frozen points keep their value and are left out of their neighbors'
/// sums.
#[must_use]
pub fn relax_pass<T: Field>(
    graph: &ConnectionGraph,
    values: &[T],
    rate: f64,
    correction: Correction,
) -> Vec<T> {
    graph
        .points
        .iter()
        .zip(values)
        .map(|(pc, &v)| {
            if pc.is_frozen() {
                return v;
            }
            let sum = pc
                .neighbors
                .iter()
                .filter(|(j, _)| !graph.points[*j].is_frozen())
                .fold(T::zero(), |acc, &(j, w)| acc + (values[j] - v) * w);
            v + (sum * (pc.damping * rate)).restrict(correction)
        })
        .collect()
}

/// Runs `passes` unconstrained passes over `values` in place.
pub fn relax<T: Field>(
    graph: &ConnectionGraph,
    values: &mut Vec<T>,
    rate: f64,
    passes: usize,
    correction: Correction,
) {
    for _ in 0..passes {
        *values = relax_pass(graph, values, rate, correction);
    }
}

/// Relaxes the growth directions.
///
/// Candidates are renormalized; a candidate pointing behind an incident
/// face is rejected and the point keeps its direction. Returns the number
/// of rejections.
pub fn smooth_normals(graph: &mut ConnectionGraph, rate: f64, passes: usize) -> usize {
    let mut rejected = 0;
    for _ in 0..passes {
        let directions: Vec<Vector3> = graph.points.iter().map(|pc| pc.direction).collect();
        let candidates = relax_pass(graph, &directions, rate, Correction::Any);
        for (i, c) in candidates.into_iter().enumerate() {
            if graph.points[i].is_frozen() {
                continue;
            }
            match c.try_normalize(TOLERANCE) {
                Some(n) if graph.admits(i, &n) => graph.points[i].direction = n,
                _ => rejected += 1,
            }
        }
    }
    trace!(passes, rejected, "smoothed normals");
    rejected
}

fn constrained_pass(graph: &mut ConnectionGraph, rate: f64) -> usize {
    let offsets: Vec<Vector3> = graph.points.iter().map(|pc| pc.offset).collect();
    let candidates = relax_pass(graph, &offsets, rate, Correction::Any);
    let mut rejected = 0;
    for (i, c) in candidates.iter().enumerate() {
        if graph.points[i].is_frozen() {
            continue;
        }
        match graph.constrain(i, c) {
            Some(v) => graph.points[i].offset = v,
            None => rejected += 1,
        }
    }
    rejected
}

/// Relaxes the offsets, projecting every candidate onto its point's
/// constraints after each pass. Returns the number of rejections.
pub fn smooth_positions(graph: &mut ConnectionGraph, rate: f64, passes: usize) -> usize {
    let rejected = (0..passes).map(|_| constrained_pass(graph, rate)).sum();
    trace!(passes, rejected, "smoothed positions");
    rejected
}

/// Taubin smoothing of the offsets: each cycle is a shrinking pass at rate
/// `lambda` followed by an inflating pass at rate `mu < -lambda`, both
/// constrained.
pub fn taubin(graph: &mut ConnectionGraph, lambda: f64, mu: f64, cycles: usize) -> usize {
    let mut rejected = 0;
    for _ in 0..cycles {
        rejected += constrained_pass(graph, lambda);
        rejected += constrained_pass(graph, mu);
    }
    trace!(cycles, rejected, "taubin smoothing");
    rejected
}
