use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use super::connection::ConnectionGraph;
use super::future::future_check;
use super::intersections::{IntersectionFinder, IntersectionSet};
use super::params::{OffsetParams, SmoothingMode};
use super::prism::PrismVolume;
use super::skew::correct_skew;
use super::smoothing::{smooth_normals, smooth_positions, taubin};
use crate::error::{OffsetError, Result};
use crate::mesh::Grid;

/// Statistics of a finished layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrowthReport {
    pub repair_iterations: usize,
    /// Bounded intersection checks that found nothing and fell back to a
    /// full check.
    pub escalations: usize,
    pub bad_points: usize,
    pub radical_points: usize,
    pub future_shrunk: usize,
    pub rejected_normals: usize,
    pub rejected_positions: usize,
    pub skew_corrected: usize,
}

/// One grown layer.
#[derive(Debug, Clone)]
pub struct OffsetLayer {
    /// The input surface with every point moved by its offset.
    pub surface: Grid,
    /// Wedges between the input and the offset surface.
    pub volume: Grid,
    pub report: GrowthReport,
}

/// Steps of the growth of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthState {
    /// Graph built; the optional future check is pending.
    Build,
    SmoothNormals,
    SmoothPositions,
    Verify,
    Repair,
    Finalize,
    Done,
}

/// Owns the graph and prism volume of one layer and advances the state
/// machine.
struct GrowthController<'a> {
    surface: &'a Grid,
    params: &'a OffsetParams,
    state: GrowthState,
    graph: ConnectionGraph,
    prism: PrismVolume,
    /// Elements whose edges and faces bound the next intersection check.
    implicated: Vec<usize>,
    negatives: Vec<usize>,
    intersections: IntersectionSet,
    last_failures: Option<usize>,
    stalls: usize,
    report: GrowthReport,
}

impl<'a> GrowthController<'a> {
    fn new(surface: &'a Grid, params: &'a OffsetParams) -> Result<Self> {
        let graph = ConnectionGraph::build(surface, params)?;
        let prism = PrismVolume::from_graph(surface, &graph);
        Ok(Self {
            surface,
            params,
            state: GrowthState::Build,
            graph,
            prism,
            implicated: Vec::new(),
            negatives: Vec::new(),
            intersections: IntersectionSet::default(),
            last_failures: None,
            stalls: 0,
            report: GrowthReport::default(),
        })
    }

    fn run(mut self) -> Result<OffsetLayer> {
        while self.state != GrowthState::Done {
            self.state = self.step()?;
        }
        self.report.bad_points = self.graph.count_bad();
        self.report.radical_points = self.graph.count_radical();
        let mut surface = self.surface.clone();
        surface.points = self.prism.offset_points().to_vec();
        Ok(OffsetLayer {
            surface,
            volume: self.prism.into_grid(),
            report: self.report,
        })
    }

    fn step(&mut self) -> Result<GrowthState> {
        let p = self.params;
        Ok(match self.state {
            GrowthState::Build => {
                if p.future_check {
                    self.report.future_shrunk = future_check(self.surface, &mut self.graph, p);
                }
                GrowthState::SmoothNormals
            }
            GrowthState::SmoothNormals => {
                if p.normal_iterations > 0 {
                    self.report.rejected_normals =
                        smooth_normals(&mut self.graph, p.relaxation, p.normal_iterations);
                    self.graph.realign_offsets();
                }
                GrowthState::SmoothPositions
            }
            GrowthState::SmoothPositions => {
                self.report.rejected_positions += match p.smoothing {
                    SmoothingMode::Clamped => {
                        smooth_positions(&mut self.graph, p.relaxation, p.position_iterations)
                    }
                    SmoothingMode::Taubin => {
                        taubin(&mut self.graph, p.taubin_lambda, p.taubin_mu, p.taubin_cycles)
                    }
                };
                GrowthState::Verify
            }
            GrowthState::Verify => self.verify()?,
            GrowthState::Repair => self.repair()?,
            GrowthState::Finalize => {
                if p.skew_correction {
                    self.report.skew_corrected = correct_skew(&mut self.graph, p.skew_limit);
                }
                self.prism.refresh_offsets(&self.surface.points, &self.graph);
                GrowthState::Done
            }
            GrowthState::Done => GrowthState::Done,
        })
    }

    fn verify(&mut self) -> Result<GrowthState> {
        let p = self.params;
        self.prism.refresh_offsets(&self.surface.points, &self.graph);
        self.negatives = self.prism.negative_volumes();
        let finder = IntersectionFinder::new(&self.prism.grid, p.octree_capacity, p.octree_depth);
        self.intersections = if self.implicated.is_empty() {
            finder.find()
        } else {
            let bounded = finder.find_in(&self.implicated);
            if bounded.is_empty() {
                self.report.escalations += 1;
                if self.report.escalations > p.max_escalations {
                    error!(escalations = self.report.escalations, "escalation limit reached");
                    return Err(OffsetError::EscalationLimit {
                        escalations: self.report.escalations,
                    }
                    .into());
                }
                finder.find()
            } else {
                bounded
            }
        };
        debug!(
            iteration = self.report.repair_iterations,
            negative = self.negatives.len(),
            intersected = self.intersections.elements.len(),
            "verified layer"
        );
        Ok(if self.negatives.is_empty() && self.intersections.is_empty() {
            GrowthState::Finalize
        } else {
            GrowthState::Repair
        })
    }

    fn repair(&mut self) -> Result<GrowthState> {
        let p = self.params;
        let failed: BTreeSet<usize> = self
            .negatives
            .iter()
            .chain(&self.intersections.elements)
            .copied()
            .collect();
        if self.report.repair_iterations >= p.max_repair_iterations {
            warn!(
                iterations = self.report.repair_iterations,
                negative = self.negatives.len(),
                intersected = self.intersections.elements.len(),
                "offset layer did not converge"
            );
            return Err(OffsetError::NotConverged {
                iterations: self.report.repair_iterations,
                negative_volumes: self.negatives.len(),
                intersections: self.intersections.elements.len(),
            }
            .into());
        }
        self.report.repair_iterations += 1;

        match self.last_failures {
            Some(prev) if failed.len() >= prev => self.stalls += 1,
            _ => self.stalls = 0,
        }
        self.last_failures = Some(failed.len());
        let radical = self.stalls >= 2;

        let poisoned: BTreeSet<usize> = failed
            .iter()
            .flat_map(|&e| self.surface.elements[e].points.iter().copied())
            .collect();
        for &i in &poisoned {
            if self.graph.points[i].is_frozen() {
                continue;
            }
            if radical {
                self.graph.make_radical(i);
                continue;
            }
            let pc = &mut self.graph.points[i];
            let damping = (pc.damping * p.damping_factor).max(p.min_damping);
            pc.offset *= damping / pc.damping;
            pc.damping = damping;
            pc.skew_ceiling = (pc.skew_ceiling + p.skew_relax_step).min(p.max_skew_ceiling);
        }
        if radical {
            info!(points = poisoned.len(), "repair stalled, zeroing poisoned points");
        }
        self.report.rejected_positions +=
            smooth_positions(&mut self.graph, p.relaxation, p.repair_iterations);

        let implicated: BTreeSet<usize> = poisoned
            .iter()
            .flat_map(|&i| self.graph.points[i].elements.iter().copied())
            .collect();
        self.implicated = implicated.into_iter().collect();
        debug!(
            iteration = self.report.repair_iterations,
            failed = failed.len(),
            poisoned = poisoned.len(),
            "repaired layer"
        );
        Ok(GrowthState::Verify)
    }
}

/// Grows one offset layer over a closed or open triangle surface.
pub struct OffsetGrowth<'a> {
    surface: &'a Grid,
    params: OffsetParams,
}

impl<'a> OffsetGrowth<'a> {
    #[must_use]
    pub fn new(surface: &'a Grid, params: OffsetParams) -> Self {
        Self { surface, params }
    }

    /// Runs the growth.
    ///
    /// # Errors
    ///
    /// - Contract violations on the input, see [`ConnectionGraph::build`].
    /// - [`OffsetError::NotConverged`] when repair runs out of iterations.
    /// - [`OffsetError::EscalationLimit`] when bounded intersection checks
    ///   keep falling back to full checks.
    pub fn execute(&self) -> Result<OffsetLayer> {
        let controller = GrowthController::new(self.surface, &self.params).inspect_err(|e| {
            error!(error = %e, "cannot offset surface");
        })?;
        let layer = controller.run()?;
        info!(
            thickness = self.params.thickness,
            repairs = layer.report.repair_iterations,
            radical = layer.report.radical_points,
            "grew offset layer"
        );
        Ok(layer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Point3, Vector3};
    use crate::mesh::{Element, Shape};
    use crate::offset::connection::tests::{cube, flat_patch};
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// `n x n` plate of unit-spaced cells in the plane `y = y0`, shifted by
    /// `(dx, dz)`, with normals along `+y` or `-y`.
    #[allow(clippy::cast_precision_loss)]
    fn plate(g: &mut Grid, n: usize, y0: f64, dx: f64, dz: f64, up: bool) {
        let base = g.points.len();
        let h = 1.0 / n as f64;
        for k in 0..=n {
            for i in 0..=n {
                g.points.push(p(dx + i as f64 * h, y0, dz + k as f64 * h));
            }
        }
        let id = |i: usize, k: usize| base + k * (n + 1) + i;
        for k in 0..n {
            for i in 0..n {
                let (a, b, c, d) = (id(i, k), id(i + 1, k), id(i + 1, k + 1), id(i, k + 1));
                let tris = if up {
                    [[a, d, c], [a, c, b]]
                } else {
                    [[a, c, d], [a, b, c]]
                };
                for t in tris {
                    g.elements.push(Element::new(Shape::Triangle, t.to_vec()));
                }
            }
        }
    }

    fn facing_plates() -> Grid {
        let mut g = Grid::new(3);
        plate(&mut g, 2, -0.05, 0.0, 0.0, true);
        plate(&mut g, 2, 0.05, 0.3, 0.2, false);
        g
    }

    /// The facing plates joined along their `x` minimum edges by a strip,
    /// making one sheet folded back at an angle of about 18 degrees.
    fn folded_sheet() -> Grid {
        let mut g = facing_plates();
        let (n, upper) = (2, 9);
        for k in 0..n {
            let (a0, a1) = (k * (n + 1), (k + 1) * (n + 1));
            let (b0, b1) = (upper + a0, upper + a1);
            g.elements.push(Element::new(Shape::Triangle, vec![a1, a0, b0]));
            g.elements.push(Element::new(Shape::Triangle, vec![a1, b0, b1]));
        }
        g
    }

    /// Steps the controller by hand, recording after every verification
    /// how many points belong to a failing wedge.
    fn failing_points_per_verify(
        surface: &Grid,
        params: &OffsetParams,
    ) -> (Vec<usize>, GrowthReport) {
        let mut c = GrowthController::new(surface, params).unwrap();
        let mut counts = Vec::new();
        while c.state != GrowthState::Done {
            let verified = c.state == GrowthState::Verify;
            c.state = c.step().unwrap();
            if verified {
                let points: BTreeSet<usize> = c
                    .negatives
                    .iter()
                    .chain(&c.intersections.elements)
                    .flat_map(|&e| surface.elements[e].points.iter().copied())
                    .collect();
                counts.push(points.len());
            }
        }
        (counts, c.report)
    }

    #[test]
    fn cube_without_smoothing_matches_wedge_volume() {
        let t = 0.1;
        let s = cube();
        let layer = OffsetGrowth::new(&s, OffsetParams::new(t).without_smoothing())
            .execute()
            .unwrap();
        assert_eq!(layer.report.repair_iterations, 0);
        let expected = 0.25 * t * (1.0 + (1.0 + 2.0 * t).powi(2));
        for e in &layer.volume.elements {
            assert_relative_eq!(e.volume(&layer.volume.points), expected, epsilon = 1e-12);
        }
        assert_relative_eq!(layer.surface.points[7], p(1.0 + t, 1.0 + t, 1.0 + t), epsilon = 1e-12);
        assert_eq!(layer.surface.elements, s.elements);
    }

    #[test]
    fn cube_offsets_point_outward() {
        let s = cube();
        let params = OffsetParams::new(0.05);
        let layer = OffsetGrowth::new(&s, params.clone()).execute().unwrap();
        assert_eq!(layer.report.repair_iterations, 0);
        assert_eq!(layer.volume.elements.len(), 12);
        let graph = ConnectionGraph::build(&s, &params).unwrap();
        for (i, q) in layer.surface.points.iter().enumerate() {
            let offset: Vector3 = q - s.points[i];
            for &e in &graph.points[i].elements {
                assert!(offset.dot(&graph.face_normals[e]) > 0.0);
            }
        }
        assert!(layer.volume.elements.iter().all(|e| e.volume(&layer.volume.points) > 0.0));
    }

    #[test]
    fn thin_cube_layer_verifies_first_time() {
        let s = cube();
        let layer = OffsetGrowth::new(&s, OffsetParams::new(0.01)).execute().unwrap();
        assert_eq!(layer.report.repair_iterations, 0);
        assert_eq!(layer.volume.elements.len(), 12);
        assert!(layer.volume.elements.iter().all(|e| e.shape == Shape::Wedge));
        assert!(layer.volume.elements.iter().all(|e| e.volume(&layer.volume.points) > 0.0));
    }

    #[test]
    fn inward_cube_layer() {
        let s = cube();
        let layer = OffsetGrowth::new(&s, OffsetParams::new(-0.1)).execute().unwrap();
        for q in &layer.surface.points {
            for k in 0..3 {
                assert!(q[k] > 0.0 && q[k] < 1.0);
            }
        }
        assert!(layer.volume.elements.iter().all(|e| e.volume(&layer.volume.points) >= 0.0));
    }

    #[test]
    fn flat_patch_rises_uniformly() {
        let s = flat_patch(3);
        let layer = OffsetGrowth::new(&s, OffsetParams::new(0.25)).execute().unwrap();
        for (q, p0) in layer.surface.points.iter().zip(&s.points) {
            assert_relative_eq!(q - p0, Vector3::new(0.0, 0.0, 0.25), epsilon = 1e-12);
        }
        assert_eq!(layer.report, GrowthReport::default());
    }

    #[test]
    fn facing_plates_are_repaired() {
        let s = facing_plates();
        let layer = OffsetGrowth::new(&s, OffsetParams::new(0.2)).execute().unwrap();
        assert!(layer.report.repair_iterations >= 1);
        let finder = IntersectionFinder::new(&layer.volume, 20, 10);
        assert!(finder.find().is_empty());
        assert!(layer.volume.elements.iter().all(|e| e.volume(&layer.volume.points) >= 0.0));
    }

    #[test]
    fn folded_sheet_failures_only_shrink() {
        let s = folded_sheet();
        let params = OffsetParams::new(0.2);
        let (counts, report) = failing_points_per_verify(&s, &params);
        assert!(report.repair_iterations >= 1);
        assert!(counts[0] > 0);
        assert_eq!(counts.last(), Some(&0));
        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "{counts:?}");

        let layer = OffsetGrowth::new(&s, params).execute().unwrap();
        assert_eq!(layer.report.repair_iterations, report.repair_iterations);
        let finder = IntersectionFinder::new(&layer.volume, 20, 10);
        assert!(finder.find().is_empty());
    }

    #[test]
    fn growth_is_deterministic() {
        let s = facing_plates();
        let a = OffsetGrowth::new(&s, OffsetParams::new(0.2)).execute().unwrap();
        let b = OffsetGrowth::new(&s, OffsetParams::new(0.2)).execute().unwrap();
        assert_eq!(a.surface, b.surface);
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn repair_limit_reports_not_converged() {
        let s = facing_plates();
        let params = OffsetParams::new(0.2).with_max_repair_iterations(0);
        let err = OffsetGrowth::new(&s, params).execute().unwrap_err();
        match err {
            crate::UnstrucError::Offset(e) => assert!(e.is_convergence_failure()),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn future_check_runs_in_growth() {
        let s = facing_plates();
        let params = OffsetParams::new(0.2).with_future_check(true);
        let layer = OffsetGrowth::new(&s, params).execute().unwrap();
        assert!(layer.report.future_shrunk > 0);
    }

    #[test]
    fn taubin_growth_converges() {
        let s = cube();
        let layer = OffsetGrowth::new(&s, OffsetParams::taubin(0.05)).execute().unwrap();
        assert!(layer.volume.elements.iter().all(|e| e.volume(&layer.volume.points) > 0.0));
    }
}
