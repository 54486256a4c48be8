use crate::error::OffsetError;

/// How neighbor weights are derived from the opening angle `θ` at a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightScheme {
    /// Use `tan(θ/2)` instead of `θ`.
    pub tangent: bool,
    /// Divide by the length of the edge to the neighbor.
    pub by_length: bool,
}

impl Default for WeightScheme {
    /// Mean-value weights.
    fn default() -> Self {
        Self {
            tangent: true,
            by_length: true,
        }
    }
}

impl WeightScheme {
    /// Contribution of a triangle with opening angle `angle` at a point to
    /// the neighbor at distance `length`.
    #[must_use]
    pub fn weight(self, angle: f64, length: f64) -> f64 {
        let w = if self.tangent { (angle / 2.0).tan() } else { angle };
        match (self.by_length, length > 0.0) {
            (false, _) => w,
            (true, true) => w / length,
            (true, false) => 0.0,
        }
    }
}

/// Relaxation used for the offset positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingMode {
    /// Plain relaxation with constraint clamping after every pass.
    #[default]
    Clamped,
    /// Alternating shrink/inflate passes.
    Taubin,
}

/// Parameters for growing one offset layer.
///
/// Angles are in radians.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetParams {
    /// Requested layer thickness. Negative values grow against the surface
    /// normals.
    pub thickness: f64,
    pub weights: WeightScheme,
    /// Upper bound of the stretch factor applied at sharp features.
    pub max_stretch: f64,
    /// Admissible normal component, as fractions of the target length, at
    /// convex points.
    pub convex_bounds: (f64, f64),
    /// Admissible normal component at concave and planar points.
    pub concave_bounds: (f64, f64),
    pub normal_iterations: usize,
    pub position_iterations: usize,
    pub taubin_cycles: usize,
    pub smoothing: SmoothingMode,
    /// Relaxation rate of the plain passes.
    pub relaxation: f64,
    pub taubin_lambda: f64,
    pub taubin_mu: f64,
    /// Initial ceiling on the angle between an offset and its direction.
    pub max_skew_angle: f64,
    /// Increase of a poisoned point's skew ceiling per repair iteration.
    pub skew_relax_step: f64,
    pub max_skew_ceiling: f64,
    /// Position passes per repair iteration.
    pub repair_iterations: usize,
    pub max_repair_iterations: usize,
    pub max_escalations: usize,
    /// Damping multiplier applied to poisoned points.
    pub damping_factor: f64,
    pub min_damping: f64,
    pub octree_capacity: usize,
    pub octree_depth: usize,
    /// Look for collisions further out before smoothing.
    pub future_check: bool,
    pub future_extrapolation: f64,
    /// `c` in the shrink law `d² / (d² + c)`.
    pub future_scale_constant: f64,
    pub skew_correction: bool,
    /// Maximum offset length, in units of thickness, after finalization.
    pub skew_limit: f64,
}

impl Default for OffsetParams {
    fn default() -> Self {
        Self {
            thickness: 1.0,
            weights: WeightScheme::default(),
            max_stretch: 2.0,
            convex_bounds: (0.5, 1.5),
            concave_bounds: (0.8, 1.0),
            normal_iterations: 10,
            position_iterations: 100,
            taubin_cycles: 20,
            smoothing: SmoothingMode::Clamped,
            relaxation: 0.5,
            taubin_lambda: 0.5,
            taubin_mu: -0.53,
            max_skew_angle: 60f64.to_radians(),
            skew_relax_step: 5f64.to_radians(),
            max_skew_ceiling: 85f64.to_radians(),
            repair_iterations: 20,
            max_repair_iterations: 1000,
            max_escalations: 100,
            damping_factor: 0.9,
            min_damping: 0.6,
            octree_capacity: 20,
            octree_depth: 10,
            future_check: false,
            future_extrapolation: 10.0,
            future_scale_constant: 50.0,
            skew_correction: true,
            skew_limit: 2.0,
        }
    }
}

impl OffsetParams {
    /// Default parameters for the given thickness.
    #[must_use]
    pub fn new(thickness: f64) -> Self {
        Self {
            thickness,
            ..Self::default()
        }
    }

    /// Few smoothing passes, for quick previews.
    #[must_use]
    pub fn fast(thickness: f64) -> Self {
        Self {
            normal_iterations: 2,
            position_iterations: 10,
            taubin_cycles: 4,
            repair_iterations: 5,
            ..Self::new(thickness)
        }
    }

    /// Taubin position smoothing, which shrinks sharp features less.
    #[must_use]
    pub fn taubin(thickness: f64) -> Self {
        Self {
            smoothing: SmoothingMode::Taubin,
            ..Self::new(thickness)
        }
    }

    #[must_use]
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    #[must_use]
    pub fn with_normal_iterations(mut self, n: usize) -> Self {
        self.normal_iterations = n;
        self
    }

    #[must_use]
    pub fn with_position_iterations(mut self, n: usize) -> Self {
        self.position_iterations = n;
        self
    }

    #[must_use]
    pub fn with_smoothing(mut self, mode: SmoothingMode) -> Self {
        self.smoothing = mode;
        self
    }

    #[must_use]
    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn with_future_check(mut self, enabled: bool) -> Self {
        self.future_check = enabled;
        self
    }

    #[must_use]
    pub fn with_future_scale_constant(mut self, c: f64) -> Self {
        self.future_scale_constant = c;
        self
    }

    #[must_use]
    pub fn with_skew_correction(mut self, enabled: bool) -> Self {
        self.skew_correction = enabled;
        self
    }

    #[must_use]
    pub fn with_max_repair_iterations(mut self, n: usize) -> Self {
        self.max_repair_iterations = n;
        self
    }

    /// Disables all smoothing, so offsets keep their initial targets.
    #[must_use]
    pub fn without_smoothing(self) -> Self {
        Self {
            normal_iterations: 0,
            position_iterations: 0,
            taubin_cycles: 0,
            ..self
        }
    }

    /// Checks the parameters for values the growth cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`OffsetError::InvalidParams`] naming the first bad value.
    pub fn validate(&self) -> Result<(), OffsetError> {
        let invalid = |msg: &str| Err(OffsetError::InvalidParams(msg.into()));
        if !self.thickness.is_finite() || self.thickness == 0.0 {
            return invalid("thickness must be finite and non-zero");
        }
        if self.max_stretch < 1.0 {
            return invalid("max_stretch must be at least 1");
        }
        for (lo, hi) in [self.convex_bounds, self.concave_bounds] {
            if !(0.0 < lo && lo <= hi) {
                return invalid("bounds must satisfy 0 < min <= max");
            }
        }
        if !(0.0 < self.relaxation && self.relaxation <= 1.0) {
            return invalid("relaxation must be in (0, 1]");
        }
        if self.taubin_lambda <= 0.0 || self.taubin_mu >= -self.taubin_lambda {
            return invalid("taubin rates need lambda > 0 and mu < -lambda");
        }
        let right = std::f64::consts::FRAC_PI_2;
        if !(0.0 < self.max_skew_angle && self.max_skew_angle <= self.max_skew_ceiling)
            || self.max_skew_ceiling >= right
        {
            return invalid("skew angles must satisfy 0 < max_skew_angle <= max_skew_ceiling < 90°");
        }
        if !(0.0 < self.damping_factor && self.damping_factor < 1.0) {
            return invalid("damping_factor must be in (0, 1)");
        }
        if !(0.0 < self.min_damping && self.min_damping <= 1.0) {
            return invalid("min_damping must be in (0, 1]");
        }
        if self.octree_capacity == 0 {
            return invalid("octree_capacity must be positive");
        }
        if self.future_scale_constant <= 0.0 || self.future_extrapolation <= 0.0 {
            return invalid("future check constants must be positive");
        }
        if self.skew_limit <= 0.0 {
            return invalid("skew_limit must be positive");
        }
        Ok(())
    }
}
