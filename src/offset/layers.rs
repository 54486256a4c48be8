use tracing::info;

use super::grow::{GrowthReport, OffsetGrowth};
use super::params::OffsetParams;
use crate::error::{OffsetError, Result};
use crate::mesh::Grid;

/// Result of growing several layers.
#[derive(Debug, Clone)]
pub struct LayerStack {
    /// Outermost offset surface.
    pub surface: Grid,
    /// Welded union of the layer volumes.
    pub volume: Grid,
    pub reports: Vec<GrowthReport>,
}

/// Grows `layers` offset layers, layer `k` being `first_thickness *
/// ratio^k` thick. Each layer grows from the previous layer's offset
/// surface.
#[derive(Debug, Clone)]
pub struct BoundaryLayers {
    first_thickness: f64,
    layers: usize,
    ratio: f64,
    params: OffsetParams,
}

impl BoundaryLayers {
    #[must_use]
    pub fn new(first_thickness: f64, layers: usize) -> Self {
        Self {
            first_thickness,
            layers,
            ratio: 1.0,
            params: OffsetParams::new(first_thickness),
        }
    }

    #[must_use]
    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    /// Parameters for every layer; their thickness is overridden.
    #[must_use]
    pub fn with_params(mut self, params: OffsetParams) -> Self {
        self.params = params;
        self
    }

    /// Thickness of layer `k`.
    #[must_use]
    pub fn thickness(&self, k: usize) -> f64 {
        let exp = i32::try_from(k).unwrap_or(i32::MAX);
        self.first_thickness * self.ratio.powi(exp)
    }

    /// Grows the stack over `surface`.
    ///
    /// Layer volumes are merged on coincident points; wedges flattened by
    /// zeroed offsets collapse to lower shapes or vanish.
    ///
    /// # Errors
    ///
    /// [`OffsetError::InvalidParams`] for zero layers or a non-positive
    /// ratio, and any error of [`OffsetGrowth::execute`] for the failing
    /// layer.
    pub fn execute(&self, surface: &Grid) -> Result<LayerStack> {
        if self.layers == 0 {
            return Err(OffsetError::InvalidParams("at least one layer is required".into()).into());
        }
        if !(self.ratio.is_finite() && self.ratio > 0.0) {
            return Err(OffsetError::InvalidParams("growth ratio must be positive".into()).into());
        }
        let mut current = surface.clone();
        let mut volume = Grid::new(3);
        let mut reports = Vec::with_capacity(self.layers);
        for k in 0..self.layers {
            let thickness = self.thickness(k);
            let params = self.params.clone().with_thickness(thickness);
            let mut layer = OffsetGrowth::new(&current, params).execute()?;
            layer.volume.names[0].name = format!("layer{k}");
            volume.add_grid(&layer.volume)?;
            reports.push(layer.report);
            current = layer.surface;
            info!(layer = k, thickness, "layer done");
        }
        volume.merge_points(0.0);
        volume.collapse_elements(true)?;
        volume.delete_empty_names();
        Ok(LayerStack {
            surface: current,
            volume,
            reports,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::Shape;
    use crate::offset::connection::tests::{cube, flat_patch};
    use approx::assert_relative_eq;

    #[test]
    fn geometric_thickness() {
        let stack = BoundaryLayers::new(0.01, 3).with_ratio(1.5);
        assert_relative_eq!(stack.thickness(0), 0.01);
        assert_relative_eq!(stack.thickness(2), 0.0225, epsilon = 1e-15);
    }

    #[test]
    fn flat_stack_heights_add_up() {
        let s = flat_patch(2);
        let out = BoundaryLayers::new(0.1, 3).with_ratio(2.0).execute(&s).unwrap();
        for q in &out.surface.points {
            assert_relative_eq!(q.z, 0.1 + 0.2 + 0.4, epsilon = 1e-12);
        }
        assert_eq!(out.reports.len(), 3);
        assert_eq!(out.volume.elements.len(), 3 * s.elements.len());
        assert_eq!(out.volume.points.len(), 4 * s.points.len());
        assert_eq!(out.volume.names.len(), 3);
        assert_eq!(out.volume.names[2].name, "layer2");
        let total: f64 = out.volume.elements.iter().map(|e| e.volume(&out.volume.points)).sum();
        assert_relative_eq!(total, 4.0 * 0.7, epsilon = 1e-12);
        out.volume.check_integrity().unwrap();
    }

    #[test]
    fn cube_stack_is_all_wedges() {
        let out = BoundaryLayers::new(0.02, 2).execute(&cube()).unwrap();
        assert!(out.volume.elements.iter().all(|e| e.shape == Shape::Wedge));
        assert!(out.volume.elements.iter().all(|e| e.volume(&out.volume.points) > 0.0));
    }

    #[test]
    fn zero_layers_rejected() {
        assert!(BoundaryLayers::new(0.1, 0).execute(&cube()).is_err());
        assert!(BoundaryLayers::new(0.1, 2).with_ratio(0.0).execute(&cube()).is_err());
    }
}
