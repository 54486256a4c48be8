//! Boundary-layer offset generation.
//!
//! A layer is grown by building a [`ConnectionGraph`] over a triangle
//! surface, smoothing its growth directions and offsets, and then checking
//! the [`PrismVolume`] between surface and offset surface for inverted
//! wedges and self-intersections. Points implicated in a failure are damped
//! and, when progress stalls, pinned to the surface.

pub mod connection;
pub mod future;
pub mod grow;
pub mod intersections;
pub mod layers;
pub mod octree;
pub mod params;
pub mod prism;
pub mod skew;
pub mod smoothing;

pub use connection::{ConnectionGraph, PointConnection};
pub use grow::{GrowthReport, GrowthState, OffsetGrowth, OffsetLayer};
pub use intersections::{IntersectionFinder, IntersectionSet};
pub use layers::{BoundaryLayers, LayerStack};
pub use octree::Octree;
pub use params::{OffsetParams, SmoothingMode, WeightScheme};
pub use prism::PrismVolume;
pub use smoothing::Correction;
