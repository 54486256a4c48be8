pub mod collapse;
pub mod element;
pub mod farfield;
pub mod grid;
pub mod quality;

pub use collapse::{collapse, Collapsed};
pub use element::{Element, Shape};
pub use farfield::create_farfield_box;
pub use grid::{Grid, Name};
pub use quality::{AngleRange, ElementQuality, MeshQuality, QualityCheck};
