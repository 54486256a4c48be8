pub mod error;
pub mod io;
pub mod math;
pub mod mesh;
pub mod offset;

pub use error::{Result, UnstrucError};
