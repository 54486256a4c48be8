use thiserror::Error;

use crate::mesh::Shape;

/// Top-level error type for the unstruc mesh tools.
#[derive(Debug, Error)]
pub enum UnstrucError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Mesh(#[from] MeshError),

    #[error(transparent)]
    Offset(#[from] OffsetError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),
}

/// Errors raised by the mesh container.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("element {element} has {found} points, {shape} needs {expected}")]
    WrongPointCount {
        element: usize,
        shape: Shape,
        expected: usize,
        found: usize,
    },

    #[error("element {element} references point {point} but the grid has {n_points} points")]
    PointOutOfRange {
        element: usize,
        point: usize,
        n_points: usize,
    },

    #[error("element {element} references name {name} but the grid has {n_names} names")]
    NameOutOfRange {
        element: usize,
        name: usize,
        n_names: usize,
    },

    #[error("dimension {0} is not 2 or 3")]
    InvalidDimension(usize),

    #[error("grid dimensions differ ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },

    #[error("cannot collapse {shape} element {element}")]
    CannotCollapse { element: usize, shape: Shape },

    #[error("name {name} is not in the grid, which has {n_names} names")]
    UnknownName { name: usize, n_names: usize },
}

/// Errors raised while growing an offset layer.
///
/// Contract violations ([`NonTriangleElement`](Self::NonTriangleElement),
/// [`DegenerateElement`](Self::DegenerateElement), [`ZeroNormal`](Self::ZeroNormal),
/// [`InvalidParams`](Self::InvalidParams)) mean the input cannot be offset at all.
/// Convergence failures ([`NotConverged`](Self::NotConverged),
/// [`EscalationLimit`](Self::EscalationLimit)) are a legitimate negative result of
/// the repair loop.
#[derive(Debug, Error)]
pub enum OffsetError {
    #[error("element {element} is a {shape}; offset surfaces must be all triangles")]
    NonTriangleElement { element: usize, shape: Shape },

    #[error("element {element} has zero area")]
    DegenerateElement { element: usize },

    #[error("point {point} has a zero-length normal (duplicate or degenerate geometry)")]
    ZeroNormal { point: usize },

    #[error("invalid offset parameters: {0}")]
    InvalidParams(String),

    #[error(
        "offset did not converge after {iterations} repair iterations \
         ({negative_volumes} negative volumes, {intersections} intersected elements)"
    )]
    NotConverged {
        iterations: usize,
        negative_volumes: usize,
        intersections: usize,
    },

    #[error("bounded intersection checks escalated {escalations} times without settling")]
    EscalationLimit { escalations: usize },
}

impl OffsetError {
    /// Returns `true` when the repair protocol ran to exhaustion, as opposed to
    /// a contract violation on the input.
    #[must_use]
    pub const fn is_convergence_failure(&self) -> bool {
        matches!(
            self,
            Self::NotConverged { .. } | Self::EscalationLimit { .. }
        )
    }
}

/// Errors related to reading and writing grid files.
#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("unknown file type for '{0}'")]
    UnknownExtension(String),

    #[error("{format} does not support {operation}")]
    UnsupportedFormat {
        format: &'static str,
        operation: &'static str,
    },

    #[error("{format} cannot store {shape} elements")]
    UnsupportedShape { format: &'static str, shape: Shape },
}

impl IoError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Convenience type alias for results using [`UnstrucError`].
pub type Result<T> = std::result::Result<T, UnstrucError>;
