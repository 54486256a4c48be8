pub mod gmsh;
pub mod stl;
pub mod su2;
pub mod translation;
pub mod vtk;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::IoError;
use crate::mesh::Grid;

/// Grid file types recognised from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Su2,
    Stl,
    StlBinary,
    Vtk,
    Gmsh,
    Plot3D,
    PolyMesh,
}

impl FileType {
    /// Identifies the file type from the extension, or an OpenFOAM
    /// `polyMesh` directory name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownExtension`] for anything else.
    pub fn from_path(path: &Path) -> Result<Self, IoError> {
        if path.file_name().and_then(|n| n.to_str()) == Some("polyMesh") {
            return Ok(Self::PolyMesh);
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("su2") => Ok(Self::Su2),
            Some("stl") => Ok(Self::Stl),
            Some("stlb") => Ok(Self::StlBinary),
            Some("vtk") => Ok(Self::Vtk),
            Some("msh") => Ok(Self::Gmsh),
            Some("xyz" | "p3d") => Ok(Self::Plot3D),
            _ => Err(IoError::UnknownExtension(path.display().to_string())),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Su2 => "SU2",
            Self::Stl | Self::StlBinary => "STL",
            Self::Vtk => "VTK",
            Self::Gmsh => "gmsh",
            Self::Plot3D => "Plot3D",
            Self::PolyMesh => "OpenFOAM polyMesh",
        }
    }
}

/// Reads a grid, choosing the format from the path.
///
/// STL files are named after their file stem.
///
/// # Errors
///
/// Returns an [`IoError`] for unknown or unsupported formats, I/O failures
/// and malformed content.
pub fn read_grid(path: impl AsRef<Path>) -> Result<Grid, IoError> {
    let path = path.as_ref();
    let file_type = FileType::from_path(path)?;
    info!(path = %path.display(), format = file_type.label(), "reading grid");
    match file_type {
        FileType::Su2 => su2::read_su2(BufReader::new(File::open(path)?)),
        FileType::Vtk => vtk::read_vtk(BufReader::new(File::open(path)?)),
        FileType::Stl | FileType::StlBinary => {
            let bytes = std::fs::read(path)?;
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("surface");
            stl::read_stl(&bytes, name)
        }
        FileType::Gmsh | FileType::Plot3D | FileType::PolyMesh => Err(IoError::UnsupportedFormat {
            format: file_type.label(),
            operation: "reading",
        }),
    }
}

/// Writes a grid, choosing the format from the path. `.stl` is written as
/// ASCII and `.stlb` as binary STL.
///
/// # Errors
///
/// Returns an [`IoError`] for unsupported formats or shapes and I/O
/// failures.
pub fn write_grid(path: impl AsRef<Path>, grid: &Grid) -> crate::Result<()> {
    let path = path.as_ref();
    let file_type = FileType::from_path(path)?;
    grid.check_integrity()?;
    info!(path = %path.display(), format = file_type.label(), "writing grid");
    let mut w = BufWriter::new(File::create(path).map_err(IoError::from)?);
    match file_type {
        FileType::Su2 => su2::write_su2(&mut w, grid)?,
        FileType::Vtk => vtk::write_vtk(&mut w, grid)?,
        FileType::Gmsh => gmsh::write_gmsh(&mut w, grid)?,
        FileType::Stl => stl::write_stl_ascii(&mut w, grid)?,
        FileType::StlBinary => stl::write_stl_binary(&mut w, grid)?,
        FileType::Plot3D | FileType::PolyMesh => {
            return Err(IoError::UnsupportedFormat {
                format: file_type.label(),
                operation: "writing",
            }
            .into())
        }
    }
    w.flush().map_err(IoError::from)?;
    Ok(())
}
