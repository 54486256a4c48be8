use std::io::{BufRead, Write};

use tracing::debug;

use crate::error::IoError;
use crate::math::Point3;
use crate::mesh::{Element, Grid, Shape};

/// Writes `grid` as a legacy VTK `UNSTRUCTURED_GRID`. All elements are
/// written, whatever their dimension.
///
/// # Errors
///
/// Returns [`IoError::Io`] when writing fails.
pub fn write_vtk<W: Write>(mut w: W, grid: &Grid) -> Result<(), IoError> {
    writeln!(w, "# vtk DataFile Version 2.0")?;
    writeln!(w, "unstruc")?;
    writeln!(w, "ASCII")?;
    writeln!(w, "DATASET UNSTRUCTURED_GRID")?;
    writeln!(w, "POINTS {} double", grid.points.len())?;
    for p in &grid.points {
        let z = if grid.dim == 3 { p.z } else { 0.0 };
        writeln!(w, "{:e} {:e} {:e}", p.x, p.y, z)?;
    }

    let size: usize = grid.elements.iter().map(|e| e.points.len() + 1).sum();
    writeln!(w, "CELLS {} {}", grid.elements.len(), size)?;
    for e in &grid.elements {
        write!(w, "{}", e.points.len())?;
        for p in &e.points {
            write!(w, " {p}")?;
        }
        writeln!(w)?;
    }

    writeln!(w, "CELL_TYPES {}", grid.elements.len())?;
    for e in &grid.elements {
        writeln!(w, "{}", e.shape.vtk_id())?;
    }
    debug!(cells = grid.elements.len(), "wrote VTK");
    Ok(())
}

/// Whitespace token stream over a reader, remembering the current line.
struct Tokens<R> {
    lines: std::io::Lines<R>,
    pending: Vec<String>,
    lineno: usize,
}

impl<R: BufRead> Tokens<R> {
    fn next_token(&mut self) -> Result<Option<String>, IoError> {
        while self.pending.is_empty() {
            match self.lines.next() {
                Some(line) => {
                    self.lineno += 1;
                    let line = line?;
                    self.pending = line.split_whitespace().rev().map(str::to_owned).collect();
                }
                None => return Ok(None),
            }
        }
        Ok(self.pending.pop())
    }

    fn next_value<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, IoError> {
        let token = self
            .next_token()?
            .ok_or_else(|| IoError::parse(self.lineno, format!("unexpected end of file, expected {what}")))?;
        token
            .parse()
            .map_err(|_| IoError::parse(self.lineno, format!("invalid {what} '{token}'")))
    }

    /// Skips tokens up to and including `keyword`.
    fn seek(&mut self, keyword: &str) -> Result<(), IoError> {
        while let Some(t) = self.next_token()? {
            if t == keyword {
                return Ok(());
            }
        }
        Err(IoError::parse(self.lineno, format!("missing {keyword} section")))
    }
}

/// Reads a legacy ASCII VTK unstructured grid.
///
/// The grid is 3D when any cell is a volume cell or any point leaves the
/// `z = 0` plane. Point and cell data sections are ignored.
///
/// # Errors
///
/// Returns [`IoError::Parse`] on malformed content.
pub fn read_vtk<R: BufRead>(reader: R) -> Result<Grid, IoError> {
    let mut tokens = Tokens {
        lines: reader.lines(),
        pending: Vec::new(),
        lineno: 0,
    };

    tokens.seek("POINTS")?;
    let n_points: usize = tokens.next_value("point count")?;
    let _kind: String = tokens.next_value("point type")?;
    let mut points = Vec::with_capacity(n_points);
    for _ in 0..n_points {
        let x = tokens.next_value("coordinate")?;
        let y = tokens.next_value("coordinate")?;
        let z = tokens.next_value("coordinate")?;
        points.push(Point3::new(x, y, z));
    }

    tokens.seek("CELLS")?;
    let n_cells: usize = tokens.next_value("cell count")?;
    let _size: usize = tokens.next_value("cell list size")?;
    let mut cells = Vec::with_capacity(n_cells);
    for _ in 0..n_cells {
        let n: usize = tokens.next_value("cell point count")?;
        let pts = (0..n)
            .map(|_| tokens.next_value::<usize>("point index"))
            .collect::<Result<Vec<_>, _>>()?;
        cells.push(pts);
    }

    tokens.seek("CELL_TYPES")?;
    let n_types: usize = tokens.next_value("cell type count")?;
    if n_types != n_cells {
        return Err(IoError::parse(tokens.lineno, "CELL_TYPES count differs from CELLS"));
    }
    let mut elements = Vec::with_capacity(n_cells);
    for pts in cells {
        let id: u8 = tokens.next_value("cell type")?;
        let shape = Shape::from_vtk_id(id)
            .ok_or_else(|| IoError::parse(tokens.lineno, format!("unsupported cell type {id}")))?;
        elements.push(Element::new(shape, pts));
    }

    let dim = if elements.iter().any(|e| e.dim() == 3) || points.iter().any(|p| p.z != 0.0) {
        3
    } else {
        2
    };
    let mut grid = Grid::new(dim);
    grid.points = points;
    grid.elements = elements;
    grid.check_integrity()
        .map_err(|e| IoError::parse(tokens.lineno, e.to_string()))?;
    debug!(cells = grid.elements.len(), dim, "read VTK");
    Ok(grid)
}
