use std::collections::HashMap;
use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::error::IoError;
use crate::math::Point3;
use crate::mesh::{Element, Grid, Name, Shape};

/// Line reader that tracks line numbers for error messages.
struct Lines<R> {
    inner: std::io::Lines<R>,
    lineno: usize,
}

impl<R> Lines<R> {
    fn err(&self, message: impl Into<String>) -> IoError {
        IoError::parse(self.lineno, message)
    }
}

impl<R: BufRead> Lines<R> {
    fn next_line(&mut self) -> Result<Option<String>, IoError> {
        match self.inner.next() {
            Some(line) => {
                self.lineno += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn expect_line(&mut self, what: &str) -> Result<String, IoError> {
        self.next_line()?
            .ok_or_else(|| IoError::parse(self.lineno, format!("unexpected end of file, expected {what}")))
    }
}

/// Splits `KEY= value` or `KEY=value` and returns the value, if the line
/// starts with `key`.
fn keyword<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.trim_start()
        .strip_prefix(key)
        .map(|rest| rest.split('%').next().unwrap_or("").trim())
}

fn parse_count<R>(lines: &Lines<R>, value: &str) -> Result<usize, IoError> {
    value
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| lines.err(format!("invalid count '{value}'")))
}

fn parse_element<R>(lines: &Lines<R>, line: &str) -> Result<Element, IoError> {
    let mut tokens = line.split_whitespace();
    let id: u8 = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| lines.err("missing element type"))?;
    let shape = Shape::from_vtk_id(id).ok_or_else(|| lines.err(format!("unknown element type {id}")))?;
    let n = shape
        .n_points()
        .ok_or_else(|| lines.err("polygons are not valid SU2 elements"))?;
    let points = tokens
        .take(n)
        .map(|t| t.parse::<usize>().map_err(|_| lines.err(format!("invalid point index '{t}'"))))
        .collect::<Result<Vec<_>, _>>()?;
    if points.len() != n {
        return Err(lines.err(format!("{shape} needs {n} points")));
    }
    Ok(Element::new(shape, points))
}

/// Reads an SU2 mesh.
///
/// Explicit point indices after the coordinates are honoured. Tetrahedra with
/// negative volume are flipped.
///
/// # Errors
///
/// Returns [`IoError::Parse`] on malformed content or when `NDIME=`,
/// `NELEM=` or `NPOIN=` is missing.
pub fn read_su2<R: BufRead>(reader: R) -> Result<Grid, IoError> {
    let mut lines = Lines {
        inner: reader.lines(),
        lineno: 0,
    };
    let mut grid: Option<Grid> = None;
    let mut point_map: HashMap<usize, usize> = HashMap::new();
    let mut mapped = false;
    let mut seen_elem = false;
    let mut seen_poin = false;

    while let Some(line) = lines.next_line()? {
        if let Some(v) = keyword(&line, "NDIME=") {
            let dim = parse_count(&lines, v)?;
            if !(2..=3).contains(&dim) {
                return Err(lines.err(format!("unsupported dimension {dim}")));
            }
            grid = Some(Grid::new(dim));
        } else if let Some(v) = keyword(&line, "NELEM=") {
            let g = grid.as_mut().ok_or_else(|| lines.err("NELEM= before NDIME="))?;
            let n = parse_count(&lines, v)?;
            g.elements.reserve(n);
            for _ in 0..n {
                let l = lines.expect_line("element")?;
                g.elements.push(parse_element(&lines, &l)?);
            }
            seen_elem = true;
        } else if let Some(v) = keyword(&line, "NPOIN=") {
            let g = grid.as_mut().ok_or_else(|| lines.err("NPOIN= before NDIME="))?;
            let n = parse_count(&lines, v)?;
            g.points.reserve(n);
            for i in 0..n {
                let l = lines.expect_line("point")?;
                let values: Vec<&str> = l.split_whitespace().collect();
                if values.len() < g.dim {
                    return Err(lines.err("point has too few coordinates"));
                }
                let mut c = [0.0; 3];
                for k in 0..g.dim {
                    c[k] = values[k]
                        .parse()
                        .map_err(|_| lines.err(format!("invalid coordinate '{}'", values[k])))?;
                }
                let index = match values.get(g.dim) {
                    Some(s) => {
                        mapped = true;
                        s.parse()
                            .map_err(|_| lines.err(format!("invalid point index '{s}'")))?
                    }
                    None => i,
                };
                point_map.insert(index, i);
                g.points.push(Point3::new(c[0], c[1], c[2]));
            }
            seen_poin = true;
        } else if let Some(v) = keyword(&line, "NMARK=") {
            let g = grid.as_mut().ok_or_else(|| lines.err("NMARK= before NDIME="))?;
            let n = parse_count(&lines, v)?;
            for _ in 0..n {
                let l = lines.expect_line("MARKER_TAG=")?;
                let tag = keyword(&l, "MARKER_TAG=").ok_or_else(|| lines.err("expected MARKER_TAG="))?;
                let name = g.add_name(g.dim - 1, tag);
                let l = lines.expect_line("MARKER_ELEMS=")?;
                let v = keyword(&l, "MARKER_ELEMS=").ok_or_else(|| lines.err("expected MARKER_ELEMS="))?;
                let count = parse_count(&lines, v)?;
                for _ in 0..count {
                    let l = lines.expect_line("marker element")?;
                    g.elements.push(parse_element(&lines, &l)?.with_name(name));
                }
            }
        }
    }

    let mut grid = grid.ok_or_else(|| lines.err("missing NDIME="))?;
    if !seen_elem || !seen_poin {
        return Err(lines.err("missing NELEM= or NPOIN="));
    }
    if mapped {
        for e in &mut grid.elements {
            for p in &mut e.points {
                let q = *p;
                *p = *point_map
                    .get(&q)
                    .ok_or_else(|| IoError::parse(0, format!("element uses unknown point {q}")))?;
            }
        }
    }
    grid.check_integrity()
        .map_err(|e| IoError::parse(lines.lineno, e.to_string()))?;

    let mut n_negative = 0;
    for e in &mut grid.elements {
        if e.volume(&grid.points) < 0.0 {
            n_negative += 1;
            if e.shape == Shape::Tetra {
                e.points.swap(1, 2);
            }
        }
    }
    if n_negative > 0 {
        warn!(count = n_negative, "negative volume elements in SU2 file");
    }
    debug!(
        points = grid.points.len(),
        elements = grid.elements.len(),
        markers = grid.names.len() - 1,
        "read SU2"
    );
    Ok(grid)
}

fn write_element<W: Write>(w: &mut W, e: &Element) -> Result<(), IoError> {
    write!(w, "{}", e.shape.vtk_id())?;
    for p in &e.points {
        write!(w, " {p}")?;
    }
    writeln!(w)?;
    Ok(())
}

/// Writes an SU2 mesh. Names of boundary elements become markers.
///
/// # Errors
///
/// Returns [`IoError::Io`] when writing fails.
pub fn write_su2<W: Write>(mut w: W, grid: &Grid) -> Result<(), IoError> {
    writeln!(w, "NDIME= {}\n", grid.dim)?;

    let volume: Vec<&Element> = grid.elements.iter().filter(|e| e.dim() == grid.dim).collect();
    writeln!(w, "NELEM= {}", volume.len())?;
    for e in volume {
        write_element(&mut w, e)?;
    }
    writeln!(w)?;

    writeln!(w, "NPOIN= {}", grid.points.len())?;
    for (i, p) in grid.points.iter().enumerate() {
        if grid.dim == 2 {
            writeln!(w, "{:e} {:e} {i}", p.x, p.y)?;
        } else {
            writeln!(w, "{:e} {:e} {:e} {i}", p.x, p.y, p.z)?;
        }
    }
    writeln!(w)?;

    let boundary_dim = grid.dim.saturating_sub(1);
    let markers: Vec<(&Name, Vec<&Element>)> = grid
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let elems: Vec<&Element> = grid
                .elements
                .iter()
                .filter(|e| e.dim() == boundary_dim && e.name == i)
                .collect();
            (name, elems)
        })
        .filter(|(_, elems)| !elems.is_empty())
        .collect();

    writeln!(w, "NMARK= {}", markers.len())?;
    for (name, elems) in markers {
        writeln!(w, "MARKER_TAG= {}", name.name)?;
        writeln!(w, "MARKER_ELEMS= {}", elems.len())?;
        for e in elems {
            write_element(&mut w, e)?;
        }
    }
    debug!(points = grid.points.len(), "wrote SU2");
    Ok(())
}
