use std::io::{BufRead, Read, Write};

use tracing::debug;

use crate::error::IoError;
use crate::math::{Point3, Vector3};
use crate::mesh::{Element, Grid, Shape};

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

fn new_surface(name: &str) -> Grid {
    let mut grid = Grid::new(3);
    grid.add_name(2, name);
    grid
}

fn push_facet(grid: &mut Grid, vertices: [Point3; 3]) {
    let i = grid.points.len();
    grid.points.extend_from_slice(&vertices);
    grid.elements
        .push(Element::new(Shape::Triangle, vec![i, i + 1, i + 2]).with_name(1));
}

/// Reads an STL file from memory, detecting ASCII or binary content.
///
/// Every facet becomes a triangle with its own three points, carrying name
/// 1 called `name`; callers weld them with [`Grid::merge_points`].
///
/// A file is ASCII when it starts with `solid` and its first two following
/// tokens include `facet` or the file ends right after the solid header.
///
/// # Errors
///
/// Returns [`IoError::Parse`] on malformed content.
pub fn read_stl(bytes: &[u8], name: &str) -> Result<Grid, IoError> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(HEADER_SIZE + 4)]);
    let mut tokens = head.split_whitespace();
    let ascii = tokens.next() == Some("solid") && {
        let rest: Vec<&str> = tokens.take(2).collect();
        rest.contains(&"facet") || rest.first() == Some(&"endsolid")
    };
    if ascii {
        read_stl_ascii(bytes, name)
    } else {
        read_stl_binary(bytes, name)
    }
}

/// Reads an ASCII STL.
///
/// # Errors
///
/// Returns [`IoError::Parse`] on an unexpected token.
pub fn read_stl_ascii<R: BufRead>(reader: R, name: &str) -> Result<Grid, IoError> {
    let mut grid = new_surface(name);
    let mut vertices = Vec::with_capacity(3);
    let mut in_loop = false;

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = n + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.first().copied() {
            None | Some("solid" | "endsolid" | "facet" | "endfacet") => {}
            Some("outer") => {
                in_loop = true;
                vertices.clear();
            }
            Some("vertex") => {
                if !in_loop {
                    return Err(IoError::parse(lineno, "vertex outside of a loop"));
                }
                vertices.push(parse_vertex(&parts[1..], lineno)?);
            }
            Some("endloop") => {
                let facet: [Point3; 3] = vertices
                    .as_slice()
                    .try_into()
                    .map_err(|_| IoError::parse(lineno, "facet loop needs exactly 3 vertices"))?;
                push_facet(&mut grid, facet);
                in_loop = false;
            }
            Some(token) => {
                return Err(IoError::parse(lineno, format!("unknown token '{token}'")));
            }
        }
    }
    debug!(triangles = grid.elements.len(), "read ASCII STL");
    Ok(grid)
}

fn parse_vertex(parts: &[&str], lineno: usize) -> Result<Point3, IoError> {
    if parts.len() != 3 {
        return Err(IoError::parse(lineno, "vertex needs 3 coordinates"));
    }
    let mut c = [0.0; 3];
    for (k, s) in parts.iter().enumerate() {
        c[k] = s
            .parse()
            .map_err(|_| IoError::parse(lineno, format!("invalid coordinate '{s}'")))?;
    }
    Ok(Point3::new(c[0], c[1], c[2]))
}

fn read_f32(buf: &[u8]) -> f64 {
    f64::from(f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]))
}

fn read_vertex(buf: &[u8]) -> Point3 {
    Point3::new(read_f32(&buf[0..4]), read_f32(&buf[4..8]), read_f32(&buf[8..12]))
}

/// Reads a binary STL.
///
/// # Errors
///
/// Returns [`IoError::Parse`] when the file is shorter than its triangle
/// count requires.
pub fn read_stl_binary<R: Read>(mut reader: R, name: &str) -> Result<Grid, IoError> {
    let mut header = [0u8; HEADER_SIZE + 4];
    reader
        .read_exact(&mut header)
        .map_err(|_| IoError::parse(0, "binary STL header truncated"))?;
    let count = u32::from_le_bytes([
        header[HEADER_SIZE],
        header[HEADER_SIZE + 1],
        header[HEADER_SIZE + 2],
        header[HEADER_SIZE + 3],
    ]);

    let mut grid = new_surface(name);
    let mut buf = [0u8; TRIANGLE_SIZE];
    for i in 0..count {
        reader.read_exact(&mut buf).map_err(|_| {
            IoError::parse(0, format!("binary STL ends after {i} of {count} triangles"))
        })?;
        push_facet(
            &mut grid,
            [
                read_vertex(&buf[12..24]),
                read_vertex(&buf[24..36]),
                read_vertex(&buf[36..48]),
            ],
        );
    }
    debug!(triangles = count, "read binary STL");
    Ok(grid)
}

fn triangles(grid: &Grid) -> Result<Vec<[Point3; 3]>, IoError> {
    grid.elements
        .iter()
        .map(|e| match (e.shape, e.points.as_slice()) {
            (Shape::Triangle, &[a, b, c]) => Ok([grid.points[a], grid.points[b], grid.points[c]]),
            _ => Err(IoError::UnsupportedShape {
                format: "STL",
                shape: e.shape,
            }),
        })
        .collect()
}

fn facet_normal(t: &[Point3; 3]) -> Vector3 {
    (t[1] - t[0])
        .cross(&(t[2] - t[0]))
        .try_normalize(0.0)
        .unwrap_or_else(Vector3::zeros)
}

/// Writes an ASCII STL.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedShape`] if the grid holds anything but
/// triangles.
pub fn write_stl_ascii<W: Write>(mut w: W, grid: &Grid) -> Result<(), IoError> {
    let tris = triangles(grid)?;
    writeln!(w, "solid")?;
    for t in &tris {
        let n = facet_normal(t);
        writeln!(w, "  facet normal {:e} {:e} {:e}", n.x, n.y, n.z)?;
        writeln!(w, "    outer loop")?;
        for p in t {
            writeln!(w, "      vertex {:e} {:e} {:e}", p.x, p.y, p.z)?;
        }
        writeln!(w, "    endloop")?;
        writeln!(w, "  endfacet")?;
    }
    writeln!(w, "endsolid")?;
    Ok(())
}

/// Writes a binary STL. Coordinates are narrowed to `f32`.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedShape`] if the grid holds anything but
/// triangles.
#[allow(clippy::cast_possible_truncation)]
pub fn write_stl_binary<W: Write>(mut w: W, grid: &Grid) -> Result<(), IoError> {
    let tris = triangles(grid)?;
    let count = u32::try_from(tris.len())
        .map_err(|_| IoError::parse(0, "too many triangles for binary STL"))?;
    w.write_all(&[b' '; HEADER_SIZE])?;
    w.write_all(&count.to_le_bytes())?;
    for t in &tris {
        let n = facet_normal(t);
        for v in std::iter::once(n).chain(t.iter().map(|p| p.coords)) {
            for c in v.iter() {
                w.write_all(&(*c as f32).to_le_bytes())?;
            }
        }
        w.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}
