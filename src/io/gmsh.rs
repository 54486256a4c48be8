use std::io::Write;

use tracing::debug;

use crate::error::IoError;
use crate::mesh::{Grid, Shape};

const fn gmsh_type(shape: Shape) -> Option<u8> {
    match shape {
        Shape::Line => Some(1),
        Shape::Triangle => Some(2),
        Shape::Quad => Some(3),
        Shape::Tetra => Some(4),
        Shape::Hexa => Some(5),
        Shape::Wedge => Some(6),
        Shape::Pyramid => Some(7),
        Shape::Polygon => None,
    }
}

/// Writes `grid` in the gmsh 2.2 format. Node and element numbers start
/// at 1; each name becomes the physical and elementary tag `name + 1`.
///
/// # Errors
///
/// Returns [`IoError::UnsupportedShape`] for polygons.
pub fn write_gmsh<W: Write>(mut w: W, grid: &Grid) -> Result<(), IoError> {
    let types = grid
        .elements
        .iter()
        .map(|e| {
            gmsh_type(e.shape).ok_or(IoError::UnsupportedShape {
                format: "gmsh",
                shape: e.shape,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    writeln!(w, "$MeshFormat")?;
    writeln!(w, "2.2 0 {}", std::mem::size_of::<f64>())?;
    writeln!(w, "$EndMeshFormat")?;

    writeln!(w, "$Nodes")?;
    writeln!(w, "{}", grid.points.len())?;
    for (i, p) in grid.points.iter().enumerate() {
        writeln!(w, "{} {:e} {:e} {:e}", i + 1, p.x, p.y, p.z)?;
    }
    writeln!(w, "$EndNodes")?;

    writeln!(w, "$Elements")?;
    writeln!(w, "{}", grid.elements.len())?;
    for (i, (e, ty)) in grid.elements.iter().zip(types).enumerate() {
        let tag = e.name + 1;
        write!(w, "{} {ty} 2 {tag} {tag}", i + 1)?;
        for p in &e.points {
            write!(w, " {}", p + 1)?;
        }
        writeln!(w)?;
    }
    writeln!(w, "$EndElements")?;

    writeln!(w, "$PhysicalNames")?;
    writeln!(w, "{}", grid.names.len())?;
    for (i, name) in grid.names.iter().enumerate() {
        writeln!(w, "{} {} \"{}\"", name.dim, i + 1, name.name)?;
    }
    writeln!(w, "$EndPhysicalNames")?;
    debug!(elements = grid.elements.len(), "wrote gmsh");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::mesh::Element;

    #[test]
    fn tetra_with_boundary() {
        let mut g = Grid::new(3);
        g.points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let wall = g.add_name(2, "wall");
        g.elements = vec![
            Element::new(Shape::Tetra, vec![0, 1, 2, 3]),
            Element::new(Shape::Triangle, vec![0, 2, 1]).with_name(wall),
        ];
        let mut buf = Vec::new();
        write_gmsh(&mut buf, &g).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("$MeshFormat\n2.2 0 8\n$EndMeshFormat\n$Nodes\n4\n"));
        assert!(text.contains("1 4 2 1 1 1 2 3 4\n"));
        assert!(text.contains("2 2 2 2 2 1 3 2\n"));
        assert!(text.contains("$PhysicalNames\n2\n3 1 \"default\"\n2 2 \"wall\"\n"));
    }

    #[test]
    fn polygon_rejected() {
        let mut g = Grid::new(2);
        g.points = vec![Point3::origin(); 5];
        g.elements = vec![Element::new(Shape::Polygon, vec![0, 1, 2, 3, 4])];
        assert!(write_gmsh(Vec::new(), &g).is_err());
    }
}
