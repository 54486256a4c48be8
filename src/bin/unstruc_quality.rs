//! Reports face and dihedral angle ranges of a mesh.
//!
//! ```text
//! unstruc-quality wing_layers.vtk -t 2 -b bad.vtk
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use unstruc::io::{read_grid, write_grid};
use unstruc::mesh::QualityCheck;
use unstruc::Result;

/// Mesh quality report
#[derive(Parser, Debug)]
#[command(name = "unstruc-quality")]
#[command(about = "Report element angles and extract bad elements", long_about = None)]
#[command(version)]
struct Cli {
    /// Mesh to inspect (.su2, .stl, .vtk)
    mesh_file: PathBuf,

    /// Write the bad elements to this file
    #[arg(short = 'b', long)]
    bad_elements: Option<PathBuf>,

    /// Angles closer than this to 0 or 180 degrees mark an element as bad
    #[arg(short = 't', long, default_value_t = QualityCheck::DEFAULT_THRESHOLD)]
    angle_threshold: f64,
}

fn run(cli: &Cli) -> Result<()> {
    let mesh = read_grid(&cli.mesh_file)?;
    let quality = QualityCheck::new(cli.angle_threshold).execute(&mesh)?;

    if !quality.face_angle.is_empty() {
        println!(
            "Face Angle     : {:7.3} {:7.3}",
            quality.face_angle.min, quality.face_angle.max
        );
    }
    if !quality.dihedral_angle.is_empty() {
        println!(
            "Dihedral Angle : {:7.3} {:7.3}",
            quality.dihedral_angle.min, quality.dihedral_angle.max
        );
    }
    if quality.bad_elements.is_empty() {
        info!(elements = mesh.elements.len(), "no bad elements");
        return Ok(());
    }
    println!("{} Bad Elements", quality.bad_elements.len());

    if let Some(path) = &cli.bad_elements {
        let mut bad = mesh.grid_from_element_index(&quality.bad_elements);
        bad.delete_empty_names();
        write_grid(path, &bad)?;
    } else {
        warn!("pass --bad-elements to write them out");
    }
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::WARN.into())
        .add_directive("unstruc=info".parse().unwrap_or_default());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
