//! Converts and merges grid files.
//!
//! ```text
//! unstruc-convert -m -s 0.001 -t names.txt wing.su2 upper.stl lower.stl
//! ```
//!
//! Inputs are appended in order. With `-m`, coincident points are welded,
//! faces shared by two inputs are removed and degenerate elements collapse.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use unstruc::error::IoError;
use unstruc::io::translation::NameTranslation;
use unstruc::io::{read_grid, write_grid};
use unstruc::mesh::Grid;
use unstruc::Result;

/// Absolute tolerance used when welding points with `--merge`.
const MERGE_TOLERANCE: f64 = 3e-8;

/// Grid format converter
#[derive(Parser, Debug)]
#[command(name = "unstruc-convert")]
#[command(about = "Convert, merge and rename CFD grid files", long_about = None)]
#[command(version)]
struct Cli {
    /// Output grid; the format follows the extension
    output_file: PathBuf,

    /// Input grids, appended in order
    #[arg(required = true)]
    input_files: Vec<PathBuf>,

    /// Weld close points and remove faces shared between inputs
    #[arg(short = 'm', long)]
    merge: bool,

    /// Multiply all coordinates by this factor
    #[arg(short = 's', long, default_value_t = 1.0)]
    scale: f64,

    /// Name translation file, one `new_name idx idx ...` per line
    #[arg(short = 't', long)]
    translation: Option<PathBuf>,
}

fn run(cli: &Cli) -> Result<()> {
    let mut grid: Option<Grid> = None;
    for path in &cli.input_files {
        let input = read_grid(path)?;
        match grid.as_mut() {
            Some(g) => g.add_grid(&input)?,
            None => grid = Some(input),
        }
    }
    let Some(mut grid) = grid else {
        return Ok(());
    };

    if (cli.scale - 1.0).abs() > f64::EPSILON {
        info!(factor = cli.scale, "scaling grid");
        grid.scale(cli.scale);
    }
    if cli.merge {
        let welded = grid.merge_points(MERGE_TOLERANCE);
        let inner = grid.delete_inner_faces();
        grid.collapse_elements(false)?;
        info!(welded, inner, "merged inputs");
    }
    if let Some(path) = &cli.translation {
        let file = File::open(path).map_err(IoError::from)?;
        let table = NameTranslation::parse(BufReader::new(file))?;
        table.apply(&mut grid)?;
    }
    info!(
        elements = grid.elements.len(),
        points = grid.points.len(),
        names = grid.names.len(),
        "grid ready"
    );
    write_grid(&cli.output_file, &grid)
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
