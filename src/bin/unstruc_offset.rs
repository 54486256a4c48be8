//! Grows boundary layers around a surface mesh.
//!
//! ```text
//! unstruc-offset wing.stl wing_layers.vtk -s 0.001 -n 10 -g 1.2
//! ```
//!
//! The output holds the prism layers, the input surface, the outermost
//! offset surface and, with `--farfield`, the farfield box. Logging follows
//! `RUST_LOG` on top of a `unstruc=info` default.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use unstruc::io::{read_grid, write_grid};
use unstruc::mesh::{create_farfield_box, Grid};
use unstruc::offset::{BoundaryLayers, OffsetParams, SmoothingMode};
use unstruc::Result;

/// Boundary-layer offset generator
#[derive(Parser, Debug)]
#[command(name = "unstruc-offset")]
#[command(about = "Grow prismatic boundary layers around a triangle surface", long_about = None)]
#[command(version)]
struct Cli {
    /// Input surface (.su2, .stl, .vtk)
    surface_file: PathBuf,

    /// Output grid; the format follows the extension
    output_file: PathBuf,

    /// Thickness of the first layer; negative grows against the normals
    #[arg(short = 's', long, allow_negative_numbers = true)]
    offset_size: f64,

    /// Number of layers
    #[arg(short = 'n', long, default_value_t = 1)]
    number_of_layers: usize,

    /// Thickness ratio between consecutive layers
    #[arg(short = 'g', long, default_value_t = 1.5)]
    growth_rate: f64,

    /// Use Taubin smoothing for the offset positions
    #[arg(long)]
    taubin: bool,

    /// Shorten offsets that would collide further out
    #[arg(long)]
    future_check: bool,

    /// Keep offsets longer than the skew limit
    #[arg(long)]
    no_skew_correction: bool,

    /// Add a farfield box around the surface
    #[arg(long)]
    farfield: bool,
}

impl Cli {
    fn params(&self) -> OffsetParams {
        let smoothing = if self.taubin {
            SmoothingMode::Taubin
        } else {
            SmoothingMode::Clamped
        };
        OffsetParams::new(self.offset_size)
            .with_smoothing(smoothing)
            .with_future_check(self.future_check)
            .with_skew_correction(!self.no_skew_correction)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut surface = read_grid(&cli.surface_file)?;
    surface.merge_points(0.0);
    surface.collapse_elements(false)?;
    info!(
        triangles = surface.elements.len(),
        points = surface.points.len(),
        "surface loaded"
    );

    let stack = BoundaryLayers::new(cli.offset_size, cli.number_of_layers)
        .with_ratio(cli.growth_rate)
        .with_params(cli.params())
        .execute(&surface)?;
    for (k, report) in stack.reports.iter().enumerate() {
        info!(
            layer = k,
            repairs = report.repair_iterations,
            radical = report.radical_points,
            bad = report.bad_points,
            "layer report"
        );
    }

    let mut offset = stack.surface;
    for name in &mut offset.names {
        name.name = format!("offset_{}", name.name);
    }

    let mut output: Grid = stack.volume;
    output.add_grid(&surface)?;
    output.add_grid(&offset)?;
    if cli.farfield {
        output.add_grid(&create_farfield_box(&surface)?)?;
    }
    output.merge_points(0.0);
    info!(
        elements = output.elements.len(),
        points = output.points.len(),
        "output assembled"
    );
    write_grid(&cli.output_file, &output)
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
