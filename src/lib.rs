//! SpatialData: a unified data model for spatial omics.
//!
//! A [`dataset::SpatialData`] container holds images, label masks, point
//! clouds and shapes, each anchored to named coordinate systems through
//! [`transform::Transformation`]s, plus one annotation table linked to
//! those elements by region.
//!
//! # Modules
//!
//! - [`model`]: element schemas and their parsers
//! - [`transform`]: transformations and per-element coordinate system maps
//! - [`dataset`]: the container, filtering, concatenation and JSON I/O
//! - [`validation`]: whole-container validation reports
//! - [`error`]: error types for spatialdata operations

pub mod dataset;
pub mod error;
pub mod model;
pub mod transform;
pub mod validation;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::SpatialDataError;

/// The spatialdata CLI application.
#[derive(Parser)]
#[command(name = "spatialdata")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Validate a SpatialData JSON document.
    Validate(ValidateArgs),
    /// List the elements, table and coordinate systems of a document.
    Info(InfoArgs),
    /// Keep only the elements mapped into the given coordinate systems.
    Filter(FilterArgs),
    /// Merge several documents into one.
    Concat(ConcatArgs),
}

#[derive(clap::Args)]
struct ValidateArgs {
    /// Input file to validate.
    input: PathBuf,

    /// Treat warnings as errors (exit non-zero if any warnings).
    #[arg(long)]
    strict: bool,

    /// Require every element to be mapped into the `global` coordinate system.
    #[arg(long)]
    require_global: bool,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args)]
struct InfoArgs {
    input: PathBuf,

    /// Output format ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

#[derive(clap::Args)]
struct FilterArgs {
    input: PathBuf,

    /// Coordinate system to keep (repeatable).
    #[arg(long = "coordinate-system", short = 'c', required = true)]
    coordinate_systems: Vec<String>,

    /// Also drop table rows annotating removed elements.
    #[arg(long)]
    filter_table: bool,

    /// Output file.
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct ConcatArgs {
    /// Input files, merged in order.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Drop the tables instead of merging them.
    #[arg(long)]
    omit_table: bool,

    /// Output file.
    #[arg(short, long)]
    output: PathBuf,
}

/// Run the spatialdata CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), SpatialDataError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Info(args)) => run_info(args),
        Some(Commands::Filter(args)) => run_filter(args),
        Some(Commands::Concat(args)) => run_concat(args),
        None => {
            println!("spatialdata {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("A unified data model for spatial omics.");
            println!();
            println!("Run 'spatialdata --help' for usage information.");
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over `-v`; without either only warnings are shown.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn run_validate(args: ValidateArgs) -> Result<(), SpatialDataError> {
    let sdata = dataset::io_json::read_spatialdata_json(&args.input)?;

    let opts = validation::ValidateOptions {
        strict: args.strict,
        require_global: args.require_global,
    };
    let report = validation::validate_spatial_data(&sdata, &opts);

    match args.output.as_str() {
        "json" => {
            let value = serde_json::json!({
                "error_count": report.error_count(),
                "warning_count": report.warning_count(),
                "issues": &report.issues,
            });
            println!("{}", to_pretty(&value)?);
        }
        _ => print!("{}", report),
    }

    let has_errors = report.error_count() > 0;
    let has_warnings = report.warning_count() > 0;

    if has_errors || (opts.strict && has_warnings) {
        Err(SpatialDataError::ValidationFailed {
            error_count: report.error_count(),
            warning_count: report.warning_count(),
            report,
        })
    } else {
        Ok(())
    }
}

fn run_info(args: InfoArgs) -> Result<(), SpatialDataError> {
    let sdata = dataset::io_json::read_spatialdata_json(&args.input)?;

    match args.output.as_str() {
        "json" => {
            let elements: Vec<_> = sdata
                .iter()
                .map(|(kind, name, element)| {
                    serde_json::json!({
                        "kind": kind,
                        "name": name,
                        "summary": element.summary(),
                        "coordinate_systems": transform::HasTransformations::transformations(element)
                            .coordinate_systems()
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            let table = sdata.table().map(|t| {
                serde_json::json!({
                    "n_obs": t.n_obs(),
                    "n_vars": t.n_vars(),
                    "regions": t.attrs.as_ref().map(|a| a.regions()).unwrap_or_default(),
                })
            });
            let value = serde_json::json!({
                "elements": elements,
                "table": table,
                "coordinate_systems": sdata.coordinate_systems(),
            });
            println!("{}", to_pretty(&value)?);
        }
        _ => println!("{}", sdata),
    }
    Ok(())
}

fn run_filter(args: FilterArgs) -> Result<(), SpatialDataError> {
    let sdata = dataset::io_json::read_spatialdata_json(&args.input)?;
    let systems: Vec<&str> = args.coordinate_systems.iter().map(String::as_str).collect();
    let filtered = sdata.filter_by_coordinate_system(&systems, args.filter_table);

    dataset::io_json::write_spatialdata_json(&args.output, &filtered)?;
    println!(
        "Kept {} of {} element(s) in {:?}",
        filtered.len(),
        sdata.len(),
        systems
    );
    Ok(())
}

fn run_concat(args: ConcatArgs) -> Result<(), SpatialDataError> {
    let containers = args
        .inputs
        .iter()
        .map(|path| dataset::io_json::read_spatialdata_json(path))
        .collect::<Result<Vec<_>, _>>()?;
    let merged = dataset::concatenate(containers, args.omit_table)?;

    dataset::io_json::write_spatialdata_json(&args.output, &merged)?;
    println!(
        "Merged {} file(s) into {} element(s){}",
        args.inputs.len(),
        merged.len(),
        match merged.table() {
            Some(t) => format!(" and a {} x {} table", t.n_obs(), t.n_vars()),
            None => String::new(),
        }
    );
    Ok(())
}

fn to_pretty(value: &serde_json::Value) -> Result<String, SpatialDataError> {
    serde_json::to_string_pretty(value).map_err(|source| SpatialDataError::JsonWrite {
        path: PathBuf::from("<stdout>"),
        source,
    })
}
