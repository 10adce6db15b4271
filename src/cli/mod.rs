//! Command-line parsing for the store index builder.
//!
//! The goal of this module is to keep **argument parsing** and **command
//! dispatch** separate from the weighting/chaining code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{BaseScale, DegeneratePolicy, IndexKind, WeightBasis};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "sidx", version, about = "Store-level scanner price index builder")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute per-store index series and optionally assemble the panel.
    Run(RunArgs),
    /// Assemble an existing directory of per-store index files into a panel.
    Panel(PanelArgs),
    /// Validate a single store file and print every schema violation.
    Check(CheckArgs),
}

/// Options for a full batch run.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Directory containing raw per-store CSV files.
    #[arg(long, value_name = "DIR")]
    pub store_path: PathBuf,

    /// Directory where per-store index CSV files are written.
    #[arg(long, value_name = "DIR")]
    pub outpath: PathBuf,

    /// Optional output CSV for the assembled panel.
    #[arg(long, value_name = "FILE")]
    pub panel_output_path: Option<PathBuf>,

    /// Weighting basis for period construction.
    #[arg(long, value_enum, default_value_t = WeightBasis::Fiscal)]
    pub weight_basis: WeightBasis,

    /// Which index to construct.
    #[arg(long, value_enum, default_value_t = IndexKind::Price)]
    pub index_kind: IndexKind,

    /// Chain handling when a period's weights are degenerate.
    #[arg(long, value_enum, default_value_t = DegeneratePolicy::Gap)]
    pub degenerate_policy: DegeneratePolicy,

    /// Index value at the base period.
    #[arg(long, value_enum, default_value_t = BaseScale::One)]
    pub scale: BaseScale,

    /// Restrict observations to one subcategory (e.g. "Vaping Products").
    #[arg(long)]
    pub subcategory: Option<String>,

    /// Process only the first N stores (dry runs).
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Write a JSON batch summary to this path.
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,
}

/// Options for assembling a panel from existing per-store outputs.
#[derive(Debug, Parser)]
pub struct PanelArgs {
    /// Directory of per-store index CSV files.
    #[arg(long, value_name = "DIR")]
    pub source_dir: PathBuf,

    /// Output CSV for the assembled panel.
    #[arg(long, value_name = "FILE")]
    pub panel_output_path: PathBuf,
}

/// Options for validating one store file.
#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Store CSV file to validate.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Weighting basis used to parse periods.
    #[arg(long, value_enum, default_value_t = WeightBasis::Fiscal)]
    pub weight_basis: WeightBasis,

    /// Restrict observations to one subcategory before validating.
    #[arg(long)]
    pub subcategory: Option<String>,
}
