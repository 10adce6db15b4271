//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - runs the batch pipeline over store files
//! - assembles the panel
//! - prints reports
//! - writes optional summaries

use clap::Parser;

use crate::cli::{CheckArgs, Cli, Command, PanelArgs, RunArgs};
use crate::domain::{BaseScale, BatchConfig, DegeneratePolicy, IndexKind, RunSpec};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `sidx` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Panel(args) => handle_panel(args),
        Command::Check(args) => handle_check(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = batch_config_from_args(&args);
    let outcome = pipeline::run_batch(&config)?;
    println!("{}", crate::report::format_batch_summary(&outcome, &config));
    Ok(())
}

fn handle_panel(args: PanelArgs) -> Result<(), AppError> {
    let rows = pipeline::build_panel_from_dir(&args.source_dir, &args.panel_output_path)?;
    println!(
        "Assembled panel with {rows} rows -> {}",
        args.panel_output_path.display()
    );
    Ok(())
}

fn handle_check(args: CheckArgs) -> Result<(), AppError> {
    // Kind/policy/scale do not affect parsing or structural checks; any
    // consistent spec works for `check`.
    let spec = RunSpec {
        basis: args.weight_basis,
        kind: IndexKind::Price,
        degenerate_policy: DegeneratePolicy::Gap,
        scale: BaseScale::One,
    };
    let ingested = crate::io::ingest::load_store_csv(&args.file, &spec, args.subcategory.as_deref())?;

    for row_error in &ingested.row_errors {
        println!("line {}: {}", row_error.line, row_error.message);
    }

    match crate::validate::validate_observations(&ingested.observations) {
        Ok(()) if ingested.row_errors.is_empty() => {
            println!(
                "OK: {} observation(s) in '{}', no violations.",
                ingested.rows_used,
                args.file.display()
            );
            Ok(())
        }
        Ok(()) => Err(AppError::input(format!(
            "{} row error(s) in '{}'",
            ingested.row_errors.len(),
            args.file.display()
        ))),
        Err(validation) => {
            print!("{}", validation.detail());
            Err(AppError::input(format!(
                "{} schema violation(s) in '{}'",
                validation.violations.len(),
                args.file.display()
            )))
        }
    }
}

pub fn batch_config_from_args(args: &RunArgs) -> BatchConfig {
    BatchConfig {
        store_path: args.store_path.clone(),
        outpath: args.outpath.clone(),
        panel_output_path: args.panel_output_path.clone(),
        summary_path: args.summary.clone(),
        subcategory: args.subcategory.clone(),
        limit: args.limit,
        spec: RunSpec {
            basis: args.weight_basis,
            kind: args.index_kind,
            degenerate_policy: args.degenerate_policy,
            scale: args.scale,
        },
    }
}
