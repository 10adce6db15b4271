//! Shared batch pipeline used by the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! list store files -> ingest -> validate -> weights -> chain -> export,
//! fanned out across stores, then panel assembly as the single join point.
//!
//! Stores are independent and stateless with respect to each other; the only
//! shared state is the immutable run configuration. Store-local errors are
//! isolated into per-store reports so the batch keeps going.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::domain::{BatchConfig, IndexRecord};
use crate::error::AppError;
use crate::index::{ChainBreak, compute_index};
use crate::io::export::{read_index_csv, write_index_csv};
use crate::io::ingest::load_store_csv;
use crate::panel;
use crate::report::write_summary_json;
use crate::validate::{validate_observations, validate_panel};
use crate::weights::{DegeneratePeriod, build_weights};

/// Per-store processed/skipped/failed distinction.
///
/// `Skipped` is the soft "empty output with a reason" outcome; `Failed` marks
/// store-local errors. Neither stops the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StoreStatus {
    Processed,
    Skipped(String),
    Failed(String),
}

/// Outcome of one store's run, with enough detail to diagnose without
/// rerunning.
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub store_id: String,
    pub status: StoreStatus,
    /// Records written for this store (base period included).
    pub records: usize,
    pub breaks: Vec<ChainBreak>,
    pub degenerate: Vec<DegeneratePeriod>,
    pub row_errors: usize,
}

/// All computed outputs of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub reports: Vec<StoreReport>,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub panel_rows: Option<usize>,
}

/// Execute the full batch: per-store computation in parallel, then optional
/// panel assembly.
pub fn run_batch(config: &BatchConfig) -> Result<BatchOutcome, AppError> {
    fs::create_dir_all(&config.outpath).map_err(|e| {
        AppError::input(format!(
            "Failed to create output directory '{}': {e}",
            config.outpath.display()
        ))
    })?;

    let mut files = list_store_files(&config.store_path)?;
    if files.is_empty() {
        return Err(AppError::empty(format!(
            "No store CSV files found in '{}'",
            config.store_path.display()
        )));
    }
    if let Some(limit) = config.limit {
        files.truncate(limit);
    }

    let reports: Vec<StoreReport> = files
        .par_iter()
        .map(|path| process_store_file(path, config))
        .collect();

    let processed = reports.iter().filter(|r| r.status == StoreStatus::Processed).count();
    let skipped = reports
        .iter()
        .filter(|r| matches!(r.status, StoreStatus::Skipped(_)))
        .count();
    let failed = reports
        .iter()
        .filter(|r| matches!(r.status, StoreStatus::Failed(_)))
        .count();

    let mut outcome = BatchOutcome {
        reports,
        processed,
        skipped,
        failed,
        panel_rows: None,
    };

    if processed == 0 {
        if let Some(summary) = &config.summary_path {
            write_summary_json(summary, &outcome)?;
        }
        return Err(AppError::empty("No store produced index output."));
    }

    if let Some(panel_path) = &config.panel_output_path {
        let processed_files: Vec<PathBuf> = outcome
            .reports
            .iter()
            .filter(|r| r.status == StoreStatus::Processed)
            .map(|r| config.outpath.join(format!("{}.csv", r.store_id)))
            .collect();
        outcome.panel_rows = Some(assemble_panel(&processed_files, panel_path)?);
    }

    if let Some(summary) = &config.summary_path {
        write_summary_json(summary, &outcome)?;
    }

    Ok(outcome)
}

/// Run the per-store pipeline for one file. Never panics; every failure mode
/// lands in the report's status.
pub fn process_store_file(path: &Path, config: &BatchConfig) -> StoreReport {
    let store_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut report = StoreReport {
        store_id: store_id.clone(),
        status: StoreStatus::Processed,
        records: 0,
        breaks: Vec::new(),
        degenerate: Vec::new(),
        row_errors: 0,
    };

    let ingested = match load_store_csv(path, &config.spec, config.subcategory.as_deref()) {
        Ok(ingested) => ingested,
        Err(e) => {
            report.status = StoreStatus::Failed(e.to_string());
            return report;
        }
    };
    report.row_errors = ingested.row_errors.len();

    if ingested.observations.is_empty() {
        report.status = StoreStatus::Skipped("no observations after filters".into());
        return report;
    }

    if let Err(validation) = validate_observations(&ingested.observations) {
        report.status = StoreStatus::Failed(validation.detail());
        return report;
    }

    let weights = build_weights(&ingested.observations, &config.spec);
    report.degenerate = weights.degenerate.clone();

    let record_store_id = ingested.observations[0].store_id.clone();
    let series = match compute_index(&record_store_id, &ingested.observations, &weights, &config.spec) {
        Ok(series) => series,
        Err(e) => {
            report.status = StoreStatus::Skipped(e.to_string());
            return report;
        }
    };
    report.breaks = series.breaks.clone();
    report.records = series.records.len();

    // Same gate as panel assembly: no ±inf or duplicate keys leave this store.
    if let Err(validation) = validate_panel(&series.records) {
        report.status = StoreStatus::Failed(validation.detail());
        return report;
    }

    let out_path = config.outpath.join(format!("{store_id}.csv"));
    if let Err(e) = write_index_csv(&out_path, &series.records) {
        report.status = StoreStatus::Failed(e.to_string());
    }
    report
}

/// Assemble per-store index files into the panel artifact.
///
/// The combined table is re-validated before writing: assembly can
/// reintroduce duplicate-key violations that per-store gates cannot see.
pub fn assemble_panel(files: &[PathBuf], output: &Path) -> Result<usize, AppError> {
    let mut per_store: Vec<Vec<IndexRecord>> = Vec::with_capacity(files.len());
    for file in files {
        per_store.push(read_index_csv(file)?);
    }

    let records = panel::assemble(per_store).map_err(|e| AppError::integrity(e.to_string()))?;
    if let Err(validation) = validate_panel(&records) {
        return Err(AppError::integrity(validation.detail()));
    }

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::input(format!("Failed to create '{}': {e}", parent.display()))
        })?;
    }
    write_index_csv(output, &records)?;
    Ok(records.len())
}

/// Assemble every per-store index file found under a directory.
pub fn build_panel_from_dir(source_dir: &Path, output: &Path) -> Result<usize, AppError> {
    let files = list_store_files(source_dir)?;
    if files.is_empty() {
        return Err(AppError::empty(format!(
            "No store-level index files found in '{}'. Upstream processing produced zero outputs.",
            source_dir.display()
        )));
    }
    assemble_panel(&files, output)
}

/// All `*.csv` files under a directory, sorted by file name for
/// deterministic batch order.
pub fn list_store_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::input(format!("Failed to read directory '{}': {e}", dir.display())))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaseScale, DegeneratePolicy, IndexKind, RunSpec, WeightBasis};

    fn config(root: &Path) -> BatchConfig {
        BatchConfig {
            store_path: root.join("stores"),
            outpath: root.join("out"),
            panel_output_path: Some(root.join("panel/index_panel.csv")),
            summary_path: Some(root.join("summary.json")),
            subcategory: None,
            limit: None,
            spec: RunSpec {
                basis: WeightBasis::Calendar,
                kind: IndexKind::Price,
                degenerate_policy: DegeneratePolicy::Gap,
                scale: BaseScale::One,
            },
        }
    }

    fn write_store(dir: &Path, name: &str, body: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(name),
            format!("store_id,gtin,calendar_year,calendar_month,unit_value_q,quantity\n{body}"),
        )
        .unwrap();
    }

    #[test]
    fn batch_processes_skips_and_assembles() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        write_store(
            &config.store_path,
            "11.csv",
            "11,A,2023,1,1.00,10\n11,B,2023,1,2.00,5\n11,A,2023,2,1.10,10\n11,B,2023,2,2.00,5\n",
        );
        // Single observed period: soft-skipped with a reason.
        write_store(&config.store_path, "22.csv", "22,A,2023,1,1.00,10\n");

        let outcome = run_batch(&config).unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.panel_rows, Some(2));
        assert!(config.outpath.join("11.csv").exists());
        assert!(!config.outpath.join("22.csv").exists());
        assert!(config.summary_path.as_ref().unwrap().exists());

        let panel = read_index_csv(config.panel_output_path.as_ref().unwrap()).unwrap();
        assert_eq!(panel.len(), 2);
        assert!((panel[1].value - 1.05).abs() < 1e-12);
    }

    #[test]
    fn validation_failure_is_store_local() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        write_store(
            &config.store_path,
            "11.csv",
            "11,A,2023,1,1.00,10\n11,A,2023,2,1.10,10\n",
        );
        // Negative price: fails the schema gate.
        write_store(
            &config.store_path,
            "33.csv",
            "33,A,2023,1,-1.00,10\n33,A,2023,2,1.10,10\n",
        );

        let outcome = run_batch(&config).unwrap();
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.failed, 1);
        let failed = outcome.reports.iter().find(|r| r.store_id == "33").unwrap();
        let StoreStatus::Failed(reason) = &failed.status else {
            panic!("expected failure for store 33");
        };
        assert!(reason.contains("non-negative"));
    }

    #[test]
    fn empty_store_root_is_a_hard_empty_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        fs::create_dir_all(&config.store_path).unwrap();
        let err = run_batch(&config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn limit_caps_the_store_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.limit = Some(1);
        config.panel_output_path = None;

        write_store(
            &config.store_path,
            "11.csv",
            "11,A,2023,1,1.00,10\n11,A,2023,2,1.10,10\n",
        );
        write_store(
            &config.store_path,
            "22.csv",
            "22,A,2023,1,1.00,10\n22,A,2023,2,1.10,10\n",
        );

        let outcome = run_batch(&config).unwrap();
        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].store_id, "11");
    }
}
