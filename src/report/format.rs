//! Formatted terminal output for batch runs.

use crate::app::pipeline::{BatchOutcome, StoreReport, StoreStatus};
use crate::domain::BatchConfig;

/// Format the full batch summary (configuration + per-store lines + totals).
pub fn format_batch_summary(outcome: &BatchOutcome, config: &BatchConfig) -> String {
    let mut out = String::new();

    out.push_str("=== sidx - store index batch ===\n");
    out.push_str(&format!(
        "Basis: {} | Kind: {} | Scale: {}\n",
        config.spec.basis.as_str(),
        config.spec.kind.as_str(),
        config.spec.scale.factor(),
    ));
    out.push_str(&format!("Stores root: {}\n", config.store_path.display()));
    if let Some(subcategory) = &config.subcategory {
        out.push_str(&format!("Subcategory: {subcategory}\n"));
    }
    out.push('\n');

    for report in &outcome.reports {
        out.push_str(&format_store_line(report));
        out.push('\n');
    }

    out.push_str(&format!(
        "\nStores: {} processed, {} skipped, {} failed ({} total)\n",
        outcome.processed,
        outcome.skipped,
        outcome.failed,
        outcome.reports.len(),
    ));
    if let Some(rows) = outcome.panel_rows {
        out.push_str(&format!("Panel: {rows} rows\n"));
    }

    out
}

/// One status line per store.
pub fn format_store_line(report: &StoreReport) -> String {
    let mut notes = Vec::new();
    if report.row_errors > 0 {
        notes.push(format!("{} row error(s)", report.row_errors));
    }
    if !report.degenerate.is_empty() {
        notes.push(format!("{} degenerate period(s)", report.degenerate.len()));
    }
    for brk in &report.breaks {
        notes.push(format!("chain break at {} ({})", brk.period, brk.detail));
    }
    let notes = if notes.is_empty() {
        String::new()
    } else {
        format!(" [{}]", notes.join("; "))
    };

    match &report.status {
        StoreStatus::Processed => {
            format!("Processed store {} ({} records){notes}", report.store_id, report.records)
        }
        StoreStatus::Skipped(reason) => {
            format!("Skipped store {} - {}{notes}", report.store_id, reason.trim_end())
        }
        StoreStatus::Failed(reason) => {
            format!("Failed store {} - {}{notes}", report.store_id, reason.trim_end())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{BreakKind, ChainBreak};
    use crate::domain::Period;

    #[test]
    fn store_line_carries_break_detail() {
        let report = StoreReport {
            store_id: "28380".into(),
            status: StoreStatus::Processed,
            records: 3,
            breaks: vec![ChainBreak {
                period: Period::new(2023, 4).unwrap(),
                kind: BreakKind::MissingPeriod,
                detail: "no observations between 2023-03 and 2023-05".into(),
            }],
            degenerate: Vec::new(),
            row_errors: 2,
        };
        let line = format_store_line(&report);
        assert!(line.contains("Processed store 28380 (3 records)"));
        assert!(line.contains("2 row error(s)"));
        assert!(line.contains("chain break at 2023-04"));
    }

    #[test]
    fn skipped_line_keeps_the_reason() {
        let report = StoreReport {
            store_id: "9".into(),
            status: StoreStatus::Skipped("single observed period 2023-01; nothing to chain".into()),
            records: 0,
            breaks: Vec::new(),
            degenerate: Vec::new(),
            row_errors: 0,
        };
        assert!(format_store_line(&report).contains("single observed period"));
    }
}
