//! Write and re-read index record CSVs.
//!
//! The same format serves per-store outputs and the assembled panel. Levels
//! are written with `{}` (shortest round-trippable float formatting) so that
//! assembling and re-splitting the panel reproduces per-store outputs
//! bit-for-bit.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{IndexKind, IndexRecord, Period, WeightBasis, fiscal};
use crate::error::AppError;

const HEADER: &str = "store_id,period,date,index_kind,weight_basis,base_period,index,log_index";

/// Write index records to a CSV file.
pub fn write_index_csv(path: &Path, records: &[IndexRecord]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create index CSV '{}': {e}", path.display())))?;

    writeln!(file, "{HEADER}")
        .map_err(|e| AppError::input(format!("Failed to write index CSV header: {e}")))?;

    for r in records {
        let date = fiscal::nominal_first_day(r.period, r.basis)
            .map(|d| d.to_string())
            .unwrap_or_default();
        writeln!(
            file,
            "{},{},{},{},{},{},{},{}",
            r.store_id,
            r.period,
            date,
            r.kind.as_str(),
            r.basis.as_str(),
            r.base_period,
            r.value,
            r.log_value,
        )
        .map_err(|e| AppError::input(format!("Failed to write index CSV row: {e}")))?;
    }

    Ok(())
}

/// Read index records back from a CSV produced by [`write_index_csv`].
///
/// These are our own artifacts, so any malformed row is a hard error rather
/// than a skip.
pub fn read_index_csv(path: &Path) -> Result<Vec<IndexRecord>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open index CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read index CSV headers: {e}")))?
        .clone();
    let idx = |name: &str| -> Result<usize, AppError> {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                AppError::input(format!(
                    "Index CSV '{}' is missing required column `{name}`",
                    path.display()
                ))
            })
    };

    let store_idx = idx("store_id")?;
    let period_idx = idx("period")?;
    let kind_idx = idx("index_kind")?;
    let basis_idx = idx("weight_basis")?;
    let base_idx = idx("base_period")?;
    let value_idx = idx("index")?;
    let log_idx = idx("log_index")?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = row + 2;
        let record = result
            .map_err(|e| AppError::input(format!("{} line {line}: CSV parse error: {e}", path.display())))?;
        let field = |i: usize, name: &str| -> Result<&str, AppError> {
            record.get(i).filter(|s| !s.is_empty()).ok_or_else(|| {
                AppError::input(format!("{} line {line}: missing `{name}` value", path.display()))
            })
        };

        let period: Period = field(period_idx, "period")?
            .parse()
            .map_err(|e| AppError::input(format!("{} line {line}: {e}", path.display())))?;
        let base_period: Period = field(base_idx, "base_period")?
            .parse()
            .map_err(|e| AppError::input(format!("{} line {line}: {e}", path.display())))?;
        let kind = IndexKind::parse(field(kind_idx, "index_kind")?).ok_or_else(|| {
            AppError::input(format!("{} line {line}: invalid `index_kind`", path.display()))
        })?;
        let basis = WeightBasis::parse(field(basis_idx, "weight_basis")?).ok_or_else(|| {
            AppError::input(format!("{} line {line}: invalid `weight_basis`", path.display()))
        })?;
        let value: f64 = field(value_idx, "index")?
            .parse()
            .map_err(|_| AppError::input(format!("{} line {line}: invalid `index` value", path.display())))?;
        let log_value: f64 = field(log_idx, "log_index")?
            .parse()
            .map_err(|_| AppError::input(format!("{} line {line}: invalid `log_index` value", path.display())))?;

        records.push(IndexRecord {
            store_id: field(store_idx, "store_id")?.to_string(),
            period,
            kind,
            basis,
            base_period,
            value,
            log_value,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Period;

    fn p(year: i32, month: u32) -> Period {
        Period::new(year, month).unwrap()
    }

    fn record(period: Period, value: f64) -> IndexRecord {
        IndexRecord {
            store_id: "28380".into(),
            period,
            kind: IndexKind::Price,
            basis: WeightBasis::Fiscal,
            base_period: p(2023, 1),
            value,
            log_value: value.ln(),
        }
    }

    #[test]
    fn write_read_round_trip_is_exact() {
        let records = vec![
            record(p(2023, 1), 1.0),
            record(p(2023, 2), 1.0500000000000003),
            record(p(2023, 3), 0.9731217382945),
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("28380.csv");

        write_index_csv(&path, &records).unwrap();
        let reloaded = read_index_csv(&path).unwrap();

        assert_eq!(reloaded.len(), records.len());
        for (a, b) in records.iter().zip(&reloaded) {
            assert_eq!(a, b);
            assert_eq!(a.value.to_bits(), b.value.to_bits());
        }
    }

    #[test]
    fn fiscal_periods_render_their_nominal_calendar_date() {
        let records = vec![record(p(2023, 1), 1.0)];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.csv");
        write_index_csv(&path, &records).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        // Fiscal month 1 of FY2023 is July 2022.
        assert!(content.contains("2022-07-01"));
    }

    #[test]
    fn missing_columns_are_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "store_id,period\n1,2023-01\n").unwrap();
        let err = read_index_csv(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
