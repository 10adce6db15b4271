//! CSV ingest and normalization for store-product-month tables.
//!
//! This module turns a raw per-store scanner export into clean
//! [`Observation`]s ready for weighting and chaining.
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden inference)
//! - **Separation of concerns**: no weighting or chaining logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Observation, Period, RunSpec, WeightBasis, fiscal};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: normalized observations + row errors + counts.
#[derive(Debug, Clone)]
pub struct IngestedStore {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Load and normalize a store CSV, applying the GTIN and subcategory filters.
///
/// Rows that fail to parse are collected as [`RowError`]s rather than
/// aborting the store; an empty result is not an error here — the caller
/// decides whether empty means skip.
pub fn load_store_csv(
    path: &Path,
    spec: &RunSpec,
    subcategory: Option<&str>,
) -> Result<IngestedStore, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open store CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers in '{}': {e}", path.display())))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map, spec)
        .map_err(|message| AppError::input(format!("{}: {message}", path.display())))?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header row and CSV line
        // numbers are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map, spec, subcategory) {
            Ok(Some(obs)) => observations.push(obs),
            Ok(None) => {} // filtered out
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    let rows_used = observations.len();
    Ok(IngestedStore {
        observations,
        row_errors,
        rows_read,
        rows_used,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on
    // the first header. If we don't strip it, schema validation will
    // incorrectly report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(
    header_map: &HashMap<String, usize>,
    spec: &RunSpec,
) -> Result<(), String> {
    for name in ["store_id", "gtin", "quantity"] {
        if !header_map.contains_key(name) {
            return Err(format!("Missing required column: `{name}`"));
        }
    }
    if !header_map.contains_key("unit_value_q") && !header_map.contains_key("price") {
        return Err("Missing required column: `unit_value_q` (or `price`)".to_string());
    }

    let has_calendar = header_map.contains_key("calendar_year") && header_map.contains_key("calendar_month");
    if !has_calendar && !header_map.contains_key("date") {
        return Err(
            "Missing required period columns: `calendar_year` + `calendar_month` (or `date`)".to_string(),
        );
    }

    if spec.basis == WeightBasis::Fiscal
        && header_map.contains_key("fiscal_year") != header_map.contains_key("fiscal_month")
    {
        return Err(
            "Fiscal basis needs both `fiscal_year` and `fiscal_month` when either is present".to_string(),
        );
    }

    Ok(())
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    spec: &RunSpec,
    subcategory: Option<&str>,
) -> Result<Option<Observation>, String> {
    // Filters first: non-GTIN scan rows and other subcategories are not
    // observations for this run.
    if let Some(scan_type) = get_optional(record, header_map, "scan_type")
        && scan_type != "GTIN"
    {
        return Ok(None);
    }
    if !matches_filter(get_optional(record, header_map, "subcategory"), subcategory) {
        return Ok(None);
    }

    let store_id = get_required(record, header_map, "store_id")?.to_string();
    let product_id = get_required(record, header_map, "gtin")?.to_string();
    let product_type = get_optional(record, header_map, "product_type").map(str::to_string);

    let calendar = parse_calendar_period(record, header_map)?;
    let period = match spec.basis {
        WeightBasis::Calendar => calendar,
        WeightBasis::Fiscal => parse_fiscal_period(record, header_map, calendar)?,
    };

    let quantity = parse_f64(get_required(record, header_map, "quantity")?, "quantity")?;
    let price_field = get_optional(record, header_map, "unit_value_q")
        .or_else(|| get_optional(record, header_map, "price"))
        .ok_or_else(|| "Missing required value: `unit_value_q`".to_string())?;
    let price = parse_f64(price_field, "unit_value_q")?;

    let revenue = parse_opt_f64(
        get_optional(record, header_map, "total_revenue_amount")
            .or_else(|| get_optional(record, header_map, "revenue")),
    );

    Ok(Some(Observation {
        store_id,
        product_id,
        product_type,
        period,
        price,
        quantity,
        revenue,
    }))
}

fn parse_calendar_period(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> Result<Period, String> {
    if header_map.contains_key("calendar_year") && header_map.contains_key("calendar_month") {
        let year: i32 = get_required(record, header_map, "calendar_year")?
            .parse()
            .map_err(|_| "Invalid `calendar_year` (expected an integer)".to_string())?;
        let month: u32 = get_required(record, header_map, "calendar_month")?
            .parse()
            .map_err(|_| "Invalid `calendar_month` (expected an integer)".to_string())?;
        Period::new(year, month)
            .ok_or_else(|| format!("Invalid calendar period {year}-{month} (month must be 1-12)"))
    } else {
        get_required(record, header_map, "date")?.parse::<Period>()
    }
}

fn parse_fiscal_period(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    calendar: Period,
) -> Result<Period, String> {
    // Explicit retailer fiscal columns win (possibly week-aligned); otherwise
    // derive from the calendar month via the July-June map.
    if !header_map.contains_key("fiscal_year") {
        return Ok(fiscal::to_fiscal(calendar));
    }
    let year: i32 = get_required(record, header_map, "fiscal_year")?
        .parse()
        .map_err(|_| "Invalid `fiscal_year` (expected an integer)".to_string())?;
    let month: u32 = get_required(record, header_map, "fiscal_month")?
        .parse()
        .map_err(|_| "Invalid `fiscal_month` (expected an integer)".to_string())?;
    Period::new(year, month)
        .ok_or_else(|| format!("Invalid fiscal period {year}-{month} (month must be 1-12)"))
}

fn matches_filter(value: Option<&str>, filter: Option<&str>) -> bool {
    let Some(filter) = filter else { return true };
    let Some(value) = value else { return false };
    value.trim().eq_ignore_ascii_case(filter.trim())
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{s}' (expected a number)"))
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    Some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaseScale, DegeneratePolicy, IndexKind};
    use std::io::Write;

    fn spec(basis: WeightBasis) -> RunSpec {
        RunSpec {
            basis,
            kind: IndexKind::Price,
            degenerate_policy: DegeneratePolicy::Gap,
            scale: BaseScale::One,
        }
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_a_minimal_store_table() {
        let file = write_csv(
            "store_id,gtin,calendar_year,calendar_month,unit_value_q,quantity\n\
             77,A,2023,1,1.00,10\n\
             77,B,2023,1,2.00,5\n",
        );
        let ingested = load_store_csv(file.path(), &spec(WeightBasis::Calendar), None).unwrap();
        assert_eq!(ingested.rows_read, 2);
        assert_eq!(ingested.rows_used, 2);
        assert!(ingested.row_errors.is_empty());
        assert_eq!(ingested.observations[0].period, Period::new(2023, 1).unwrap());
        assert_eq!(ingested.observations[0].price, 1.00);
    }

    #[test]
    fn non_gtin_rows_and_other_subcategories_are_filtered() {
        let file = write_csv(
            "store_id,gtin,calendar_year,calendar_month,unit_value_q,quantity,scan_type,subcategory\n\
             77,A,2023,1,1.00,10,GTIN,Vaping Products\n\
             77,B,2023,1,2.00,5,NONSCAN,Vaping Products\n\
             77,C,2023,1,3.00,2,GTIN,Cigarettes\n",
        );
        let ingested =
            load_store_csv(file.path(), &spec(WeightBasis::Calendar), Some("Vaping Products")).unwrap();
        assert_eq!(ingested.rows_used, 1);
        assert_eq!(ingested.observations[0].product_id, "A");
    }

    #[test]
    fn bad_rows_are_reported_not_fatal() {
        let file = write_csv(
            "store_id,gtin,calendar_year,calendar_month,unit_value_q,quantity\n\
             77,A,2023,1,1.00,10\n\
             77,B,2023,13,2.00,5\n\
             77,C,2023,2,not-a-number,5\n",
        );
        let ingested = load_store_csv(file.path(), &spec(WeightBasis::Calendar), None).unwrap();
        assert_eq!(ingested.rows_used, 1);
        assert_eq!(ingested.row_errors.len(), 2);
        assert_eq!(ingested.row_errors[0].line, 3);
        assert!(ingested.row_errors[1].message.contains("unit_value_q"));
    }

    #[test]
    fn fiscal_basis_derives_periods_from_the_calendar_map() {
        let file = write_csv(
            "store_id,gtin,calendar_year,calendar_month,unit_value_q,quantity\n\
             77,A,2022,7,1.00,10\n",
        );
        let ingested = load_store_csv(file.path(), &spec(WeightBasis::Fiscal), None).unwrap();
        assert_eq!(ingested.observations[0].period, Period::new(2023, 1).unwrap());
    }

    #[test]
    fn explicit_fiscal_columns_override_the_map() {
        let file = write_csv(
            "store_id,gtin,calendar_year,calendar_month,fiscal_year,fiscal_month,unit_value_q,quantity\n\
             77,A,2022,7,2023,2,1.00,10\n",
        );
        let ingested = load_store_csv(file.path(), &spec(WeightBasis::Fiscal), None).unwrap();
        assert_eq!(ingested.observations[0].period, Period::new(2023, 2).unwrap());
    }

    #[test]
    fn missing_required_columns_are_a_hard_error() {
        let file = write_csv("store_id,gtin,unit_value_q,quantity\n77,A,1.0,10\n");
        let err = load_store_csv(file.path(), &spec(WeightBasis::Calendar), None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("calendar_year"));
    }
}
