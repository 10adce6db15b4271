//! Structural validation of observation tables and assembled panels.
//!
//! Validation is an explicit function returning a structured result rather
//! than exception-style control flow, so batch callers can log complete
//! diagnostics for one store and keep processing the rest.
//!
//! Design goals:
//! - **Enumerate every violation**, not just the first
//! - **Pure checks**: no mutation, no side effects
//! - Enough detail (store id, period, column) to diagnose without rerunning

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::domain::{IndexKind, IndexRecord, Observation, Period, WeightBasis};

/// One violated check on one row (or key) of a table.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Ordinal of the offending observation/record within the table, when
    /// the check is row-local.
    pub row: Option<usize>,
    pub store_id: Option<String>,
    pub column: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(row) = self.row {
            write!(f, "row {row}: ")?;
        }
        if let Some(store) = &self.store_id {
            write!(f, "store {store}: ")?;
        }
        write!(f, "{}: {}", self.column, self.message)
    }
}

/// Malformed input or output data, with the complete violation list.
#[derive(Debug, Clone, Error)]
#[error("{context}: {} schema violation(s)", .violations.len())]
pub struct ValidationError {
    pub context: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Multi-line listing of every violation, for logs and `check` output.
    pub fn detail(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{}: {} schema violation(s)\n",
            self.context,
            self.violations.len()
        ));
        for v in &self.violations {
            out.push_str(&format!("  - {v}\n"));
        }
        out
    }
}

/// Validate a single store's observation table.
///
/// Checks: non-empty identifiers, finite non-negative numeric fields, a
/// single store id per table, and (store, product, period) key uniqueness.
pub fn validate_observations(observations: &[Observation]) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    let mut seen_keys: HashMap<(String, Period), usize> = HashMap::new();
    let first_store = observations.first().map(|o| o.store_id.clone());

    for (row, obs) in observations.iter().enumerate() {
        let row = row + 1;
        let store = Some(obs.store_id.clone());

        if obs.store_id.trim().is_empty() {
            violations.push(Violation {
                row: Some(row),
                store_id: None,
                column: "store_id".into(),
                message: "identifier is empty".into(),
            });
        } else if let Some(first) = &first_store
            && obs.store_id != *first
        {
            violations.push(Violation {
                row: Some(row),
                store_id: store.clone(),
                column: "store_id".into(),
                message: format!("mixed store identifiers in one table (expected {first})"),
            });
        }

        if obs.product_id.trim().is_empty() {
            violations.push(Violation {
                row: Some(row),
                store_id: store.clone(),
                column: "gtin".into(),
                message: "identifier is empty".into(),
            });
        }

        check_non_negative(&mut violations, row, &store, "price", obs.price);
        check_non_negative(&mut violations, row, &store, "quantity", obs.quantity);
        if let Some(revenue) = obs.revenue {
            check_non_negative(&mut violations, row, &store, "revenue", revenue);
        }

        let key = (obs.product_id.clone(), obs.period);
        if let Some(first_row) = seen_keys.get(&key) {
            violations.push(Violation {
                row: Some(row),
                store_id: store,
                column: "gtin,period".into(),
                message: format!(
                    "duplicate (store, product, period) key ({}, {}) first seen at row {first_row}",
                    key.0, key.1
                ),
            });
        } else {
            seen_keys.insert(key, row);
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            context: "store observations".into(),
            violations,
        })
    }
}

/// Validate an index record table (per-store output or assembled panel).
///
/// Checks: finite positive index levels, finite logs, and
/// (store, period, kind, basis) key uniqueness. No ±inf survives this gate.
pub fn validate_panel(records: &[IndexRecord]) -> Result<(), ValidationError> {
    let mut violations = Vec::new();
    let mut seen: HashSet<(String, Period, IndexKind, WeightBasis)> = HashSet::new();

    for (row, record) in records.iter().enumerate() {
        let row = row + 1;
        let store = Some(record.store_id.clone());

        if record.store_id.trim().is_empty() {
            violations.push(Violation {
                row: Some(row),
                store_id: None,
                column: "store_id".into(),
                message: "identifier is empty".into(),
            });
        }

        if !record.value.is_finite() || record.value <= 0.0 {
            violations.push(Violation {
                row: Some(row),
                store_id: store.clone(),
                column: "index".into(),
                message: format!("index level must be finite and positive (got {})", record.value),
            });
        }
        if !record.log_value.is_finite() {
            violations.push(Violation {
                row: Some(row),
                store_id: store.clone(),
                column: "log_index".into(),
                message: format!("log index must be finite (got {})", record.log_value),
            });
        }

        let key = (
            record.store_id.clone(),
            record.period,
            record.kind,
            record.basis,
        );
        if !seen.insert(key) {
            violations.push(Violation {
                row: Some(row),
                store_id: store,
                column: "store_id,period,index_kind,weight_basis".into(),
                message: format!(
                    "duplicate panel key ({}, {}, {}, {})",
                    record.store_id,
                    record.period,
                    record.kind.as_str(),
                    record.basis.as_str()
                ),
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            context: "index panel".into(),
            violations,
        })
    }
}

fn check_non_negative(
    violations: &mut Vec<Violation>,
    row: usize,
    store: &Option<String>,
    column: &str,
    value: f64,
) {
    if !value.is_finite() {
        violations.push(Violation {
            row: Some(row),
            store_id: store.clone(),
            column: column.into(),
            message: format!("value must be finite (got {value})"),
        });
    } else if value < 0.0 {
        violations.push(Violation {
            row: Some(row),
            store_id: store.clone(),
            column: column.into(),
            message: format!("value must be non-negative (got {value})"),
        });
    }
}
