//! Panel assembly: concatenate per-store index series into one table.
//!
//! A duplicate (store, period, kind, basis) key indicates an upstream
//! orchestration bug (e.g. a store processed twice) and aborts assembly with
//! every conflicting key listed. Nothing is deduplicated silently.

use std::collections::HashSet;

use thiserror::Error;

use crate::domain::{IndexKind, IndexRecord, Period, WeightBasis};

/// The unique key of one panel row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PanelKey {
    pub store_id: String,
    pub period: Period,
    pub kind: IndexKind,
    pub basis: WeightBasis,
}

impl std::fmt::Display for PanelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.store_id,
            self.period,
            self.kind.as_str(),
            self.basis.as_str()
        )
    }
}

/// Conflicting keys found while assembling a panel. Fatal for the run.
#[derive(Debug, Clone, Error)]
#[error("{} duplicate panel key(s): {}", .keys.len(), render_keys(.keys))]
pub struct DuplicateKeyError {
    pub keys: Vec<PanelKey>,
}

fn render_keys(keys: &[PanelKey]) -> String {
    keys.iter()
        .map(PanelKey::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Concatenate per-store record sequences, preserving input ordering.
pub fn assemble(per_store: Vec<Vec<IndexRecord>>) -> Result<Vec<IndexRecord>, DuplicateKeyError> {
    let mut panel: Vec<IndexRecord> = Vec::with_capacity(per_store.iter().map(Vec::len).sum());
    let mut seen: HashSet<PanelKey> = HashSet::new();
    let mut duplicates: Vec<PanelKey> = Vec::new();

    for records in per_store {
        for record in records {
            let key = PanelKey {
                store_id: record.store_id.clone(),
                period: record.period,
                kind: record.kind,
                basis: record.basis,
            };
            if !seen.insert(key.clone()) {
                duplicates.push(key);
            }
            panel.push(record);
        }
    }

    if duplicates.is_empty() {
        Ok(panel)
    } else {
        Err(DuplicateKeyError { keys: duplicates })
    }
}
