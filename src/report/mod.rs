//! Reporting utilities: terminal summaries and the JSON batch artifact.
//!
//! We keep formatting code in one place so:
//! - the weighting/chaining code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use std::fs::File;
use std::path::Path;

use crate::app::pipeline::BatchOutcome;
use crate::error::AppError;

pub mod format;

pub use format::*;

/// Write the machine-readable batch summary.
pub fn write_summary_json(path: &Path, outcome: &BatchOutcome) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, outcome)
        .map_err(|e| AppError::input(format!("Failed to write summary JSON: {e}")))?;
    Ok(())
}
