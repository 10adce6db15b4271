//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input configuration enums (`WeightBasis`, `IndexKind`, `DegeneratePolicy`, `BaseScale`)
//! - the ordered monthly `Period` and its fiscal-calendar mapping
//! - raw `Observation` rows and computed `IndexRecord` outputs
//! - the immutable per-run specification (`RunSpec`, `BatchConfig`)

pub mod fiscal;
pub mod types;

pub use types::*;
