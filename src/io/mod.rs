//! Input/output helpers.
//!
//! - store CSV ingest + row-level validation (`ingest`)
//! - index record CSV write/read (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
