//! `scan-index` library crate.
//!
//! The binary (`sidx`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the per-store engine stays usable on its own (notebook-style runs,
//!   alternative orchestrators)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod index;
pub mod io;
pub mod panel;
pub mod report;
pub mod validate;
pub mod weights;
