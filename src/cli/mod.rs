//! Command-line interface for wordveil.
//!
//! Provides commands for daily puzzle records, the midnight trigger,
//! interactive play and session export.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
