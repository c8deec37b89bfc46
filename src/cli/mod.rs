//! Command-line interface module.
//!
//! This module handles:
//! - Argument parsing via clap
//! - Discovery of conn logs and their companions
//! - Running each log group through the engine
//! - Summary output (table or JSON)

mod args;
mod discover;
mod output;
mod run;

pub use args::Args;
pub use discover::{Discovery, LogGroup};
pub use output::{OutputFormat, OutputFormatter};
pub use run::{
    process_group, FileReport, GroupReport, IndexSummary, RunSummary, SearchFailure, Totals,
};
