//! Command-line argument definitions.

use clap::Parser;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::{FieldNames, OutputMode, RetrofitOptions, DEFAULT_ID_FIELD};
use crate::flow::CommunityId;

/// Add Community ID flow hashes to recorded Zeek JSON logs.
#[derive(Parser, Debug)]
#[command(name = "cidretro")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directories to search (recursively) for conn logs and their companions
    #[arg(value_name = "DIR", default_value = ".")]
    pub dirs: Vec<PathBuf>,

    /// Replace each log in place instead of writing a `.new.log` sibling
    #[arg(long = "overwrite")]
    pub overwrite: bool,

    /// Compute and report everything, but write nothing
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Community ID seed
    #[arg(long = "seed", default_value_t = 0)]
    pub seed: u16,

    /// Name of the connection uid field
    #[arg(long = "uid-field", value_name = "NAME", default_value = "uid")]
    pub uid_field: String,

    /// Name of the field to insert
    #[arg(long = "id-field", value_name = "NAME", default_value = DEFAULT_ID_FIELD)]
    pub id_field: String,

    /// Summary format for stdout
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Show a progress spinner over log groups
    #[arg(long = "progress")]
    pub progress: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Engine options for this invocation.
    pub fn retrofit_options(&self) -> RetrofitOptions {
        let mode = if self.overwrite {
            OutputMode::InPlace
        } else {
            OutputMode::Sibling
        };
        let fields = FieldNames {
            uid: self.uid_field.clone(),
            community_id: self.id_field.clone(),
            ..FieldNames::default()
        };
        RetrofitOptions::new(mode)
            .with_fields(fields)
            .with_dry_run(self.dry_run)
    }

    pub fn hasher(&self) -> CommunityId {
        CommunityId::new(self.seed)
    }

    /// Tracing filter directive for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
