//! cidretro CLI entry point.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cidretro::cli::{process_group, Args, Discovery, LogGroup, OutputFormatter, RunSummary};

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_filter().into()),
        )
        .init();

    let options = args.retrofit_options();
    let hasher = args.hasher();

    let mut summary = RunSummary::new(options.dry_run);

    let discovery = Discovery::new().context("Failed to compile log name pattern")?;
    let mut groups: Vec<LogGroup> = Vec::new();
    for dir in &args.dirs {
        match discovery.discover(dir) {
            Ok(found) => {
                if found.is_empty() {
                    warn!(dir = %dir.display(), "no conn logs found");
                }
                groups.extend(found);
            }
            Err(e) => {
                error!(dir = %dir.display(), error = %e, "failed to search directory");
                summary.push_search_failure(dir, e);
            }
        }
    }
    info!(groups = groups.len(), dry_run = options.dry_run, "starting retrofit");

    let progress = args.progress.then(|| spinner(groups.len() as u64));

    for group in &groups {
        if let Some(pb) = &progress {
            pb.set_message(group.conn.display().to_string());
        }
        summary.push(process_group(group, &options, hasher));
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let formatter = OutputFormatter::new(args.format);
    let mut stdout = io::stdout().lock();
    formatter
        .write(&summary, &mut stdout)
        .context("Failed to write summary")?;

    if summary.has_failures() {
        warn!(failed = summary.totals.failed, "some files could not be processed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn spinner(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    pb
}
