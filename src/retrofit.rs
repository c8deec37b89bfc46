//! Streaming insertion of community ids into a companion log.
//!
//! Per file: inspect the first record, stream every line through the
//! [`RecordView`] locator inserting the id after matching uids, then commit
//! the staged output atomically or throw it away. Source files are only ever
//! replaced by a complete, synced copy.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RetrofitOptions;
use crate::error::{IoResultExt, Result};
use crate::index::UidIndex;
use crate::io::{Compression, LogReader, StagedOutput};
use crate::record::{FirstRecord, LineIssue, RecordView};

/// Why a file was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// First record has no uid field
    NoUid,
    /// First record already carries the correlation id
    AlreadyPresent,
    /// No record's uid is in the index
    NoMatchingUids,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoUid => write!(f, "no uid"),
            SkipReason::AlreadyPresent => write!(f, "already present"),
            SkipReason::NoMatchingUids => write!(f, "no matching uids"),
        }
    }
}

/// Terminal state of one retrofit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrofitOutcome {
    /// Ids inserted into this many records
    Enriched(u64),
    Skipped(SkipReason),
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrofitReport {
    pub source: PathBuf,
    /// Where enriched output went (or would go, on a dry run)
    pub destination: Option<PathBuf>,
    pub outcome: RetrofitOutcome,
    pub compression: Compression,
    /// Lines streamed
    pub lines: u64,
    /// Lines passed through because they are not valid JSON objects
    pub skipped_lines: u64,
    /// Lines passed through because they already carry the id
    pub already_tagged: u64,
    pub dry_run: bool,
}

impl RetrofitReport {
    fn new(source: &Path, compression: Compression, dry_run: bool) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: None,
            outcome: RetrofitOutcome::Skipped(SkipReason::NoUid),
            compression,
            lines: 0,
            skipped_lines: 0,
            already_tagged: 0,
            dry_run,
        }
    }

    fn skipped(mut self, reason: SkipReason) -> Self {
        self.outcome = RetrofitOutcome::Skipped(reason);
        self
    }
}

/// Inserts correlation ids from a [`UidIndex`] into log files.
#[derive(Debug, Clone)]
pub struct RetrofitWriter<'a> {
    options: &'a RetrofitOptions,
}

impl<'a> RetrofitWriter<'a> {
    pub fn new(options: &'a RetrofitOptions) -> Self {
        Self { options }
    }

    /// Retrofit `source` using `index`.
    ///
    /// Skips (without creating or touching any file) logs whose first record
    /// has no uid or already has the id, and logs sharing no uid with the
    /// index. Fails only on I/O errors; the source is intact in that case.
    pub fn retrofit(&self, index: &UidIndex, source: impl AsRef<Path>) -> Result<RetrofitReport> {
        let source = source.as_ref();
        let fields = &self.options.fields;

        let mut reader = LogReader::open(source)?;
        let report = RetrofitReport::new(source, reader.compression(), self.options.dry_run);

        match FirstRecord::read(&mut reader, &fields.uid, &fields.community_id)? {
            FirstRecord::WithUid { has_id_field: true } => {
                info!(path = %source.display(), "{} already present, skipping", fields.community_id);
                return Ok(report.skipped(SkipReason::AlreadyPresent));
            }
            FirstRecord::WithUid { .. } => {}
            FirstRecord::WithoutUid | FirstRecord::Missing => {
                debug!(path = %source.display(), "no uid in first record, skipping");
                return Ok(report.skipped(SkipReason::NoUid));
            }
        }
        drop(reader);

        let destination = self.options.mode.destination(source);
        self.stream(index, source, destination, report)
    }

    fn stream(
        &self,
        index: &UidIndex,
        source: &Path,
        destination: PathBuf,
        mut report: RetrofitReport,
    ) -> Result<RetrofitReport> {
        let fields = &self.options.fields;

        // Reopen so streaming starts from the first byte again.
        let mut reader = LogReader::open(source)?;
        let mut staged = if self.options.dry_run {
            None
        } else {
            Some(StagedOutput::create(&destination, reader.compression())?)
        };

        let mut inserted = 0u64;
        let mut line = Vec::new();
        let mut enriched = Vec::new();

        while reader.read_line(&mut line)? {
            report.lines += 1;
            enriched.clear();

            let output: &[u8] = match RecordView::parse(&line, &fields.uid, &fields.community_id) {
                Ok(view) if view.has_id_field() => {
                    report.already_tagged += 1;
                    line.as_slice()
                }
                Ok(view) => match view.uid().and_then(|uid| index.get(&uid)) {
                    Some(id) => {
                        view.insert_after_uid(&fields.community_id, id.as_str(), &mut enriched);
                        inserted += 1;
                        enriched.as_slice()
                    }
                    None => line.as_slice(),
                },
                Err(LineIssue::Blank) => line.as_slice(),
                Err(LineIssue::Malformed) => {
                    report.skipped_lines += 1;
                    debug!(path = %source.display(), line = report.lines, "malformed line passed through");
                    line.as_slice()
                }
            };

            if let Some(staged) = staged.as_mut() {
                staged.write_all(output).at_path(&destination)?;
            }
        }
        drop(reader);

        if inserted == 0 {
            if let Some(staged) = staged {
                staged.discard();
            }
            info!(path = %source.display(), index = %index.source().display(), "no matching uids, nothing written");
            return Ok(report.skipped(SkipReason::NoMatchingUids));
        }

        report.outcome = RetrofitOutcome::Enriched(inserted);
        report.destination = Some(destination.clone());

        match staged {
            Some(staged) => {
                staged.commit(source_permissions(source))?;
                info!(
                    path = %source.display(),
                    destination = %destination.display(),
                    inserted,
                    "enriched"
                );
            }
            None => {
                info!(
                    path = %source.display(),
                    destination = %destination.display(),
                    inserted,
                    "dry run: would enrich"
                );
            }
        }

        Ok(report)
    }
}

/// Permissions to give the output, or `None` (with a warning) if the
/// source's metadata cannot be read.
fn source_permissions(source: &Path) -> Option<fs::Permissions> {
    match fs::metadata(source) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) => {
            warn!(
                path = %source.display(),
                error = %e,
                "cannot read source permissions, output keeps the temporary file's mode"
            );
            None
        }
    }
}
