//! Per-group driver: index the conn log, then retrofit every member.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use super::discover::LogGroup;
use crate::config::RetrofitOptions;
use crate::flow::CommunityId;
use crate::index::{IndexOutcome, IndexStats, UidIndexBuilder};
use crate::retrofit::{RetrofitOutcome, RetrofitReport, RetrofitWriter, SkipReason};

/// Index built for a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub entries: usize,
    pub stats: IndexStats,
}

/// Result for one member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RetrofitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn outcome(&self) -> Option<RetrofitOutcome> {
        self.report.as_ref().map(|r| r.outcome)
    }
}

/// Result for one conn log and its companions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub conn: PathBuf,
    /// `None` when the conn log has no uids or could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSummary>,
    /// Why the index could not be built
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub files: Vec<FileReport>,
}

impl GroupReport {
    /// Number of failures in this group, index build included.
    pub fn failures(&self) -> usize {
        usize::from(self.error.is_some()) + self.files.iter().filter(|f| f.is_failure()).count()
    }
}

/// Index `group.conn`, then retrofit every member of the group.
///
/// Errors are recorded in the report instead of aborting, so one unreadable
/// file never stops its siblings.
pub fn process_group(group: &LogGroup, options: &RetrofitOptions, hasher: CommunityId) -> GroupReport {
    let mut report = GroupReport {
        conn: group.conn.clone(),
        index: None,
        error: None,
        files: Vec::with_capacity(group.members.len()),
    };

    let builder = UidIndexBuilder::new(&options.fields, hasher);
    let index = match builder.build(&group.conn) {
        Ok(IndexOutcome::Built(index)) => index,
        Ok(IndexOutcome::NoUid) => {
            info!(conn = %group.conn.display(), "conn log has no uids, skipping group");
            return report;
        }
        Err(e) => {
            warn!(conn = %group.conn.display(), error = %e, "failed to build index");
            report.error = Some(e.to_string());
            return report;
        }
    };
    report.index = Some(IndexSummary {
        entries: index.len(),
        stats: *index.stats(),
    });

    let writer = RetrofitWriter::new(options);
    for path in &group.members {
        let file = match writer.retrofit(&index, path) {
            Ok(r) => FileReport {
                path: path.clone(),
                report: Some(r),
                error: None,
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "retrofit failed");
                FileReport {
                    path: path.clone(),
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        };
        report.files.push(file);
    }

    report
}

/// Aggregate counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub groups: usize,
    pub files: usize,
    pub enriched: usize,
    pub records_enriched: u64,
    pub skipped_no_uid: usize,
    pub skipped_already_present: usize,
    pub skipped_no_matching_uids: usize,
    pub failed: usize,
}

/// An input directory that could not be searched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFailure {
    pub dir: PathBuf,
    pub error: String,
}

/// Reports for every group processed in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_failures: Vec<SearchFailure>,
    pub groups: Vec<GroupReport>,
    pub totals: Totals,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Record a directory whose search failed; it counts as a failure.
    pub fn push_search_failure(&mut self, dir: impl Into<PathBuf>, error: impl ToString) {
        self.totals.failed += 1;
        self.search_failures.push(SearchFailure {
            dir: dir.into(),
            error: error.to_string(),
        });
    }

    pub fn push(&mut self, group: GroupReport) {
        let t = &mut self.totals;
        t.groups += 1;
        t.failed += group.failures();
        for file in &group.files {
            t.files += 1;
            match file.outcome() {
                Some(RetrofitOutcome::Enriched(n)) => {
                    t.enriched += 1;
                    t.records_enriched += n;
                }
                Some(RetrofitOutcome::Skipped(SkipReason::NoUid)) => t.skipped_no_uid += 1,
                Some(RetrofitOutcome::Skipped(SkipReason::AlreadyPresent)) => {
                    t.skipped_already_present += 1
                }
                Some(RetrofitOutcome::Skipped(SkipReason::NoMatchingUids)) => {
                    t.skipped_no_matching_uids += 1
                }
                None => {}
            }
        }
        self.groups.push(group);
    }

    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0
    }
}
