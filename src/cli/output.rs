//! Run summary output.
//!
//! One row per file processed, then the run totals, as a table or as a
//! single JSON document.

use std::io::Write;

use clap::ValueEnum;
use comfy_table::{Cell, Table};

use super::run::{FileReport, GroupReport, RunSummary};
use crate::error::Result;
use crate::retrofit::RetrofitOutcome;

/// Supported summary formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table (default)
    #[default]
    Table,
    /// A single JSON document
    Json,
}

/// Formats run summaries for output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format `summary` and write it to `writer`.
    pub fn write<W: Write>(&self, summary: &RunSummary, writer: &mut W) -> Result<()> {
        match self.format {
            OutputFormat::Table => self.write_table(summary, writer),
            OutputFormat::Json => self.write_json(summary, writer),
        }
    }

    fn write_table<W: Write>(&self, summary: &RunSummary, writer: &mut W) -> Result<()> {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("file"),
            Cell::new("conn"),
            Cell::new("outcome"),
            Cell::new("records"),
            Cell::new("destination"),
        ]);

        for failure in &summary.search_failures {
            table.add_row(vec![
                Cell::new(failure.dir.display()),
                Cell::new(""),
                Cell::new(format!("search failed: {}", failure.error)),
                Cell::new(""),
                Cell::new(""),
            ]);
        }
        for group in &summary.groups {
            if let Some(error) = &group.error {
                table.add_row(vec![
                    Cell::new(group.conn.display()),
                    Cell::new(group.conn.display()),
                    Cell::new(format!("index failed: {error}")),
                    Cell::new(""),
                    Cell::new(""),
                ]);
            }
            for file in &group.files {
                table.add_row(file_row(group, file));
            }
        }

        writeln!(writer, "{table}")?;

        let t = &summary.totals;
        writeln!(
            writer,
            "{} group(s), {} file(s): {} enriched ({} records), {} no uid, {} already present, {} no matching uids, {} failed{}",
            t.groups,
            t.files,
            t.enriched,
            t.records_enriched,
            t.skipped_no_uid,
            t.skipped_already_present,
            t.skipped_no_matching_uids,
            t.failed,
            if summary.dry_run { " (dry run)" } else { "" },
        )?;
        Ok(())
    }

    fn write_json<W: Write>(&self, summary: &RunSummary, writer: &mut W) -> Result<()> {
        serde_json::to_writer_pretty(&mut *writer, summary)?;
        writeln!(writer)?;
        Ok(())
    }
}

fn file_row(group: &GroupReport, file: &FileReport) -> Vec<Cell> {
    let conn = group
        .conn
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (outcome, records, destination) = match (&file.report, &file.error) {
        (_, Some(error)) => (format!("failed: {error}"), String::new(), String::new()),
        (Some(report), None) => {
            let records = match report.outcome {
                RetrofitOutcome::Enriched(n) => n.to_string(),
                RetrofitOutcome::Skipped(_) => String::new(),
            };
            let outcome = match report.outcome {
                RetrofitOutcome::Enriched(_) if report.dry_run => "would enrich".to_string(),
                RetrofitOutcome::Enriched(_) => "enriched".to_string(),
                RetrofitOutcome::Skipped(reason) => format!("skipped: {reason}"),
            };
            let destination = report
                .destination
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default();
            (outcome, records, destination)
        }
        (None, None) => (String::new(), String::new(), String::new()),
    };

    vec![
        Cell::new(file.path.display()),
        Cell::new(conn),
        Cell::new(outcome),
        Cell::new(records),
        Cell::new(destination),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::Compression;
    use crate::retrofit::{RetrofitReport, SkipReason};
    use std::path::PathBuf;

    fn summary() -> RunSummary {
        let report = |name: &str, outcome: RetrofitOutcome| RetrofitReport {
            source: PathBuf::from(name),
            destination: matches!(outcome, RetrofitOutcome::Enriched(_))
                .then(|| PathBuf::from(name.replace(".log", ".new.log"))),
            outcome,
            compression: Compression::None,
            lines: 3,
            skipped_lines: 0,
            already_tagged: 0,
            dry_run: false,
        };
        let file = |name: &str, outcome: RetrofitOutcome| FileReport {
            path: PathBuf::from(name),
            report: Some(report(name, outcome)),
            error: None,
        };

        let mut summary = RunSummary::new(false);
        summary.push(GroupReport {
            conn: PathBuf::from("logs/conn.log"),
            index: None,
            error: None,
            files: vec![
                file("logs/conn.log", RetrofitOutcome::Enriched(3)),
                file("logs/x509.log", RetrofitOutcome::Skipped(SkipReason::NoUid)),
                FileReport {
                    path: PathBuf::from("logs/dns.log"),
                    report: None,
                    error: Some("permission denied".to_string()),
                },
            ],
        });
        summary
    }

    #[test]
    fn test_table_output() {
        let mut out = Vec::new();
        OutputFormatter::new(OutputFormat::Table)
            .write(&summary(), &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("logs/conn.new.log"));
        assert!(text.contains("skipped: no uid"));
        assert!(text.contains("failed: permission denied"));
        assert!(text.contains("1 enriched (3 records)"));
        assert!(text.contains("1 failed"));
    }

    #[test]
    fn test_json_output() {
        let mut out = Vec::new();
        OutputFormatter::new(OutputFormat::Json)
            .write(&summary(), &mut out)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["totals"]["enriched"], 1);
        assert_eq!(value["totals"]["failed"], 1);
        let files = &value["groups"][0]["files"];
        assert_eq!(files[0]["report"]["outcome"]["enriched"], 3);
        assert_eq!(files[1]["report"]["outcome"]["skipped"], "no_uid");
        assert_eq!(files[2]["error"], "permission denied");
        assert!(value.get("search_failures").is_none());
    }

    #[test]
    fn test_search_failure_row() {
        let mut summary = summary();
        summary.push_search_failure("/logs/missing", "No such file or directory");

        let mut out = Vec::new();
        OutputFormatter::new(OutputFormat::Table)
            .write(&summary, &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("search failed: No such file or directory"));
        assert!(text.contains("2 failed"));
    }

    #[test]
    fn test_write_error_is_output_error() {
        struct Closed;

        impl Write for Closed {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        for format in [OutputFormat::Table, OutputFormat::Json] {
            let err = OutputFormatter::new(format)
                .write(&summary(), &mut Closed)
                .unwrap_err();
            match err {
                crate::Error::Output(e) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
                crate::Error::Json(e) => assert!(e.is_io()),
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
