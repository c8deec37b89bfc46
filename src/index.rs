//! uid -> community id index built from one connection-summary log.
//!
//! [`UidIndexBuilder::build`] scans a conn.log once. Records that already
//! carry a community id contribute it verbatim; the rest get one computed
//! from their 5-tuple. Lines that cannot be used are counted and skipped,
//! never fatal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::FieldNames;
use crate::error::{FlowError, Result};
use crate::flow::{CommunityId, CorrelationId, FlowTuple};
use crate::io::LogReader;
use crate::record::FirstRecord;

/// Counters from one index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Records that produced an index entry
    pub records: u64,
    /// Entries whose id was taken from the record as-is
    pub reused: u64,
    /// Entries whose id was computed from the 5-tuple
    pub computed: u64,
    /// Non-blank lines that could not be used (bad JSON, missing fields)
    pub skipped_lines: u64,
    /// Repeated uids whose id differed from the earlier entry
    pub conflicts: u64,
}

/// Mapping from record uid to correlation id for one connection-summary file.
///
/// A uid seen more than once keeps the id of its last occurrence.
#[derive(Debug, Clone, Default)]
pub struct UidIndex {
    source: PathBuf,
    entries: HashMap<String, CorrelationId>,
    stats: IndexStats,
}

impl UidIndex {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// The connection-summary file this index was built from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn get(&self, uid: &str) -> Option<&CorrelationId> {
        self.entries.get(uid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Insert an entry, last write wins. Returns `true` if it replaced a
    /// different id for the same uid.
    pub fn insert(&mut self, uid: impl Into<String>, id: CorrelationId) -> bool {
        let uid = uid.into();
        match self.entries.insert(uid.clone(), id) {
            Some(previous) => {
                let conflict = self.entries.get(&uid) != Some(&previous);
                if conflict {
                    debug!(%uid, old = %previous, "uid seen again with a different id, keeping the last");
                }
                conflict
            }
            None => false,
        }
    }

    fn add(&mut self, entry: Entry) {
        if entry.reused {
            self.stats.reused += 1;
        } else {
            self.stats.computed += 1;
        }
        self.stats.records += 1;
        if self.insert(entry.uid, entry.id) {
            self.stats.conflicts += 1;
        }
    }
}

/// Result of trying to index a file.
#[derive(Debug)]
pub enum IndexOutcome {
    Built(UidIndex),
    /// The file's first record has no uid: not a connection-summary log
    NoUid,
}

/// Why a single conn.log line did not make it into the index.
#[derive(Debug, Error)]
enum LineError {
    #[error("not a JSON object")]
    Malformed,

    #[error("missing or non-string field {0}")]
    Field(String),

    #[error("port field {field} is not a valid port: {value}")]
    Port { field: String, value: String },

    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Builds a [`UidIndex`] from a connection-summary log.
#[derive(Debug, Clone)]
pub struct UidIndexBuilder<'a> {
    fields: &'a FieldNames,
    hasher: CommunityId,
}

impl<'a> UidIndexBuilder<'a> {
    pub fn new(fields: &'a FieldNames, hasher: CommunityId) -> Self {
        Self { fields, hasher }
    }

    /// Index every record of the log at `path`.
    ///
    /// Returns [`IndexOutcome::NoUid`] when the first record has no uid.
    /// Fails only when the file cannot be opened or read.
    pub fn build(&self, path: impl AsRef<Path>) -> Result<IndexOutcome> {
        let path = path.as_ref();

        let mut reader = LogReader::open(path)?;
        let first = FirstRecord::read(&mut reader, &self.fields.uid, &self.fields.community_id)?;
        if !matches!(first, FirstRecord::WithUid { .. }) {
            debug!(path = %path.display(), ?first, "no uid in first record");
            return Ok(IndexOutcome::NoUid);
        }

        // Rewind: scan from the first line again.
        let mut reader = LogReader::open(path)?;
        let mut index = UidIndex::new(path);
        let mut line = Vec::new();
        let mut line_number = 0u64;

        while reader.read_line(&mut line)? {
            line_number += 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match self.index_line(&line) {
                Ok(entry) => index.add(entry),
                Err(e) => {
                    index.stats.skipped_lines += 1;
                    debug!(path = %path.display(), line = line_number, error = %e, "skipping line");
                }
            }
        }

        info!(
            path = %path.display(),
            compression = %reader.compression(),
            entries = index.len(),
            reused = index.stats.reused,
            computed = index.stats.computed,
            skipped = index.stats.skipped_lines,
            "built uid index"
        );
        Ok(IndexOutcome::Built(index))
    }

    fn index_line(&self, line: &[u8]) -> std::result::Result<Entry, LineError> {
        let record: Map<String, Value> =
            serde_json::from_slice(line).map_err(|_| LineError::Malformed)?;

        let uid = string_field(&record, &self.fields.uid)?.to_string();

        if let Some(Value::String(existing)) = record.get(&self.fields.community_id) {
            return Ok(Entry {
                uid,
                id: CorrelationId::from_existing(existing.as_str()),
                reused: true,
            });
        }

        let tuple = FlowTuple::from_strs(
            &proto_field(&record, &self.fields.proto)?,
            string_field(&record, &self.fields.orig_h)?,
            string_field(&record, &self.fields.resp_h)?,
            Some(port_field(&record, &self.fields.orig_p)?),
            Some(port_field(&record, &self.fields.resp_p)?),
        )?;

        Ok(Entry {
            uid,
            id: self.hasher.compute(&tuple)?,
            reused: false,
        })
    }
}

struct Entry {
    uid: String,
    id: CorrelationId,
    reused: bool,
}

fn string_field<'r>(
    record: &'r Map<String, Value>,
    name: &str,
) -> std::result::Result<&'r str, LineError> {
    record
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| LineError::Field(name.to_string()))
}

/// Protocol as a name (`"tcp"`) or a number (`6`).
fn proto_field(record: &Map<String, Value>, name: &str) -> std::result::Result<String, LineError> {
    match record.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(LineError::Field(name.to_string())),
    }
}

/// Port as a JSON number, or a numeric string.
fn port_field(record: &Map<String, Value>, name: &str) -> std::result::Result<u16, LineError> {
    let invalid = |value: &Value| LineError::Port {
        field: name.to_string(),
        value: value.to_string(),
    };
    match record.get(name) {
        Some(v @ Value::Number(n)) => n
            .as_u64()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| invalid(v)),
        Some(v @ Value::String(s)) => s.trim().parse().map_err(|_| invalid(v)),
        _ => Err(LineError::Field(name.to_string())),
    }
}
