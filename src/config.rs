//! Engine configuration.
//!
//! Everything the engine needs to know about a run is passed in explicitly
//! through these values.

use std::path::{Path, PathBuf};

/// Default name of the inserted correlation-id field.
pub const DEFAULT_ID_FIELD: &str = "community_id";

/// Names of the log fields the engine reads and writes.
///
/// Defaults follow the Zeek conn.log JSON schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNames {
    pub uid: String,
    pub community_id: String,
    pub orig_h: String,
    pub orig_p: String,
    pub resp_h: String,
    pub resp_p: String,
    pub proto: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            uid: "uid".to_string(),
            community_id: DEFAULT_ID_FIELD.to_string(),
            orig_h: "id.orig_h".to_string(),
            orig_p: "id.orig_p".to_string(),
            resp_h: "id.resp_h".to_string(),
            resp_p: "id.resp_p".to_string(),
            proto: "proto".to_string(),
        }
    }
}

/// Where enriched output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Write `<name>.new.log[.gz]` next to the source
    #[default]
    Sibling,
    /// Atomically replace the source file
    InPlace,
}

impl OutputMode {
    /// Destination path for enriched output of `source`.
    pub fn destination(&self, source: &Path) -> PathBuf {
        match self {
            OutputMode::InPlace => source.to_path_buf(),
            OutputMode::Sibling => sibling_path(source),
        }
    }
}

/// Sibling output path: the first `.log` in the file name becomes `.new.log`.
///
/// `dns.log.gz` -> `dns.new.log.gz`, `dns.00:00:00-01:00:00.log` ->
/// `dns.00:00:00-01:00:00.new.log`. Names without `.log` get `.new` appended.
pub fn sibling_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let new_name = match name.find(".log") {
        Some(idx) => format!("{}.new{}", &name[..idx], &name[idx..]),
        None => format!("{name}.new"),
    };
    source.with_file_name(new_name)
}

/// Options for a retrofit run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrofitOptions {
    pub fields: FieldNames,
    pub mode: OutputMode,
    /// Compute everything, write nothing
    pub dry_run: bool,
}

impl RetrofitOptions {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_fields(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
