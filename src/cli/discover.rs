//! Log file discovery and conn.log pairing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Name of the connection-summary stream.
const CONN_STREAM: &str = "conn";

/// A connection-summary file and the logs that share its uids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroup {
    /// The connection-summary file the index is built from
    pub conn: PathBuf,
    /// Every log in the group, `conn` included, sorted by path
    pub members: Vec<PathBuf>,
}

/// Parsed parts of a Zeek log file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogName {
    stream: String,
    range: Option<String>,
    ext: Option<String>,
}

/// Finds Zeek JSON logs under directories and groups them by rotation.
#[derive(Debug, Clone)]
pub struct Discovery {
    name: Regex,
}

impl Discovery {
    pub fn new() -> Result<Self> {
        // `<stream>[.<range>].log[.gz]`; a dotted stream (`dns.new`) never matches.
        let name = Regex::new(r"^(?P<stream>[^.]+)\.(?:(?P<range>[0-9:-]+)\.)?log(?P<ext>\.gz)?$")?;
        Ok(Self { name })
    }

    fn parse(&self, file_name: &str) -> Option<LogName> {
        let caps = self.name.captures(file_name)?;
        Some(LogName {
            stream: caps["stream"].to_string(),
            range: caps.name("range").map(|m| m.as_str().to_string()),
            ext: caps.name("ext").map(|m| m.as_str().to_string()),
        })
    }

    /// Walk `root` recursively and return one group per connection-summary file.
    ///
    /// Groups come back ordered by directory, then by rotation range. Only a
    /// root that cannot be read is an error; unreadable entries below it are
    /// logged and skipped.
    pub fn discover(&self, root: &Path) -> Result<Vec<LogGroup>> {
        type Key = (PathBuf, Option<String>, Option<String>);
        let mut buckets: BTreeMap<Key, Vec<(String, PathBuf)>> = BTreeMap::new();

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    return Err(Error::io(path, e.into()));
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let Some(name) = self.parse(file_name) else {
                continue;
            };
            let dir = entry
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            buckets
                .entry((dir, name.range, name.ext))
                .or_default()
                .push((name.stream, entry.path().to_path_buf()));
        }

        let mut groups = Vec::new();
        for ((dir, range, _), files) in buckets {
            let Some(conn) = files
                .iter()
                .find(|(stream, _)| stream == CONN_STREAM)
                .map(|(_, path)| path.clone())
            else {
                debug!(dir = %dir.display(), ?range, "no conn log for rotation, skipping");
                continue;
            };
            let mut members: Vec<PathBuf> = files.into_iter().map(|(_, path)| path).collect();
            members.sort();
            groups.push(LogGroup { conn, members });
        }

        debug!(root = %root.display(), groups = groups.len(), "discovery complete");
        Ok(groups)
    }
}
