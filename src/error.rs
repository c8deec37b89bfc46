//! Error types for cidretro.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for cidretro operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error on a specific file (open, read, stage or commit)
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error deriving a community id from a flow tuple
    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    /// Error writing a JSON report
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing the run summary
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),

    /// Invalid log file name pattern
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Errors related to flow tuples and community id hashing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Protocol is not covered by the community id protocol table
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// Address text could not be parsed as IPv4 or IPv6
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Tuple is structurally unusable for hashing
    #[error("Invalid flow tuple: {reason}")]
    InvalidTuple { reason: String },
}

impl FlowError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        FlowError::InvalidTuple {
            reason: reason.into(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension for attaching a path to `std::io::Result`.
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: &Path) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
