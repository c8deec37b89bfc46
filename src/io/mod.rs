//! Log file I/O.
//!
//! - [`LogReader`] opens a log, detects gzip by magic bytes and yields lines
//!   with their terminators intact.
//! - [`StagedOutput`] writes a derived log to a temporary sibling in the
//!   same compression and commits it with an atomic rename.

mod decompress;
mod staged;

pub use decompress::{open_log, sniff, Compression, FileDecoder, LogReader};
pub use staged::{FileEncoder, StagedOutput};
