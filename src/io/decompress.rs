//! Compression detection and transparent decompression.
//!
//! Logs are read through [`LogReader`], which sniffs the gzip magic bytes
//! once at open time, rewinds, and then yields the decoded stream line by
//! line. The detected [`Compression`] travels with the reader so the output
//! written for that input can use the same format.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::error::{IoResultExt, Result};

/// Buffer size for reading log files (64KB).
const BUFFER_SIZE: usize = 65536;

/// Gzip magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Detected compression format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression
    None,
    /// Gzip (.gz)
    Gzip,
}

impl Compression {
    /// Detect compression format from magic bytes.
    ///
    /// Anything shorter than the gzip magic is plain text.
    pub fn detect(data: &[u8]) -> Self {
        match data {
            [0x1f, 0x8b, ..] => Compression::Gzip,
            _ => Compression::None,
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
        }
    }
}

/// File-based decoder that wraps the supported decompression formats.
///
/// Uses enum dispatch rather than a boxed reader.
pub enum FileDecoder {
    /// No compression - direct file access
    None(File),

    /// Gzip decompression, all members of a concatenated stream
    Gzip(MultiGzDecoder<File>),
}

impl FileDecoder {
    /// Create a decoder for the given file with explicit compression format.
    pub fn new(file: File, compression: Compression) -> Self {
        match compression {
            Compression::None => FileDecoder::None(file),
            Compression::Gzip => FileDecoder::Gzip(MultiGzDecoder::new(file)),
        }
    }

    /// Get the compression format this decoder handles.
    pub fn compression(&self) -> Compression {
        match self {
            FileDecoder::None(_) => Compression::None,
            FileDecoder::Gzip(_) => Compression::Gzip,
        }
    }
}

impl Read for FileDecoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FileDecoder::None(r) => r.read(buf),
            FileDecoder::Gzip(r) => r.read(buf),
        }
    }
}

/// Sniff the compression of an open file and rewind it to the start.
pub fn sniff(file: &mut File) -> io::Result<Compression> {
    let mut magic = Vec::with_capacity(GZIP_MAGIC.len());
    file.by_ref()
        .take(GZIP_MAGIC.len() as u64)
        .read_to_end(&mut magic)?;
    file.rewind()?;
    Ok(Compression::detect(&magic))
}

/// Buffered, decompressing line reader over one log file.
pub struct LogReader {
    path: PathBuf,
    inner: BufReader<FileDecoder>,
}

impl LogReader {
    /// Open a log file, detecting gzip from its magic bytes.
    ///
    /// Failing to open or sniff the file (missing, permission denied) is an
    /// error; a file that is simply not gzip is read as plain text.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).at_path(path)?;
        let compression = sniff(&mut file).at_path(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            inner: BufReader::with_capacity(BUFFER_SIZE, FileDecoder::new(file, compression)),
        })
    }

    pub fn compression(&self) -> Compression {
        self.inner.get_ref().compression()
    }

    /// Read the next line, terminator included, into `buf`.
    ///
    /// `buf` is cleared first. Returns `false` at end of stream.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        buf.clear();
        let n = self.inner.read_until(b'\n', buf).at_path(&self.path)?;
        Ok(n > 0)
    }
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for LogReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Open a log for reading, whatever its compression.
pub fn open_log(path: impl AsRef<Path>) -> Result<LogReader> {
    LogReader::open(path)
}
