//! Staged output files with atomic commit.
//!
//! A [`StagedOutput`] is a temporary file created next to its destination
//! and wrapped in the requested compression. [`StagedOutput::commit`]
//! finishes the encoder, syncs the file and renames it over the
//! destination in one step; dropping or [`StagedOutput::discard`]ing it
//! removes the temporary file. The destination is never seen half-written.

use std::fs::{self, File, Permissions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use tempfile::TempPath;

use super::Compression;
use crate::error::{Error, IoResultExt, Result};

/// File-based encoder matching [`super::FileDecoder`].
pub enum FileEncoder {
    /// No compression
    None(BufWriter<File>),

    /// Gzip compression
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FileEncoder {
    pub fn new(file: File, compression: Compression) -> Self {
        let writer = BufWriter::new(file);
        match compression {
            Compression::None => FileEncoder::None(writer),
            Compression::Gzip => {
                FileEncoder::Gzip(GzEncoder::new(writer, flate2::Compression::default()))
            }
        }
    }

    /// Write any trailer, flush buffers and hand back the file.
    pub fn finish(self) -> io::Result<File> {
        let writer = match self {
            FileEncoder::None(w) => w,
            FileEncoder::Gzip(enc) => enc.finish()?,
        };
        writer.into_inner().map_err(|e| e.into_error())
    }
}

impl Write for FileEncoder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileEncoder::None(w) => w.write(buf),
            FileEncoder::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileEncoder::None(w) => w.flush(),
            FileEncoder::Gzip(w) => w.flush(),
        }
    }
}

/// Output being written to a temporary file until committed.
pub struct StagedOutput {
    destination: PathBuf,
    encoder: FileEncoder,
    temp_path: TempPath,
}

impl StagedOutput {
    /// Stage output for `destination` in the same directory, so the final
    /// rename never crosses filesystems.
    pub fn create(destination: impl AsRef<Path>, compression: Compression) -> Result<Self> {
        let destination = destination.as_ref();
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let temp = tempfile::Builder::new()
            .prefix(".cidretro-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .at_path(destination)?;
        let (file, temp_path) = temp.into_parts();

        Ok(Self {
            destination: destination.to_path_buf(),
            encoder: FileEncoder::new(file, compression),
            temp_path,
        })
    }

    /// Path of the temporary file holding the staged bytes.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Finish, sync and atomically move the staged file to its destination.
    ///
    /// `permissions` are applied to the staged file before the rename, so an
    /// in-place replacement keeps the original's mode.
    pub fn commit(self, permissions: Option<Permissions>) -> Result<PathBuf> {
        let StagedOutput {
            destination,
            encoder,
            temp_path,
        } = self;

        let file = encoder.finish().at_path(&temp_path)?;
        file.sync_all().at_path(&temp_path)?;
        drop(file);

        if let Some(permissions) = permissions {
            fs::set_permissions(&temp_path, permissions).at_path(&temp_path)?;
        }

        // On failure the error carries the TempPath, and dropping it
        // removes the staged file.
        temp_path
            .persist(&destination)
            .map_err(|e| Error::io(&destination, e.error))?;

        Ok(destination)
    }

    /// Drop the staged bytes without touching the destination.
    pub fn discard(self) {
        drop(self);
    }
}

impl Write for StagedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}
