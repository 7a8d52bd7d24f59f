//! Positioned I/O over the container's host file.
//!
//! Every access seeks to an absolute offset first; no seek position is
//! shared between operations. Short transfers are errors, never silently
//! accepted.

use crate::error::{ContainerError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Read/write handle on the container file.
#[derive(Debug)]
pub struct ContainerFile {
    file: File,
    path: PathBuf,
}

impl ContainerFile {
    /// Creates a new container file of exactly `total_size` bytes, zero-filled.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or sized.
    pub fn create(path: impl AsRef<Path>, total_size: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        file.set_len(total_size)?;

        tracing::debug!(path = %path.display(), total_size, "created container file");
        Ok(Self { file, path })
    }

    /// Opens an existing container file with read and write access.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Returns the file's current length in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata cannot be read.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns true if the file is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if metadata cannot be read.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the path this handle was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ShortRead` if the file ends early, `Io` otherwise.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ContainerError::ShortRead {
                    offset,
                    len: buf.len(),
                }
            } else {
                ContainerError::Io(e)
            }
        })
    }

    /// Writes all of `buf` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ShortWrite` if the host refuses bytes, `Io` otherwise.
    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WriteZero {
                ContainerError::ShortWrite {
                    offset,
                    len: buf.len(),
                }
            } else {
                ContainerError::Io(e)
            }
        })
    }

    /// Flushes buffered writes to the host.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
