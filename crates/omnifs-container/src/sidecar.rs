//! Optional `users.bin` sidecar.
//!
//! Offline admin tools can append user records to a flat file next to the
//! container without going through the engine. Writes are refused while the
//! container's lock marker exists, so tools never race a live engine.

use crate::error::{ContainerError, Result};
use crate::layout::USER_RECORD_SIZE;
use crate::users::UserRecord;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Flat append-only user record file.
#[derive(Debug)]
pub struct UserSidecar {
    path: PathBuf,
    /// Lock marker of the container this sidecar belongs to.
    container_lock: PathBuf,
}

impl UserSidecar {
    /// Creates a sidecar handle for `container_path`, stored as `users.bin`
    /// in the same directory.
    #[must_use]
    pub fn for_container(container_path: impl AsRef<Path>) -> Self {
        let container_path = container_path.as_ref();
        let dir = container_path.parent().unwrap_or_else(|| Path::new("."));
        let mut lock_name = container_path
            .file_name()
            .unwrap_or_default()
            .to_os_string();
        lock_name.push(".lock");
        Self {
            path: dir.join("users.bin"),
            container_lock: container_path.with_file_name(lock_name),
        }
    }

    /// Returns the sidecar file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns `Locked` while the container is open, `Io` on write failure.
    pub fn append(&self, record: &UserRecord) -> Result<()> {
        if self.container_lock.exists() {
            return Err(ContainerError::Locked(
                self.container_lock.display().to_string(),
            ));
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&record.encode())?;
        tracing::debug!(path = %self.path.display(), user = %record.username, "appended sidecar record");
        Ok(())
    }

    /// Reads every record in append order.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when the file length is not a whole number of
    /// records.
    pub fn read_all(&self) -> Result<Vec<UserRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut buf = Vec::new();
        std::fs::File::open(&self.path)?.read_to_end(&mut buf)?;
        if buf.len() % USER_RECORD_SIZE != 0 {
            return Err(ContainerError::Corrupt(format!(
                "sidecar {} has a partial record",
                self.path.display()
            )));
        }
        Ok(buf
            .chunks(USER_RECORD_SIZE)
            .map(UserRecord::decode)
            .collect())
    }
}
