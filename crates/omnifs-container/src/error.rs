//! Error types for the container layer.

use thiserror::Error;

/// Result type alias for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors that can occur while touching the container file.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Host I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A positioned read returned fewer bytes than requested.
    #[error("short read at offset {offset}: wanted {len} bytes")]
    ShortRead { offset: u64, len: usize },

    /// A positioned write stored fewer bytes than requested.
    #[error("short write at offset {offset}: wanted {len} bytes")]
    ShortWrite { offset: u64, len: usize },

    /// The header failed validation on open.
    #[error("corrupt header: {0}")]
    CorruptHeader(String),

    /// On-disk state disagrees with itself.
    #[error("corrupt container: {0}")]
    Corrupt(String),

    /// No free block or metadata slot.
    #[error("no space left in container")]
    NoSpace,

    /// An active user with that name already exists.
    #[error("user already exists: {0}")]
    UserExists(String),

    /// The sidecar file is locked by an open container.
    #[error("container is open, sidecar is locked: {0}")]
    Locked(String),
}

impl ContainerError {
    /// Returns true if this error reports corruption.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_) | Self::CorruptHeader(_))
    }
}
