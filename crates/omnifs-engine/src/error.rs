//! Error types for the engine layer.

use omnifs_container::ContainerError;
use omnifs_protocol::StatusCode;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Container-layer error.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// Path did not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller lacks the required role or gave bad credentials.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Path failed syntax validation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An entry or user with that name already exists.
    #[error("already exists: {0}")]
    FileExists(String),

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session is unknown or expired.
    #[error("invalid or expired session")]
    InvalidSession,

    /// Directory still has children.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// Operation does not apply to this entry kind or engine state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The pipeline is shutting down.
    #[error("engine is shutting down")]
    Shutdown,

    /// A response wait elapsed before the worker answered.
    #[error("timed out waiting for response")]
    Timeout,

    /// No pending response is registered under that request id.
    #[error("unknown request id {0}")]
    UnknownRequest(u64),
}

impl EngineError {
    /// Maps the error onto its wire status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Container(e) => match e {
                ContainerError::Io(_)
                | ContainerError::ShortRead { .. }
                | ContainerError::ShortWrite { .. }
                | ContainerError::Locked(_) => StatusCode::Io,
                ContainerError::CorruptHeader(_) | ContainerError::Corrupt(_) => {
                    StatusCode::Corrupt
                }
                ContainerError::NoSpace => StatusCode::NoSpace,
                ContainerError::UserExists(_) => StatusCode::FileExists,
            },
            Self::NotFound(_) => StatusCode::NotFound,
            Self::PermissionDenied(_) => StatusCode::PermissionDenied,
            Self::InvalidPath(_) => StatusCode::InvalidPath,
            Self::FileExists(_) => StatusCode::FileExists,
            Self::InvalidConfig(_) => StatusCode::InvalidConfig,
            Self::InvalidSession => StatusCode::InvalidSession,
            Self::DirectoryNotEmpty(_) => StatusCode::DirectoryNotEmpty,
            Self::InvalidOperation(_) => StatusCode::InvalidOperation,
            Self::Shutdown => StatusCode::Shutdown,
            // Pipeline-side conditions; never produced by dispatch itself.
            Self::Timeout | Self::UnknownRequest(_) => StatusCode::Io,
        }
    }

    /// True when the error reports on-disk corruption.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Container(e) if e.is_corrupt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_errors_map_to_statuses() {
        let err = EngineError::from(ContainerError::NoSpace);
        assert_eq!(err.status(), StatusCode::NoSpace);

        let err = EngineError::from(ContainerError::Corrupt("x".into()));
        assert_eq!(err.status(), StatusCode::Corrupt);
        assert!(err.is_corrupt());

        let err = EngineError::from(ContainerError::UserExists("alice".into()));
        assert_eq!(err.status(), StatusCode::FileExists);
    }

    #[test]
    fn test_engine_errors_map_to_statuses() {
        assert_eq!(
            EngineError::NotFound("/a".into()).status(),
            StatusCode::NotFound
        );
        assert_eq!(EngineError::InvalidSession.status(), StatusCode::InvalidSession);
        assert_eq!(EngineError::Shutdown.status(), StatusCode::Shutdown);
        assert!(!EngineError::NotFound("/a".into()).is_corrupt());
    }
}
