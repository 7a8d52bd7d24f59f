//! Numeric status codes.
//!
//! Front-ends serialize these on the wire, so the numeric values are frozen.
//! Do not re-number.

use serde::{Deserialize, Serialize};

/// Operation outcome, as surfaced to front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Operation succeeded.
    Ok,
    /// File, directory, or user does not exist.
    NotFound,
    /// Caller lacks the required role or credentials.
    PermissionDenied,
    /// Host I/O failed.
    Io,
    /// Path failed syntax validation.
    InvalidPath,
    /// An entry with that name already exists.
    FileExists,
    /// Block or metadata allocation failed.
    NoSpace,
    /// Configuration rejected by validation.
    InvalidConfig,
    /// Operation is recognized but not available.
    NotImplemented,
    /// Session is unknown or expired.
    InvalidSession,
    /// Directory still has children.
    DirectoryNotEmpty,
    /// Operation does not apply to this entry kind or engine state.
    InvalidOperation,
    /// On-disk state is inconsistent.
    Corrupt,
    /// The engine is shutting down.
    Shutdown,
}

impl StatusCode {
    /// Returns the stable wire value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::NotFound => -1,
            Self::PermissionDenied => -2,
            Self::Io => -3,
            Self::InvalidPath => -4,
            Self::FileExists => -5,
            Self::NoSpace => -6,
            Self::InvalidConfig => -7,
            Self::NotImplemented => -8,
            Self::InvalidSession => -9,
            Self::DirectoryNotEmpty => -10,
            Self::InvalidOperation => -11,
            Self::Corrupt => -12,
            Self::Shutdown => -13,
        }
    }

    /// Converts a wire value back to a status code.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            -1 => Some(Self::NotFound),
            -2 => Some(Self::PermissionDenied),
            -3 => Some(Self::Io),
            -4 => Some(Self::InvalidPath),
            -5 => Some(Self::FileExists),
            -6 => Some(Self::NoSpace),
            -7 => Some(Self::InvalidConfig),
            -8 => Some(Self::NotImplemented),
            -9 => Some(Self::InvalidSession),
            -10 => Some(Self::DirectoryNotEmpty),
            -11 => Some(Self::InvalidOperation),
            -12 => Some(Self::Corrupt),
            -13 => Some(Self::Shutdown),
            _ => None,
        }
    }

    /// Returns true for `Ok`.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::Ok => "success",
            Self::NotFound => "file or resource not found",
            Self::PermissionDenied => "permission denied",
            Self::Io => "I/O error",
            Self::InvalidPath => "invalid path",
            Self::FileExists => "file already exists",
            Self::NoSpace => "no space available",
            Self::InvalidConfig => "invalid configuration",
            Self::NotImplemented => "feature not implemented",
            Self::InvalidSession => "invalid or expired session",
            Self::DirectoryNotEmpty => "directory is not empty",
            Self::InvalidOperation => "invalid operation",
            Self::Corrupt => "container state is corrupt",
            Self::Shutdown => "engine is shutting down",
        };
        write!(f, "{msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [StatusCode; 14] = [
        StatusCode::Ok,
        StatusCode::NotFound,
        StatusCode::PermissionDenied,
        StatusCode::Io,
        StatusCode::InvalidPath,
        StatusCode::FileExists,
        StatusCode::NoSpace,
        StatusCode::InvalidConfig,
        StatusCode::NotImplemented,
        StatusCode::InvalidSession,
        StatusCode::DirectoryNotEmpty,
        StatusCode::InvalidOperation,
        StatusCode::Corrupt,
        StatusCode::Shutdown,
    ];

    #[test]
    fn test_wire_values_are_stable() {
        assert_eq!(StatusCode::Ok.as_i32(), 0);
        assert_eq!(StatusCode::NotFound.as_i32(), -1);
        assert_eq!(StatusCode::PermissionDenied.as_i32(), -2);
        assert_eq!(StatusCode::Io.as_i32(), -3);
        assert_eq!(StatusCode::InvalidPath.as_i32(), -4);
        assert_eq!(StatusCode::FileExists.as_i32(), -5);
        assert_eq!(StatusCode::NoSpace.as_i32(), -6);
        assert_eq!(StatusCode::InvalidConfig.as_i32(), -7);
        assert_eq!(StatusCode::NotImplemented.as_i32(), -8);
        assert_eq!(StatusCode::InvalidSession.as_i32(), -9);
        assert_eq!(StatusCode::DirectoryNotEmpty.as_i32(), -10);
        assert_eq!(StatusCode::InvalidOperation.as_i32(), -11);
        assert_eq!(StatusCode::Corrupt.as_i32(), -12);
        assert_eq!(StatusCode::Shutdown.as_i32(), -13);
    }

    #[test]
    fn test_round_trip() {
        for code in ALL {
            assert_eq!(StatusCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(StatusCode::from_i32(1), None);
        assert_eq!(StatusCode::from_i32(-14), None);
    }
}
