//! Request and response records.

use crate::ops::{Operation, Role};
use crate::status::StatusCode;
use serde::{Deserialize, Serialize};

/// A queued request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Monotonic request id, assigned at enqueue.
    pub id: u64,
    /// Session token of the caller; empty for `Login`.
    pub session: String,
    /// The operation to execute.
    pub op: Operation,
    /// Unix seconds at enqueue time.
    pub enqueued_at: u64,
}

/// The result of an executed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers.
    pub id: u64,
    /// Outcome.
    pub status: StatusCode,
    /// Operation-specific result.
    pub payload: ResponsePayload,
    /// Worker-side execution time in milliseconds.
    pub took_ms: u64,
    /// Unix seconds at completion time.
    pub at: u64,
}

impl Response {
    /// Builds a success response. Timing fields are filled in by the worker.
    #[must_use]
    pub fn success(id: u64, payload: ResponsePayload) -> Self {
        Self {
            id,
            status: StatusCode::Ok,
            payload,
            took_ms: 0,
            at: 0,
        }
    }

    /// Builds a failure response carrying a human-readable message.
    #[must_use]
    pub fn failure(id: u64, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            id,
            status,
            payload: ResponsePayload::Text(message.into()),
            took_ms: 0,
            at: 0,
        }
    }
}

/// Operation-specific response data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// No data.
    None,
    /// Raw bytes (file content).
    Data(Vec<u8>),
    /// A text message.
    Text(String),
    /// Whether a path exists.
    Exists(bool),
    /// Directory listing.
    Entries(Vec<DirEntry>),
    /// Entry metadata.
    Metadata(EntryMetadata),
    /// Active users.
    Users(Vec<UserSummary>),
    /// A freshly created session.
    Session(SessionInfo),
    /// Store and queue statistics.
    Stats(Stats),
}

/// Entry kind as seen by front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// One row of a directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub permissions: u32,
    pub created_time: u64,
    pub modified_time: u64,
}

/// A copy of an entry's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub permissions: u32,
    pub owner_id: u32,
    pub created_time: u64,
    pub modified_time: u64,
}

/// Public view of a user record. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub role: Role,
    pub created_time: u64,
    pub last_login: u64,
}

/// Session handle returned by a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub username: String,
    pub role: Role,
    pub expires_at: u64,
}

/// Store-level statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_files: u64,
    pub total_directories: u64,
    pub total_size: u64,
    pub block_size: u32,
    pub used_blocks: u64,
    pub free_blocks: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

/// Request pipeline statistics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_processed: u64,
    pub currently_queued: u64,
    pub total_errors: u64,
    pub avg_processing_ms: u64,
}

/// Combined statistics payload.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Stats {
    pub store: StoreStats,
    pub queue: QueueStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_carries_message() {
        let resp = Response::failure(7, StatusCode::NotFound, "no such file: /a");
        assert_eq!(resp.id, 7);
        assert_eq!(resp.status, StatusCode::NotFound);
        match resp.payload {
            ResponsePayload::Text(msg) => assert_eq!(msg, "no such file: /a"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_response_serde_round_trip() {
        let resp = Response::success(
            3,
            ResponsePayload::Entries(vec![DirEntry {
                name: "hello.txt".to_string(),
                kind: EntryKind::File,
                size: 13,
                permissions: 0o644,
                created_time: 1_700_000_000,
                modified_time: 1_700_000_001,
            }]),
        );
        let json = serde_json::to_string(&resp).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert!(back.status.is_ok());
        match back.payload {
            ResponsePayload::Entries(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].name, "hello.txt");
                assert_eq!(entries[0].kind, EntryKind::File);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
