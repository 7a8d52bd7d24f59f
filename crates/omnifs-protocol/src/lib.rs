//! Shared request/response vocabulary for OmniFS.
//!
//! Front-ends (network listener, CLI tools) and the container engine agree on
//! three things: the numeric status codes, the set of operations with their
//! arguments, and the shape of request/response records. All of that lives
//! here so the engine never depends on how a front-end frames bytes on the
//! wire.

mod ops;
mod records;
mod status;

pub use ops::{OpKind, Operation, Role};
pub use records::{
    DirEntry, EntryKind, EntryMetadata, QueueStats, Request, Response, ResponsePayload,
    SessionInfo, Stats, StoreStats, UserSummary,
};
pub use status::StatusCode;
