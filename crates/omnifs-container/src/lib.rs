//! On-disk container format for OmniFS.
//!
//! A container is one host file holding a complete filesystem image:
//!
//! ```text
//! [0, 512)            header        (magic, version, sizing, offsets)
//! [512, ..)           user table    (fixed 192-byte credential slots)
//! [.., ..)            metadata      (fixed 128-byte entry slots)
//! [.., ..)            bitmap        (one byte per block: 0 free, 1 used)
//! [.., total_size)    block region  (16-byte block header + encoded payload)
//! ```
//!
//! File payloads are singly-linked block chains: each block's header names
//! the next block (0 terminates) and how many payload bytes it carries.
//! Payload bytes are run through a fixed byte-permutation codec on the way
//! to disk and reversed on the way back.
//!
//! [`OmniStore`] owns the file handle plus in-memory mirrors of every table
//! and is the only way to touch the format. It is deliberately synchronous
//! and single-owner; serialization of callers is the engine's job.

mod codec;
mod error;
mod file;
mod fixed;
mod header;
mod layout;
mod metadata;
mod sidecar;
mod store;
mod users;

pub use codec::Codec;
pub use error::{ContainerError, Result};
pub use file::ContainerFile;
pub use header::{Header, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use layout::{Layout, BLOCK_HEADER_SIZE, METADATA_SLOT_SIZE, USER_RECORD_SIZE};
pub use metadata::{EntryType, MetadataEntry, MetadataTable, NAME_LEN};
pub use sidecar::UserSidecar;
pub use store::{FormatOptions, OmniStore, StoreUsage};
pub use users::{UserRecord, UserTable, PASSWORD_HASH_LEN, USERNAME_LEN};
