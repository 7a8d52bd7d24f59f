//! Fixed-slot user table.
//!
//! Credentials live in a contiguous array of 192-byte records directly after
//! the header. The table is mirrored in memory with a `name -> slot` index
//! over active users; persistence always rewrites the whole region (it is
//! small, and whole-region writes keep the dirty tracking trivial).
//!
//! ```text
//! offset  width  field
//! 0       32     username
//! 32      128    password_hash ("salt:digest", hex)
//! 160     4      role (0 normal, 1 admin)
//! 164     8      created_time
//! 172     8      last_login
//! 180     1      is_active
//! 181..192       reserved
//! ```

use crate::error::{ContainerError, Result};
use crate::fixed::{read_str, read_u32, read_u64, write_str, write_u32, write_u64};
use crate::layout::USER_RECORD_SIZE;
use std::collections::HashMap;

/// Width of the username field.
pub const USERNAME_LEN: usize = 32;

/// Width of the password hash field.
pub const PASSWORD_HASH_LEN: usize = 128;

/// One credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub role: u32,
    pub created_time: u64,
    pub last_login: u64,
    pub is_active: bool,
}

impl UserRecord {
    /// Encodes the record into its fixed-slot form.
    #[must_use]
    pub fn encode(&self) -> [u8; USER_RECORD_SIZE] {
        let mut buf = [0u8; USER_RECORD_SIZE];
        write_str(&mut buf[0..USERNAME_LEN], &self.username);
        write_str(
            &mut buf[USERNAME_LEN..USERNAME_LEN + PASSWORD_HASH_LEN],
            &self.password_hash,
        );
        write_u32(&mut buf, 160, self.role);
        write_u64(&mut buf, 164, self.created_time);
        write_u64(&mut buf, 172, self.last_login);
        buf[180] = u8::from(self.is_active);
        buf
    }

    /// Decodes a record from its fixed-slot form.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            username: read_str(&buf[0..USERNAME_LEN]),
            password_hash: read_str(&buf[USERNAME_LEN..USERNAME_LEN + PASSWORD_HASH_LEN]),
            role: read_u32(buf, 160),
            created_time: read_u64(buf, 164),
            last_login: read_u64(buf, 172),
            is_active: buf[180] != 0,
        }
    }

    /// True for a slot that has never held a user.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.username.is_empty() && !self.is_active
    }
}

/// In-memory mirror of the user table region.
#[derive(Debug)]
pub struct UserTable {
    slots: Vec<UserRecord>,
    /// Active username -> slot index.
    index: HashMap<String, usize>,
}

impl UserTable {
    /// Creates an empty table with `max_users` slots.
    #[must_use]
    pub fn new(max_users: u32) -> Self {
        let blank = UserRecord {
            username: String::new(),
            password_hash: String::new(),
            role: 0,
            created_time: 0,
            last_login: 0,
            is_active: false,
        };
        Self {
            slots: vec![blank; max_users as usize],
            index: HashMap::new(),
        }
    }

    /// Rebuilds the table from its on-disk region.
    #[must_use]
    pub fn decode_region(buf: &[u8], max_users: u32) -> Self {
        let mut table = Self::new(max_users);
        for i in 0..max_users as usize {
            let start = i * USER_RECORD_SIZE;
            let record = UserRecord::decode(&buf[start..start + USER_RECORD_SIZE]);
            if record.is_active {
                table.index.insert(record.username.clone(), i);
            }
            table.slots[i] = record;
        }
        table
    }

    /// Serializes the whole region.
    #[must_use]
    pub fn encode_region(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.slots.len() * USER_RECORD_SIZE);
        for record in &self.slots {
            buf.extend_from_slice(&record.encode());
        }
        buf
    }

    /// Adds a user into the first inactive slot, or the slot already carrying
    /// that username.
    ///
    /// # Errors
    ///
    /// `UserExists` when an active slot already carries the name, `NoSpace`
    /// when every slot is active.
    pub fn add(&mut self, record: UserRecord) -> Result<usize> {
        if let Some(&slot) = self.index.get(&record.username) {
            if self.slots[slot].is_active {
                return Err(ContainerError::UserExists(record.username));
            }
        }

        let slot = self
            .slots
            .iter()
            .position(|s| !s.is_active || s.username == record.username)
            .ok_or(ContainerError::NoSpace)?;

        self.index.insert(record.username.clone(), slot);
        self.slots[slot] = record;
        Ok(slot)
    }

    /// Looks up an active user by name.
    #[must_use]
    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        let slot = *self.index.get(username)?;
        let record = &self.slots[slot];
        record.is_active.then_some(record)
    }

    /// Returns the slot index of an active user.
    #[must_use]
    pub fn slot_of(&self, username: &str) -> Option<usize> {
        let slot = *self.index.get(username)?;
        self.slots[slot].is_active.then_some(slot)
    }

    /// Rewrites the slot holding `record.username`.
    ///
    /// Deactivating a user drops it from the name index; its slot keeps the
    /// record so audits can still see it.
    ///
    /// # Errors
    ///
    /// `NotFound`-style lookups are the caller's concern; this only fails if
    /// the username has no slot at all.
    pub fn update(&mut self, record: UserRecord) -> Result<()> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.username == record.username)
            .ok_or_else(|| {
                ContainerError::Corrupt(format!("no slot for user {}", record.username))
            })?;
        if record.is_active {
            self.index.insert(record.username.clone(), slot);
        } else {
            self.index.remove(&record.username);
        }
        self.slots[slot] = record;
        Ok(())
    }

    /// Returns all active records in slot order.
    #[must_use]
    pub fn list_active(&self) -> Vec<&UserRecord> {
        self.slots.iter().filter(|s| s.is_active).collect()
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
