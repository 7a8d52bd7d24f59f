//! Fixed-slot metadata table.
//!
//! Every file and directory is one 128-byte slot. Slot 0 is always the root
//! directory; `parent_index` links form the directory tree.
//!
//! ```text
//! offset  width  field
//! 0       1      valid (0 = free slot)
//! 1       1      type (0 file, 1 directory)
//! 2       4      parent_index (self for root)
//! 6       32     name
//! 38      4      start_block (0 = no data)
//! 42      8      total_size
//! 50      4      owner_id
//! 54      4      permissions
//! 58      8      created_time
//! 66      8      modified_time
//! 74..128        reserved
//! ```

use crate::error::{ContainerError, Result};
use crate::fixed::{read_str, read_u32, read_u64, write_str, write_u32, write_u64};
use crate::layout::METADATA_SLOT_SIZE;

/// Width of the entry name field.
pub const NAME_LEN: usize = 32;

/// Slot index of the root directory.
pub const ROOT_INDEX: u32 = 0;

/// Entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
}

impl EntryType {
    const fn as_u8(self) -> u8 {
        match self {
            Self::File => 0,
            Self::Directory => 1,
        }
    }

    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::File),
            1 => Ok(Self::Directory),
            other => Err(ContainerError::Corrupt(format!(
                "unknown entry type {other}"
            ))),
        }
    }
}

/// One metadata entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub entry_type: EntryType,
    pub parent_index: u32,
    pub name: String,
    pub start_block: u32,
    pub total_size: u64,
    pub owner_id: u32,
    pub permissions: u32,
    pub created_time: u64,
    pub modified_time: u64,
}

impl MetadataEntry {
    fn encode(&self) -> [u8; METADATA_SLOT_SIZE] {
        let mut buf = [0u8; METADATA_SLOT_SIZE];
        buf[0] = 1;
        buf[1] = self.entry_type.as_u8();
        write_u32(&mut buf, 2, self.parent_index);
        write_str(&mut buf[6..6 + NAME_LEN], &self.name);
        write_u32(&mut buf, 38, self.start_block);
        write_u64(&mut buf, 42, self.total_size);
        write_u32(&mut buf, 50, self.owner_id);
        write_u32(&mut buf, 54, self.permissions);
        write_u64(&mut buf, 58, self.created_time);
        write_u64(&mut buf, 66, self.modified_time);
        buf
    }

    fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf[0] == 0 {
            return Ok(None);
        }
        Ok(Some(Self {
            entry_type: EntryType::from_u8(buf[1])?,
            parent_index: read_u32(buf, 2),
            name: read_str(&buf[6..6 + NAME_LEN]),
            start_block: read_u32(buf, 38),
            total_size: read_u64(buf, 42),
            owner_id: read_u32(buf, 50),
            permissions: read_u32(buf, 54),
            created_time: read_u64(buf, 58),
            modified_time: read_u64(buf, 66),
        }))
    }
}

/// In-memory mirror of the metadata table region.
#[derive(Debug)]
pub struct MetadataTable {
    slots: Vec<Option<MetadataEntry>>,
}

impl MetadataTable {
    /// Creates an empty table and installs the root entry in slot 0.
    #[must_use]
    pub fn with_root(max_files: u32, now: u64) -> Self {
        let mut slots = vec![None; max_files as usize];
        slots[ROOT_INDEX as usize] = Some(MetadataEntry {
            entry_type: EntryType::Directory,
            parent_index: ROOT_INDEX,
            name: "/".to_string(),
            start_block: 0,
            total_size: 0,
            owner_id: 0,
            permissions: 0o755,
            created_time: now,
            modified_time: now,
        });
        Self { slots }
    }

    /// Rebuilds the table from its on-disk region.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when a slot cannot be decoded or slot 0 is not the
    /// root directory.
    pub fn decode_region(buf: &[u8], max_files: u32) -> Result<Self> {
        let mut slots = Vec::with_capacity(max_files as usize);
        for i in 0..max_files as usize {
            let start = i * METADATA_SLOT_SIZE;
            slots.push(MetadataEntry::decode(&buf[start..start + METADATA_SLOT_SIZE])?);
        }
        let table = Self { slots };
        match table.get(ROOT_INDEX) {
            Some(root) if root.entry_type == EntryType::Directory && root.parent_index == 0 => {}
            _ => {
                return Err(ContainerError::Corrupt(
                    "slot 0 is not the root directory".to_string(),
                ))
            }
        }
        Ok(table)
    }

    /// Serializes the whole region.
    #[must_use]
    pub fn encode_region(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.slots.len() * METADATA_SLOT_SIZE);
        for slot in &self.slots {
            match slot {
                Some(entry) => buf.extend_from_slice(&entry.encode()),
                None => buf.extend_from_slice(&[0u8; METADATA_SLOT_SIZE]),
            }
        }
        buf
    }

    /// Allocates the first free slot for a new entry.
    ///
    /// # Errors
    ///
    /// Returns `NoSpace` when every slot is valid.
    pub fn allocate(
        &mut self,
        entry_type: EntryType,
        parent_index: u32,
        name: &str,
        owner_id: u32,
        now: u64,
    ) -> Result<u32> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ContainerError::NoSpace)?;

        let permissions = match entry_type {
            EntryType::Directory => 0o755,
            EntryType::File => 0o644,
        };
        self.slots[slot] = Some(MetadataEntry {
            entry_type,
            parent_index,
            name: name.to_string(),
            start_block: 0,
            total_size: 0,
            owner_id,
            permissions,
            created_time: now,
            modified_time: now,
        });
        Ok(slot as u32)
    }

    /// Frees a slot. The caller must have released the block chain first.
    pub fn free(&mut self, index: u32) {
        if index != ROOT_INDEX {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                *slot = None;
            }
        }
    }

    /// Returns the entry in a slot, if valid.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&MetadataEntry> {
        self.slots.get(index as usize)?.as_ref()
    }

    /// Returns a mutable view of a valid slot.
    #[must_use]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut MetadataEntry> {
        self.slots.get_mut(index as usize)?.as_mut()
    }

    /// Returns every valid slot whose parent is `index`, in slot order.
    #[must_use]
    pub fn children(&self, index: u32) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let entry = slot.as_ref()?;
                // Root's parent is itself; don't list root under root.
                (entry.parent_index == index && i as u32 != index).then_some(i as u32)
            })
            .collect()
    }

    /// Looks up a child of `parent` by name.
    #[must_use]
    pub fn find_child(&self, parent: u32, name: &str) -> Option<u32> {
        self.children(parent)
            .into_iter()
            .find(|&i| self.slots[i as usize].as_ref().map(|e| e.name.as_str()) == Some(name))
    }

    /// Counts valid file and directory entries (root excluded).
    #[must_use]
    pub fn counts(&self) -> (u64, u64) {
        let mut files = 0;
        let mut dirs = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(entry) = slot {
                if i as u32 == ROOT_INDEX {
                    continue;
                }
                match entry.entry_type {
                    EntryType::File => files += 1,
                    EntryType::Directory => dirs += 1,
                }
            }
        }
        (files, dirs)
    }

    /// Iterates over `(index, entry)` pairs of valid slots.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &MetadataEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (i as u32, e)))
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_installed() {
        let table = MetadataTable::with_root(16, 1000);
        let root = table.get(ROOT_INDEX).unwrap();
        assert_eq!(root.name, "/");
        assert_eq!(root.entry_type, EntryType::Directory);
        assert_eq!(root.parent_index, 0);
        assert_eq!(root.permissions, 0o755);
    }

    #[test]
    fn test_allocate_defaults() {
        let mut table = MetadataTable::with_root(16, 1000);
        let file = table
            .allocate(EntryType::File, ROOT_INDEX, "a.txt", 3, 2000)
            .unwrap();
        let dir = table
            .allocate(EntryType::Directory, ROOT_INDEX, "d", 3, 2000)
            .unwrap();

        assert_eq!(file, 1);
        assert_eq!(dir, 2);
        assert_eq!(table.get(file).unwrap().permissions, 0o644);
        assert_eq!(table.get(dir).unwrap().permissions, 0o755);
        assert_eq!(table.get(file).unwrap().owner_id, 3);
        assert_eq!(table.get(file).unwrap().start_block, 0);
    }

    #[test]
    fn test_allocate_exhaustion() {
        let mut table = MetadataTable::with_root(3, 0);
        table.allocate(EntryType::File, 0, "a", 0, 0).unwrap();
        table.allocate(EntryType::File, 0, "b", 0, 0).unwrap();
        assert!(matches!(
            table.allocate(EntryType::File, 0, "c", 0, 0),
            Err(ContainerError::NoSpace)
        ));
    }

    #[test]
    fn test_free_and_reuse() {
        let mut table = MetadataTable::with_root(4, 0);
        let a = table.allocate(EntryType::File, 0, "a", 0, 0).unwrap();
        table.free(a);
        assert!(table.get(a).is_none());
        let b = table.allocate(EntryType::File, 0, "b", 0, 0).unwrap();
        assert_eq!(b, a);
    }

    #[test]
    fn test_root_cannot_be_freed() {
        let mut table = MetadataTable::with_root(4, 0);
        table.free(ROOT_INDEX);
        assert!(table.get(ROOT_INDEX).is_some());
    }

    #[test]
    fn test_children_stable_order() {
        let mut table = MetadataTable::with_root(8, 0);
        table.allocate(EntryType::File, 0, "z", 0, 0).unwrap();
        table.allocate(EntryType::File, 0, "a", 0, 0).unwrap();
        let d = table.allocate(EntryType::Directory, 0, "d", 0, 0).unwrap();
        table.allocate(EntryType::File, d, "inner", 0, 0).unwrap();

        // Slot order, not name order.
        assert_eq!(table.children(0), vec![1, 2, 3]);
        assert_eq!(table.children(d), vec![4]);
        assert_eq!(table.find_child(0, "a"), Some(2));
        assert_eq!(table.find_child(0, "inner"), None);
    }

    #[test]
    fn test_region_round_trip() {
        let mut table = MetadataTable::with_root(8, 123);
        table.allocate(EntryType::File, 0, "a.txt", 1, 456).unwrap();

        let region = table.encode_region();
        assert_eq!(region.len(), 8 * METADATA_SLOT_SIZE);

        let reloaded = MetadataTable::decode_region(&region, 8).unwrap();
        assert_eq!(reloaded.get(1).unwrap().name, "a.txt");
        assert_eq!(reloaded.get(1).unwrap().created_time, 456);
        assert!(reloaded.get(2).is_none());
    }

    #[test]
    fn test_missing_root_is_corrupt() {
        let region = vec![0u8; 4 * METADATA_SLOT_SIZE];
        assert!(matches!(
            MetadataTable::decode_region(&region, 4),
            Err(ContainerError::Corrupt(_))
        ));
    }
}
