//! The container store.
//!
//! [`OmniStore`] owns the container file plus in-memory mirrors of the
//! header, user table, metadata table, and block bitmap. All region writes
//! go through the store so the mirrors and the file never diverge.
//!
//! Block 0 doubles as the "no data" sentinel in entry and block headers, so
//! the allocator reserves it at format time and never hands it out.

use crate::codec::Codec;
use crate::error::{ContainerError, Result};
use crate::file::ContainerFile;
use crate::fixed::{read_u32, write_u32};
use crate::header::{Header, HEADER_SIZE};
use crate::layout::{Layout, BLOCK_HEADER_SIZE};
use crate::metadata::MetadataTable;
use crate::users::UserTable;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Terminal / "no data" block index.
pub(crate) const NO_BLOCK: u32 = 0;

/// Sizing parameters for a fresh container.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub total_size: u64,
    pub block_size: u32,
    pub max_users: u32,
    pub max_files: u32,
    pub student_id: String,
    pub submission_date: String,
}

/// Block usage snapshot.
#[derive(Debug, Clone, Copy)]
pub struct StoreUsage {
    pub total_blocks: u32,
    pub used_blocks: u32,
    pub free_blocks: u32,
    pub block_size: u32,
    pub total_size: u64,
}

/// An open container.
#[derive(Debug)]
pub struct OmniStore {
    file: ContainerFile,
    header: Header,
    layout: Layout,
    codec: Codec,
    metadata: MetadataTable,
    users: UserTable,
    bitmap: Vec<u8>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

impl OmniStore {
    /// Formats a new container and leaves it open.
    ///
    /// Writes the header, an empty user table, the root metadata entry, a
    /// zeroed bitmap with block 0 reserved, and a zeroed block region.
    ///
    /// # Errors
    ///
    /// Returns an error if the sizing is invalid or the file cannot be
    /// written.
    pub fn format(path: impl AsRef<Path>, options: &FormatOptions) -> Result<Self> {
        let layout = Layout::new(
            options.total_size,
            options.block_size,
            options.max_users,
            options.max_files,
        )?;
        let header = layout.to_header(&options.student_id, &options.submission_date);

        let file = ContainerFile::create(&path, layout.total_size)?;
        let mut bitmap = vec![0u8; layout.bitmap_len() as usize];
        bitmap[NO_BLOCK as usize] = 1;

        let mut store = Self {
            file,
            header,
            layout,
            codec: Codec::new(),
            metadata: MetadataTable::with_root(layout.max_files, unix_now()),
            users: UserTable::new(layout.max_users),
            bitmap,
        };

        store.persist_header()?;
        store.persist_users()?;
        store.persist_metadata()?;
        store.persist_bitmap()?;
        store.file.flush()?;
        std::fs::write(lock_path(store.file.path()), b"")?;

        tracing::info!(
            path = %store.file.path().display(),
            total_size = layout.total_size,
            block_size = layout.block_size,
            blocks = layout.usable_blocks(),
            "formatted container"
        );
        Ok(store)
    }

    /// Opens an existing container, validating the header and mirroring
    /// every region into memory.
    ///
    /// # Errors
    ///
    /// Returns `CorruptHeader` on a malformed or inconsistent header,
    /// `Corrupt` when a table fails validation, `Io` otherwise.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = ContainerFile::open(&path)?;

        let mut header_buf = [0u8; HEADER_SIZE];
        file.read_at(0, &mut header_buf)?;
        let header = Header::decode(&header_buf)?;
        let layout = Layout::from_header(&header)?;

        let file_len = file.len()?;
        if file_len != layout.total_size {
            return Err(ContainerError::CorruptHeader(format!(
                "header claims {} bytes but the file is {} bytes",
                layout.total_size, file_len
            )));
        }

        let mut user_buf = vec![0u8; layout.user_table_len() as usize];
        file.read_at(layout.user_table_offset(), &mut user_buf)?;
        let users = UserTable::decode_region(&user_buf, layout.max_users);

        let mut metadata_buf = vec![0u8; layout.metadata_len() as usize];
        file.read_at(layout.metadata_offset(), &mut metadata_buf)?;
        let metadata = MetadataTable::decode_region(&metadata_buf, layout.max_files)?;

        let mut bitmap = vec![0u8; layout.bitmap_len() as usize];
        file.read_at(layout.bitmap_offset(), &mut bitmap)?;

        let store = Self {
            file,
            header,
            layout,
            codec: Codec::new(),
            metadata,
            users,
            bitmap,
        };
        std::fs::write(lock_path(store.file.path()), b"")?;

        tracing::info!(
            path = %store.file.path().display(),
            blocks = store.layout.usable_blocks(),
            users = store.users.list_active().len(),
            "opened container"
        );
        Ok(store)
    }

    /// Flushes every region and releases the file handle.
    ///
    /// # Errors
    ///
    /// Returns an error if a region cannot be written back.
    pub fn close(mut self) -> Result<()> {
        self.persist_users()?;
        self.persist_metadata()?;
        self.persist_bitmap()?;
        self.file.flush()?;
        let _ = std::fs::remove_file(lock_path(self.file.path()));
        tracing::debug!(path = %self.file.path().display(), "closed container");
        Ok(())
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The computed region layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// The metadata table mirror.
    #[must_use]
    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// Mutable metadata table mirror. Call [`persist_metadata`] after
    /// changing it.
    ///
    /// [`persist_metadata`]: Self::persist_metadata
    pub fn metadata_mut(&mut self) -> &mut MetadataTable {
        &mut self.metadata
    }

    /// The user table mirror.
    #[must_use]
    pub fn users(&self) -> &UserTable {
        &self.users
    }

    /// Mutable user table mirror. Call [`persist_users`] after changing it.
    ///
    /// [`persist_users`]: Self::persist_users
    pub fn users_mut(&mut self) -> &mut UserTable {
        &mut self.users
    }

    /// Rewrites the header region.
    pub fn persist_header(&mut self) -> Result<()> {
        let buf = self.header.encode();
        self.file.write_at(0, &buf)
    }

    /// Rewrites the whole user table region.
    pub fn persist_users(&mut self) -> Result<()> {
        let buf = self.users.encode_region();
        self.file.write_at(self.layout.user_table_offset(), &buf)
    }

    /// Rewrites the whole metadata region.
    pub fn persist_metadata(&mut self) -> Result<()> {
        let buf = self.metadata.encode_region();
        self.file.write_at(self.layout.metadata_offset(), &buf)
    }

    /// Rewrites the whole bitmap region.
    pub fn persist_bitmap(&mut self) -> Result<()> {
        let bitmap = std::mem::take(&mut self.bitmap);
        let result = self.file.write_at(self.layout.bitmap_offset(), &bitmap);
        self.bitmap = bitmap;
        result
    }

    // ------------------------------------------------------------------
    // Block allocation
    // ------------------------------------------------------------------

    /// Allocates the first free block.
    ///
    /// # Errors
    ///
    /// Returns `NoSpace` when every usable block is taken.
    pub fn allocate_block(&mut self) -> Result<u32> {
        let usable = self.layout.usable_blocks() as usize;
        for (i, used) in self.bitmap.iter_mut().enumerate().take(usable) {
            if *used == 0 {
                *used = 1;
                return Ok(i as u32);
            }
        }
        Err(ContainerError::NoSpace)
    }

    /// Marks a block free. Out-of-range indices and the reserved sentinel
    /// block are ignored.
    pub fn free_block(&mut self, index: u32) {
        if index != NO_BLOCK {
            if let Some(used) = self.bitmap.get_mut(index as usize) {
                *used = 0;
            }
        }
    }

    /// Frees a whole chain by walking next-pointers.
    ///
    /// # Errors
    ///
    /// Returns an error if a block header cannot be read.
    pub fn free_chain(&mut self, start_block: u32) -> Result<()> {
        let mut current = start_block;
        let mut hops = 0u32;
        while current != NO_BLOCK {
            if hops > self.layout.usable_blocks() {
                return Err(ContainerError::Corrupt(format!(
                    "block chain starting at {start_block} is cyclic"
                )));
            }
            let (next, _) = self.read_block_header(current)?;
            self.free_block(current);
            current = next;
            hops += 1;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Block I/O
    // ------------------------------------------------------------------

    fn check_block_index(&self, index: u32) -> Result<()> {
        if index >= self.layout.usable_blocks() {
            return Err(ContainerError::Corrupt(format!(
                "block index {index} out of range ({} usable)",
                self.layout.usable_blocks()
            )));
        }
        Ok(())
    }

    /// Writes one block: header, then codec-encoded payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload exceeds the block or the write fails.
    pub fn write_block(&mut self, index: u32, data: &[u8], next_block: u32) -> Result<()> {
        self.check_block_index(index)?;
        if data.len() > self.layout.payload_per_block() {
            return Err(ContainerError::Corrupt(format!(
                "payload of {} bytes exceeds block capacity {}",
                data.len(),
                self.layout.payload_per_block()
            )));
        }

        let mut buf = vec![0u8; BLOCK_HEADER_SIZE + data.len()];
        write_u32(&mut buf, 0, next_block);
        write_u32(&mut buf, 4, data.len() as u32);
        buf[BLOCK_HEADER_SIZE..].copy_from_slice(data);
        self.codec.encode(&mut buf[BLOCK_HEADER_SIZE..]);

        self.file.write_at(self.layout.block_offset(index), &buf)
    }

    /// Reads one block's header.
    ///
    /// # Errors
    ///
    /// Returns an error on an out-of-range index or failed read.
    pub fn read_block_header(&mut self, index: u32) -> Result<(u32, u32)> {
        self.check_block_index(index)?;
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        self.file.read_at(self.layout.block_offset(index), &mut buf)?;
        Ok((read_u32(&buf, 0), read_u32(&buf, 4)))
    }

    /// Reads one block's decoded payload, appending it to `out`.
    ///
    /// Returns the next block index.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when the stored payload length exceeds the block.
    pub fn read_block(&mut self, index: u32, out: &mut Vec<u8>) -> Result<u32> {
        let (next, data_size) = self.read_block_header(index)?;
        if data_size as usize > self.layout.payload_per_block() {
            return Err(ContainerError::Corrupt(format!(
                "block {index} claims {data_size} payload bytes, capacity is {}",
                self.layout.payload_per_block()
            )));
        }

        let mut payload = vec![0u8; data_size as usize];
        self.file.read_at(
            self.layout.block_offset(index) + BLOCK_HEADER_SIZE as u64,
            &mut payload,
        )?;
        self.codec.decode(&mut payload);
        out.extend_from_slice(&payload);
        Ok(next)
    }

    // ------------------------------------------------------------------
    // File payload I/O
    // ------------------------------------------------------------------

    /// Replaces a file entry's payload with `data`.
    ///
    /// The old chain is released first; blocks for the new chain are
    /// reserved up front so a failed allocation can roll back without
    /// leaking. On `NoSpace` the entry is left empty (the old payload was
    /// already released) and the bitmap is restored for the new blocks.
    ///
    /// # Errors
    ///
    /// Returns `NoSpace` when the container cannot hold the payload,
    /// `Corrupt` for a bad entry index.
    pub fn write_file_data(&mut self, entry_index: u32, data: &[u8]) -> Result<()> {
        let old_start = self
            .metadata
            .get(entry_index)
            .ok_or_else(|| {
                ContainerError::Corrupt(format!("write to invalid entry {entry_index}"))
            })?
            .start_block;

        if old_start != NO_BLOCK {
            self.free_chain(old_start)?;
        }

        let now = unix_now();
        if data.is_empty() {
            let entry = self.metadata.get_mut(entry_index).ok_or_else(|| {
                ContainerError::Corrupt(format!("write to invalid entry {entry_index}"))
            })?;
            entry.start_block = NO_BLOCK;
            entry.total_size = 0;
            entry.modified_time = now;
            self.persist_metadata()?;
            self.persist_bitmap()?;
            return Ok(());
        }

        let chunk_size = self.layout.payload_per_block();
        let chunk_count = data.len().div_ceil(chunk_size);

        let mut blocks = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count {
            match self.allocate_block() {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    for &block in &blocks {
                        self.free_block(block);
                    }
                    let entry = self.metadata.get_mut(entry_index).ok_or_else(|| {
                        ContainerError::Corrupt(format!("write to invalid entry {entry_index}"))
                    })?;
                    entry.start_block = NO_BLOCK;
                    entry.total_size = 0;
                    entry.modified_time = now;
                    self.persist_metadata()?;
                    self.persist_bitmap()?;
                    return Err(e);
                }
            }
        }

        for (i, chunk) in data.chunks(chunk_size).enumerate() {
            let next = blocks.get(i + 1).copied().unwrap_or(NO_BLOCK);
            self.write_block(blocks[i], chunk, next)?;
        }

        let entry = self.metadata.get_mut(entry_index).ok_or_else(|| {
            ContainerError::Corrupt(format!("write to invalid entry {entry_index}"))
        })?;
        entry.start_block = blocks[0];
        entry.total_size = data.len() as u64;
        entry.modified_time = now;
        self.persist_metadata()?;
        self.persist_bitmap()?;

        tracing::debug!(
            entry = entry_index,
            bytes = data.len(),
            blocks = blocks.len(),
            "wrote file payload"
        );
        Ok(())
    }

    /// Reads a file entry's whole payload.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` when the chain ends before `total_size` bytes are
    /// produced.
    pub fn read_file_data(&mut self, entry_index: u32) -> Result<Vec<u8>> {
        let (start_block, total_size) = {
            let entry = self.metadata.get(entry_index).ok_or_else(|| {
                ContainerError::Corrupt(format!("read of invalid entry {entry_index}"))
            })?;
            (entry.start_block, entry.total_size as usize)
        };

        let mut out = Vec::with_capacity(total_size);
        let mut current = start_block;
        let mut hops = 0u32;
        while current != NO_BLOCK && out.len() < total_size {
            if hops > self.layout.usable_blocks() {
                return Err(ContainerError::Corrupt(format!(
                    "block chain of entry {entry_index} is cyclic"
                )));
            }
            current = self.read_block(current, &mut out)?;
            hops += 1;
        }

        if out.len() < total_size {
            return Err(ContainerError::Corrupt(format!(
                "entry {entry_index} chain produced {} of {total_size} bytes",
                out.len()
            )));
        }
        out.truncate(total_size);
        Ok(out)
    }

    /// Walks a chain and returns its block indices in order.
    ///
    /// # Errors
    ///
    /// Returns `Corrupt` on a cyclic chain.
    pub fn chain_blocks(&mut self, start_block: u32) -> Result<Vec<u32>> {
        let mut blocks = Vec::new();
        let mut current = start_block;
        while current != NO_BLOCK {
            if blocks.len() > self.layout.usable_blocks() as usize {
                return Err(ContainerError::Corrupt(format!(
                    "block chain starting at {start_block} is cyclic"
                )));
            }
            blocks.push(current);
            let (next, _) = self.read_block_header(current)?;
            current = next;
        }
        Ok(blocks)
    }

    /// Block usage accounting. The reserved sentinel block counts as used.
    #[must_use]
    pub fn usage(&self) -> StoreUsage {
        let total = self.layout.usable_blocks();
        let used = self
            .bitmap
            .iter()
            .take(total as usize)
            .filter(|&&b| b != 0)
            .count() as u32;
        StoreUsage {
            total_blocks: total,
            used_blocks: used,
            free_blocks: total - used,
            block_size: self.layout.block_size,
            total_size: self.layout.total_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::EntryType;
    use tempfile::tempdir;

    fn options() -> FormatOptions {
        FormatOptions {
            total_size: 1 << 20,
            block_size: 512,
            max_users: 8,
            max_files: 64,
            student_id: "store-tests".to_string(),
            submission_date: "2026-08-02".to_string(),
        }
    }

    fn scratch() -> (tempfile::TempDir, OmniStore) {
        let dir = tempdir().unwrap();
        let store = OmniStore::format(dir.path().join("t.omni"), &options()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_format_then_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.omni");
        let store = OmniStore::format(&path, &options()).unwrap();
        store.close().unwrap();

        let store = OmniStore::open(&path).unwrap();
        assert_eq!(store.header().total_size, 1 << 20);
        assert_eq!(store.header().block_size, 512);
        let root = store.metadata().get(0).unwrap();
        assert_eq!(root.name, "/");
        assert_eq!(root.entry_type, EntryType::Directory);
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.omni");
        OmniStore::format(&path, &options()).unwrap().close().unwrap();

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(1 << 19).unwrap();
        drop(file);

        assert!(matches!(
            OmniStore::open(&path),
            Err(ContainerError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.omni");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();
        assert!(OmniStore::open(&path).is_err());
    }

    #[test]
    fn test_block_zero_is_reserved() {
        let (_dir, mut store) = scratch();
        let first = store.allocate_block().unwrap();
        assert_ne!(first, NO_BLOCK);
        assert_eq!(first, 1);
    }

    #[test]
    fn test_block_round_trip_is_encoded_on_disk() {
        let (_dir, mut store) = scratch();
        let block = store.allocate_block().unwrap();
        store.write_block(block, b"secret payload", NO_BLOCK).unwrap();

        let mut out = Vec::new();
        let next = store.read_block(block, &mut out).unwrap();
        assert_eq!(next, NO_BLOCK);
        assert_eq!(out, b"secret payload");

        // The raw bytes on disk must not contain the plaintext.
        let offset = store.layout().block_offset(block) + BLOCK_HEADER_SIZE as u64;
        let mut raw = vec![0u8; 14];
        store.file.read_at(offset, &mut raw).unwrap();
        assert_ne!(raw, b"secret payload");
    }

    #[test]
    fn test_file_payload_round_trip_multi_block() {
        let (_dir, mut store) = scratch();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "big.bin", 0, 0)
            .unwrap();

        let payload = vec![0xA5u8; 2000];
        store.write_file_data(entry, &payload).unwrap();

        let meta = store.metadata().get(entry).unwrap();
        assert_eq!(meta.total_size, 2000);
        let start = meta.start_block;
        // ceil(2000 / (512 - 16)) == 5 blocks
        assert_eq!(store.chain_blocks(start).unwrap().len(), 5);

        assert_eq!(store.read_file_data(entry).unwrap(), payload);
    }

    #[test]
    fn test_payload_length_boundaries() {
        let (_dir, mut store) = scratch();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "b", 0, 0)
            .unwrap();

        let block_size = 512usize;
        for len in [0, 1, block_size - 1, block_size, 10 * block_size] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            store.write_file_data(entry, &payload).unwrap();
            assert_eq!(store.read_file_data(entry).unwrap(), payload, "len {len}");
            assert_eq!(store.metadata().get(entry).unwrap().total_size, len as u64);
        }
    }

    #[test]
    fn test_chains_are_disjoint_and_bitmap_exact() {
        let (_dir, mut store) = scratch();
        let a = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "a", 0, 0)
            .unwrap();
        let b = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "b", 0, 0)
            .unwrap();
        store.write_file_data(a, &vec![1u8; 1500]).unwrap();
        store.write_file_data(b, &vec![2u8; 900]).unwrap();

        let start_a = store.metadata().get(a).unwrap().start_block;
        let start_b = store.metadata().get(b).unwrap().start_block;
        let chain_a = store.chain_blocks(start_a).unwrap();
        let chain_b = store.chain_blocks(start_b).unwrap();

        // No block belongs to two files.
        assert!(chain_a.iter().all(|block| !chain_b.contains(block)));

        // The bitmap marks exactly the chained blocks plus the sentinel.
        let expected = 1 + chain_a.len() + chain_b.len();
        assert_eq!(store.usage().used_blocks as usize, expected);
    }

    #[test]
    fn test_overwrite_releases_old_chain() {
        let (_dir, mut store) = scratch();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "f", 0, 0)
            .unwrap();

        store.write_file_data(entry, &vec![1u8; 3000]).unwrap();
        let used_after_first = store.usage().used_blocks;

        store.write_file_data(entry, &vec![2u8; 3000]).unwrap();
        assert_eq!(store.usage().used_blocks, used_after_first);
        assert_eq!(store.read_file_data(entry).unwrap(), vec![2u8; 3000]);
    }

    #[test]
    fn test_empty_write_clears_entry() {
        let (_dir, mut store) = scratch();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "f", 0, 0)
            .unwrap();

        store.write_file_data(entry, b"content").unwrap();
        store.write_file_data(entry, b"").unwrap();

        let meta = store.metadata().get(entry).unwrap();
        assert_eq!(meta.start_block, NO_BLOCK);
        assert_eq!(meta.total_size, 0);
        assert!(store.read_file_data(entry).unwrap().is_empty());
        // Only the reserved block remains used.
        assert_eq!(store.usage().used_blocks, 1);
    }

    #[test]
    fn test_no_space_rolls_back() {
        let dir = tempdir().unwrap();
        let mut opts = options();
        opts.total_size = 64 << 10; // a few dozen 512-byte blocks
        let mut store = OmniStore::format(dir.path().join("t.omni"), &opts).unwrap();

        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "f", 0, 0)
            .unwrap();

        let huge = vec![0u8; 1 << 20];
        let before = store.usage().used_blocks;
        let err = store.write_file_data(entry, &huge).unwrap_err();
        assert!(matches!(err, ContainerError::NoSpace));

        // Every block reserved for the failed write is free again.
        assert_eq!(store.usage().used_blocks, before);
        let meta = store.metadata().get(entry).unwrap();
        assert_eq!(meta.start_block, NO_BLOCK);
        assert_eq!(meta.total_size, 0);
    }

    #[test]
    fn test_truncated_chain_reads_as_corrupt() {
        let (_dir, mut store) = scratch();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "f", 0, 0)
            .unwrap();
        store.write_file_data(entry, &vec![7u8; 1200]).unwrap();

        // Sever the chain after the first block.
        let start = store.metadata().get(entry).unwrap().start_block;
        let mut first = Vec::new();
        store.read_block(start, &mut first).unwrap();
        store.write_block(start, &first, NO_BLOCK).unwrap();

        assert!(matches!(
            store.read_file_data(entry),
            Err(ContainerError::Corrupt(_))
        ));
    }

    #[test]
    fn test_chains_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.omni");
        let mut store = OmniStore::format(&path, &options()).unwrap();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "persisted", 0, 0)
            .unwrap();
        store.write_file_data(entry, b"survives reopen").unwrap();
        store.close().unwrap();

        let mut store = OmniStore::open(&path).unwrap();
        assert_eq!(store.read_file_data(entry).unwrap(), b"survives reopen");
    }

    #[test]
    fn test_free_chain_returns_blocks() {
        let (_dir, mut store) = scratch();
        let entry = store
            .metadata_mut()
            .allocate(EntryType::File, 0, "f", 0, 0)
            .unwrap();
        store.write_file_data(entry, &vec![9u8; 2000]).unwrap();

        let start = store.metadata().get(entry).unwrap().start_block;
        store.free_chain(start).unwrap();
        assert_eq!(store.usage().used_blocks, 1);
    }
}
