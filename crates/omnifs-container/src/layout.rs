//! Region offset arithmetic.
//!
//! Every region boundary is a pure function of the header fields, so a
//! layout can be derived both from a configuration (at format time) and
//! from an on-disk header (at open time), and the two cross-checked.

use crate::error::{ContainerError, Result};
use crate::header::{Header, HEADER_SIZE};

/// Size of one metadata table slot.
pub const METADATA_SLOT_SIZE: usize = 128;

/// Size of one user table slot.
pub const USER_RECORD_SIZE: usize = 192;

/// Size of the per-block header (`next_block` u32, `data_size` u32, reserved).
pub const BLOCK_HEADER_SIZE: usize = 16;

/// Smallest allowed block size.
pub const MIN_BLOCK_SIZE: u32 = 512;

/// Largest allowed block size.
pub const MAX_BLOCK_SIZE: u32 = 1_048_576;

/// Computed region layout of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Container byte length.
    pub total_size: u64,
    /// Payload region block size.
    pub block_size: u32,
    /// User table slots.
    pub max_users: u32,
    /// Metadata table slots.
    pub max_files: u32,
}

impl Layout {
    /// Builds a layout from sizing parameters, validating them.
    ///
    /// # Errors
    ///
    /// Returns `CorruptHeader` when the parameters cannot form a container
    /// with at least one usable block.
    pub fn new(total_size: u64, block_size: u32, max_users: u32, max_files: u32) -> Result<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size)
            || !block_size.is_power_of_two()
        {
            return Err(ContainerError::CorruptHeader(format!(
                "block_size {block_size} must be a power of two in [{MIN_BLOCK_SIZE}, {MAX_BLOCK_SIZE}]"
            )));
        }
        if max_users == 0 || max_files == 0 {
            return Err(ContainerError::CorruptHeader(
                "max_users and max_files must be nonzero".to_string(),
            ));
        }
        let layout = Self {
            total_size,
            block_size,
            max_users,
            max_files,
        };
        if layout.usable_blocks() == 0 {
            return Err(ContainerError::CorruptHeader(format!(
                "total_size {total_size} leaves no room for data blocks"
            )));
        }
        Ok(layout)
    }

    /// Rebuilds the layout from an on-disk header, cross-checking the stored
    /// offsets against the derived ones.
    ///
    /// # Errors
    ///
    /// Returns `CorruptHeader` when a stored offset disagrees.
    pub fn from_header(header: &Header) -> Result<Self> {
        let metadata_offset = HEADER_SIZE as u64 + u64::from(header.max_users) * USER_RECORD_SIZE as u64;
        if u64::from(header.metadata_offset) != metadata_offset {
            return Err(ContainerError::CorruptHeader(format!(
                "metadata offset {} disagrees with derived {metadata_offset}",
                header.metadata_offset
            )));
        }
        let metadata_len = u64::from(header.bitmap_offset)
            .checked_sub(metadata_offset)
            .ok_or_else(|| {
                ContainerError::CorruptHeader("bitmap offset precedes metadata table".to_string())
            })?;
        if metadata_len == 0 || metadata_len % METADATA_SLOT_SIZE as u64 != 0 {
            return Err(ContainerError::CorruptHeader(format!(
                "metadata region length {metadata_len} is not a multiple of {METADATA_SLOT_SIZE}"
            )));
        }
        let max_files = u32::try_from(metadata_len / METADATA_SLOT_SIZE as u64)
            .map_err(|_| ContainerError::CorruptHeader("metadata table too large".to_string()))?;

        let layout = Self::new(
            header.total_size,
            header.block_size,
            header.max_users,
            max_files,
        )?;
        if layout.bitmap_offset() != u64::from(header.bitmap_offset) {
            return Err(ContainerError::CorruptHeader(format!(
                "bitmap offset {} disagrees with derived {}",
                header.bitmap_offset,
                layout.bitmap_offset()
            )));
        }
        Ok(layout)
    }

    /// Offset of the user table.
    #[must_use]
    pub const fn user_table_offset(&self) -> u64 {
        HEADER_SIZE as u64
    }

    /// Length of the user table region.
    #[must_use]
    pub const fn user_table_len(&self) -> u64 {
        self.max_users as u64 * USER_RECORD_SIZE as u64
    }

    /// Offset of the metadata table.
    #[must_use]
    pub const fn metadata_offset(&self) -> u64 {
        self.user_table_offset() + self.user_table_len()
    }

    /// Length of the metadata table region.
    #[must_use]
    pub const fn metadata_len(&self) -> u64 {
        self.max_files as u64 * METADATA_SLOT_SIZE as u64
    }

    /// Offset of the block bitmap.
    #[must_use]
    pub const fn bitmap_offset(&self) -> u64 {
        self.metadata_offset() + self.metadata_len()
    }

    /// Bitmap length: one byte per block of the remaining space, floored.
    #[must_use]
    pub const fn bitmap_len(&self) -> u64 {
        self.total_size.saturating_sub(self.bitmap_offset()) / self.block_size as u64
    }

    /// Offset of the first data block.
    #[must_use]
    pub const fn blocks_offset(&self) -> u64 {
        self.bitmap_offset() + self.bitmap_len()
    }

    /// Byte offset of block `index`.
    #[must_use]
    pub const fn block_offset(&self, index: u32) -> u64 {
        self.blocks_offset() + index as u64 * self.block_size as u64
    }

    /// Number of blocks that fit entirely inside the container. The bitmap
    /// sizing formula over-counts by the bitmap's own footprint; indices past
    /// this bound are never allocated.
    #[must_use]
    pub const fn usable_blocks(&self) -> u32 {
        let fitting = self.total_size.saturating_sub(self.blocks_offset()) / self.block_size as u64;
        let bitmap = self.bitmap_len();
        let count = if fitting < bitmap { fitting } else { bitmap };
        if count > u32::MAX as u64 {
            u32::MAX
        } else {
            count as u32
        }
    }

    /// Payload bytes per block, after the block header.
    #[must_use]
    pub const fn payload_per_block(&self) -> usize {
        self.block_size as usize - BLOCK_HEADER_SIZE
    }

    /// Builds the header for this layout.
    #[must_use]
    pub fn to_header(&self, student_id: &str, submission_date: &str) -> Header {
        Header {
            total_size: self.total_size,
            block_size: self.block_size,
            max_users: self.max_users,
            metadata_offset: self.metadata_offset() as u32,
            bitmap_offset: self.bitmap_offset() as u32,
            student_id: student_id.to_string(),
            submission_date: submission_date.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_offsets() {
        let layout = Layout::new(104_857_600, 65536, 50, 8192).unwrap();
        assert_eq!(layout.user_table_offset(), 512);
        assert_eq!(layout.metadata_offset(), 512 + 50 * 192);
        assert_eq!(layout.bitmap_offset(), 512 + 50 * 192 + 8192 * 128);
        assert_eq!(
            layout.blocks_offset(),
            layout.bitmap_offset() + layout.bitmap_len()
        );
        assert!(layout.usable_blocks() > 0);
        assert_eq!(layout.payload_per_block(), 65536 - 16);
    }

    #[test]
    fn test_no_block_extends_past_total_size() {
        for (total, bs) in [(1 << 20, 512u32), (104_857_600, 65536), (2_000_000, 4096)] {
            let layout = Layout::new(total, bs, 10, 64).unwrap();
            let last = layout.usable_blocks() - 1;
            assert!(layout.block_offset(last) + u64::from(bs) <= total);
        }
    }

    #[test]
    fn test_invalid_block_sizes_rejected() {
        assert!(Layout::new(1 << 20, 511, 10, 64).is_err()); // below minimum
        assert!(Layout::new(1 << 20, 768, 10, 64).is_err()); // not a power of two
        assert!(Layout::new(1 << 30, 2_097_152, 10, 64).is_err()); // above maximum
    }

    #[test]
    fn test_too_small_container_rejected() {
        // Tables alone exceed the container size.
        assert!(Layout::new(4096, 512, 50, 8192).is_err());
    }

    #[test]
    fn test_header_round_trip_preserves_layout() {
        let layout = Layout::new(10 << 20, 4096, 25, 512).unwrap();
        let header = layout.to_header("id", "2026-08-02");
        let rebuilt = Layout::from_header(&header).unwrap();
        assert_eq!(rebuilt, layout);
    }

    #[test]
    fn test_tampered_offset_detected() {
        let layout = Layout::new(10 << 20, 4096, 25, 512).unwrap();
        let mut header = layout.to_header("id", "2026-08-02");
        header.bitmap_offset += 128;
        assert!(Layout::from_header(&header).is_err());
    }
}
