//! Container header.
//!
//! The first 512 bytes of every container. All integers little-endian,
//! strings null-padded ASCII.
//!
//! ```text
//! offset  width  field
//! 0       8      magic "OMNIFS01"
//! 8       4      format_version (0x0001_0000)
//! 12      8      total_size
//! 20      4      header_size (512)
//! 24      4      block_size
//! 28      4      user_table_offset (== header_size)
//! 32      4      max_users
//! 36      4      file_state_storage_offset (metadata table)
//! 40      4      change_log_offset (block bitmap; historical name)
//! 44      32     student_id
//! 76      16     submission_date
//! 92..512        zero padding
//! ```

use crate::error::{ContainerError, Result};
use crate::fixed::{read_str, read_u32, read_u64, write_str, write_u32, write_u64};

/// Magic bytes identifying a container.
pub const MAGIC: [u8; 8] = *b"OMNIFS01";

/// Current format version (v1.0).
pub const FORMAT_VERSION: u32 = 0x0001_0000;

/// Fixed header size; the user table always starts here.
pub const HEADER_SIZE: usize = 512;

const STUDENT_ID_LEN: usize = 32;
const SUBMISSION_DATE_LEN: usize = 16;

/// Decoded container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Container byte length; equals the host file length.
    pub total_size: u64,
    /// Block size of the payload region.
    pub block_size: u32,
    /// Number of user table slots.
    pub max_users: u32,
    /// Offset of the metadata table.
    pub metadata_offset: u32,
    /// Offset of the block bitmap.
    pub bitmap_offset: u32,
    /// Free-form identifier string.
    pub student_id: String,
    /// ISO date string.
    pub submission_date: String,
}

impl Header {
    /// Encodes the header into its 512-byte on-disk form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&MAGIC);
        write_u32(&mut buf, 8, FORMAT_VERSION);
        write_u64(&mut buf, 12, self.total_size);
        write_u32(&mut buf, 20, HEADER_SIZE as u32);
        write_u32(&mut buf, 24, self.block_size);
        write_u32(&mut buf, 28, HEADER_SIZE as u32);
        write_u32(&mut buf, 32, self.max_users);
        write_u32(&mut buf, 36, self.metadata_offset);
        write_u32(&mut buf, 40, self.bitmap_offset);
        write_str(&mut buf[44..44 + STUDENT_ID_LEN], &self.student_id);
        write_str(
            &mut buf[76..76 + SUBMISSION_DATE_LEN],
            &self.submission_date,
        );
        buf
    }

    /// Decodes and validates a header read from disk.
    ///
    /// # Errors
    ///
    /// Returns `CorruptHeader` on a magic, version, or sizing mismatch.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(ContainerError::CorruptHeader(format!(
                "header too short: {} bytes",
                buf.len()
            )));
        }
        if buf[0..8] != MAGIC {
            return Err(ContainerError::CorruptHeader(
                "bad magic, not an OmniFS container".to_string(),
            ));
        }
        let version = read_u32(buf, 8);
        if version != FORMAT_VERSION {
            return Err(ContainerError::CorruptHeader(format!(
                "unsupported format version {version:#010x}"
            )));
        }
        let header_size = read_u32(buf, 20);
        if header_size != HEADER_SIZE as u32 {
            return Err(ContainerError::CorruptHeader(format!(
                "header_size is {header_size}, expected {HEADER_SIZE}"
            )));
        }
        let user_table_offset = read_u32(buf, 28);
        if user_table_offset != HEADER_SIZE as u32 {
            return Err(ContainerError::CorruptHeader(format!(
                "user table offset is {user_table_offset}, expected {HEADER_SIZE}"
            )));
        }

        Ok(Self {
            total_size: read_u64(buf, 12),
            block_size: read_u32(buf, 24),
            max_users: read_u32(buf, 32),
            metadata_offset: read_u32(buf, 36),
            bitmap_offset: read_u32(buf, 40),
            student_id: read_str(&buf[44..44 + STUDENT_ID_LEN]),
            submission_date: read_str(&buf[76..76 + SUBMISSION_DATE_LEN]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            total_size: 104_857_600,
            block_size: 65536,
            max_users: 50,
            metadata_offset: 512 + 50 * 192,
            bitmap_offset: 512 + 50 * 192 + 8192 * 128,
            student_id: "omnifs".to_string(),
            submission_date: "2026-08-02".to_string(),
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let header = sample();
        let bytes = header.encode();
        assert_eq!(&bytes[0..8], b"OMNIFS01");
        let decoded = Header::decode(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_encoded_fields_are_little_endian() {
        let bytes = sample().encode();
        // format_version 0x00010000 -> 00 00 01 00
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x01, 0x00]);
        // block_size 65536 -> 00 00 01 00
        assert_eq!(&bytes[24..28], &[0x00, 0x00, 0x01, 0x00]);
        // padding stays zero
        assert!(bytes[92..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = sample().encode();
        bytes[0] = b'X';
        let err = Header::decode(&bytes).unwrap_err();
        assert!(matches!(err, ContainerError::CorruptHeader(_)));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut bytes = sample().encode();
        bytes[8..12].copy_from_slice(&0x0002_0000u32.to_le_bytes());
        assert!(Header::decode(&bytes).is_err());
    }

    #[test]
    fn test_bad_header_size_rejected() {
        let mut bytes = sample().encode();
        bytes[20..24].copy_from_slice(&1024u32.to_le_bytes());
        assert!(Header::decode(&bytes).is_err());
    }
}
