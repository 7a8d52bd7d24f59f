//! Payload obfuscation codec.
//!
//! A fixed byte substitution applied to every payload byte on its way to
//! disk and reversed on the way back. This is obfuscation, not encryption:
//! there is no key and no integrity check, only the guarantee that
//! `decode(encode(x)) == x` for every byte string.

/// Offset of the substitution table.
const SHIFT: u8 = 73;

/// Bijective byte-permutation tables.
#[derive(Debug, Clone)]
pub struct Codec {
    enc: [u8; 256],
    dec: [u8; 256],
}

impl Codec {
    /// Builds the forward and inverse tables.
    #[must_use]
    pub fn new() -> Self {
        let mut enc = [0u8; 256];
        let mut dec = [0u8; 256];
        for i in 0..256u16 {
            let e = ((i + u16::from(SHIFT)) % 256) as u8;
            enc[i as usize] = e;
            dec[e as usize] = i as u8;
        }
        Self { enc, dec }
    }

    /// Encodes a buffer in place.
    pub fn encode(&self, data: &mut [u8]) {
        for byte in data {
            *byte = self.enc[*byte as usize];
        }
    }

    /// Decodes a buffer in place.
    pub fn decode(&self, data: &mut [u8]) {
        for byte in data {
            *byte = self.dec[*byte as usize];
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_inverse() {
        let codec = Codec::new();
        for i in 0..=255u8 {
            assert_eq!(codec.dec[codec.enc[i as usize] as usize], i);
        }
    }

    #[test]
    fn test_known_values() {
        let codec = Codec::new();
        let mut data = [0u8, 1, 200];
        codec.encode(&mut data);
        assert_eq!(data, [73, 74, 17]); // (200 + 73) % 256 == 17
    }

    #[test]
    fn test_round_trip_all_bytes() {
        let codec = Codec::new();
        let original: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let mut data = original.clone();
        codec.encode(&mut data);
        assert_ne!(data, original);
        codec.decode(&mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn test_empty_buffer() {
        let codec = Codec::new();
        let mut data: [u8; 0] = [];
        codec.encode(&mut data);
        codec.decode(&mut data);
    }
}
