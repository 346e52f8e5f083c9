//! Data file framing: header, trailer and little-endian field access.
//!
//! ```text
//! | header (32) | segment | footer | trailer (16) | segment | footer | trailer (16) | ...
//! ```
//!
//! Header:
//!
//! ```text
//! | magic "SGSD" (4) | version (2) | reserved (2) | file_seq (8) | crc32 (4) | zero pad (12) |
//! ```
//!
//! Trailer (always the last 16 bytes of a cleanly persisted file):
//!
//! ```text
//! | footer_offset (8) | footer_len (4) | magic "SGTR" (4) |
//! ```

use crate::error::{StoreError, StoreResult};

/// Length of the data file header in bytes.
pub const HEADER_LENGTH: u64 = 32;

/// Length of the trailer that follows every footer.
pub const TRAILER_LENGTH: u64 = 16;

/// Magic bytes at the start of every data file.
pub const FILE_MAGIC: [u8; 4] = *b"SGSD";

/// Magic bytes closing every trailer.
pub const TRAILER_MAGIC: [u8; 4] = *b"SGTR";

/// Current on-disk format version.
pub const FORMAT_VERSION: u16 = 1;

/// Computes the CRC32 (IEEE) checksum of `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Encodes the header for data file number `file_seq`.
#[must_use]
pub fn encode_header(file_seq: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LENGTH as usize);
    buf.extend_from_slice(&FILE_MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    buf.extend_from_slice(&file_seq.to_le_bytes());
    let crc = checksum(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.resize(HEADER_LENGTH as usize, 0);
    buf
}

/// Decodes a header, returning its file sequence number.
pub fn decode_header(data: &[u8]) -> StoreResult<u64> {
    if data.len() < HEADER_LENGTH as usize || data[0..4] != FILE_MAGIC {
        return Err(StoreError::invalid_format("invalid data file magic"));
    }

    let mut reader = Reader::new(&data[4..]);
    let version = reader.u16()?;
    if version > FORMAT_VERSION {
        return Err(StoreError::invalid_format(format!(
            "unsupported format version: {version}"
        )));
    }
    reader.u16()?;
    let file_seq = reader.u64()?;
    let stored = reader.u32()?;
    let actual = checksum(&data[0..16]);
    if stored != actual {
        return Err(StoreError::corrupted(format!(
            "header checksum mismatch: expected {stored:08x}, got {actual:08x}"
        )));
    }

    Ok(file_seq)
}

/// Encodes the trailer pointing at a footer.
#[must_use]
pub fn encode_trailer(footer_offset: u64, footer_len: u32) -> [u8; TRAILER_LENGTH as usize] {
    let mut buf = [0u8; TRAILER_LENGTH as usize];
    buf[0..8].copy_from_slice(&footer_offset.to_le_bytes());
    buf[8..12].copy_from_slice(&footer_len.to_le_bytes());
    buf[12..16].copy_from_slice(&TRAILER_MAGIC);
    buf
}

/// Decodes a trailer into `(footer_offset, footer_len)`.
///
/// Returns `None` when the magic does not match (torn tail).
#[must_use]
pub fn decode_trailer(data: &[u8]) -> Option<(u64, u32)> {
    if data.len() != TRAILER_LENGTH as usize || data[12..16] != TRAILER_MAGIC {
        return None;
    }
    let mut reader = Reader::new(data);
    let offset = reader.u64().ok()?;
    let len = reader.u32().ok()?;
    Some((offset, len))
}

/// Bounds-checked little-endian cursor.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn bytes(&mut self, len: usize) -> StoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| StoreError::corrupted("record extends beyond buffer"))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> StoreResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> StoreResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> StoreResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> StoreResult<u64> {
        let b = self.bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = encode_header(7);
        assert_eq!(header.len() as u64, HEADER_LENGTH);
        assert_eq!(decode_header(&header).unwrap(), 7);
    }

    #[test]
    fn header_bad_magic_rejected() {
        let mut header = encode_header(1);
        header[0] = b'X';
        assert!(matches!(
            decode_header(&header),
            Err(StoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn header_checksum_detects_flip() {
        let mut header = encode_header(1);
        header[9] ^= 0xFF;
        assert!(matches!(
            decode_header(&header),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn torn_trailer_is_none() {
        let mut trailer = encode_trailer(4096, 120);
        assert_eq!(decode_trailer(&trailer), Some((4096, 120)));
        trailer[15] = 0;
        assert_eq!(decode_trailer(&trailer), None);
    }

    #[test]
    fn reader_bounds() {
        let mut reader = Reader::new(&[1, 0, 0]);
        assert_eq!(reader.u16().unwrap(), 1);
        assert!(reader.u16().is_err());
        assert_eq!(reader.position(), 2);
    }
}
