//! Footers: immutable descriptors of persisted store states.
//!
//! ## Footer Format
//!
//! ```text
//! | magic "SGFT" (4) | version (2) | reserved (2) | seq (8) | prev_offset (8) |
//! | segment_count (4) | SegmentLoc (48) * segment_count | crc32 (4) |
//! ```
//!
//! `prev_offset == 0` marks the oldest footer in a data file. Every footer
//! is followed by a trailer (see [`crate::format`]).

use crate::error::{StoreError, StoreResult};
use crate::file::DataFile;
use crate::format::{checksum, Reader, FORMAT_VERSION, TRAILER_LENGTH};
use crate::segment::{OpKind, Segment, SegmentLoc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Magic bytes for footer records.
pub const FOOTER_MAGIC: [u8; 4] = *b"SGFT";

/// Fixed part of an encoded footer, excluding segment locations.
const FOOTER_FIXED_SIZE: usize = 4 + 2 + 2 + 8 + 8 + 4 + 4;

/// Serialized footer body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FooterRecord {
    /// Persist sequence number.
    pub seq: u64,
    /// Offset of the previous footer in the same file.
    pub prev_offset: Option<u64>,
    /// Segments composing this state, oldest first.
    pub segment_locs: Vec<SegmentLoc>,
}

impl FooterRecord {
    /// Returns the encoded size of the footer body.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        FOOTER_FIXED_SIZE + self.segment_locs.len() * SegmentLoc::ENCODED_SIZE
    }

    /// Encodes the footer body.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&FOOTER_MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&self.seq.to_le_bytes());
        buf.extend_from_slice(&self.prev_offset.unwrap_or(0).to_le_bytes());
        let count = u32::try_from(self.segment_locs.len()).unwrap_or(u32::MAX);
        buf.extend_from_slice(&count.to_le_bytes());
        for loc in &self.segment_locs {
            loc.encode_into(&mut buf);
        }
        let crc = checksum(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a footer body, verifying magic and checksum.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < FOOTER_FIXED_SIZE || data[0..4] != FOOTER_MAGIC {
            return Err(StoreError::corrupted("invalid footer magic"));
        }

        let (body, crc_bytes) = data.split_at(data.len() - 4);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = checksum(body);
        if stored != actual {
            return Err(StoreError::corrupted(format!(
                "footer checksum mismatch: expected {stored:08x}, got {actual:08x}"
            )));
        }

        let mut reader = Reader::new(&body[4..]);
        let version = reader.u16()?;
        if version > FORMAT_VERSION {
            return Err(StoreError::invalid_format(format!(
                "unsupported footer version: {version}"
            )));
        }
        reader.u16()?;
        let seq = reader.u64()?;
        let prev = reader.u64()?;
        let count = reader.u32()? as usize;

        let mut segment_locs = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            segment_locs.push(SegmentLoc::decode(&mut reader)?);
        }

        if !reader.is_empty() {
            return Err(StoreError::corrupted("trailing bytes after footer"));
        }

        Ok(Self {
            seq,
            prev_offset: (prev != 0).then_some(prev),
            segment_locs,
        })
    }
}

/// Identity of a footer: the data file it lives in and its offset there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FooterId {
    /// Data file sequence number.
    pub file_seq: u64,
    /// Offset of the footer body within the file.
    pub offset: u64,
}

/// An immutable, point-in-time view of the store.
///
/// A footer keeps its data file open for reads; dropping it (or calling
/// [`Footer::close`]) releases that reference.
pub struct Footer {
    id: Option<FooterId>,
    record: FooterRecord,
    file: Option<Arc<DataFile>>,
}

impl Footer {
    /// The footer of a store that has never persisted anything.
    #[must_use]
    pub(crate) fn empty() -> Self {
        Self {
            id: None,
            record: FooterRecord::default(),
            file: None,
        }
    }

    /// Reads the footer body at `offset` in `file`.
    pub(crate) fn load(file: Arc<DataFile>, file_seq: u64, offset: u64) -> StoreResult<Self> {
        let fixed = file.read_at(offset, FOOTER_FIXED_SIZE - 4)?;
        let count = u32::from_le_bytes([fixed[24], fixed[25], fixed[26], fixed[27]]) as usize;
        let len = count
            .checked_mul(SegmentLoc::ENCODED_SIZE)
            .and_then(|locs| locs.checked_add(FOOTER_FIXED_SIZE))
            .ok_or_else(|| StoreError::corrupted("footer segment count overflows"))?;
        let data = file.read_at(offset, len)?;
        let record = FooterRecord::decode(&data)?;
        Ok(Self {
            id: Some(FooterId { file_seq, offset }),
            record,
            file: Some(file),
        })
    }

    pub(crate) fn from_parts(id: FooterId, record: FooterRecord, file: Arc<DataFile>) -> Self {
        Self {
            id: Some(id),
            record,
            file: Some(file),
        }
    }

    /// Returns the footer's identity, `None` for the empty footer.
    #[must_use]
    pub fn id(&self) -> Option<FooterId> {
        self.id
    }

    /// Returns the persist sequence number.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.record.seq
    }

    /// Returns the segment locations, oldest first.
    #[must_use]
    pub fn segment_locs(&self) -> &[SegmentLoc] {
        &self.record.segment_locs
    }

    /// Returns the offset of the predecessor footer, if any.
    #[must_use]
    pub fn prev_offset(&self) -> Option<u64> {
        self.record.prev_offset
    }

    /// Serialized length of this footer including its trailer.
    ///
    /// The empty footer occupies no bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        if self.id.is_none() {
            return 0;
        }
        self.record.encoded_size() as u64 + TRAILER_LENGTH
    }

    pub(crate) fn file(&self) -> Option<&Arc<DataFile>> {
        self.file.as_ref()
    }

    pub(crate) fn record(&self) -> &FooterRecord {
        &self.record
    }

    /// Reads and decodes every segment, oldest first.
    pub fn segments(&self) -> StoreResult<Vec<Segment>> {
        let Some(file) = &self.file else {
            return Ok(Vec::new());
        };
        self.record
            .segment_locs
            .iter()
            .map(|loc| {
                let data = file.read_at(loc.offset, loc.length as usize)?;
                Segment::decode(&data)
            })
            .collect()
    }

    /// Looks up the current value of `key` in this view.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let Some(file) = &self.file else {
            return Ok(None);
        };

        for loc in self.record.segment_locs.iter().rev() {
            let data = file.read_at(loc.offset, loc.length as usize)?;
            let segment = Segment::decode(&data)?;
            if let Some(op) = segment.get(key) {
                return Ok(match op.kind {
                    OpKind::Set => Some(op.value.clone()),
                    OpKind::Del => None,
                });
            }
        }

        Ok(None)
    }

    /// Returns every live key-value pair in key order.
    pub fn entries(&self) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut live: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for segment in self.segments()? {
            for op in segment.ops() {
                match op.kind {
                    OpKind::Set => {
                        live.insert(op.key.clone(), op.value.clone());
                    }
                    OpKind::Del => {
                        live.remove(&op.key);
                    }
                }
            }
        }
        Ok(live.into_iter().collect())
    }

    /// Releases the footer's resources.
    pub fn close(self) {}
}

impl std::fmt::Debug for Footer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Footer")
            .field("id", &self.id)
            .field("seq", &self.record.seq)
            .field("num_segments", &self.record.segment_locs.len())
            .finish_non_exhaustive()
    }
}

impl Serialize for Footer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Footer", 6)?;
        state.serialize_field("file_seq", &self.id.map(|id| id.file_seq))?;
        state.serialize_field("offset", &self.id.map(|id| id.offset))?;
        state.serialize_field("seq", &self.record.seq)?;
        state.serialize_field("prev_offset", &self.record.prev_offset)?;
        state.serialize_field("length", &self.length())?;
        state.serialize_field("segment_locs", &self.record.segment_locs)?;
        state.end()
    }
}
