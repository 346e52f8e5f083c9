//! Segments: immutable, key-sorted runs of operations.
//!
//! ## Segment Format
//!
//! ```text
//! | record* | crc32 (4) |
//! record = | op (1) | key_len (4) | val_len (4) | key (N) | val (M) |
//! ```
//!
//! Ops:
//! - `0x01` = set
//! - `0x02` = delete (val_len is always 0)

use crate::error::{StoreError, StoreResult};
use crate::format::{checksum, Reader};
use serde::Serialize;
use std::collections::BTreeMap;

/// Kind of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpKind {
    /// Set a key to a value.
    Set,
    /// Delete a key.
    Del,
}

impl OpKind {
    /// Returns the on-disk byte for this kind.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Set => 0x01,
            Self::Del => 0x02,
        }
    }

    /// Parses an on-disk byte.
    pub fn from_byte(b: u8) -> StoreResult<Self> {
        match b {
            0x01 => Ok(Self::Set),
            0x02 => Ok(Self::Del),
            other => Err(StoreError::corrupted(format!("unknown op byte: {other:#04x}"))),
        }
    }
}

/// A single owned mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    /// Mutation kind.
    pub kind: OpKind,
    /// Key bytes.
    pub key: Vec<u8>,
    /// Value bytes (empty for deletes).
    pub value: Vec<u8>,
}

impl Op {
    /// Creates a set operation.
    #[must_use]
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OpKind::Set,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a delete operation.
    #[must_use]
    pub fn del(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: OpKind::Del,
            key: key.into(),
            value: Vec::new(),
        }
    }

    /// Returns whether this is a delete.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.kind == OpKind::Del
    }
}

/// Location and counters of one on-disk segment, as recorded by a footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SegmentLoc {
    /// Offset of the segment within the data file.
    pub offset: u64,
    /// Encoded length of the segment including its checksum.
    pub length: u64,
    /// Number of set operations.
    pub tot_ops_set: u64,
    /// Number of delete operations.
    pub tot_ops_del: u64,
    /// Total key bytes.
    pub tot_key_bytes: u64,
    /// Total value bytes.
    pub tot_val_bytes: u64,
}

impl SegmentLoc {
    /// Encoded size of one location record.
    pub const ENCODED_SIZE: usize = 48;

    /// Logical payload of the segment: key bytes plus value bytes.
    #[must_use]
    pub const fn payload_bytes(&self) -> u64 {
        self.tot_key_bytes + self.tot_val_bytes
    }

    pub(crate) fn encode_into(&self, buf: &mut Vec<u8>) {
        for field in [
            self.offset,
            self.length,
            self.tot_ops_set,
            self.tot_ops_del,
            self.tot_key_bytes,
            self.tot_val_bytes,
        ] {
            buf.extend_from_slice(&field.to_le_bytes());
        }
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> StoreResult<Self> {
        Ok(Self {
            offset: reader.u64()?,
            length: reader.u64()?,
            tot_ops_set: reader.u64()?,
            tot_ops_del: reader.u64()?,
            tot_key_bytes: reader.u64()?,
            tot_val_bytes: reader.u64()?,
        })
    }
}

/// A decoded segment. Keys are unique and sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    ops: Vec<Op>,
}

impl Segment {
    /// Builds a segment from ops in application order. The last op for a key wins.
    pub fn from_ops(ops: impl IntoIterator<Item = Op>) -> Self {
        let mut latest: BTreeMap<Vec<u8>, Op> = BTreeMap::new();
        for op in ops {
            latest.insert(op.key.clone(), op);
        }
        Self {
            ops: latest.into_values().collect(),
        }
    }

    /// Returns the sorted ops.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Returns whether the segment holds no ops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Looks up the op recorded for `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&Op> {
        self.ops
            .binary_search_by(|op| op.key.as_slice().cmp(key))
            .ok()
            .map(|idx| &self.ops[idx])
    }

    /// Encodes the segment to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let body: usize = self.ops.iter().map(|op| 9 + op.key.len() + op.value.len()).sum();
        let mut buf = Vec::with_capacity(body + 4);
        for op in &self.ops {
            buf.push(op.kind.as_byte());
            buf.extend_from_slice(&(op.key.len() as u32).to_le_bytes());
            buf.extend_from_slice(&(op.value.len() as u32).to_le_bytes());
            buf.extend_from_slice(&op.key);
            buf.extend_from_slice(&op.value);
        }
        let crc = checksum(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a segment, verifying its checksum.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < 4 {
            return Err(StoreError::corrupted("segment too short"));
        }
        let (body, crc_bytes) = data.split_at(data.len() - 4);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = checksum(body);
        if stored != actual {
            return Err(StoreError::corrupted(format!(
                "segment checksum mismatch: expected {stored:08x}, got {actual:08x}"
            )));
        }

        let mut reader = Reader::new(body);
        let mut ops = Vec::new();
        while !reader.is_empty() {
            let kind = OpKind::from_byte(reader.u8()?)?;
            let key_len = reader.u32()? as usize;
            let val_len = reader.u32()? as usize;
            let key = reader.bytes(key_len)?.to_vec();
            let value = reader.bytes(val_len)?.to_vec();
            ops.push(Op { kind, key, value });
        }

        Ok(Self { ops })
    }

    /// Computes the location record for this segment written at `offset`.
    #[must_use]
    pub fn loc_at(&self, offset: u64, length: u64) -> SegmentLoc {
        let mut loc = SegmentLoc {
            offset,
            length,
            ..SegmentLoc::default()
        };
        for op in &self.ops {
            match op.kind {
                OpKind::Set => loc.tot_ops_set += 1,
                OpKind::Del => loc.tot_ops_del += 1,
            }
            loc.tot_key_bytes += op.key.len() as u64;
            loc.tot_val_bytes += op.value.len() as u64;
        }
        loc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_op_for_key_wins() {
        let segment = Segment::from_ops(vec![
            Op::set("b", "1"),
            Op::set("a", "1"),
            Op::set("b", "2"),
            Op::del("a"),
        ]);

        assert_eq!(segment.ops().len(), 2);
        assert!(segment.get(b"a").unwrap().is_delete());
        assert_eq!(segment.get(b"b").unwrap().value, b"2");
        assert!(segment.get(b"c").is_none());
    }

    #[test]
    fn encode_decode_preserves_ops() {
        let segment = Segment::from_ops(vec![Op::set("key0", "val0"), Op::del("key1")]);
        let decoded = Segment::decode(&segment.encode()).unwrap();
        assert_eq!(decoded, segment);
    }

    #[test]
    fn corrupted_segment_rejected() {
        let mut bytes = Segment::from_ops(vec![Op::set("key0", "val0")]).encode();
        bytes[3] ^= 0x10;
        assert!(matches!(
            Segment::decode(&bytes),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn loc_counters() {
        let segment = Segment::from_ops(vec![
            Op::set("key0", "val0"),
            Op::set("key1", "value1"),
            Op::del("gone"),
        ]);
        let loc = segment.loc_at(32, 99);

        assert_eq!(loc.offset, 32);
        assert_eq!(loc.length, 99);
        assert_eq!(loc.tot_ops_set, 2);
        assert_eq!(loc.tot_ops_del, 1);
        assert_eq!(loc.tot_key_bytes, 12);
        assert_eq!(loc.tot_val_bytes, 10);
        assert_eq!(loc.payload_bytes(), 22);
    }
}
