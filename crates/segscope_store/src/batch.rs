//! Write batches backed by a byte arena.
//!
//! A batch is created with an operation-count and byte-size hint. Callers
//! can either copy data in with [`Batch::set`] / [`Batch::del`], or reserve
//! exact-sized slots with [`Batch::alloc`], fill them through
//! [`Batch::slot_mut`] and register them with [`Batch::alloc_set`].
//! Slot allocation never grows the arena past its reserved size.

use crate::error::{StoreError, StoreResult};
use crate::segment::{Op, OpKind};
use std::ops::Range;

/// A reserved region of a batch arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaSlot {
    range: Range<usize>,
}

impl ArenaSlot {
    /// Length of the slot in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns whether the slot is zero bytes long.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

#[derive(Debug, Clone)]
struct BatchOp {
    kind: OpKind,
    key: Range<usize>,
    value: Range<usize>,
}

/// An ordered set of mutations awaiting execution.
#[derive(Debug)]
pub struct Batch {
    arena: Vec<u8>,
    capacity: usize,
    ops: Vec<BatchOp>,
}

impl Batch {
    pub(crate) fn with_capacity(total_ops: usize, total_bytes: usize) -> Self {
        Self {
            arena: Vec::with_capacity(total_bytes),
            capacity: total_bytes,
            ops: Vec::with_capacity(total_ops),
        }
    }

    /// Bytes still available for [`Batch::alloc`].
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.arena.len()
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns whether no operation has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total key and value bytes held by the batch.
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.arena.len()
    }

    /// Reserves `len` bytes from the arena.
    ///
    /// # Errors
    ///
    /// Returns `AllocTooLarge` when fewer than `len` bytes remain.
    pub fn alloc(&mut self, len: usize) -> StoreResult<ArenaSlot> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(StoreError::AllocTooLarge {
                requested: len,
                remaining,
            });
        }
        let start = self.arena.len();
        self.arena.resize(start + len, 0);
        Ok(ArenaSlot {
            range: start..start + len,
        })
    }

    /// Mutable access to a slot previously returned by [`Batch::alloc`].
    pub fn slot_mut(&mut self, slot: &ArenaSlot) -> StoreResult<&mut [u8]> {
        self.check_slot(slot)?;
        Ok(&mut self.arena[slot.range.clone()])
    }

    /// Registers a set of `key` to `value`, both already written into the arena.
    pub fn alloc_set(&mut self, key: &ArenaSlot, value: &ArenaSlot) -> StoreResult<()> {
        self.check_slot(key)?;
        self.check_slot(value)?;
        self.ops.push(BatchOp {
            kind: OpKind::Set,
            key: key.range.clone(),
            value: value.range.clone(),
        });
        Ok(())
    }

    /// Copies `key` and `value` into the batch as a set operation.
    ///
    /// The arena grows when the reserved size is exhausted.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let key = self.copy_in(key);
        let value = self.copy_in(value);
        self.ops.push(BatchOp {
            kind: OpKind::Set,
            key,
            value,
        });
    }

    /// Copies `key` into the batch as a delete operation.
    pub fn del(&mut self, key: &[u8]) {
        let key = self.copy_in(key);
        let end = key.end;
        self.ops.push(BatchOp {
            kind: OpKind::Del,
            key,
            value: end..end,
        });
    }

    fn copy_in(&mut self, data: &[u8]) -> Range<usize> {
        let start = self.arena.len();
        self.arena.extend_from_slice(data);
        self.capacity = self.capacity.max(self.arena.len());
        start..self.arena.len()
    }

    fn check_slot(&self, slot: &ArenaSlot) -> StoreResult<()> {
        if slot.range.end > self.arena.len() {
            return Err(StoreError::invalid_slot(format!(
                "slot {:?} outside arena of {} bytes",
                slot.range,
                self.arena.len()
            )));
        }
        Ok(())
    }

    /// Converts the batch into owned ops in registration order.
    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
            .into_iter()
            .map(|op| Op {
                kind: op.kind,
                key: self.arena[op.key].to_vec(),
                value: self.arena[op.value].to_vec(),
            })
            .collect()
    }
}
