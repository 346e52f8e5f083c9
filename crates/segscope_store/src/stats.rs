//! Store and collection statistics.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time statistics of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Segments in the latest footer.
    pub num_segments: u64,
    /// Data files currently in the directory.
    pub num_files: u64,
    /// Bytes used on disk by the store directory.
    pub num_bytes_used_disk: u64,
    /// Sequence number of the active data file.
    pub file_seq: u64,
    /// Persist sequence of the latest footer.
    pub footer_seq: u64,
    /// Persists performed by this handle.
    pub total_persists: u64,
    /// Compactions performed by this handle.
    pub total_compactions: u64,
    /// Persists that failed.
    pub total_persist_errors: u64,
}

impl StoreStats {
    /// Returns the statistics as `(name, value)` pairs.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, u64); 8] {
        [
            ("num_segments", self.num_segments),
            ("num_files", self.num_files),
            ("num_bytes_used_disk", self.num_bytes_used_disk),
            ("file_seq", self.file_seq),
            ("footer_seq", self.footer_seq),
            ("total_persists", self.total_persists),
            ("total_compactions", self.total_compactions),
            ("total_persist_errors", self.total_persist_errors),
        ]
    }
}

/// Monotonic counters kept by a store handle.
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    persists: AtomicU64,
    compactions: AtomicU64,
    persist_errors: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn record_persist(&self) {
        self.persists.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_error(&self) {
        self.persist_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn persists(&self) -> u64 {
        self.persists.load(Ordering::Relaxed)
    }

    pub(crate) fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    pub(crate) fn persist_errors(&self) -> u64 {
        self.persist_errors.load(Ordering::Relaxed)
    }
}

/// Point-in-time statistics of a mutable collection.
///
/// The `cur_dirty_*` gauges describe data accepted by
/// [`crate::Collection::execute_batch`] but not yet durably persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    /// Operations not yet persisted.
    pub cur_dirty_ops: u64,
    /// Key and value bytes not yet persisted.
    pub cur_dirty_bytes: u64,
    /// Batches (future segments) not yet persisted.
    pub cur_dirty_segments: u64,
    /// Batches executed since the collection was opened.
    pub total_batches: u64,
    /// Persister cycles that wrote data.
    pub total_persister_cycles: u64,
    /// Persister cycles that failed.
    pub total_persister_errors: u64,
}

impl CollectionStats {
    /// Returns whether every dirty gauge is zero.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.cur_dirty_ops == 0 && self.cur_dirty_bytes == 0 && self.cur_dirty_segments == 0
    }
}

/// Collection statistics shared between a collection and its events.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedStats(Arc<Mutex<CollectionStats>>);

impl SharedStats {
    pub(crate) fn get(&self) -> CollectionStats {
        *self.0.lock()
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut CollectionStats)) {
        f(&mut self.0.lock());
    }
}
