//! Offline compaction.

use crate::error::{CoreError, CoreResult};
use segscope_store::{Store, StoreOptions};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Outcome of compacting one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactReport {
    /// Segments before compaction.
    pub segments_before: u64,
    /// Segments after compaction.
    pub segments_after: u64,
    /// Directory bytes before compaction.
    pub bytes_before: u64,
    /// Directory bytes after compaction.
    pub bytes_after: u64,
}

/// Compacts the store at `dir` into a single segment.
///
/// The store must not be in use by any other process.
pub fn compact_dir(dir: &Path) -> CoreResult<CompactReport> {
    let options = StoreOptions::default().create_if_missing(false);
    let store = Store::open(dir, options).map_err(CoreError::store("Store::open"))?;
    let before = store.stats().map_err(CoreError::store("Store::stats"))?;

    let footer = store.compact().map_err(CoreError::store("Store::persist"))?;
    drop(footer);

    let after = store.stats().map_err(CoreError::store("Store::stats"))?;
    store.close();

    let report = CompactReport {
        segments_before: before.num_segments,
        segments_after: after.num_segments,
        bytes_before: before.num_bytes_used_disk,
        bytes_after: after.num_bytes_used_disk,
    };
    info!(
        dir = %dir.display(),
        segments_before = report.segments_before,
        segments_after = report.segments_after,
        "compaction done"
    );
    Ok(report)
}
