//! The persisted store: data files, the footer chain and compaction.

use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::file::DataFile;
use crate::footer::{Footer, FooterId, FooterRecord};
use crate::format::{
    decode_header, decode_trailer, encode_header, encode_trailer, HEADER_LENGTH, TRAILER_LENGTH,
};
use crate::options::{CompactionConcern, PersistOptions, StoreOptions};
use crate::segment::{Op, OpKind, Segment};
use crate::stats::{StoreCounters, StoreStats};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The data file currently receiving persists, plus its latest footer.
struct ActiveFile {
    seq: u64,
    file: Option<Arc<DataFile>>,
    latest: Option<(u64, FooterRecord)>,
}

struct StoreInner {
    dir: StoreDir,
    options: StoreOptions,
    active: Mutex<ActiveFile>,
    counters: StoreCounters,
    closed: AtomicBool,
}

/// A handle to an open store directory.
///
/// Cloning the handle is cheap; all clones share the same directory lock
/// and active data file.
///
/// # Example
///
/// ```rust,no_run
/// use segscope_store::{Op, PersistOptions, Store, StoreOptions};
///
/// let store = Store::open("my_store".as_ref(), StoreOptions::default()).unwrap();
/// store.persist(vec![Op::set("k", "v")], PersistOptions::default()).unwrap();
/// let footer = store.snapshot().unwrap();
/// assert_eq!(footer.get(b"k").unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Opens the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or locked, or if
    /// the active data file fails validation.
    pub fn open(path: &Path, options: StoreOptions) -> StoreResult<Self> {
        let dir = StoreDir::open(path, options.create_if_missing, options.read_only)?;
        let seqs = dir.data_file_seqs()?;

        let active = match seqs.last() {
            None => ActiveFile {
                seq: 0,
                file: None,
                latest: None,
            },
            Some(&seq) => {
                let file = Arc::new(DataFile::open(&dir.data_file_path(seq), !options.read_only)?);
                let latest = recover_latest(&file, seq)?;
                ActiveFile {
                    seq,
                    file: Some(file),
                    latest,
                }
            }
        };

        if !options.read_only && !options.keep_files && seqs.len() > 1 {
            let stale = &seqs[..seqs.len() - 1];
            let removed = dir.remove_data_files(stale)?;
            warn!(removed, "removed stale data files left by an interrupted compaction");
        }

        debug!(path = %path.display(), file_seq = active.seq, "opened store");

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                options,
                active: Mutex::new(active),
                counters: StoreCounters::default(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.dir.path()
    }

    /// Returns the options the store was opened with.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.inner.options
    }

    /// Returns whether the store was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.inner.options.read_only
    }

    /// Length of the data file header, counted once per footer by
    /// fragmentation accounting.
    #[must_use]
    pub const fn header_length(&self) -> u64 {
        HEADER_LENGTH
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Returns the latest persisted footer.
    ///
    /// A store that has never persisted returns an empty footer.
    pub fn snapshot(&self) -> StoreResult<Footer> {
        self.check_open()?;
        let active = self.inner.active.lock();
        Ok(latest_footer(&active))
    }

    /// Returns the footer persisted immediately before `footer`, or `None`
    /// at the start of the chain.
    pub fn snapshot_previous(&self, footer: &Footer) -> StoreResult<Option<Footer>> {
        self.check_open()?;
        let (Some(id), Some(prev), Some(file)) = (footer.id(), footer.prev_offset(), footer.file())
        else {
            return Ok(None);
        };
        Footer::load(Arc::clone(file), id.file_seq, prev).map(Some)
    }

    /// Persists `ops` as a new segment and returns the resulting footer.
    ///
    /// Compacts instead of stacking a segment when `options` asks for it.
    /// An empty change set without `CompactionConcern::Force` is a no-op.
    pub fn persist(&self, ops: Vec<Op>, options: PersistOptions) -> StoreResult<Footer> {
        self.check_open()?;
        if self.inner.options.read_only {
            return Err(StoreError::ReadOnly);
        }

        let mut active = self.inner.active.lock();
        let segment = Segment::from_ops(ops);

        if segment.is_empty() && options.compaction != CompactionConcern::Force {
            return Ok(latest_footer(&active));
        }

        let stacked = active
            .latest
            .as_ref()
            .map_or(0, |(_, record)| record.segment_locs.len())
            + usize::from(!segment.is_empty());

        let result = if options.wants_compaction(stacked) {
            self.compact_locked(&mut active, segment)
        } else {
            self.append_locked(&mut active, &segment)
        };

        match result {
            Ok(footer) => {
                self.inner.counters.record_persist();
                Ok(footer)
            }
            Err(err) => {
                self.inner.counters.record_persist_error();
                Err(err)
            }
        }
    }

    /// Rewrites all live data into a single segment in a fresh data file.
    pub fn compact(&self) -> StoreResult<Footer> {
        self.persist(
            Vec::new(),
            PersistOptions::default().compaction(CompactionConcern::Force),
        )
    }

    fn append_locked(&self, active: &mut ActiveFile, segment: &Segment) -> StoreResult<Footer> {
        let file = match &active.file {
            Some(file) => Arc::clone(file),
            None => {
                let seq = active.seq + 1;
                let file = self.create_data_file(seq)?;
                active.seq = seq;
                active.file = Some(Arc::clone(&file));
                file
            }
        };

        let encoded = segment.encode();
        let offset = file.append(&encoded)?;
        let loc = segment.loc_at(offset, encoded.len() as u64);

        let (prev_offset, prev_seq, mut segment_locs) = match &active.latest {
            Some((offset, record)) => (Some(*offset), record.seq, record.segment_locs.clone()),
            None => (None, 0, Vec::new()),
        };
        segment_locs.push(loc);

        let record = FooterRecord {
            seq: prev_seq + 1,
            prev_offset,
            segment_locs,
        };
        let footer_offset = write_footer(&file, &record)?;
        file.sync()?;

        debug!(
            file_seq = active.seq,
            footer_seq = record.seq,
            ops = segment.ops().len(),
            "persisted segment"
        );

        let id = FooterId {
            file_seq: active.seq,
            offset: footer_offset,
        };
        active.latest = Some((footer_offset, record.clone()));
        Ok(Footer::from_parts(id, record, file))
    }

    fn compact_locked(&self, active: &mut ActiveFile, pending: Segment) -> StoreResult<Footer> {
        let current = latest_footer(active);
        let mut live: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for segment in current.segments()?.into_iter().chain(std::iter::once(pending)) {
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
        let merged = Segment::from_ops(live.into_iter().map(|(k, v)| Op::set(k, v)));

        let old_seq = active.seq;
        let new_seq = old_seq + 1;
        let file = self.create_data_file(new_seq)?;

        let mut segment_locs = Vec::new();
        if !merged.is_empty() {
            let encoded = merged.encode();
            let offset = file.append(&encoded)?;
            segment_locs.push(merged.loc_at(offset, encoded.len() as u64));
        }

        let record = FooterRecord {
            seq: current.seq() + 1,
            prev_offset: None,
            segment_locs,
        };
        let footer_offset = write_footer(&file, &record)?;
        file.sync()?;
        self.inner.dir.sync_directory()?;

        active.seq = new_seq;
        active.file = Some(Arc::clone(&file));
        active.latest = Some((footer_offset, record.clone()));

        if old_seq > 0 && !self.inner.options.keep_files {
            self.inner.dir.remove_data_files(&[old_seq])?;
        }

        self.inner.counters.record_compaction();
        info!(
            from_file_seq = old_seq,
            to_file_seq = new_seq,
            live_keys = merged.ops().len(),
            "compacted store"
        );

        Ok(Footer::from_parts(
            FooterId {
                file_seq: new_seq,
                offset: footer_offset,
            },
            record,
            file,
        ))
    }

    fn create_data_file(&self, seq: u64) -> StoreResult<Arc<DataFile>> {
        let file = DataFile::open(&self.inner.dir.data_file_path(seq), true)?;
        if file.size() != 0 {
            return Err(StoreError::invalid_format(format!(
                "data file {seq} already exists"
            )));
        }
        file.append(&encode_header(seq))?;
        debug!(path = %file.path().display(), "created data file");
        Ok(Arc::new(file))
    }

    /// Bytes used on disk by the store directory.
    pub fn dir_size(&self) -> StoreResult<u64> {
        self.check_open()?;
        self.inner.dir.disk_usage()
    }

    /// Returns the store's statistics.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        self.check_open()?;
        let (num_segments, file_seq, footer_seq) = {
            let active = self.inner.active.lock();
            let (segments, footer_seq) = active
                .latest
                .as_ref()
                .map_or((0, 0), |(_, record)| (record.segment_locs.len() as u64, record.seq));
            (segments, active.seq, footer_seq)
        };

        Ok(StoreStats {
            num_segments,
            num_files: self.inner.dir.data_file_seqs()?.len() as u64,
            num_bytes_used_disk: self.inner.dir.disk_usage()?,
            file_seq,
            footer_seq,
            total_persists: self.inner.counters.persists(),
            total_compactions: self.inner.counters.compactions(),
            total_persist_errors: self.inner.counters.persist_errors(),
        })
    }

    /// Closes the handle. Later calls on any clone fail with `Closed`.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!(path = %self.path().display(), "closed store");
        }
    }

    /// Returns whether the handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path())
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}

fn latest_footer(active: &ActiveFile) -> Footer {
    match (&active.latest, &active.file) {
        (Some((offset, record)), Some(file)) => Footer::from_parts(
            FooterId {
                file_seq: active.seq,
                offset: *offset,
            },
            record.clone(),
            Arc::clone(file),
        ),
        _ => Footer::empty(),
    }
}

/// Appends `record` and its trailer, returning the footer offset.
fn write_footer(file: &DataFile, record: &FooterRecord) -> StoreResult<u64> {
    let body = record.encode();
    let len = u32::try_from(body.len())
        .map_err(|_| StoreError::invalid_format("footer too large"))?;
    let offset = file.append(&body)?;
    file.append(&encode_trailer(offset, len))?;
    Ok(offset)
}

/// Validates the header and locates the latest footer of a data file.
fn recover_latest(file: &Arc<DataFile>, seq: u64) -> StoreResult<Option<(u64, FooterRecord)>> {
    let size = file.size();
    if size < HEADER_LENGTH {
        return Err(StoreError::corrupted(format!(
            "data file {seq} shorter than its header"
        )));
    }

    let header_seq = decode_header(&file.read_at(0, HEADER_LENGTH as usize)?)?;
    if header_seq != seq {
        return Err(StoreError::corrupted(format!(
            "data file {seq} carries header sequence {header_seq}"
        )));
    }

    if size == HEADER_LENGTH {
        return Ok(None);
    }
    if size < HEADER_LENGTH + TRAILER_LENGTH {
        return Err(StoreError::corrupted(format!("data file {seq} has a torn tail")));
    }

    let trailer = file.read_at(size - TRAILER_LENGTH, TRAILER_LENGTH as usize)?;
    let Some((offset, len)) = decode_trailer(&trailer) else {
        return Err(StoreError::corrupted(format!("data file {seq} has a torn tail")));
    };

    let footer = Footer::load(Arc::clone(file), seq, offset)?;
    if footer.length() != u64::from(len) + TRAILER_LENGTH {
        return Err(StoreError::corrupted(format!(
            "footer at {offset} disagrees with its trailer length {len}"
        )));
    }
    Ok(Some((offset, footer.record().clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ops(prefix: &str, n: usize) -> Vec<Op> {
        (0..n)
            .map(|i| Op::set(format!("{prefix}{i}"), format!("val{i}")))
            .collect()
    }

    fn stack_only() -> PersistOptions {
        PersistOptions::default().compaction(CompactionConcern::Disallow)
    }

    #[test]
    fn fresh_store_has_empty_snapshot() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();

        let footer = store.snapshot().unwrap();
        assert!(footer.id().is_none());
        assert!(store.snapshot_previous(&footer).unwrap().is_none());
        assert_eq!(store.stats().unwrap().num_segments, 0);
    }

    #[test]
    fn persist_stacks_segments_and_links_footers() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();

        store.persist(ops("a", 3), stack_only()).unwrap();
        let latest = store.persist(ops("b", 2), stack_only()).unwrap();

        assert_eq!(latest.segment_locs().len(), 2);
        assert_eq!(latest.seq(), 2);

        let prev = store.snapshot_previous(&latest).unwrap().unwrap();
        assert_eq!(prev.segment_locs().len(), 1);
        assert_eq!(prev.segment_locs()[0].tot_ops_set, 3);
        assert!(store.snapshot_previous(&prev).unwrap().is_none());
    }

    #[test]
    fn reopen_recovers_latest_footer() {
        let temp = tempdir().unwrap();
        {
            let store = Store::open(temp.path(), StoreOptions::default()).unwrap();
            store.persist(ops("key", 5), stack_only()).unwrap();
            store.persist(vec![Op::del("key0")], stack_only()).unwrap();
        }

        let store = Store::open(temp.path(), StoreOptions::read_only_mode()).unwrap();
        let footer = store.snapshot().unwrap();
        assert_eq!(footer.seq(), 2);
        assert_eq!(footer.get(b"key0").unwrap(), None);
        assert_eq!(footer.get(b"key1").unwrap(), Some(b"val1".to_vec()));
        assert_eq!(footer.entries().unwrap().len(), 4);
    }

    #[test]
    fn empty_persist_is_noop_unless_forced() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();
        store.persist(ops("k", 2), stack_only()).unwrap();

        let same = store.persist(Vec::new(), PersistOptions::default()).unwrap();
        assert_eq!(same.seq(), 1);
        assert_eq!(store.stats().unwrap().total_persists, 1);
    }

    #[test]
    fn compaction_merges_into_one_segment_and_new_file() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();

        for round in 0..3 {
            store.persist(ops(&format!("r{round}_"), 4), stack_only()).unwrap();
        }
        store.persist(vec![Op::del("r0_0")], stack_only()).unwrap();
        assert_eq!(store.stats().unwrap().num_segments, 4);

        let footer = store.compact().unwrap();
        assert_eq!(footer.segment_locs().len(), 1);
        assert_eq!(footer.segment_locs()[0].tot_ops_set, 11);
        assert_eq!(footer.segment_locs()[0].tot_ops_del, 0);
        assert!(store.snapshot_previous(&footer).unwrap().is_none());

        let stats = store.stats().unwrap();
        assert_eq!(stats.num_files, 1);
        assert_eq!(stats.file_seq, 2);
        assert_eq!(stats.total_compactions, 1);
    }

    #[test]
    fn allow_compacts_past_threshold() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();
        let options = PersistOptions::default().max_segments(2);

        store.persist(ops("a", 1), options).unwrap();
        store.persist(ops("b", 1), options).unwrap();
        let footer = store.persist(ops("c", 1), options).unwrap();

        assert_eq!(footer.segment_locs().len(), 1);
        assert_eq!(store.stats().unwrap().total_compactions, 1);
    }

    #[test]
    fn read_only_rejects_persist() {
        let temp = tempdir().unwrap();
        drop(Store::open(temp.path(), StoreOptions::default()).unwrap());

        let store = Store::open(temp.path(), StoreOptions::read_only_mode()).unwrap();
        let result = store.persist(ops("k", 1), PersistOptions::default());
        assert!(matches!(result, Err(StoreError::ReadOnly)));
    }

    #[test]
    fn closed_store_rejects_calls() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();
        store.close();

        assert!(store.is_closed());
        assert!(matches!(store.snapshot(), Err(StoreError::Closed)));
    }

    #[test]
    fn torn_tail_detected() {
        let temp = tempdir().unwrap();
        {
            let store = Store::open(temp.path(), StoreOptions::default()).unwrap();
            store.persist(ops("k", 2), stack_only()).unwrap();
        }
        let path = temp.path().join("data-0000000000000001.seg");
        let file = DataFile::open(&path, true).unwrap();
        file.truncate(file.size() - 3).unwrap();
        drop(file);

        let result = Store::open(temp.path(), StoreOptions::default());
        assert!(matches!(result, Err(StoreError::Corrupted { .. })));
    }
}
