//! Batch import of key-value pairs with a durability wait.
//!
//! Items are split into batches by [`ImportConfig::batch_size`] and
//! submitted to a [`Collection`] in order. Before the last batch goes out,
//! the importer registers a [`CompletionSignal`]; the persister-progress
//! handler fires it once the collection reports no dirty ops, bytes or
//! segments. Only then does [`BatchImporter::import`] return. A collection
//! that closes first discards the registration and the wait fails.

use crate::config::ImportConfig;
use crate::error::{CoreError, CoreResult};
use crate::signal::CompletionSignal;
use segscope_store::{
    Batch, Collection, CollectionOptions, EventKind, Store, StoreOptions,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One key-value pair to import. Items with an empty key are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportItem {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Value bytes, possibly empty.
    pub value: Vec<u8>,
}

impl ImportItem {
    /// Creates an item.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Deserialize)]
struct KeyVal {
    #[serde(default)]
    k: String,
    #[serde(default)]
    v: String,
}

/// Parses an import payload of the form `[{"k":"key0","v":"val0"}, ...]`.
///
/// Blank input yields no items.
///
/// # Errors
///
/// `MalformedInput` when the payload is not an array of string maps.
pub fn parse_items(input: &str) -> CoreResult<Vec<ImportItem>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    let pairs: Vec<KeyVal> =
        serde_json::from_str(input).map_err(|err| CoreError::malformed(err.to_string()))?;
    Ok(pairs
        .into_iter()
        .map(|kv| ImportItem::new(kv.k, kv.v))
        .collect())
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportSummary {
    /// Items written, excluding skipped empty keys.
    pub items_written: usize,
    /// Batches submitted.
    pub batches_written: usize,
}

/// Splits items into batches and submits them to a collection.
pub struct BatchImporter<'a> {
    coll: &'a Collection,
    config: ImportConfig,
}

impl<'a> BatchImporter<'a> {
    /// Creates an importer writing into `coll`.
    #[must_use]
    pub fn new(coll: &'a Collection, config: ImportConfig) -> Self {
        Self { coll, config }
    }

    /// Imports `items` and waits until the store has absorbed them durably.
    ///
    /// # Errors
    ///
    /// Fails on the first batch that cannot be built or submitted; batches
    /// submitted before it stay in the store. Fails with
    /// `DurabilityTimeout` if the configured deadline elapses, or with a
    /// `Closed` store error if the collection closes before it is clean.
    pub fn import(&self, items: &[ImportItem]) -> CoreResult<ImportSummary> {
        let signal = Arc::new(CompletionSignal::new());
        let progress_signal = Arc::clone(&signal);
        let _progress = self
            .coll
            .subscribe(EventKind::PersisterProgress, move |event| {
                if progress_signal.fire_if(|| event.collection_stats().is_clean()) {
                    debug!(footer_seq = event.footer_seq, "collection clean, import durable");
                }
            });
        let close_signal = Arc::clone(&signal);
        let _close = self.coll.subscribe(EventKind::Close, move |event| {
            if close_signal.discard() {
                warn!(
                    dirty_ops = event.collection_stats().cur_dirty_ops,
                    "collection closed before import was durable"
                );
            }
        });

        let chunk_len = match self.config.batch_size {
            0 => items.len().max(1),
            n => n,
        };
        let last_idx = items
            .chunks(chunk_len)
            .rposition(|chunk| chunk.iter().any(|item| !item.key.is_empty()));

        let mut summary = ImportSummary::default();
        let mut waiter = None;

        for (batch_idx, chunk) in items.chunks(chunk_len).enumerate() {
            let first_item = batch_idx * chunk_len;
            let Some((batch, written)) = self.build_batch(batch_idx, first_item, chunk)? else {
                debug!(batch = batch_idx, "skipping batch with no keys");
                continue;
            };
            summary.items_written += written;

            if Some(batch_idx) == last_idx {
                let mut guard = signal.lock();
                let registered = guard.register();
                self.submit(batch_idx, batch)?;
                waiter = Some(registered);
            } else {
                self.submit(batch_idx, batch)?;
            }
            summary.batches_written += 1;
        }

        let Some(waiter) = waiter else {
            debug!("nothing to import");
            return Ok(summary);
        };

        debug!(timeout = ?self.config.durability_timeout, "waiting for durability");
        waiter.wait(self.config.durability_timeout)?;

        info!(
            items = summary.items_written,
            batches = summary.batches_written,
            "import complete"
        );
        Ok(summary)
    }

    /// Builds one batch from `chunk`, or `None` when every key is empty.
    fn build_batch(
        &self,
        batch_idx: usize,
        first_item: usize,
        chunk: &[ImportItem],
    ) -> CoreResult<Option<(Batch, usize)>> {
        let (count, bytes) = chunk
            .iter()
            .filter(|item| !item.key.is_empty())
            .fold((0, 0), |(count, bytes), item| {
                (count + 1, bytes + item.key.len() + item.value.len())
            });
        if count == 0 || bytes == 0 {
            return Ok(None);
        }

        let mut batch = self.coll.new_batch(count, bytes);
        fill_batch(&mut batch, batch_idx, first_item, chunk)?;
        Ok(Some((batch, count)))
    }

    fn submit(&self, batch_idx: usize, batch: Batch) -> CoreResult<()> {
        let ops = batch.len();
        self.coll
            .execute_batch(batch)
            .map_err(|source| CoreError::BatchSubmit {
                batch: batch_idx,
                source,
            })?;
        debug!(batch = batch_idx, ops, "submitted batch");
        Ok(())
    }
}

/// Copies the non-empty-key items of `chunk` into `batch` as sets.
fn fill_batch(
    batch: &mut Batch,
    batch_idx: usize,
    first_item: usize,
    chunk: &[ImportItem],
) -> CoreResult<()> {
    for (offset, item) in chunk.iter().enumerate() {
        if item.key.is_empty() {
            continue;
        }
        let build_err = |source| CoreError::BatchBuild {
            batch: batch_idx,
            item: first_item + offset,
            source,
        };

        let key = batch.alloc(item.key.len()).map_err(build_err)?;
        batch.slot_mut(&key).map_err(build_err)?.copy_from_slice(&item.key);
        let value = batch.alloc(item.value.len()).map_err(build_err)?;
        batch.slot_mut(&value).map_err(build_err)?.copy_from_slice(&item.value);
        batch.alloc_set(&key, &value).map_err(build_err)?;
    }
    Ok(())
}

/// Imports `items` into the store at `dir`, creating it when missing.
///
/// An empty item list returns immediately without touching `dir`.
pub fn import_into_dir(
    dir: &Path,
    items: &[ImportItem],
    config: ImportConfig,
) -> CoreResult<ImportSummary> {
    if items.is_empty() {
        info!(dir = %dir.display(), "empty input, no key-values to load");
        return Ok(ImportSummary::default());
    }

    let store = Store::open(dir, StoreOptions::default()).map_err(CoreError::store("Store::open"))?;
    let coll = Collection::open(&store, CollectionOptions::default())
        .map_err(CoreError::store("Collection::open"))?;

    let result = BatchImporter::new(&coll, config).import(items);

    coll.close();
    store.close();
    result
}
