//! Mutable collection front-end with a background persister.
//!
//! `execute_batch` only queues a batch and marks it dirty; the persister
//! thread drains the queue, writes everything it took as one segment
//! through [`Store::persist`], clears the dirty gauges for what it wrote and
//! then emits [`EventKind::PersisterProgress`]. A persist that fails while
//! closing drops its batches and leaves them counted dirty.

use crate::batch::Batch;
use crate::error::{StoreError, StoreResult};
use crate::event::{Event, EventBus, EventKind, Subscription};
use crate::options::CollectionOptions;
use crate::segment::Op;
use crate::stats::{CollectionStats, SharedStats};
use crate::store::Store;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, trace};

/// Delay before retrying after a failed persist.
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(100);

struct DirtyBatch {
    ops: Vec<Op>,
    num_bytes: u64,
}

#[derive(Default)]
struct Queue {
    batches: VecDeque<DirtyBatch>,
    closing: bool,
}

struct Shared {
    store: Store,
    queue: Mutex<Queue>,
    wake: Condvar,
    stats: SharedStats,
    events: Arc<EventBus>,
}

impl Shared {
    fn footer_seq(&self) -> u64 {
        self.store.snapshot().map_or(0, |footer| footer.seq())
    }

    fn emit(&self, kind: EventKind) {
        self.events
            .emit(Event::new(kind, self.footer_seq(), self.stats.clone()));
    }
}

/// A mutable view over a store.
///
/// Dropping the collection closes it, which flushes queued batches.
pub struct Collection {
    shared: Arc<Shared>,
    options: CollectionOptions,
    persister: Mutex<Option<JoinHandle<()>>>,
}

impl Collection {
    /// Opens a collection over `store` and starts its persister.
    ///
    /// # Errors
    ///
    /// Returns `ReadOnly` for a writable collection over a read-only store,
    /// or an I/O error if the persister thread cannot be spawned.
    pub fn open(store: &Store, options: CollectionOptions) -> StoreResult<Self> {
        if store.is_closed() {
            return Err(StoreError::Closed);
        }
        if store.is_read_only() && !options.read_only {
            return Err(StoreError::ReadOnly);
        }

        let shared = Arc::new(Shared {
            store: store.clone(),
            queue: Mutex::new(Queue::default()),
            wake: Condvar::new(),
            stats: SharedStats::default(),
            events: Arc::new(EventBus::default()),
        });

        let persister = if options.read_only {
            None
        } else {
            let worker = Arc::clone(&shared);
            Some(
                thread::Builder::new()
                    .name("segscope-persister".into())
                    .spawn(move || run_persister(&worker))?,
            )
        };

        debug!(path = %store.path().display(), read_only = options.read_only, "opened collection");

        Ok(Self {
            shared,
            options,
            persister: Mutex::new(persister),
        })
    }

    /// Creates an empty batch sized for `total_ops` operations holding
    /// `total_bytes` of keys and values.
    #[must_use]
    pub fn new_batch(&self, total_ops: usize, total_bytes: usize) -> Batch {
        Batch::with_capacity(total_ops, total_bytes)
    }

    /// Queues `batch` for persistence.
    ///
    /// Returns once the batch is counted dirty; durability is reported
    /// later through [`EventKind::PersisterProgress`].
    pub fn execute_batch(&self, batch: Batch) -> StoreResult<()> {
        if self.options.read_only {
            return Err(StoreError::ReadOnly);
        }

        let num_ops = batch.len() as u64;
        let num_bytes = batch.num_bytes() as u64;
        let ops = batch.into_ops();

        {
            let mut queue = self.shared.queue.lock();
            if queue.closing {
                return Err(StoreError::Closed);
            }
            if !ops.is_empty() {
                self.shared.stats.update(|stats| {
                    stats.cur_dirty_ops += num_ops;
                    stats.cur_dirty_bytes += num_bytes;
                    stats.cur_dirty_segments += 1;
                });
                queue.batches.push_back(DirtyBatch { ops, num_bytes });
                self.shared.wake.notify_one();
            }
            self.shared.stats.update(|stats| stats.total_batches += 1);
        }

        trace!(ops = num_ops, bytes = num_bytes, "executed batch");
        self.shared.emit(EventKind::BatchExecute);
        Ok(())
    }

    /// Returns the collection's current statistics.
    #[must_use]
    pub fn stats(&self) -> CollectionStats {
        self.shared.stats.get()
    }

    /// Registers `handler` for events of `kind`.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.events.subscribe(kind, handler)
    }

    /// Returns the store backing this collection.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    /// Persists every queued batch, stops the persister and emits
    /// [`EventKind::Close`]. Later closes are no-ops.
    pub fn close(&self) {
        let Some(handle) = self.persister.lock().take() else {
            self.shared.queue.lock().closing = true;
            return;
        };

        self.shared.queue.lock().closing = true;
        self.shared.wake.notify_all();
        if handle.join().is_err() {
            error!("persister thread panicked");
        }

        self.shared.emit(EventKind::Close);
        debug!(path = %self.shared.store.path().display(), "closed collection");
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("store", &self.shared.store)
            .field("stats", &self.stats())
            .field("subscribers", &self.shared.events.subscriber_count())
            .finish()
    }
}

fn run_persister(shared: &Shared) {
    loop {
        let (taken, closing) = {
            let mut queue = shared.queue.lock();
            while queue.batches.is_empty() && !queue.closing {
                shared.wake.wait(&mut queue);
            }
            if queue.batches.is_empty() {
                break;
            }
            let taken: Vec<DirtyBatch> = queue.batches.drain(..).collect();
            (taken, queue.closing)
        };

        let num_segments = taken.len() as u64;
        let num_ops: u64 = taken.iter().map(|b| b.ops.len() as u64).sum();
        let num_bytes: u64 = taken.iter().map(|b| b.num_bytes).sum();
        let ops: Vec<Op> = taken.iter().flat_map(|b| b.ops.iter().cloned()).collect();

        match shared.store.persist(ops, shared.store.options().persist) {
            Ok(footer) => {
                shared.stats.update(|stats| {
                    stats.cur_dirty_ops -= num_ops;
                    stats.cur_dirty_bytes -= num_bytes;
                    stats.cur_dirty_segments -= num_segments;
                    stats.total_persister_cycles += 1;
                });
                debug!(
                    batches = num_segments,
                    ops = num_ops,
                    footer_seq = footer.seq(),
                    "persister cycle complete"
                );
                shared.emit(EventKind::PersisterProgress);
            }
            Err(err) => {
                shared.stats.update(|stats| stats.total_persister_errors += 1);
                error!(error = %err, batches = num_segments, "persister cycle failed");

                if closing {
                    // Gauges stay dirty so nothing reads the lost ops as durable.
                    error!(ops = num_ops, "dropping unpersisted batches on close");
                    break;
                }

                let mut queue = shared.queue.lock();
                for batch in taken.into_iter().rev() {
                    queue.batches.push_front(batch);
                }
                shared.wake.wait_for(&mut queue, PERSIST_RETRY_DELAY);
            }
        }
    }
    trace!("persister stopped");
}
