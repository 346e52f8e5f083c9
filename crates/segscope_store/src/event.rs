//! Collection events and their subscribers.
//!
//! Handlers run synchronously on the thread that emits the event: the
//! caller of `execute_batch` for [`EventKind::BatchExecute`], the persister
//! thread for [`EventKind::PersisterProgress`]. Handlers must not block on
//! the persister.

use crate::stats::{CollectionStats, SharedStats};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Kind of a collection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A batch was accepted by `execute_batch`.
    BatchExecute,
    /// The persister finished a cycle. Dirty counters already exclude the
    /// batches written by that cycle.
    PersisterProgress,
    /// The collection is closing.
    Close,
}

/// An event delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Persist sequence of the latest footer when the event was emitted.
    pub footer_seq: u64,
    stats: SharedStats,
}

impl Event {
    pub(crate) fn new(kind: EventKind, footer_seq: u64, stats: SharedStats) -> Self {
        Self {
            kind,
            footer_seq,
            stats,
        }
    }

    /// Reads the emitting collection's statistics at the time of the call,
    /// not at the time the event was emitted.
    #[must_use]
    pub fn collection_stats(&self) -> CollectionStats {
        self.stats.get()
    }
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<u64, (EventKind, Handler)>,
}

/// Subscriber registry shared by a collection and its subscriptions.
#[derive(Default)]
pub(crate) struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.insert(id, (kind, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Delivers `event` to every handler subscribed to its kind.
    ///
    /// The registry lock is released before handlers run, so a handler may
    /// drop its own subscription.
    pub(crate) fn emit(&self, event: Event) {
        let handlers: Vec<Handler> = {
            let registry = self.registry.lock();
            registry
                .handlers
                .values()
                .filter(|(kind, _)| *kind == event.kind)
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in handlers {
            handler(&event);
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.registry.lock().handlers.len()
    }

    fn unsubscribe(&self, id: u64) {
        self.registry.lock().handlers.remove(&id);
    }
}

/// Keeps an event handler registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(kind: EventKind) -> Event {
        Event::new(kind, 0, SharedStats::default())
    }

    #[test]
    fn handlers_receive_only_their_kind() {
        let bus = Arc::new(EventBus::default());
        let progress = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&progress);
        let _sub = bus.subscribe(EventKind::PersisterProgress, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(event(EventKind::BatchExecute));
        bus.emit(event(EventKind::PersisterProgress));
        bus.emit(event(EventKind::PersisterProgress));

        assert_eq!(progress.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let bus = Arc::new(EventBus::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = bus.subscribe(EventKind::Close, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        bus.emit(event(EventKind::Close));

        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn event_reads_live_stats() {
        let stats = SharedStats::default();
        let event = Event::new(EventKind::PersisterProgress, 1, stats.clone());
        assert!(event.collection_stats().is_clean());

        stats.update(|s| s.cur_dirty_ops = 3);
        assert_eq!(event.collection_stats().cur_dirty_ops, 3);
    }

    #[test]
    fn subscription_outlives_bus() {
        let bus = Arc::new(EventBus::default());
        let sub = bus.subscribe(EventKind::Close, |_| {});
        drop(bus);
        drop(sub);
    }
}
