//! Single-slot, single-fire completion signal.
//!
//! One side registers a waiter while holding the signal lock; the event side
//! fires it at most once, clearing the slot in the same critical section.

use crate::error::{CoreError, CoreResult};
use parking_lot::{Mutex, MutexGuard};
use segscope_store::StoreError;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::{Duration, Instant};

/// A completion slot shared between a waiter and an event handler.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    slot: Mutex<Option<SyncSender<()>>>,
}

impl CompletionSignal {
    /// Creates an empty signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the slot. Registration happens through the guard so callers can
    /// keep the lock across work that must complete before the signal may fire.
    pub fn lock(&self) -> SignalGuard<'_> {
        SignalGuard {
            slot: self.slot.lock(),
        }
    }

    /// Fires the registered waiter if there is one and `ready` returns true.
    ///
    /// `ready` runs under the slot lock. Returns whether the waiter fired.
    pub fn fire_if(&self, ready: impl FnOnce() -> bool) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_none() || !ready() {
            return false;
        }
        match slot.take() {
            Some(tx) => tx.try_send(()).is_ok(),
            None => false,
        }
    }

    /// Drops the registered waiter without firing it, so its wait fails
    /// instead of blocking. Returns whether a waiter was registered.
    pub fn discard(&self) -> bool {
        self.slot.lock().take().is_some()
    }

    /// Returns whether a waiter is registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Exclusive access to a [`CompletionSignal`] slot.
pub struct SignalGuard<'a> {
    slot: MutexGuard<'a, Option<SyncSender<()>>>,
}

impl SignalGuard<'_> {
    /// Registers a new waiter, replacing any previous one.
    pub fn register(&mut self) -> Waiter {
        let (tx, rx) = mpsc::sync_channel(1);
        *self.slot = Some(tx);
        Waiter { rx }
    }
}

/// The receiving half of a registered signal.
#[derive(Debug)]
pub struct Waiter {
    rx: Receiver<()>,
}

impl Waiter {
    /// Blocks until the signal fires, or until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// `DurabilityTimeout` when the deadline passes, or a `Closed` store
    /// error when the registration was discarded without firing.
    pub fn wait(self, timeout: Option<Duration>) -> CoreResult<()> {
        let discarded = || CoreError::Store {
            call: "Collection::close",
            source: StoreError::Closed,
        };

        match timeout {
            None => self.rx.recv().map_err(|_| discarded()),
            Some(timeout) => {
                let started = Instant::now();
                self.rx.recv_timeout(timeout).map_err(|err| match err {
                    RecvTimeoutError::Timeout => CoreError::DurabilityTimeout {
                        waited: started.elapsed(),
                    },
                    RecvTimeoutError::Disconnected => discarded(),
                })
            }
        }
    }
}
