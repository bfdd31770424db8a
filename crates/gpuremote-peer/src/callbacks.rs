use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use gpuremote_wire::{CallbackId, CallbackOutcome};
use tracing::debug;

use crate::dispatch::DispatchScope;

/// Closure run with the outcome of one callback.
pub type CallbackHandler = Box<dyn FnOnce(CallbackOutcome) + Send + 'static>;

enum Waiter {
    Channel(SyncSender<CallbackOutcome>),
    Handler(CallbackHandler),
}

#[derive(Default)]
struct Slots {
    closed: bool,
    pending: HashMap<CallbackId, Waiter>,
}

/// Client-side pending callbacks, each fulfilled exactly once.
///
/// An entry leaves the table when it is fulfilled, so a duplicate or
/// unknown callback from the peer cannot fire anything twice. Closing the
/// table cancels everything still pending, and anything registered after
/// that is cancelled on the spot.
///
/// Handlers run on the fulfilling thread inside a [`DispatchScope`] for the
/// owning session, never while the table lock is held.
pub struct CallbackTable {
    session: u64,
    next: AtomicU64,
    slots: Mutex<Slots>,
}

impl CallbackTable {
    pub fn new(session: u64) -> Self {
        Self {
            session,
            next: AtomicU64::new(0),
            slots: Mutex::new(Slots::default()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> CallbackId {
        CallbackId(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn insert(&self, id: CallbackId, waiter: Waiter) {
        let mut slots = self.slots();
        if slots.closed {
            drop(slots);
            self.deliver(id, waiter, CallbackOutcome::Cancelled);
        } else {
            slots.pending.insert(id, waiter);
        }
    }

    fn deliver(&self, id: CallbackId, waiter: Waiter, outcome: CallbackOutcome) {
        debug!(callback = %id, ?outcome, "callback fulfilled");
        match waiter {
            // The receiver may have been dropped; the entry is spent either way.
            Waiter::Channel(tx) => {
                let _ = tx.send(outcome);
            }
            Waiter::Handler(handler) => {
                let _scope = DispatchScope::enter(self.session);
                handler(outcome);
            }
        }
    }

    /// Allocate a callback id. The receiver sees exactly one outcome.
    pub fn register(&self) -> (CallbackId, Receiver<CallbackOutcome>) {
        let id = self.next_id();
        let (tx, rx) = mpsc::sync_channel(1);
        self.insert(id, Waiter::Channel(tx));
        (id, rx)
    }

    /// Allocate a callback id whose outcome is passed to `handler`.
    pub fn register_handler(&self, handler: CallbackHandler) -> CallbackId {
        let id = self.next_id();
        self.insert(id, Waiter::Handler(handler));
        id
    }

    /// Deliver an outcome. False for unknown or already-fulfilled ids.
    pub fn fulfill(&self, id: CallbackId, outcome: CallbackOutcome) -> bool {
        let Some(waiter) = self.slots().pending.remove(&id) else {
            debug!(callback = %id, "ignoring callback with no pending entry");
            return false;
        };
        self.deliver(id, waiter, outcome);
        true
    }

    /// Cancel every pending callback and refuse new ones. Returns how many
    /// were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut slots = self.slots();
            slots.closed = true;
            slots.pending.drain().collect()
        };
        let cancelled = drained.len();
        for (id, waiter) in drained {
            self.deliver(id, waiter, CallbackOutcome::Cancelled);
        }
        cancelled
    }

    pub fn pending(&self) -> usize {
        self.slots().pending.len()
    }
}
