use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gpuremote_wire::{RemoteFault, ReplyValue, RequestId};
use tracing::debug;

use crate::error::{PeerError, Result};

/// What the host answered.
pub type ReplyResult = std::result::Result<ReplyValue, RemoteFault>;

#[derive(Default)]
struct Slots {
    closed: bool,
    waiting: HashMap<RequestId, SyncSender<ReplyResult>>,
}

/// Correlates outstanding requests with their replies.
///
/// Each request gets a one-shot slot. A reply for an id that is no longer
/// waiting (it timed out, or was never issued) is dropped.
#[derive(Default)]
pub struct ReplyTable {
    next: AtomicU64,
    slots: Mutex<Slots>,
}

/// A registered request waiting for its reply.
pub struct PendingReply {
    pub id: RequestId,
    rx: Receiver<ReplyResult>,
}

impl ReplyTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a request id and its reply slot.
    pub fn register(&self) -> Result<PendingReply> {
        let id = RequestId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::sync_channel(1);
        let mut slots = self.slots();
        if slots.closed {
            return Err(PeerError::Disconnected("session closed".to_string()));
        }
        slots.waiting.insert(id, tx);
        Ok(PendingReply { id, rx })
    }

    /// Hand a reply to its waiter. False if nobody is waiting for `id`.
    pub fn fulfill(&self, id: RequestId, result: ReplyResult) -> bool {
        let Some(tx) = self.slots().waiting.remove(&id) else {
            debug!(request = %id, "discarding reply with no waiter");
            return false;
        };
        tx.send(result).is_ok()
    }

    /// Give up on `id`; a late reply will be discarded.
    pub fn forget(&self, id: RequestId) {
        self.slots().waiting.remove(&id);
    }

    /// Block until the reply arrives, the table closes, or `timeout` passes.
    ///
    /// On timeout the request is forgotten and the outcome on the other side
    /// is unknown.
    pub fn wait(&self, pending: PendingReply, timeout: Duration) -> Result<ReplyResult> {
        match pending.rx.recv_timeout(timeout) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => {
                self.forget(pending.id);
                debug!(request = %pending.id, ?timeout, "request timed out");
                Err(PeerError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(PeerError::Disconnected(
                "session closed before reply".to_string(),
            )),
        }
    }

    /// Fail every waiter with `Disconnected` and refuse new registrations.
    /// Returns how many were waiting.
    pub fn close(&self) -> usize {
        let mut slots = self.slots();
        slots.closed = true;
        let waiting = slots.waiting.len();
        slots.waiting.clear();
        waiting
    }

    pub fn outstanding(&self) -> usize {
        self.slots().waiting.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn ids_are_unique_and_start_at_one() {
        let table = ReplyTable::new();
        let a = table.register().unwrap();
        let b = table.register().unwrap();
        assert_eq!(a.id, RequestId(1));
        assert_eq!(b.id, RequestId(2));
    }

    #[test]
    fn reply_reaches_its_waiter() {
        let table = Arc::new(ReplyTable::new());
        let pending = table.register().unwrap();
        let id = pending.id;

        let fulfiller = {
            let table = Arc::clone(&table);
            thread::spawn(move || table.fulfill(id, Ok(ReplyValue::Unit)))
        };
        let result = table.wait(pending, Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok(ReplyValue::Unit));
        assert!(fulfiller.join().unwrap());
        assert_eq!(table.outstanding(), 0);
    }

    #[test]
    fn timeout_forgets_and_late_reply_is_discarded() {
        let table = ReplyTable::new();
        let pending = table.register().unwrap();
        let id = pending.id;

        assert!(matches!(
            table.wait(pending, Duration::from_millis(10)),
            Err(PeerError::Timeout(_))
        ));
        assert!(!table.fulfill(id, Ok(ReplyValue::Unit)));
    }

    #[test]
    fn other_requests_survive_a_timeout() {
        let table = ReplyTable::new();
        let slow = table.register().unwrap();
        let fast = table.register().unwrap();
        let fast_id = fast.id;

        assert!(table.wait(slow, Duration::from_millis(10)).is_err());
        assert!(table.fulfill(fast_id, Ok(ReplyValue::Unit)));
        assert!(table.wait(fast, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn close_disconnects_waiters_and_later_registrations() {
        let table = ReplyTable::new();
        let pending = table.register().unwrap();
        assert_eq!(table.close(), 1);
        assert!(matches!(
            table.wait(pending, Duration::from_secs(5)),
            Err(PeerError::Disconnected(_))
        ));
        assert!(matches!(table.register(), Err(PeerError::Disconnected(_))));
    }
}
