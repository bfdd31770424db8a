//! Host-side completion tokens for asynchronous callbacks.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gpuremote_frame::{stream_label, StreamId};
use gpuremote_peer::Outbound;
use gpuremote_wire::{CallbackId, CallbackOutcome, Identifier, Message, RemoteFault};
use tracing::debug;

#[derive(Default)]
struct Pending {
    closed: bool,
    entries: HashMap<CallbackId, (Identifier, StreamId)>,
}

/// Every completion a session has handed out and not yet fulfilled.
///
/// An entry is removed before its outcome is sent, so each callback reaches
/// the client exactly once whichever of the backend, a release of the owning
/// object or session teardown gets there first.
pub struct CompletionTracker {
    outbound: Outbound,
    pending: Mutex<Pending>,
}

impl CompletionTracker {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            outbound,
            pending: Mutex::new(Pending::default()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start tracking `callback`, owned by `owner` and answered on `stream`.
    ///
    /// A callback id that is already pending is a protocol violation. After
    /// teardown the completion is returned already cancelled.
    pub fn track(
        self: &Arc<Self>,
        callback: CallbackId,
        owner: Identifier,
        stream: StreamId,
    ) -> Result<Completion, RemoteFault> {
        let closed = {
            let mut pending = self.pending();
            if pending.entries.contains_key(&callback) {
                return Err(RemoteFault::protocol(format!(
                    "callback {callback} is already pending"
                )));
            }
            if !pending.closed {
                pending.entries.insert(callback, (owner, stream));
            }
            pending.closed
        };
        let completion = Completion {
            callback,
            tracker: Arc::clone(self),
            sent: false,
        };
        if closed {
            self.send(callback, stream, CallbackOutcome::Cancelled);
        }
        Ok(completion)
    }

    /// Fulfil `callback` unless something already did.
    fn finish(&self, callback: CallbackId, outcome: CallbackOutcome) -> bool {
        let Some((_, stream)) = self.pending().entries.remove(&callback) else {
            return false;
        };
        self.send(callback, stream, outcome);
        true
    }

    fn send(&self, callback: CallbackId, stream: StreamId, outcome: CallbackOutcome) {
        debug!(stream = %stream_label(stream), %callback, ?outcome, "callback");
        let message = Message::Callback { callback, outcome };
        if let Err(err) = self.outbound.send(stream, &message) {
            debug!(%callback, error = %err, "callback outcome not delivered");
        }
    }

    /// Cancel every pending completion owned by `owner`.
    pub fn cancel_owned_by(&self, owner: Identifier) -> usize {
        let cancelled: Vec<_> = {
            let mut pending = self.pending();
            let ids: Vec<_> = pending
                .entries
                .iter()
                .filter(|(_, (entry_owner, _))| *entry_owner == owner)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| pending.entries.remove(&id).map(|(_, stream)| (id, stream)))
                .collect()
        };
        for (callback, stream) in &cancelled {
            self.send(*callback, *stream, CallbackOutcome::Cancelled);
        }
        cancelled.len()
    }

    /// Cancel everything and cancel any later registration on the spot.
    pub fn cancel_all(&self) -> usize {
        let cancelled: Vec<_> = {
            let mut pending = self.pending();
            pending.closed = true;
            pending.entries.drain().collect()
        };
        for (callback, (_, stream)) in &cancelled {
            self.send(*callback, *stream, CallbackOutcome::Cancelled);
        }
        cancelled.len()
    }

    pub fn outstanding(&self) -> usize {
        self.pending().entries.len()
    }
}

/// A single-use token for one pending callback, handed to the backend.
///
/// Fulfil it with [`Completion::complete`] or [`Completion::fail`]. Dropping
/// it unfulfilled reports the callback as cancelled.
pub struct Completion {
    callback: CallbackId,
    tracker: Arc<CompletionTracker>,
    sent: bool,
}

impl Completion {
    pub fn callback(&self) -> CallbackId {
        self.callback
    }

    pub fn complete(mut self) {
        self.sent = true;
        self.tracker.finish(self.callback, CallbackOutcome::Completed);
    }

    pub fn fail(mut self, message: impl Into<String>) {
        self.sent = true;
        self.tracker.finish(
            self.callback,
            CallbackOutcome::Failed {
                message: message.into(),
            },
        );
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.sent {
            self.tracker.finish(self.callback, CallbackOutcome::Cancelled);
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("callback", &self.callback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gpuremote_frame::{FrameReader, FrameWriter};
    use gpuremote_transport::IpcStream;
    use gpuremote_wire::decode_message;

    use super::*;

    fn tracker() -> (Arc<CompletionTracker>, FrameReader<IpcStream>) {
        let (left, right) = IpcStream::pair().unwrap();
        right
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let outbound = Outbound::new(FrameWriter::new(left));
        (
            Arc::new(CompletionTracker::new(outbound)),
            FrameReader::new(right),
        )
    }

    fn owner(raw: u64) -> Identifier {
        Identifier::new(raw).unwrap()
    }

    fn next_callback(reader: &mut FrameReader<IpcStream>) -> (StreamId, CallbackId, CallbackOutcome) {
        let frame = reader.read_frame().unwrap();
        match decode_message(&frame.payload).unwrap() {
            Message::Callback { callback, outcome } => (frame.stream, callback, outcome),
            other => panic!("expected a callback, got {other:?}"),
        }
    }

    #[test]
    fn complete_sends_once_on_the_tracked_stream() {
        let (tracker, mut reader) = tracker();
        let completion = tracker.track(CallbackId(4), owner(1), 2).unwrap();
        completion.complete();

        assert_eq!(
            next_callback(&mut reader),
            (2, CallbackId(4), CallbackOutcome::Completed)
        );
        assert_eq!(tracker.outstanding(), 0);
        assert!(reader.read_frame().is_err(), "nothing else was sent");
    }

    #[test]
    fn dropping_unfulfilled_cancels() {
        let (tracker, mut reader) = tracker();
        drop(tracker.track(CallbackId(1), owner(1), 1).unwrap());
        assert_eq!(
            next_callback(&mut reader),
            (1, CallbackId(1), CallbackOutcome::Cancelled)
        );
    }

    #[test]
    fn release_of_owner_cancels_only_its_completions() {
        let (tracker, mut reader) = tracker();
        let mine = tracker.track(CallbackId(1), owner(1), 1).unwrap();
        let theirs = tracker.track(CallbackId(2), owner(2), 1).unwrap();

        assert_eq!(tracker.cancel_owned_by(owner(1)), 1);
        assert_eq!(
            next_callback(&mut reader),
            (1, CallbackId(1), CallbackOutcome::Cancelled)
        );

        // The backend finishing later changes nothing.
        mine.complete();
        theirs.complete();
        assert_eq!(
            next_callback(&mut reader),
            (1, CallbackId(2), CallbackOutcome::Completed)
        );
        assert!(reader.read_frame().is_err());
    }

    #[test]
    fn duplicate_callback_id_is_a_protocol_fault() {
        let (tracker, _reader) = tracker();
        let _first = tracker.track(CallbackId(9), owner(1), 1).unwrap();
        assert!(matches!(
            tracker.track(CallbackId(9), owner(1), 1),
            Err(RemoteFault::Protocol { .. })
        ));
    }

    #[test]
    fn cancel_all_then_track_cancels_immediately() {
        let (tracker, mut reader) = tracker();
        let held = tracker.track(CallbackId(1), owner(1), 1).unwrap();
        assert_eq!(tracker.cancel_all(), 1);
        assert_eq!(next_callback(&mut reader).2, CallbackOutcome::Cancelled);

        let late = tracker.track(CallbackId(2), owner(1), 1).unwrap();
        assert_eq!(
            next_callback(&mut reader),
            (1, CallbackId(2), CallbackOutcome::Cancelled)
        );
        late.complete();
        held.fail("too late");
        assert!(reader.read_frame().is_err());
    }
}
