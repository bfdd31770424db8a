use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use gpuremote_peer::in_dispatch;
use gpuremote_wire::{CallbackId, CallbackOutcome};

use crate::error::{ClientError, Result};

/// Handle on a pending `on_submitted_work_done` callback.
///
/// The outcome arrives exactly once. If the queue is released or the
/// connection closes first, the outcome is [`CallbackOutcome::Cancelled`].
#[derive(Debug)]
pub struct WorkDone {
    callback: CallbackId,
    session: u64,
    rx: Receiver<CallbackOutcome>,
    outcome: Option<CallbackOutcome>,
}

impl WorkDone {
    pub(crate) fn new(callback: CallbackId, session: u64, rx: Receiver<CallbackOutcome>) -> Self {
        Self {
            callback,
            session,
            rx,
            outcome: None,
        }
    }

    pub fn callback(&self) -> CallbackId {
        self.callback
    }

    /// Block until the outcome arrives.
    ///
    /// Fails with [`ClientError::ReentrantRequest`] when called from a
    /// callback handler of the same connection, which would otherwise block
    /// the thread that delivers the outcome.
    pub fn wait(mut self) -> Result<CallbackOutcome> {
        if let Some(outcome) = self.outcome.take() {
            return Ok(outcome);
        }
        if in_dispatch(self.session) {
            return Err(ClientError::ReentrantRequest);
        }
        Ok(self.rx.recv().unwrap_or(CallbackOutcome::Cancelled))
    }

    /// Like [`WorkDone::wait`], giving up after `timeout`. The handle stays
    /// usable after a timeout.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<Option<CallbackOutcome>> {
        if self.outcome.is_some() {
            return Ok(self.outcome.clone());
        }
        if in_dispatch(self.session) {
            return Err(ClientError::ReentrantRequest);
        }
        let outcome = match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => CallbackOutcome::Cancelled,
        };
        self.outcome = Some(outcome.clone());
        Ok(Some(outcome))
    }

    /// The outcome if it has already arrived.
    pub fn try_outcome(&mut self) -> Option<CallbackOutcome> {
        if self.outcome.is_none() {
            self.outcome = match self.rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(CallbackOutcome::Cancelled),
            };
        }
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use gpuremote_peer::DispatchScope;

    use super::*;

    #[test]
    fn outcome_is_cached_once_seen() {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut done = WorkDone::new(CallbackId(1), 7, rx);
        assert_eq!(done.try_outcome(), None);

        tx.send(CallbackOutcome::Completed).unwrap();
        assert_eq!(done.try_outcome(), Some(CallbackOutcome::Completed));
        assert_eq!(
            done.wait_timeout(Duration::ZERO).unwrap(),
            Some(CallbackOutcome::Completed)
        );
        assert_eq!(done.wait().unwrap(), CallbackOutcome::Completed);
    }

    #[test]
    fn dropped_sender_reads_as_cancelled() {
        let (tx, rx) = mpsc::sync_channel::<CallbackOutcome>(1);
        drop(tx);
        let done = WorkDone::new(CallbackId(2), 7, rx);
        assert_eq!(done.wait().unwrap(), CallbackOutcome::Cancelled);
    }

    #[test]
    fn waiting_inside_a_handler_is_refused() {
        let (_tx, rx) = mpsc::sync_channel(1);
        let mut done = WorkDone::new(CallbackId(3), 9, rx);
        let _scope = DispatchScope::enter(9);
        assert!(matches!(
            done.wait_timeout(Duration::from_secs(1)),
            Err(ClientError::ReentrantRequest)
        ));
    }
}
