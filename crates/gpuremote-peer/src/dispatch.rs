//! Marks threads that are delivering a session's inbound traffic.
//!
//! A thread that delivers replies for a session must never block waiting for
//! one of that session's replies: nobody else would deliver it. Callback
//! handlers run inside a [`DispatchScope`], and blocking calls check
//! [`in_dispatch`] first.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

thread_local! {
    static DISPATCHING: Cell<Option<u64>> = const { Cell::new(None) };
}

static NEXT_SESSION_KEY: AtomicU64 = AtomicU64::new(1);

/// A process-unique key for one session.
pub fn next_session_key() -> u64 {
    NEXT_SESSION_KEY.fetch_add(1, Ordering::Relaxed)
}

/// True if the current thread is dispatching for `session`.
pub fn in_dispatch(session: u64) -> bool {
    DISPATCHING.with(|current| current.get() == Some(session))
}

/// Marks the current thread as dispatching for one session until dropped.
pub struct DispatchScope {
    previous: Option<u64>,
}

impl DispatchScope {
    pub fn enter(session: u64) -> Self {
        let previous = DISPATCHING.with(|current| current.replace(Some(session)));
        Self { previous }
    }
}

impl Drop for DispatchScope {
    fn drop(&mut self) {
        DISPATCHING.with(|current| current.set(self.previous));
    }
}
