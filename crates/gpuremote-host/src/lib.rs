//! Host side of GPU command remoting.
//!
//! A [`HostListener`] accepts content processes on the host socket; each
//! connection becomes a [`Session`] that decodes commands, resolves the
//! identifiers they reference through the session's [`ObjectHeap`] and
//! drives a [`Backend`]. [`MemoryBackend`] is a complete in-memory backend.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gpuremote_host::{HostListener, MemoryBackend};
//!
//! let listener = HostListener::bind("/tmp/gpu.sock", Arc::new(MemoryBackend::new()))?;
//! loop {
//!     let session = listener.accept()?;
//!     std::thread::spawn(move || session.run());
//! }
//! # Ok::<(), gpuremote_host::HostError>(())
//! ```

pub mod backend;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod heap;
pub mod listener;
pub mod memory;
pub mod registry;
pub mod remote;
pub mod session;

pub use backend::{Backend, BackendError, BackendResult, BackingHandle, Creation, Handles};
pub use completion::{Completion, CompletionTracker};
pub use config::HostConfig;
pub use dispatch::{dispatch, DispatchContext, Outcome, RemoteKind, Target};
pub use error::{HostError, Result};
pub use heap::ObjectHeap;
pub use listener::{spawn_local, HostListener};
pub use memory::{JournalEntry, MemoryBackend, DEFAULT_MAX_ALLOCATION};
pub use registry::ObjectRegistry;
pub use remote::Remote;
pub use session::{Session, SessionCloser, SessionEnd, SessionReport};
