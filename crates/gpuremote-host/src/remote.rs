use std::fmt;
use std::sync::Arc;

use gpuremote_wire::{Identifier, ObjectKind};
use tracing::debug;

use crate::backend::{Backend, BackingHandle};

/// Host-side half of a proxy/remote pair.
///
/// Owns its backing resource: dropping the remote releases the handle
/// through the backend, exactly once.
pub struct Remote {
    id: Identifier,
    kind: ObjectKind,
    handle: BackingHandle,
    backend: Arc<dyn Backend>,
}

impl Remote {
    pub fn new(
        id: Identifier,
        kind: ObjectKind,
        handle: BackingHandle,
        backend: Arc<dyn Backend>,
    ) -> Self {
        Self {
            id,
            kind,
            handle,
            backend,
        }
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn handle(&self) -> BackingHandle {
        self.handle
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        debug!(target = %self.id, kind = %self.kind, handle = %self.handle, "releasing backing object");
        self.backend.release(self.kind, self.handle);
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .finish()
    }
}
