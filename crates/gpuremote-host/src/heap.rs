use std::collections::HashMap;

use gpuremote_wire::{Identifier, ObjectKind, RemoteFault};

use crate::backend::BackingHandle;
use crate::registry::ObjectRegistry;
use crate::remote::Remote;

/// Owns every live [`Remote`] of a session, keyed by identifier.
///
/// Adoption registers the identifier and removal unregisters it, so an
/// identifier resolves exactly while its remote is alive. Removed remotes
/// are handed back to the caller, which drops them (releasing the backing
/// resource) after letting go of any lock around the heap.
#[derive(Debug, Default)]
pub struct ObjectHeap {
    remotes: HashMap<Identifier, Remote>,
    registry: ObjectRegistry,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `remote`. If its identifier is taken, the remote is
    /// handed back untouched.
    pub fn adopt(&mut self, remote: Remote) -> Result<(), Remote> {
        let id = remote.id();
        if self.registry.contains(id) {
            return Err(remote);
        }
        self.registry.register(id, remote.kind(), remote.handle());
        self.remotes.insert(id, remote);
        Ok(())
    }

    /// Fails with `DuplicateIdentifier` if `id` is live.
    pub fn ensure_vacant(&self, id: Identifier) -> Result<(), RemoteFault> {
        if self.registry.contains(id) {
            Err(RemoteFault::DuplicateIdentifier { id })
        } else {
            Ok(())
        }
    }

    pub fn remove(&mut self, id: Identifier) -> Option<Remote> {
        self.registry.unregister(id)?;
        self.remotes.remove(&id)
    }

    pub fn resolve(&self, id: Identifier) -> Option<BackingHandle> {
        self.registry.resolve(id)
    }

    pub fn resolve_kind(&self, id: Identifier, kind: ObjectKind) -> Result<BackingHandle, RemoteFault> {
        self.registry.resolve_kind(id, kind)
    }

    /// Kind and handle of any live object.
    pub fn lookup(&self, id: Identifier) -> Result<(ObjectKind, BackingHandle), RemoteFault> {
        match (self.registry.kind_of(id), self.registry.resolve(id)) {
            (Some(kind), Some(handle)) => Ok((kind, handle)),
            _ => Err(RemoteFault::UnresolvedIdentifier { id }),
        }
    }

    /// Remove everything, for session teardown.
    pub fn drain(&mut self) -> Vec<Remote> {
        let ids: Vec<_> = self.remotes.keys().copied().collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}
