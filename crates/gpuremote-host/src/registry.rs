use std::collections::HashMap;

use gpuremote_wire::{Identifier, ObjectKind, RemoteFault};

use crate::backend::BackingHandle;

/// Identifier lookup for live host objects.
///
/// Holds copies of backing handles, never ownership; the
/// [`ObjectHeap`](crate::heap::ObjectHeap) keeps it in step with the objects
/// it owns.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    entries: HashMap<Identifier, (ObjectKind, BackingHandle)>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `id` to a backing handle.
    ///
    /// `id` must not already be registered; callers check first.
    pub fn register(&mut self, id: Identifier, kind: ObjectKind, handle: BackingHandle) {
        let previous = self.entries.insert(id, (kind, handle));
        debug_assert!(previous.is_none(), "identifier {id} registered twice");
    }

    pub fn resolve(&self, id: Identifier) -> Option<BackingHandle> {
        self.entries.get(&id).map(|&(_, handle)| handle)
    }

    /// Resolve `id`, requiring it to name an object of `kind`.
    pub fn resolve_kind(&self, id: Identifier, kind: ObjectKind) -> Result<BackingHandle, RemoteFault> {
        match self.entries.get(&id) {
            None => Err(RemoteFault::UnresolvedIdentifier { id }),
            Some(&(found, _)) if found != kind => Err(RemoteFault::KindMismatch {
                id,
                expected: kind,
                found,
            }),
            Some(&(_, handle)) => Ok(handle),
        }
    }

    pub fn kind_of(&self, id: Identifier) -> Option<ObjectKind> {
        self.entries.get(&id).map(|&(kind, _)| kind)
    }

    pub fn unregister(&mut self, id: Identifier) -> Option<BackingHandle> {
        self.entries.remove(&id).map(|(_, handle)| handle)
    }

    pub fn contains(&self, id: Identifier) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> Identifier {
        Identifier::new(raw).unwrap()
    }

    #[test]
    fn register_then_resolve() {
        let mut registry = ObjectRegistry::new();
        registry.register(id(1), ObjectKind::Buffer, BackingHandle(10));
        assert_eq!(registry.resolve(id(1)), Some(BackingHandle(10)));
        assert_eq!(
            registry.resolve_kind(id(1), ObjectKind::Buffer),
            Ok(BackingHandle(10))
        );
    }

    #[test]
    fn unregister_then_resolve_is_absent() {
        let mut registry = ObjectRegistry::new();
        registry.register(id(1), ObjectKind::Queue, BackingHandle(3));
        assert_eq!(registry.unregister(id(1)), Some(BackingHandle(3)));
        assert_eq!(registry.resolve(id(1)), None);
        assert_eq!(
            registry.resolve_kind(id(1), ObjectKind::Queue),
            Err(RemoteFault::UnresolvedIdentifier { id: id(1) })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn never_registered_is_absent() {
        let registry = ObjectRegistry::new();
        assert_eq!(registry.resolve(id(42)), None);
        assert!(!registry.contains(id(42)));
    }

    #[test]
    fn wrong_kind_is_a_mismatch() {
        let mut registry = ObjectRegistry::new();
        registry.register(id(5), ObjectKind::Texture, BackingHandle(1));
        assert_eq!(
            registry.resolve_kind(id(5), ObjectKind::Buffer),
            Err(RemoteFault::KindMismatch {
                id: id(5),
                expected: ObjectKind::Buffer,
                found: ObjectKind::Texture,
            })
        );
    }

    #[test]
    fn identifiers_are_independent() {
        let mut registry = ObjectRegistry::new();
        registry.register(id(1), ObjectKind::Buffer, BackingHandle(1));
        registry.register(id(2), ObjectKind::Buffer, BackingHandle(2));
        registry.unregister(id(1));
        assert_eq!(registry.resolve(id(2)), Some(BackingHandle(2)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "registered twice")]
    fn double_registration_is_an_invariant_violation() {
        let mut registry = ObjectRegistry::new();
        registry.register(id(1), ObjectKind::Buffer, BackingHandle(1));
        registry.register(id(1), ObjectKind::Buffer, BackingHandle(2));
    }
}
