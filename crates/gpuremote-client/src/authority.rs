use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use gpuremote_wire::Identifier;

/// Hands out identifiers for one session: monotonic from 1, never reused.
#[derive(Debug)]
pub struct IdentifierAuthority {
    next: AtomicU64,
}

impl Default for IdentifierAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifierAuthority {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn generate(&self) -> Identifier {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 allocations to wrap.
        Identifier::from(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MAX))
    }

    /// How many identifiers have been issued.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn starts_at_one_and_counts_up() {
        let authority = IdentifierAuthority::new();
        assert_eq!(authority.generate().get(), 1);
        assert_eq!(authority.generate().get(), 2);
        assert_eq!(authority.issued(), 2);
    }

    #[test]
    fn concurrent_generation_never_repeats() {
        let authority = Arc::new(IdentifierAuthority::new());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let authority = Arc::clone(&authority);
                thread::spawn(move || (0..250).map(|_| authority.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for id in worker.join().unwrap() {
                assert!(seen.insert(id), "{id} issued twice");
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
