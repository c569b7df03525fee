use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// In-flight Registry
// ============================================================================
//
// Per-key "a request is currently pending" flag. Acquiring hands out an RAII
// guard; dropping the guard (normal return, error, or the owning future being
// dropped mid-await) clears the flag. Distinct keys never block each other.
//
// ============================================================================

#[derive(Debug)]
pub struct InFlightRegistry<K: Eq + Hash + Clone> {
    active: Arc<Mutex<HashSet<K>>>,
}

impl<K: Eq + Hash + Clone> Clone for InFlightRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            active: Arc::clone(&self.active),
        }
    }
}

impl<K: Eq + Hash + Clone> Default for InFlightRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> InFlightRegistry<K> {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Mark `key` as in flight, or `None` if it already is
    pub fn try_acquire(&self, key: &K) -> Option<InFlightGuard<K>> {
        if !lock(&self.active).insert(key.clone()) {
            return None;
        }

        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            key: key.clone(),
        })
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.active).contains(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.active).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Clears its key from the registry on drop
#[derive(Debug)]
pub struct InFlightGuard<K: Eq + Hash + Clone> {
    active: Arc<Mutex<HashSet<K>>>,
    key: K,
}

impl<K: Eq + Hash + Clone> InFlightGuard<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.key);
    }
}

// The set stays consistent even if a holder panicked, so poisoning is ignored.
fn lock<K>(active: &Mutex<HashSet<K>>) -> MutexGuard<'_, HashSet<K>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let registry = InFlightRegistry::new();

        let guard = registry.try_acquire(&"o-1").unwrap();
        assert!(registry.try_acquire(&"o-1").is_none());
        assert!(registry.is_in_flight(&"o-1"));
        assert_eq!(guard.key(), &"o-1");
    }

    #[test]
    fn test_drop_releases() {
        let registry = InFlightRegistry::new();

        {
            let _guard = registry.try_acquire(&"o-1").unwrap();
            assert_eq!(registry.len(), 1);
        }

        assert!(registry.is_empty());
        assert!(registry.try_acquire(&"o-1").is_some());
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let registry = InFlightRegistry::new();

        let _a = registry.try_acquire(&"o-1").unwrap();
        let _b = registry.try_acquire(&"o-2").unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InFlightRegistry::new();
        let other = registry.clone();

        let _guard = registry.try_acquire(&"o-1").unwrap();
        assert!(other.try_acquire(&"o-1").is_none());
    }
}
