use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// OOM counts keyed by friendly container name.
///
/// Every access goes through one mutex, so increments, zero-fills and snapshots never
/// interleave. Counts only grow and entries are never removed.
#[derive(Debug, Default)]
pub struct CounterStore {
    counts: Mutex<HashMap<Arc<str>, u64>>,
}

impl CounterStore {
    /// Raises the count for `name` by one, creating the entry at 1 if absent.
    ///
    /// Returns the new count.
    pub fn increment(&self, name: &str) -> u64 {
        let mut counts = self.lock();
        match counts.get_mut(name) {
            Some(count) => {
                *count += 1;
                *count
            }
            None => {
                counts.insert(name.into(), 1);
                1
            }
        }
    }

    /// Creates an entry at 0 for `name` unless one exists.
    ///
    /// Returns `true` if a new entry was created.
    pub fn ensure_present(&self, name: &str) -> bool {
        let mut counts = self.lock();
        if counts.contains_key(name) {
            return false;
        }
        counts.insert(name.into(), 0);
        true
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.lock().get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a consistent copy of all entries, sorted by name.
    pub fn snapshot(&self) -> Vec<(Arc<str>, u64)> {
        let mut entries: Vec<(Arc<str>, u64)> = self
            .lock()
            .iter()
            .map(|(name, count)| (Arc::clone(name), *count))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Arc<str>, u64>> {
        // No critical section can leave the map half-updated.
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
