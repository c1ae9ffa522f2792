//! Cache Store Module
//!
//! Lock-guarded key to item mapping. Holds no eviction or capacity policy;
//! the cache layer builds its rules on top of these primitives.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::cache::Item;

/// The map guarded by a [`Store`].
pub type Entries<V> = HashMap<String, Item<V>>;

// == Store ==
/// Thread-safe mapping from string keys to items.
///
/// A single read/write lock covers the whole map. Every method holds the lock
/// only for its own duration, so no guard ever escapes to the caller.
#[derive(Debug)]
pub struct Store<V> {
    items: RwLock<Entries<V>>,
}

impl<V> Store<V> {
    // == Constructor ==
    /// Creates an empty store with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }

    // == Put ==
    /// Inserts or overwrites an item, returning the previous one if any.
    pub fn put(&self, key: String, item: Item<V>) -> Option<Item<V>> {
        self.items.write().insert(key, item)
    }

    // == Delete ==
    /// Removes an item. Deleting an absent key is a no-op returning None.
    pub fn delete(&self, key: &str) -> Option<Item<V>> {
        self.items.write().remove(key)
    }

    /// Removes `key` only if it is still present and `predicate` holds for its
    /// current item. The check and the removal share one write section.
    pub fn remove_if<F>(&self, key: &str, predicate: F) -> bool
    where
        F: FnOnce(&Item<V>) -> bool,
    {
        let mut items = self.items.write();
        match items.get(key) {
            Some(item) if predicate(item) => {
                items.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.read().contains_key(key)
    }

    // == Clear ==
    /// Swaps the whole mapping for an empty one sized for `capacity` entries.
    ///
    /// Returns the number of items dropped.
    pub fn clear(&self, capacity: usize) -> usize {
        let old = std::mem::replace(&mut *self.items.write(), HashMap::with_capacity(capacity));
        // The old map is dropped outside the write section
        old.len()
    }

    // == Length ==
    /// Returns the live count, read under the same lock as every mutation.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Runs `f` against the map under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Entries<V>) -> R) -> R {
        f(&self.items.read())
    }

    /// Runs `f` against the map under the write lock.
    ///
    /// Multi-step operations that must not interleave with other writers
    /// (check-then-insert, read-modify-write) go through here.
    pub fn write<R>(&self, f: impl FnOnce(&mut Entries<V>) -> R) -> R {
        f(&mut self.items.write())
    }
}

impl<V: Clone> Store<V> {
    // == Get ==
    /// Returns a copy of the item stored under `key`, or None.
    pub fn get(&self, key: &str) -> Option<Item<V>> {
        self.items.read().get(key).cloned()
    }

    // == Snapshot ==
    /// Copies every entry out under the read lock.
    ///
    /// The lock is released before the copy is returned, so callers can scan
    /// or mutate without blocking writers for the length of the scan.
    pub fn snapshot(&self) -> Vec<(String, Item<V>)> {
        self.items
            .read()
            .iter()
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }
}

impl<V> Default for Store<V> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
