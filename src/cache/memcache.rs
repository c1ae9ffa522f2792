//! Cache Module
//!
//! Public cache API: capacity accounting, default lifetimes and the higher
//! level operations, on top of the lock-guarded [`Store`] and with a
//! background [`Auditor`] evicting expired items.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::stats::LookupCounters;
use crate::cache::{CacheStats, Item, Store, Tag, IMMORTAL};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::Auditor;

// == Cache ==
/// Thread-safe key-value cache with per-item lifetimes.
///
/// Every check-then-act operation (existence and capacity checks before an
/// insert, read-modify-write on an item) runs inside a single write section of
/// the store lock, so concurrent callers cannot interleave between the check
/// and the mutation.
///
/// # Example
/// ```no_run
/// use mini_memcache::Cache;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> mini_memcache::Result<()> {
///     let cache = Cache::new(
///         100,
///         Duration::from_secs(30),
///         Duration::from_secs(1),
///         Duration::from_millis(10),
///     )?;
///     cache.put("greeting", "hello".to_string())?;
///     assert_eq!(cache.get("greeting")?, "hello");
///     cache.close().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Cache<V> {
    store: Arc<Store<V>>,
    auditor: Auditor<V>,
    capacity: usize,
    default_lifetime: Duration,
    lookups: LookupCounters,
}

impl<V: Clone + Send + Sync + 'static> Cache<V> {
    // == Constructors ==
    /// Creates a cache and starts its auditor.
    ///
    /// # Arguments
    /// * `capacity` - Hard cap on live items
    /// * `default_lifetime` - Lifetime of items inserted without an override, zero for immortal
    /// * `audit_interval` - Time between expiry sweeps
    /// * `audit_delay` - Pause the auditor takes after each sweep
    ///
    /// # Errors
    /// `RuntimeUnavailable` when called outside a Tokio runtime.
    pub fn new(
        capacity: usize,
        default_lifetime: Duration,
        audit_interval: Duration,
        audit_delay: Duration,
    ) -> Result<Self> {
        Self::with_config(
            CacheConfig::new()
                .with_capacity(capacity)
                .with_default_lifetime(default_lifetime)
                .with_audit_interval(audit_interval)
                .with_audit_delay(audit_delay),
        )
    }

    /// Creates a cache from `config` and starts its auditor.
    pub fn with_config(config: CacheConfig) -> Result<Self> {
        let cache = Self::idle(config);
        cache.start()?;
        Ok(cache)
    }

    /// Creates a cache whose auditor has not been started.
    ///
    /// Items are not evicted until [`Cache::start`] is called; the rest of the
    /// API works without a Tokio runtime.
    pub fn idle(config: CacheConfig) -> Self {
        info!(
            capacity = config.capacity,
            default_lifetime = ?config.default_lifetime,
            audit_interval = ?config.audit_interval,
            "Cache initialized"
        );
        Self {
            store: Arc::new(Store::with_capacity(config.capacity.min(1024))),
            auditor: Auditor::new(config.audit_interval, config.audit_delay, config.error_buffer),
            capacity: config.capacity,
            default_lifetime: config.default_lifetime,
            lookups: LookupCounters::default(),
        }
    }

    /// Starts the auditor. A no-op when it is already running or was stopped.
    pub fn start(&self) -> Result<()> {
        self.auditor.start(Arc::clone(&self.store))
    }

    // == Put ==
    /// Inserts a new item with the default lifetime and no tags.
    ///
    /// # Errors
    /// - `KeyAlreadyExists` if the key is present; the stored value is untouched
    /// - `CapacityExceeded` if the live count has reached capacity
    pub fn put(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.insert_new(key.into(), value, self.default_lifetime, BTreeSet::new())
    }

    /// Inserts a new item with the default lifetime and the given tags.
    pub fn put_tagged(
        &self,
        key: impl Into<String>,
        value: V,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<()> {
        self.insert_new(key.into(), value, self.default_lifetime, tags.into_iter().collect())
    }

    /// Inserts a new item with an explicit lifetime (`IMMORTAL` for never).
    pub fn put_with_lifetime(
        &self,
        key: impl Into<String>,
        value: V,
        lifetime: Duration,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<()> {
        self.insert_new(key.into(), value, lifetime, tags.into_iter().collect())
    }

    fn insert_new(
        &self,
        key: String,
        value: V,
        lifetime: Duration,
        tags: BTreeSet<Tag>,
    ) -> Result<()> {
        let capacity = self.capacity;
        self.store.write(|items| {
            if items.contains_key(&key) {
                return Err(CacheError::KeyAlreadyExists(key));
            }
            if items.len() >= capacity {
                return Err(CacheError::CapacityExceeded(capacity));
            }
            items.insert(key, Item::new(value, lifetime, tags));
            Ok(())
        })
    }

    // == Get ==
    /// Returns a copy of the value stored under `key`.
    ///
    /// Lookups never refresh an item's lifetime.
    pub fn get(&self, key: &str) -> Result<V> {
        let found = self.store.read(|items| items.get(key).map(|item| item.value.clone()));
        self.lookups
            .observe(found.ok_or_else(|| CacheError::KeyNotFound(key.to_string())))
    }

    /// Returns a copy of the full item, metadata included.
    pub fn get_item(&self, key: &str) -> Result<Item<V>> {
        self.lookups.observe(
            self.store
                .get(key)
                .ok_or_else(|| CacheError::KeyNotFound(key.to_string())),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    // == Update ==
    /// Replaces the value of an existing item, keeping its tags, creation
    /// time and lifetime.
    pub fn update(&self, key: &str, value: V) -> Result<()> {
        self.modify(key, |item| item.value = value)
    }

    /// Replaces the value and tags of an existing item, keeping its creation
    /// time and lifetime.
    pub fn update_tagged(
        &self,
        key: &str,
        value: V,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<()> {
        let tags = tags.into_iter().collect();
        self.modify(key, |item| {
            item.value = value;
            item.tags = tags;
        })
    }

    /// Mutates an existing item's value and tags in place.
    ///
    /// `f` runs while the store's write lock is held and must not call back
    /// into this cache.
    pub fn update_with<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut V, &mut BTreeSet<Tag>) -> R,
    ) -> Result<R> {
        self.modify(key, |item| f(&mut item.value, &mut item.tags))
    }

    // == Patch ==
    /// Updates the item if present, otherwise inserts it like [`Cache::put`].
    ///
    /// Never fails with `KeyAlreadyExists`; an insert can still hit
    /// `CapacityExceeded`. Existing tags are kept.
    pub fn patch(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.upsert(key.into(), value, None)
    }

    /// Like [`Cache::patch`], but also replaces the tags of an existing item.
    pub fn patch_tagged(
        &self,
        key: impl Into<String>,
        value: V,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<()> {
        self.upsert(key.into(), value, Some(tags.into_iter().collect()))
    }

    fn upsert(&self, key: String, value: V, tags: Option<BTreeSet<Tag>>) -> Result<()> {
        let capacity = self.capacity;
        let lifetime = self.default_lifetime;
        self.store.write(|items| {
            if let Some(item) = items.get_mut(&key) {
                item.value = value;
                if let Some(tags) = tags {
                    item.tags = tags;
                }
                return Ok(());
            }
            if items.len() >= capacity {
                return Err(CacheError::CapacityExceeded(capacity));
            }
            items.insert(key, Item::new(value, lifetime, tags.unwrap_or_default()));
            Ok(())
        })
    }

    // == Delete ==
    /// Removes an item.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.store
            .delete(key)
            .map(|_| ())
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    // == Clear ==
    /// Atomically empties the cache.
    ///
    /// Items obtained before the call are detached copies and say nothing
    /// about what the cache holds afterwards.
    pub fn clear(&self) {
        let dropped = self.store.clear(self.capacity.min(1024));
        debug!(dropped, "Cache cleared");
    }

    // == Traversal ==
    /// Returns a copy of every item. Order is unspecified.
    pub fn list(&self) -> Vec<Item<V>> {
        self.store.read(|items| items.values().cloned().collect())
    }

    /// Returns a copy of the whole key to item mapping.
    pub fn items(&self) -> HashMap<String, Item<V>> {
        self.store.read(|items| items.clone())
    }

    /// Returns the entries for which `predicate` holds. Order is unspecified.
    ///
    /// The predicate runs on a snapshot, outside the lock.
    pub fn filter<F>(&self, predicate: F) -> Vec<(String, Item<V>)>
    where
        F: Fn(&str, &Item<V>) -> bool,
    {
        self.store
            .snapshot()
            .into_iter()
            .filter(|(key, item)| predicate(key, item))
            .collect()
    }

    /// Calls `f` for every entry of a snapshot, outside the lock.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Item<V>),
    {
        for (key, item) in self.store.snapshot() {
            f(&key, &item);
        }
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.store.read(|items| items.keys().cloned().collect())
    }

    pub fn list_values(&self) -> Vec<V> {
        self.store
            .read(|items| items.values().map(|item| item.value.clone()).collect())
    }

    // == Lifetimes ==
    /// Adds `delta` to an item's lifetime.
    ///
    /// Immortal items stay immortal: the sentinel is never turned into a
    /// finite lifetime by an extension.
    pub fn extend_lifetime(&self, key: &str, delta: Duration) -> Result<()> {
        self.modify(key, |item| item.extend_lifetime(delta))
    }

    /// Exempts an item from auditor eviction until its lifetime is set again.
    pub fn immortalize(&self, key: &str) -> Result<()> {
        self.set_lifetime(key, IMMORTAL)
    }

    /// Replaces an item's lifetime, measured from its original creation time.
    /// `IMMORTAL` makes it immortal.
    pub fn set_lifetime(&self, key: &str, lifetime: Duration) -> Result<()> {
        self.modify(key, |item| item.set_lifetime(lifetime))
    }

    fn modify<R>(&self, key: &str, f: impl FnOnce(&mut Item<V>) -> R) -> Result<R> {
        self.store.write(|items| {
            items
                .get_mut(key)
                .map(f)
                .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
        })
    }

    // == Auditing ==
    /// Returns the background auditor for lifecycle control and error collection.
    pub fn auditor(&self) -> &Auditor<V> {
        &self.auditor
    }

    /// Runs one expiry sweep on the calling thread, returning how many items
    /// were removed.
    pub fn sweep_now(&self) -> Result<usize> {
        self.auditor.audit_now(&self.store)
    }

    /// Stops the auditor and waits for its loop to exit.
    ///
    /// The cache stays usable afterwards, but nothing expires automatically.
    pub async fn close(&self) {
        self.auditor.stop().await;
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.lookups.hits(),
            misses: self.lookups.misses(),
            expired: self.auditor.evicted(),
            sweeps: self.auditor.sweeps(),
            total_entries: self.store.len(),
        }
    }

    /// Returns the live count.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_lifetime(&self) -> Duration {
        self.default_lifetime
    }
}
