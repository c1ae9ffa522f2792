//! Cache Item Module
//!
//! Defines the value holder stored for every key, with its lifetime metadata.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Small integer label attached to an item for caller-side filtering.
pub type Tag = u16;

/// Lifetime sentinel: an item with this lifetime is never evicted by the auditor.
pub const IMMORTAL: Duration = Duration::ZERO;

// == Item ==
/// A stored value together with its creation time, lifetime and tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Item<V> {
    /// The stored value
    pub value: V,
    /// Caller-side labels, no internal meaning
    pub tags: BTreeSet<Tag>,
    created_at: Instant,
    lifetime: Duration,
}

impl<V> Item<V> {
    // == Constructor ==
    /// Creates an item stamped with the current time.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `lifetime` - Time after creation when the item becomes evictable, `IMMORTAL` for never
    /// * `tags` - Labels for filtering
    pub fn new(value: V, lifetime: Duration, tags: impl IntoIterator<Item = Tag>) -> Self {
        Self::created_at(Instant::now(), value, lifetime, tags)
    }

    /// Creates an item with an explicit creation instant.
    pub fn created_at(
        created_at: Instant,
        value: V,
        lifetime: Duration,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Self {
        Self {
            value,
            tags: tags.into_iter().collect(),
            created_at,
            lifetime,
        }
    }

    pub fn creation_time(&self) -> Instant {
        self.created_at
    }

    /// Returns the lifetime; `IMMORTAL` when the item never expires.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn is_immortal(&self) -> bool {
        self.lifetime == IMMORTAL
    }

    /// Returns the instant after which the item is evictable, or None if it
    /// never expires (immortal, or a lifetime past what `Instant` can represent).
    pub fn expires_at(&self) -> Option<Instant> {
        if self.is_immortal() {
            None
        } else {
            self.created_at.checked_add(self.lifetime)
        }
    }

    // == Is Expired ==
    /// Checks whether the item is eligible for eviction at `now`.
    ///
    /// An item expires once strictly more than its lifetime has elapsed since
    /// creation. Immortal items never expire.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        !self.is_immortal() && now.saturating_duration_since(self.created_at) > self.lifetime
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Returns the time left before expiry, or None if immortal.
    ///
    /// Returns `Some(Duration::ZERO)` once the lifetime has elapsed.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Adds `delta` to a finite lifetime. Immortal items stay immortal.
    pub(crate) fn extend_lifetime(&mut self, delta: Duration) {
        if !self.is_immortal() {
            self.lifetime = self.lifetime.saturating_add(delta);
        }
    }

    pub(crate) fn set_lifetime(&mut self, lifetime: Duration) {
        self.lifetime = lifetime;
    }
}
