//! Cache Module
//!
//! Provides the in-memory item store, the public cache on top of it, and
//! cache statistics.

mod item;
mod memcache;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use item::{Item, Tag, IMMORTAL};
pub use memcache::Cache;
pub use stats::CacheStats;
pub use store::{Entries, Store};
