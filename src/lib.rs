//! Mini Memcache - A lightweight in-process key-value cache
//!
//! Items carry a lifetime measured from insertion; a background auditor
//! evicts the expired ones. Items with a zero lifetime are immortal.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats, Item, Tag, IMMORTAL};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{Auditor, AuditorState};
