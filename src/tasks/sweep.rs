//! Expiry Sweep
//!
//! The default audit job: removes every mortal item whose lifetime has elapsed.

use std::time::Instant;

use crate::cache::Store;
use crate::error::Result;

/// Removes expired, non-immortal items from `store`.
///
/// Expired keys are collected under the read lock, then deleted one by one
/// under short write sections. Each deletion re-checks the current item, so a
/// key that was deleted, cleared, re-inserted or immortalized after the scan
/// is left alone.
///
/// Returns the number of items removed.
pub fn expire_items<V>(store: &Store<V>) -> Result<usize> {
    let now = Instant::now();

    let candidates: Vec<String> = store.read(|items| {
        items
            .iter()
            .filter(|(_, item)| item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect()
    });

    let removed = candidates
        .iter()
        .filter(|key| store.remove_if(key, |item| item.is_expired_at(now)))
        .count();

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Item, IMMORTAL};
    use std::time::Duration;

    #[test]
    fn test_sweep_removes_only_expired_mortal_items() {
        let store = Store::default();
        store.put("short".to_string(), Item::new(1, Duration::from_millis(1), []));
        store.put("long".to_string(), Item::new(2, Duration::from_secs(3600), []));
        store.put("forever".to_string(), Item::new(3, IMMORTAL, []));

        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(expire_items(&store).unwrap(), 1);
        assert!(store.get("short").is_none());
        assert!(store.contains("long"));
        assert!(store.contains("forever"));
    }

    #[test]
    fn test_sweep_on_empty_store() {
        let store: Store<u8> = Store::default();
        assert_eq!(expire_items(&store).unwrap(), 0);
    }
}
