//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain HashMap model.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::error::CacheError;

// == Test Configuration ==
const TEST_CAPACITY: usize = 100;
const TEST_DEFAULT_LIFETIME: Duration = Duration::from_secs(300);

fn test_cache(capacity: usize) -> Cache<String> {
    Cache::idle(
        CacheConfig::new()
            .with_capacity(capacity)
            .with_default_lifetime(TEST_DEFAULT_LIFETIME),
    )
}

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,32}".prop_map(|s| s)
}

/// Generates a sequence of cache operations for testing
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Patch { key: String, value: String },
    Update { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Clear,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Put { key, value }),
        2 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Patch { key, value }),
        2 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Update { key, value }),
        3 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        2 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => Just(CacheOp::Clear),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any operation sequence leaves the cache agreeing with a HashMap model
    // that applies the same rules, and the live count never drifts from it.
    #[test]
    fn prop_matches_model(
        capacity in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..60)
    ) {
        let cache = test_cache(capacity);
        let mut model: HashMap<String, String> = HashMap::new();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    let result = cache.put(key.clone(), value.clone());
                    if model.contains_key(&key) {
                        prop_assert_eq!(result, Err(CacheError::KeyAlreadyExists(key)));
                    } else if model.len() >= capacity {
                        prop_assert_eq!(result, Err(CacheError::CapacityExceeded(capacity)));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    }
                }
                CacheOp::Patch { key, value } => {
                    let result = cache.patch(key.clone(), value.clone());
                    if model.contains_key(&key) || model.len() < capacity {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    } else {
                        prop_assert_eq!(result, Err(CacheError::CapacityExceeded(capacity)));
                    }
                }
                CacheOp::Update { key, value } => {
                    let result = cache.update(&key, value.clone());
                    if let Some(slot) = model.get_mut(&key) {
                        prop_assert!(result.is_ok());
                        *slot = value;
                    } else {
                        prop_assert_eq!(result, Err(CacheError::KeyNotFound(key)));
                    }
                }
                CacheOp::Get { key } => {
                    match model.get(&key) {
                        Some(expected) => {
                            expected_hits += 1;
                            prop_assert_eq!(&cache.get(&key).unwrap(), expected);
                        }
                        None => {
                            expected_misses += 1;
                            prop_assert!(cache.get(&key).is_err());
                        }
                    }
                }
                CacheOp::Delete { key } => {
                    let result = cache.delete(&key);
                    prop_assert_eq!(result.is_ok(), model.remove(&key).is_some());
                }
                CacheOp::Clear => {
                    cache.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(cache.len(), model.len(), "Live count drifted from model");
            prop_assert!(cache.len() <= capacity);
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
    }

    // A second put on a present key fails and leaves the first value in place.
    #[test]
    fn prop_put_is_unique(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let cache = test_cache(TEST_CAPACITY);

        cache.put(key.clone(), value1.clone()).unwrap();
        let second = cache.put(key.clone(), value2);

        prop_assert_eq!(second, Err(CacheError::KeyAlreadyExists(key.clone())));
        prop_assert_eq!(cache.get(&key).unwrap(), value1);
    }

    // Filling to capacity rejects the next put; freeing one slot admits it.
    #[test]
    fn prop_capacity_enforcement(capacity in 1usize..20) {
        let cache = test_cache(capacity);

        for i in 0..capacity {
            cache.put(format!("key{}", i), format!("value{}", i)).unwrap();
        }
        prop_assert_eq!(
            cache.put("overflow", "x".to_string()),
            Err(CacheError::CapacityExceeded(capacity))
        );

        cache.delete("key0").unwrap();
        prop_assert!(cache.put("overflow", "x".to_string()).is_ok());
        prop_assert_eq!(cache.len(), capacity);
    }

    // Patch on an absent key inserts exactly like put; on a present key it
    // updates exactly like update, keeping creation time and lifetime.
    #[test]
    fn prop_patch_is_upsert(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let patched = test_cache(TEST_CAPACITY);
        let put = test_cache(TEST_CAPACITY);

        patched.patch(key.clone(), value1.clone()).unwrap();
        put.put(key.clone(), value1).unwrap();
        let inserted = patched.get_item(&key).unwrap();
        let reference = put.get_item(&key).unwrap();
        prop_assert_eq!(&inserted.value, &reference.value);
        prop_assert_eq!(inserted.lifetime(), reference.lifetime());
        prop_assert_eq!(&inserted.tags, &reference.tags);

        patched.patch(key.clone(), value2.clone()).unwrap();
        put.update(&key, value2).unwrap();
        let after_patch = patched.get_item(&key).unwrap();
        prop_assert_eq!(&after_patch.value, &put.get(&key).unwrap());
        prop_assert_eq!(after_patch.creation_time(), inserted.creation_time());
        prop_assert_eq!(after_patch.lifetime(), inserted.lifetime());
        prop_assert_eq!(patched.len(), 1);
    }

    // Clear empties the cache whatever it held before.
    #[test]
    fn prop_clear_empties_cache(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 0..30)
    ) {
        let cache = test_cache(TEST_CAPACITY);
        for (key, value) in entries {
            let _ = cache.patch(key, value);
        }

        cache.clear();

        prop_assert!(cache.list().is_empty());
        prop_assert!(cache.list_keys().is_empty());
        prop_assert_eq!(cache.len(), 0);
    }
}
