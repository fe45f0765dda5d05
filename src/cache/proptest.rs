//! Property-Based Tests for the LRU cache
//!
//! # Test Properties
//!
//! 1. **Eviction Bound**: `used_bytes <= max_bytes` after every `add`
//! 2. **Exact Accounting**: `used_bytes` equals the sum over present entries
//! 3. **Recency**: the most recently added key is either present at the
//!    front or was evicted because it alone exceeds capacity

#![cfg(test)]

use std::collections::HashMap;

use proptest::prelude::*;

use super::lru::{ByteSize, LruCache};

// =============================================================================
// Property Strategies
// =============================================================================

/// Small key space so that replacements actually happen.
fn op_strategy() -> impl Strategy<Value = (String, Vec<u8>)> {
    (
        "[a-e]{1,3}",
        prop::collection::vec(any::<u8>(), 0..24),
    )
}

fn ops_strategy() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::vec(op_strategy(), 1..200)
}

/// Recompute the accounted size from the visible entries.
fn recount(cache: &mut LruCache<Vec<u8>>) -> u64 {
    let keys: Vec<String> = cache.keys_mru().into_iter().map(String::from).collect();
    keys.iter()
        .map(|k| {
            let len = cache.get(k).map(|v| v.byte_len()).unwrap_or_default();
            (k.len() + len) as u64
        })
        .sum()
}

// =============================================================================
// Capacity Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the byte bound holds and accounting is exact after every add.
    #[test]
    fn prop_bound_and_accounting(max_bytes in 1u64..64, ops in ops_strategy()) {
        let mut cache = LruCache::new(max_bytes);

        for (key, value) in ops {
            cache.add(key, value);
            prop_assert!(cache.used_bytes() <= max_bytes);
            prop_assert_eq!(cache.used_bytes(), recount(&mut cache));
            prop_assert_eq!(cache.keys_mru().len(), cache.len());
        }
    }

    /// Property: an unbounded cache keeps the last value written per key.
    #[test]
    fn prop_unbounded_keeps_last_write(ops in ops_strategy()) {
        let mut cache = LruCache::new(0);
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();

        for (key, value) in ops {
            model.insert(key.clone(), value.clone());
            cache.add(key, value);
        }

        prop_assert_eq!(cache.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(cache.get(key), Some(value));
        }
    }

    /// Property: the newest key sits at the front unless it alone overflows.
    #[test]
    fn prop_newest_key_is_most_recent(max_bytes in 1u64..64, ops in ops_strategy()) {
        let mut cache = LruCache::new(max_bytes);

        for (key, value) in ops {
            let size = (key.len() + value.len()) as u64;
            cache.add(key.clone(), value);
            if size <= max_bytes {
                prop_assert_eq!(cache.keys_mru().first().copied(), Some(key.as_str()));
            } else {
                prop_assert!(cache.is_empty());
            }
        }
    }
}
