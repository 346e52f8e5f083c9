//! Property-based test generators using proptest.

use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for non-empty keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..32)
}

/// Strategy for values, possibly empty.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for up to `max` key-value pairs with unique, non-empty keys.
pub fn unique_pairs_strategy(max: usize) -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::btree_set(key_strategy(), 0..=max).prop_flat_map(|keys: BTreeSet<Vec<u8>>| {
        let len = keys.len();
        prop::collection::vec(value_strategy(), len).prop_map(move |values| {
            keys.iter().cloned().zip(values).collect::<Vec<_>>()
        })
    })
}

/// Strategy for import batch sizes; `0` means a single batch.
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(0usize), 1usize..16]
}
