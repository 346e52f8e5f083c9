//! Diagnostic statistics: latest footer totals merged with store counters.

use crate::aggregate::{FooterStats, StatValue};
use crate::error::{CoreError, CoreResult};
use crate::source::FooterSource;
use segscope_store::Store;
use std::collections::BTreeMap;

/// Collects every diagnostic statistic of `store`, keyed by name.
pub fn diag_stats(store: &Store) -> CoreResult<BTreeMap<String, StatValue>> {
    let latest = store.latest()?;
    let mut stats = FooterStats::from_footer(&latest, true).to_map();
    drop(latest);

    let store_stats = store.stats().map_err(CoreError::store("Store::stats"))?;
    for (name, value) in store_stats.entries() {
        stats.insert(name.to_string(), StatValue::Scalar(value));
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segscope_store::{Op, PersistOptions, StoreOptions};
    use tempfile::tempdir;

    #[test]
    fn merges_footer_and_store_stats() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path(), StoreOptions::default()).unwrap();
        store
            .persist(
                vec![Op::set("key0", "val0"), Op::set("key1", "val1")],
                PersistOptions::default(),
            )
            .unwrap();

        let stats = diag_stats(&store).unwrap();
        assert_eq!(stats["total_ops_set"], StatValue::Scalar(2));
        assert_eq!(stats["segment_bytes"], StatValue::List(vec![16]));
        assert_eq!(stats["num_segments"], StatValue::Scalar(1));
        assert_eq!(stats["total_persists"], StatValue::Scalar(1));
        assert!(stats.contains_key("num_bytes_used_disk"));

        let keys: Vec<_> = stats.keys().cloned().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
