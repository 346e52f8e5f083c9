//! Integration tests for footer-chain aggregation, diagnostics and compaction.

use segscope_core::{
    compact_dir, diag_stats, footer_dump, import_into_dir, open_read_only, size_histograms,
    AggregatedStats, DumpOptions, FragStats, ImportConfig, ImportItem, SnapshotAggregator,
    StatValue, TraversalMode,
};
use segscope_store::{CompactionConcern, PersistOptions, HEADER_LENGTH, TRAILER_LENGTH};
use segscope_testkit::{kv_pairs, scenarios, TestStore};

#[test]
fn full_chain_over_two_sessions() {
    let test_store = scenarios::repeated_sessions(2, 5).reopen_read_only();

    let stats = SnapshotAggregator::new(&test_store.store)
        .aggregate(TraversalMode::FullChain)
        .unwrap();
    assert_eq!(stats.len(), 2);

    let latest = stats.get(1).unwrap();
    assert_eq!(latest.num_segments, 2);
    assert_eq!(latest.total_ops_set, 10);
    assert_eq!(latest.total_ops_del, 0);
    assert_eq!(latest.total_key_bytes, 40);
    assert_eq!(latest.total_val_bytes, 40);
    assert_eq!(latest.segment_bytes, Some(vec![40, 40]));

    let older = stats.get(2).unwrap();
    assert_eq!(older.num_segments, 1);
    assert_eq!(older.total_ops_set, 5);
    assert_eq!(older.total_key_bytes, 20);
    assert_eq!(older.total_val_bytes, 20);
}

#[test]
fn latest_only_matches_first_of_full_chain() {
    let test_store = scenarios::repeated_sessions(3, 4);
    let aggregator = SnapshotAggregator::new(&test_store.store);

    let latest = aggregator.aggregate(TraversalMode::LatestOnly).unwrap();
    let full = aggregator.aggregate(TraversalMode::FullChain).unwrap();

    assert_eq!(latest.len(), 1);
    assert_eq!(full.len(), 3);
    assert_eq!(latest.get(1), full.get(1));
}

#[test]
fn stats_and_footer_dump_share_ordering() {
    let test_store = scenarios::repeated_sessions(3, 2);

    let stats = SnapshotAggregator::new(&test_store.store)
        .aggregate(TraversalMode::FullChain)
        .unwrap();
    let footers = footer_dump(&test_store.store, TraversalMode::FullChain).unwrap();

    assert_eq!(stats.len(), footers.len());
    for (idx, (name, footer_stats)) in stats.iter().enumerate() {
        assert_eq!(name, AggregatedStats::footer_name(idx + 1));
        let segments = footers[idx]["segment_locs"].as_array().unwrap().len() as u64;
        assert_eq!(footer_stats.num_segments, segments);
    }
}

#[test]
fn empty_store_aggregates_one_empty_footer() {
    let test_store = TestStore::new();
    let stats = SnapshotAggregator::new(&test_store.store)
        .aggregate(TraversalMode::FullChain)
        .unwrap();

    assert_eq!(stats.len(), 1);
    assert_eq!(stats.get(1).unwrap().num_segments, 0);
    assert_eq!(
        serde_json::to_string(&stats).unwrap(),
        r#"{"Footer_1":{"num_segments":0,"segment_bytes":[],"total_key_bytes":0,"total_ops_del":0,"total_ops_set":0,"total_val_bytes":0}}"#
    );
}

#[test]
fn fragmentation_accounts_every_footer() {
    let test_store = scenarios::repeated_sessions(2, 5);
    let store = &test_store.store;

    let frag = SnapshotAggregator::new(store).fragmentation().unwrap();

    let latest = store.snapshot().unwrap();
    let previous = store.snapshot_previous(&latest).unwrap().unwrap();
    let payload: u64 = latest.segment_locs().iter().map(|l| l.payload_bytes()).sum();
    let expected = payload + 2 * HEADER_LENGTH + latest.length() + previous.length();

    assert_eq!(frag.data_bytes, expected);
    assert_eq!(frag.dir_size, store.dir_size().unwrap());
    assert_eq!(frag, FragStats::compute(frag.data_bytes, frag.dir_size));
    assert!(latest.length() > TRAILER_LENGTH);
}

#[test]
fn diag_reports_store_counters() {
    let test_store = TestStore::new();
    let stack = PersistOptions::default().compaction(CompactionConcern::Disallow);
    test_store.persist(&kv_pairs(3), stack);
    test_store.persist(&kv_pairs(2), stack);

    let stats = diag_stats(&test_store.store).unwrap();
    assert_eq!(stats["num_segments"], StatValue::Scalar(2));
    assert_eq!(stats["total_ops_set"], StatValue::Scalar(5));
    assert_eq!(stats["total_persists"], StatValue::Scalar(2));
    assert_eq!(stats["num_files"], StatValue::Scalar(1));
}

#[test]
fn histograms_follow_prefix_filter() {
    let test_store = TestStore::new();
    test_store.write_session(&kv_pairs(5));
    test_store.write_session(&[(b"other-key".to_vec(), vec![0u8; 20])]);

    let footer = test_store.snapshot().unwrap();
    let (keys, values) = size_histograms(&footer, &DumpOptions::default()).unwrap();
    assert_eq!(keys.total(), 6);
    assert_eq!(values.total(), 6);

    let options = DumpOptions {
        key_prefix: Some("key".into()),
        ..DumpOptions::default()
    };
    let (keys, values) = size_histograms(&footer, &options).unwrap();
    assert_eq!(keys.total(), 5);
    assert_eq!(keys.counts()[1], 5);
    assert_eq!(values.counts()[1], 5);
}

#[test]
fn compaction_leaves_one_segment_and_readable_chain() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("store");
    for _ in 0..3 {
        let items: Vec<_> = kv_pairs(5)
            .into_iter()
            .map(|(k, v)| ImportItem::new(k, v))
            .collect();
        import_into_dir(&dir, &items, ImportConfig::new()).unwrap();
    }

    let report = compact_dir(&dir).unwrap();
    assert_eq!(report.segments_before, 3);
    assert_eq!(report.segments_after, 1);

    let store = open_read_only(&dir).unwrap();
    let stats = SnapshotAggregator::new(&store)
        .aggregate(TraversalMode::FullChain)
        .unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats.get(1).unwrap().total_ops_set, 5);
}
