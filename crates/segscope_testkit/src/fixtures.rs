//! Test fixtures and store helpers.
//!
//! Provides temp-dir backed stores and helpers that persist data through
//! the collection front-end the way a real writer would.

use segscope_store::{
    Collection, CollectionOptions, Footer, PersistOptions, Store, StoreOptions,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A store in a temporary directory, removed on drop.
pub struct TestStore {
    /// The open store handle.
    pub store: Store,
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestStore {
    /// Creates an empty writable store.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Creates a store with custom options.
    pub fn with_options(options: StoreOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("store");
        let store = Store::open(&path, options).expect("Failed to open store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `pairs` as one batch through a fresh collection, then closes
    /// it so the batch is persisted as one segment and one footer.
    pub fn write_session(&self, pairs: &[(Vec<u8>, Vec<u8>)]) {
        let coll = Collection::open(&self.store, CollectionOptions::default())
            .expect("Failed to open collection");
        let bytes = pairs.iter().map(|(k, v)| k.len() + v.len()).sum();
        let mut batch = coll.new_batch(pairs.len(), bytes);
        for (key, value) in pairs {
            batch.set(key, value);
        }
        coll.execute_batch(batch).expect("Failed to execute batch");
        coll.close();
    }

    /// Persists `pairs` directly, bypassing the collection.
    pub fn persist(&self, pairs: &[(Vec<u8>, Vec<u8>)], options: PersistOptions) -> Footer {
        let ops = pairs
            .iter()
            .map(|(k, v)| segscope_store::Op::set(k.clone(), v.clone()))
            .collect();
        self.store.persist(ops, options).expect("Failed to persist")
    }

    /// Releases the writer and reopens the directory read-only.
    pub fn reopen_read_only(self) -> Self {
        let Self {
            store,
            path,
            _temp_dir,
        } = self;
        drop(store);
        let store =
            Store::open(&path, StoreOptions::read_only_mode()).expect("Failed to reopen store");
        Self {
            store,
            path,
            _temp_dir,
        }
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// `n` pairs `key0 -> val0`, `key1 -> val1`, ...
pub fn kv_pairs(n: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..n)
        .map(|i| (format!("key{i}").into_bytes(), format!("val{i}").into_bytes()))
        .collect()
}

/// Runs a test with a temporary writable store.
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let test_store = TestStore::new();
    f(&test_store.store, test_store.path())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A store where each of `sessions` sessions wrote `key0..key{n-1}`.
    ///
    /// Footers are cumulative, so the latest footer lists `sessions`
    /// segments.
    pub fn repeated_sessions(sessions: usize, n: usize) -> TestStore {
        let test_store = TestStore::new();
        let pairs = kv_pairs(n);
        for _ in 0..sessions {
            test_store.write_session(&pairs);
        }
        test_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_creates_one_footer() {
        let test_store = TestStore::new();
        test_store.write_session(&kv_pairs(5));

        let footer = test_store.snapshot().unwrap();
        assert_eq!(footer.seq(), 1);
        assert_eq!(footer.segment_locs().len(), 1);
        assert_eq!(footer.get(b"key4").unwrap(), Some(b"val4".to_vec()));
    }

    #[test]
    fn repeated_sessions_stack_segments() {
        let test_store = scenarios::repeated_sessions(2, 5);
        let footer = test_store.snapshot().unwrap();
        assert_eq!(footer.segment_locs().len(), 2);
    }

    #[test]
    fn reopen_keeps_data() {
        let test_store = TestStore::new();
        test_store.write_session(&kv_pairs(3));
        let test_store = test_store.reopen_read_only();

        assert!(test_store.is_read_only());
        assert_eq!(test_store.snapshot().unwrap().entries().unwrap().len(), 3);
    }

    #[test]
    fn with_temp_store_runs() {
        let seq = with_temp_store(|store, path| {
            assert!(path.exists());
            store.snapshot().unwrap().seq()
        });
        assert_eq!(seq, 0);
    }
}
