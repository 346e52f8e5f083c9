//! Store directory management.
//!
//! This module handles the file system layout of a store:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK                     # Advisory lock (exclusive writer, shared readers)
//! └─ data-<016x seq>.seg      # Data files; the highest sequence is active
//! ```
//!
//! Compaction writes a new data file with the next sequence number and then
//! removes the older ones unless the store keeps files.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DATA_PREFIX: &str = "data-";
const DATA_SUFFIX: &str = ".seg";

/// Owns the store directory and its advisory lock.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for the lifetime of the store).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// Writers take an exclusive lock, readers a shared one.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds a conflicting lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool, read_only: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing && !read_only {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = if read_only && !lock_path.exists() {
            // A reader must not create files; lock the directory handle instead.
            File::open(path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?
        };

        let locked = if read_only {
            FileExt::try_lock_shared(&lock_file)
        } else {
            FileExt::try_lock_exclusive(&lock_file)
        };
        if locked.is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of data file number `seq`.
    #[must_use]
    pub fn data_file_path(&self, seq: u64) -> PathBuf {
        self.path.join(format!("{DATA_PREFIX}{seq:016x}{DATA_SUFFIX}"))
    }

    /// Lists the sequence numbers of all data files, ascending.
    pub fn data_file_seqs(&self) -> StoreResult<Vec<u64>> {
        let mut seqs = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(seq) = parse_data_file_name(name) {
                seqs.push(seq);
            }
        }
        seqs.sort_unstable();
        Ok(seqs)
    }

    /// Removes the data files with the given sequence numbers.
    ///
    /// Returns the number of files deleted.
    pub fn remove_data_files(&self, seqs: &[u64]) -> StoreResult<usize> {
        let mut deleted = 0;
        for &seq in seqs {
            let path = self.data_file_path(seq);
            if path.exists() {
                fs::remove_file(&path)?;
                deleted += 1;
            }
        }

        if deleted > 0 {
            self.sync_directory()?;
        }

        Ok(deleted)
    }

    /// Total bytes used on disk by the files in the directory.
    pub fn disk_usage(&self) -> StoreResult<u64> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.path)? {
            let metadata = entry?.metadata()?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }

    /// Syncs the store directory so file creation and removal are durable.
    #[cfg(unix)]
    pub fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn sync_directory(&self) -> StoreResult<()> {
        // NTFS journals metadata; there is no directory handle to fsync.
        Ok(())
    }
}

fn parse_data_file_name(name: &str) -> Option<u64> {
    let hex = name.strip_prefix(DATA_PREFIX)?.strip_suffix(DATA_SUFFIX)?;
    if hex.len() != 16 {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("new_store");

        let dir = StoreDir::open(&path, true, false).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.path(), path);
    }

    #[test]
    fn reader_never_creates() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing");

        assert!(StoreDir::open(&path, true, true).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn lock_prevents_second_writer() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("locked");

        let _first = StoreDir::open(&path, true, false).unwrap();
        let second = StoreDir::open(&path, true, false);
        assert!(matches!(second, Err(StoreError::Locked)));
    }

    #[test]
    fn readers_share_lock() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("shared");
        drop(StoreDir::open(&path, true, false).unwrap());

        let _a = StoreDir::open(&path, false, true).unwrap();
        let _b = StoreDir::open(&path, false, true).unwrap();
    }

    #[test]
    fn data_files_listed_in_order() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true, false).unwrap();

        for seq in [3u64, 1, 2] {
            File::create(dir.data_file_path(seq)).unwrap();
        }
        File::create(temp.path().join("notes.txt")).unwrap();

        assert_eq!(dir.data_file_seqs().unwrap(), vec![1, 2, 3]);
        assert_eq!(dir.remove_data_files(&[1, 2, 9]).unwrap(), 2);
        assert_eq!(dir.data_file_seqs().unwrap(), vec![3]);
    }

    #[test]
    fn file_names_round_trip() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true, false).unwrap();
        let path = dir.data_file_path(0x2a);
        let name = path.file_name().unwrap().to_str().unwrap();

        assert_eq!(name, "data-000000000000002a.seg");
        assert_eq!(parse_data_file_name(name), Some(0x2a));
        assert_eq!(parse_data_file_name("data-2a.seg"), None);
    }
}
