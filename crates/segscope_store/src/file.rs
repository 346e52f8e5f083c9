//! Append-only data file.

use crate::error::{StoreError, StoreResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An append-only data file shared between the writer and open footers.
///
/// # Durability
///
/// - `append()` writes through to the OS
/// - `sync()` calls `File::sync_all()` to ensure data is on disk
///
/// # Thread Safety
///
/// All methods take `&self`; the file cursor and the logical size are
/// guarded separately so footers held by readers can keep reading while
/// the persister appends.
#[derive(Debug)]
pub struct DataFile {
    path: PathBuf,
    file: Mutex<File>,
    size: RwLock<u64>,
}

impl DataFile {
    /// Opens or creates a data file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path, writable: bool) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .create(writable)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size: RwLock::new(size),
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size.
    pub fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let size = *self.size.read();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StoreError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    /// Appends data to the end of the file, returning its offset.
    pub fn append(&self, data: &[u8]) -> StoreResult<u64> {
        let mut size = self.size.write();
        if data.is_empty() {
            return Ok(*size);
        }

        let mut file = self.file.lock();
        let offset = *size;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size += data.len() as u64;

        Ok(offset)
    }

    /// Returns the current size of the file in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        *self.size.read()
    }

    /// Syncs data and metadata to durable storage.
    pub fn sync(&self) -> StoreResult<()> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }

    /// Truncates the file to `new_size`, dropping a torn tail.
    #[cfg(test)]
    pub fn truncate(&self, new_size: u64) -> StoreResult<()> {
        let mut size = self.size.write();
        if new_size > *size {
            return Err(StoreError::invalid_format(format!(
                "cannot truncate to size {} which is greater than current size {}",
                new_size, *size
            )));
        }

        let file = self.file.lock();
        file.set_len(new_size)?;
        file.sync_all()?;
        *size = new_size;

        Ok(())
    }
}
