//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of a data file.
    #[error("read beyond end of file: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current file size.
        size: u64,
    },

    /// A data file, segment or footer is corrupted.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Invalid directory layout or file format.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// A mutation was attempted on a read-only store or collection.
    #[error("store is read-only")]
    ReadOnly,

    /// The store or collection is closed.
    #[error("store is closed")]
    Closed,

    /// A batch arena allocation exceeded the remaining capacity.
    #[error("batch allocation too large: requested {requested} bytes, {remaining} remaining")]
    AllocTooLarge {
        /// Bytes requested.
        requested: usize,
        /// Bytes left in the arena.
        remaining: usize,
    },

    /// A batch slot does not belong to the batch arena.
    #[error("invalid batch slot: {message}")]
    InvalidSlot {
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid slot error.
    pub fn invalid_slot(message: impl Into<String>) -> Self {
        Self::InvalidSlot {
            message: message.into(),
        }
    }
}
