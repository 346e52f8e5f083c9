//! Error types for segscope core operations.

use segscope_store::StoreError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Shape every import payload must have.
pub const EXPECTED_IMPORT_SHAPE: &str = r#"[{"k" : "key0", "v" : "val0"}, {"k" : "key1", "v" : "val1"}]"#;

/// Errors that can occur in segscope core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A store call failed. `call` names the failing operation.
    #[error("{call} failed: {source}")]
    Store {
        /// The store operation that failed.
        call: &'static str,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// An import payload failed structural validation.
    #[error("malformed input: {message}; expected format: {EXPECTED_IMPORT_SHAPE}")]
    MalformedInput {
        /// What was wrong with the payload.
        message: String,
    },

    /// Building a batch failed.
    #[error("building batch {batch} failed at item {item}: {source}")]
    BatchBuild {
        /// 0-based index of the batch.
        batch: usize,
        /// 0-based index of the item within the import input.
        item: usize,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// Submitting a batch failed.
    #[error("submitting batch {batch} failed: {source}")]
    BatchSubmit {
        /// 0-based index of the batch.
        batch: usize,
        /// The underlying store error.
        #[source]
        source: StoreError,
    },

    /// The store did not report quiescence before the deadline.
    #[error("timed out after {waited:?} waiting for durability")]
    DurabilityTimeout {
        /// How long the importer waited.
        waited: Duration,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Wraps a store error, naming the failing call.
    pub fn store(call: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { call, source }
    }

    /// Creates a malformed-input error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_names_the_call() {
        let err = CoreError::store("Store::snapshot")(StoreError::Closed);
        assert_eq!(err.to_string(), "Store::snapshot failed: store is closed");
    }

    #[test]
    fn malformed_input_shows_expected_shape() {
        let err = CoreError::malformed("not an array");
        let text = err.to_string();
        assert!(text.contains("not an array"));
        assert!(text.contains(r#"{"k" : "key0", "v" : "val0"}"#));
    }

    #[test]
    fn batch_build_identifies_batch_and_item() {
        let err = CoreError::BatchBuild {
            batch: 2,
            item: 7,
            source: StoreError::AllocTooLarge {
                requested: 8,
                remaining: 4,
            },
        };
        let text = err.to_string();
        assert!(text.contains("batch 2"));
        assert!(text.contains("item 7"));
    }
}
