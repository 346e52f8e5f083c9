//! Configuration for core operations.

use std::time::Duration;

/// Configuration for a batch import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportConfig {
    /// Items per batch. `0` puts every item in a single batch.
    pub batch_size: usize,

    /// How long to wait for the store to become clean after the last batch.
    /// `None` waits indefinitely.
    pub durability_timeout: Option<Duration>,
}

impl ImportConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the durability deadline.
    #[must_use]
    pub const fn durability_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.durability_timeout = timeout;
        self
    }

    /// Number of batches `num_items` non-empty items are split into.
    #[must_use]
    pub const fn num_batches(&self, num_items: usize) -> usize {
        if num_items == 0 {
            0
        } else if self.batch_size == 0 {
            1
        } else {
            num_items.div_ceil(self.batch_size)
        }
    }
}

/// How much of the footer chain an aggregation visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalMode {
    /// Only the latest footer.
    #[default]
    LatestOnly,
    /// Every footer, newest first.
    FullChain,
}

impl TraversalMode {
    /// `FullChain` when `all` is set.
    #[must_use]
    pub const fn from_all(all: bool) -> Self {
        if all {
            Self::FullChain
        } else {
            Self::LatestOnly
        }
    }
}

/// Options for dumping key-value data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpOptions {
    /// Emit keys without values.
    pub keys_only: bool,
    /// Only emit keys starting with this prefix.
    pub key_prefix: Option<String>,
    /// Emit keys and values as lowercase hex.
    pub hex: bool,
}

impl DumpOptions {
    /// Returns whether `key` passes the prefix filter.
    #[must_use]
    pub fn matches(&self, key: &[u8]) -> bool {
        self.key_prefix
            .as_deref()
            .map_or(true, |prefix| key.starts_with(prefix.as_bytes()))
    }
}

/// Output rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON.
    Json,
}

impl OutputFormat {
    /// `Json` when `json` is set.
    #[must_use]
    pub const fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count() {
        let single = ImportConfig::new();
        assert_eq!(single.num_batches(0), 0);
        assert_eq!(single.num_batches(10), 1);

        let three = ImportConfig::new().batch_size(3);
        assert_eq!(three.num_batches(9), 3);
        assert_eq!(three.num_batches(10), 4);
    }

    #[test]
    fn prefix_filter() {
        let all = DumpOptions::default();
        assert!(all.matches(b"anything"));

        let filtered = DumpOptions {
            key_prefix: Some("user:".into()),
            ..DumpOptions::default()
        };
        assert!(filtered.matches(b"user:1"));
        assert!(!filtered.matches(b"order:1"));
    }

    #[test]
    fn flags_map_to_modes() {
        assert_eq!(TraversalMode::from_all(true), TraversalMode::FullChain);
        assert_eq!(OutputFormat::from_json_flag(false), OutputFormat::Text);
    }
}
