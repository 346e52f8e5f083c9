//! # Segscope Core
//!
//! Maintenance and diagnostics for segscope stores.
//!
//! This crate provides:
//! - [`BatchImporter`] - splits key-value pairs into batches and waits until
//!   the store has persisted all of them
//! - [`SnapshotAggregator`] - per-footer statistics over the footer chain and
//!   a fragmentation estimate
//! - Dumps of live data, key versions and footers
//! - Size histograms, diagnostic statistics and offline compaction
//!
//! ## Example
//!
//! ```rust,no_run
//! use segscope_core::{import_into_dir, parse_items, ImportConfig};
//!
//! let items = parse_items(r#"[{"k":"key0","v":"val0"}]"#).unwrap();
//! let summary = import_into_dir("my_store".as_ref(), &items, ImportConfig::new()).unwrap();
//! assert_eq!(summary.items_written, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod compact;
mod config;
mod diag;
mod dump;
mod error;
mod frag;
mod hist;
mod import;
mod signal;
mod source;

pub use aggregate::{AggregatedStats, FooterStats, SnapshotAggregator, StatValue};
pub use compact::{compact_dir, CompactReport};
pub use config::{DumpOptions, ImportConfig, OutputFormat, TraversalMode};
pub use diag::diag_stats;
pub use dump::{dump_entries, footer_dump, key_versions, latest_footer, KeyVal};
pub use error::{CoreError, CoreResult, EXPECTED_IMPORT_SHAPE};
pub use frag::FragStats;
pub use hist::{size_histograms, Histogram, BIN_GROWTH, FIRST_BIN, NUM_BINS};
pub use import::{import_into_dir, parse_items, BatchImporter, ImportItem, ImportSummary};
pub use signal::{CompletionSignal, SignalGuard, Waiter};
pub use source::{open_read_only, walk_chain, FooterSource, FooterView};
