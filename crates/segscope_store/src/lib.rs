//! # Segscope Store
//!
//! A file-backed, segment-structured key-value store.
//!
//! Each persist appends one immutable, key-sorted segment to the active
//! data file, followed by a footer listing every segment of the resulting
//! state. Footers link backward to their predecessor, so the persisted
//! history of a data file can be walked from newest to oldest.
//!
//! ## Components
//!
//! - [`Store`] - directory, data files, footer chain, compaction
//! - [`Footer`] - an immutable point-in-time view
//! - [`Collection`] - mutable front-end: batches, background persister, events
//!
//! ## Example
//!
//! ```rust,no_run
//! use segscope_store::{Collection, CollectionOptions, Store, StoreOptions};
//!
//! let store = Store::open("my_store".as_ref(), StoreOptions::default()).unwrap();
//! let coll = Collection::open(&store, CollectionOptions::default()).unwrap();
//!
//! let mut batch = coll.new_batch(1, 8);
//! batch.set(b"key0", b"val0");
//! coll.execute_batch(batch).unwrap();
//! coll.close();
//!
//! let footer = store.snapshot().unwrap();
//! assert_eq!(footer.segment_locs().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod collection;
mod dir;
mod error;
mod event;
mod file;
mod footer;
mod format;
mod options;
mod segment;
mod stats;
mod store;

pub use batch::{ArenaSlot, Batch};
pub use collection::Collection;
pub use error::{StoreError, StoreResult};
pub use event::{Event, EventKind, Subscription};
pub use footer::{Footer, FooterId};
pub use format::{FORMAT_VERSION, HEADER_LENGTH, TRAILER_LENGTH};
pub use options::{
    CollectionOptions, CompactionConcern, PersistOptions, StoreOptions, DEFAULT_MAX_SEGMENTS,
};
pub use segment::{Op, OpKind, Segment, SegmentLoc};
pub use stats::{CollectionStats, StoreStats};
pub use store::Store;
