//! Store, collection and persistence configuration.

/// Default segment count above which an `Allow` persist compacts.
pub const DEFAULT_MAX_SEGMENTS: usize = 8;

/// Whether a persist may (or must) compact the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompactionConcern {
    /// Never compact; always stack a new segment.
    Disallow,
    /// Compact once the segment count exceeds `max_segments`.
    #[default]
    Allow,
    /// Always compact, even when the change set is empty.
    Force,
}

/// Options controlling a single persist.
#[derive(Debug, Clone, Copy)]
pub struct PersistOptions {
    /// Compaction policy.
    pub compaction: CompactionConcern,
    /// Segment count threshold for `CompactionConcern::Allow`.
    pub max_segments: usize,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            compaction: CompactionConcern::Allow,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

impl PersistOptions {
    /// Creates persist options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compaction policy.
    #[must_use]
    pub const fn compaction(mut self, concern: CompactionConcern) -> Self {
        self.compaction = concern;
        self
    }

    /// Sets the segment count threshold.
    #[must_use]
    pub const fn max_segments(mut self, max: usize) -> Self {
        self.max_segments = max;
        self
    }

    /// Returns whether a footer with `num_segments` segments must be compacted.
    #[must_use]
    pub const fn wants_compaction(&self, num_segments: usize) -> bool {
        match self.compaction {
            CompactionConcern::Disallow => false,
            CompactionConcern::Allow => num_segments > self.max_segments,
            CompactionConcern::Force => true,
        }
    }
}

/// Configuration for opening a store directory.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Open without the ability to persist. Takes a shared lock.
    pub read_only: bool,

    /// Keep superseded data files after compaction.
    pub keep_files: bool,

    /// Options used by the background persister.
    pub persist: PersistOptions,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            keep_files: false,
            persist: PersistOptions::default(),
        }
    }
}

impl StoreOptions {
    /// Creates store options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for diagnostic readers: read-only, never create, keep files.
    #[must_use]
    pub fn read_only_mode() -> Self {
        Self::default()
            .create_if_missing(false)
            .read_only(true)
            .keep_files(true)
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets read-only mode.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets whether superseded data files are kept.
    #[must_use]
    pub const fn keep_files(mut self, value: bool) -> Self {
        self.keep_files = value;
        self
    }

    /// Sets the persister's options.
    #[must_use]
    pub const fn persist(mut self, options: PersistOptions) -> Self {
        self.persist = options;
        self
    }
}

/// Configuration for a mutable collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Reject batch execution.
    pub read_only: bool,
}
