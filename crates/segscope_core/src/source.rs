//! Read access to a store's footer chain.

use crate::config::TraversalMode;
use crate::error::{CoreError, CoreResult};
use segscope_store::{Footer, SegmentLoc, Store, StoreOptions};
use std::path::Path;

/// A footer as seen by aggregation.
pub trait FooterView {
    /// Segment records composing this state, oldest first.
    fn segment_locs(&self) -> &[SegmentLoc];

    /// Serialized length of the footer.
    fn length(&self) -> u64;
}

/// A store whose persisted history can be walked newest to oldest.
pub trait FooterSource {
    /// Footer handle. Dropping it releases its resources.
    type Footer: FooterView;

    /// Returns the latest footer.
    fn latest(&self) -> CoreResult<Self::Footer>;

    /// Returns the footer persisted before `footer`, `None` at the chain start.
    fn previous(&self, footer: &Self::Footer) -> CoreResult<Option<Self::Footer>>;

    /// Bytes the store occupies on disk.
    fn dir_size(&self) -> CoreResult<u64>;

    /// Fixed framing overhead counted once per footer.
    fn header_length(&self) -> u64;
}

impl FooterView for Footer {
    fn segment_locs(&self) -> &[SegmentLoc] {
        Footer::segment_locs(self)
    }

    fn length(&self) -> u64 {
        Footer::length(self)
    }
}

impl FooterSource for Store {
    type Footer = Footer;

    fn latest(&self) -> CoreResult<Footer> {
        self.snapshot().map_err(CoreError::store("Store::snapshot"))
    }

    fn previous(&self, footer: &Footer) -> CoreResult<Option<Footer>> {
        self.snapshot_previous(footer)
            .map_err(CoreError::store("Store::snapshot_previous"))
    }

    fn dir_size(&self) -> CoreResult<u64> {
        Store::dir_size(self).map_err(CoreError::store("Store::dir_size"))
    }

    fn header_length(&self) -> u64 {
        Store::header_length(self)
    }
}

/// Visits footers newest first, passing each a 1-based recency id.
///
/// The predecessor is fetched before the current footer is dropped, so at
/// most two footers are alive at a time.
pub fn walk_chain<S, F>(source: &S, mode: TraversalMode, mut visit: F) -> CoreResult<()>
where
    S: FooterSource,
    F: FnMut(usize, &S::Footer) -> CoreResult<()>,
{
    let mut current = source.latest()?;
    let mut id = 1;
    loop {
        visit(id, &current)?;
        if mode == TraversalMode::LatestOnly {
            return Ok(());
        }
        let Some(prev) = source.previous(&current)? else {
            return Ok(());
        };
        current = prev;
        id += 1;
    }
}

/// Opens `dir` for diagnostics: read-only, keeping every file.
pub fn open_read_only(dir: &Path) -> CoreResult<Store> {
    Store::open(dir, StoreOptions::read_only_mode()).map_err(CoreError::store("Store::open"))
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory footer chains with hand-picked counters.

    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    pub(crate) struct FakeFooter {
        pub(crate) index: usize,
        pub(crate) locs: Vec<SegmentLoc>,
        pub(crate) length: u64,
    }

    impl FooterView for FakeFooter {
        fn segment_locs(&self) -> &[SegmentLoc] {
            &self.locs
        }

        fn length(&self) -> u64 {
            self.length
        }
    }

    /// Footers newest first.
    #[derive(Debug, Default)]
    pub(crate) struct FakeChain {
        pub(crate) footers: Vec<FakeFooter>,
        pub(crate) dir_size: u64,
        pub(crate) header_length: u64,
        pub(crate) visited: Mutex<Vec<usize>>,
    }

    impl FakeChain {
        pub(crate) fn new(footers: Vec<(Vec<SegmentLoc>, u64)>) -> Self {
            Self {
                footers: footers
                    .into_iter()
                    .enumerate()
                    .map(|(index, (locs, length))| FakeFooter {
                        index,
                        locs,
                        length,
                    })
                    .collect(),
                ..Self::default()
            }
        }
    }

    impl FooterSource for FakeChain {
        type Footer = FakeFooter;

        fn latest(&self) -> CoreResult<FakeFooter> {
            self.visited.lock().push(0);
            Ok(self.footers[0].clone())
        }

        fn previous(&self, footer: &FakeFooter) -> CoreResult<Option<FakeFooter>> {
            let next = footer.index + 1;
            let prev = self.footers.get(next).cloned();
            if prev.is_some() {
                self.visited.lock().push(next);
            }
            Ok(prev)
        }

        fn dir_size(&self) -> CoreResult<u64> {
            Ok(self.dir_size)
        }

        fn header_length(&self) -> u64 {
            self.header_length
        }
    }

    pub(crate) fn loc(set: u64, del: u64, key_bytes: u64, val_bytes: u64) -> SegmentLoc {
        SegmentLoc {
            tot_ops_set: set,
            tot_ops_del: del,
            tot_key_bytes: key_bytes,
            tot_val_bytes: val_bytes,
            ..SegmentLoc::default()
        }
    }
}
