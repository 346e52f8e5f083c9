//! Per-footer statistics over a store's footer chain.

use crate::config::TraversalMode;
use crate::error::CoreResult;
use crate::frag::FragStats;
use crate::source::{walk_chain, FooterSource, FooterView};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

/// A single statistic: a scalar or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum StatValue {
    /// A count or byte total.
    Scalar(u64),
    /// Per-segment values, oldest segment first.
    List(Vec<u64>),
}

impl std::fmt::Display for StatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::List(values) => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Totals over the segments of one footer.
///
/// Fields are declared in name order so JSON output is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FooterStats {
    /// Segments in the footer.
    pub num_segments: u64,
    /// Key plus value bytes of each segment. Recorded for the latest footer only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_bytes: Option<Vec<u64>>,
    /// Sum of key bytes.
    pub total_key_bytes: u64,
    /// Sum of delete operations.
    pub total_ops_del: u64,
    /// Sum of set operations.
    pub total_ops_set: u64,
    /// Sum of value bytes.
    pub total_val_bytes: u64,
}

impl FooterStats {
    /// Accumulates the segment records of `footer`.
    pub fn from_footer(footer: &impl FooterView, with_segment_bytes: bool) -> Self {
        let locs = footer.segment_locs();
        let mut stats = Self {
            num_segments: locs.len() as u64,
            segment_bytes: with_segment_bytes.then(|| Vec::with_capacity(locs.len())),
            ..Self::default()
        };
        for loc in locs {
            stats.total_ops_set += loc.tot_ops_set;
            stats.total_ops_del += loc.tot_ops_del;
            stats.total_key_bytes += loc.tot_key_bytes;
            stats.total_val_bytes += loc.tot_val_bytes;
            if let Some(bytes) = stats.segment_bytes.as_mut() {
                bytes.push(loc.payload_bytes());
            }
        }
        stats
    }

    /// Returns the statistics keyed by name, in name order.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, StatValue> {
        let mut map = BTreeMap::new();
        map.insert("num_segments".into(), StatValue::Scalar(self.num_segments));
        if let Some(bytes) = &self.segment_bytes {
            map.insert("segment_bytes".into(), StatValue::List(bytes.clone()));
        }
        map.insert("total_key_bytes".into(), StatValue::Scalar(self.total_key_bytes));
        map.insert("total_ops_del".into(), StatValue::Scalar(self.total_ops_del));
        map.insert("total_ops_set".into(), StatValue::Scalar(self.total_ops_set));
        map.insert("total_val_bytes".into(), StatValue::Scalar(self.total_val_bytes));
        map
    }
}

/// Footer statistics keyed `Footer_1` (latest), `Footer_2`, ...
///
/// Serializes as a JSON object in recency order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedStats {
    footers: Vec<FooterStats>,
}

impl AggregatedStats {
    /// Name of the footer with 1-based recency id `id`.
    #[must_use]
    pub fn footer_name(id: usize) -> String {
        format!("Footer_{id}")
    }

    /// Returns the stats of the footer with recency id `id`.
    #[must_use]
    pub fn get(&self, id: usize) -> Option<&FooterStats> {
        id.checked_sub(1).and_then(|idx| self.footers.get(idx))
    }

    /// Number of footers aggregated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.footers.len()
    }

    /// Returns whether no footer was aggregated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.footers.is_empty()
    }

    /// Iterates `(name, stats)` newest first.
    pub fn iter(&self) -> impl Iterator<Item = (String, &FooterStats)> {
        self.footers
            .iter()
            .enumerate()
            .map(|(idx, stats)| (Self::footer_name(idx + 1), stats))
    }
}

impl Serialize for AggregatedStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.footers.len()))?;
        for (name, stats) in self.iter() {
            map.serialize_entry(&name, stats)?;
        }
        map.end()
    }
}

/// Aggregates footer statistics from a [`FooterSource`].
pub struct SnapshotAggregator<'a, S> {
    source: &'a S,
}

impl<'a, S: FooterSource> SnapshotAggregator<'a, S> {
    /// Creates an aggregator over `source`.
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Collects per-footer totals, latest footer only or the whole chain.
    pub fn aggregate(&self, mode: TraversalMode) -> CoreResult<AggregatedStats> {
        let mut stats = AggregatedStats::default();
        walk_chain(self.source, mode, |id, footer| {
            stats.footers.push(FooterStats::from_footer(footer, id == 1));
            Ok(())
        })?;
        debug!(footers = stats.len(), ?mode, "aggregated footer stats");
        Ok(stats)
    }

    /// Estimates fragmentation: on-disk bytes not explained by live payload
    /// plus header and footer framing across the whole chain.
    pub fn fragmentation(&self) -> CoreResult<FragStats> {
        let header_length = self.source.header_length();
        let mut data_bytes = 0u64;
        walk_chain(self.source, TraversalMode::FullChain, |id, footer| {
            if id == 1 {
                data_bytes += footer
                    .segment_locs()
                    .iter()
                    .map(|loc| loc.payload_bytes())
                    .sum::<u64>();
            }
            data_bytes += header_length + footer.length();
            Ok(())
        })?;

        let dir_size = self.source.dir_size()?;
        Ok(FragStats::compute(data_bytes, dir_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::{loc, FakeChain};

    #[test]
    fn independent_per_footer_totals() {
        let chain = FakeChain::new(vec![
            (vec![loc(5, 0, 20, 20)], 100),
            (vec![loc(5, 0, 20, 20)], 80),
        ]);
        let stats = SnapshotAggregator::new(&chain)
            .aggregate(TraversalMode::FullChain)
            .unwrap();

        assert_eq!(stats.len(), 2);
        for id in [1, 2] {
            let footer = stats.get(id).unwrap();
            assert_eq!(footer.total_ops_set, 5);
            assert_eq!(footer.total_ops_del, 0);
            assert_eq!(footer.total_key_bytes, 20);
            assert_eq!(footer.total_val_bytes, 20);
        }
        assert_eq!(stats.get(1).unwrap().segment_bytes, Some(vec![40]));
        assert_eq!(stats.get(2).unwrap().segment_bytes, None);
    }

    #[test]
    fn latest_only_yields_footer_1() {
        let chain = FakeChain::new(vec![
            (vec![loc(3, 1, 12, 9), loc(2, 0, 8, 8)], 100),
            (vec![loc(3, 1, 12, 9)], 80),
        ]);
        let stats = SnapshotAggregator::new(&chain)
            .aggregate(TraversalMode::LatestOnly)
            .unwrap();

        assert_eq!(stats.len(), 1);
        let latest = stats.get(1).unwrap();
        assert_eq!(latest.num_segments, 2);
        assert_eq!(latest.total_ops_set, 5);
        assert_eq!(latest.total_ops_del, 1);
        assert_eq!(latest.segment_bytes, Some(vec![21, 16]));
        assert!(stats.get(0).is_none());
    }

    #[test]
    fn json_keeps_recency_order_past_nine() {
        let chain = FakeChain::new((0..11).map(|_| (vec![], 1)).collect());
        let stats = SnapshotAggregator::new(&chain)
            .aggregate(TraversalMode::FullChain)
            .unwrap();

        let json = serde_json::to_string(&stats).unwrap();
        let pos = |name: &str| json.find(&format!("\"{name}\"")).unwrap();
        assert!(pos("Footer_1") < pos("Footer_2"));
        assert!(pos("Footer_9") < pos("Footer_10"));
        assert!(pos("Footer_10") < pos("Footer_11"));
    }

    #[test]
    fn fragmentation_counts_framing_per_footer() {
        let mut chain = FakeChain::new(vec![
            (vec![loc(5, 0, 20, 20)], 100),
            (vec![loc(5, 0, 20, 20)], 80),
        ]);
        chain.header_length = 32;
        chain.dir_size = 400;

        let frag = SnapshotAggregator::new(&chain).fragmentation().unwrap();
        assert_eq!(frag.data_bytes, 40 + (32 + 100) + (32 + 80));
        assert_eq!(frag.dir_size, 400);
        assert_eq!(frag.fragmentation_bytes, 400 - 284);
        assert_eq!(frag.fragmentation_percent, 29);
    }

    #[test]
    fn stat_value_display() {
        assert_eq!(StatValue::Scalar(7).to_string(), "7");
        assert_eq!(StatValue::List(vec![40, 8]).to_string(), "[40 8]");
    }
}
