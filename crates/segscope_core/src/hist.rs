//! Key and value size histograms.

use crate::config::DumpOptions;
use crate::error::{CoreError, CoreResult};
use segscope_store::Footer;
use std::fmt::Write as _;

/// Bins per size histogram.
pub const NUM_BINS: usize = 10;
/// Upper bound of the first bin.
pub const FIRST_BIN: u64 = 4;
/// Each later bin boundary is this many times the previous one.
pub const BIN_GROWTH: u64 = 4;

const BAR_WIDTH: u64 = 30;

/// A histogram with geometrically growing bins.
///
/// Bin `i` covers `[ranges[i], ranges[i + 1])`; the last bin is open-ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    name: String,
    ranges: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Creates a histogram with `num_bins` bins starting at 0, `first`, then
    /// growing by `growth`.
    #[must_use]
    pub fn new(name: impl Into<String>, num_bins: usize, first: u64, growth: u64) -> Self {
        let mut ranges: Vec<u64> = Vec::with_capacity(num_bins);
        for i in 0..num_bins {
            let start = match i {
                0 => 0,
                1 => first,
                _ => ranges[i - 1].saturating_mul(growth),
            };
            ranges.push(start);
        }
        Self {
            name: name.into(),
            ranges,
            counts: vec![0; num_bins],
        }
    }

    /// Records `count` samples of `value`.
    pub fn add(&mut self, value: u64, count: u64) {
        let bin = self.ranges.partition_point(|&start| start <= value);
        if let Some(slot) = bin.checked_sub(1).and_then(|idx| self.counts.get_mut(idx)) {
            *slot += count;
        }
    }

    /// Total samples recorded.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Per-bin counts.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Renders the bins between the first and last non-empty one as text.
    #[must_use]
    pub fn render(&self) -> String {
        let total = self.total();
        let mut out = format!("{} ({} Total)\n", self.name, total);
        let Some(first) = self.counts.iter().position(|&c| c > 0) else {
            return out;
        };
        let last = self.counts.iter().rposition(|&c| c > 0).unwrap_or(first);
        let max = self.counts.iter().copied().max().unwrap_or(1);
        let width = self.ranges.last().map_or(1, |r| r.to_string().len());

        let mut running = 0;
        for bin in first..=last {
            let count = self.counts[bin];
            running += count;
            let upper = self
                .ranges
                .get(bin + 1)
                .map_or_else(|| "inf".to_string(), u64::to_string);
            let range = format!("[{:>width$} - {:>width$}]", self.ranges[bin], upper);
            let bar = "#".repeat((count * BAR_WIDTH / max) as usize);
            let _ = writeln!(
                out,
                "{range} {:>7.2}% {:>7.2}% {bar} ({count})",
                percent(count, total),
                percent(running, total),
            );
        }
        out
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

/// Key-size and value-size histograms of the live data in `footer`.
pub fn size_histograms(
    footer: &Footer,
    options: &DumpOptions,
) -> CoreResult<(Histogram, Histogram)> {
    let mut keys = Histogram::new("KeySizes(B)", NUM_BINS, FIRST_BIN, BIN_GROWTH);
    let mut values = Histogram::new("ValSizes(B)", NUM_BINS, FIRST_BIN, BIN_GROWTH);
    for (key, value) in footer.entries().map_err(CoreError::store("Footer::entries"))? {
        if !options.matches(&key) {
            continue;
        }
        keys.add(key.len() as u64, 1);
        values.add(value.len() as u64, 1);
    }
    Ok((keys, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_grow_geometrically() {
        let hist = Histogram::new("h", NUM_BINS, FIRST_BIN, BIN_GROWTH);
        assert_eq!(hist.ranges[..5], [0, 4, 16, 64, 256]);
        assert_eq!(hist.ranges.len(), NUM_BINS);
    }

    #[test]
    fn values_land_in_half_open_bins() {
        let mut hist = Histogram::new("h", NUM_BINS, FIRST_BIN, BIN_GROWTH);
        hist.add(0, 1);
        hist.add(3, 1);
        hist.add(4, 1);
        hist.add(15, 1);
        hist.add(16, 2);
        hist.add(u64::MAX, 1);

        assert_eq!(hist.counts()[0], 2);
        assert_eq!(hist.counts()[1], 2);
        assert_eq!(hist.counts()[2], 2);
        assert_eq!(hist.counts()[NUM_BINS - 1], 1);
        assert_eq!(hist.total(), 7);
    }

    #[test]
    fn render_single_bin() {
        let mut hist = Histogram::new("KeySizes(B)", NUM_BINS, FIRST_BIN, BIN_GROWTH);
        hist.add(4, 5);
        let text = hist.render();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "KeySizes(B) (5 Total)");
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("4 - "));
        assert!(lines[1].contains("16]"));
        assert!(lines[1].contains(" 100.00%  100.00% "));
        assert!(lines[1].ends_with(&format!("{} (5)", "#".repeat(30))));
    }

    #[test]
    fn render_empty() {
        let hist = Histogram::new("ValSizes(B)", NUM_BINS, FIRST_BIN, BIN_GROWTH);
        assert_eq!(hist.render(), "ValSizes(B) (0 Total)\n");
    }

    #[test]
    fn render_spans_gap_bins() {
        let mut hist = Histogram::new("h", NUM_BINS, FIRST_BIN, BIN_GROWTH);
        hist.add(1, 1);
        hist.add(100, 3);
        let text = hist.render();

        assert_eq!(text.lines().count(), 1 + 4);
        assert!(text.lines().last().unwrap().ends_with("(3)"));
    }
}
