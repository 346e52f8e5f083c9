//! Fragmentation estimate.

use serde::Serialize;
use tracing::warn;

/// Fragmentation of a store directory.
///
/// `fragmentation_bytes` and `fragmentation_percent` are signed: a negative
/// value means the store accounts for more bytes than the directory holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FragStats {
    /// Live payload plus header and footer framing.
    pub data_bytes: u64,
    /// Bytes the directory occupies on disk.
    pub dir_size: u64,
    /// `dir_size - data_bytes`.
    pub fragmentation_bytes: i64,
    /// `100 * fragmentation_bytes / dir_size`, truncated; 0 for an empty directory.
    pub fragmentation_percent: i64,
}

impl FragStats {
    /// Derives the fragmentation figures from the two measured sizes.
    #[must_use]
    pub fn compute(data_bytes: u64, dir_size: u64) -> Self {
        let fragmentation_bytes = saturating_i64(i128::from(dir_size) - i128::from(data_bytes));
        let fragmentation_percent = if dir_size == 0 {
            0
        } else {
            saturating_i64(i128::from(fragmentation_bytes) * 100 / i128::from(dir_size))
        };

        if fragmentation_bytes < 0 {
            warn!(
                data_bytes,
                dir_size, fragmentation_bytes, "accounted bytes exceed directory size"
            );
        }

        Self {
            data_bytes,
            dir_size,
            fragmentation_bytes,
            fragmentation_percent,
        }
    }

    /// Returns the figures as `(name, value)` pairs in name order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, i128); 4] {
        [
            ("data_bytes", i128::from(self.data_bytes)),
            ("dir_size", i128::from(self.dir_size)),
            ("fragmentation_bytes", i128::from(self.fragmentation_bytes)),
            ("fragmentation_percent", i128::from(self.fragmentation_percent)),
        ]
    }
}

fn saturating_i64(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_truncates() {
        let frag = FragStats::compute(700, 1000);
        assert_eq!(frag.fragmentation_bytes, 300);
        assert_eq!(frag.fragmentation_percent, 30);

        let frag = FragStats::compute(2, 3);
        assert_eq!(frag.fragmentation_percent, 33);
    }

    #[test]
    fn empty_directory_reports_zero_percent() {
        let frag = FragStats::compute(0, 0);
        assert_eq!(frag.fragmentation_bytes, 0);
        assert_eq!(frag.fragmentation_percent, 0);
    }

    #[test]
    fn negative_fragmentation_surfaced() {
        let frag = FragStats::compute(150, 100);
        assert_eq!(frag.fragmentation_bytes, -50);
        assert_eq!(frag.fragmentation_percent, -50);
    }

    #[test]
    fn json_field_names() {
        let json = serde_json::to_value(FragStats::compute(10, 20)).unwrap();
        assert_eq!(json["data_bytes"], 10);
        assert_eq!(json["dir_size"], 20);
        assert_eq!(json["fragmentation_bytes"], 10);
        assert_eq!(json["fragmentation_percent"], 50);
    }
}
