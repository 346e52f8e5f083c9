//! Compact command implementation.

use super::{print_json, Keyed};
use segscope_core::compact_dir;
use std::path::PathBuf;
use tracing::debug;

/// Runs the compact command.
pub fn run(dirs: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let report = compact_dir(dir)?;
        debug!(
            dir = %dir.display(),
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "compacted"
        );
        out.push(Keyed::new(dir, "compaction done."));
    }
    print_json(&out)
}
