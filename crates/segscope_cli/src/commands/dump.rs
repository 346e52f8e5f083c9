//! Dump command implementation.

use super::{print_json, Keyed};
use segscope_core::{
    dump_entries, footer_dump, key_versions, latest_footer, open_read_only, DumpOptions,
    TraversalMode,
};
use std::path::PathBuf;

/// Dumps every live key-value of each store.
pub fn run_entries(
    dirs: &[PathBuf],
    options: &DumpOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let store = open_read_only(dir)?;
        let footer = latest_footer(&store)?;
        out.push(Keyed::new(dir, dump_entries(&footer, options)?));
    }
    print_json(&out)
}

/// Dumps the values of `key`. Stores without the key are left out.
pub fn run_key(
    key: &str,
    dirs: &[PathBuf],
    mode: TraversalMode,
    hex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::new();
    for dir in dirs {
        let store = open_read_only(dir)?;
        if let Some(versions) = key_versions(&store, key.as_bytes(), mode, hex)? {
            out.push(Keyed::new(dir, versions));
        }
    }
    print_json(&out)
}

/// Dumps the latest footer, or every footer newest first.
pub fn run_footer(dirs: &[PathBuf], mode: TraversalMode) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let store = open_read_only(dir)?;
        out.push(Keyed::new(dir, footer_dump(&store, mode)?));
    }
    print_json(&out)
}
