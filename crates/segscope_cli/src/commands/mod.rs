//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod import;
pub mod stats;
pub mod version;

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::path::Path;

/// A value keyed by the store directory it came from, `{"<dir>": value}`.
///
/// Serialized directly so the value keeps its own key order.
pub struct Keyed<'a, T> {
    dir: &'a Path,
    value: T,
}

impl<'a, T> Keyed<'a, T> {
    /// Wraps `value` under `dir`.
    pub fn new(dir: &'a Path, value: T) -> Self {
        Self { dir, value }
    }
}

impl<T: Serialize> Serialize for Keyed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.dir.display().to_string(), &self.value)?;
        map.end()
    }
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Formats `name : value` with `name` right-aligned to `width`.
pub fn stat_line(name: &str, value: impl std::fmt::Display, width: usize) -> String {
    format!("{name:>width$} : {value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_wraps_under_dir() {
        let dirs = [Path::new("a"), Path::new("b")];
        let out: Vec<_> = dirs.iter().map(|d| Keyed::new(d, [1, 2])).collect();
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"[{"a":[1,2]},{"b":[1,2]}]"#
        );
    }

    #[test]
    fn stat_line_aligns_names() {
        assert_eq!(stat_line("num_segments", 2, 15), "   num_segments : 2");
    }
}
