//! Version command implementation.

use segscope_store::FORMAT_VERSION;

/// Tool and store format version, one line.
pub fn banner() -> String {
    format!(
        "segscope v{} (store format version: {})",
        env!("CARGO_PKG_VERSION"),
        FORMAT_VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_names_both_versions() {
        let banner = banner();
        assert!(banner.starts_with("segscope v"));
        assert!(banner.ends_with(&format!("format version: {FORMAT_VERSION})")));
    }
}
