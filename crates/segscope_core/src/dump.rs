//! Key-value, key-version and footer dumps.

use crate::config::{DumpOptions, TraversalMode};
use crate::error::{CoreError, CoreResult};
use crate::source::{walk_chain, FooterSource};
use segscope_store::{Footer, Store};
use serde::Serialize;
use std::fmt::Write as _;

/// One dumped key with its value, rendered as text or hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyVal {
    /// The key.
    pub k: String,
    /// The value; absent in keys-only dumps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
}

impl KeyVal {
    fn render(key: &[u8], value: Option<&[u8]>, hex: bool) -> Self {
        let encode = |bytes: &[u8]| {
            if hex {
                to_hex(bytes)
            } else {
                String::from_utf8_lossy(bytes).into_owned()
            }
        };
        Self {
            k: encode(key),
            v: value.map(encode),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Every live key-value of `footer` in key order, filtered by `options`.
pub fn dump_entries(footer: &Footer, options: &DumpOptions) -> CoreResult<Vec<KeyVal>> {
    let entries = footer.entries().map_err(CoreError::store("Footer::entries"))?;
    Ok(entries
        .iter()
        .filter(|(key, _)| options.matches(key))
        .map(|(key, value)| {
            let value = (!options.keys_only).then_some(value.as_slice());
            KeyVal::render(key, value, options.hex)
        })
        .collect())
}

/// Values of `key`, newest first.
///
/// Returns `None` when the latest footer does not hold `key`. With
/// `FullChain`, older footers holding the key add one entry each.
pub fn key_versions(
    store: &Store,
    key: &[u8],
    mode: TraversalMode,
    hex: bool,
) -> CoreResult<Option<Vec<KeyVal>>> {
    let mut versions = Vec::new();
    let mut absent_in_latest = false;
    walk_chain(store, mode, |id, footer| {
        match footer.get(key).map_err(CoreError::store("Footer::get"))? {
            Some(value) => versions.push(KeyVal::render(key, Some(value.as_slice()), hex)),
            None if id == 1 => absent_in_latest = true,
            None => {}
        }
        Ok(())
    })?;
    Ok((!absent_in_latest).then_some(versions))
}

/// Footers as JSON values, newest first.
pub fn footer_dump(store: &Store, mode: TraversalMode) -> CoreResult<Vec<serde_json::Value>> {
    let mut footers = Vec::new();
    walk_chain(store, mode, |_, footer| {
        footers.push(serde_json::to_value(footer)?);
        Ok(())
    })?;
    Ok(footers)
}

/// Latest footer of `store`.
pub fn latest_footer(store: &Store) -> CoreResult<Footer> {
    store.latest()
}
