//! Provider documents.
//!
//! Every provider, whatever the transport, serves the same thing: a flat
//! TOML table of `file name = "url"` entries.
//!
//! ```toml
//! "v1-000000-000500-headers.seg" = "https://snapshots.example.org/v1-000000-000500-headers.seg"
//! "v1-000000-000500-headers.seg.torrent" = "https://snapshots.example.org/v1-000000-000500-headers.seg.torrent"
//! ```

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeMap;

/// File name to URL string, as served by one provider.
pub type ProviderDocument = BTreeMap<String, String>;

/// Decode a provider document, attributing any failure to `origin`.
///
/// Nested tables or non-string values reject the whole document.
pub fn decode(bytes: &[u8], origin: &str) -> Result<ProviderDocument> {
    let text = std::str::from_utf8(bytes).or_raise(|| ErrorKind::ProviderDecode(origin.to_string()))?;
    toml::from_str(text).or_raise(|| ErrorKind::ProviderDecode(origin.to_string()))
}
