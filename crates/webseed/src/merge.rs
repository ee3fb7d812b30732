//! Folding provider documents into the two published tables.

use crate::document::ProviderDocument;
use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

/// Names ending with this are descriptors; everything else is a payload file.
pub const TORRENT_SUFFIX: &str = ".torrent";

/// Payload file name to webseed URL strings, in provider order.
pub type WebSeedUrls = BTreeMap<String, Vec<String>>;
/// Descriptor file name to mirror URLs, in provider order.
pub type TorrentUrls = BTreeMap<String, Vec<Url>>;

/// Result of folding every successfully fetched document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Merged {
    pub web_seeds: WebSeedUrls,
    pub torrents: TorrentUrls,
    /// Descriptor entries whose URL did not parse.
    pub dropped: usize,
}

/// Classify and append every entry of every document.
///
/// Entries are appended, never overwritten: a name served by several
/// providers ends up with several URLs, ordered by provider visit order.
/// Duplicates are kept.
pub fn merge<'a>(documents: impl IntoIterator<Item = &'a ProviderDocument>) -> Merged {
    let mut merged = Merged::default();
    for document in documents {
        for (name, value) in document {
            if !name.ends_with(TORRENT_SUFFIX) {
                merged.web_seeds.entry(name.clone()).or_default().push(value.clone());
                continue;
            }
            match Url::parse(value) {
                Ok(url) => merged.torrents.entry(name.clone()).or_default().push(url),
                Err(error) => {
                    warn!(name, %error, "Dropping unparseable descriptor URL");
                    merged.dropped += 1;
                },
            }
        }
    }
    merged
}
