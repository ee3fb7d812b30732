//! The published discovery result.
//!
//! A discovery pass builds a fresh [`Snapshot`] off to the side and swaps it
//! in with one write. Readers clone the `Arc` and never observe a half-merged
//! table.

use crate::merge::{Merged, TorrentUrls, WebSeedUrls};
use std::sync::{Arc, PoisonError, RwLock};

/// One consistent view of both tables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    web_seeds: WebSeedUrls,
    torrents: TorrentUrls,
}

impl Snapshot {
    pub fn web_seeds(&self) -> &WebSeedUrls {
        &self.web_seeds
    }

    pub fn torrents(&self) -> &TorrentUrls {
        &self.torrents
    }
}

impl From<Merged> for Snapshot {
    fn from(merged: Merged) -> Self {
        Self { web_seeds: merged.web_seeds, torrents: merged.torrents }
    }
}

#[derive(Debug, Default)]
pub struct PublishedState {
    current: RwLock<Arc<Snapshot>>,
}

impl PublishedState {
    /// Replace both tables at once.
    pub fn publish(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// The current snapshot. Cheap; holds no lock once returned.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Webseed URLs published for a payload file, in provider order.
    pub fn by_file_name(&self, name: &str) -> Option<Vec<String>> {
        self.snapshot().web_seeds.get(name).cloned()
    }

    /// Every published descriptor with its mirrors.
    pub fn torrent_urls(&self) -> TorrentUrls {
        self.snapshot().torrents.clone()
    }

    /// Number of payload files with at least one webseed URL.
    pub fn len(&self) -> usize {
        self.snapshot().web_seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
