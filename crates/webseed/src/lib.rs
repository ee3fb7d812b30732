//! Webseed discovery for snapshot files.
//!
//! Providers publish flat `file name = "url"` documents. [`WebSeeds`] fetches
//! every provider document, merges them into two tables, and publishes them
//! atomically:
//! - webseed URLs for payload files, handed to the swarm engine as extra
//!   HTTP sources;
//! - mirror URLs for `.torrent` descriptors, used to bootstrap descriptors
//!   missing from the snapshot directory.
//!
//! # Examples
//!
//! ```no_run
//! use seedmirror_webseed::{Providers, WebSeedOptions, WebSeeds};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> seedmirror_webseed::error::Result<()> {
//! let client = WebSeeds::http_client(std::time::Duration::from_secs(30))?;
//! let webseeds = WebSeeds::new(WebSeedOptions::new("mainnet"), client);
//! let providers = Providers {
//!     http: vec!["https://snapshots.example.org/webseeds.toml".parse().unwrap()],
//!     ..Default::default()
//! };
//! let cancel = CancellationToken::new();
//! webseeds.discover(&providers, &cancel).await;
//! let report = webseeds.fetch_missing("/var/lib/snapshots".as_ref(), &cancel).await?;
//! println!("{} descriptors downloaded", report.downloaded);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod merge;
pub mod mirror;
pub mod policy;
pub mod provider;
pub mod state;
pub mod token;

pub use crate::merge::{TorrentUrls, WebSeedUrls};
pub use crate::mirror::{FetchReport, MAX_DESCRIPTOR_SIZE};
pub use crate::policy::{SkipPolicy, SkipRule};
pub use crate::provider::{DiscoveryReport, Providers};
pub use crate::state::{PublishedState, Snapshot};

use crate::error::{ErrorKind, Result};
use crate::mirror::{DescriptorFetcher, MirrorCoordinator};
use exn::ResultExt;
use seedmirror_storage::BackendHandle;
use seedmirror_storage::backend::LocalBackend;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use url::Url;

/// Render a URL for logs and errors without credentials, query or fragment.
///
/// Provider and mirror URLs are often pre-signed.
pub fn display_url(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.set_fragment(None);
    // Only fails for cannot-be-a-base URLs, which carry no credentials.
    let _ = shown.set_username("");
    let _ = shown.set_password(None);
    shown.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSeedOptions {
    /// Chain identifier used to derive the object-storage bucket.
    pub chain: String,
    /// Download missing `.torrent` descriptors from their mirrors.
    pub download_descriptors: bool,
    /// Per-descriptor size ceiling, never above [`MAX_DESCRIPTOR_SIZE`].
    pub max_descriptor_size: u64,
    pub skip: SkipPolicy,
}

impl WebSeedOptions {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            download_descriptors: true,
            max_descriptor_size: MAX_DESCRIPTOR_SIZE,
            skip: SkipPolicy::default(),
        }
    }
}

/// Owner of the published webseed tables.
pub struct WebSeeds {
    options: WebSeedOptions,
    client: reqwest::Client,
    state: Arc<PublishedState>,
    coordinator: MirrorCoordinator,
}

impl WebSeeds {
    pub fn new(options: WebSeedOptions, client: reqwest::Client) -> Self {
        let fetcher = DescriptorFetcher::new(client.clone()).with_max_size(options.max_descriptor_size);
        let coordinator = MirrorCoordinator::new(fetcher, options.skip.clone());
        Self { options, client, state: Arc::new(PublishedState::default()), coordinator }
    }

    /// HTTP client suitable for providers and mirrors.
    pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::HttpClient)
    }

    /// Publish into an existing state, e.g. one already shared with readers.
    pub fn with_state(mut self, state: Arc<PublishedState>) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &Arc<PublishedState> {
        &self.state
    }

    pub fn options(&self) -> &WebSeedOptions {
        &self.options
    }

    /// Fetch every provider, merge, and publish the result.
    ///
    /// Never fails: unreachable or malformed providers contribute nothing.
    /// The published state is replaced even when every provider failed.
    #[instrument(skip_all, fields(chain = %self.options.chain))]
    pub async fn discover(&self, providers: &Providers, cancel: &CancellationToken) -> DiscoveryReport {
        let (documents, mut report) = provider::collect(&self.client, &self.options.chain, providers, cancel).await;
        let merged = merge::merge(&documents);
        report.web_seeds = merged.web_seeds.len();
        report.torrents = merged.torrents.len();
        report.dropped_urls = merged.dropped;

        self.state.publish(merged.into());
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            web_seeds = report.web_seeds,
            torrents = report.torrents,
            "Published webseed discovery"
        );
        report
    }

    /// Download missing descriptors into the local snapshot directory.
    ///
    /// Only fails if `root_dir` cannot be used as a snapshot directory.
    pub async fn fetch_missing(&self, root_dir: &Path, cancel: &CancellationToken) -> Result<FetchReport> {
        let target: BackendHandle = Arc::new(
            LocalBackend::new("snapshots", root_dir).or_raise(|| ErrorKind::Persist(root_dir.display().to_string()))?,
        );
        Ok(self.fetch_missing_into(&target, cancel).await)
    }

    /// Download missing descriptors into any storage backend.
    pub async fn fetch_missing_into(&self, target: &BackendHandle, cancel: &CancellationToken) -> FetchReport {
        if !self.options.download_descriptors {
            return FetchReport::default();
        }
        let snapshot = self.state.snapshot();
        if snapshot.torrents().is_empty() {
            return FetchReport::default();
        }
        self.coordinator.fetch_missing(snapshot.torrents(), target, cancel).await
    }

    /// Webseed URLs for a payload file.
    pub fn by_file_name(&self, name: &str) -> Option<Vec<String>> {
        self.state.by_file_name(name)
    }

    pub fn torrent_urls(&self) -> TorrentUrls {
        self.state.torrent_urls()
    }

    /// Number of payload files with webseeds.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}
