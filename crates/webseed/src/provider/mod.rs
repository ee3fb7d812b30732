//! Provider documents come from three places, visited in a fixed order:
//! HTTP(S) URLs, then object-storage tokens, then local files.
//!
//! A provider that fails is logged and skipped. Remote providers are not
//! started once the pass is cancelled; local files are always read.

mod http;
mod local;
pub mod object_storage;

use crate::display_url;
use crate::document::ProviderDocument;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

/// Every configured provider, grouped by transport.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Providers {
    pub http: Vec<Url>,
    /// Opaque `v1:` mirror tokens.
    pub object_storage: Vec<String>,
    pub local: Vec<PathBuf>,
}

impl Providers {
    /// All providers in visit order.
    pub fn iter(&self) -> impl Iterator<Item = Provider<'_>> {
        self.http
            .iter()
            .map(Provider::Http)
            .chain(self.object_storage.iter().map(|token| Provider::ObjectStorage(token)))
            .chain(self.local.iter().map(|path| Provider::Local(path)))
    }

    pub fn len(&self) -> usize {
        self.http.len() + self.object_storage.len() + self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Provider<'a> {
    Http(&'a Url),
    ObjectStorage(&'a str),
    Local(&'a Path),
}

impl Provider<'_> {
    /// Remote providers are skipped after cancellation.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::Local(_))
    }

    /// Loggable identity. Never includes a token or a signed query string.
    pub fn label(&self, chain: &str) -> String {
        match self {
            Self::Http(url) => display_url(url),
            Self::ObjectStorage(_) => format!("s3://{}", object_storage::bucket_name(chain)),
            Self::Local(path) => path.display().to_string(),
        }
    }
}

/// Per-pass provider tallies plus the size of what was published.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Providers actually attempted.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Remote providers not attempted because the pass was cancelled.
    pub cancelled: usize,
    /// Payload files with at least one webseed URL.
    pub web_seeds: usize,
    /// Descriptors with at least one mirror.
    pub torrents: usize,
    /// Descriptor entries dropped for an unparseable URL.
    pub dropped_urls: usize,
}

/// Fetch every provider in order, returning the documents that decoded.
#[instrument(skip_all, fields(chain = chain, providers = providers.len()))]
pub(crate) async fn collect(
    client: &reqwest::Client,
    chain: &str,
    providers: &Providers,
    cancel: &CancellationToken,
) -> (Vec<ProviderDocument>, DiscoveryReport) {
    let mut documents = Vec::with_capacity(providers.len());
    let mut report = DiscoveryReport::default();

    for provider in providers.iter() {
        if provider.is_remote() && cancel.is_cancelled() {
            report.cancelled += 1;
            continue;
        }
        report.attempted += 1;
        match fetch(client, chain, provider).await {
            Ok(document) => {
                if let Provider::Local(path) = provider {
                    info!(path = %path.display(), entries = document.len(), "Using local webseed document");
                }
                report.succeeded += 1;
                documents.push(document);
            },
            Err(error) => {
                debug!(provider = provider.label(chain), error = ?error, "Provider failed");
                report.failed += 1;
            },
        }
    }

    (documents, report)
}

async fn fetch(client: &reqwest::Client, chain: &str, provider: Provider<'_>) -> Result<ProviderDocument> {
    match provider {
        Provider::Http(url) => http::fetch(client, url).await,
        Provider::ObjectStorage(token) => object_storage::fetch(chain, token).await,
        Provider::Local(path) => local::fetch(path).await,
    }
}
