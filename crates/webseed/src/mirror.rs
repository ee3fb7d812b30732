//! Mirror fallback downloads of `.torrent` descriptors.
//!
//! For each published descriptor missing from the snapshot directory, the
//! mirrors are tried strictly in published order and the first one that
//! serves a valid descriptor wins. A failed mirror is logged and the next
//! one is tried; a descriptor whose mirrors are all exhausted is left for the
//! next discovery cycle.

use crate::display_url;
use crate::error::{ErrorKind, Result};
use crate::merge::TorrentUrls;
use crate::policy::SkipPolicy;
use exn::ResultExt;
use futures::stream::{self, FuturesUnordered, StreamExt};
use seedmirror_storage::BackendHandle;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// No legitimate descriptor comes close to this.
pub const MAX_DESCRIPTOR_SIZE: u64 = 128 * 1024 * 1024;

/// What happened to the descriptors of one download pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Already in the snapshot directory.
    pub present: usize,
    /// Excluded by the skip policy.
    pub skipped: usize,
    /// Names that cannot be a path inside the snapshot directory.
    pub invalid: usize,
    pub downloaded: usize,
    /// Every mirror failed.
    pub exhausted: usize,
    /// Abandoned because the pass was cancelled.
    pub cancelled: usize,
}

impl FetchReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Present => self.present += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Invalid => self.invalid += 1,
            Outcome::Downloaded => self.downloaded += 1,
            Outcome::Exhausted => self.exhausted += 1,
            Outcome::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Present,
    Skipped,
    Invalid,
    Downloaded,
    Exhausted,
    Cancelled,
}

/// Fetches descriptor bytes from a single mirror, enforcing the size gate.
#[derive(Debug, Clone)]
pub struct DescriptorFetcher {
    client: reqwest::Client,
    max_size: u64,
}

impl DescriptorFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, max_size: MAX_DESCRIPTOR_SIZE }
    }

    /// Lower the size ceiling. Values above [`MAX_DESCRIPTOR_SIZE`] are clamped.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size.min(MAX_DESCRIPTOR_SIZE);
        self
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// GET `mirror` and return the body.
    ///
    /// Rejects before reading the body when the advertised length is zero or
    /// above the ceiling. Without an advertised length, the body is read in
    /// chunks and abandoned as soon as it crosses the ceiling.
    pub async fn fetch(&self, mirror: &Url) -> Result<Vec<u8>> {
        let origin = display_url(mirror);
        let mut response = self
            .client
            .get(mirror.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .or_raise(|| ErrorKind::MirrorFetch(origin.clone()))?;

        let advertised = response.content_length();
        if let Some(reason) = self.size_rejection(advertised) {
            exn::bail!(ErrorKind::MirrorSizeRejected { mirror: origin, reason });
        }

        let capacity = advertised.unwrap_or(0).min(self.max_size);
        let mut body = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        while let Some(chunk) = response.chunk().await.or_raise(|| ErrorKind::MirrorFetch(origin.clone()))? {
            if (body.len() + chunk.len()) as u64 > self.max_size {
                exn::bail!(ErrorKind::MirrorSizeRejected {
                    mirror: origin,
                    reason: format!("body exceeds {} bytes", self.max_size),
                });
            }
            body.extend_from_slice(&chunk);
        }
        if body.is_empty() {
            exn::bail!(ErrorKind::MirrorSizeRejected { mirror: origin, reason: "empty response".to_string() });
        }
        Ok(body)
    }

    fn size_rejection(&self, advertised: Option<u64>) -> Option<String> {
        match advertised {
            Some(0) => Some("empty response".to_string()),
            Some(size) if size > self.max_size => Some(format!("advertised {size} bytes, limit {}", self.max_size)),
            _ => None,
        }
    }
}

/// Drives one download pass over a published descriptor table.
#[derive(Debug, Clone)]
pub struct MirrorCoordinator {
    fetcher: DescriptorFetcher,
    skip: SkipPolicy,
}

impl MirrorCoordinator {
    pub fn new(fetcher: DescriptorFetcher, skip: SkipPolicy) -> Self {
        Self { fetcher, skip }
    }

    /// Download every descriptor in `torrents` that `target` does not have.
    ///
    /// Descriptors are processed concurrently; the mirrors of a single
    /// descriptor are tried one at a time, in order. Never fails: every
    /// per-descriptor failure is logged and counted in the report.
    #[instrument(skip_all, fields(target = target.name(), descriptors = torrents.len()))]
    pub async fn fetch_missing(
        &self,
        torrents: &TorrentUrls,
        target: &BackendHandle,
        cancel: &CancellationToken,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        let mut downloads = FuturesUnordered::new();

        for (name, mirrors) in torrents {
            match self.plan(name, target).await {
                Some(outcome) => report.record(outcome),
                None => downloads.push(self.download(name, mirrors, target, cancel)),
            }
        }
        while let Some(outcome) = downloads.next().await {
            report.record(outcome);
        }

        debug!(?report, "Descriptor download pass finished");
        report
    }

    /// Decide whether `name` needs downloading. `None` means yes.
    async fn plan(&self, name: &str, target: &BackendHandle) -> Option<Outcome> {
        let path = Path::new(name);
        match target.exists(path).await {
            Ok(true) => return Some(Outcome::Present),
            Ok(false) => {},
            Err(error) => {
                warn!(name, error = ?error, "Descriptor name cannot be stored, ignoring");
                return Some(Outcome::Invalid);
            },
        }
        if self.skip.matching(name).is_some() {
            info!(name, "Skipping reserved descriptor");
            return Some(Outcome::Skipped);
        }
        None
    }

    async fn download(
        &self,
        name: &str,
        mirrors: &[Url],
        target: &BackendHandle,
        cancel: &CancellationToken,
    ) -> Outcome {
        let successes = stream::iter(mirrors)
            .take_while(|_| futures::future::ready(!cancel.is_cancelled()))
            .then(|mirror| async move { (mirror, self.attempt(name, mirror, target, cancel).await) })
            .filter_map(|(mirror, result)| {
                futures::future::ready(match result {
                    Ok(()) => Some(mirror),
                    Err(error) => {
                        debug!(name, mirror = %display_url(mirror), error = ?error, "Mirror failed");
                        None
                    },
                })
            });
        let mut successes = std::pin::pin!(successes);

        match successes.next().await {
            Some(mirror) => {
                info!(name, mirror = %display_url(mirror), "Downloaded descriptor from webseed");
                Outcome::Downloaded
            },
            None if cancel.is_cancelled() => Outcome::Cancelled,
            None => {
                debug!(name, mirrors = mirrors.len(), "All mirrors failed");
                Outcome::Exhausted
            },
        }
    }

    async fn attempt(
        &self,
        name: &str,
        mirror: &Url,
        target: &BackendHandle,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled),
            result = self.fetcher.fetch(mirror) => result?,
        };
        seedmirror_metainfo::validate(&bytes, mirror.path())
            .or_raise(|| ErrorKind::MirrorValidation(display_url(mirror)))?;
        if cancel.is_cancelled() {
            exn::bail!(ErrorKind::Cancelled);
        }
        persist(target, name, &bytes).await
    }
}

/// Temporary name a descriptor is written under before being renamed.
fn temp_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.{}.tmp", std::process::id()))
}

/// Write `bytes` to `name` so that a reader never sees a partial descriptor.
///
/// If another writer created `name` in the meantime, that file wins and the
/// temporary is discarded.
pub(crate) async fn persist(target: &BackendHandle, name: &str, bytes: &[u8]) -> Result<()> {
    let final_path = Path::new(name);
    let temp_path = temp_path(name);

    if let Err(error) = target.write(&temp_path, bytes).await {
        discard(target, &temp_path).await;
        return Err(error.raise(ErrorKind::Persist(name.to_string())));
    }
    match target.exists(final_path).await {
        Ok(true) => {
            debug!(name, "Descriptor appeared while downloading, keeping existing file");
            discard(target, &temp_path).await;
            return Ok(());
        },
        Ok(false) => {},
        Err(error) => {
            discard(target, &temp_path).await;
            return Err(error.raise(ErrorKind::Persist(name.to_string())));
        },
    }
    if let Err(error) = target.rename(&temp_path, final_path).await {
        discard(target, &temp_path).await;
        return Err(error.raise(ErrorKind::Persist(name.to_string())));
    }
    Ok(())
}

async fn discard(target: &BackendHandle, path: &Path) {
    if let Ok(true) = target.exists(path).await
        && let Err(error) = target.delete(path).await
    {
        warn!(path = %path.display(), error = ?error, "Failed to remove temporary descriptor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedmirror_storage::backend::{LocalBackend, MockBackend};
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DESCRIPTOR: &[u8] = b"d4:infod6:lengthi5e4:name5:a.seg12:piece lengthi16384eee";

    fn mirror(server: &MockServer, route: &str) -> Url {
        Url::parse(&format!("{}{route}", server.uri())).unwrap()
    }

    fn table(entries: Vec<(&str, Vec<Url>)>) -> TorrentUrls {
        entries.into_iter().map(|(name, urls)| (name.to_string(), urls)).collect()
    }

    fn coordinator() -> MirrorCoordinator {
        MirrorCoordinator::new(DescriptorFetcher::new(reqwest::Client::new()), SkipPolicy::default())
    }

    async fn serve(server: &MockServer, route: &str, response: ResponseTemplate, hits: u64) {
        Mock::given(method("GET")).and(path(route)).respond_with(response).expect(hits).mount(server).await;
    }

    #[tokio::test]
    async fn test_fallback_in_order() {
        let server = MockServer::start().await;
        serve(&server, "/broken", ResponseTemplate::new(500), 1).await;
        serve(&server, "/html", ResponseTemplate::new(200).set_body_string("<html>nope</html>"), 1).await;
        serve(&server, "/good", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 1).await;
        serve(&server, "/never", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 0).await;

        let mirrors = ["/broken", "/html", "/good", "/never"].iter().map(|r| mirror(&server, r)).collect();
        let mock = Arc::new(MockBackend::default());
        let target: BackendHandle = mock.clone();
        let report = coordinator()
            .fetch_missing(&table(vec![("a.seg.torrent", mirrors)]), &target, &CancellationToken::new())
            .await;

        assert_eq!(report.downloaded, 1);
        assert_eq!(mock.paths().await, [PathBuf::from("a.seg.torrent")]);
        assert_eq!(target.read(Path::new("a.seg.torrent")).await.unwrap(), DESCRIPTOR);
    }

    #[tokio::test]
    async fn test_present_descriptor_is_not_fetched() {
        let server = MockServer::start().await;
        serve(&server, "/a.seg.torrent", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 0).await;

        let target: BackendHandle = Arc::new(MockBackend::with_files([("a.seg.torrent", b"existing".to_vec())]));
        let report = coordinator()
            .fetch_missing(
                &table(vec![("a.seg.torrent", vec![mirror(&server, "/a.seg.torrent")])]),
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report, FetchReport { present: 1, ..Default::default() });
        assert_eq!(target.read(Path::new("a.seg.torrent")).await.unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_reserved_descriptor_is_skipped() {
        let server = MockServer::start().await;
        serve(&server, "/commitment.0-64.v.torrent", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 0).await;

        let mock = Arc::new(MockBackend::default());
        let target: BackendHandle = mock.clone();
        let report = coordinator()
            .fetch_missing(
                &table(vec![("commitment.0-64.v.torrent", vec![mirror(&server, "/commitment.0-64.v.torrent")])]),
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report, FetchReport { skipped: 1, ..Default::default() });
        assert!(mock.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_advertised_length_is_rejected() {
        let server = MockServer::start().await;
        serve(&server, "/big", ResponseTemplate::new(200).set_body_bytes(vec![b'd'; 64]), 1).await;

        let fetcher = DescriptorFetcher::new(reqwest::Client::new()).with_max_size(32);
        let err = fetcher.fetch(&mirror(&server, "/big")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::MirrorSizeRejected { .. }), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_body_just_over_default_ceiling_is_rejected() {
        let server = MockServer::start().await;
        let body = vec![b'd'; MAX_DESCRIPTOR_SIZE as usize + 1];
        serve(&server, "/huge.torrent", ResponseTemplate::new(200).set_body_bytes(body), 1).await;

        let fetcher = DescriptorFetcher::new(reqwest::Client::new());
        let url = mirror(&server, "/huge.torrent");
        let err = fetcher.fetch(&url).await.unwrap_err();
        let expected = ErrorKind::MirrorSizeRejected {
            mirror: display_url(&url),
            reason: format!("advertised {} bytes, limit {MAX_DESCRIPTOR_SIZE}", MAX_DESCRIPTOR_SIZE + 1),
        };
        assert_eq!(*err, expected);
    }

    #[tokio::test]
    async fn test_empty_body_is_rejected() {
        let server = MockServer::start().await;
        serve(&server, "/empty", ResponseTemplate::new(200), 1).await;

        let fetcher = DescriptorFetcher::new(reqwest::Client::new());
        let err = fetcher.fetch(&mirror(&server, "/empty")).await.unwrap_err();
        let expected = ErrorKind::MirrorSizeRejected {
            mirror: display_url(&mirror(&server, "/empty")),
            reason: "empty response".to_string(),
        };
        assert_eq!(*err, expected);
    }

    #[test]
    fn test_size_ceiling_is_clamped() {
        let fetcher = DescriptorFetcher::new(reqwest::Client::new()).with_max_size(u64::MAX);
        assert_eq!(fetcher.max_size(), MAX_DESCRIPTOR_SIZE);
        assert_eq!(fetcher.size_rejection(Some(64 * 1024 * 1024)), None);
        assert_eq!(fetcher.size_rejection(Some(MAX_DESCRIPTOR_SIZE)), None);
        assert!(fetcher.size_rejection(Some(MAX_DESCRIPTOR_SIZE + 1)).is_some());
        assert!(fetcher.size_rejection(Some(0)).is_some());
        assert_eq!(fetcher.size_rejection(None), None);
    }

    #[tokio::test]
    async fn test_all_mirrors_exhausted() {
        let server = MockServer::start().await;
        serve(&server, "/one", ResponseTemplate::new(404), 1).await;
        serve(&server, "/two", ResponseTemplate::new(200).set_body_string("garbage"), 1).await;

        let mock = Arc::new(MockBackend::default());
        let target: BackendHandle = mock.clone();
        let report = coordinator()
            .fetch_missing(
                &table(vec![("a.seg.torrent", vec![mirror(&server, "/one"), mirror(&server, "/two")])]),
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report, FetchReport { exhausted: 1, ..Default::default() });
        assert!(mock.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_moves_to_next_mirror() {
        let server = MockServer::start().await;
        serve(&server, "/first", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 1).await;
        serve(&server, "/second", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 1).await;

        let mock = Arc::new(MockBackend::default().with_failing_writes(1));
        let target: BackendHandle = mock.clone();
        let report = coordinator()
            .fetch_missing(
                &table(vec![("a.seg.torrent", vec![mirror(&server, "/first"), mirror(&server, "/second")])]),
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report.downloaded, 1);
        assert_eq!(mock.paths().await, [PathBuf::from("a.seg.torrent")]);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        serve(&server, "/a", ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR), 0).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let target: BackendHandle = Arc::new(MockBackend::default());
        let report = coordinator()
            .fetch_missing(&table(vec![("a.seg.torrent", vec![mirror(&server, "/a")])]), &target, &cancel)
            .await;

        assert_eq!(report, FetchReport { cancelled: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_cancelled_during_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(DESCRIPTOR).set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let mock = Arc::new(MockBackend::default());
        let target: BackendHandle = mock.clone();
        let report = coordinator()
            .fetch_missing(&table(vec![("a.seg.torrent", vec![mirror(&server, "/slow")])]), &target, &cancel)
            .await;

        assert_eq!(report, FetchReport { cancelled: 1, ..Default::default() });
        assert!(mock.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_is_ignored() {
        let target: BackendHandle = Arc::new(MockBackend::default());
        let report = coordinator()
            .fetch_missing(
                &table(vec![("../escape.torrent", vec![Url::parse("https://unused.invalid/x").unwrap()])]),
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report, FetchReport { invalid: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_persist_to_local_directory_leaves_no_temporaries() {
        let dir = TempDir::new().unwrap();
        let target: BackendHandle = Arc::new(LocalBackend::new("snapshots", dir.path()).unwrap());

        persist(&target, "a.seg.torrent", DESCRIPTOR).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["a.seg.torrent"]);
        assert_eq!(std::fs::read(dir.path().join("a.seg.torrent")).unwrap(), DESCRIPTOR);
    }

    #[tokio::test]
    async fn test_persist_keeps_existing_file() {
        let mock = Arc::new(MockBackend::with_files([("a.seg.torrent", b"first".to_vec())]));
        let target: BackendHandle = mock.clone();

        persist(&target, "a.seg.torrent", DESCRIPTOR).await.unwrap();

        assert_eq!(mock.paths().await, [PathBuf::from("a.seg.torrent")]);
        assert_eq!(target.read(Path::new("a.seg.torrent")).await.unwrap(), b"first");
    }
}
