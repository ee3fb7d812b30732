//! Object-storage providers.
//!
//! Each token unlocks one Cloudflare R2 account. The document always lives
//! at a well-known bucket and key derived from the chain name.

use crate::document::{self, ProviderDocument};
use crate::error::{ErrorKind, Result};
use crate::token;
use exn::ResultExt;
use seedmirror_storage::StorageBackend;
use seedmirror_storage::backend::S3Backend;
use std::path::Path;
use tracing::instrument;

/// Object key of the provider document inside the bucket.
pub const WEBSEED_OBJECT_KEY: &str = "webseeds.toml";
/// R2 has a single pseudo-region.
const REGION: &str = "auto";

/// Bucket holding the provider document for `chain`.
pub fn bucket_name(chain: &str) -> String {
    format!("erigon-v3-snapshots-{chain}-webseed")
}

/// S3 endpoint for an R2 account.
pub fn endpoint(account_id: &str) -> String {
    format!("https://{account_id}.r2.cloudflarestorage.com")
}

#[instrument(level = "debug", skip_all, fields(bucket = %bucket_name(chain)))]
pub(crate) async fn fetch(chain: &str, token: &str) -> Result<ProviderDocument> {
    let credentials = token::resolve(token)?;
    let bucket = bucket_name(chain);
    let backend = S3Backend::new(
        "webseed-provider",
        &bucket,
        REGION,
        Some(endpoint(&credentials.account_id)),
        &credentials.access_key_id,
        credentials.access_key_secret(),
    );
    read_document(&backend).await
}

async fn read_document(backend: &S3Backend) -> Result<ProviderDocument> {
    let origin = format!("s3://{}/{WEBSEED_OBJECT_KEY}", backend.bucket());
    let bytes = backend
        .read(Path::new(WEBSEED_OBJECT_KEY))
        .await
        .or_raise(|| ErrorKind::ObjectStorage(origin.clone()))?;
    document::decode(&bytes, &origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::Client;
    use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::error::NoSuchKey;
    use aws_smithy_mocks::{mock, mock_client};

    #[test]
    fn test_bucket_and_endpoint() {
        assert_eq!(bucket_name("mainnet"), "erigon-v3-snapshots-mainnet-webseed");
        assert_eq!(bucket_name("bor-mainnet"), "erigon-v3-snapshots-bor-mainnet-webseed");
        assert_eq!(endpoint("abc123"), "https://abc123.r2.cloudflarestorage.com");
    }

    #[tokio::test]
    async fn test_read_document() {
        let rule = mock!(Client::get_object)
            .match_requests(|req| {
                req.bucket() == Some("erigon-v3-snapshots-sepolia-webseed") && req.key() == Some(WEBSEED_OBJECT_KEY)
            })
            .then_output(|| {
                GetObjectOutput::builder()
                    .body(ByteStream::from_static(b"\"c.seg.torrent\" = \"https://r2.example/c.seg.torrent\"\n"))
                    .build()
            });
        let client = mock_client!(aws_sdk_s3, [&rule]);
        let backend = S3Backend::from_client("test", client, bucket_name("sepolia"));

        let doc = read_document(&backend).await.unwrap();
        assert_eq!(doc["c.seg.torrent"], "https://r2.example/c.seg.torrent");
        assert_eq!(rule.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_document_missing() {
        let rule = mock!(Client::get_object).then_error(|| GetObjectError::NoSuchKey(NoSuchKey::builder().build()));
        let client = mock_client!(aws_sdk_s3, [&rule]);
        let backend = S3Backend::from_client("test", client, bucket_name("mainnet"));

        let err = read_document(&backend).await.unwrap_err();
        assert_eq!(
            *err,
            ErrorKind::ObjectStorage("s3://erigon-v3-snapshots-mainnet-webseed/webseeds.toml".to_string())
        );
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_token_before_network() {
        let err = fetch("mainnet", "v9:AAAA").await.unwrap_err();
        assert_eq!(*err, ErrorKind::UnsupportedCredentialVersion("v9".to_string()));
    }
}
