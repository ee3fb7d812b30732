//! Plain HTTP(S) providers.
//!
//! The URL may carry a signed query string, so only [`crate::display_url`]
//! output is ever logged or placed in an error.

use crate::display_url;
use crate::document::{self, ProviderDocument};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use tracing::instrument;
use url::Url;

#[instrument(level = "debug", skip_all, fields(provider = %display_url(url)))]
pub(crate) async fn fetch(client: &reqwest::Client, url: &Url) -> Result<ProviderDocument> {
    let origin = display_url(url);
    let response = client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .or_raise(|| ErrorKind::ProviderUnreachable(origin.clone()))?;
    let body = response.bytes().await.or_raise(|| ErrorKind::ProviderUnreachable(origin.clone()))?;
    document::decode(&body, &origin)
}
