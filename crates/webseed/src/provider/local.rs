use crate::document::{self, ProviderDocument};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::Path;

/// Read a provider document from the local filesystem.
pub(crate) async fn fetch(path: &Path) -> Result<ProviderDocument> {
    let origin = path.display().to_string();
    let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::ProviderUnreachable(origin.clone()))?;
    document::decode(&bytes, &origin)
}
