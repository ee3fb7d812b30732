//! Webseed Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! None of these ever escape a discovery or download pass: a failed
//! provider or mirror is logged and skipped. They exist so that the log
//! line says *which* provider or mirror failed, and why.

use derive_more::{Display, Error};

/// A webseed error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for webseed operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Provider Errors
/// - [`ErrorKind::ProviderUnreachable`]
/// - [`ErrorKind::ProviderDecode`]
/// - [`ErrorKind::CredentialFormat`]
/// - [`ErrorKind::UnsupportedCredentialVersion`]
/// - [`ErrorKind::ObjectStorage`]
///
/// ### Mirror Errors
/// - [`ErrorKind::MirrorFetch`]
/// - [`ErrorKind::MirrorSizeRejected`]
/// - [`ErrorKind::MirrorValidation`]
/// - [`ErrorKind::Persist`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure, timeout, or non-success status from an HTTP provider.
    #[display("provider unreachable: {_0}")]
    ProviderUnreachable(#[error(not(source))] String),
    /// The provider answered, but not with a flat name to URL document.
    #[display("invalid provider document from {_0}")]
    ProviderDecode(#[error(not(source))] String),
    /// Mirror token does not have the expected shape.
    #[display("mirror token has invalid format, expecting '{_0}'")]
    CredentialFormat(#[error(not(source))] &'static str),
    /// Mirror token uses a version this build does not understand.
    #[display("mirror token version not supported: {_0}")]
    UnsupportedCredentialVersion(#[error(not(source))] String),
    /// Object-storage client setup or GET failed.
    #[display("object storage provider failed: {_0}")]
    ObjectStorage(#[error(not(source))] String),
    /// Network failure or non-success status from a descriptor mirror.
    #[display("mirror fetch failed: {_0}")]
    MirrorFetch(#[error(not(source))] String),
    /// The mirror's response is empty or larger than the descriptor ceiling.
    #[display("mirror {mirror} rejected: {reason}")]
    MirrorSizeRejected {
        /// Mirror URL, without query string.
        mirror: String,
        /// Human-readable size complaint.
        reason: String,
    },
    /// The mirror served bytes that are not a descriptor.
    #[display("invalid descriptor from mirror {_0}")]
    MirrorValidation(#[error(not(source))] String),
    /// Writing the descriptor into the snapshot directory failed.
    #[display("failed to persist descriptor {_0}")]
    Persist(#[error(not(source))] String),
    /// The HTTP client could not be constructed.
    #[display("failed to build HTTP client")]
    HttpClient,
    /// The caller cancelled the pass.
    #[display("cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::UnsupportedCredentialVersion("v2".to_string()).to_string(),
            "mirror token version not supported: v2"
        );
        assert_eq!(
            ErrorKind::MirrorSizeRejected {
                mirror: "https://a.example/x.torrent".to_string(),
                reason: "empty response".to_string()
            }
            .to_string(),
            "mirror https://a.example/x.torrent rejected: empty response"
        );
    }
}
