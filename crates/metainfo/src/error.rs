//! Metainfo Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A metainfo error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metainfo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant names the mirror (or file) the bytes came from, so a log
/// line alone is enough to identify the bad mirror.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes are not a bencoded metainfo dictionary.
    #[display("invalid bytes received from {_0}")]
    InvalidDescriptor(#[error(not(source))] String),
    /// The bytes decode, but a required field has an impossible value.
    #[display("malformed descriptor from {origin}: {reason}")]
    Malformed {
        /// Where the bytes came from.
        origin: String,
        /// Which structural rule was broken.
        reason: &'static str,
    },
}
