//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The merged sources do not deserialize into a configuration.
    #[display("failed to load configuration")]
    Extract,
    /// A value deserialized but is not usable.
    #[display("invalid configuration value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(
            ErrorKind::Invalid { field: "chain", reason: "must not be empty".to_string() }.to_string(),
            "invalid configuration value for chain: must not be empty"
        );
        assert_eq!(
            ErrorKind::NotFound(PathBuf::from("/etc/seedmirror.toml")).to_string(),
            "configuration file not found: /etc/seedmirror.toml"
        );
    }
}
