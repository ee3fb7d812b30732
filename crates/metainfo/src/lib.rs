//! Structural validation of `.torrent` metainfo descriptors.
//!
//! Descriptors fetched from mirrors are untrusted. Before one is written to
//! the snapshot directory it must at least decode as a bencoded metainfo
//! dictionary with an `info` section. Nothing here checks that the
//! descriptor matches the file name it was published under, or any expected
//! info-hash.

pub mod error;

use exn::ResultExt;
use serde::Deserialize;
use serde_bytes::ByteBuf;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Length of a single SHA-1 piece hash in a v1 `pieces` string.
const PIECE_HASH_LEN: usize = 20;

/// The parts of a metainfo dictionary needed to call it a descriptor.
///
/// Unknown keys are ignored so that v2 and hybrid descriptors still decode.
#[derive(Debug, Deserialize)]
struct MetaInfo {
    info: Info,
}

#[derive(Debug, Deserialize)]
struct Info {
    name: String,
    #[serde(rename = "piece length")]
    piece_length: u64,
    /// Concatenated SHA-1 piece hashes; absent in v2-only descriptors.
    #[serde(default)]
    pieces: Option<ByteBuf>,
}

impl MetaInfo {
    /// Decode a descriptor, attributing any failure to `origin`.
    fn from_bytes(bytes: &[u8], origin: &str) -> Result<Self> {
        let meta: MetaInfo =
            serde_bencode::from_bytes(bytes).or_raise(|| ErrorKind::InvalidDescriptor(origin.to_string()))?;
        if meta.info.piece_length == 0 {
            exn::bail!(ErrorKind::Malformed { origin: origin.to_string(), reason: "zero piece length" });
        }
        if let Some(pieces) = &meta.info.pieces
            && pieces.len() % PIECE_HASH_LEN != 0
        {
            exn::bail!(ErrorKind::Malformed { origin: origin.to_string(), reason: "truncated piece hashes" });
        }
        Ok(meta)
    }
}

/// Check that `bytes` is structurally a metainfo descriptor.
///
/// `origin` identifies where the bytes came from (usually the mirror URL
/// path) and is carried in the error for diagnostics.
///
/// # Examples
///
/// ```
/// let bytes = b"d4:infod6:lengthi5e4:name4:salt12:piece lengthi16384eee";
/// assert!(seedmirror_metainfo::validate(bytes, "/salt.torrent").is_ok());
/// assert!(seedmirror_metainfo::validate(b"<html>", "/salt.torrent").is_err());
/// ```
#[instrument(level = "trace", skip(bytes), fields(size = bytes.len()))]
pub fn validate(bytes: &[u8], origin: &str) -> Result<()> {
    let meta = MetaInfo::from_bytes(bytes, origin)?;
    tracing::trace!(name = %meta.info.name, piece_length = meta.info.piece_length, "Descriptor is well-formed");
    Ok(())
}
