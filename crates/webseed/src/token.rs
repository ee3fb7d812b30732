//! Opaque mirror tokens for the object-storage provider.
//!
//! A token has the shape `v1:<base64>` where the payload decodes to
//! `<account-id>:<access-key-id>:<access-key-secret>`. Whitespace around
//! every component is ignored.

use crate::error::{ErrorKind, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use exn::ResultExt;
use std::fmt;
use std::str::FromStr;

/// The only token version understood.
pub const SUPPORTED_VERSION: &str = "v1";

const TOKEN_FORMAT: &str = "version:base64_payload";
const PAYLOAD_FORMAT: &str = "account_id:access_key_id:access_key_secret";

/// Credentials recovered from a mirror token.
#[derive(Clone, PartialEq, Eq)]
pub struct MirrorCredentials {
    pub account_id: String,
    pub access_key_id: String,
    access_key_secret: String,
}

impl MirrorCredentials {
    pub fn access_key_secret(&self) -> &str {
        &self.access_key_secret
    }
}

impl fmt::Debug for MirrorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorCredentials")
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

impl FromStr for MirrorCredentials {
    type Err = crate::error::Error;

    fn from_str(token: &str) -> Result<Self> {
        resolve(token)
    }
}

/// Turn an opaque token into credentials.
///
/// Fails with [`ErrorKind::CredentialFormat`] when the token or its payload
/// do not split into the expected number of parts. The token's part count is
/// checked before its version, which must be `v1` or the result is
/// [`ErrorKind::UnsupportedCredentialVersion`].
pub fn resolve(token: &str) -> Result<MirrorCredentials> {
    let parts: Vec<&str> = token.split(':').collect();
    let [version, payload] = parts.as_slice() else {
        exn::bail!(ErrorKind::CredentialFormat(TOKEN_FORMAT));
    };
    let version = version.trim();
    if version != SUPPORTED_VERSION {
        exn::bail!(ErrorKind::UnsupportedCredentialVersion(version.to_string()));
    }

    let decoded = STANDARD.decode(payload.trim()).or_raise(|| ErrorKind::CredentialFormat(TOKEN_FORMAT))?;
    let decoded = String::from_utf8(decoded).or_raise(|| ErrorKind::CredentialFormat(PAYLOAD_FORMAT))?;
    let parts: Vec<&str> = decoded.split(':').map(str::trim).collect();
    let [account_id, access_key_id, access_key_secret] = parts.as_slice() else {
        exn::bail!(ErrorKind::CredentialFormat(PAYLOAD_FORMAT));
    };

    Ok(MirrorCredentials {
        account_id: account_id.to_string(),
        access_key_id: access_key_id.to_string(),
        access_key_secret: access_key_secret.to_string(),
    })
}
