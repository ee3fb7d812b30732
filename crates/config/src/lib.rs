//! Layered configuration for seedmirror.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults;
//! 2. a TOML file, either given explicitly or found in the platform config
//!    directory (`~/.config/seedmirror/config.toml` on Linux);
//! 3. `SEEDMIRROR_` environment variables, with `__` separating nested keys
//!    (e.g. `SEEDMIRROR_DESCRIPTORS__DOWNLOAD=false`).
//!
//! ```toml
//! chain = "mainnet"
//! snapshot_dir = "/var/lib/seedmirror/snapshots"
//!
//! [providers]
//! http = ["https://snapshots.example.org/webseeds.toml"]
//! object_storage = ["v1:..."]
//!
//! [descriptors]
//! download = true
//!
//! [[descriptors.skip]]
//! prefix = "commitment"
//! suffixes = [".v.torrent", ".ef.torrent"]
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

pub const ENV_PREFIX: &str = "SEEDMIRROR_";
const DEFAULT_MAX_DESCRIPTOR_SIZE: u64 = 128 * 1024 * 1024;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Platform-specific location of the configuration file, if the platform
/// has a home directory at all.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "seedmirror").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chain identifier, e.g. `mainnet` or `bor-mainnet`.
    pub chain: String,
    /// Where descriptors are downloaded to.
    pub snapshot_dir: Option<PathBuf>,
    pub providers: ProvidersConfig,
    pub descriptors: DescriptorsConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: "mainnet".to_string(),
            snapshot_dir: None,
            providers: ProvidersConfig::default(),
            descriptors: DescriptorsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub http: Vec<Url>,
    /// Mirror tokens. Secret.
    pub object_storage: Vec<String>,
    pub local: Vec<PathBuf>,
}

impl fmt::Debug for ProvidersConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidersConfig")
            .field("http", &self.http.iter().map(Url::as_str).collect::<Vec<_>>())
            .field("object_storage", &format_args!("[{} redacted]", self.object_storage.len()))
            .field("local", &self.local)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DescriptorsConfig {
    /// Download missing `.torrent` descriptors from their mirrors.
    pub download: bool,
    /// Per-descriptor size ceiling in bytes.
    pub max_size: u64,
    /// Descriptor families never downloaded.
    pub skip: Vec<SkipRuleConfig>,
}

impl Default for DescriptorsConfig {
    fn default() -> Self {
        Self {
            download: true,
            max_size: DEFAULT_MAX_DESCRIPTOR_SIZE,
            skip: vec![SkipRuleConfig {
                prefix: "commitment".to_string(),
                suffixes: vec![".v.torrent".to_string(), ".ef.torrent".to_string()],
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkipRuleConfig {
    pub prefix: String,
    pub suffixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS }
    }
}

impl Config {
    /// Load and validate configuration.
    ///
    /// An explicit `path` must exist. Without one, the platform default is
    /// used when present and silently skipped otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?)
    }

    /// The layered sources, before extraction.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new();
        match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                debug!(path = %path.display(), "Loading configuration file");
                figment = figment.merge(Toml::file(path));
            },
            None => {
                if let Some(path) = default_path() {
                    debug!(path = %path.display(), "Looking for default configuration file");
                    figment = figment.merge(Toml::file(path));
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid { field: "chain", reason: "must not be empty".to_string() });
        }
        if let Some(url) = self.providers.http.iter().find(|url| !matches!(url.scheme(), "http" | "https")) {
            exn::bail!(ErrorKind::Invalid {
                field: "providers.http",
                reason: format!("unsupported scheme {:?}", url.scheme()),
            });
        }
        if self.descriptors.max_size == 0 {
            exn::bail!(ErrorKind::Invalid { field: "descriptors.max_size", reason: "must be positive".to_string() });
        }
        if self.descriptors.skip.iter().any(|rule| rule.suffixes.is_empty()) {
            exn::bail!(ErrorKind::Invalid {
                field: "descriptors.skip",
                reason: "every rule needs at least one suffix".to_string(),
            });
        }
        if self.http.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid { field: "http.timeout_secs", reason: "must be positive".to_string() });
        }
        Ok(())
    }
}
