//! Configuration schema for dircache
//!
//! Configuration is stored at `~/.config/dircache/config.toml`

use crate::orchestration::MissingCachePolicy;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Store and load defaults
    pub store: StoreConfig,

    /// Google Cloud Storage settings
    pub gcs: GcsConfig,

    /// Credential settings
    pub credentials: CredentialsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Defaults for store and load commands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Gzip archives before upload
    pub compress: bool,

    /// Behaviour of load when no entry exists
    pub on_missing: MissingCachePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compress: true,
            on_missing: MissingCachePolicy::Ignore,
        }
    }
}

/// Google Cloud Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcsConfig {
    /// API endpoint (override for emulators)
    pub endpoint: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://storage.googleapis.com".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Minutes a fetched access token is reused
    pub token_ttl_minutes: u32,

    /// Environment variable that, when set, provides the access token directly
    pub access_token_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 55,
            access_token_env: "DIRCACHE_GCS_ACCESS_TOKEN".to_string(),
        }
    }
}
