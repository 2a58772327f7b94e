//! Credentials for the remote bucket
//!
//! Access tokens come from an environment variable when one is set,
//! otherwise from gcloud with a short-lived on-disk cache. The `auth`
//! command installs a service account key into gcloud.

pub mod cache;
pub mod gcp;
pub mod key;

pub use cache::{CachedToken, TokenCache};
pub use gcp::GcpCredentials;
pub use key::KeySource;

use crate::config::Config;
use crate::error::{DircacheError, DircacheResult};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Bearer token for the GCS JSON API
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw bearer token
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw token value, only for building request headers
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Resolve the access token used for bucket requests
pub async fn resolve_access_token(config: &Config) -> DircacheResult<AccessToken> {
    let env_name = &config.credentials.access_token_env;
    if let Some(token) = token_from_env(env_name) {
        debug!("Using access token from ${}", env_name);
        return Ok(token);
    }

    let cache = TokenCache::new().await?;
    GcpCredentials::get_access_token(&config.credentials, &cache).await
}

fn token_from_env(name: &str) -> Option<AccessToken> {
    if name.is_empty() {
        return None;
    }
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(AccessToken::new)
}

/// Set unix permission bits; a no-op elsewhere
pub(crate) fn restrict_permissions(path: &Path, mode: u32) -> DircacheResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            DircacheError::io(format!("setting permissions on {}", path.display()), e)
        })?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
