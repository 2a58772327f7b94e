//! Access token cache with TTL support

use crate::config::ConfigManager;
use crate::credentials::restrict_permissions;
use crate::error::{DircacheError, DircacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Cached token entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    /// The token value
    pub value: String,

    /// When the token expires
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// Check if token is expired
    pub fn is_expired(&self) -> bool {
        // 60 second margin so a token never expires mid-upload
        Utc::now() >= self.expires_at - chrono::Duration::seconds(60)
    }
}

/// Token cache stored in the credentials directory
pub struct TokenCache {
    cache_dir: PathBuf,
}

impl TokenCache {
    /// Open the token cache in the default credentials directory
    pub async fn new() -> DircacheResult<Self> {
        Self::with_dir(ConfigManager::credentials_dir()).await
    }

    /// Open a token cache in a specific directory
    pub async fn with_dir(cache_dir: PathBuf) -> DircacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| DircacheError::io("creating credentials cache dir", e))?;
        restrict_permissions(&cache_dir, 0o700)?;
        Ok(Self { cache_dir })
    }

    /// Get a cached token if still valid
    pub async fn get(&self, key: &str) -> DircacheResult<Option<CachedToken>> {
        let path = self.cache_path(key);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| DircacheError::io(format!("reading cache file {}", path.display()), e))?;

        let token: CachedToken = serde_json::from_str(&content)?;

        if token.is_expired() {
            debug!("Cached token {} is expired", key);
            self.remove(key).await?;
            return Ok(None);
        }

        Ok(Some(token))
    }

    /// Store a token in cache
    pub async fn set(&self, key: &str, token: &CachedToken) -> DircacheResult<()> {
        let path = self.cache_path(key);
        let content = serde_json::to_string_pretty(token)?;

        fs::write(&path, content)
            .await
            .map_err(|e| DircacheError::io(format!("writing cache file {}", path.display()), e))?;
        restrict_permissions(&path, 0o600)?;

        debug!("Cached token {} until {}", key, token.expires_at);
        Ok(())
    }

    /// Remove a cached token
    pub async fn remove(&self, key: &str) -> DircacheResult<()> {
        let path = self.cache_path(key);
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                DircacheError::io(format!("removing cache file {}", path.display()), e)
            })?;
        }
        Ok(())
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }
}
