//! GCP credential provider using gcloud CLI

use crate::config::schema::CredentialsConfig;
use crate::credentials::cache::{CachedToken, TokenCache};
use crate::credentials::AccessToken;
use crate::error::{DircacheError, DircacheResult};
use chrono::{Duration, Utc};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// GCP credential provider
pub struct GcpCredentials;

impl GcpCredentials {
    pub const CACHE_KEY: &'static str = "gcs-token";

    /// Get access token, using cache if valid
    pub async fn get_access_token(
        config: &CredentialsConfig,
        cache: &TokenCache,
    ) -> DircacheResult<AccessToken> {
        if let Some(cached) = cache.get(Self::CACHE_KEY).await? {
            debug!("Using cached GCS access token");
            return Ok(AccessToken::new(cached.value));
        }

        let token = Self::print_access_token().await?;

        let expires_at = Utc::now() + Duration::minutes(i64::from(config.token_ttl_minutes));
        let cached = CachedToken::new(token.clone(), expires_at);
        cache.set(Self::CACHE_KEY, &cached).await?;

        Ok(AccessToken::new(token))
    }

    async fn print_access_token() -> DircacheResult<String> {
        info!("Requesting GCS access token from gcloud");

        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DircacheError::command_failed("gcloud auth print-access-token", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_unauthenticated(&stderr) {
                return Err(DircacheError::NotAuthenticated);
            }
            return Err(DircacheError::GcpCredential(stderr.trim().to_string()));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(DircacheError::GcpCredential(
                "Empty token returned".to_string(),
            ));
        }

        Ok(token)
    }

    /// Make a service account key the active gcloud account
    pub async fn activate_service_account(key_path: &Path) -> DircacheResult<()> {
        info!("Activating service account from {}", key_path.display());

        let key_arg = format!("--key-file={}", key_path.display());
        let output = Command::new("gcloud")
            .args(["auth", "activate-service-account", key_arg.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| DircacheError::command_failed("gcloud auth activate-service-account", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DircacheError::AuthRejected {
                reason: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

fn is_unauthenticated(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not logged in")
        || lower.contains("no active account")
        || lower.contains("no credentialed accounts")
}
