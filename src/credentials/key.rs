//! Google service account key acquisition

use crate::credentials::restrict_permissions;
use crate::error::{DircacheError, DircacheResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// File name the key is stored under inside the credentials directory
pub const KEY_FILE_NAME: &str = "service-account.json";

/// Where to obtain a service account key from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Url(String),
    File(PathBuf),
}

impl KeySource {
    /// Build from the two mutually exclusive CLI options
    pub fn from_options(url: Option<String>, file: Option<PathBuf>) -> DircacheResult<Self> {
        match (url, file) {
            (Some(url), None) => Ok(Self::Url(url)),
            (None, Some(file)) => Ok(Self::File(file)),
            (None, None) => Err(DircacheError::config(
                "Either --key-config-url or --key-config-file options need to be set",
            )),
            (Some(_), Some(_)) => Err(DircacheError::config(
                "Only one of --key-config-url or --key-config-file may be set",
            )),
        }
    }

    /// Fetch the raw key bytes
    pub async fn fetch(&self, timeout_secs: u64) -> DircacheResult<Vec<u8>> {
        match self {
            Self::File(path) => fs::read(path)
                .await
                .map_err(|e| DircacheError::io(format!("reading key file {}", path.display()), e)),
            Self::Url(url) => {
                info!("Downloading service account key");
                let url = url.clone();
                tokio::task::spawn_blocking(move || download(&url, timeout_secs))
                    .await
                    .map_err(|e| DircacheError::Internal(format!("key download task: {}", e)))?
            }
        }
    }
}

fn download(url: &str, timeout_secs: u64) -> DircacheResult<Vec<u8>> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build()
        .into();

    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| DircacheError::AuthRejected {
            reason: format!("downloading key: {}", e),
        })?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(DircacheError::AuthRejected {
            reason: format!("key download returned HTTP {}", status),
        });
    }

    response
        .body_mut()
        .read_to_vec()
        .map_err(|e| DircacheError::AuthRejected {
            reason: format!("reading key body: {}", e),
        })
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    #[serde(rename = "type")]
    kind: String,
    client_email: String,
}

/// Check the bytes look like a service account key and return its account email
pub fn validate_key(bytes: &[u8]) -> DircacheResult<String> {
    let key: ServiceAccountKey =
        serde_json::from_slice(bytes).map_err(|e| DircacheError::AuthRejected {
            reason: format!("not a service account key: {}", e),
        })?;

    if key.kind != "service_account" {
        return Err(DircacheError::AuthRejected {
            reason: format!("unexpected key type '{}'", key.kind),
        });
    }
    if key.client_email.is_empty() {
        return Err(DircacheError::AuthRejected {
            reason: "key has an empty client_email".to_string(),
        });
    }

    Ok(key.client_email)
}

/// Write the key into `dir` with owner-only permissions
pub async fn store_key(dir: &Path, bytes: &[u8]) -> DircacheResult<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| DircacheError::io("creating credentials dir", e))?;
    restrict_permissions(dir, 0o700)?;

    let path = dir.join(KEY_FILE_NAME);
    fs::write(&path, bytes)
        .await
        .map_err(|e| DircacheError::io(format!("writing key to {}", path.display()), e))?;
    restrict_permissions(&path, 0o600)?;

    debug!("Stored service account key at {}", path.display());
    Ok(path)
}
