//! Google Cloud Storage transport using the JSON API
//!
//! Requests are blocking `ureq` calls moved onto tokio's blocking pool.
//! No request is retried: any failure is returned to the caller as-is.

use crate::config::schema::GcsConfig;
use crate::credentials::AccessToken;
use crate::error::{DircacheError, DircacheResult};
use crate::transport::ObjectTransport;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Transport for a `gs://` bucket
pub struct GcsTransport {
    agent: ureq::Agent,
    endpoint: String,
    bucket: String,
    token: AccessToken,
}

impl GcsTransport {
    /// Create a transport for a bucket with explicit credentials
    pub fn new(bucket: String, config: &GcsConfig, token: AccessToken) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket,
            token,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            encode_component(&self.bucket),
            encode_component(key)
        )
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            encode_component(&self.bucket),
            encode_component(key)
        )
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.secret())
    }
}

/// Run a blocking request on the blocking pool
async fn blocking<T, F>(key: &str, f: F) -> DircacheResult<T>
where
    F: FnOnce() -> DircacheResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        DircacheError::Internal(format!("transport task for {} failed: {}", key, e))
    })?
}

/// Map an HTTP status to the error taxonomy
fn check_status(key: &str, status: u16) -> DircacheResult<()> {
    match status {
        200..=299 => Ok(()),
        401 | 403 => Err(DircacheError::AuthRejected {
            reason: format!("HTTP {} on {}", status, key),
        }),
        _ => Err(DircacheError::transport(
            key,
            format!("unexpected HTTP status {}", status),
        )),
    }
}

/// Percent-encode a path component or query value
fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[async_trait]
impl ObjectTransport for GcsTransport {
    async fn head(&self, key: &str) -> DircacheResult<bool> {
        let agent = self.agent.clone();
        let url = self.object_url(key);
        let auth = self.bearer();
        let owned_key = key.to_string();
        debug!("GCS metadata {}", url);

        blocking(key, move || {
            let response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(|e| DircacheError::transport(&owned_key, e))?;
            let status = response.status().as_u16();
            if status == 404 {
                return Ok(false);
            }
            check_status(&owned_key, status)?;
            Ok(true)
        })
        .await
    }

    async fn get(&self, key: &str) -> DircacheResult<Option<Vec<u8>>> {
        let agent = self.agent.clone();
        let url = format!("{}?alt=media", self.object_url(key));
        let auth = self.bearer();
        let owned_key = key.to_string();
        debug!("GCS download {}", url);

        blocking(key, move || {
            let mut response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(|e| DircacheError::transport(&owned_key, e))?;
            let status = response.status().as_u16();
            if status == 404 {
                return Ok(None);
            }
            check_status(&owned_key, status)?;

            let bytes = response
                .body_mut()
                .with_config()
                .limit(u64::MAX)
                .read_to_vec()
                .map_err(|e| DircacheError::transport(&owned_key, e))?;
            Ok(Some(bytes))
        })
        .await
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> DircacheResult<()> {
        let agent = self.agent.clone();
        let url = self.upload_url(key);
        let auth = self.bearer();
        let owned_key = key.to_string();
        debug!("GCS upload {} ({} bytes)", url, bytes.len());

        blocking(key, move || {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .header("Content-Type", "application/octet-stream")
                .send(&bytes[..])
                .map_err(|e| DircacheError::transport(&owned_key, e))?;
            check_status(&owned_key, response.status().as_u16())
        })
        .await
    }

    async fn delete(&self, key: &str) -> DircacheResult<()> {
        let agent = self.agent.clone();
        let url = self.object_url(key);
        let auth = self.bearer();
        let owned_key = key.to_string();
        debug!("GCS delete {}", url);

        blocking(key, move || {
            let response = agent
                .delete(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(|e| DircacheError::transport(&owned_key, e))?;
            let status = response.status().as_u16();
            if status == 404 {
                return Ok(());
            }
            check_status(&owned_key, status)
        })
        .await
    }

    fn transport_name(&self) -> &'static str {
        "gcs"
    }
}
