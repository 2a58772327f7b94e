//! Remote object transports
//!
//! Byte-level access to the bucket holding cache entries:
//! - `gs://` buckets: Google Cloud Storage JSON API
//! - `file://` buckets: a local directory
//! - in-memory buckets for embedding and tests

mod gcs;
mod local;
mod memory;

pub use gcs::GcsTransport;
pub use local::LocalTransport;
pub use memory::MemoryTransport;

use crate::cache::BucketUrl;
use crate::config::schema::GcsConfig;
use crate::credentials::AccessToken;
use crate::error::{DircacheError, DircacheResult};
use async_trait::async_trait;

/// Abstract object transport
///
/// Keys are `/`-separated object names relative to the bucket. A missing
/// object is a normal outcome (`false` / `None`), never an error.
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    /// Check whether an object exists
    async fn head(&self, key: &str) -> DircacheResult<bool>;

    /// Download an object
    async fn get(&self, key: &str) -> DircacheResult<Option<Vec<u8>>>;

    /// Upload an object, replacing any previous version
    async fn put(&self, key: &str, bytes: Vec<u8>) -> DircacheResult<()>;

    /// Delete an object; deleting a missing object succeeds
    async fn delete(&self, key: &str) -> DircacheResult<()>;

    /// Human-readable transport name for logs
    fn transport_name(&self) -> &'static str;
}

/// Whether talking to this bucket requires cloud credentials
pub fn needs_credentials(bucket: &BucketUrl) -> bool {
    matches!(bucket, BucketUrl::Gcs { .. })
}

/// Create the transport matching a bucket url
///
/// `token` must be present for buckets that need credentials.
pub fn create_transport(
    bucket: &BucketUrl,
    gcs: &GcsConfig,
    token: Option<AccessToken>,
) -> DircacheResult<Box<dyn ObjectTransport>> {
    match bucket {
        BucketUrl::Gcs { bucket, .. } => {
            let token = token.ok_or(DircacheError::NotAuthenticated)?;
            Ok(Box::new(GcsTransport::new(bucket.clone(), gcs, token)))
        }
        BucketUrl::Local { root } => Ok(Box::new(LocalTransport::new(root.clone()))),
    }
}
