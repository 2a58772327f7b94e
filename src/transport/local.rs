//! Local directory transport for `file://` buckets

use crate::error::{DircacheError, DircacheResult};
use crate::transport::ObjectTransport;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Transport storing objects as files below a root directory
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    /// Create a transport rooted at a directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, key: &str) -> DircacheResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(DircacheError::transport(key, "invalid object key"));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectTransport for LocalTransport {
    async fn head(&self, key: &str) -> DircacheResult<bool> {
        let path = self.object_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DircacheError::transport(key, e)),
        }
    }

    async fn get(&self, key: &str) -> DircacheResult<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DircacheError::transport(key, e)),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> DircacheResult<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DircacheError::transport(key, e))?;
        }

        // Write beside the target then rename, so readers never see a partial object
        let mut partial = path.clone().into_os_string();
        partial.push(format!(".partial-{}", std::process::id()));
        let partial = PathBuf::from(partial);

        fs::write(&partial, &bytes)
            .await
            .map_err(|e| DircacheError::transport(key, e))?;
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(DircacheError::transport(key, e));
        }

        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> DircacheResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DircacheError::transport(key, e)),
        }
    }

    fn transport_name(&self) -> &'static str {
        "local"
    }
}
