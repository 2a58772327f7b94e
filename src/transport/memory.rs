//! In-process transport backed by a map

use crate::error::{DircacheError, DircacheResult};
use crate::transport::ObjectTransport;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Transport keeping objects in memory
///
/// Clones share the same objects, so a test can keep a handle and
/// inspect what a store wrote through another clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryTransport {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored, sorted
    pub fn keys(&self) -> Vec<String> {
        self.lock().map(|o| o.keys().cloned().collect()).unwrap_or_default()
    }

    fn lock(&self) -> DircacheResult<MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| DircacheError::Internal("memory transport poisoned".to_string()))
    }
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    async fn head(&self, key: &str) -> DircacheResult<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    async fn get(&self, key: &str) -> DircacheResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> DircacheResult<()> {
        self.lock()?.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> DircacheResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}
