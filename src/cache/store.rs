//! Remote cache store
//!
//! Thin adapter over an [`ObjectTransport`] that reads and writes whole
//! cache entries (archive + stamp) at a resolved location.
//!
//! # Write protocol
//!
//! The transport cannot write two objects atomically, so entries are
//! written in three steps:
//!
//! 1. delete the old stamp
//! 2. upload the archive
//! 3. upload the new stamp
//!
//! Readers always consult the stamp first and treat a missing stamp as
//! a missing entry. An interrupted write therefore leaves at worst an
//! orphaned archive, which reads as a miss, never a stale hit.

use crate::cache::coordinate::CacheLocation;
use crate::cache::entry::EntryStamp;
use crate::error::{DircacheError, DircacheResult};
use crate::transport::ObjectTransport;
use tracing::{debug, info};

/// Remote store of cache entries
pub struct CacheStore {
    transport: Box<dyn ObjectTransport>,
}

impl CacheStore {
    /// Create a store over a transport
    pub fn new(transport: Box<dyn ObjectTransport>) -> Self {
        Self { transport }
    }

    /// Whether a complete entry exists at the location
    pub async fn exists(&self, location: &CacheLocation) -> DircacheResult<bool> {
        let stamp_key = location.stamp_key();
        let archive_key = location.archive_key();
        let (stamp, archive) = tokio::try_join!(
            self.transport.head(&stamp_key),
            self.transport.head(&archive_key),
        )?;
        debug!("Entry {}: stamp={} archive={}", location, stamp, archive);
        Ok(stamp && archive)
    }

    /// Read the stamp of the entry, `None` if there is no entry
    pub async fn read_stamp(&self, location: &CacheLocation) -> DircacheResult<Option<EntryStamp>> {
        let key = location.stamp_key();
        match self.transport.get(&key).await? {
            Some(bytes) => Ok(Some(EntryStamp::from_bytes(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Read the archive of the entry, `None` if there is no entry
    pub async fn read(&self, location: &CacheLocation) -> DircacheResult<Option<Vec<u8>>> {
        if self.read_stamp(location).await?.is_none() {
            debug!("No stamp at {}, treating entry as absent", location);
            return Ok(None);
        }
        self.transport.get(&location.archive_key()).await
    }

    /// Replace the entry at the location
    pub async fn write(
        &self,
        location: &CacheLocation,
        artifact: Vec<u8>,
        stamp: &EntryStamp,
    ) -> DircacheResult<()> {
        let stamp_bytes = stamp.to_bytes()?;
        let size = artifact.len();

        self.transport.delete(&location.stamp_key()).await?;
        self.transport.put(&location.archive_key(), artifact).await?;
        self.transport.put(&location.stamp_key(), stamp_bytes).await?;

        info!(
            "Stored {} bytes at {} via {}",
            size,
            location,
            self.transport.transport_name()
        );
        Ok(())
    }
}

/// Convert an absent entry into the not-found error for a location
pub fn not_found(location: &CacheLocation) -> DircacheError {
    DircacheError::CacheNotFound {
        coordinate: location.to_string(),
    }
}
