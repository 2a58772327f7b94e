//! Cache workflows: store, load, exists and the checksum-gated build
//!
//! Decision sequencing is strictly sequential: the rebuild never starts
//! before the gate has decided, and a store never starts before the
//! rebuild has succeeded.

use crate::cache::archive::{self, ensure_unique_names, Compression, NamedDirectory};
use crate::cache::checksum::{decide, ChecksumSource, GateDecision};
use crate::cache::coordinate::{CacheCoordinates, CacheLocation};
use crate::cache::entry::EntryStamp;
use crate::cache::store::{not_found, CacheStore};
use crate::error::{DircacheError, DircacheResult};
use crate::orchestration::executor::CommandRunner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What `load` does when the coordinate has no entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MissingCachePolicy {
    /// Succeed silently
    #[default]
    Ignore,
    /// Log a warning and succeed
    Warn,
    /// Abort with a not-found error
    Fail,
}

impl fmt::Display for MissingCachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Result of a load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Entry found; the listed directories were restored
    Restored(Vec<String>),
    /// No entry; nothing was written locally
    Missing,
}

/// Result of a cached build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedBuildOutcome {
    /// Checksum matched; directories restored without rebuilding
    Hit { restored: Vec<String> },
    /// Checksum missed; command ran and the entry was replaced
    Rebuilt { size_bytes: u64 },
}

/// Input of a checksum-gated build
#[derive(Debug, Clone)]
pub struct CachedBuild {
    /// Directories produced by the command
    pub directories: Vec<NamedDirectory>,
    /// Where the checksum comes from
    pub checksum: ChecksumSource,
    /// Command regenerating the directories
    pub command: String,
    /// Directory the command runs from
    pub root_dir: Option<PathBuf>,
    /// Compression for the stored archive
    pub compression: Compression,
}

/// Drives the cache workflows against one store and one command runner
pub struct CacheOrchestrator {
    store: CacheStore,
    runner: Box<dyn CommandRunner>,
}

impl CacheOrchestrator {
    /// Create an orchestrator
    pub fn new(store: CacheStore, runner: Box<dyn CommandRunner>) -> Self {
        Self { store, runner }
    }

    /// Archive the directories and replace the entry at the coordinate
    ///
    /// Returns the size of the uploaded archive.
    pub async fn store(
        &self,
        coords: &CacheCoordinates,
        directories: &[NamedDirectory],
        compression: Compression,
        checksum: Option<String>,
    ) -> DircacheResult<u64> {
        if directories.is_empty() {
            return Err(DircacheError::config("At least 1 directory must be provided !"));
        }
        ensure_unique_names(directories)?;
        self.store_at(&coords.resolve(), directories, compression, checksum)
            .await
    }

    /// Restore the entry at the coordinate into the directories
    pub async fn load(
        &self,
        coords: &CacheCoordinates,
        directories: &[NamedDirectory],
        policy: MissingCachePolicy,
    ) -> DircacheResult<LoadOutcome> {
        ensure_unique_names(directories)?;
        self.load_at(&coords.resolve(), directories, policy).await
    }

    /// Whether a complete entry exists at the coordinate
    pub async fn exists(&self, coords: &CacheCoordinates) -> DircacheResult<bool> {
        self.store.exists(&coords.resolve()).await
    }

    /// Restore the entry if its checksum matches, otherwise rebuild and store
    pub async fn cached_build(
        &self,
        coords: &CacheCoordinates,
        request: &CachedBuild,
    ) -> DircacheResult<CachedBuildOutcome> {
        if request.directories.is_empty() {
            return Err(DircacheError::config("At least 1 directory must be provided !"));
        }
        if request.command.trim().is_empty() {
            return Err(DircacheError::config("cacheable command must not be empty"));
        }
        ensure_unique_names(&request.directories)?;

        let location = coords.resolve();
        let checksum = request.checksum.resolve().await?;
        let stamp = self.store.read_stamp(&location).await?;
        let existing = stamp.as_ref().and_then(|s| s.checksum.as_deref());

        let mut decision = decide(&checksum, existing);
        if decision == GateDecision::Hit {
            let held = stamp.as_ref().map(|s| s.directories.as_slice()).unwrap_or_default();
            if let Some(absent) = request.directories.iter().find(|d| !held.contains(&d.name)) {
                info!(
                    "Directory '{}' is not held by {}, rebuilding",
                    absent.name, location
                );
                decision = GateDecision::Miss;
            }
        }
        info!(
            "Cache {} for {} (checksum {}, stored {})",
            decision,
            location,
            checksum,
            existing.unwrap_or("none")
        );

        match decision {
            GateDecision::Hit => {
                let restored = match self
                    .load_at(&location, &request.directories, MissingCachePolicy::Fail)
                    .await?
                {
                    LoadOutcome::Restored(names) => names,
                    LoadOutcome::Missing => return Err(not_found(&location)),
                };
                Ok(CachedBuildOutcome::Hit { restored })
            }
            GateDecision::Miss => {
                self.runner
                    .run(&request.command, request.root_dir.as_deref())
                    .await?;
                let size_bytes = self
                    .store_at(
                        &location,
                        &request.directories,
                        request.compression,
                        Some(checksum),
                    )
                    .await?;
                Ok(CachedBuildOutcome::Rebuilt { size_bytes })
            }
        }
    }

    async fn store_at(
        &self,
        location: &CacheLocation,
        directories: &[NamedDirectory],
        compression: Compression,
        checksum: Option<String>,
    ) -> DircacheResult<u64> {
        let dirs = directories.to_vec();
        let artifact = tokio::task::spawn_blocking(move || archive::archive(&dirs, compression))
            .await
            .map_err(|e| DircacheError::Internal(format!("archive task failed: {}", e)))??;

        let size_bytes = artifact.len() as u64;
        let stamp = EntryStamp::new(
            checksum,
            compression,
            directories.iter().map(|d| d.name.clone()).collect(),
            size_bytes,
        );

        self.store.write(location, artifact, &stamp).await?;
        Ok(size_bytes)
    }

    async fn load_at(
        &self,
        location: &CacheLocation,
        directories: &[NamedDirectory],
        policy: MissingCachePolicy,
    ) -> DircacheResult<LoadOutcome> {
        let Some(artifact) = self.store.read(location).await? else {
            return match policy {
                MissingCachePolicy::Ignore => {
                    debug!("No entry at {}, ignoring", location);
                    Ok(LoadOutcome::Missing)
                }
                MissingCachePolicy::Warn => {
                    warn!("No cache entry found for {}", location);
                    Ok(LoadOutcome::Missing)
                }
                MissingCachePolicy::Fail => Err(not_found(location)),
            };
        };

        let dirs = directories.to_vec();
        let restored = tokio::task::spawn_blocking(move || archive::unarchive(&artifact, &dirs))
            .await
            .map_err(|e| DircacheError::Internal(format!("unarchive task failed: {}", e)))??;

        info!("Restored {} from {}", restored.join(", "), location);
        Ok(LoadOutcome::Restored(restored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{MemoryTransport, ObjectTransport};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Fake rebuild: writes `<dir>/built.txt` containing a marker, or fails
    struct FakeRunner {
        calls: Arc<AtomicUsize>,
        output_dir: PathBuf,
        contents: String,
        fail: bool,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &str, _working_dir: Option<&Path>) -> DircacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DircacheError::CommandFailure {
                    command: command.to_string(),
                    code: Some(1),
                });
            }
            fs::create_dir_all(&self.output_dir).unwrap();
            fs::write(self.output_dir.join("built.txt"), &self.contents).unwrap();
            Ok(())
        }
    }

    struct Harness {
        _tmp: TempDir,
        out: PathBuf,
        bucket: MemoryTransport,
        calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let out = tmp.path().join("out");
            Self {
                _tmp: tmp,
                out,
                bucket: MemoryTransport::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn orchestrator(&self, contents: &str, fail: bool) -> CacheOrchestrator {
            CacheOrchestrator::new(
                CacheStore::new(Box::new(self.bucket.clone())),
                Box::new(FakeRunner {
                    calls: Arc::clone(&self.calls),
                    output_dir: self.out.clone(),
                    contents: contents.to_string(),
                    fail,
                }),
            )
        }

        fn request(&self, checksum: &str) -> CachedBuild {
            CachedBuild {
                directories: vec![NamedDirectory::new("out", &self.out)],
                checksum: ChecksumSource::Value(checksum.to_string()),
                command: "build".to_string(),
                root_dir: None,
                compression: Compression::Gzip,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn coords() -> CacheCoordinates {
        CacheCoordinates::new("gs://b", "a", Some(""), "c").unwrap()
    }

    #[tokio::test]
    async fn cold_cache_rebuilds_then_hits() {
        let h = Harness::new();
        let orch = h.orchestrator("v1 output", false);

        let first = orch.cached_build(&coords(), &h.request("v1")).await.unwrap();
        assert!(matches!(first, CachedBuildOutcome::Rebuilt { .. }));
        assert_eq!(h.calls(), 1);

        fs::remove_dir_all(&h.out).unwrap();

        let second = orch.cached_build(&coords(), &h.request("v1")).await.unwrap();
        assert_eq!(
            second,
            CachedBuildOutcome::Hit {
                restored: vec!["out".to_string()]
            }
        );
        assert_eq!(h.calls(), 1);
        assert_eq!(
            fs::read_to_string(h.out.join("built.txt")).unwrap(),
            "v1 output"
        );
    }

    #[tokio::test]
    async fn changed_checksum_rebuilds_and_replaces_stamp() {
        let h = Harness::new();
        h.orchestrator("v1 output", false)
            .cached_build(&coords(), &h.request("v1"))
            .await
            .unwrap();

        let orch = h.orchestrator("v2 output", false);
        let outcome = orch.cached_build(&coords(), &h.request("v2")).await.unwrap();
        assert!(matches!(outcome, CachedBuildOutcome::Rebuilt { .. }));
        assert_eq!(h.calls(), 2);

        let stamp = CacheStore::new(Box::new(h.bucket.clone()))
            .read_stamp(&coords().resolve())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stamp.checksum.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn hit_requires_every_requested_directory() {
        let h = Harness::new();
        h.orchestrator("v1 output", false)
            .cached_build(&coords(), &h.request("v1"))
            .await
            .unwrap();

        let extra = h.out.with_file_name("extra");
        let mut request = h.request("v1");
        request.directories.push(NamedDirectory::new("extra", &extra));

        // the rebuild only fills `out`, so create `extra` up front
        fs::create_dir_all(&extra).unwrap();
        fs::write(extra.join("e.txt"), "extra").unwrap();

        let orch = h.orchestrator("v1 output", false);
        let outcome = orch.cached_build(&coords(), &request).await.unwrap();
        assert!(matches!(outcome, CachedBuildOutcome::Rebuilt { .. }));
        assert_eq!(h.calls(), 2);

        fs::remove_dir_all(&h.out).unwrap();
        fs::remove_dir_all(&extra).unwrap();
        let outcome = orch.cached_build(&coords(), &request).await.unwrap();
        assert_eq!(
            outcome,
            CachedBuildOutcome::Hit {
                restored: vec!["out".to_string(), "extra".to_string()]
            }
        );
        assert_eq!(h.calls(), 2);
        assert_eq!(fs::read_to_string(extra.join("e.txt")).unwrap(), "extra");
    }

    #[tokio::test]
    async fn failed_rebuild_leaves_entry_untouched() {
        let h = Harness::new();
        h.orchestrator("v1 output", false)
            .cached_build(&coords(), &h.request("v1"))
            .await
            .unwrap();
        let archive_before = h
            .bucket
            .get(&coords().resolve().archive_key())
            .await
            .unwrap();

        let err = h
            .orchestrator("never stored", true)
            .cached_build(&coords(), &h.request("v2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailure);

        let store = CacheStore::new(Box::new(h.bucket.clone()));
        let stamp = store.read_stamp(&coords().resolve()).await.unwrap().unwrap();
        assert_eq!(stamp.checksum.as_deref(), Some("v1"));
        assert_eq!(
            h.bucket
                .get(&coords().resolve().archive_key())
                .await
                .unwrap(),
            archive_before
        );
    }

    #[tokio::test]
    async fn failed_first_rebuild_writes_nothing() {
        let h = Harness::new();
        let err = h
            .orchestrator("x", true)
            .cached_build(&coords(), &h.request("v1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CommandFailure);
        assert!(h.bucket.keys().is_empty());
    }

    #[tokio::test]
    async fn stamp_without_checksum_is_a_miss() {
        let h = Harness::new();
        let orch = h.orchestrator("rebuilt", false);
        fs::create_dir_all(&h.out).unwrap();
        fs::write(h.out.join("built.txt"), "plain store").unwrap();

        orch.store(
            &coords(),
            &[NamedDirectory::new("out", &h.out)],
            Compression::Gzip,
            None,
        )
        .await
        .unwrap();

        let outcome = orch.cached_build(&coords(), &h.request("v1")).await.unwrap();
        assert!(matches!(outcome, CachedBuildOutcome::Rebuilt { .. }));
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test]
    async fn cached_build_preconditions_checked_before_io() {
        let h = Harness::new();
        let orch = h.orchestrator("x", false);

        let mut request = h.request("v1");
        request.directories.clear();
        let err = orch.cached_build(&coords(), &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let mut request = h.request("v1");
        request.directories.push(NamedDirectory::new("out", "elsewhere"));
        let err = orch.cached_build(&coords(), &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        assert_eq!(h.calls(), 0);
        assert!(h.bucket.keys().is_empty());
    }

    #[tokio::test]
    async fn load_missing_entry_follows_policy() {
        let h = Harness::new();
        let orch = h.orchestrator("x", false);
        let dirs = [NamedDirectory::new("out", &h.out)];

        for policy in [MissingCachePolicy::Ignore, MissingCachePolicy::Warn] {
            let outcome = orch.load(&coords(), &dirs, policy).await.unwrap();
            assert_eq!(outcome, LoadOutcome::Missing);
        }
        assert!(!h.out.exists());

        let err = orch
            .load(&coords(), &dirs, MissingCachePolicy::Fail)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!h.out.exists());
    }

    #[tokio::test]
    async fn store_then_load_two_directories() {
        let tmp = TempDir::new().unwrap();
        let one = tmp.path().join("one");
        let two = tmp.path().join("two");
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        fs::write(one.join("same.txt"), "1").unwrap();
        fs::write(two.join("same.txt"), "2").unwrap();

        let h = Harness::new();
        let orch = h.orchestrator("x", false);
        orch.store(
            &coords(),
            &[NamedDirectory::new("one", &one), NamedDirectory::new("two", &two)],
            Compression::None,
            None,
        )
        .await
        .unwrap();
        assert!(orch.exists(&coords()).await.unwrap());

        let restore = tmp.path().join("restore");
        let outcome = orch
            .load(
                &coords(),
                &[
                    NamedDirectory::new("one", restore.join("1")),
                    NamedDirectory::new("two", restore.join("2")),
                ],
                MissingCachePolicy::Fail,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Restored(vec!["one".to_string(), "two".to_string()])
        );
        assert_eq!(fs::read_to_string(restore.join("1/same.txt")).unwrap(), "1");
        assert_eq!(fs::read_to_string(restore.join("2/same.txt")).unwrap(), "2");
    }

    #[tokio::test]
    async fn storing_twice_is_idempotent() {
        let h = Harness::new();
        let orch = h.orchestrator("x", false);
        fs::create_dir_all(&h.out).unwrap();
        fs::write(h.out.join("f"), "same").unwrap();
        let dirs = [NamedDirectory::new("out", &h.out)];

        orch.store(&coords(), &dirs, Compression::Gzip, Some("v1".into()))
            .await
            .unwrap();
        let loc = coords().resolve();
        let first = h.bucket.get(&loc.archive_key()).await.unwrap();
        let first_stamp = h.bucket.get(&loc.stamp_key()).await.unwrap();
        let keys = h.bucket.keys();

        orch.store(&coords(), &dirs, Compression::Gzip, Some("v1".into()))
            .await
            .unwrap();
        let second = h.bucket.get(&loc.archive_key()).await.unwrap();
        let second_stamp = h.bucket.get(&loc.stamp_key()).await.unwrap();

        assert_eq!(first, second);
        assert!(first_stamp.is_some());
        assert_eq!(first_stamp, second_stamp);
        assert_eq!(keys, h.bucket.keys());
    }

    #[tokio::test]
    async fn store_of_missing_directory_writes_nothing() {
        let h = Harness::new();
        let orch = h.orchestrator("x", false);
        let err = orch
            .store(
                &coords(),
                &[NamedDirectory::new("out", &h.out)],
                Compression::Gzip,
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Archive);
        assert!(h.bucket.keys().is_empty());
    }

    #[tokio::test]
    async fn exists_reflects_entry() {
        let h = Harness::new();
        let orch = h.orchestrator("x", false);
        assert!(!orch.exists(&coords()).await.unwrap());

        orch.cached_build(&coords(), &h.request("v1")).await.unwrap();
        assert!(orch.exists(&coords()).await.unwrap());

        let other = CacheCoordinates::new("gs://b", "a", Some("feature"), "c").unwrap();
        assert!(!orch.exists(&other).await.unwrap());
    }
}
