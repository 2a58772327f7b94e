//! Checksum gate
//!
//! Decides whether a stored entry can be reused by comparing a freshly
//! computed checksum with the stamp recorded when the entry was written.

use crate::error::{DircacheError, DircacheResult};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the checksum of a cached build comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumSource {
    /// SHA256 of a reference file's contents
    File(PathBuf),
    /// Literal value used verbatim
    Value(String),
}

impl ChecksumSource {
    /// Build a source from the two optional CLI inputs
    ///
    /// Exactly one of them must be given.
    pub fn from_options(file: Option<PathBuf>, value: Option<String>) -> DircacheResult<Self> {
        match (file, value) {
            (Some(file), None) => Ok(Self::File(file)),
            (None, Some(value)) => Ok(Self::Value(value)),
            (Some(_), Some(_)) => Err(DircacheError::config(
                "only one of checksum-file or checksum-value may be provided",
            )),
            (None, None) => Err(DircacheError::config(
                "Either checksum-file or checksum-value needs to be provided",
            )),
        }
    }

    /// Compute the checksum
    pub async fn resolve(&self) -> DircacheResult<String> {
        match self {
            Self::Value(value) => Ok(value.clone()),
            Self::File(path) => hash_file(path).await,
        }
    }
}

/// Hash a reference file's contents using SHA256, hex encoded
async fn hash_file(path: &Path) -> DircacheResult<String> {
    let contents = tokio::fs::read(path)
        .await
        .map_err(|e| DircacheError::io(format!("reading checksum file {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let hash = hex::encode(hasher.finalize());

    debug!("Checksum of {} is {}", path.display(), hash);
    Ok(hash)
}

/// Outcome of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Stored entry matches and can be restored
    Hit,
    /// Entry is absent or stale and must be rebuilt
    Miss,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hit => write!(f, "hit"),
            Self::Miss => write!(f, "miss"),
        }
    }
}

/// Compare a new checksum with the stamp of the existing entry
///
/// An absent entry, or one stored without a checksum, is always a miss.
pub fn decide(new_checksum: &str, existing: Option<&str>) -> GateDecision {
    match existing {
        Some(stamp) if stamp == new_checksum => GateDecision::Hit,
        _ => GateDecision::Miss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn absent_stamp_is_miss() {
        assert_eq!(decide("v1", None), GateDecision::Miss);
        assert_eq!(decide("", None), GateDecision::Miss);
    }

    #[test]
    fn equal_stamp_is_hit() {
        assert_eq!(decide("v1", Some("v1")), GateDecision::Hit);
    }

    #[test]
    fn different_stamp_is_miss() {
        assert_eq!(decide("v1", Some("v2")), GateDecision::Miss);
        assert_eq!(decide("v1", Some("V1")), GateDecision::Miss);
        assert_eq!(decide("v1", Some("v1 ")), GateDecision::Miss);
    }

    #[test]
    fn exactly_one_source_required() {
        let err = ChecksumSource::from_options(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = ChecksumSource::from_options(Some("a".into()), Some("b".into())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        assert_eq!(
            ChecksumSource::from_options(None, Some("v1".into())).unwrap(),
            ChecksumSource::Value("v1".to_string())
        );
    }

    #[tokio::test]
    async fn literal_value_used_verbatim() {
        let source = ChecksumSource::Value(" v1 ".to_string());
        assert_eq!(source.resolve().await.unwrap(), " v1 ");
    }

    #[tokio::test]
    async fn file_checksum_follows_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("package-lock.json");

        std::fs::write(&path, "content 1").unwrap();
        let source = ChecksumSource::File(path.clone());
        let first = source.resolve().await.unwrap();
        let again = source.resolve().await.unwrap();
        assert_eq!(first, again);
        assert_eq!(first.len(), 64);

        std::fs::write(&path, "content 2").unwrap();
        let changed = source.resolve().await.unwrap();
        assert_ne!(first, changed);
    }

    #[tokio::test]
    async fn missing_checksum_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let source = ChecksumSource::File(dir.path().join("missing"));
        let err = source.resolve().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
