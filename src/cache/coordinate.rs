//! Cache coordinates and their resolution to remote object keys
//!
//! A coordinate is the sole addressing key of a cache entry. It is not
//! content-addressed: writing to a coordinate replaces what was there.

use crate::error::{DircacheError, DircacheResult};
use std::fmt;
use std::path::PathBuf;

/// Branch used when none was given, so runs that never name a branch
/// keep sharing one entry
pub const DEFAULT_BRANCH: &str = "unknown-branch";

/// Object name of the archive inside an entry prefix
pub const ARCHIVE_OBJECT: &str = "archive";

/// Object name of the checksum stamp inside an entry prefix
pub const STAMP_OBJECT: &str = "entry.json";

/// Location of the bucket backing the cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketUrl {
    /// Google Cloud Storage bucket (`gs://<bucket>[/<prefix>]`)
    Gcs { bucket: String, prefix: String },
    /// Local directory acting as a bucket (`file://<dir>`)
    Local { root: PathBuf },
}

impl BucketUrl {
    /// Parse a bucket URL
    pub fn parse(url: &str) -> DircacheResult<Self> {
        let url = url.trim();

        if let Some(rest) = url.strip_prefix("gs://") {
            let rest = rest.trim_matches('/');
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(DircacheError::config(format!(
                    "bucket url '{url}' has no bucket name"
                )));
            }
            return Ok(Self::Gcs {
                bucket: bucket.to_string(),
                prefix: prefix.trim_matches('/').to_string(),
            });
        }

        if let Some(rest) = url.strip_prefix("file://") {
            if rest.is_empty() {
                return Err(DircacheError::config(format!(
                    "bucket url '{url}' has no directory"
                )));
            }
            return Ok(Self::Local {
                root: PathBuf::from(rest),
            });
        }

        Err(DircacheError::config(format!(
            "unsupported bucket url '{url}' (expected gs://<name> or file://<dir>)"
        )))
    }

    /// Key prefix shared by every entry in this bucket
    fn key_prefix(&self) -> &str {
        match self {
            Self::Gcs { prefix, .. } => prefix,
            Self::Local { .. } => "",
        }
    }
}

impl fmt::Display for BucketUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gcs { bucket, prefix } if prefix.is_empty() => write!(f, "gs://{}", bucket),
            Self::Gcs { bucket, prefix } => write!(f, "gs://{}/{}", bucket, prefix),
            Self::Local { root } => write!(f, "file://{}", root.display()),
        }
    }
}

/// Logical cache coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheCoordinates {
    /// Bucket holding the entry
    pub bucket: BucketUrl,
    /// Application identifier
    pub app: String,
    /// Branch name, normalized to [`DEFAULT_BRANCH`] when absent
    pub branch: String,
    /// Cache name within the app and branch
    pub cache_name: String,
}

impl CacheCoordinates {
    /// Build coordinates from raw user input
    ///
    /// Fails with a configuration error when a required field is empty
    /// or the bucket url cannot be parsed.
    pub fn new(
        bucket_url: &str,
        app: &str,
        branch: Option<&str>,
        cache_name: &str,
    ) -> DircacheResult<Self> {
        let bucket = BucketUrl::parse(bucket_url)?;

        if app.trim().is_empty() {
            return Err(DircacheError::config("app identifier must not be empty"));
        }
        if cache_name.trim().is_empty() {
            return Err(DircacheError::config("cache name must not be empty"));
        }

        Ok(Self {
            bucket,
            app: app.to_string(),
            branch: normalize_branch(branch),
            cache_name: cache_name.to_string(),
        })
    }

    /// Resolve the coordinate to its location in the bucket
    pub fn resolve(&self) -> CacheLocation {
        let segments = [
            escape_segment(&self.app),
            escape_segment(&self.branch),
            escape_segment(&self.cache_name),
        ]
        .join("/");

        let prefix = match self.bucket.key_prefix() {
            "" => segments,
            base => format!("{}/{}", base, segments),
        };

        CacheLocation {
            bucket: self.bucket.clone(),
            prefix,
        }
    }
}

impl fmt::Display for CacheCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolve())
    }
}

/// Resolved location of an entry: a bucket and an object prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheLocation {
    /// Bucket holding the entry
    pub bucket: BucketUrl,
    /// Object prefix of the entry inside the bucket
    pub prefix: String,
}

impl CacheLocation {
    /// Key of the archive object
    pub fn archive_key(&self) -> String {
        format!("{}/{}", self.prefix, ARCHIVE_OBJECT)
    }

    /// Key of the stamp object
    pub fn stamp_key(&self) -> String {
        format!("{}/{}", self.prefix, STAMP_OBJECT)
    }
}

impl fmt::Display for CacheLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bucket {
            BucketUrl::Gcs { bucket, .. } => write!(f, "gs://{}/{}", bucket, self.prefix),
            BucketUrl::Local { root } => write!(f, "file://{}/{}", root.display(), self.prefix),
        }
    }
}

/// Normalize an optional branch to a non-empty name
pub fn normalize_branch(branch: Option<&str>) -> String {
    match branch.map(str::trim) {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => DEFAULT_BRANCH.to_string(),
    }
}

/// Escape a coordinate field so it occupies exactly one key segment
fn escape_segment(field: &str) -> String {
    let escaped = field.replace('%', "%25").replace('/', "%2F");
    if escaped == "." || escaped == ".." {
        escaped.replace('.', "%2E")
    } else {
        escaped
    }
}
