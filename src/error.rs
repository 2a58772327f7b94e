//! Error types for dircache
//!
//! All modules use `DircacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dircache operations
pub type DircacheResult<T> = Result<T, DircacheError>;

/// Broad classification of an error, used by callers that branch on
/// the failure family rather than the exact variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid input detected before any I/O
    Configuration,
    /// No cache entry at the requested coordinate
    NotFound,
    /// Remote store unreachable or answered with an unexpected status
    Transport,
    /// Credentials missing, invalid or expired
    Auth,
    /// Malformed artifact or unreadable local directory
    Archive,
    /// Rebuild command exited unsuccessfully
    CommandFailure,
    /// Local filesystem or process plumbing failure
    Io,
    /// Anything else
    Internal,
}

/// All errors that can occur in dircache
#[derive(Error, Debug)]
pub enum DircacheError {
    // Configuration errors
    #[error("Invalid arguments: {0}")]
    Configuration(String),

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache lookup outcomes surfaced as errors
    #[error("No cache entry found for {coordinate}")]
    CacheNotFound { coordinate: String },

    #[error("Cache for coords {coordinate} doesn't exist !")]
    CacheMissing { coordinate: String },

    // Remote store errors
    #[error("Transport error on {key}: {reason}")]
    Transport { key: String, reason: String },

    #[error("No credentials available for the bucket")]
    NotAuthenticated,

    #[error("Credentials rejected by the bucket: {reason}")]
    AuthRejected { reason: String },

    #[error("GCP credential error: {0}")]
    GcpCredential(String),

    // Archive errors
    #[error("Archive error at {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    // Process errors
    #[error("Cacheable command failed: {command}, exit code: {}", display_code(.code))]
    CommandFailure { command: String, code: Option<i32> },

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| c.to_string())
}

impl DircacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }

    /// Create an archive error for a path
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a transport error for an object key
    pub fn transport(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::ConfigInvalid { .. } => ErrorKind::Configuration,
            Self::CacheNotFound { .. } | Self::CacheMissing { .. } => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::NotAuthenticated | Self::AuthRejected { .. } | Self::GcpCredential(_) => {
                ErrorKind::Auth
            }
            Self::Archive { .. } => ErrorKind::Archive,
            Self::CommandFailure { .. } => ErrorKind::CommandFailure,
            Self::ConfigDirCreate { .. } | Self::CommandFailed { .. } | Self::Io { .. } => {
                ErrorKind::Io
            }
            Self::Json(_) | Self::TomlSerialize(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NotAuthenticated | Self::AuthRejected { .. } => {
                Some("Run: dircache auth --key-config-file <service-account.json>")
            }
            Self::GcpCredential(_) => Some("Check that gcloud is installed and on PATH"),
            Self::CacheNotFound { .. } => {
                Some("Use --on-inexistant-cache ignore to tolerate a cold cache")
            }
            _ => None,
        }
    }
}
