//! Orchestration of cache workflows
//!
//! Composes the coordinate resolver, checksum gate, archiver, remote
//! store and rebuild executor into the four user-facing workflows.

mod executor;
mod orchestrator;

pub use executor::{CommandRunner, ShellRunner};
pub use orchestrator::{
    CacheOrchestrator, CachedBuild, CachedBuildOutcome, LoadOutcome, MissingCachePolicy,
};
