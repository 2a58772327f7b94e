//! dircache - Remote, checksum-gated cache for build directories
//!
//! Stores named directories as one archive in a bucket addressed by
//! app, branch and cache name. A checksum recorded with each entry lets
//! `cached-fs` skip a rebuild when its inputs have not changed.

pub mod cache;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestration;
pub mod transport;
pub mod ui;

pub use error::{DircacheError, DircacheResult};
