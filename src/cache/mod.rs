//! Remote directory cache
//!
//! Stores named directories in a bucket under a logical coordinate and
//! restores them when a checksum proves nothing changed.
//!
//! # Entry Layout
//!
//! | Object | Content |
//! |--------|---------|
//! | `<app>/<branch>/<cache-name>/archive` | Directory archive, optionally gzipped |
//! | `<app>/<branch>/<cache-name>/entry.json` | Checksum stamp, written last |
//!
//! Entries are overwritten in place: the coordinate, not the content,
//! is the key.

pub mod archive;
pub mod checksum;
pub mod coordinate;
pub mod entry;
pub mod store;

pub use archive::{archive, ensure_unique_names, unarchive, Compression, NamedDirectory};
pub use checksum::{decide, ChecksumSource, GateDecision};
pub use coordinate::{BucketUrl, CacheCoordinates, CacheLocation, DEFAULT_BRANCH};
pub use entry::EntryStamp;
pub use store::CacheStore;
