//! Multi-directory archives
//!
//! Packs several named directories into one artifact and restores them
//! to caller-chosen destinations. The artifact starts with a small
//! header (`DCA1` + compression marker) followed by a tar stream whose
//! first entry is a manifest of directory names. Each directory's tree
//! lives under `d<index>/` so names never leak into entry paths. The last
//! entry records how many tree entries precede it, so a stream cut short
//! on a block boundary is detected instead of restoring half a tree.

use crate::error::{DircacheError, DircacheResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{EntryType, Header};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Leading bytes of every artifact
const MAGIC: &[u8; 4] = b"DCA1";

/// Name of the manifest entry at the start of the tar stream
const MANIFEST_ENTRY: &str = "manifest.json";

/// Name of the entry closing the tar stream
const END_ENTRY: &str = "end.json";

/// Current manifest layout
const FORMAT_VERSION: u32 = 1;

/// Placeholder path used when an error concerns the artifact itself
const ARTIFACT_PATH: &str = "<artifact>";

/// A local directory tagged with a logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedDirectory {
    /// Logical name, the key inside the archive
    pub name: String,
    /// Local filesystem path
    pub path: PathBuf,
}

impl NamedDirectory {
    /// Create a named directory
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Parse `name:path`, or a bare `path` that names itself
    pub fn parse(arg: &str) -> Self {
        match arg.split_once(':') {
            Some((name, path)) if !path.is_empty() => Self::new(name, path),
            Some((name, _)) => Self::new(name, name),
            None => Self::new(arg, arg),
        }
    }
}

/// Reject operations where two directories share a logical name
pub fn ensure_unique_names(directories: &[NamedDirectory]) -> DircacheResult<()> {
    let mut seen = HashSet::new();
    for dir in directories {
        if dir.name.is_empty() {
            return Err(DircacheError::config("directory name must not be empty"));
        }
        if !seen.insert(dir.name.as_str()) {
            return Err(DircacheError::config(format!(
                "directory name '{}' given more than once",
                dir.name
            )));
        }
    }
    Ok(())
}

/// Compression applied to an artifact when it is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Tar stream stored verbatim
    None,
    /// Tar stream passed through gzip
    Gzip,
}

impl Compression {
    /// Map the CLI `--skip-compress` flag
    pub fn from_skip_flag(skip: bool) -> Self {
        if skip {
            Self::None
        } else {
            Self::Gzip
        }
    }

    fn marker(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
        }
    }

    fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveManifest {
    version: u32,
    directories: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveEnd {
    entries: u64,
}

/// Pack the given directories into one artifact
///
/// Every directory is read recursively. Fails with an archive error if
/// a path is missing, is not a directory or cannot be read.
pub fn archive(directories: &[NamedDirectory], compression: Compression) -> DircacheResult<Vec<u8>> {
    ensure_unique_names(directories)?;

    let manifest = ArchiveManifest {
        version: FORMAT_VERSION,
        directories: directories.iter().map(|d| d.name.clone()).collect(),
    };
    let manifest_bytes = serde_json::to_vec(&manifest)?;

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    append_json(&mut builder, MANIFEST_ENTRY, &manifest_bytes)?;

    let mut entries = 0;
    for (index, dir) in directories.iter().enumerate() {
        entries += append_directory(&mut builder, index, dir)?;
    }
    let end_bytes = serde_json::to_vec(&ArchiveEnd { entries })?;
    append_json(&mut builder, END_ENTRY, &end_bytes)?;

    let tar_bytes = builder
        .into_inner()
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?;

    let mut artifact = Vec::with_capacity(tar_bytes.len() + MAGIC.len() + 1);
    artifact.extend_from_slice(MAGIC);
    artifact.push(compression.marker());

    let artifact = match compression {
        Compression::None => {
            artifact.extend_from_slice(&tar_bytes);
            artifact
        }
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(artifact, flate2::Compression::default());
            encoder
                .write_all(&tar_bytes)
                .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?;
            encoder
                .finish()
                .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?
        }
    };

    debug!(
        "Archived {} directories into {} bytes ({:?})",
        directories.len(),
        artifact.len(),
        compression
    );
    Ok(artifact)
}

fn base_header() -> Header {
    let mut header = Header::new_gnu();
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn append_json(builder: &mut tar::Builder<Vec<u8>>, name: &str, bytes: &[u8]) -> DircacheResult<()> {
    let mut header = base_header();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(bytes.len() as u64);
    builder
        .append_data(&mut header, name, bytes)
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))
}

/// Append one directory tree, returning the number of entries written
fn append_directory(
    builder: &mut tar::Builder<Vec<u8>>,
    index: usize,
    dir: &NamedDirectory,
) -> DircacheResult<u64> {
    let root = dir.path.as_path();
    let metadata = fs::metadata(root).map_err(|e| DircacheError::archive(root, e))?;
    if !metadata.is_dir() {
        return Err(DircacheError::archive(root, "not a directory"));
    }

    let prefix = PathBuf::from(format!("d{}", index));
    let mut written = 0;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| DircacheError::archive(root, e))?;
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .map_err(|e| DircacheError::archive(path, e))?;
        let archive_path = prefix.join(rel);
        let file_type = entry.file_type();
        let metadata = entry.metadata().map_err(|e| DircacheError::archive(path, e))?;
        let mut header = base_header();
        header.set_mtime(modified_secs(&metadata));

        if file_type.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, &archive_path, io::empty())
                .map_err(|e| DircacheError::archive(path, e))?;
        } else if file_type.is_file() {
            header.set_entry_type(EntryType::Regular);
            header.set_mode(if is_executable(&metadata) { 0o755 } else { 0o644 });
            header.set_size(metadata.len());
            let file = File::open(path).map_err(|e| DircacheError::archive(path, e))?;
            builder
                .append_data(&mut header, &archive_path, file)
                .map_err(|e| DircacheError::archive(path, e))?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(path).map_err(|e| DircacheError::archive(path, e))?;
            header.set_entry_type(EntryType::Symlink);
            header.set_mode(0o777);
            header.set_size(0);
            builder
                .append_link(&mut header, &archive_path, &target)
                .map_err(|e| DircacheError::archive(path, e))?;
        } else {
            debug!("Skipping special file {}", path.display());
            continue;
        }
        written += 1;
    }

    Ok(written)
}

fn modified_secs(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

fn is_executable(metadata: &fs::Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        false
    }
}

/// Names of the directories stored in an artifact, in archive order
pub fn archived_directories(artifact: &[u8]) -> DircacheResult<Vec<String>> {
    let mut tar = open_tar(artifact)?;
    let mut entries = tar
        .entries()
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?;
    Ok(read_manifest(&mut entries)?.directories)
}

/// Restore an artifact into the requested destinations
///
/// Each archived directory is written to the path of the target with
/// the same name. With no targets, every directory is restored to a
/// path equal to its name. Returns the names that were restored.
pub fn unarchive(artifact: &[u8], targets: &[NamedDirectory]) -> DircacheResult<Vec<String>> {
    ensure_unique_names(targets)?;

    let mut tar = open_tar(artifact)?;
    let mut entries = tar
        .entries()
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?;
    let manifest = read_manifest(&mut entries)?;

    for target in targets {
        if !manifest.directories.contains(&target.name) {
            warn!(
                "Directory '{}' is not part of the cached archive, skipping",
                target.name
            );
        }
    }

    let destinations: Vec<Option<PathBuf>> = manifest
        .directories
        .iter()
        .map(|name| {
            if targets.is_empty() {
                Some(PathBuf::from(name))
            } else {
                targets
                    .iter()
                    .find(|t| &t.name == name)
                    .map(|t| t.path.clone())
            }
        })
        .collect();

    let mut seen: u64 = 0;
    let mut ended = false;

    for entry in entries {
        let mut entry = entry.map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?
            .into_owned();

        if ended {
            return Err(DircacheError::archive(&entry_path, "entry after end of archive"));
        }
        if entry_path.as_path() == Path::new(END_ENTRY) {
            let end: ArchiveEnd = read_json(&mut entry)?;
            if end.entries != seen {
                return Err(DircacheError::archive(
                    ARTIFACT_PATH,
                    format!("expected {} entries, found {}", end.entries, seen),
                ));
            }
            ended = true;
            continue;
        }

        seen += 1;
        let (index, rel) = split_entry_path(&entry_path)?;

        let dest_root = match destinations.get(index) {
            Some(Some(root)) => root,
            Some(None) => continue,
            None => {
                return Err(DircacheError::archive(
                    &entry_path,
                    format!("directory index {} missing from manifest", index),
                ))
            }
        };
        let dest = dest_root.join(&rel);

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&dest).map_err(|e| DircacheError::archive(&dest, e))?;
            }
            EntryType::Regular | EntryType::Symlink => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(|e| DircacheError::archive(parent, e))?;
                }
                remove_existing_file(&dest)?;
                entry
                    .unpack(&dest)
                    .map_err(|e| DircacheError::archive(&dest, e))?;
            }
            other => {
                debug!("Skipping unsupported entry {:?} at {}", other, entry_path.display());
            }
        }
    }

    if !ended {
        return Err(DircacheError::archive(
            ARTIFACT_PATH,
            format!("truncated artifact: stream ends after {} entries", seen),
        ));
    }

    let restored: Vec<String> = manifest
        .directories
        .into_iter()
        .zip(destinations)
        .filter_map(|(name, dest)| dest.map(|_| name))
        .collect();

    debug!("Restored {} directories", restored.len());
    Ok(restored)
}

fn open_tar(artifact: &[u8]) -> DircacheResult<tar::Archive<Box<dyn Read + '_>>> {
    if artifact.len() < MAGIC.len() + 1 {
        return Err(DircacheError::archive(ARTIFACT_PATH, "truncated artifact header"));
    }
    let (magic, rest) = artifact.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(DircacheError::archive(ARTIFACT_PATH, "not a dircache artifact"));
    }
    let (marker, payload) = rest.split_at(1);
    let compression = Compression::from_marker(marker[0]).ok_or_else(|| {
        DircacheError::archive(
            ARTIFACT_PATH,
            format!("unknown compression marker {}", marker[0]),
        )
    })?;

    let reader: Box<dyn Read + '_> = match compression {
        Compression::None => Box::new(payload),
        Compression::Gzip => Box::new(GzDecoder::new(payload)),
    };
    Ok(tar::Archive::new(reader))
}

fn read_manifest<R: Read>(entries: &mut tar::Entries<'_, R>) -> DircacheResult<ArchiveManifest> {
    let mut entry = match entries.next() {
        Some(entry) => entry.map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?,
        None => return Err(DircacheError::archive(ARTIFACT_PATH, "missing manifest")),
    };

    let is_manifest = entry
        .path()
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?
        .as_ref()
        == Path::new(MANIFEST_ENTRY);
    if !is_manifest {
        return Err(DircacheError::archive(ARTIFACT_PATH, "missing manifest"));
    }

    let manifest: ArchiveManifest = read_json(&mut entry)?;
    if manifest.version != FORMAT_VERSION {
        return Err(DircacheError::archive(
            ARTIFACT_PATH,
            format!("unsupported archive version {}", manifest.version),
        ));
    }
    Ok(manifest)
}

fn read_json<T: serde::de::DeserializeOwned>(entry: &mut impl Read) -> DircacheResult<T> {
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DircacheError::archive(ARTIFACT_PATH, format!("invalid metadata entry: {}", e)))
}

/// Split `d<index>/<rel>` and reject anything that could escape the destination
fn split_entry_path(path: &Path) -> DircacheResult<(usize, PathBuf)> {
    let mut components = path.components();

    let index = match components.next() {
        Some(Component::Normal(first)) => first
            .to_str()
            .and_then(|s| s.strip_prefix('d'))
            .and_then(|s| s.parse::<usize>().ok()),
        _ => None,
    }
    .ok_or_else(|| DircacheError::archive(path, "unexpected entry outside a directory"))?;

    let mut rel = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            _ => return Err(DircacheError::archive(path, "entry path escapes its directory")),
        }
    }
    Ok((index, rel))
}

fn remove_existing_file(dest: &Path) -> DircacheResult<()> {
    match fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => Err(DircacheError::archive(
            dest,
            "a directory is in the way of a cached file",
        )),
        Ok(_) => fs::remove_file(dest).map_err(|e| DircacheError::archive(dest, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DircacheError::archive(dest, e)),
    }
}
