//! CLI argument definitions using clap derive

use crate::cache::{CacheCoordinates, NamedDirectory};
use crate::error::DircacheResult;
use crate::orchestration::MissingCachePolicy;
use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// dircache - Remote cache for build directories
///
/// Stores directories such as node_modules or target/ in a bucket keyed
/// by app, branch and cache name, and only rebuilds them when a
/// checksum changes.
#[derive(Parser, Debug)]
#[command(name = "dircache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DIRCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate against your GCS bucket with a service account key
    Auth(AuthArgs),

    /// Store directories into the cache
    StoreFs(StoreArgs),

    /// Load directories previously stored into the cache
    LoadFs(LoadArgs),

    /// Tell whether a cache entry exists
    FsExists(ExistsArgs),

    /// Load directories from cache, or rebuild and store them when the checksum changed
    CachedFs(CachedArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Options shared by every command addressing a cache entry
#[derive(Args, Debug, Clone)]
pub struct CoordinateArgs {
    /// Bucket url (gs://<name>[/prefix] or file:///path)
    #[arg(long, env = "DIRCACHE_BUCKET_URL")]
    pub bucket_url: String,

    /// Your app identifier
    #[arg(long, env = "DIRCACHE_APP")]
    pub app: String,

    /// Cache branch name (defaults to unknown-branch)
    #[arg(long, env = "DIRCACHE_BRANCH")]
    pub branch: Option<String>,

    /// Cache name
    #[arg(long)]
    pub cache_name: String,
}

impl CoordinateArgs {
    /// Validate and build the cache coordinates
    pub fn coordinates(&self) -> DircacheResult<CacheCoordinates> {
        CacheCoordinates::new(
            &self.bucket_url,
            &self.app,
            self.branch.as_deref(),
            &self.cache_name,
        )
    }
}

/// Arguments for the auth command
#[derive(Parser, Debug)]
#[command(group(clap::ArgGroup::new("key").required(true).args(["key_config_url", "key_config_file"])))]
pub struct AuthArgs {
    /// Url from where to download your Google service account JSON key
    #[arg(long)]
    pub key_config_url: Option<String>,

    /// Local file containing your Google service account JSON key
    #[arg(long)]
    pub key_config_file: Option<PathBuf>,
}

/// Arguments for the store-fs command
#[derive(Parser, Debug)]
pub struct StoreArgs {
    #[command(flatten)]
    pub coords: CoordinateArgs,

    /// Avoid compressing files before sending them to the store
    #[arg(long)]
    pub skip_compress: bool,

    /// Directories to store, as `name:path` or `path`
    #[arg(value_name = "DIRECTORY", required = true, value_parser = parse_named_directory)]
    pub directories: Vec<NamedDirectory>,
}

/// Arguments for the load-fs command
#[derive(Parser, Debug)]
pub struct LoadArgs {
    #[command(flatten)]
    pub coords: CoordinateArgs,

    /// What to do when the cache doesn't exist (default from config: ignore)
    #[arg(long, value_enum)]
    pub on_inexistant_cache: Option<MissingCachePolicy>,

    /// Directories to restore, as `name:path` or `path` (all when omitted)
    #[arg(value_name = "DIRECTORY", value_parser = parse_named_directory)]
    pub directories: Vec<NamedDirectory>,
}

/// Arguments for the fs-exists command
#[derive(Parser, Debug)]
pub struct ExistsArgs {
    #[command(flatten)]
    pub coords: CoordinateArgs,
}

/// Arguments for the cached-fs command
#[derive(Parser, Debug)]
#[command(group(clap::ArgGroup::new("checksum").required(true).args(["checksum_file", "checksum_value"])))]
pub struct CachedArgs {
    #[command(flatten)]
    pub coords: CoordinateArgs,

    /// File whose content decides whether the cache can be reused
    #[arg(long)]
    pub checksum_file: Option<PathBuf>,

    /// Literal checksum deciding whether the cache can be reused
    #[arg(long)]
    pub checksum_value: Option<String>,

    /// Command reproducing the directories when the cache is invalidated
    #[arg(long)]
    pub cacheable_command: String,

    /// Directory the cacheable command runs from
    #[arg(long)]
    pub root_dir: Option<PathBuf>,

    /// Avoid compressing files before sending them to the store
    #[arg(long)]
    pub skip_compress: bool,

    /// Directories produced by the command, as `name:path` or `path`
    #[arg(value_name = "DIRECTORY", required = true, value_parser = parse_named_directory)]
    pub directories: Vec<NamedDirectory>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_named_directory(s: &str) -> Result<NamedDirectory, String> {
    if s.is_empty() {
        return Err("directory must not be empty".to_string());
    }
    Ok(NamedDirectory::parse(s))
}
