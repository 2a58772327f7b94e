//! fs-exists command

use crate::cli::args::ExistsArgs;
use crate::cli::commands::orchestrator_for;
use crate::config::Config;
use crate::error::{DircacheError, DircacheResult};

/// Execute the fs-exists command
///
/// Prints `Cache exists !` on success; a missing entry is an error so
/// the process exits non-zero.
pub async fn execute(args: ExistsArgs, config: &Config) -> DircacheResult<()> {
    let coords = args.coords.coordinates()?;
    let orchestrator = orchestrator_for(&coords, config).await?;

    if orchestrator.exists(&coords).await? {
        println!("Cache exists !");
        Ok(())
    } else {
        Err(DircacheError::CacheMissing {
            coordinate: coords.resolve().to_string(),
        })
    }
}
