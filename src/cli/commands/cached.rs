//! cached-fs command - restore on checksum match, rebuild otherwise

use crate::cache::{ensure_unique_names, ChecksumSource, Compression};
use crate::cli::args::CachedArgs;
use crate::cli::commands::orchestrator_for;
use crate::config::Config;
use crate::error::DircacheResult;
use crate::orchestration::{CachedBuild, CachedBuildOutcome};
use crate::ui::{self, UiContext};

/// Execute the cached-fs command
pub async fn execute(args: CachedArgs, config: &Config) -> DircacheResult<()> {
    let ctx = UiContext::detect();
    let coords = args.coords.coordinates()?;
    ensure_unique_names(&args.directories)?;
    let checksum = ChecksumSource::from_options(args.checksum_file, args.checksum_value)?;

    let request = CachedBuild {
        directories: args.directories,
        checksum,
        command: args.cacheable_command,
        root_dir: args.root_dir,
        compression: Compression::from_skip_flag(args.skip_compress || !config.store.compress),
    };

    let orchestrator = orchestrator_for(&coords, config).await?;

    // No spinner here: the rebuild command writes straight to the terminal
    ui::step_info(&ctx, &format!("Checking cache at {}", coords.resolve()));

    match orchestrator.cached_build(&coords, &request).await? {
        CachedBuildOutcome::Hit { restored } => {
            ui::step_ok_detail(&ctx, "Checksum matched, cache restored", &restored.join(", "));
        }
        CachedBuildOutcome::Rebuilt { size_bytes } => {
            ui::step_ok_detail(
                &ctx,
                "Rebuilt and stored cache",
                &ui::format_bytes(size_bytes),
            );
        }
    }

    Ok(())
}
