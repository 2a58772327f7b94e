//! store-fs command - archive directories and upload them

use crate::cache::{ensure_unique_names, Compression};
use crate::cli::args::StoreArgs;
use crate::cli::commands::orchestrator_for;
use crate::config::Config;
use crate::error::DircacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the store-fs command
pub async fn execute(args: StoreArgs, config: &Config) -> DircacheResult<()> {
    let ctx = UiContext::detect();
    let coords = args.coords.coordinates()?;
    ensure_unique_names(&args.directories)?;
    let orchestrator = orchestrator_for(&coords, config).await?;

    // --skip-compress wins; otherwise the config decides
    let compression = Compression::from_skip_flag(args.skip_compress || !config.store.compress);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Storing cache to {}", coords.resolve()));

    match orchestrator
        .store(&coords, &args.directories, compression, None)
        .await
    {
        Ok(size) => {
            spinner.stop("Cache stored");
            ui::step_ok_detail(&ctx, "Uploaded archive", &ui::format_bytes(size));
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Failed to store cache");
            Err(e)
        }
    }
}
