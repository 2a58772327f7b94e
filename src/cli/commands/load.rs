//! load-fs command - download an entry and restore its directories

use crate::cache::ensure_unique_names;
use crate::cli::args::LoadArgs;
use crate::cli::commands::orchestrator_for;
use crate::config::Config;
use crate::error::DircacheResult;
use crate::orchestration::{LoadOutcome, MissingCachePolicy};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the load-fs command
pub async fn execute(args: LoadArgs, config: &Config) -> DircacheResult<()> {
    let ctx = UiContext::detect();
    let coords = args.coords.coordinates()?;
    ensure_unique_names(&args.directories)?;
    let policy = args.on_inexistant_cache.unwrap_or(config.store.on_missing);
    let orchestrator = orchestrator_for(&coords, config).await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Loading cache from {}", coords.resolve()));

    let outcome = match orchestrator.load(&coords, &args.directories, policy).await {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.stop_error("Failed to load cache");
            return Err(e);
        }
    };

    match outcome {
        LoadOutcome::Restored(names) => {
            spinner.stop("Cache loaded");
            ui::step_ok_detail(&ctx, "Restored", &names.join(", "));
        }
        LoadOutcome::Missing if policy == MissingCachePolicy::Warn => {
            spinner.stop_warn("No cache entry found");
        }
        LoadOutcome::Missing => {
            spinner.stop("No cache entry, nothing restored");
        }
    }

    Ok(())
}
