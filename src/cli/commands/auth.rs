//! auth command - install a service account key for bucket access

use crate::cli::args::AuthArgs;
use crate::config::{Config, ConfigManager};
use crate::credentials::key::{store_key, validate_key};
use crate::credentials::{GcpCredentials, KeySource, TokenCache};
use crate::error::DircacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the auth command
pub async fn execute(args: AuthArgs, config: &Config) -> DircacheResult<()> {
    let ctx = UiContext::detect();
    let source = KeySource::from_options(args.key_config_url, args.key_config_file)?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Fetching service account key");

    let result = async {
        let bytes = source.fetch(config.gcs.timeout_secs).await?;
        let account = validate_key(&bytes)?;

        spinner.message(&format!("Activating {}", account));
        let key_path = store_key(&ConfigManager::credentials_dir(), &bytes).await?;
        GcpCredentials::activate_service_account(&key_path).await?;

        // A token minted for the previous account must not be reused
        TokenCache::new().await?.remove(GcpCredentials::CACHE_KEY).await?;
        Ok::<_, crate::error::DircacheError>((account, key_path))
    }
    .await;

    match result {
        Ok((account, key_path)) => {
            spinner.stop("Authenticated");
            ui::key_value(&ctx, "account", &account);
            ui::key_value(&ctx, "key", &key_path.display().to_string());
            Ok(())
        }
        Err(e) => {
            spinner.stop_error("Authentication failed");
            Err(e)
        }
    }
}
