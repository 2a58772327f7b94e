//! CLI command implementations

pub mod auth;
pub mod cached;
pub mod completions;
pub mod config;
pub mod exists;
pub mod load;
pub mod store;

pub use auth::execute as auth;
pub use cached::execute as cached;
pub use completions::execute as completions;
pub use config::execute as config;
pub use exists::execute as exists;
pub use load::execute as load;
pub use store::execute as store;

use crate::cache::{CacheCoordinates, CacheStore};
use crate::config::Config;
use crate::credentials::resolve_access_token;
use crate::error::DircacheResult;
use crate::orchestration::{CacheOrchestrator, ShellRunner};
use crate::transport::{create_transport, needs_credentials};
use tracing::debug;

/// Wire the transport for the coordinate's bucket into an orchestrator
pub(crate) async fn orchestrator_for(
    coords: &CacheCoordinates,
    config: &Config,
) -> DircacheResult<CacheOrchestrator> {
    let token = if needs_credentials(&coords.bucket) {
        Some(resolve_access_token(config).await?)
    } else {
        None
    };

    let transport = create_transport(&coords.bucket, &config.gcs, token)?;
    debug!("Using {} transport for {}", transport.transport_name(), coords.bucket);

    Ok(CacheOrchestrator::new(
        CacheStore::new(transport),
        Box::new(ShellRunner::new()),
    ))
}
