//! Meridian deployer binary.
//!
//! Usage: `meridian-deployer [CONFIG_PATH]`. The configuration file is
//! required; settings can be overridden with `MERIDIAN_` environment
//! variables.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use meridian_deployer::config::DEFAULT_CONFIG_PATH;
use meridian_deployer::service::shutdown_signal;
use meridian_deployer::{DeployerConfig, ReconcileService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("meridian_deployer=info".parse()?)
                .add_directive("meridian_nuvla=info".parse()?),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());

    let config = match DeployerConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path, error = %e, "failed to load config");
            return Err(e.into());
        }
    };

    info!(
        path = %config_path,
        job_manager = %config.job_manager.url,
        nuvla = %config.nuvla.url,
        "configuration loaded"
    );

    let service = match ReconcileService::connect(&config).await {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "failed to start");
            return Err(e.into());
        }
    };

    tokio::spawn(shutdown_signal(service.cancel_token()));

    info!("deployment manager started");
    service.run().await;

    Ok(())
}
