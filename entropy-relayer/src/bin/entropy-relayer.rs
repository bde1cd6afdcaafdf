//! Entropy Relayer Binary
//!
//! This is the main entry point for the entropy relayer.
//! It initializes tracing, metrics, and starts the service with configuration
//! from command-line arguments or environment variables.

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use entropy_relayer::{
    config::RelayerConfig, secret_cache::in_memory::InMemorySecretCache, telemetry,
};

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    let telemetry_config = telemetry::ServiceConfig::try_from_env()?;
    telemetry::initialize_tracing(&telemetry_config)?;
    entropy_relayer::metrics::describe_metrics();
    tracing::info!("{}", entropy_relayer::version_info());

    let config = RelayerConfig::parse();
    let secret_cache = Arc::new(InMemorySecretCache::init(
        config.secret_cache_cleanup_interval,
    ));

    let result = entropy_relayer::start(
        config,
        secret_cache,
        entropy_relayer::default_shutdown_signal(),
    )
    .await;
    match result {
        Ok(()) => {
            tracing::info!("good night!");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            // we don't want to double print the error therefore we just return FAILURE
            tracing::error!("{err:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}
