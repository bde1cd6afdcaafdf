#![deny(missing_docs)]
//! Operator service of the commit-reveal entropy registry.
//!
//! The relayer plays the operator's part of the scheme. It has two halves that
//! share a [`SecretCache`](secret_cache::SecretCache):
//!
//! 1) Requesters ask the HTTP API for a commitment (`POST /api/v1/commit`).
//!    - the [`CommitSigner`](commit_signer::CommitSigner) draws a fresh operator seed and stores it in the secret cache
//!    - it signs the resulting commit id with the operator key and hands the signed tuple back
//!    - the requester submits the commitment to the registry on its own
//! 2) The reveal pipeline watches the ledger and reveals the commitments it signed.
//!    - a watcher processes the ledger block by block and reports new blocks and commitments
//!    - a scheduler keeps every commitment whose operator seed is known until it is confirmed
//!    - a single submitter sends the reveals from the operator account and owns its nonce
//!
//! The entry point for the binary is [`start`]. Tests and embedders that bring
//! their own ledger use [`spawn_relayer`] and [`routes`] directly.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use eyre::Context as _;
use git_version::git_version;
use secrecy::ExposeSecret as _;
use tokio::{signal, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{RelayerConfig, RevealConfig},
    services::{
        commit_signer::CommitSigner,
        event_watcher::LedgerEventWatcher,
        ledger_client::{LedgerClientService, alloy_ledger::AlloyLedgerClient},
        reveal_scheduler::RevealScheduler,
        reveal_submitter::RevealSubmitter,
        secret_cache::SecretCacheService,
    },
};

pub(crate) mod api;
pub mod config;
pub mod metrics;
pub(crate) mod services;
pub mod telemetry;

pub use api::routes;
pub use services::{commit_signer, ledger_client, secret_cache};

/// Returns cargo package name, cargo package version, and the git hash of the repository that was used to build the binary.
pub fn version_info() -> String {
    format!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or(git_version!(fallback = "UNKNOWN"))
    )
}

/// Main entry point for the relayer.
///
/// Connects to the registry, spawns the reveal pipeline and serves the HTTP API
/// until the shutdown signal is triggered or one of the two stops.
///
/// # Errors
/// Returns an error if:
/// - the wallet private key cannot be parsed
/// - the RPC node cannot be reached or the confirmations cannot be loaded
/// - the server cannot bind its address
pub async fn start(
    config: RelayerConfig,
    secret_cache: SecretCacheService,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> eyre::Result<()> {
    tracing::info!("starting entropy-relayer with config: {config:#?}");

    let signer = config
        .wallet_private_key
        .expose_secret()
        .parse::<PrivateKeySigner>()
        .context("while parsing wallet private key")?;
    tracing::info!("my wallet address: {}", signer.address());

    tracing::info!("init rpc provider..");
    let ledger = AlloyLedgerClient::connect(
        config.chain_ws_rpc_url.expose_secret(),
        config.registry_contract,
        signer.clone(),
    )
    .await
    .context("while connecting to CommitRevealRegistry contract")?;

    tracing::info!("loading confirmations..");
    let confirmations = ledger.confirmations().await?;
    tracing::info!("registry requires {confirmations} confirmations");

    let cancellation_token = spawn_shutdown_task(shutdown_signal);

    tracing::info!("spawning reveal pipeline..");
    let relayer = spawn_relayer(
        Arc::new(ledger),
        Arc::clone(&secret_cache),
        confirmations,
        &config.reveal,
        cancellation_token.clone(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("while binding tcp listener")?;

    let commit_signer = CommitSigner::new(
        signer,
        secret_cache,
        config.commit_lifetime,
        config.secret_grace_period,
    );
    let axum_rest_api = routes(commit_signer);

    let axum_cancel_token = cancellation_token.clone();
    let server = tokio::spawn(async move {
        tracing::info!(
            "starting axum server on {}",
            listener
                .local_addr()
                .map(|x| x.to_string())
                .unwrap_or(String::from("invalid addr"))
        );
        let axum_shutdown_signal = axum_cancel_token.clone();
        let axum_result = axum::serve(listener, axum_rest_api)
            .with_graceful_shutdown(async move { axum_shutdown_signal.cancelled().await })
            .await;
        tracing::info!("axum server shutdown");
        if let Err(err) = axum_result {
            tracing::error!("got error from axum: {err:?}");
        }
        // we cancel the token in case axum encountered an error to shutdown the service
        axum_cancel_token.cancel();
    });

    tracing::info!("everything started successfully - now waiting for shutdown...");
    cancellation_token.cancelled().await;

    tracing::info!(
        "waiting for shutdown of services (max wait time {:?})..",
        config.max_wait_time_shutdown
    );
    let relayer_result = match tokio::time::timeout(config.max_wait_time_shutdown, async move {
        tokio::join!(server, relayer)
    })
    .await
    {
        Ok((_, relayer_result)) => {
            tracing::info!("successfully finished shutdown in time");
            relayer_result
        }
        Err(_) => {
            tracing::warn!("could not finish shutdown in time");
            return Ok(());
        }
    };

    // a watcher that gave up is an error of the whole service
    relayer_result.context("reveal pipeline panicked")?
}

/// Spawns the reveal pipeline on `ledger`.
///
/// The pipeline consists of the ledger watcher, which drives the reveal
/// scheduler, and the reveal submitter. It runs until `cancellation_token` is
/// cancelled. If the watcher gives up, the returned handle resolves to the error
/// and the token is cancelled.
pub fn spawn_relayer(
    ledger: LedgerClientService,
    secret_cache: SecretCacheService,
    confirmations: u64,
    config: &RevealConfig,
    cancellation_token: CancellationToken,
) -> JoinHandle<eyre::Result<()>> {
    let submitter = RevealSubmitter::spawn(Arc::clone(&ledger), config.submitter_mailbox);
    let scheduler = RevealScheduler::new(
        Arc::clone(&ledger),
        secret_cache,
        submitter,
        confirmations,
        config,
    );
    let watcher = LedgerEventWatcher::new(
        ledger,
        scheduler,
        config.max_ledger_attempts,
        config.start_block,
    );
    let poll_interval = config.poll_interval;
    tokio::spawn(async move {
        watcher
            .run(poll_interval, cancellation_token)
            .await
            .context("while watching the ledger")
    })
}

/// Spawns a task that cancels the returned token on `shutdown_signal`.
///
/// The same token is used for internal shutdowns, e.g. a failing watcher or axum
/// server cancels it to bring down the whole service.
pub fn spawn_shutdown_task(
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> CancellationToken {
    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal => {
                tracing::info!("Received EXTERNAL shutdown");
                task_token.cancel();
            }
            _ = task_token.cancelled() => {
                tracing::info!("Received INTERNAL shutdown");
            }
        }
    });
    cancellation_token
}

/// The default shutdown signal for the entropy-relayer. Triggered when pressing CTRL+C on most systems.
pub async fn default_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
