//! Configuration types and CLI/environment parsing for the entropy relayer.
//!
//! Every option can be set as a command line argument or through its
//! `ENTROPY_RELAYER_*` environment variable. The reveal pipeline options live in
//! [`RevealConfig`], which is flattened into [`RelayerConfig`].

use std::{net::SocketAddr, time::Duration};

use alloy::primitives::Address;
use clap::{Args, Parser};
use secrecy::SecretString;

/// The configuration of the relayer service.
#[derive(Parser, Debug)]
pub struct RelayerConfig {
    /// The bind addr of the AXUM server
    #[clap(long, env = "ENTROPY_RELAYER_BIND_ADDR", default_value = "0.0.0.0:4321")]
    pub bind_addr: SocketAddr,

    /// The websocket rpc url of the chain
    #[clap(
        long,
        env = "ENTROPY_RELAYER_CHAIN_WS_RPC_URL",
        default_value = "ws://127.0.0.1:8545"
    )]
    pub chain_ws_rpc_url: SecretString,

    /// The address of the CommitRevealRegistry contract.
    #[clap(long, env = "ENTROPY_RELAYER_REGISTRY_CONTRACT")]
    pub registry_contract: Address,

    /// The operator's wallet private key. Signs commitments and pays for reveals.
    #[clap(long, env = "ENTROPY_RELAYER_WALLET_PRIVATE_KEY")]
    pub wallet_private_key: SecretString,

    /// How long a signed commitment stays valid.
    ///
    /// Used as the signature expiration and as the ttl of the operator seed in
    /// the secret cache.
    #[clap(
        long,
        env = "ENTROPY_RELAYER_COMMIT_LIFETIME",
        default_value = "1h",
        value_parser = humantime::parse_duration
    )]
    pub commit_lifetime: Duration,

    /// Extra time an operator seed stays in the secret cache after its signature expired.
    ///
    /// Covers commitments mined right before the expiration that are observed
    /// later. Should exceed `confirmations × block time` plus a few poll intervals.
    #[clap(
        long,
        env = "ENTROPY_RELAYER_SECRET_GRACE_PERIOD",
        default_value = "5min",
        value_parser = humantime::parse_duration
    )]
    pub secret_grace_period: Duration,

    /// Interval of the task that evicts expired operator seeds.
    #[clap(
        long,
        env = "ENTROPY_RELAYER_SECRET_CACHE_CLEANUP_INTERVAL",
        default_value = "1min",
        value_parser = humantime::parse_duration
    )]
    pub secret_cache_cleanup_interval: Duration,

    /// Max time we wait for the reveal pipeline to stop during shutdown.
    #[clap(
        long,
        env = "ENTROPY_RELAYER_MAX_WAIT_TIME_SHUTDOWN",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub max_wait_time_shutdown: Duration,

    /// Options of the watcher and scheduler.
    #[clap(flatten)]
    pub reveal: RevealConfig,
}

/// Options of the ledger watcher, the reveal scheduler and the submitter.
#[derive(Args, Debug, Clone)]
pub struct RevealConfig {
    /// Cadence of the ledger watcher.
    #[clap(
        long,
        env = "ENTROPY_RELAYER_POLL_INTERVAL",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,

    /// First height the watcher processes. Defaults to the head at startup.
    #[clap(long, env = "ENTROPY_RELAYER_START_BLOCK")]
    pub start_block: Option<u64>,

    /// Consecutive failed ledger queries after which the watcher stops.
    #[clap(long, env = "ENTROPY_RELAYER_MAX_LEDGER_ATTEMPTS", default_value = "3")]
    pub max_ledger_attempts: usize,

    /// How often a reveal that failed for a transient reason is re-queued.
    ///
    /// `0` attempts every reveal exactly once.
    #[clap(long, env = "ENTROPY_RELAYER_MAX_REVEAL_RETRIES", default_value = "0")]
    pub max_reveal_retries: u32,

    /// Blocks to wait before the first re-attempt. Doubles with every attempt.
    #[clap(
        long,
        env = "ENTROPY_RELAYER_REVEAL_RETRY_BACKOFF_BLOCKS",
        default_value = "1"
    )]
    pub reveal_retry_backoff_blocks: u64,

    /// Mailbox size of the reveal submitter.
    #[clap(long, env = "ENTROPY_RELAYER_SUBMITTER_MAILBOX", default_value = "32")]
    pub submitter_mailbox: usize,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            start_block: None,
            max_ledger_attempts: 3,
            max_reveal_retries: 0,
            reveal_retry_backoff_blocks: 1,
            submitter_mailbox: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_clap_defaults() -> eyre::Result<()> {
        let config = RelayerConfig::try_parse_from([
            "entropy-relayer",
            "--registry-contract",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "--wallet-private-key",
            "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        ])?;
        let defaults = RevealConfig::default();
        assert_eq!(config.reveal.poll_interval, defaults.poll_interval);
        assert_eq!(config.reveal.start_block, defaults.start_block);
        assert_eq!(config.reveal.max_ledger_attempts, defaults.max_ledger_attempts);
        assert_eq!(config.reveal.max_reveal_retries, defaults.max_reveal_retries);
        assert_eq!(
            config.reveal.reveal_retry_backoff_blocks,
            defaults.reveal_retry_backoff_blocks
        );
        assert_eq!(config.reveal.submitter_mailbox, defaults.submitter_mailbox);
        assert_eq!(config.commit_lifetime, Duration::from_secs(3600));
        assert_eq!(config.secret_grace_period, Duration::from_secs(300));
        Ok(())
    }
}
