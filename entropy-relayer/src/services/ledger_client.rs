//! Ledger access for the relayer.
//!
//! This module defines the [`LedgerClient`] trait, the single seam through which
//! the watcher, the scheduler and the submitter talk to the ledger.
//!
//! Current `LedgerClient` implementations:
//! - alloy (talks to a deployed `CommitRevealRegistry` over websockets)
//! - in-memory (wraps an [`InMemoryLedger`](entropy_registry::InMemoryLedger))

use std::sync::Arc;

use alloy::primitives::B256;
use async_trait::async_trait;
use entropy_types::{Commit, CommitId, RevealRequest, chain::CommitCreated};

pub mod alloy_ledger;
pub mod in_memory;

/// Dynamic trait object for the ledger client.
///
/// Must be `Send + Sync` to be shared between the watcher and the submitter.
pub type LedgerClientService = Arc<dyn LedgerClient + Send + Sync>;

/// Errors returned by [`LedgerClient::send_reveal`].
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The ledger refused to include the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The transaction carried a stale or future nonce and was not included.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),
    /// The transaction was included but the registry rejected the reveal.
    #[error("transaction {transaction_hash} reverted: {reason}")]
    Reverted {
        /// Hash of the reverted transaction.
        transaction_hash: B256,
        /// Human readable revert reason.
        reason: String,
    },
    /// The ledger could not be reached.
    #[error(transparent)]
    Transport(#[from] eyre::Report),
}

impl SubmissionError {
    /// Returns `true` if submitting the same reveal again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NonceConflict(_) | Self::Transport(_))
    }
}

/// Inclusion information of a reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealReceipt {
    /// Hash of the reveal transaction.
    pub transaction_hash: B256,
    /// Height of the including block.
    pub block_number: u64,
}

/// Read and write access to the commit-reveal registry on a ledger.
///
/// Writes are always sent from the operator account the client was created for.
#[async_trait]
pub trait LedgerClient {
    /// Height of the latest block.
    async fn block_number(&self) -> eyre::Result<u64>;

    /// The commitment creations emitted in the block at `height`, in emission order.
    async fn commit_created_events(&self, height: u64) -> eyre::Result<Vec<CommitCreated>>;

    /// The live commitment with this id, if any.
    async fn commit(&self, commit_id: CommitId) -> eyre::Result<Option<Commit>>;

    /// The nonce of the next transaction of the operator account.
    async fn transaction_count(&self) -> eyre::Result<u64>;

    /// Sends a reveal with the given nonce and waits until it is included.
    async fn send_reveal(
        &self,
        nonce: u64,
        request: RevealRequest,
    ) -> Result<RevealReceipt, SubmissionError>;
}
