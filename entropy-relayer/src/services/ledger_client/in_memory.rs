//! [`LedgerClient`] on top of an [`InMemoryLedger`].
//!
//! Used for local development and for tests of the reveal pipeline.

use alloy::primitives::Address;
use async_trait::async_trait;
use entropy_registry::{InMemoryLedger, LedgerError, RegistryCall, Transaction};
use entropy_types::{
    Commit, CommitId, RevealRequest,
    chain::{CommitCreated, RegistryEvent},
};

use crate::services::ledger_client::{LedgerClient, RevealReceipt, SubmissionError};

/// Sends reveals to an [`InMemoryLedger`] as the operator account.
#[derive(Clone)]
pub struct InMemoryLedgerClient {
    ledger: InMemoryLedger,
    operator: Address,
}

impl InMemoryLedgerClient {
    /// Creates a client that submits from `operator`.
    pub fn new(ledger: InMemoryLedger, operator: Address) -> Self {
        Self { ledger, operator }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedgerClient {
    async fn block_number(&self) -> eyre::Result<u64> {
        Ok(self.ledger.block_number())
    }

    async fn commit_created_events(&self, height: u64) -> eyre::Result<Vec<CommitCreated>> {
        Ok(self
            .ledger
            .events_at(height)?
            .into_iter()
            .filter_map(|event| match event {
                RegistryEvent::CommitCreated(created) => Some(created),
                RegistryEvent::SeedRevealed(_) => None,
            })
            .collect())
    }

    async fn commit(&self, commit_id: CommitId) -> eyre::Result<Option<Commit>> {
        Ok(self.ledger.commit(commit_id))
    }

    async fn transaction_count(&self) -> eyre::Result<u64> {
        Ok(self.ledger.nonce(self.operator))
    }

    async fn send_reveal(
        &self,
        nonce: u64,
        request: RevealRequest,
    ) -> Result<RevealReceipt, SubmissionError> {
        let tx = Transaction {
            from: self.operator,
            nonce,
            call: RegistryCall::Reveal(request),
        };
        match self.ledger.submit(tx) {
            Ok(receipt) => Ok(RevealReceipt {
                transaction_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            }),
            Err(err @ LedgerError::NonceMismatch { .. }) => {
                Err(SubmissionError::NonceConflict(err.to_string()))
            }
            Err(LedgerError::Reverted {
                transaction_hash,
                reason,
                ..
            }) => Err(SubmissionError::Reverted {
                transaction_hash,
                reason: reason.to_string(),
            }),
            Err(err @ LedgerError::UnknownBlock(_)) => {
                Err(SubmissionError::Transport(eyre::Report::new(err)))
            }
        }
    }
}
