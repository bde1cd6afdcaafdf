//! Alloy-based ledger client.
//!
//! Talks to a deployed `CommitRevealRegistry` over a websocket connection. Reveals
//! are sent with an explicit nonce and the client waits for their receipt.

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider as _, ProviderBuilder, WsConnect},
    rpc::types::Filter,
    signers::local::PrivateKeySigner,
    sol_types::SolEvent as _,
};
use async_trait::async_trait;
use entropy_types::{
    Commit, CommitId, RevealRequest,
    chain::{CommitCreated, CommitRevealRegistry},
};
use eyre::Context as _;
use tracing::instrument;

use crate::services::ledger_client::{LedgerClient, RevealReceipt, SubmissionError};

/// [`LedgerClient`] backed by an RPC node.
pub struct AlloyLedgerClient {
    provider: DynProvider,
    contract_address: Address,
    operator: Address,
}

impl AlloyLedgerClient {
    /// Connects to the RPC node at `rpc_url` with the operator's wallet.
    pub async fn connect(
        rpc_url: &str,
        contract_address: Address,
        signer: PrivateKeySigner,
    ) -> eyre::Result<Self> {
        tracing::debug!("connecting to {rpc_url}...");
        let operator = signer.address();
        let ws = WsConnect::new(rpc_url);
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_ws(ws)
            .await
            .context("while connecting to RPC")?;
        Ok(Self {
            provider: provider.erased(),
            contract_address,
            operator,
        })
    }

    /// Loads the confirmation depth of the registry.
    pub async fn confirmations(&self) -> eyre::Result<u64> {
        let contract = CommitRevealRegistry::new(self.contract_address, self.provider.clone());
        let confirmations = contract
            .confirmations()
            .call()
            .await
            .context("while loading confirmations")?;
        u64::try_from(confirmations).context("confirmations do not fit into u64")
    }
}

/// Maps a failed `send` to a [`SubmissionError`].
///
/// Nodes only report nonce problems and reverting estimates as RPC error
/// messages, so we match on the message.
fn classify_send_error(err: alloy::contract::Error) -> SubmissionError {
    let message = err.to_string();
    let lowercase = message.to_lowercase();
    if lowercase.contains("nonce too low")
        || lowercase.contains("nonce too high")
        || lowercase.contains("replacement transaction underpriced")
    {
        SubmissionError::NonceConflict(message)
    } else if lowercase.contains("execution reverted") {
        SubmissionError::Rejected(message)
    } else {
        SubmissionError::Transport(eyre::Report::new(err).wrap_err("while broadcasting to network"))
    }
}

#[async_trait]
impl LedgerClient for AlloyLedgerClient {
    async fn block_number(&self) -> eyre::Result<u64> {
        self.provider
            .get_block_number()
            .await
            .context("while loading block number")
    }

    #[instrument(level = "trace", skip(self))]
    async fn commit_created_events(&self, height: u64) -> eyre::Result<Vec<CommitCreated>> {
        let filter = Filter::new()
            .address(self.contract_address)
            .event_signature(CommitRevealRegistry::CommitCreated::SIGNATURE_HASH)
            .from_block(height)
            .to_block(height);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .context("while loading logs")?;
        logs.iter()
            .map(|log| {
                let created = log
                    .log_decode::<CommitRevealRegistry::CommitCreated>()
                    .context("while decoding commit-created event")?;
                Ok(CommitCreated::from(created.inner.data))
            })
            .collect()
    }

    async fn commit(&self, commit_id: CommitId) -> eyre::Result<Option<Commit>> {
        let contract = CommitRevealRegistry::new(self.contract_address, self.provider.clone());
        let record = contract
            .commits(commit_id.into_inner())
            .call()
            .await
            .context("while loading commit")?;
        // absent records read as zeroed storage
        if record.owner == Address::ZERO {
            return Ok(None);
        }
        Ok(Some(Commit {
            user_seed_hash: record.userSeedHash,
            operator_seed_hash: record.operatorSeedHash,
            owner: record.owner,
            ready_height: u64::try_from(record.readyHeight)
                .context("ready height does not fit into u64")?,
        }))
    }

    async fn transaction_count(&self) -> eyre::Result<u64> {
        self.provider
            .get_transaction_count(self.operator)
            .await
            .context("while loading transaction count")
    }

    #[instrument(level = "debug", skip(self, request), fields(commit_id = %request.commit_id))]
    async fn send_reveal(
        &self,
        nonce: u64,
        request: RevealRequest,
    ) -> Result<RevealReceipt, SubmissionError> {
        let contract = CommitRevealRegistry::new(self.contract_address, self.provider.clone());
        let receipt = contract
            .reveal(request.commit_id.into_inner(), request.operator_seed)
            .nonce(nonce)
            .send()
            .await
            .map_err(classify_send_error)?
            .get_receipt()
            .await
            .context("while waiting for receipt")?;
        if receipt.status() {
            Ok(RevealReceipt {
                transaction_hash: receipt.transaction_hash,
                block_number: receipt.block_number.unwrap_or_default(),
            })
        } else {
            Err(SubmissionError::Reverted {
                transaction_hash: receipt.transaction_hash,
                reason: format!("{receipt:?}"),
            })
        }
    }
}
