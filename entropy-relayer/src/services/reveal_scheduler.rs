//! Reveal Scheduler
//!
//! The [`RevealScheduler`] turns the watcher's signals into reveals. It owns the
//! map of pending reveals and is only ever called from the watcher's task, so it
//! needs no locks.
//!
//! - On a commitment signal it looks up the operator seed in the secret cache.
//!   Commitments without a seed were not signed by this instance (or the seed
//!   expired) and are dropped. Commitments that are already revealable are
//!   revealed right away, all others are queued.
//! - On a block signal every queued commitment whose ready height was reached
//!   is removed from the queue and revealed, one after the other.
//!
//! Before a reveal is submitted it is validated against the live record at the
//! height the transaction executes at the earliest. Reveals that would be
//! rejected are skipped. A failed submission is logged and dropped, unless it
//! failed for a transient reason and re-queueing is enabled.

use std::collections::HashMap;

use alloy::primitives::B256;
use async_trait::async_trait;
use entropy_types::{CommitId, RevealRequest, chain::CommitCreated, validation::RevealValidator};
use tracing::instrument;

use crate::{
    config::RevealConfig,
    metrics::{
        METRICS_KEY_COMMITS_DROPPED, METRICS_KEY_COMMITS_OBSERVED, METRICS_KEY_PENDING_REVEALS,
        METRICS_KEY_REVEAL_FAILED, METRICS_KEY_REVEAL_SKIPPED, METRICS_KEY_REVEAL_SUCCESS,
    },
    services::{
        event_watcher::LedgerEventHandler, ledger_client::LedgerClientService,
        reveal_submitter::RevealSubmitter, secret_cache::SecretCacheService,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingReveal {
    operator_seed: B256,
    ready_height: u64,
    attempts: u32,
}

pub(crate) struct RevealScheduler {
    ledger: LedgerClientService,
    secret_cache: SecretCacheService,
    submitter: RevealSubmitter,
    confirmations: u64,
    max_retries: u32,
    backoff_blocks: u64,
    pending: HashMap<CommitId, PendingReveal>,
    current_height: u64,
}

impl RevealScheduler {
    pub(crate) fn new(
        ledger: LedgerClientService,
        secret_cache: SecretCacheService,
        submitter: RevealSubmitter,
        confirmations: u64,
        config: &RevealConfig,
    ) -> Self {
        Self {
            ledger,
            secret_cache,
            submitter,
            confirmations,
            max_retries: config.max_reveal_retries,
            backoff_blocks: config.reveal_retry_backoff_blocks,
            pending: HashMap::new(),
            current_height: 0,
        }
    }

    #[cfg(test)]
    fn pending(&self, commit_id: CommitId) -> Option<PendingReveal> {
        self.pending.get(&commit_id).copied()
    }

    #[instrument(level = "debug", skip(self, pending))]
    async fn attempt(&mut self, commit_id: CommitId, pending: PendingReveal) {
        let execution_height = self.current_height + 1;
        match self.ledger.commit(commit_id).await {
            Ok(record) => {
                if let Err(err) = RevealValidator::validate(
                    commit_id,
                    record.as_ref(),
                    pending.operator_seed,
                    execution_height,
                ) {
                    tracing::info!("skipping reveal: {err}");
                    metrics::counter!(METRICS_KEY_REVEAL_SKIPPED).increment(1);
                    return;
                }
            }
            Err(err) => {
                tracing::debug!("cannot load record before reveal - submitting anyway: {err:?}");
            }
        }

        let request = RevealRequest {
            commit_id,
            operator_seed: pending.operator_seed,
        };
        match self.submitter.submit(request).await {
            Ok(receipt) => {
                tracing::info!(
                    "revealed in block {} with transaction hash: {}",
                    receipt.block_number,
                    receipt.transaction_hash
                );
                metrics::counter!(METRICS_KEY_REVEAL_SUCCESS).increment(1);
            }
            Err(err) => {
                metrics::counter!(METRICS_KEY_REVEAL_FAILED).increment(1);
                if err.is_retryable() && pending.attempts < self.max_retries {
                    let delay = self
                        .backoff_blocks
                        .saturating_mul(2u64.saturating_pow(pending.attempts));
                    let ready_height = self.current_height.saturating_add(delay);
                    tracing::warn!("reveal failed: {err} - retrying at height {ready_height}");
                    self.pending.insert(
                        commit_id,
                        PendingReveal {
                            ready_height,
                            attempts: pending.attempts + 1,
                            ..pending
                        },
                    );
                } else {
                    tracing::warn!("reveal failed: {err}");
                }
            }
        }
    }
}

#[async_trait]
impl LedgerEventHandler for RevealScheduler {
    async fn on_block(&mut self, height: u64) {
        self.current_height = height;
        let mut due = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.ready_height <= height)
            .map(|(commit_id, pending)| (pending.ready_height, *commit_id))
            .collect::<Vec<_>>();
        due.sort_unstable();
        if !due.is_empty() {
            tracing::debug!("{} reveals due at {height}", due.len());
        }
        for (_, commit_id) in due {
            // removed before the attempt, a failed attempt may re-queue it
            if let Some(pending) = self.pending.remove(&commit_id) {
                self.attempt(commit_id, pending).await;
            }
        }
        metrics::gauge!(METRICS_KEY_PENDING_REVEALS).set(self.pending.len() as f64);
    }

    #[instrument(level = "debug", skip_all, fields(commit_id = %event.commit_id))]
    async fn on_commit(&mut self, height: u64, event: CommitCreated) {
        metrics::counter!(METRICS_KEY_COMMITS_OBSERVED).increment(1);
        let operator_seed = match self.secret_cache.get(event.commit_id).await {
            Ok(Some(operator_seed)) => operator_seed,
            Ok(None) => {
                tracing::debug!("no operator seed - dropping");
                metrics::counter!(METRICS_KEY_COMMITS_DROPPED).increment(1);
                return;
            }
            Err(err) => {
                tracing::warn!("cannot read secret cache - dropping: {err:?}");
                metrics::counter!(METRICS_KEY_COMMITS_DROPPED).increment(1);
                return;
            }
        };
        let pending = PendingReveal {
            operator_seed,
            ready_height: height + self.confirmations,
            attempts: 0,
        };
        if self.current_height >= pending.ready_height {
            self.attempt(event.commit_id, pending).await;
        } else {
            tracing::debug!("queued until {}", pending.ready_height);
            self.pending.insert(event.commit_id, pending);
            metrics::gauge!(METRICS_KEY_PENDING_REVEALS).set(self.pending.len() as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        str::FromStr as _,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use alloy::{
        primitives::{Address, B256},
        signers::local::PrivateKeySigner,
    };
    use entropy_registry::{
        CommitRegistry, DEFAULT_BLOCK_TIME_SECS, InMemoryLedger, RegistryCall, Role, SignedCommit,
        Transaction,
    };
    use entropy_types::{Commit, crypto};

    use super::*;
    use crate::services::{
        ledger_client::{
            LedgerClient, RevealReceipt, SubmissionError, in_memory::InMemoryLedgerClient,
        },
        secret_cache::{SecretCache as _, in_memory::InMemorySecretCache},
    };

    const ADMIN_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const OPERATOR_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const GENESIS: u64 = 1_700_000_000;

    /// Fails the first `failures` reveals with a transport error.
    struct FlakySubmissions {
        inner: InMemoryLedgerClient,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl LedgerClient for FlakySubmissions {
        async fn block_number(&self) -> eyre::Result<u64> {
            self.inner.block_number().await
        }

        async fn commit_created_events(&self, height: u64) -> eyre::Result<Vec<CommitCreated>> {
            self.inner.commit_created_events(height).await
        }

        async fn commit(&self, commit_id: CommitId) -> eyre::Result<Option<Commit>> {
            self.inner.commit(commit_id).await
        }

        async fn transaction_count(&self) -> eyre::Result<u64> {
            self.inner.transaction_count().await
        }

        async fn send_reveal(
            &self,
            nonce: u64,
            request: RevealRequest,
        ) -> Result<RevealReceipt, SubmissionError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(SubmissionError::Transport(eyre::eyre!("connection reset")));
            }
            self.inner.send_reveal(nonce, request).await
        }
    }

    struct Fixture {
        ledger: InMemoryLedger,
        operator: PrivateKeySigner,
        cache: InMemorySecretCache,
    }

    impl Fixture {
        fn new(confirmations: u64) -> eyre::Result<Self> {
            let admin = PrivateKeySigner::from_str(ADMIN_KEY)?.address();
            let operator = PrivateKeySigner::from_str(OPERATOR_KEY)?;
            let ledger = InMemoryLedger::new(
                CommitRegistry::new(confirmations, admin),
                GENESIS,
                DEFAULT_BLOCK_TIME_SECS,
            );
            ledger.submit(Transaction {
                from: admin,
                nonce: 0,
                call: RegistryCall::GrantRole {
                    role: Role::Operator,
                    account: operator.address(),
                },
            })?;
            Ok(Self {
                ledger,
                operator,
                cache: InMemorySecretCache::init(Duration::from_secs(60)),
            })
        }

        fn scheduler(&self, ledger: LedgerClientService, config: &RevealConfig) -> RevealScheduler {
            let submitter = RevealSubmitter::spawn(Arc::clone(&ledger), 1);
            RevealScheduler::new(
                ledger,
                Arc::new(self.cache.clone()),
                submitter,
                self.ledger.confirmations(),
                config,
            )
        }

        fn client(&self) -> InMemoryLedgerClient {
            InMemoryLedgerClient::new(self.ledger.clone(), self.operator.address())
        }

        /// Commits a fresh tuple and returns its creation event and height.
        async fn commit(&self, seed: u8, cache_seed: bool) -> eyre::Result<(u64, CommitCreated)> {
            let user = Address::repeat_byte(0x42);
            let operator_seed = B256::repeat_byte(seed);
            let user_seed_hash = crypto::seed_hash(B256::repeat_byte(seed.wrapping_add(1)));
            let operator_seed_hash = crypto::seed_hash(operator_seed);
            let expiration = GENESIS + 3600;
            let commit_id = crypto::commit_id(user_seed_hash, operator_seed_hash, user, expiration);
            if cache_seed {
                self.cache
                    .set(commit_id, operator_seed, Duration::from_secs(60))
                    .await?;
            }
            let receipt = self.ledger.submit(Transaction {
                from: user,
                nonce: self.ledger.nonce(user),
                call: RegistryCall::Commit(SignedCommit {
                    user_seed_hash,
                    operator_seed_hash,
                    expiration,
                    signature: crypto::sign_commit_id(&self.operator, commit_id)?,
                }),
            })?;
            Ok((
                receipt.block_number,
                CommitCreated {
                    commit_id,
                    user_seed_hash,
                    operator_seed_hash,
                    owner: user,
                },
            ))
        }
    }

    #[tokio::test]
    async fn reveals_once_ready_height_is_observed() -> eyre::Result<()> {
        let fixture = Fixture::new(2)?;
        let mut scheduler = fixture.scheduler(Arc::new(fixture.client()), &RevealConfig::default());
        let (height, event) = fixture.commit(1, true).await?;

        scheduler.on_block(height).await;
        scheduler.on_commit(height, event).await;
        assert_eq!(
            scheduler.pending(event.commit_id).map(|p| p.ready_height),
            Some(height + 2)
        );

        fixture.ledger.mine(1);
        scheduler.on_block(height + 1).await;
        assert!(scheduler.pending(event.commit_id).is_some());
        assert!(fixture.ledger.commit(event.commit_id).is_some());

        fixture.ledger.mine(1);
        scheduler.on_block(height + 2).await;
        assert!(scheduler.pending(event.commit_id).is_none());
        assert!(fixture.ledger.commit(event.commit_id).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn reveals_immediately_without_confirmations() -> eyre::Result<()> {
        let fixture = Fixture::new(0)?;
        let mut scheduler = fixture.scheduler(Arc::new(fixture.client()), &RevealConfig::default());
        let (height, event) = fixture.commit(1, true).await?;

        scheduler.on_block(height).await;
        scheduler.on_commit(height, event).await;
        assert!(scheduler.pending(event.commit_id).is_none());
        assert!(fixture.ledger.commit(event.commit_id).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn drops_commitments_without_seed() -> eyre::Result<()> {
        let fixture = Fixture::new(1)?;
        let mut scheduler = fixture.scheduler(Arc::new(fixture.client()), &RevealConfig::default());
        let (height, event) = fixture.commit(1, false).await?;

        scheduler.on_block(height).await;
        scheduler.on_commit(height, event).await;
        assert!(scheduler.pending(event.commit_id).is_none());

        fixture.ledger.mine(1);
        scheduler.on_block(height + 1).await;
        assert!(fixture.ledger.commit(event.commit_id).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn skips_reveals_that_would_be_rejected() -> eyre::Result<()> {
        let fixture = Fixture::new(1)?;
        let mut scheduler = fixture.scheduler(Arc::new(fixture.client()), &RevealConfig::default());
        let (height, event) = fixture.commit(1, true).await?;
        scheduler.on_block(height).await;
        scheduler.on_commit(height, event).await;

        // another relayer reveals first
        fixture.ledger.mine(1);
        let operator = fixture.operator.address();
        fixture.ledger.submit(Transaction {
            from: operator,
            nonce: fixture.ledger.nonce(operator),
            call: RegistryCall::Reveal(RevealRequest {
                commit_id: event.commit_id,
                operator_seed: B256::repeat_byte(1),
            }),
        })?;
        let nonce = fixture.ledger.nonce(operator);
        scheduler.on_block(height + 1).await;
        // no transaction was spent on the stale reveal
        assert_eq!(fixture.ledger.nonce(operator), nonce);
        assert!(scheduler.pending(event.commit_id).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_reveal_is_dropped_by_default() -> eyre::Result<()> {
        let fixture = Fixture::new(1)?;
        let client = FlakySubmissions {
            inner: fixture.client(),
            failures: AtomicUsize::new(1),
        };
        let mut scheduler = fixture.scheduler(Arc::new(client), &RevealConfig::default());
        let (height, event) = fixture.commit(1, true).await?;
        scheduler.on_block(height).await;
        scheduler.on_commit(height, event).await;

        fixture.ledger.mine(1);
        scheduler.on_block(height + 1).await;
        assert!(scheduler.pending(event.commit_id).is_none());
        assert!(fixture.ledger.commit(event.commit_id).is_some());
        Ok(())
    }

    #[tokio::test]
    async fn transient_failure_is_requeued_with_backoff() -> eyre::Result<()> {
        let fixture = Fixture::new(1)?;
        let client = FlakySubmissions {
            inner: fixture.client(),
            failures: AtomicUsize::new(2),
        };
        let config = RevealConfig {
            max_reveal_retries: 2,
            reveal_retry_backoff_blocks: 2,
            ..RevealConfig::default()
        };
        let mut scheduler = fixture.scheduler(Arc::new(client), &config);
        let (height, event) = fixture.commit(1, true).await?;
        scheduler.on_block(height).await;
        scheduler.on_commit(height, event).await;

        // first failure: backoff 2 * 2^0
        scheduler.on_block(height + 1).await;
        assert_eq!(
            scheduler.pending(event.commit_id),
            Some(PendingReveal {
                operator_seed: B256::repeat_byte(1),
                ready_height: height + 3,
                attempts: 1,
            })
        );
        // second failure: backoff 2 * 2^1
        scheduler.on_block(height + 3).await;
        assert_eq!(
            scheduler.pending(event.commit_id).map(|p| p.ready_height),
            Some(height + 7)
        );

        fixture.ledger.mine(1);
        scheduler.on_block(height + 7).await;
        assert!(scheduler.pending(event.commit_id).is_none());
        assert!(fixture.ledger.commit(event.commit_id).is_none());
        Ok(())
    }
}
