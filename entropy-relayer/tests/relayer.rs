use std::{str::FromStr as _, sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, B256, Signature},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use axum::body::Body;
use entropy_registry::{
    CommitRegistry, DEFAULT_BLOCK_TIME_SECS, InMemoryLedger, RegistryCall, Role, SignedCommit,
    Transaction,
};
use entropy_relayer::{
    commit_signer::CommitSigner,
    config::RevealConfig,
    ledger_client::{LedgerClient, RevealReceipt, SubmissionError, in_memory::InMemoryLedgerClient},
    secret_cache::in_memory::InMemorySecretCache,
};
use entropy_types::{
    Commit, CommitId, RevealRequest,
    api::v1::{CommitRequest, CommitResponse},
    chain::{CommitCreated, RegistryEvent},
    crypto,
};
use http::{Request, StatusCode, header};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as _;

const ADMIN_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const OPERATOR_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const USER_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

const GENESIS: u64 = 1_700_000_000;

struct TestSetup {
    ledger: InMemoryLedger,
    operator: PrivateKeySigner,
    user: Address,
    secret_cache: InMemorySecretCache,
    commit_signer: CommitSigner,
}

impl TestSetup {
    fn new(confirmations: u64) -> eyre::Result<Self> {
        let admin = PrivateKeySigner::from_str(ADMIN_KEY)?.address();
        let operator = PrivateKeySigner::from_str(OPERATOR_KEY)?;
        let user = PrivateKeySigner::from_str(USER_KEY)?.address();
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
        let secret_cache = InMemorySecretCache::init(Duration::from_secs(60));
        let commit_signer = CommitSigner::new(
            operator.clone(),
            Arc::new(secret_cache.clone()),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        Ok(Self {
            ledger,
            operator,
            user,
            secret_cache,
            commit_signer,
        })
    }

    fn reveal_config() -> RevealConfig {
        RevealConfig {
            poll_interval: Duration::from_millis(10),
            start_block: Some(1),
            ..RevealConfig::default()
        }
    }

    /// Submits the signed commitment as the user.
    fn submit_commit(
        &self,
        user_seed_hash: B256,
        response: &CommitResponse,
    ) -> eyre::Result<u64> {
        let receipt = self.ledger.submit(Transaction {
            from: self.user,
            nonce: self.ledger.nonce(self.user),
            call: RegistryCall::Commit(SignedCommit {
                user_seed_hash,
                operator_seed_hash: response.operator_seed_hash,
                expiration: response.expiration,
                signature: Signature::try_from(response.signature.as_ref())?,
            }),
        })?;
        Ok(receipt.block_number)
    }

    async fn wait_until_revealed(&self, commit_id: CommitId) -> eyre::Result<()> {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.ledger.commit(commit_id).is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .map_err(|_| eyre::eyre!("commitment {commit_id} was not revealed in time"))
    }
}

/// Answers reads like the wrapped ledger but can never reach the head.
struct UnreachableHead(InMemoryLedgerClient);

#[async_trait]
impl LedgerClient for UnreachableHead {
    async fn block_number(&self) -> eyre::Result<u64> {
        eyre::bail!("connection refused")
    }

    async fn commit_created_events(&self, height: u64) -> eyre::Result<Vec<CommitCreated>> {
        self.0.commit_created_events(height).await
    }

    async fn commit(&self, commit_id: CommitId) -> eyre::Result<Option<Commit>> {
        self.0.commit(commit_id).await
    }

    async fn transaction_count(&self) -> eyre::Result<u64> {
        self.0.transaction_count().await
    }

    async fn send_reveal(
        &self,
        nonce: u64,
        request: RevealRequest,
    ) -> Result<RevealReceipt, SubmissionError> {
        self.0.send_reveal(nonce, request).await
    }
}

#[tokio::test]
async fn signed_commitment_is_revealed_after_confirmation() -> eyre::Result<()> {
    let setup = TestSetup::new(1)?;
    let user_seed_hash = crypto::seed_hash(B256::repeat_byte(0x11));
    let response = setup
        .commit_signer
        .sign_commit(setup.user, user_seed_hash)
        .await?;
    let committed_at = setup.submit_commit(user_seed_hash, &response)?;

    let cancellation_token = CancellationToken::new();
    let relayer = entropy_relayer::spawn_relayer(
        Arc::new(InMemoryLedgerClient::new(
            setup.ledger.clone(),
            setup.operator.address(),
        )),
        Arc::new(setup.secret_cache.clone()),
        setup.ledger.confirmations(),
        &TestSetup::reveal_config(),
        cancellation_token.clone(),
    );

    // the commitment becomes revealable once the next block exists
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(setup.ledger.commit(response.commit_id).is_some());
    setup.ledger.mine(1);
    setup.wait_until_revealed(response.commit_id).await?;

    let head = setup.ledger.block_number();
    let (revealed_at, revealed) = (committed_at + 1..=head)
        .flat_map(|height| {
            setup
                .ledger
                .events_at(height)
                .unwrap_or_default()
                .into_iter()
                .map(move |event| (height, event))
        })
        .find_map(|(height, event)| match event {
            RegistryEvent::SeedRevealed(revealed) if revealed.commit_id == response.commit_id => {
                Some((height, revealed))
            }
            _ => None,
        })
        .ok_or_else(|| eyre::eyre!("no reveal event"))?;
    assert!(revealed_at >= committed_at + setup.ledger.confirmations());
    assert_eq!(
        crypto::seed_hash(revealed.operator_seed),
        response.operator_seed_hash
    );
    assert_eq!(
        revealed.random_seed,
        crypto::random_seed(
            user_seed_hash,
            revealed.operator_seed,
            setup.ledger.block_hash(revealed_at - 1)?
        )
    );

    cancellation_token.cancel();
    relayer.await??;
    Ok(())
}

#[tokio::test]
async fn commitments_without_cached_seed_are_left_alone() -> eyre::Result<()> {
    let setup = TestSetup::new(1)?;
    // signed by the operator key, but the seed never reaches this cache
    let foreign = TestSetup::new(1)?;
    let user_seed_hash = crypto::seed_hash(B256::repeat_byte(0x22));
    let response = foreign
        .commit_signer
        .sign_commit(setup.user, user_seed_hash)
        .await?;
    setup.submit_commit(user_seed_hash, &response)?;

    let cancellation_token = CancellationToken::new();
    let relayer = entropy_relayer::spawn_relayer(
        Arc::new(InMemoryLedgerClient::new(
            setup.ledger.clone(),
            setup.operator.address(),
        )),
        Arc::new(setup.secret_cache.clone()),
        setup.ledger.confirmations(),
        &TestSetup::reveal_config(),
        cancellation_token.clone(),
    );
    setup.ledger.mine(3);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(setup.ledger.commit(response.commit_id).is_some());
    assert_eq!(setup.ledger.nonce(setup.operator.address()), 0);

    cancellation_token.cancel();
    relayer.await??;
    Ok(())
}

#[tokio::test]
async fn unreachable_ledger_stops_the_service() -> eyre::Result<()> {
    let setup = TestSetup::new(1)?;
    let cancellation_token = CancellationToken::new();
    let relayer = entropy_relayer::spawn_relayer(
        Arc::new(UnreachableHead(InMemoryLedgerClient::new(
            setup.ledger.clone(),
            setup.operator.address(),
        ))),
        Arc::new(setup.secret_cache.clone()),
        1,
        &RevealConfig {
            max_ledger_attempts: 2,
            ..TestSetup::reveal_config()
        },
        cancellation_token.clone(),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), relayer).await??;
    assert!(result.is_err());
    assert!(cancellation_token.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn commit_endpoint_returns_signed_commitment() -> eyre::Result<()> {
    let setup = TestSetup::new(1)?;
    let router = entropy_relayer::routes(setup.commit_signer.clone());
    let user_seed_hash = crypto::seed_hash(B256::repeat_byte(0x33));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/commit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&CommitRequest {
            owner: setup.user,
            user_seed_hash,
        })?))?;

    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let commit = serde_json::from_slice::<CommitResponse>(&body)?;

    assert_eq!(
        commit.commit_id,
        crypto::commit_id(
            user_seed_hash,
            commit.operator_seed_hash,
            setup.user,
            commit.expiration
        )
    );
    let signature = Signature::try_from(commit.signature.as_ref())?;
    assert_eq!(
        crypto::recover_signer(&signature, commit.commit_id)?,
        setup.operator.address()
    );
    assert_eq!(setup.secret_cache.len(), 1);
    Ok(())
}

#[tokio::test]
async fn commit_endpoint_rejects_zero_owner() -> eyre::Result<()> {
    let setup = TestSetup::new(1)?;
    let router = entropy_relayer::routes(setup.commit_signer.clone());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/commit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&CommitRequest {
            owner: Address::ZERO,
            user_seed_hash: B256::repeat_byte(1),
        })?))?;

    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(setup.secret_cache.is_empty());
    Ok(())
}

#[tokio::test]
async fn health_and_info_are_not_cached() -> eyre::Result<()> {
    let setup = TestSetup::new(1)?;
    let router = entropy_relayer::routes(setup.commit_signer.clone());

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL),
        Some(&header::HeaderValue::from_static("no-cache"))
    );

    for (uri, expected) in [("/health/ready", "ready"), ("/health/live", "live")] {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&header::HeaderValue::from_static("no-cache"))
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(body.as_ref(), expected.as_bytes());
    }

    let response = router
        .oneshot(Request::builder().uri("/info").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = String::from_utf8(body.to_vec())?;
    assert!(body.starts_with(env!("CARGO_PKG_NAME")));
    assert!(body.contains(&setup.operator.address().to_string()));
    Ok(())
}
