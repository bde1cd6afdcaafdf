//! Operator side of commitment creation.
//!
//! The [`CommitSigner`] answers commit requests. It draws a fresh operator seed,
//! keeps the seed in the [`SecretCache`](crate::secret_cache::SecretCache) under
//! the resulting commit id and signs the commit id with the operator key. The
//! requester then submits the commitment to the registry itself.

use std::time::{Duration, SystemTime, SystemTimeError};

use alloy::{
    primitives::{Address, B256, Bytes},
    signers::local::PrivateKeySigner,
};
use entropy_types::{api::v1::CommitResponse, crypto};
use rand::RngCore as _;
use tracing::instrument;

use crate::{
    metrics::METRICS_KEY_COMMITS_SIGNED,
    services::secret_cache::{SecretCacheError, SecretCacheService},
};

/// Errors returned by the [`CommitSigner`].
#[derive(Debug, thiserror::Error)]
pub enum CommitSignerError {
    /// The system clock is before the unix epoch.
    #[error("cannot read system time: {0}")]
    Clock(#[from] SystemTimeError),
    /// Signing the commit id failed.
    #[error("cannot sign commit id: {0}")]
    Signing(#[from] alloy::signers::Error),
    /// The operator seed could not be stored.
    #[error("cannot store operator seed: {0}")]
    SecretCache(#[from] SecretCacheError),
}

/// Signs commitments with the operator key.
#[derive(Clone)]
pub struct CommitSigner {
    signer: PrivateKeySigner,
    secret_cache: SecretCacheService,
    commit_lifetime: Duration,
    secret_grace_period: Duration,
}

impl CommitSigner {
    /// Creates a signer whose signatures expire `commit_lifetime` after signing.
    ///
    /// Operator seeds stay in the secret cache for `secret_grace_period` longer
    /// than the signature, so commitments mined right before the expiration are
    /// still observed with their seed.
    pub fn new(
        signer: PrivateKeySigner,
        secret_cache: SecretCacheService,
        commit_lifetime: Duration,
        secret_grace_period: Duration,
    ) -> Self {
        Self {
            signer,
            secret_cache,
            commit_lifetime,
            secret_grace_period,
        }
    }

    /// The operator's address.
    pub fn operator(&self) -> Address {
        self.signer.address()
    }

    /// Creates a signed commitment for `owner`.
    ///
    /// The operator seed is stored in the secret cache for the commit lifetime
    /// plus the grace period before the response is returned.
    #[instrument(level = "debug", skip(self))]
    pub async fn sign_commit(
        &self,
        owner: Address,
        user_seed_hash: B256,
    ) -> Result<CommitResponse, CommitSignerError> {
        let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH)?;
        let expiration = (now + self.commit_lifetime).as_secs();

        let mut operator_seed = B256::ZERO;
        rand::thread_rng().fill_bytes(operator_seed.as_mut_slice());
        let operator_seed_hash = crypto::seed_hash(operator_seed);

        let commit_id = crypto::commit_id(user_seed_hash, operator_seed_hash, owner, expiration);
        let signature = crypto::sign_commit_id(&self.signer, commit_id)?;
        self.secret_cache
            .set(
                commit_id,
                operator_seed,
                self.commit_lifetime + self.secret_grace_period,
            )
            .await?;
        tracing::debug!("signed {commit_id} expiring at {expiration}");
        metrics::counter!(METRICS_KEY_COMMITS_SIGNED).increment(1);

        Ok(CommitResponse {
            commit_id,
            operator_seed_hash,
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
            expiration,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr as _, sync::Arc};

    use alloy::primitives::Signature;

    use super::*;
    use crate::services::secret_cache::{SecretCache as _, in_memory::InMemorySecretCache};

    const OPERATOR_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[tokio::test]
    async fn signs_and_stores_fresh_seed() -> eyre::Result<()> {
        let cache = InMemorySecretCache::init(Duration::from_secs(60));
        let signer = PrivateKeySigner::from_str(OPERATOR_KEY)?;
        let commit_signer = CommitSigner::new(
            signer.clone(),
            Arc::new(cache.clone()),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );
        let owner = Address::repeat_byte(7);
        let user_seed_hash = crypto::seed_hash(B256::repeat_byte(1));

        let first = commit_signer.sign_commit(owner, user_seed_hash).await?;
        let second = commit_signer.sign_commit(owner, user_seed_hash).await?;
        assert_ne!(first.operator_seed_hash, second.operator_seed_hash);
        assert_ne!(first.commit_id, second.commit_id);

        assert_eq!(
            first.commit_id,
            crypto::commit_id(user_seed_hash, first.operator_seed_hash, owner, first.expiration)
        );
        let signature = Signature::try_from(first.signature.as_ref())?;
        assert_eq!(
            crypto::recover_signer(&signature, first.commit_id)?,
            signer.address()
        );

        let stored = cache.get(first.commit_id).await?.expect("seed is stored");
        assert_eq!(crypto::seed_hash(stored), first.operator_seed_hash);
        Ok(())
    }

    #[tokio::test]
    async fn seed_outlives_signature_by_grace_period() -> eyre::Result<()> {
        let cache = InMemorySecretCache::init(Duration::from_secs(60));
        let commit_signer = CommitSigner::new(
            PrivateKeySigner::from_str(OPERATOR_KEY)?,
            Arc::new(cache.clone()),
            Duration::from_millis(20),
            Duration::from_secs(60),
        );
        let response = commit_signer
            .sign_commit(Address::repeat_byte(7), crypto::seed_hash(B256::repeat_byte(1)))
            .await?;

        // the signature lifetime is over, the seed is still available for the reveal
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.get(response.commit_id).await?.is_some());
        Ok(())
    }
}
