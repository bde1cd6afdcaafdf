//! Secret cache interface for the relayer.
//!
//! This module defines the [`SecretCache`] trait, which keeps the operator seed
//! of every signed commitment until the commitment is revealed. The
//! [`CommitSigner`](crate::commit_signer::CommitSigner) writes to it, the reveal
//! scheduler reads from it.
//!
//! Current `SecretCache` implementations:
//! - in-memory (with periodic cleanup of expired entries)

use std::{sync::Arc, time::Duration};

use alloy::primitives::B256;
use async_trait::async_trait;
use entropy_types::CommitId;

pub mod in_memory;

/// Dynamic trait object for secret cache service.
///
/// Must be `Send + Sync` to work with async contexts (e.g., Axum).
pub type SecretCacheService = Arc<dyn SecretCache + Send + Sync>;

/// Errors returned by a [`SecretCache`].
#[derive(Debug, thiserror::Error)]
pub enum SecretCacheError {
    /// Entries must live for a non-zero amount of time.
    #[error("ttl must be non-zero")]
    ZeroTtl,
    /// The backing store failed.
    #[error(transparent)]
    Backend(#[from] eyre::Report),
}

/// Trait that implementations of secret caches must provide.
#[async_trait]
pub trait SecretCache {
    /// Returns the operator seed stored for `commit_id`, unless it is absent or expired.
    async fn get(&self, commit_id: CommitId) -> Result<Option<B256>, SecretCacheError>;

    /// Stores the operator seed for `commit_id` for `ttl`. Replaces an existing entry.
    async fn set(
        &self,
        commit_id: CommitId,
        operator_seed: B256,
        ttl: Duration,
    ) -> Result<(), SecretCacheError>;
}
