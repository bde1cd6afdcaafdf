//! In-process [`SecretCache`].
//!
//! A thin wrapper around a mutex protecting a `HashMap`. Every entry carries a
//! deadline. Expired entries are invisible to [`SecretCache::get`] and removed
//! by a cleanup task that runs in the background.

use std::{collections::HashMap, sync::Arc, time::Duration};

use alloy::primitives::B256;
use async_trait::async_trait;
use entropy_types::CommitId;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::instrument;

use crate::services::secret_cache::{SecretCache, SecretCacheError};

type Entries = Arc<Mutex<HashMap<CommitId, Entry>>>;

struct Entry {
    operator_seed: B256,
    deadline: Instant,
}

/// A [`SecretCache`] that keeps operator seeds in memory.
///
/// Seeds do not survive a restart. Commitments signed before a restart are
/// dropped by the scheduler when they are observed.
#[derive(Clone)]
pub struct InMemorySecretCache {
    entries: Entries,
}

impl InMemorySecretCache {
    /// Creates an empty cache and spawns its cleanup task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(cleanup_interval: Duration) -> Self {
        let cache = Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        };
        let entries = Arc::downgrade(&cache.entries);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            // ignore the first tick
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(entries) = entries.upgrade() else {
                    tracing::debug!("secret cache dropped - stopping cleanup");
                    break;
                };
                cleanup(&entries);
            }
        });
        cache
    }

    /// Number of stored entries, including expired ones not cleaned up yet.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn cleanup(entries: &Mutex<HashMap<CommitId, Entry>>) -> usize {
    let mut entries = entries.lock();
    let _guard = tracing::debug_span!("cleanup task").entered();
    let now = Instant::now();
    let old_size = entries.len();
    entries.retain(|_, entry| entry.deadline > now);
    let removed = old_size - entries.len();
    tracing::debug!("removed {removed} elements, new len: {}", entries.len());
    removed
}

#[async_trait]
impl SecretCache for InMemorySecretCache {
    #[instrument(level = "debug", skip(self))]
    async fn get(&self, commit_id: CommitId) -> Result<Option<B256>, SecretCacheError> {
        let entries = self.entries.lock();
        Ok(entries
            .get(&commit_id)
            .filter(|entry| entry.deadline > Instant::now())
            .map(|entry| entry.operator_seed))
    }

    #[instrument(level = "debug", skip(self, operator_seed))]
    async fn set(
        &self,
        commit_id: CommitId,
        operator_seed: B256,
        ttl: Duration,
    ) -> Result<(), SecretCacheError> {
        if ttl.is_zero() {
            return Err(SecretCacheError::ZeroTtl);
        }
        let entry = Entry {
            operator_seed,
            deadline: Instant::now() + ttl,
        };
        if self.entries.lock().insert(commit_id, entry).is_some() {
            tracing::warn!("already had a secret for {commit_id} - replaced");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_stored_seed() -> eyre::Result<()> {
        let cache = InMemorySecretCache::init(Duration::from_secs(60));
        let commit_id = CommitId::new(B256::repeat_byte(1));
        assert_eq!(cache.get(commit_id).await?, None);
        cache
            .set(commit_id, B256::repeat_byte(2), Duration::from_secs(60))
            .await?;
        assert_eq!(cache.get(commit_id).await?, Some(B256::repeat_byte(2)));
        Ok(())
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_cleaned_up() -> eyre::Result<()> {
        // cleanup interval doesn't matter, we call cleanup manually
        let cache = InMemorySecretCache::init(Duration::from_secs(60));
        let short = CommitId::new(B256::repeat_byte(1));
        let long = CommitId::new(B256::repeat_byte(2));
        cache
            .set(short, B256::repeat_byte(3), Duration::from_millis(10))
            .await?;
        cache
            .set(long, B256::repeat_byte(4), Duration::from_secs(60))
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get(short).await?, None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cleanup(&cache.entries), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(long).await?, Some(B256::repeat_byte(4)));
        Ok(())
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let cache = InMemorySecretCache::init(Duration::from_secs(60));
        let result = cache
            .set(CommitId::new(B256::ZERO), B256::ZERO, Duration::ZERO)
            .await;
        assert!(matches!(result, Err(SecretCacheError::ZeroTtl)));
    }
}
