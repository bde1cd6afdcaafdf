//! Ledger Event Watcher
//!
//! This module provides the [`LedgerEventWatcher`], a single task that polls the
//! ledger at a fixed cadence and hands every block to a [`LedgerEventHandler`].
//!
//! The watcher works in **cycles**:
//! 1. Waits for the next interval tick.
//! 2. Refreshes the cached head if it is unknown or already consumed.
//! 3. Fetches the commitment creations of exactly one height, the one after the
//!    last processed height.
//! 4. Signals the block, then every commitment in emission order, and advances
//!    its cursor, whether or not events were found.
//!
//! Backlog is processed block by block before the watcher catches up to the
//! head, so no height is skipped.
//!
//! A failed ledger query is logged and retried in the next cycle. After
//! `max_attempts` consecutive failures the watcher stops with
//! [`WatcherError::RetriesExhausted`] and cancels the shared
//! [`CancellationToken`] to shut down the service.

use std::time::Duration;

use async_trait::async_trait;
use entropy_types::chain::CommitCreated;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    metrics::{
        METRICS_KEY_WATCHER_BLOCKS, METRICS_KEY_WATCHER_HEIGHT, METRICS_KEY_WATCHER_LEDGER_ERRORS,
    },
    services::ledger_client::LedgerClientService,
};

/// Errors that stop the watcher.
#[derive(Debug, thiserror::Error)]
pub(crate) enum WatcherError {
    #[error("giving up after {attempts} failed attempts while {operation}: {last_error}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: usize,
        last_error: String,
    },
}

/// Receives the signals of the watcher.
///
/// Called from the watcher's task only, one call at a time.
#[async_trait]
pub(crate) trait LedgerEventHandler {
    /// A new height was observed. Emitted before the commitments of that height.
    async fn on_block(&mut self, height: u64);

    /// A commitment was created at `height`.
    async fn on_commit(&mut self, height: u64, event: CommitCreated);
}

pub(crate) struct LedgerEventWatcher<H> {
    ledger: LedgerClientService,
    handler: H,
    max_attempts: usize,
    start_height: Option<u64>,
    cached_head: Option<u64>,
    last_processed: Option<u64>,
    consecutive_failures: usize,
}

impl<H: LedgerEventHandler + Send> LedgerEventWatcher<H> {
    pub(crate) fn new(
        ledger: LedgerClientService,
        handler: H,
        max_attempts: usize,
        start_height: Option<u64>,
    ) -> Self {
        Self {
            ledger,
            handler,
            max_attempts: max_attempts.max(1),
            start_height,
            cached_head: None,
            last_processed: None,
            consecutive_failures: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn last_processed(&self) -> Option<u64> {
        self.last_processed
    }

    #[cfg(test)]
    pub(crate) fn handler(&self) -> &H {
        &self.handler
    }

    /// Runs one cycle. Returns the processed height, if any.
    #[instrument(level = "trace", skip(self))]
    pub(crate) async fn poll_once(&mut self) -> Result<Option<u64>, WatcherError> {
        let pending = match (self.last_processed, self.start_height) {
            (Some(last), _) => Some(last + 1),
            (None, start) => start,
        };
        let head = match self.cached_head {
            // a cached head is stale once the next height lies beyond it
            Some(head) if pending.is_some_and(|next| next <= head) => head,
            _ => {
                let result = self.ledger.block_number().await;
                let Some(head) = self.track("querying block number", result)? else {
                    return Ok(None);
                };
                self.cached_head = Some(head);
                head
            }
        };

        let next = pending.unwrap_or(head);
        if next > head {
            tracing::trace!("caught up at {head}");
            return Ok(None);
        }

        let result = self.ledger.commit_created_events(next).await;
        let Some(events) = self.track("fetching events", result)? else {
            return Ok(None);
        };
        tracing::trace!("block {next} has {} commitments", events.len());
        self.handler.on_block(next).await;
        for event in events {
            self.handler.on_commit(next, event).await;
        }
        self.last_processed = Some(next);
        metrics::counter!(METRICS_KEY_WATCHER_BLOCKS).increment(1);
        metrics::gauge!(METRICS_KEY_WATCHER_HEIGHT).set(next as f64);
        Ok(Some(next))
    }

    fn track<T>(
        &mut self,
        operation: &'static str,
        result: eyre::Result<T>,
    ) -> Result<Option<T>, WatcherError> {
        match result {
            Ok(value) => {
                self.consecutive_failures = 0;
                Ok(Some(value))
            }
            Err(err) => {
                self.consecutive_failures += 1;
                metrics::counter!(METRICS_KEY_WATCHER_LEDGER_ERRORS).increment(1);
                tracing::warn!(
                    "failed {operation} ({}/{}): {err:?}",
                    self.consecutive_failures,
                    self.max_attempts
                );
                if self.consecutive_failures >= self.max_attempts {
                    Err(WatcherError::RetriesExhausted {
                        operation,
                        attempts: self.consecutive_failures,
                        last_error: format!("{err:?}"),
                    })
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Polls until the token is cancelled or the retries are exhausted.
    ///
    /// Cancels the token when it returns.
    pub(crate) async fn run(
        mut self,
        poll_interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Result<(), WatcherError> {
        // shutdown service if watcher encounters an error and drops this guard
        let _drop_guard = cancellation_token.drop_guard_ref();
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = cancellation_token.cancelled() => {
                    tracing::info!("stopped ledger watcher at {:?}", self.last_processed);
                    return Ok(());
                }
            }
            if let Err(err) = self.poll_once().await {
                tracing::error!("ledger watcher stopped: {err}");
                return Err(err);
            }
        }
    }
}
