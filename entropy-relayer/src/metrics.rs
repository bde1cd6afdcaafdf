//! Metrics definitions for the entropy relayer.
//!
//! This module defines all metrics keys used by the service and
//! provides a helper [`describe_metrics`] to set metadata for
//! each metric using the `metrics` crate.

/// Metrics key for blocks processed by the watcher.
pub const METRICS_KEY_WATCHER_BLOCKS: &str = "entropy.watcher.blocks";
/// Metrics key for the last height processed by the watcher.
pub const METRICS_KEY_WATCHER_HEIGHT: &str = "entropy.watcher.height";
/// Metrics key for failed ledger queries of the watcher.
pub const METRICS_KEY_WATCHER_LEDGER_ERRORS: &str = "entropy.watcher.ledger_errors";
/// Metrics key for observed commitments.
pub const METRICS_KEY_COMMITS_OBSERVED: &str = "entropy.commits.observed";
/// Metrics key for commitments dropped because their secret is unavailable.
pub const METRICS_KEY_COMMITS_DROPPED: &str = "entropy.commits.dropped";
/// Metrics key for commitments waiting for their ready height.
pub const METRICS_KEY_PENDING_REVEALS: &str = "entropy.reveals.pending";
/// Metrics key for included reveals.
pub const METRICS_KEY_REVEAL_SUCCESS: &str = "entropy.reveals.success";
/// Metrics key for failed reveal submissions.
pub const METRICS_KEY_REVEAL_FAILED: &str = "entropy.reveals.failed";
/// Metrics key for reveals skipped after speculative validation.
pub const METRICS_KEY_REVEAL_SKIPPED: &str = "entropy.reveals.skipped";
/// Metrics key for commitments signed by the API.
pub const METRICS_KEY_COMMITS_SIGNED: &str = "entropy.commits.signed";

/// Describe all metrics used by the service.
///
/// This calls the `describe_*` functions from the `metrics` crate to set metadata on the different metrics.
pub fn describe_metrics() {
    metrics::describe_counter!(
        METRICS_KEY_WATCHER_BLOCKS,
        metrics::Unit::Count,
        "Number of blocks processed by the ledger watcher"
    );
    metrics::describe_gauge!(
        METRICS_KEY_WATCHER_HEIGHT,
        metrics::Unit::Count,
        "Last height processed by the ledger watcher"
    );
    metrics::describe_counter!(
        METRICS_KEY_WATCHER_LEDGER_ERRORS,
        metrics::Unit::Count,
        "Number of failed ledger queries"
    );
    metrics::describe_counter!(
        METRICS_KEY_COMMITS_OBSERVED,
        metrics::Unit::Count,
        "Number of observed commitment creations"
    );
    metrics::describe_counter!(
        METRICS_KEY_COMMITS_DROPPED,
        metrics::Unit::Count,
        "Number of commitments dropped without an operator seed"
    );
    metrics::describe_gauge!(
        METRICS_KEY_PENDING_REVEALS,
        metrics::Unit::Count,
        "Number of commitments waiting for their ready height"
    );
    metrics::describe_counter!(
        METRICS_KEY_REVEAL_SUCCESS,
        metrics::Unit::Count,
        "Number of included reveals"
    );
    metrics::describe_counter!(
        METRICS_KEY_REVEAL_FAILED,
        metrics::Unit::Count,
        "Number of failed reveal submissions"
    );
    metrics::describe_counter!(
        METRICS_KEY_REVEAL_SKIPPED,
        metrics::Unit::Count,
        "Number of reveals skipped because they would be rejected"
    );
    metrics::describe_counter!(
        METRICS_KEY_COMMITS_SIGNED,
        metrics::Unit::Count,
        "Number of commitments signed for requesters"
    );
}
