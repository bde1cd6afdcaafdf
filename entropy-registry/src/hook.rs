use std::sync::Arc;

use alloy::primitives::B256;
use entropy_types::CommitId;

/// Dynamic trait object for the reveal hook.
pub type RevealHookService = Arc<dyn RevealHook + Send + Sync>;

/// Receives every random seed produced by the registry.
///
/// Invoked after the reveal's state mutation is applied. For a batch reveal it
/// is invoked once per entry, in batch order, after the whole batch succeeded.
pub trait RevealHook {
    /// Called with the id of the deleted commitment and its random seed.
    fn on_reveal(&self, commit_id: CommitId, random_seed: B256);
}

/// The default [`RevealHook`]. Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRevealHook;

impl RevealHook for NoopRevealHook {
    fn on_reveal(&self, _commit_id: CommitId, _random_seed: B256) {}
}
