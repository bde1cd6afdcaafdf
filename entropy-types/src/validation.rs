//! Stateless reveal checks.
//!
//! [`RevealValidator`] evaluates the three reveal-time conditions of a
//! commitment without touching any state. The registry runs it before mutating,
//! the relayer runs it speculatively before spending a transaction.

use alloy::primitives::B256;

use crate::{Commit, CommitId, crypto};

/// Reasons a reveal is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RevealError {
    /// No live commitment with this id.
    #[error("unknown commit: {0}")]
    UnknownCommit(CommitId),
    /// The commitment is live but its ready height was not reached.
    /// Fields: commit id, ready height, current height.
    #[error("commit {0} is revealable from height {1}, current height is {2}")]
    NotYetRevealable(CommitId, u64, u64),
    /// The supplied operator seed does not hash to the stored operator seed hash.
    /// Fields: commit id, stored hash, supplied seed.
    #[error("operator seed {2} does not match hash {1} of commit {0}")]
    SeedMismatch(CommitId, B256, B256),
}

/// Pure predicates over a commitment.
pub struct RevealValidator;

impl RevealValidator {
    /// Fails with [`RevealError::UnknownCommit`] if there is no live record.
    pub fn check_exists(
        commit_id: CommitId,
        commit: Option<&Commit>,
    ) -> Result<&Commit, RevealError> {
        commit.ok_or(RevealError::UnknownCommit(commit_id))
    }

    /// Fails with [`RevealError::NotYetRevealable`] if `current_height` is below the
    /// ready height. Equal heights are revealable.
    pub fn check_ready(
        commit_id: CommitId,
        commit: &Commit,
        current_height: u64,
    ) -> Result<(), RevealError> {
        if current_height < commit.ready_height {
            return Err(RevealError::NotYetRevealable(
                commit_id,
                commit.ready_height,
                current_height,
            ));
        }
        Ok(())
    }

    /// Fails with [`RevealError::SeedMismatch`] if the seed does not hash to the
    /// committed operator seed hash.
    pub fn check_seed(
        commit_id: CommitId,
        commit: &Commit,
        operator_seed: B256,
    ) -> Result<(), RevealError> {
        if crypto::seed_hash(operator_seed) != commit.operator_seed_hash {
            return Err(RevealError::SeedMismatch(
                commit_id,
                commit.operator_seed_hash,
                operator_seed,
            ));
        }
        Ok(())
    }

    /// Runs all checks in the order the registry applies them.
    pub fn validate(
        commit_id: CommitId,
        commit: Option<&Commit>,
        operator_seed: B256,
        current_height: u64,
    ) -> Result<&Commit, RevealError> {
        let commit = Self::check_exists(commit_id, commit)?;
        Self::check_ready(commit_id, commit, current_height)?;
        Self::check_seed(commit_id, commit, operator_seed)?;
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;

    fn commit(operator_seed: B256, ready_height: u64) -> Commit {
        Commit {
            user_seed_hash: crypto::seed_hash(B256::repeat_byte(7)),
            operator_seed_hash: crypto::seed_hash(operator_seed),
            owner: Address::repeat_byte(1),
            ready_height,
        }
    }

    #[test]
    fn missing_commit_is_unknown() {
        let id = CommitId::new(B256::repeat_byte(1));
        assert_eq!(
            RevealValidator::validate(id, None, B256::ZERO, 10),
            Err(RevealError::UnknownCommit(id))
        );
    }

    #[test]
    fn ready_height_is_inclusive() {
        let id = CommitId::new(B256::repeat_byte(1));
        let seed = B256::repeat_byte(2);
        let commit = commit(seed, 103);
        assert_eq!(
            RevealValidator::validate(id, Some(&commit), seed, 102),
            Err(RevealError::NotYetRevealable(id, 103, 102))
        );
        assert!(RevealValidator::validate(id, Some(&commit), seed, 103).is_ok());
        assert!(RevealValidator::validate(id, Some(&commit), seed, 200).is_ok());
    }

    #[test]
    fn wrong_seed_is_mismatch() {
        let id = CommitId::new(B256::repeat_byte(1));
        let seed = B256::repeat_byte(2);
        let wrong = B256::repeat_byte(3);
        let commit = commit(seed, 1);
        assert_eq!(
            RevealValidator::validate(id, Some(&commit), wrong, 5),
            Err(RevealError::SeedMismatch(id, commit.operator_seed_hash, wrong))
        );
    }

    #[test]
    fn height_is_checked_before_seed() {
        let id = CommitId::new(B256::repeat_byte(1));
        let commit = commit(B256::repeat_byte(2), 50);
        assert_eq!(
            RevealValidator::validate(id, Some(&commit), B256::repeat_byte(3), 10),
            Err(RevealError::NotYetRevealable(id, 50, 10))
        );
    }
}
