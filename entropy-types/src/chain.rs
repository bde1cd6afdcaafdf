//! Types for on-chain messages.
//!
//! This module defines the events emitted by the commit-reveal registry and the
//! alloy bindings of the registry contract. The `From` implementations translate
//! the solidity types to rust land.

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{CommitId, RevealRequest};

pub use bindings::CommitRevealRegistry;

#[allow(missing_docs, clippy::too_many_arguments)]
mod bindings {
    alloy::sol! {
        #[sol(rpc)]
        contract CommitRevealRegistry {
            struct RevealRequest {
                bytes32 commitId;
                bytes32 operatorSeed;
            }

            event CommitCreated(
                bytes32 indexed commitId,
                bytes32 userSeedHash,
                bytes32 operatorSeedHash,
                address indexed owner
            );
            event SeedRevealed(bytes32 indexed commitId, bytes32 operatorSeed, bytes32 randomSeed);

            function confirmations() external view returns (uint256);
            function commits(bytes32 commitId)
                external
                view
                returns (bytes32 userSeedHash, bytes32 operatorSeedHash, address owner, uint256 readyHeight);
            function commit(bytes32 userSeedHash, bytes32 operatorSeedHash, uint256 expiration, bytes signature)
                external
                returns (bytes32 commitId);
            function reveal(bytes32 commitId, bytes32 operatorSeed) external;
            function multiReveal(RevealRequest[] requests) external;
        }
    }
}

/// Events emitted by the commit-reveal registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A commitment was created.
    CommitCreated(CommitCreated),
    /// A commitment was revealed and deleted.
    SeedRevealed(SeedRevealed),
}

/// Payload of a commitment-creation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCreated {
    /// Id of the new commitment.
    pub commit_id: CommitId,
    /// Hash of the requester's seed.
    pub user_seed_hash: B256,
    /// Hash of the operator's seed.
    pub operator_seed_hash: B256,
    /// The account that submitted the commitment.
    pub owner: Address,
}

/// Payload of a reveal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRevealed {
    /// Id of the revealed (and now deleted) commitment.
    pub commit_id: CommitId,
    /// The disclosed operator seed.
    pub operator_seed: B256,
    /// The resulting random seed.
    pub random_seed: B256,
}

impl From<CommitRevealRegistry::CommitCreated> for CommitCreated {
    fn from(value: CommitRevealRegistry::CommitCreated) -> Self {
        Self {
            commit_id: CommitId::from(value.commitId),
            user_seed_hash: value.userSeedHash,
            operator_seed_hash: value.operatorSeedHash,
            owner: value.owner,
        }
    }
}

impl From<CommitRevealRegistry::SeedRevealed> for SeedRevealed {
    fn from(value: CommitRevealRegistry::SeedRevealed) -> Self {
        Self {
            commit_id: CommitId::from(value.commitId),
            operator_seed: value.operatorSeed,
            random_seed: value.randomSeed,
        }
    }
}

impl From<RevealRequest> for CommitRevealRegistry::RevealRequest {
    fn from(value: RevealRequest) -> Self {
        Self {
            commitId: value.commit_id.into_inner(),
            operatorSeed: value.operator_seed,
        }
    }
}
