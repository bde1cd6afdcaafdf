//! # v1 API types
//!
//! Data transfer objects for the version 1 commit API.
//!
//! A requester sends its address and the hash of its secret seed. The service
//! answers with everything the requester needs to submit the commitment to the
//! registry: the commit id, the hash of the operator seed, the operator
//! signature over the commit id and the expiration of that signature.

use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::CommitId;

/// A request for an operator-signed commitment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// The account that will submit the commitment to the registry.
    pub owner: Address,
    /// Hash of the requester's secret seed.
    pub user_seed_hash: B256,
}

/// Server response to a [`CommitRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    /// Id of the commitment the requester must submit.
    pub commit_id: CommitId,
    /// Hash of the freshly generated operator seed.
    pub operator_seed_hash: B256,
    /// 65-byte operator signature over the commit id.
    pub signature: Bytes,
    /// Unix timestamp (seconds) after which the registry rejects the signature.
    pub expiration: u64,
}
