#![deny(missing_docs)]
//! Core type definitions for the commit-reveal entropy registry and its relayer.
//!
//! This crate groups together the strongly-typed values shared by the
//! ledger-side registry and the relayer service. It provides:
//!
//! * A thin wrapper around the commitment identifier ([`CommitId`]) and the
//!   live commitment record ([`Commit`]).
//! * The hashing and signing primitives of the scheme (see [`crypto`] module).
//! * The events emitted by the registry and the contract ABI bindings (see
//!   [`chain`] module).
//! * The stateless reveal checks (see [`validation`] module).
//! * API versioned types for the commit endpoint (see [`api`] module).

use std::fmt;

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

pub mod api;
pub mod chain;
pub mod crypto;
pub mod validation;

/// Identifier of a commitment.
///
/// Computed with [`crypto::commit_id`] over the user seed hash, the operator
/// seed hash, the owner and the expiration. It is both the primary key of a
/// live record and a fingerprint of its content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(B256);

impl CommitId {
    /// Creates a new `CommitId` by wrapping a `B256`
    pub fn new(value: B256) -> Self {
        Self(value)
    }

    /// Converts the commit id to a `B256`
    pub fn into_inner(self) -> B256 {
        self.0
    }

    /// Returns the 32 bytes of the id.
    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<B256> for CommitId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl From<CommitId> for B256 {
    fn from(value: CommitId) -> Self {
        value.0
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live commitment as stored by the registry.
///
/// The record exists from creation until its single successful reveal. There is
/// no revealed or expired state, the record is deleted on reveal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Hash of the requester's secret seed.
    pub user_seed_hash: B256,
    /// Hash of the operator's secret seed.
    pub operator_seed_hash: B256,
    /// The account that submitted the commitment.
    pub owner: Address,
    /// First ledger height at which the commitment may be revealed.
    pub ready_height: u64,
}

/// A single entry of a reveal call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealRequest {
    /// The commitment to reveal.
    pub commit_id: CommitId,
    /// The operator's secret seed whose hash was committed.
    pub operator_seed: B256,
}
