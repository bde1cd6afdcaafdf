//! An append-only, totally ordered ledger hosting a [`CommitRegistry`].
//!
//! Every accepted transaction is executed in its own block (automine). A
//! transaction with a wrong nonce is rejected before inclusion. A transaction
//! whose registry call fails is still included: it consumes its nonce and its
//! block but leaves no events and no state change behind.

use std::{collections::HashMap, sync::Arc};

use alloy::primitives::{Address, B256, keccak256};
use entropy_types::{Commit, CommitId, RevealRequest, chain::RegistryEvent};
use parking_lot::Mutex;
use tracing::instrument;

use crate::{
    registry::{BlockEnv, CommitRegistry, RegistryError, SignedCommit},
    roles::Role,
};

/// Seconds between two consecutive blocks unless the clock is warped.
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 12;

/// The registry operations a transaction can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    /// Create a commitment.
    Commit(SignedCommit),
    /// Reveal a single commitment.
    Reveal(RevealRequest),
    /// Reveal a batch of commitments atomically.
    MultiReveal(Vec<RevealRequest>),
    /// Grant a role.
    GrantRole {
        /// The role to grant.
        role: Role,
        /// The receiving account.
        account: Address,
    },
    /// Revoke a role.
    RevokeRole {
        /// The role to revoke.
        role: Role,
        /// The account losing the role.
        account: Address,
    },
}

/// A signed-off call from an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The sending account.
    pub from: Address,
    /// Must equal the sender's current nonce.
    pub nonce: u64,
    /// The registry call.
    pub call: RegistryCall,
}

/// Return value of a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    /// Id of the created commitment.
    Committed(CommitId),
    /// Random seed of the revealed commitment.
    Revealed(B256),
    /// Random seeds of the batch, in request order.
    MultiRevealed(Vec<B256>),
    /// A role was granted or revoked.
    RolesUpdated,
}

/// Inclusion proof of a successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Hash of the transaction.
    pub transaction_hash: B256,
    /// Height of the including block.
    pub block_number: u64,
    /// What the call returned.
    pub output: CallOutput,
}

/// Errors returned by the [`InMemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The transaction was not included because its nonce is stale or from the future.
    #[error("nonce mismatch for {account}: expected {expected}, got {actual}")]
    NonceMismatch {
        /// The sending account.
        account: Address,
        /// The account's current nonce.
        expected: u64,
        /// The nonce of the transaction.
        actual: u64,
    },
    /// The transaction was included but its call failed.
    #[error("transaction {transaction_hash} reverted in block {block_number}: {reason}")]
    Reverted {
        /// Hash of the transaction.
        transaction_hash: B256,
        /// Height of the including block.
        block_number: u64,
        /// The registry's rejection.
        #[source]
        reason: RegistryError,
    },
    /// The requested block does not exist yet.
    #[error("unknown block {0}")]
    UnknownBlock(u64),
}

struct Block {
    hash: B256,
    timestamp: u64,
    events: Vec<RegistryEvent>,
}

struct ChainState {
    registry: CommitRegistry,
    blocks: Vec<Block>,
    nonces: HashMap<Address, u64>,
    block_time: u64,
    warp: u64,
}

impl ChainState {
    fn head(&self) -> &Block {
        // genesis is pushed on creation and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }

    fn head_number(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    fn next_env(&self) -> BlockEnv {
        let head = self.head();
        BlockEnv {
            number: self.head_number() + 1,
            timestamp: head.timestamp + self.block_time + self.warp,
            previous_hash: head.hash,
        }
    }

    fn seal(&mut self, env: BlockEnv, transactions: &[B256], events: Vec<RegistryEvent>) {
        let hash = block_hash(env.previous_hash, env.number, env.timestamp, transactions);
        self.blocks.push(Block {
            hash,
            timestamp: env.timestamp,
            events,
        });
        self.warp = 0;
    }

    fn execute(
        &mut self,
        env: &BlockEnv,
        from: Address,
        call: RegistryCall,
        events: &mut Vec<RegistryEvent>,
    ) -> Result<CallOutput, RegistryError> {
        let registry = &mut self.registry;
        match call {
            RegistryCall::Commit(signed) => registry
                .commit(env, from, &signed, events)
                .map(CallOutput::Committed),
            RegistryCall::Reveal(request) => registry
                .reveal(env, from, request.commit_id, request.operator_seed, events)
                .map(CallOutput::Revealed),
            RegistryCall::MultiReveal(requests) => registry
                .multi_reveal(env, from, &requests, events)
                .map(CallOutput::MultiRevealed),
            RegistryCall::GrantRole { role, account } => registry
                .grant_role(from, role, account)
                .map(|_| CallOutput::RolesUpdated),
            RegistryCall::RevokeRole { role, account } => registry
                .revoke_role(from, role, account)
                .map(|_| CallOutput::RolesUpdated),
        }
    }
}

fn block_hash(parent: B256, number: u64, timestamp: u64, transactions: &[B256]) -> B256 {
    let mut packed = Vec::with_capacity(32 + 8 + 8 + 32 * transactions.len());
    packed.extend_from_slice(parent.as_slice());
    packed.extend_from_slice(&number.to_be_bytes());
    packed.extend_from_slice(&timestamp.to_be_bytes());
    for tx in transactions {
        packed.extend_from_slice(tx.as_slice());
    }
    keccak256(packed)
}

fn transaction_hash(from: Address, nonce: u64, block_number: u64) -> B256 {
    let mut packed = [0u8; 20 + 8 + 8];
    packed[..20].copy_from_slice(from.as_slice());
    packed[20..28].copy_from_slice(&nonce.to_be_bytes());
    packed[28..].copy_from_slice(&block_number.to_be_bytes());
    keccak256(packed)
}

/// A shareable handle to the in-memory chain.
///
/// Clones refer to the same chain.
#[derive(Clone)]
pub struct InMemoryLedger(Arc<Mutex<ChainState>>);

impl InMemoryLedger {
    /// Creates a chain with a genesis block at height 0 hosting `registry`.
    pub fn new(registry: CommitRegistry, genesis_timestamp: u64, block_time: u64) -> Self {
        let genesis = Block {
            hash: block_hash(B256::ZERO, 0, genesis_timestamp, &[]),
            timestamp: genesis_timestamp,
            events: Vec::new(),
        };
        Self(Arc::new(Mutex::new(ChainState {
            registry,
            blocks: vec![genesis],
            nonces: HashMap::new(),
            block_time,
            warp: 0,
        })))
    }

    /// Height of the latest block.
    pub fn block_number(&self) -> u64 {
        self.0.lock().head_number()
    }

    /// Hash of the block at `number`.
    pub fn block_hash(&self, number: u64) -> Result<B256, LedgerError> {
        let state = self.0.lock();
        state
            .blocks
            .get(number as usize)
            .map(|block| block.hash)
            .ok_or(LedgerError::UnknownBlock(number))
    }

    /// Timestamp of the latest block.
    pub fn latest_timestamp(&self) -> u64 {
        self.0.lock().head().timestamp
    }

    /// The registry events emitted in the block at `number`.
    pub fn events_at(&self, number: u64) -> Result<Vec<RegistryEvent>, LedgerError> {
        let state = self.0.lock();
        state
            .blocks
            .get(number as usize)
            .map(|block| block.events.clone())
            .ok_or(LedgerError::UnknownBlock(number))
    }

    /// The live commitment with this id at the latest block, if any.
    pub fn commit(&self, commit_id: CommitId) -> Option<Commit> {
        self.0.lock().registry.commits(commit_id).copied()
    }

    /// The registry's confirmation depth.
    pub fn confirmations(&self) -> u64 {
        self.0.lock().registry.confirmations()
    }

    /// Returns `true` if `account` holds `role` at the latest block.
    pub fn has_role(&self, account: Address, role: Role) -> bool {
        self.0.lock().registry.roles().has_role(account, role)
    }

    /// The nonce the next transaction of `account` must carry.
    pub fn nonce(&self, account: Address) -> u64 {
        self.0.lock().nonces.get(&account).copied().unwrap_or_default()
    }

    /// Executes `tx` in a new block.
    ///
    /// Fails with [`LedgerError::NonceMismatch`] without producing a block, or with
    /// [`LedgerError::Reverted`] after producing an event-less block.
    #[instrument(level = "debug", skip_all, fields(from = %tx.from, nonce = tx.nonce))]
    pub fn submit(&self, tx: Transaction) -> Result<Receipt, LedgerError> {
        let mut state = self.0.lock();
        let expected = state.nonces.get(&tx.from).copied().unwrap_or_default();
        if tx.nonce != expected {
            return Err(LedgerError::NonceMismatch {
                account: tx.from,
                expected,
                actual: tx.nonce,
            });
        }
        state.nonces.insert(tx.from, expected + 1);

        let env = state.next_env();
        let transaction_hash = transaction_hash(tx.from, tx.nonce, env.number);
        let mut events = Vec::new();
        match state.execute(&env, tx.from, tx.call, &mut events) {
            Ok(output) => {
                state.seal(env, &[transaction_hash], events);
                tracing::debug!("included {transaction_hash} in block {}", env.number);
                Ok(Receipt {
                    transaction_hash,
                    block_number: env.number,
                    output,
                })
            }
            Err(reason) => {
                state.seal(env, &[transaction_hash], Vec::new());
                tracing::debug!("{transaction_hash} reverted in block {}: {reason}", env.number);
                Err(LedgerError::Reverted {
                    transaction_hash,
                    block_number: env.number,
                    reason,
                })
            }
        }
    }

    /// Appends `blocks` empty blocks.
    pub fn mine(&self, blocks: u64) {
        let mut state = self.0.lock();
        for _ in 0..blocks {
            let env = state.next_env();
            state.seal(env, &[], Vec::new());
        }
    }

    /// Adds `secs` to the timestamp of the next block.
    pub fn warp(&self, secs: u64) {
        self.0.lock().warp += secs;
    }
}
