#![deny(missing_docs)]
//! The ledger-resident side of the commit-reveal scheme.
//!
//! [`CommitRegistry`] is the state machine that creates, validates and destroys
//! commitment records. It is the single source of truth for commitments and
//! never performs I/O: every call receives the [`BlockEnv`] of the block it
//! executes in and appends its events to a caller-provided log.
//!
//! [`InMemoryLedger`] wraps a registry into an append-only chain with block
//! hashes, timestamps, account nonces and per-block event logs. Transactions are
//! executed in total order, one block per transaction. It serves as a reference
//! ledger for local development and tests of the relayer.
//!
//! Authorization is a capability lookup in the [`RoleRegistry`], mutated through
//! the same ordered transactions as commitments.

mod hook;
mod ledger;
mod registry;
mod roles;

pub use hook::{NoopRevealHook, RevealHook, RevealHookService};
pub use ledger::{
    CallOutput, InMemoryLedger, LedgerError, Receipt, RegistryCall, Transaction,
    DEFAULT_BLOCK_TIME_SECS,
};
pub use registry::{BlockEnv, CommitRegistry, RegistryError, SignedCommit};
pub use roles::{Role, RoleRegistry};
