//! Core services of the relayer.
//!
//! # Services overview
//!
//! - [`commit_signer`] – generates operator seeds and signs commitments for requesters.
//! - [`event_watcher`] – polls the ledger block by block and emits block and commitment signals.
//! - [`ledger_client`] – the ledger seam, backed by alloy or by the in-memory ledger.
//! - [`reveal_scheduler`] – keeps pending reveals and submits them once they are ready.
//! - [`reveal_submitter`] – single writer for the operator's transactions and nonce.
//! - [`secret_cache`] – stores operator seeds between signing and revealing.
pub mod commit_signer;
pub(crate) mod event_watcher;
pub mod ledger_client;
pub(crate) mod reveal_scheduler;
pub(crate) mod reveal_submitter;
pub mod secret_cache;
