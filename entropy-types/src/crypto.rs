//! Hashing and signing primitives of the commit-reveal scheme.
//!
//! All hashes are keccak-256. Values are tightly packed before hashing, the
//! same way the registry contract computes them:
//!
//! * `seed_hash = keccak256(seed)`
//! * `commit_id = keccak256(user_seed_hash | operator_seed_hash | owner | uint256(expiration))`
//! * `random_seed = keccak256(user_seed_hash | operator_seed | previous_block_hash)`
//!
//! Commit ids are signed by the operator as EIP-191 personal messages.

use alloy::{
    primitives::{Address, B256, Signature, SignatureError, U256, keccak256},
    signers::{SignerSync as _, local::PrivateKeySigner},
};

use crate::CommitId;

/// Hashes a secret seed. Both the user and the operator commit to their seed with this hash.
pub fn seed_hash(seed: B256) -> B256 {
    keccak256(seed)
}

/// Computes the [`CommitId`] of a commitment.
///
/// Changing any of the four inputs changes the id.
pub fn commit_id(
    user_seed_hash: B256,
    operator_seed_hash: B256,
    owner: Address,
    expiration: u64,
) -> CommitId {
    let mut packed = Vec::with_capacity(32 + 32 + 20 + 32);
    packed.extend_from_slice(user_seed_hash.as_slice());
    packed.extend_from_slice(operator_seed_hash.as_slice());
    packed.extend_from_slice(owner.as_slice());
    packed.extend_from_slice(&U256::from(expiration).to_be_bytes::<32>());
    CommitId::from(keccak256(packed))
}

/// Derives the random seed released by a reveal.
///
/// Mixes the committed user seed hash, the operator's secret and the hash of the
/// block preceding the reveal.
pub fn random_seed(user_seed_hash: B256, operator_seed: B256, previous_block_hash: B256) -> B256 {
    let mut packed = [0u8; 96];
    packed[..32].copy_from_slice(user_seed_hash.as_slice());
    packed[32..64].copy_from_slice(operator_seed.as_slice());
    packed[64..].copy_from_slice(previous_block_hash.as_slice());
    keccak256(packed)
}

/// Signs a [`CommitId`] with the operator key.
pub fn sign_commit_id(
    signer: &PrivateKeySigner,
    commit_id: CommitId,
) -> alloy::signers::Result<Signature> {
    signer.sign_message_sync(commit_id.as_slice())
}

/// Recovers the address that signed the given [`CommitId`].
pub fn recover_signer(
    signature: &Signature,
    commit_id: CommitId,
) -> Result<Address, SignatureError> {
    signature.recover_address_from_msg(commit_id.as_slice())
}
