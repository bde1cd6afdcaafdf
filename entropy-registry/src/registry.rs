//! The commit-reveal state machine.
//!
//! Every commitment goes through `Committed -> Revealed`, where `Revealed` is
//! the absence of the record. The registry holds no notion of expiry: the
//! signature expiration only gates creation.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use alloy::primitives::{Address, B256, Signature};
use entropy_types::{
    Commit, CommitId, RevealRequest,
    chain::{CommitCreated, RegistryEvent, SeedRevealed},
    crypto,
    validation::{RevealError, RevealValidator},
};
use tracing::instrument;

use crate::{
    hook::{NoopRevealHook, RevealHookService},
    roles::{Role, RoleRegistry},
};

/// Errors returned by the [`CommitRegistry`].
///
/// All of them reject the input. Retrying with identical arguments fails the
/// same way (a [`RevealError::NotYetRevealable`] reveal may succeed at a later height).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A live commitment with this id exists.
    #[error("commit {0} already exists")]
    DuplicateCommit(CommitId),
    /// The ledger time passed the signature expiration.
    #[error("signature expired at {expiration}, ledger time is {now}")]
    ExpiredSignature {
        /// Expiration of the signature (unix seconds).
        expiration: u64,
        /// Timestamp of the executing block (unix seconds).
        now: u64,
    },
    /// The signature was not produced by an operator.
    #[error("signature over commit {0} is not from an operator")]
    InvalidSignature(CommitId),
    /// The caller lacks the role required for the call.
    #[error("account {account} is missing role {role}")]
    MissingRole {
        /// The calling account.
        account: Address,
        /// The required role.
        role: Role,
    },
    /// A reveal check failed.
    #[error(transparent)]
    Reveal(#[from] RevealError),
}

/// The block a registry call executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEnv {
    /// Height of the executing block.
    pub number: u64,
    /// Timestamp of the executing block (unix seconds).
    pub timestamp: u64,
    /// Hash of the block preceding the executing block.
    pub previous_hash: B256,
}

/// The arguments of a commit call, as handed out by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedCommit {
    /// Hash of the requester's seed.
    pub user_seed_hash: B256,
    /// Hash of the operator's seed.
    pub operator_seed_hash: B256,
    /// Unix timestamp after which the signature is no longer accepted.
    pub expiration: u64,
    /// Operator signature over the commit id.
    pub signature: Signature,
}

/// The ledger-resident commitment registry.
pub struct CommitRegistry {
    confirmations: u64,
    commits: HashMap<CommitId, Commit>,
    roles: RoleRegistry,
    reveal_hook: RevealHookService,
}

impl CommitRegistry {
    /// Creates an empty registry with the [`NoopRevealHook`].
    ///
    /// `admin` is granted [`Role::Admin`]. `confirmations` is the number of blocks
    /// that must pass between commit and reveal and cannot be changed afterwards.
    /// `confirmations = 0` allows revealing in the block of the commit, which
    /// lets the block producer see both seeds before choosing the block.
    pub fn new(confirmations: u64, admin: Address) -> Self {
        Self::with_reveal_hook(confirmations, admin, Arc::new(NoopRevealHook))
    }

    /// Creates an empty registry that calls `reveal_hook` for every random seed.
    pub fn with_reveal_hook(
        confirmations: u64,
        admin: Address,
        reveal_hook: RevealHookService,
    ) -> Self {
        if confirmations == 0 {
            tracing::warn!(
                "registry created with 0 confirmations - reveals may land in the commit block"
            );
        }
        let mut roles = RoleRegistry::default();
        roles.grant(admin, Role::Admin);
        Self {
            confirmations,
            commits: HashMap::new(),
            roles,
            reveal_hook,
        }
    }

    /// The configured confirmation depth.
    pub fn confirmations(&self) -> u64 {
        self.confirmations
    }

    /// Returns the live commitment with this id, if any.
    pub fn commits(&self, commit_id: CommitId) -> Option<&Commit> {
        self.commits.get(&commit_id)
    }

    /// Number of live commitments.
    pub fn live_commits(&self) -> usize {
        self.commits.len()
    }

    /// The role assignments.
    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    /// Grants `role` to `account`. Admin only.
    #[instrument(level = "debug", skip(self))]
    pub fn grant_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<(), RegistryError> {
        self.ensure_role(caller, Role::Admin)?;
        if !self.roles.grant(account, role) {
            tracing::debug!("{account} already is {role}");
        }
        Ok(())
    }

    /// Revokes `role` from `account`. Admin only.
    #[instrument(level = "debug", skip(self))]
    pub fn revoke_role(
        &mut self,
        caller: Address,
        role: Role,
        account: Address,
    ) -> Result<(), RegistryError> {
        self.ensure_role(caller, Role::Admin)?;
        if !self.roles.revoke(account, role) {
            tracing::debug!("{account} was not {role}");
        }
        Ok(())
    }

    /// Creates a commitment submitted by `submitter`.
    ///
    /// The record becomes revealable at `env.number + confirmations`. Emits
    /// [`RegistryEvent::CommitCreated`].
    #[instrument(level = "debug", skip_all, fields(submitter = %submitter))]
    pub fn commit(
        &mut self,
        env: &BlockEnv,
        submitter: Address,
        signed: &SignedCommit,
        events: &mut Vec<RegistryEvent>,
    ) -> Result<CommitId, RegistryError> {
        let commit_id = crypto::commit_id(
            signed.user_seed_hash,
            signed.operator_seed_hash,
            submitter,
            signed.expiration,
        );
        if self.commits.contains_key(&commit_id) {
            return Err(RegistryError::DuplicateCommit(commit_id));
        }
        if env.timestamp > signed.expiration {
            return Err(RegistryError::ExpiredSignature {
                expiration: signed.expiration,
                now: env.timestamp,
            });
        }
        match crypto::recover_signer(&signed.signature, commit_id) {
            Ok(signer) if self.roles.has_role(signer, Role::Operator) => {}
            Ok(signer) => {
                tracing::debug!("{signer} signed {commit_id} but is no operator");
                return Err(RegistryError::InvalidSignature(commit_id));
            }
            Err(err) => {
                tracing::debug!("cannot recover signer of {commit_id}: {err}");
                return Err(RegistryError::InvalidSignature(commit_id));
            }
        }

        let commit = Commit {
            user_seed_hash: signed.user_seed_hash,
            operator_seed_hash: signed.operator_seed_hash,
            owner: submitter,
            ready_height: env.number + self.confirmations,
        };
        self.commits.insert(commit_id, commit);
        tracing::debug!("created {commit_id} ready at {}", commit.ready_height);
        events.push(RegistryEvent::CommitCreated(CommitCreated {
            commit_id,
            user_seed_hash: commit.user_seed_hash,
            operator_seed_hash: commit.operator_seed_hash,
            owner: submitter,
        }));
        Ok(commit_id)
    }

    /// Reveals a single commitment. Operator only.
    ///
    /// Deletes the record, emits [`RegistryEvent::SeedRevealed`], calls the reveal
    /// hook and returns the random seed.
    #[instrument(level = "debug", skip(self, env, operator_seed, events))]
    pub fn reveal(
        &mut self,
        env: &BlockEnv,
        caller: Address,
        commit_id: CommitId,
        operator_seed: B256,
        events: &mut Vec<RegistryEvent>,
    ) -> Result<B256, RegistryError> {
        let mut random_seeds = self.multi_reveal(
            env,
            caller,
            &[RevealRequest {
                commit_id,
                operator_seed,
            }],
            events,
        )?;
        Ok(random_seeds.remove(0))
    }

    /// Reveals all requests as one atomic unit. Operator only.
    ///
    /// Every entry is validated before anything is mutated. If one entry fails
    /// the call returns its error and neither records, events nor the hook are
    /// touched. Revealing the same id twice within a batch fails with
    /// [`RevealError::UnknownCommit`] for the second entry.
    #[instrument(level = "debug", skip_all, fields(batch = requests.len()))]
    pub fn multi_reveal(
        &mut self,
        env: &BlockEnv,
        caller: Address,
        requests: &[RevealRequest],
        events: &mut Vec<RegistryEvent>,
    ) -> Result<Vec<B256>, RegistryError> {
        self.ensure_role(caller, Role::Operator)?;

        let mut consumed = HashSet::with_capacity(requests.len());
        let mut random_seeds = Vec::with_capacity(requests.len());
        for (idx, request) in requests.iter().enumerate() {
            let live = if consumed.contains(&request.commit_id) {
                None
            } else {
                self.commits.get(&request.commit_id)
            };
            let commit = RevealValidator::validate(
                request.commit_id,
                live,
                request.operator_seed,
                env.number,
            )
            .inspect_err(|err| tracing::debug!("entry {idx} rejected: {err}"))?;
            consumed.insert(request.commit_id);
            random_seeds.push(crypto::random_seed(
                commit.user_seed_hash,
                request.operator_seed,
                env.previous_hash,
            ));
        }

        for (request, random_seed) in requests.iter().zip(random_seeds.iter()) {
            self.commits.remove(&request.commit_id);
            events.push(RegistryEvent::SeedRevealed(SeedRevealed {
                commit_id: request.commit_id,
                operator_seed: request.operator_seed,
                random_seed: *random_seed,
            }));
        }
        for (request, random_seed) in requests.iter().zip(random_seeds.iter()) {
            self.reveal_hook.on_reveal(request.commit_id, *random_seed);
        }
        Ok(random_seeds)
    }

    fn ensure_role(&self, account: Address, role: Role) -> Result<(), RegistryError> {
        if self.roles.has_role(account, role) {
            Ok(())
        } else {
            Err(RegistryError::MissingRole { account, role })
        }
    }
}
