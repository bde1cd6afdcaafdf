use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Capabilities an account can hold in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May grant and revoke roles.
    Admin,
    /// May sign commitments and submit reveals.
    Operator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("admin"),
            Role::Operator => f.write_str("operator"),
        }
    }
}

/// Maps accounts to the set of roles they hold.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry(HashMap<Address, HashSet<Role>>);

impl RoleRegistry {
    /// Returns `true` if `account` holds `role`.
    pub fn has_role(&self, account: Address, role: Role) -> bool {
        self.0.get(&account).is_some_and(|roles| roles.contains(&role))
    }

    /// Grants `role` to `account`. Returns `false` if the account already held it.
    pub(crate) fn grant(&mut self, account: Address, role: Role) -> bool {
        self.0.entry(account).or_default().insert(role)
    }

    /// Revokes `role` from `account`. Returns `false` if the account did not hold it.
    pub(crate) fn revoke(&mut self, account: Address, role: Role) -> bool {
        let Some(roles) = self.0.get_mut(&account) else {
            return false;
        };
        let removed = roles.remove(&role);
        if roles.is_empty() {
            self.0.remove(&account);
        }
        removed
    }
}
