//! Access Control
//!
//! Role-based access control used as a sub-module of the protocol core.
//! Roles:
//! - Admin (can grant/revoke all roles, configure the protocol)
//! - Keeper (can trigger the L3 rebalance and harvest yield)
//! - Oracle (can submit reserve prices)
//!
//! Admin satisfies every keeper and oracle check. The last admin can never
//! be removed.

use odra::prelude::*;
use crate::errors::LeafError;

/// Role constants (u8 for efficient storage)
pub const ROLE_ADMIN: u8 = 0;
pub const ROLE_KEEPER: u8 = 1;
pub const ROLE_ORACLE: u8 = 2;

/// Number of defined roles
pub const ROLE_COUNT: u8 = 3;

/// Role registry
#[odra::module]
pub struct AccessControl {
    /// Role assignments: (role, account) -> bool
    roles: Mapping<(u8, Address), bool>,
    /// Number of accounts with each role
    role_count: Mapping<u8, u32>,
}

impl AccessControl {
    /// Grant admin to the initial account
    pub fn init(&mut self, initial_admin: Address) {
        self.set_role_internal(ROLE_ADMIN, initial_admin, true);
    }

    // ========== Role Queries ==========

    /// Check if account has a specific role
    pub fn has_role(&self, role_id: u8, account: Address) -> bool {
        self.roles.get(&(role_id, account)).unwrap_or(false)
    }

    /// Get the number of accounts with a role
    pub fn member_count(&self, role_id: u8) -> u32 {
        self.role_count.get(&role_id).unwrap_or(0)
    }

    // ========== Role Management ==========

    /// Grant a role. Returns false if the account already held it.
    pub fn grant(&mut self, role_id: u8, account: Address) -> Result<bool, LeafError> {
        if role_id >= ROLE_COUNT {
            return Err(LeafError::InvalidConfig);
        }
        if self.has_role(role_id, account) {
            return Ok(false);
        }
        self.set_role_internal(role_id, account, true);
        Ok(true)
    }

    /// Revoke a role. Returns false if the account did not hold it.
    pub fn revoke(&mut self, role_id: u8, account: Address) -> Result<bool, LeafError> {
        if !self.has_role(role_id, account) {
            return Ok(false);
        }
        if role_id == ROLE_ADMIN && self.member_count(ROLE_ADMIN) <= 1 {
            return Err(LeafError::LastAdmin);
        }
        self.set_role_internal(role_id, account, false);
        Ok(true)
    }

    // ========== Caller Checks ==========

    pub fn require_admin(&self, caller: Address) -> Result<(), LeafError> {
        self.require_any(caller, &[ROLE_ADMIN])
    }

    pub fn require_keeper(&self, caller: Address) -> Result<(), LeafError> {
        self.require_any(caller, &[ROLE_KEEPER, ROLE_ADMIN])
    }

    pub fn require_oracle(&self, caller: Address) -> Result<(), LeafError> {
        self.require_any(caller, &[ROLE_ORACLE, ROLE_ADMIN])
    }

    // ========== Internal Functions ==========

    fn require_any(&self, caller: Address, roles: &[u8]) -> Result<(), LeafError> {
        if roles.iter().any(|role| self.has_role(*role, caller)) {
            Ok(())
        } else {
            Err(LeafError::Unauthorized)
        }
    }

    fn set_role_internal(&mut self, role_id: u8, account: Address, value: bool) {
        let had_role = self.has_role(role_id, account);
        self.roles.set(&(role_id, account), value);

        let current_count = self.member_count(role_id);
        if value && !had_role {
            self.role_count.set(&role_id, current_count + 1);
        } else if !value && had_role && current_count > 0 {
            self.role_count.set(&role_id, current_count - 1);
        }
    }
}
