//! # Access Registry
//!
//! Holds the administrator, the arbitrator ("frog") set, the approved
//! beneficiary set and the pause flag. Pure data plus gate checks; the
//! escrow ledger consults it at every entry point.
//!
//! Pausing blocks new deposits only. Settlement of transfers already in
//! custody stays available so funds are never stranded.

use std::collections::BTreeSet;

use lqd_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::{EscrowError, Role};

/// Role membership and the pause flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRegistry {
    administrator: AccountId,
    arbitrators: BTreeSet<AccountId>,
    approved_beneficiaries: BTreeSet<AccountId>,
    paused: bool,
}

impl AccessRegistry {
    /// Build a registry. The administrator is fixed for its lifetime.
    pub fn new(
        administrator: AccountId,
        arbitrators: impl IntoIterator<Item = AccountId>,
        approved_beneficiaries: impl IntoIterator<Item = AccountId>,
        paused: bool,
    ) -> Self {
        Self {
            administrator,
            arbitrators: arbitrators.into_iter().collect(),
            approved_beneficiaries: approved_beneficiaries.into_iter().collect(),
            paused,
        }
    }

    /// The administrator identity.
    pub fn administrator(&self) -> &AccountId {
        &self.administrator
    }

    /// Whether `identity` is the administrator.
    pub fn is_administrator(&self, identity: &AccountId) -> bool {
        &self.administrator == identity
    }

    /// Whether `identity` is a registered arbitrator.
    pub fn is_arbitrator(&self, identity: &AccountId) -> bool {
        self.arbitrators.contains(identity)
    }

    /// Whether `identity` may be named as a deposit's beneficiary.
    pub fn is_approved_beneficiary(&self, identity: &AccountId) -> bool {
        self.approved_beneficiaries.contains(identity)
    }

    /// Whether new deposits are blocked.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Registered arbitrators, sorted.
    pub fn arbitrators(&self) -> impl Iterator<Item = &AccountId> {
        self.arbitrators.iter()
    }

    /// Approved beneficiaries, sorted.
    pub fn approved_beneficiaries(&self) -> impl Iterator<Item = &AccountId> {
        self.approved_beneficiaries.iter()
    }

    /// Fail unless `caller` is the administrator.
    pub fn require_administrator(
        &self,
        caller: &AccountId,
        operation: &'static str,
    ) -> Result<(), EscrowError> {
        if self.is_administrator(caller) {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized {
                caller: caller.clone(),
                required: Role::Administrator,
                operation,
            })
        }
    }

    /// Fail unless `caller` is a registered arbitrator.
    pub fn require_arbitrator(
        &self,
        caller: &AccountId,
        operation: &'static str,
    ) -> Result<(), EscrowError> {
        if self.is_arbitrator(caller) {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized {
                caller: caller.clone(),
                required: Role::Arbitrator,
                operation,
            })
        }
    }

    /// Fail if new deposits are blocked.
    pub fn require_not_paused(&self, operation: &'static str) -> Result<(), EscrowError> {
        if self.paused {
            Err(EscrowError::Paused { operation })
        } else {
            Ok(())
        }
    }

    /// Set the pause flag. Administrator only. Returns whether the flag
    /// changed.
    pub fn set_paused(&mut self, by: &AccountId, value: bool) -> Result<bool, EscrowError> {
        self.require_administrator(by, "set_paused")?;
        let changed = self.paused != value;
        self.paused = value;
        Ok(changed)
    }

    /// Register an arbitrator. Administrator only. Returns whether the set
    /// changed.
    pub fn add_arbitrator(&mut self, by: &AccountId, who: AccountId) -> Result<bool, EscrowError> {
        self.require_administrator(by, "add_arbitrator")?;
        Ok(self.arbitrators.insert(who))
    }

    /// Remove an arbitrator. Administrator only.
    pub fn remove_arbitrator(
        &mut self,
        by: &AccountId,
        who: &AccountId,
    ) -> Result<bool, EscrowError> {
        self.require_administrator(by, "remove_arbitrator")?;
        Ok(self.arbitrators.remove(who))
    }

    /// Approve a beneficiary. Administrator only.
    pub fn approve_beneficiary(
        &mut self,
        by: &AccountId,
        who: AccountId,
    ) -> Result<bool, EscrowError> {
        self.require_administrator(by, "approve_beneficiary")?;
        Ok(self.approved_beneficiaries.insert(who))
    }

    /// Revoke a beneficiary. Transfers already admitted for it are unaffected.
    pub fn revoke_beneficiary(
        &mut self,
        by: &AccountId,
        who: &AccountId,
    ) -> Result<bool, EscrowError> {
        self.require_administrator(by, "revoke_beneficiary")?;
        Ok(self.approved_beneficiaries.remove(who))
    }
}
