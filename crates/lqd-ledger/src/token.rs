//! # In-Memory Token Ledger
//!
//! [`TokenLedger`] is a fungible asset with allowance-gated third-party
//! transfers: an owner `approve`s a spender, and the spender may then
//! `transfer_from` the owner up to that allowance. It backs the CLI
//! simulator and the test suites, and is the reference for what an external
//! ledger integration must provide.
//!
//! ## Thread Safety
//!
//! State lives behind an `Arc<parking_lot::RwLock<_>>`; clones share it.
//! `parking_lot::RwLock` is non-poisonable, so a panicking writer does not
//! permanently corrupt the ledger.
//!
//! ## Check Order
//!
//! `transfer_from` checks the allowance before the balance, so a payer who
//! never approved the spender is reported as `InsufficientAllowance` even if
//! their balance is also short.

use std::collections::HashMap;
use std::sync::Arc;

use lqd_core::{AccountId, Amount};
use parking_lot::RwLock;

use crate::adapter::LedgerAdapter;
use crate::error::{BatchPullError, TransferError};

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<AccountId, Amount>,
    allowances: HashMap<(AccountId, AccountId), Amount>,
    total_supply: Amount,
}

impl TokenState {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn move_funds(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let from_balance = self.balance(from);
        let debited = from_balance
            .checked_sub(amount)
            .map_err(|_| TransferError::InsufficientBalance {
                account: from.clone(),
                balance: from_balance,
                needed: amount,
            })?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .map_err(|_| TransferError::Overflow {
                account: to.clone(),
                amount,
            })?;
        self.balances.insert(from.clone(), debited);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }

    fn spend_allowance_and_move(
        &mut self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let allowance = self.allowance(from, spender);
        let remaining =
            allowance
                .checked_sub(amount)
                .map_err(|_| TransferError::InsufficientAllowance {
                    owner: from.clone(),
                    spender: spender.clone(),
                    allowance,
                    needed: amount,
                })?;
        self.move_funds(from, to, amount)?;
        self.allowances
            .insert((from.clone(), spender.clone()), remaining);
        Ok(())
    }
}

/// A thread-safe, cloneable in-memory fungible asset ledger.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    state: Arc<RwLock<TokenState>>,
}

impl TokenLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new units of the asset in `to`'s account.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Overflow`] if the balance or total supply
    /// would exceed `u64::MAX`.
    pub fn mint(&self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        let mut state = self.state.write();
        let overflow = || TransferError::Overflow {
            account: to.clone(),
            amount,
        };
        let supply = state.total_supply.checked_add(amount).map_err(|_| overflow())?;
        let balance = state.balance(to).checked_add(amount).map_err(|_| overflow())?;
        state.total_supply = supply;
        state.balances.insert(to.clone(), balance);
        tracing::debug!(account = %to, %amount, "minted");
        Ok(())
    }

    /// Set the amount `spender` may move out of `owner`'s account,
    /// replacing any previous allowance.
    pub fn approve(&self, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.state
            .write()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
        tracing::debug!(%owner, %spender, %amount, "allowance set");
    }

    /// The amount `spender` may still move out of `owner`'s account.
    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.state.read().allowance(owner, spender)
    }

    /// The balance of `account`.
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.state.read().balance(account)
    }

    /// Total units in existence.
    pub fn total_supply(&self) -> Amount {
        self.state.read().total_supply
    }

    /// Move `amount` from `from` to `to` on `from`'s own authority.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InsufficientBalance`] if `from` holds less
    /// than `amount`.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.state.write().move_funds(from, to, amount)?;
        tracing::debug!(%from, %to, %amount, "transfer");
        Ok(())
    }

    /// Move `amount` from `from` to `to` on `spender`'s authority, consuming
    /// allowance.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InsufficientAllowance`] first, then
    /// [`TransferError::InsufficientBalance`]. On error nothing changes.
    pub fn transfer_from(
        &self,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.state
            .write()
            .spend_allowance_and_move(spender, from, to, amount)?;
        tracing::debug!(%spender, %from, %to, %amount, "transfer_from");
        Ok(())
    }

    /// Run `transfer_from` for every account in `from` as one transaction.
    ///
    /// Either every movement commits or the ledger is left exactly as it
    /// was, allowances included.
    ///
    /// # Errors
    ///
    /// Returns [`BatchPullError::Rejected`] naming the first account whose
    /// movement failed.
    pub fn transfer_from_all(
        &self,
        spender: &AccountId,
        from: &[AccountId],
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), BatchPullError> {
        let mut state = self.state.write();

        // Snapshot every entry the batch can touch.
        let mut saved_balances: Vec<(AccountId, Option<Amount>)> = from
            .iter()
            .map(|a| (a.clone(), state.balances.get(a).copied()))
            .collect();
        saved_balances.push((to.clone(), state.balances.get(to).copied()));
        let saved_allowances: Vec<((AccountId, AccountId), Option<Amount>)> = from
            .iter()
            .map(|a| {
                let key = (a.clone(), spender.clone());
                let value = state.allowances.get(&key).copied();
                (key, value)
            })
            .collect();

        for payer in from {
            if let Err(source) = state.spend_allowance_and_move(spender, payer, to, amount) {
                for (account, value) in saved_balances {
                    match value {
                        Some(v) => state.balances.insert(account, v),
                        None => state.balances.remove(&account),
                    };
                }
                for (key, value) in saved_allowances {
                    match value {
                        Some(v) => state.allowances.insert(key, v),
                        None => state.allowances.remove(&key),
                    };
                }
                tracing::debug!(%spender, payer = %payer, error = %source, "batch transfer_from rolled back");
                return Err(BatchPullError::Rejected {
                    payer: payer.clone(),
                    source,
                });
            }
        }
        tracing::debug!(%spender, %to, %amount, count = from.len(), "batch transfer_from committed");
        Ok(())
    }
}

/// A [`TokenLedger`] acting on behalf of one custodian account.
#[derive(Debug, Clone)]
pub struct CustodyAdapter {
    ledger: TokenLedger,
    custodian: AccountId,
}

impl CustodyAdapter {
    /// Bind `ledger` to `custodian`.
    pub fn new(ledger: TokenLedger, custodian: AccountId) -> Self {
        Self { ledger, custodian }
    }

    /// The underlying ledger.
    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }
}

impl LedgerAdapter for CustodyAdapter {
    fn custodian(&self) -> &AccountId {
        &self.custodian
    }

    fn pull(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.ledger.transfer_from(&self.custodian, from, to, amount)
    }

    fn push(&self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.ledger.transfer(&self.custodian, to, amount)
    }

    fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.ledger.allowance(owner, spender)
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        self.ledger.balance_of(account)
    }

    fn pull_batch(
        &self,
        from: &[AccountId],
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), BatchPullError> {
        self.ledger
            .transfer_from_all(&self.custodian, from, to, amount)
    }
}
