//! # Ledger Adapter
//!
//! The boundary between the escrow core and whatever ledger actually holds
//! the asset. An adapter is bound to one custodian account: `pull` moves
//! funds *into* custody using the allowance payers granted the custodian,
//! `push` moves funds *out of* custody.
//!
//! ## Atomic Admission
//!
//! A multi-payer deposit must pull from every payer or from none.
//! [`LedgerAdapter::pull_batch`] has a provided implementation that pulls in
//! order and, on the first refusal, pushes every earlier pull back in
//! reverse order. That is the compensating path for ledgers without native
//! transactions. Ledgers that can commit several movements at once should
//! override it; compensating refunds restore balances but cannot restore
//! consumed allowances.

use lqd_core::{AccountId, Amount};

use crate::error::{BatchPullError, TransferError};

/// Moves the single escrow asset on behalf of a custodian account.
pub trait LedgerAdapter: Send + Sync {
    /// The custodian account this adapter acts as.
    fn custodian(&self) -> &AccountId;

    /// Move `amount` from `from` to `to`, spending the allowance `from`
    /// granted the custodian.
    fn pull(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), TransferError>;

    /// Move `amount` from the custodian to `to`.
    fn push(&self, to: &AccountId, amount: Amount) -> Result<(), TransferError>;

    /// How much `spender` may still pull from `owner`.
    fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> Amount;

    /// The asset balance of `account`.
    fn balance_of(&self, account: &AccountId) -> Amount;

    /// Pull `amount` from every account in `from`, in order, all or nothing.
    fn pull_batch(
        &self,
        from: &[AccountId],
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), BatchPullError> {
        let mut pulled: Vec<&AccountId> = Vec::with_capacity(from.len());
        for payer in from {
            match self.pull(payer, to, amount) {
                Ok(()) => pulled.push(payer),
                Err(source) => {
                    tracing::debug!(
                        payer = %payer,
                        reverted = pulled.len(),
                        error = %source,
                        "batch pull rejected, reversing earlier pulls"
                    );
                    while let Some(done) = pulled.pop() {
                        if let Err(rollback_error) = self.push(done, amount) {
                            let mut unrefunded: Vec<AccountId> =
                                pulled.iter().map(|p| (*p).clone()).collect();
                            unrefunded.push(done.clone());
                            return Err(BatchPullError::RollbackIncomplete {
                                payer: payer.clone(),
                                source,
                                unrefunded,
                                rollback_error,
                            });
                        }
                    }
                    return Err(BatchPullError::Rejected {
                        payer: payer.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<T: LedgerAdapter + ?Sized> LedgerAdapter for std::sync::Arc<T> {
    fn custodian(&self) -> &AccountId {
        (**self).custodian()
    }

    fn pull(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        (**self).pull(from, to, amount)
    }

    fn push(&self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        (**self).push(to, amount)
    }

    fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        (**self).allowance_of(owner, spender)
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        (**self).balance_of(account)
    }

    fn pull_batch(
        &self,
        from: &[AccountId],
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), BatchPullError> {
        (**self).pull_batch(from, to, amount)
    }
}
