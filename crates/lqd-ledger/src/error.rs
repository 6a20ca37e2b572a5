//! # Ledger Error Types
//!
//! Failures reported by an asset ledger. Each variant carries the accounts
//! and quantities involved so that the escrow can report exactly which payer
//! blocked an admission and why.

use lqd_core::{AccountId, Amount};
use thiserror::Error;

/// A single asset movement was refused by the ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The spender's allowance from `owner` is below the requested amount.
    #[error("insufficient allowance: {spender} may move {allowance} from {owner}, needs {needed}")]
    InsufficientAllowance {
        /// The account whose funds were requested.
        owner: AccountId,
        /// The account attempting the move.
        spender: AccountId,
        /// The allowance currently granted.
        allowance: Amount,
        /// The amount requested.
        needed: Amount,
    },

    /// The source account holds less than the requested amount.
    #[error("insufficient balance: {account} holds {balance}, needs {needed}")]
    InsufficientBalance {
        /// The account being debited.
        account: AccountId,
        /// Its current balance.
        balance: Amount,
        /// The amount requested.
        needed: Amount,
    },

    /// Crediting the destination would overflow its balance or the supply.
    #[error("balance overflow crediting {account} with {amount}")]
    Overflow {
        /// The account being credited.
        account: AccountId,
        /// The amount being credited.
        amount: Amount,
    },

    /// The ledger could not be reached or refused for another reason.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// An all-or-nothing pull from several payers failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchPullError {
    /// One payer's pull was refused; every earlier pull in the batch has
    /// been reversed.
    #[error("pull from {payer} rejected: {source}")]
    Rejected {
        /// The payer whose pull failed.
        payer: AccountId,
        /// The ledger's reason.
        source: TransferError,
    },

    /// One payer's pull was refused and reversing the earlier pulls failed
    /// part-way. `unrefunded` still sit in custody.
    #[error("pull from {payer} rejected ({source}); rollback failed for {} payer(s): {rollback_error}", .unrefunded.len())]
    RollbackIncomplete {
        /// The payer whose pull failed.
        payer: AccountId,
        /// The ledger's reason for the initial failure.
        source: TransferError,
        /// Payers whose funds could not be returned.
        unrefunded: Vec<AccountId>,
        /// The error raised by the failed refund.
        rollback_error: TransferError,
    },
}

impl BatchPullError {
    /// The payer whose pull caused the batch to fail.
    pub fn payer(&self) -> &AccountId {
        match self {
            Self::Rejected { payer, .. } | Self::RollbackIncomplete { payer, .. } => payer,
        }
    }

    /// The ledger's reason for the initial failure.
    pub fn cause(&self) -> &TransferError {
        match self {
            Self::Rejected { source, .. } | Self::RollbackIncomplete { source, .. } => source,
        }
    }

    /// Payers whose funds were pulled but could not be returned.
    pub fn unrefunded(&self) -> &[AccountId] {
        match self {
            Self::Rejected { .. } => &[],
            Self::RollbackIncomplete { unrefunded, .. } => unrefunded,
        }
    }
}
