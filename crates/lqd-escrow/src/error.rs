//! # Escrow Error Types
//!
//! Structured error hierarchy for the escrow core. Every variant names the
//! identity and context that triggered it. [`EscrowError::kind`] collapses
//! the variants into the five kinds callers branch on.

use lqd_core::{AccountId, Amount, ValidationError};
use lqd_ledger::{BatchPullError, TransferError};
use thiserror::Error;

use crate::transfer::{TransferId, TransferState};

/// The role an operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The escrow administrator.
    Administrator,
    /// A registered arbitrator ("frog").
    Arbitrator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Administrator => "administrator",
            Self::Arbitrator => "arbitrator",
        })
    }
}

/// Coarse classification of [`EscrowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller lacks the role the operation requires.
    Unauthorized,
    /// The targeted transfer, payer or batch is not in a state that allows
    /// the operation.
    InvalidState,
    /// Deposit attempted while the service is paused.
    PausedService,
    /// The asset ledger refused a movement.
    AssetTransferFailed,
    /// Malformed arguments.
    InvalidInput,
}

impl ErrorKind {
    /// Stable snake_case name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::InvalidState => "invalid_state",
            Self::PausedService => "paused_service",
            Self::AssetTransferFailed => "asset_transfer_failed",
            Self::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors arising from escrow operations.
#[derive(Error, Debug)]
pub enum EscrowError {
    /// The caller does not hold the role the operation requires.
    #[error("{caller} is not the {required} and may not {operation}")]
    Unauthorized {
        /// The calling identity.
        caller: AccountId,
        /// The role required.
        required: Role,
        /// The attempted operation.
        operation: &'static str,
    },

    /// The named beneficiary is not on the approved list.
    #[error("beneficiary {beneficiary} is not approved")]
    BeneficiaryNotApproved {
        /// The rejected beneficiary.
        beneficiary: AccountId,
    },

    /// The service is paused and does not accept new deposits.
    #[error("service is paused; {operation} rejected")]
    Paused {
        /// The rejected operation.
        operation: &'static str,
    },

    /// Deposit amount must be positive.
    #[error("deposit amount must be positive, got {amount}")]
    ZeroAmount {
        /// The rejected amount.
        amount: Amount,
    },

    /// A deposit must list at least one payer.
    #[error("deposit must list at least one payer")]
    EmptyPayerList,

    /// The custodian account was named as a payer or beneficiary. Moving
    /// funds between custody and itself leaves no trace on the asset ledger.
    #[error("custodian {custodian} may not act as {role}")]
    CustodianParticipant {
        /// The custodian account.
        custodian: AccountId,
        /// `"payer"` or `"beneficiary"`.
        role: &'static str,
    },

    /// A payer appears more than once in one deposit.
    #[error("payer {payer} is listed more than once")]
    DuplicatePayer {
        /// The repeated payer.
        payer: AccountId,
    },

    /// The payer already has an unresolved transfer.
    #[error("payer {payer} already has pending transfer {transfer_id}")]
    PayerAlreadyOpen {
        /// The payer.
        payer: AccountId,
        /// Their open transfer.
        transfer_id: TransferId,
    },

    /// The payer has no pending transfer to settle.
    #[error("payer {payer} has no pending transfer")]
    NoPendingTransfer {
        /// The payer.
        payer: AccountId,
    },

    /// The caller initiated no batch with a pending member.
    #[error("{initiator} has no batch with pending transfers to confirm")]
    NothingToConfirm {
        /// The calling initiator.
        initiator: AccountId,
    },

    /// The transfer has already reached a terminal state.
    #[error("transfer {transfer_id} is {state}, not PENDING")]
    TransferNotPending {
        /// The transfer.
        transfer_id: TransferId,
        /// Its current state.
        state: TransferState,
    },

    /// There is no retained profit to withdraw.
    #[error("no accumulated profit to withdraw")]
    NoProfit,

    /// The ledger refused to pull a payer's funds; nothing was admitted.
    #[error("could not pull funds from {payer}: {source}")]
    AssetTransferFailed {
        /// The payer whose pull failed.
        payer: AccountId,
        /// The ledger's reason.
        source: TransferError,
    },

    /// Admission failed and returning earlier pulls failed too. The listed
    /// payers' funds remain in custody outside any transfer record.
    #[error("admission failed at {payer} and rollback is incomplete for {unrefunded:?}: {source}")]
    RollbackIncomplete {
        /// The payer whose pull failed.
        payer: AccountId,
        /// Payers whose funds were not returned.
        unrefunded: Vec<AccountId>,
        /// The underlying batch failure.
        source: BatchPullError,
    },

    /// Paying out of custody failed. Transfers settled earlier in the same
    /// call stay settled; this one and any after it stay pending.
    #[error("payout of {amount} to {recipient} for transfer {transfer_id} failed after {settled_before} settlement(s): {source}")]
    PayoutFailed {
        /// The transfer being settled.
        transfer_id: TransferId,
        /// The intended recipient.
        recipient: AccountId,
        /// The amount being paid.
        amount: Amount,
        /// How many transfers this call settled before the failure.
        settled_before: usize,
        /// The ledger's reason.
        source: TransferError,
    },

    /// Paying accumulated profit out of custody failed. Profit is unchanged.
    #[error("withdrawal of {amount} profit to {recipient} failed: {source}")]
    WithdrawalFailed {
        /// The intended recipient.
        recipient: AccountId,
        /// The profit amount.
        amount: Amount,
        /// The ledger's reason.
        source: TransferError,
    },

    /// Counter or amount arithmetic overflowed.
    #[error("accounting error: {0}")]
    Accounting(#[from] ValidationError),
}

impl EscrowError {
    /// The coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } | Self::BeneficiaryNotApproved { .. } => {
                ErrorKind::Unauthorized
            }
            Self::Paused { .. } => ErrorKind::PausedService,
            Self::ZeroAmount { .. }
            | Self::EmptyPayerList
            | Self::DuplicatePayer { .. }
            | Self::CustodianParticipant { .. }
            | Self::Accounting(_) => ErrorKind::InvalidInput,
            Self::PayerAlreadyOpen { .. }
            | Self::NoPendingTransfer { .. }
            | Self::NothingToConfirm { .. }
            | Self::TransferNotPending { .. }
            | Self::NoProfit => ErrorKind::InvalidState,
            Self::AssetTransferFailed { .. }
            | Self::RollbackIncomplete { .. }
            | Self::PayoutFailed { .. }
            | Self::WithdrawalFailed { .. } => ErrorKind::AssetTransferFailed,
        }
    }
}

impl From<BatchPullError> for EscrowError {
    fn from(err: BatchPullError) -> Self {
        match err {
            BatchPullError::Rejected { payer, source } => {
                Self::AssetTransferFailed { payer, source }
            }
            other => Self::RollbackIncomplete {
                payer: other.payer().clone(),
                unrefunded: other.unrefunded().to_vec(),
                source: other,
            },
        }
    }
}

/// Errors loading or validating an [`EscrowConfig`](crate::config::EscrowConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The I/O error.
        source: std::io::Error,
    },

    /// YAML parse failure.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse failure.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: \"{value}\"")]
    InvalidOverride {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The configuration is internally inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}
