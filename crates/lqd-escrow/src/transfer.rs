//! # Pending Transfers
//!
//! A [`PendingTransfer`] is the unit of custody: one payer's contribution to
//! one deposit batch.
//!
//! ## State Machine
//!
//! ```text
//!            confirm / confirm_frog
//!   PENDING ───────────────────────▶ CONFIRMED
//!      │
//!      │ cancel
//!      ▼
//!   CANCELLED
//! ```
//!
//! `Pending` is the only initial state; `Confirmed` and `Cancelled` are
//! terminal. Records are never deleted, so the vector of transfers doubles
//! as settlement history.

use lqd_core::{AccountId, Amount, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;

/// Sequence number of a transfer, assigned at admission starting from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(u64);

impl TransferId {
    /// Wrap a raw sequence number.
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The raw sequence number.
    pub const fn seq(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Lifecycle state of a [`PendingTransfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Funds are in custody awaiting settlement.
    Pending,
    /// Funds were released to the beneficiary. Terminal.
    Confirmed,
    /// Funds were returned to the payer. Terminal.
    Cancelled,
}

impl TransferState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a transfer reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPath {
    /// The batch initiator confirmed the whole batch.
    Confirm,
    /// An arbitrator confirmed this transfer alone.
    ConfirmFrog,
    /// An arbitrator refunded this transfer to its payer.
    Cancel,
}

impl SettlementPath {
    /// Stable snake_case name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::ConfirmFrog => "confirm_frog",
            Self::Cancel => "cancel",
        }
    }

    /// The state a transfer settled along this path ends in.
    pub fn target_state(&self) -> TransferState {
        match self {
            Self::Confirm | Self::ConfirmFrog => TransferState::Confirmed,
            Self::Cancel => TransferState::Cancelled,
        }
    }
}

impl std::fmt::Display for SettlementPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal details recorded when a transfer settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Which path settled it.
    pub path: SettlementPath,
    /// Who invoked the settlement.
    pub settled_by: AccountId,
    /// Who received the funds (beneficiary or payer).
    pub recipient: AccountId,
    /// Amount actually paid to `recipient`.
    pub paid: Amount,
    /// Amount retained as operator profit.
    pub fee: Amount,
    /// When it settled.
    pub settled_at: Timestamp,
}

/// One payer's funds held in custody for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    /// Sequence number.
    pub id: TransferId,
    /// The batch this transfer belongs to.
    pub batch_id: BatchId,
    /// Who funded it.
    pub payer: AccountId,
    /// Who receives it on confirmation.
    pub beneficiary: AccountId,
    /// Who called the deposit that created it.
    pub initiator: AccountId,
    /// Amount held in custody. Always positive.
    pub amount: Amount,
    /// Current lifecycle state.
    pub state: TransferState,
    /// When it was admitted.
    pub created_at: Timestamp,
    /// Terminal details; `None` while pending.
    pub settlement: Option<Settlement>,
}

impl PendingTransfer {
    /// Whether the transfer still awaits settlement.
    pub fn is_pending(&self) -> bool {
        self.state == TransferState::Pending
    }

    /// Reject any operation on a transfer that is no longer pending.
    pub fn ensure_pending(&self) -> Result<(), EscrowError> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(EscrowError::TransferNotPending {
                transfer_id: self.id,
                state: self.state,
            })
        }
    }

    /// Move to the terminal state implied by `settlement.path`.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::TransferNotPending`] if already terminal; the
    /// record is unchanged in that case.
    pub fn settle(&mut self, settlement: Settlement) -> Result<(), EscrowError> {
        self.ensure_pending()?;
        self.state = settlement.path.target_state();
        self.settlement = Some(settlement);
        Ok(())
    }
}
