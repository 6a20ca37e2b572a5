//! # lqd-escrow: Escrow Core
//!
//! Holds payers' funds in custody until the deposit's initiator confirms or
//! an arbitrator ("frog") confirms or cancels:
//!
//! - **Ledger** ([`ledger`]): the [`EscrowLedger`] state machine. Batch
//!   admission, the three settlement paths, counters and read surface.
//!
//! - **Transfer** ([`transfer`]): [`PendingTransfer`] records and their
//!   `Pending → Confirmed | Cancelled` lifecycle.
//!
//! - **Batch** ([`batch`]): the [`BatchCoordinator`] mapping deposit calls
//!   to their transfers and initiators.
//!
//! - **Access** ([`access`]): the [`AccessRegistry`] of administrator,
//!   arbitrators, approved beneficiaries and the pause flag.
//!
//! - **Audit** ([`audit`]): a bounded, hash-chained [`AuditTrail`].
//!
//! - **Config** ([`config`]): [`EscrowConfig`] loading and validation.

pub mod access;
pub mod audit;
pub mod batch;
pub mod config;
pub mod error;
pub mod ledger;
pub mod transfer;

// Re-export primary types.
pub use access::AccessRegistry;
pub use audit::{AuditEntry, AuditEntryType, AuditTrail, ChainBreak};
pub use batch::{Batch, BatchCoordinator};
pub use config::EscrowConfig;
pub use error::{ConfigError, ErrorKind, EscrowError, Role};
pub use ledger::EscrowLedger;
pub use transfer::{PendingTransfer, Settlement, SettlementPath, TransferId, TransferState};
