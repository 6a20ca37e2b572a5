//! # lqd-ledger: Asset Ledger Boundary
//!
//! The escrow core never touches balances directly. Every movement of the
//! asset goes through a [`LedgerAdapter`], bound to the escrow's custodian
//! account:
//!
//! - **Adapter** ([`adapter`]): the trait, including the all-or-nothing
//!   [`LedgerAdapter::pull_batch`] used for multi-payer admission.
//!
//! - **Token** ([`token`]): [`TokenLedger`], an in-memory fungible asset with
//!   `approve`/`transfer_from` allowance semantics, and [`CustodyAdapter`],
//!   which binds it to a custodian and overrides `pull_batch` with a native
//!   transactional implementation.

pub mod adapter;
pub mod error;
pub mod token;

pub use adapter::LedgerAdapter;
pub use error::{BatchPullError, TransferError};
pub use token::{CustodyAdapter, TokenLedger};
