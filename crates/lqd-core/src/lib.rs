#![deny(missing_docs)]

//! # lqd-core: Foundational Types for the Liquidator Escrow Stack
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies. It uses only `serde`, `serde_json`,
//! `thiserror`, `chrono`, `uuid`, and `sha2` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** An [`AccountId`] is not a
//!    [`BatchId`], and an [`Amount`] is not a bare integer. Amounts only
//!    change through checked arithmetic.
//!
//! 2. **[`CanonicalBytes`] is the sole path to digest computation.** Audit
//!    entries are hashed through `CanonicalBytes::new()`, which rejects floats
//!    and sorts object keys before serialization.
//!
//! 3. **Structured errors.** [`ValidationError`] and
//!    [`CanonicalizationError`] are `thiserror` enums. No `Box<dyn Error>`,
//!    no `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use amount::Amount;
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, ValidationError};
pub use identity::{AccountId, BatchId};
pub use temporal::Timestamp;
