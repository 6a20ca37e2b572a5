//! # Error Hierarchy
//!
//! Structured error types for the foundational layer, built with `thiserror`.
//!
//! Each variant carries the rejected input so that operators can diagnose
//! misconfiguration without guesswork.

use thiserror::Error;

/// Validation errors for domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Account identifier is empty, too long, or contains whitespace.
    #[error("invalid account id: \"{0}\" (expected 1-128 non-whitespace characters)")]
    InvalidAccountId(String),

    /// Amount string is not a non-negative integer in smallest units.
    #[error("invalid amount: \"{0}\" (expected a non-negative integer)")]
    InvalidAmount(String),

    /// Arithmetic on amounts left the representable range.
    #[error("amount overflow: {operation} on {left} and {right}")]
    AmountOverflow {
        /// The operation that overflowed (e.g., "add", "sub").
        operation: &'static str,
        /// Left operand.
        left: u64,
        /// Right operand.
        right: u64,
    },

    /// Basis-point rate above 10 000 (100%).
    #[error("invalid basis points: {0} (expected 0..=10000)")]
    InvalidBasisPoints(u16),

    /// Timestamp string is not valid UTC ISO 8601.
    #[error("invalid timestamp: \"{value}\" ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be strings or integers.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
