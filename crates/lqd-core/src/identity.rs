//! # Identity Newtypes
//!
//! Identifiers for the parties and groupings of the escrow stack.
//!
//! - [`AccountId`] names any identity that can hold the asset or call the
//!   escrow: payers, beneficiaries, arbitrators, the administrator and the
//!   custodian itself. Validated at construction.
//! - [`BatchId`] names the group of pending transfers created by one deposit
//!   call. UUID-based and always valid by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

const MAX_ACCOUNT_ID_LEN: usize = 128;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// An account on the asset ledger and a caller identity on the escrow.
///
/// Any non-empty label of at most 128 characters without whitespace is
/// accepted, so both hex addresses (`0x9fE4…`) and readable names
/// (`alice`) work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Create a validated account identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAccountId`] if the value is empty,
    /// longer than 128 characters, or contains whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty()
            || value.chars().count() > MAX_ACCOUNT_ID_LEN
            || value.chars().any(char::is_whitespace)
        {
            return Err(ValidationError::InvalidAccountId(value));
        }
        Ok(Self(value))
    }

    /// Access the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl std::str::FromStr for AccountId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// BatchId
// ---------------------------------------------------------------------------

/// A unique identifier for a deposit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Create a new random batch identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a batch identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_accepts_addresses_and_names() {
        assert!(AccountId::new("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").is_ok());
        assert!(AccountId::new("alice").is_ok());
    }

    #[test]
    fn account_id_rejects_empty() {
        assert!(matches!(
            AccountId::new(""),
            Err(ValidationError::InvalidAccountId(_))
        ));
    }

    #[test]
    fn account_id_rejects_whitespace() {
        assert!(AccountId::new("alice smith").is_err());
        assert!(AccountId::new(" alice").is_err());
    }

    #[test]
    fn account_id_rejects_overlong() {
        assert!(AccountId::new("a".repeat(129)).is_err());
        assert!(AccountId::new("a".repeat(128)).is_ok());
    }

    #[test]
    fn account_id_serde_validates() {
        let ok: AccountId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(ok.as_str(), "bob");
        assert!(serde_json::from_str::<AccountId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"bob\"");
    }

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::new(), BatchId::new());
    }

    #[test]
    fn batch_id_display_is_prefixed() {
        let id = BatchId::new();
        assert!(id.to_string().starts_with("batch:"));
    }
}
