//! # Escrow Audit Trail
//!
//! Records every admission, settlement and administrative change made by
//! the escrow ledger.
//!
//! Each entry is digested via `CanonicalBytes` + `sha256_digest` over its
//! payload, which includes the previous entry's digest. The resulting chain
//! makes after-the-fact edits detectable by [`AuditTrail::verify_chain`].
//! The trail is bounded and trims the oldest 10% when its capacity is
//! exceeded; verification covers the retained window.

use lqd_core::{sha256_digest, AccountId, Amount, BatchId, CanonicalBytes, ContentDigest, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AuditEntryType
// ---------------------------------------------------------------------------

/// The type of audit trail event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntryType {
    /// A payer's funds were admitted into custody.
    Deposited,
    /// The batch initiator confirmed a transfer.
    Confirmed,
    /// An arbitrator confirmed a transfer.
    ConfirmedByArbitrator,
    /// An arbitrator refunded a transfer.
    Cancelled,
    /// The pause flag changed.
    PauseChanged,
    /// Arbitrator or beneficiary membership changed.
    RoleChanged,
    /// Accumulated profit was paid out.
    ProfitWithdrawn,
}

impl AuditEntryType {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposited => "deposited",
            Self::Confirmed => "confirmed",
            Self::ConfirmedByArbitrator => "confirmed_by_arbitrator",
            Self::Cancelled => "cancelled",
            Self::PauseChanged => "pause_changed",
            Self::RoleChanged => "role_changed",
            Self::ProfitWithdrawn => "profit_withdrawn",
        }
    }
}

impl std::fmt::Display for AuditEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// Event details supplied by the caller of [`AuditTrail::record`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditEvent {
    /// Batch the event concerns.
    pub batch_id: Option<BatchId>,
    /// Payer the event concerns.
    pub payer: Option<AccountId>,
    /// Counterparty (beneficiary, refund target, profit recipient).
    pub counterparty: Option<AccountId>,
    /// Amount moved.
    pub amount: Option<Amount>,
    /// Free-form detail, e.g. `"paused=true"`.
    pub detail: Option<String>,
}

/// A single entry in the escrow audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the full trail, counting trimmed entries.
    pub sequence: u64,
    /// The type of audit event.
    pub entry_type: AuditEntryType,
    /// Identity that invoked the operation.
    pub actor: AccountId,
    /// When the event occurred.
    pub timestamp: Timestamp,
    /// Batch the event concerns.
    pub batch_id: Option<BatchId>,
    /// Payer the event concerns.
    pub payer: Option<AccountId>,
    /// Counterparty the event concerns.
    pub counterparty: Option<AccountId>,
    /// Amount moved.
    pub amount: Option<Amount>,
    /// Free-form detail.
    pub detail: Option<String>,
    /// Digest of the preceding entry, or [`ContentDigest::GENESIS`].
    pub previous_digest: ContentDigest,
    /// Digest of this entry's payload. `None` if canonicalization failed.
    pub digest: Option<ContentDigest>,
}

// Everything in an entry except its own digest.
#[derive(Serialize)]
struct Payload<'a> {
    sequence: u64,
    entry_type: AuditEntryType,
    actor: &'a AccountId,
    timestamp: &'a Timestamp,
    batch_id: &'a Option<BatchId>,
    payer: &'a Option<AccountId>,
    counterparty: &'a Option<AccountId>,
    amount: &'a Option<Amount>,
    detail: &'a Option<String>,
    previous_digest: &'a ContentDigest,
}

impl AuditEntry {
    /// Compute the content-addressed digest of this entry's payload.
    ///
    /// Returns `None` if canonicalization fails.
    pub fn compute_digest(&self) -> Option<ContentDigest> {
        let payload = Payload {
            sequence: self.sequence,
            entry_type: self.entry_type,
            actor: &self.actor,
            timestamp: &self.timestamp,
            batch_id: &self.batch_id,
            payer: &self.payer,
            counterparty: &self.counterparty,
            amount: &self.amount,
            detail: &self.detail,
            previous_digest: &self.previous_digest,
        };
        match CanonicalBytes::new(&payload) {
            Ok(canonical) => Some(sha256_digest(&canonical)),
            Err(e) => {
                tracing::warn!(entry_type = %self.entry_type, sequence = self.sequence, error = %e, "audit entry canonicalization failed; digest unavailable");
                None
            }
        }
    }
}

/// A break in the audit hash chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainBreak {
    /// The stored digest does not match the recomputed one.
    #[error("audit entry {sequence} digest mismatch")]
    DigestMismatch {
        /// The offending entry.
        sequence: u64,
    },
    /// The entry's `previous_digest` does not match its predecessor.
    #[error("audit entry {sequence} does not link to its predecessor")]
    BrokenLink {
        /// The offending entry.
        sequence: u64,
    },
    /// The entry carries no digest.
    #[error("audit entry {sequence} has no digest")]
    MissingDigest {
        /// The offending entry.
        sequence: u64,
    },
}

// ---------------------------------------------------------------------------
// AuditTrail
// ---------------------------------------------------------------------------

/// An append-only, hash-chained audit trail with a bounded capacity.
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    max_entries: usize,
    next_sequence: u64,
    head: ContentDigest,
}

impl AuditTrail {
    /// Create a new audit trail with the given maximum capacity.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
            next_sequence: 0,
            head: ContentDigest::GENESIS,
        }
    }

    /// Append an event, chaining it to the current head.
    pub fn record(
        &mut self,
        entry_type: AuditEntryType,
        actor: &AccountId,
        event: AuditEvent,
    ) -> &AuditEntry {
        let mut entry = AuditEntry {
            sequence: self.next_sequence,
            entry_type,
            actor: actor.clone(),
            timestamp: Timestamp::now(),
            batch_id: event.batch_id,
            payer: event.payer,
            counterparty: event.counterparty,
            amount: event.amount,
            detail: event.detail,
            previous_digest: self.head,
            digest: None,
        };
        entry.digest = entry.compute_digest();
        // A failed digest leaves the head in place; verify_chain reports it.
        if let Some(d) = entry.digest {
            self.head = d;
        }
        self.next_sequence += 1;
        self.entries.push(entry);

        if self.entries.len() > self.max_entries {
            let trim_count = (self.max_entries / 10).max(1);
            self.entries.drain(..trim_count);
        }
        // The vector is non-empty after a push and trimming never empties it.
        let last = self.entries.len() - 1;
        &self.entries[last]
    }

    /// Return a reference to all retained entries.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Return the number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total entries ever recorded, including trimmed ones.
    pub fn total_recorded(&self) -> u64 {
        self.next_sequence
    }

    /// Digest of the newest entry, or [`ContentDigest::GENESIS`].
    pub fn head(&self) -> ContentDigest {
        self.head
    }

    /// Return entries concerning a specific payer.
    pub fn entries_for_payer(&self, payer: &AccountId) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.payer.as_ref() == Some(payer))
            .collect()
    }

    /// Return entries matching a specific event type.
    pub fn entries_by_type(&self, entry_type: AuditEntryType) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .collect()
    }

    /// Verify the retained window of the chain.
    ///
    /// Every entry's digest must match its recomputed payload digest, and
    /// every entry after the first must link to its predecessor. The first
    /// retained entry links to [`ContentDigest::GENESIS`] only when nothing
    /// was trimmed.
    pub fn verify_chain(&self) -> Result<(), ChainBreak> {
        verify_entries(&self.entries)
    }
}

/// Verify a slice of entries as a contiguous chain segment.
pub fn verify_entries(entries: &[AuditEntry]) -> Result<(), ChainBreak> {
    let mut previous: Option<&AuditEntry> = None;
    for entry in entries {
        let sequence = entry.sequence;
        let stored = entry.digest.ok_or(ChainBreak::MissingDigest { sequence })?;
        if entry.compute_digest() != Some(stored) {
            return Err(ChainBreak::DigestMismatch { sequence });
        }
        let linked = match previous {
            Some(p) => p.digest == Some(entry.previous_digest) && p.sequence + 1 == sequence,
            None => sequence != 0 || entry.previous_digest == ContentDigest::GENESIS,
        };
        if !linked {
            return Err(ChainBreak::BrokenLink { sequence });
        }
        previous = Some(entry);
    }
    Ok(())
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("head", &self.head.to_hex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn deposit(trail: &mut AuditTrail, payer: &str, amount: u64) {
        trail.record(
            AuditEntryType::Deposited,
            &acct("user1"),
            AuditEvent {
                batch_id: Some(BatchId::new()),
                payer: Some(acct(payer)),
                counterparty: Some(acct("user2")),
                amount: Some(Amount::new(amount)),
                detail: None,
            },
        );
    }

    #[test]
    fn first_entry_links_to_genesis() {
        let mut trail = AuditTrail::new(10);
        deposit(&mut trail, "user1", 500);
        let first = &trail.entries()[0];
        assert_eq!(first.sequence, 0);
        assert_eq!(first.previous_digest, ContentDigest::GENESIS);
        assert!(first.digest.is_some());
        assert_eq!(trail.head(), first.digest.unwrap());
    }

    #[test]
    fn entries_chain_and_verify() {
        let mut trail = AuditTrail::new(10);
        deposit(&mut trail, "a", 1);
        deposit(&mut trail, "b", 2);
        deposit(&mut trail, "c", 3);
        let e = trail.entries();
        assert_eq!(e[1].previous_digest, e[0].digest.unwrap());
        assert_eq!(e[2].previous_digest, e[1].digest.unwrap());
        assert_eq!(trail.verify_chain(), Ok(()));
    }

    #[test]
    fn tampered_amount_is_detected() {
        let mut trail = AuditTrail::new(10);
        deposit(&mut trail, "a", 1);
        deposit(&mut trail, "b", 2);
        let mut copy = trail.entries().to_vec();
        copy[0].amount = Some(Amount::new(999));
        assert_eq!(
            verify_entries(&copy),
            Err(ChainBreak::DigestMismatch { sequence: 0 })
        );
    }

    #[test]
    fn removed_entry_breaks_link() {
        let mut trail = AuditTrail::new(10);
        deposit(&mut trail, "a", 1);
        deposit(&mut trail, "b", 2);
        deposit(&mut trail, "c", 3);
        let copy = vec![trail.entries()[0].clone(), trail.entries()[2].clone()];
        assert_eq!(
            verify_entries(&copy),
            Err(ChainBreak::BrokenLink { sequence: 2 })
        );
    }

    #[test]
    fn trims_oldest_tenth_and_still_verifies() {
        let mut trail = AuditTrail::new(20);
        for i in 0..21 {
            deposit(&mut trail, "p", i + 1);
        }
        assert_eq!(trail.len(), 19);
        assert_eq!(trail.entries()[0].sequence, 2);
        assert_eq!(trail.total_recorded(), 21);
        assert_eq!(trail.verify_chain(), Ok(()));
    }

    #[test]
    fn filters_by_payer_and_type() {
        let mut trail = AuditTrail::new(10);
        deposit(&mut trail, "a", 1);
        deposit(&mut trail, "b", 2);
        trail.record(
            AuditEntryType::PauseChanged,
            &acct("owner"),
            AuditEvent {
                detail: Some("paused=true".into()),
                ..AuditEvent::default()
            },
        );
        assert_eq!(trail.entries_for_payer(&acct("a")).len(), 1);
        assert_eq!(trail.entries_by_type(AuditEntryType::Deposited).len(), 2);
        assert_eq!(trail.entries_by_type(AuditEntryType::PauseChanged).len(), 1);
    }
}
