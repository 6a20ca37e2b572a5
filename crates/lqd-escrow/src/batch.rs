//! # Batch Coordinator
//!
//! Groups the transfers admitted by one deposit call. The coordinator owns
//! no funds and enforces no authorization; it answers one question for
//! `confirm`: which batches did this caller initiate that may still hold
//! pending transfers?
//!
//! Batches are registered only after every payer's funds were pulled, so a
//! batch never exists for a failed admission.

use std::collections::HashMap;

use lqd_core::{AccountId, BatchId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::transfer::TransferId;

/// The transfers created by one deposit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier.
    pub id: BatchId,
    /// Caller of the deposit.
    pub initiator: AccountId,
    /// Payers in deposit order.
    pub payers: Vec<AccountId>,
    /// Transfers in deposit order, parallel to `payers`.
    pub transfers: Vec<TransferId>,
    /// When the batch was admitted.
    pub created_at: Timestamp,
}

/// Index of batches by id and by initiator.
#[derive(Debug, Default)]
pub struct BatchCoordinator {
    batches: HashMap<BatchId, Batch>,
    // Initiator → batches not yet retired, oldest first.
    open_by_initiator: HashMap<AccountId, Vec<BatchId>>,
}

impl BatchCoordinator {
    /// Create an empty coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh batch id.
    pub fn allocate(&self) -> BatchId {
        loop {
            let id = BatchId::new();
            if !self.batches.contains_key(&id) {
                return id;
            }
        }
    }

    /// Register an admitted batch.
    pub fn register(&mut self, batch: Batch) {
        self.open_by_initiator
            .entry(batch.initiator.clone())
            .or_default()
            .push(batch.id);
        self.batches.insert(batch.id, batch);
    }

    /// Look up a batch.
    pub fn get(&self, id: &BatchId) -> Option<&Batch> {
        self.batches.get(id)
    }

    /// Batches `initiator` created that have not been retired, oldest first.
    pub fn open_initiated_by(&self, initiator: &AccountId) -> &[BatchId] {
        self.open_by_initiator
            .get(initiator)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drop a fully settled batch from the initiator index. The batch itself
    /// stays queryable.
    pub fn retire(&mut self, id: &BatchId) {
        let Some(batch) = self.batches.get(id) else {
            return;
        };
        if let Some(open) = self.open_by_initiator.get_mut(&batch.initiator) {
            open.retain(|b| b != id);
            if open.is_empty() {
                self.open_by_initiator.remove(&batch.initiator);
            }
        }
    }

    /// Number of batches ever registered.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether no batch was ever registered.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn batch(coord: &BatchCoordinator, initiator: &str, first_tx: u64) -> Batch {
        Batch {
            id: coord.allocate(),
            initiator: acct(initiator),
            payers: vec![acct("p1"), acct("p2")],
            transfers: vec![TransferId::new(first_tx), TransferId::new(first_tx + 1)],
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn initiator_lookup_is_ordered() {
        let mut coord = BatchCoordinator::new();
        let a = batch(&coord, "user1", 0);
        let a_id = a.id;
        coord.register(a);
        let b = batch(&coord, "user1", 2);
        let b_id = b.id;
        coord.register(b);
        let c = batch(&coord, "user4", 4);
        coord.register(c);

        assert_eq!(coord.open_initiated_by(&acct("user1")), &[a_id, b_id]);
        assert_eq!(coord.open_initiated_by(&acct("user4")).len(), 1);
        assert!(coord.open_initiated_by(&acct("nobody")).is_empty());
        assert_eq!(coord.len(), 3);
    }

    #[test]
    fn retire_removes_from_index_but_keeps_batch() {
        let mut coord = BatchCoordinator::new();
        let a = batch(&coord, "user1", 0);
        let a_id = a.id;
        coord.register(a);

        coord.retire(&a_id);
        assert!(coord.open_initiated_by(&acct("user1")).is_empty());
        assert_eq!(coord.get(&a_id).map(|b| b.payers.len()), Some(2));
    }
}
