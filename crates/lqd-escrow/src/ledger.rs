//! # Escrow Ledger
//!
//! The core state machine. Admits multi-payer deposits into custody, tracks
//! one [`PendingTransfer`] per payer, and resolves each exactly once along
//! one of three paths:
//!
//! | path | caller | scope | funds go to |
//! |---|---|---|---|
//! | `confirm` | batch initiator | every pending member of their batches | beneficiary |
//! | `confirm_frog` | arbitrator | one payer's transfer | beneficiary |
//! | `cancel` | arbitrator | one payer's transfer | payer |
//!
//! ## Concurrency
//!
//! Every operation takes the single state lock for its whole duration,
//! including the ledger adapter calls it makes. Two callers racing to settle
//! the same transfer are therefore ordered: the first settles it, the second
//! observes a non-pending transfer and fails without moving funds. The
//! handle is `Send + Sync` whenever the adapter is; share it with `Arc`.
//!
//! ## Custody Invariant
//!
//! After every operation, the custodian's asset balance equals the sum of
//! all pending amounts plus accumulated profit not yet withdrawn
//! ([`EscrowLedger::expected_custody`]), assuming nothing else moves funds
//! in or out of the custodian account.

use std::collections::{HashMap, HashSet};

use lqd_core::{AccountId, Amount, BatchId, Timestamp, ValidationError};
use lqd_ledger::{BatchPullError, LedgerAdapter};
use parking_lot::Mutex;

use crate::access::AccessRegistry;
use crate::audit::{AuditEntry, AuditEntryType, AuditEvent, AuditTrail, ChainBreak};
use crate::batch::{Batch, BatchCoordinator};
use crate::config::EscrowConfig;
use crate::error::{ConfigError, ErrorKind, EscrowError};
use crate::transfer::{PendingTransfer, Settlement, SettlementPath, TransferId, TransferState};

/// Everything guarded by the ledger's lock.
#[derive(Debug)]
struct EscrowState {
    registry: AccessRegistry,
    batches: BatchCoordinator,
    // Indexed by `TransferId::seq`.
    transfers: Vec<PendingTransfer>,
    open_by_payer: HashMap<AccountId, TransferId>,
    total_transactions: u64,
    accumulated_profit: Amount,
    audit: AuditTrail,
}

impl EscrowState {
    fn transfer(&self, id: TransferId) -> Option<&PendingTransfer> {
        usize::try_from(id.seq())
            .ok()
            .and_then(|i| self.transfers.get(i))
    }

    fn transfer_mut(&mut self, id: TransferId) -> Option<&mut PendingTransfer> {
        usize::try_from(id.seq())
            .ok()
            .and_then(|i| self.transfers.get_mut(i))
    }

    fn batch_settled(&self, batch_id: &BatchId) -> Option<bool> {
        let batch = self.batches.get(batch_id)?;
        Some(
            batch
                .transfers
                .iter()
                .all(|id| self.transfer(*id).map_or(true, |t| t.state.is_terminal())),
        )
    }
}

/// The escrow service handle.
pub struct EscrowLedger<L: LedgerAdapter> {
    adapter: L,
    fee_bps: u16,
    state: Mutex<EscrowState>,
}

impl<L: LedgerAdapter> EscrowLedger<L> {
    /// Build a ledger from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration is inconsistent
    /// or names a different custodian than the adapter is bound to.
    pub fn new(config: &EscrowConfig, adapter: L) -> Result<Self, ConfigError> {
        config.validate()?;
        if adapter.custodian() != &config.custodian {
            return Err(ConfigError::Invalid(format!(
                "config custodian {} does not match adapter custodian {}",
                config.custodian,
                adapter.custodian()
            )));
        }
        let registry = AccessRegistry::new(
            config.administrator.clone(),
            config.arbitrators.iter().cloned(),
            config.approved_beneficiaries.iter().cloned(),
            config.paused,
        );
        tracing::info!(
            administrator = %config.administrator,
            custodian = %config.custodian,
            arbitrators = config.arbitrators.len(),
            beneficiaries = config.approved_beneficiaries.len(),
            fee_bps = config.fee_bps,
            paused = config.paused,
            "escrow ledger initialised"
        );
        Ok(Self {
            adapter,
            fee_bps: config.fee_bps,
            state: Mutex::new(EscrowState {
                registry,
                batches: BatchCoordinator::new(),
                transfers: Vec::new(),
                open_by_payer: HashMap::new(),
                total_transactions: 0,
                accumulated_profit: Amount::ZERO,
                audit: AuditTrail::new(config.audit_capacity),
            }),
        })
    }

    // -- Mutating surface ----------------------------------------------------

    /// Admit `amount` from every payer into custody for `beneficiary`.
    ///
    /// Checks run in this order: pause flag, positive amount, non-empty payer
    /// list, approved beneficiary, custodian not taking part, duplicate
    /// payers, payers with an open transfer. Then funds are pulled from every payer as one unit. On any
    /// failure nothing is recorded.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::Paused`] while the service is paused.
    /// - [`EscrowError::ZeroAmount`], [`EscrowError::EmptyPayerList`],
    ///   [`EscrowError::DuplicatePayer`] for malformed arguments.
    /// - [`EscrowError::BeneficiaryNotApproved`].
    /// - [`EscrowError::CustodianParticipant`] if the custodian is the
    ///   beneficiary or one of the payers.
    /// - [`EscrowError::PayerAlreadyOpen`] if a payer has a pending transfer.
    /// - [`EscrowError::AssetTransferFailed`] naming the payer whose pull
    ///   failed, or [`EscrowError::RollbackIncomplete`] if returning earlier
    ///   pulls failed too.
    pub fn deposit(
        &self,
        caller: &AccountId,
        amount: Amount,
        beneficiary: &AccountId,
        payers: &[AccountId],
    ) -> Result<BatchId, EscrowError> {
        let result = self.admit(caller, amount, beneficiary, payers);
        self.observe("deposit", caller, &result);
        result
    }

    fn admit(
        &self,
        caller: &AccountId,
        amount: Amount,
        beneficiary: &AccountId,
        payers: &[AccountId],
    ) -> Result<BatchId, EscrowError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        st.registry.require_not_paused("deposit")?;
        if amount.is_zero() {
            return Err(EscrowError::ZeroAmount { amount });
        }
        if payers.is_empty() {
            return Err(EscrowError::EmptyPayerList);
        }
        if !st.registry.is_approved_beneficiary(beneficiary) {
            return Err(EscrowError::BeneficiaryNotApproved {
                beneficiary: beneficiary.clone(),
            });
        }
        let custodian = self.adapter.custodian();
        if beneficiary == custodian {
            return Err(EscrowError::CustodianParticipant {
                custodian: custodian.clone(),
                role: "beneficiary",
            });
        }
        if payers.contains(custodian) {
            return Err(EscrowError::CustodianParticipant {
                custodian: custodian.clone(),
                role: "payer",
            });
        }
        let mut seen = HashSet::with_capacity(payers.len());
        for payer in payers {
            if !seen.insert(payer) {
                return Err(EscrowError::DuplicatePayer {
                    payer: payer.clone(),
                });
            }
        }
        for payer in payers {
            if let Some(&transfer_id) = st.open_by_payer.get(payer) {
                return Err(EscrowError::PayerAlreadyOpen {
                    payer: payer.clone(),
                    transfer_id,
                });
            }
        }
        let count = payers.len() as u64;
        st.total_transactions
            .checked_add(count)
            .ok_or(ValidationError::AmountOverflow {
                operation: "total_transactions",
                left: st.total_transactions,
                right: count,
            })?;

        self.adapter
            .pull_batch(payers, self.adapter.custodian(), amount)
            .map_err(|e| {
                if let BatchPullError::RollbackIncomplete { unrefunded, .. } = &e {
                    tracing::error!(
                        payer = %e.payer(),
                        unrefunded = ?unrefunded,
                        "batch admission failed and compensating refunds are incomplete"
                    );
                }
                EscrowError::from(e)
            })?;

        let batch_id = st.batches.allocate();
        let created_at = Timestamp::now();
        let mut ids = Vec::with_capacity(payers.len());
        for payer in payers {
            let id = TransferId::new(st.total_transactions);
            st.total_transactions += 1;
            st.transfers.push(PendingTransfer {
                id,
                batch_id,
                payer: payer.clone(),
                beneficiary: beneficiary.clone(),
                initiator: caller.clone(),
                amount,
                state: TransferState::Pending,
                created_at,
                settlement: None,
            });
            st.open_by_payer.insert(payer.clone(), id);
            st.audit.record(
                AuditEntryType::Deposited,
                caller,
                AuditEvent {
                    batch_id: Some(batch_id),
                    payer: Some(payer.clone()),
                    counterparty: Some(beneficiary.clone()),
                    amount: Some(amount),
                    detail: None,
                },
            );
            ids.push(id);
        }
        st.batches.register(Batch {
            id: batch_id,
            initiator: caller.clone(),
            payers: payers.to_vec(),
            transfers: ids,
            created_at,
        });

        metrics::counter!("lqd_escrow_deposits_total").increment(1);
        tracing::info!(
            %batch_id,
            initiator = %caller,
            %beneficiary,
            %amount,
            payers = payers.len(),
            "deposit admitted"
        );
        Ok(batch_id)
    }

    /// Settle every pending member of every batch `caller` initiated, paying
    /// each to its beneficiary. Returns the number of transfers settled.
    ///
    /// # Errors
    ///
    /// Returns [`EscrowError::NothingToConfirm`] if the caller initiated no
    /// batch with a pending member, or [`EscrowError::PayoutFailed`] if a
    /// payout fails part way.
    ///
    /// # Partial effect
    ///
    /// This is the one entry point that is not all-or-nothing. Each payout
    /// leaves custody as it happens and cannot be pulled back from the
    /// beneficiary, so when the asset ledger refuses a payout part way, the
    /// transfers already paid in this call stay `Confirmed`. The failing
    /// transfer and everything after it stay `Pending`, and
    /// `PayoutFailed::settled_before` says how many were paid. Calling again
    /// retries the remainder. A ledger whose `push` cannot fail never hits
    /// this path.
    pub fn confirm(&self, caller: &AccountId) -> Result<usize, EscrowError> {
        let result = self.confirm_batches(caller);
        self.observe("confirm", caller, &result);
        result
    }

    fn confirm_batches(&self, caller: &AccountId) -> Result<usize, EscrowError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        let pending: Vec<TransferId> = st
            .batches
            .open_initiated_by(caller)
            .iter()
            .filter_map(|b| st.batches.get(b))
            .flat_map(|b| b.transfers.iter().copied())
            .filter(|id| st.transfer(*id).is_some_and(PendingTransfer::is_pending))
            .collect();
        if pending.is_empty() {
            return Err(EscrowError::NothingToConfirm {
                initiator: caller.clone(),
            });
        }
        for (settled, id) in pending.iter().enumerate() {
            self.settle(st, *id, SettlementPath::Confirm, caller, settled)?;
        }
        Ok(pending.len())
    }

    /// Arbitrator-forced confirmation of `payer`'s pending transfer.
    ///
    /// # Errors
    ///
    /// [`EscrowError::Unauthorized`] if `caller` is not an arbitrator (checked
    /// first), [`EscrowError::NoPendingTransfer`] if `payer` has none, or
    /// [`EscrowError::PayoutFailed`].
    pub fn confirm_frog(
        &self,
        caller: &AccountId,
        payer: &AccountId,
    ) -> Result<TransferId, EscrowError> {
        let result = self.arbitrate(caller, payer, SettlementPath::ConfirmFrog);
        self.observe("confirm_frog", caller, &result);
        result
    }

    /// Arbitrator refund of `payer`'s pending transfer. Sibling transfers in
    /// the same batch are untouched.
    ///
    /// # Errors
    ///
    /// As [`EscrowLedger::confirm_frog`].
    pub fn cancel(&self, caller: &AccountId, payer: &AccountId) -> Result<TransferId, EscrowError> {
        let result = self.arbitrate(caller, payer, SettlementPath::Cancel);
        self.observe("cancel", caller, &result);
        result
    }

    fn arbitrate(
        &self,
        caller: &AccountId,
        payer: &AccountId,
        path: SettlementPath,
    ) -> Result<TransferId, EscrowError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        st.registry.require_arbitrator(caller, path.as_str())?;
        let id = *st
            .open_by_payer
            .get(payer)
            .ok_or_else(|| EscrowError::NoPendingTransfer {
                payer: payer.clone(),
            })?;
        self.settle(st, id, path, caller, 0)?;
        Ok(id)
    }

    /// Move one pending transfer to its terminal state and pay it out.
    fn settle(
        &self,
        st: &mut EscrowState,
        id: TransferId,
        path: SettlementPath,
        caller: &AccountId,
        settled_before: usize,
    ) -> Result<(), EscrowError> {
        let transfer = st.transfer(id).ok_or_else(|| EscrowError::NoPendingTransfer {
            payer: caller.clone(),
        })?;
        transfer.ensure_pending()?;
        let payer = transfer.payer.clone();
        let batch_id = transfer.batch_id;
        let amount = transfer.amount;

        let (recipient, fee) = match path {
            SettlementPath::Cancel => (payer.clone(), Amount::ZERO),
            SettlementPath::Confirm | SettlementPath::ConfirmFrog => {
                (transfer.beneficiary.clone(), amount.basis_points(self.fee_bps)?)
            }
        };
        let paid = amount.checked_sub(fee)?;
        let profit = st.accumulated_profit.checked_add(fee)?;

        if !paid.is_zero() {
            self.adapter
                .push(&recipient, paid)
                .map_err(|source| EscrowError::PayoutFailed {
                    transfer_id: id,
                    recipient: recipient.clone(),
                    amount: paid,
                    settled_before,
                    source,
                })?;
        }
        st.accumulated_profit = profit;

        let settlement = Settlement {
            path,
            settled_by: caller.clone(),
            recipient: recipient.clone(),
            paid,
            fee,
            settled_at: Timestamp::now(),
        };
        if let Some(t) = st.transfer_mut(id) {
            t.settle(settlement)?;
        }
        st.open_by_payer.remove(&payer);
        if st.batch_settled(&batch_id) == Some(true) {
            st.batches.retire(&batch_id);
        }

        let entry_type = match path {
            SettlementPath::Confirm => AuditEntryType::Confirmed,
            SettlementPath::ConfirmFrog => AuditEntryType::ConfirmedByArbitrator,
            SettlementPath::Cancel => AuditEntryType::Cancelled,
        };
        st.audit.record(
            entry_type,
            caller,
            AuditEvent {
                batch_id: Some(batch_id),
                payer: Some(payer.clone()),
                counterparty: Some(recipient.clone()),
                amount: Some(amount),
                detail: (!fee.is_zero()).then(|| format!("fee={fee}")),
            },
        );
        metrics::counter!("lqd_escrow_settlements_total", "path" => path.as_str()).increment(1);
        tracing::info!(
            transfer_id = %id,
            %batch_id,
            %payer,
            %recipient,
            %paid,
            %fee,
            settled_by = %caller,
            %path,
            "transfer settled"
        );
        Ok(())
    }

    /// Set the pause flag. Administrator only. Pausing blocks deposits only.
    pub fn set_paused(&self, by: &AccountId, value: bool) -> Result<(), EscrowError> {
        let result = self.with_registry(by, AuditEntryType::PauseChanged, |registry| {
            registry
                .set_paused(by, value)
                .map(|changed| (changed, None, format!("paused={value}")))
        });
        self.observe("set_paused", by, &result);
        result
    }

    /// Register an arbitrator. Administrator only.
    pub fn add_arbitrator(&self, by: &AccountId, who: &AccountId) -> Result<(), EscrowError> {
        let result = self.with_registry(by, AuditEntryType::RoleChanged, |registry| {
            registry
                .add_arbitrator(by, who.clone())
                .map(|changed| (changed, Some(who.clone()), "add_arbitrator".to_string()))
        });
        self.observe("add_arbitrator", by, &result);
        result
    }

    /// Remove an arbitrator. Administrator only.
    pub fn remove_arbitrator(&self, by: &AccountId, who: &AccountId) -> Result<(), EscrowError> {
        let result = self.with_registry(by, AuditEntryType::RoleChanged, |registry| {
            registry
                .remove_arbitrator(by, who)
                .map(|changed| (changed, Some(who.clone()), "remove_arbitrator".to_string()))
        });
        self.observe("remove_arbitrator", by, &result);
        result
    }

    /// Approve a beneficiary. Administrator only. The custodian cannot be
    /// approved.
    pub fn approve_beneficiary(&self, by: &AccountId, who: &AccountId) -> Result<(), EscrowError> {
        let result = self.with_registry(by, AuditEntryType::RoleChanged, |registry| {
            registry.require_administrator(by, "approve_beneficiary")?;
            if who == self.adapter.custodian() {
                return Err(EscrowError::CustodianParticipant {
                    custodian: who.clone(),
                    role: "beneficiary",
                });
            }
            registry
                .approve_beneficiary(by, who.clone())
                .map(|changed| (changed, Some(who.clone()), "approve_beneficiary".to_string()))
        });
        self.observe("approve_beneficiary", by, &result);
        result
    }

    /// Revoke a beneficiary. Transfers already admitted for it still settle
    /// to it.
    pub fn revoke_beneficiary(&self, by: &AccountId, who: &AccountId) -> Result<(), EscrowError> {
        let result = self.with_registry(by, AuditEntryType::RoleChanged, |registry| {
            registry
                .revoke_beneficiary(by, who)
                .map(|changed| (changed, Some(who.clone()), "revoke_beneficiary".to_string()))
        });
        self.observe("revoke_beneficiary", by, &result);
        result
    }

    // Runs an admin-gated registry mutation and audits it when it changed
    // something.
    fn with_registry<F>(
        &self,
        by: &AccountId,
        entry_type: AuditEntryType,
        mutate: F,
    ) -> Result<(), EscrowError>
    where
        F: FnOnce(&mut AccessRegistry) -> Result<(bool, Option<AccountId>, String), EscrowError>,
    {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let (changed, counterparty, detail) = mutate(&mut st.registry)?;
        if changed {
            tracing::info!(by = %by, %detail, counterparty = ?counterparty, "access registry updated");
            st.audit.record(
                entry_type,
                by,
                AuditEvent {
                    counterparty,
                    detail: Some(detail),
                    ..AuditEvent::default()
                },
            );
        }
        Ok(())
    }

    /// Pay all accumulated profit out of custody to `to`. Administrator
    /// only. Returns the amount withdrawn.
    ///
    /// # Errors
    ///
    /// [`EscrowError::Unauthorized`], [`EscrowError::NoProfit`] when the
    /// counter is zero, or [`EscrowError::WithdrawalFailed`], which leaves
    /// the counter unchanged.
    pub fn withdraw_profit(&self, by: &AccountId, to: &AccountId) -> Result<Amount, EscrowError> {
        let result = self.withdraw(by, to);
        self.observe("withdraw_profit", by, &result);
        result
    }

    fn withdraw(&self, by: &AccountId, to: &AccountId) -> Result<Amount, EscrowError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        st.registry.require_administrator(by, "withdraw_profit")?;
        let amount = st.accumulated_profit;
        if amount.is_zero() {
            return Err(EscrowError::NoProfit);
        }
        self.adapter
            .push(to, amount)
            .map_err(|source| EscrowError::WithdrawalFailed {
                recipient: to.clone(),
                amount,
                source,
            })?;
        st.accumulated_profit = Amount::ZERO;
        st.audit.record(
            AuditEntryType::ProfitWithdrawn,
            by,
            AuditEvent {
                counterparty: Some(to.clone()),
                amount: Some(amount),
                ..AuditEvent::default()
            },
        );
        tracing::info!(by = %by, to = %to, %amount, "profit withdrawn");
        Ok(amount)
    }

    fn observe<T>(&self, operation: &'static str, caller: &AccountId, result: &Result<T, EscrowError>) {
        let Err(err) = result else {
            return;
        };
        let kind = err.kind();
        metrics::counter!("lqd_escrow_rejections_total", "kind" => kind.as_str()).increment(1);
        if kind == ErrorKind::AssetTransferFailed {
            tracing::error!(operation, caller = %caller, %kind, error = %err, "escrow operation failed");
        } else {
            tracing::warn!(operation, caller = %caller, %kind, error = %err, "escrow operation rejected");
        }
    }

    // -- Read surface --------------------------------------------------------

    /// The administrator identity.
    pub fn administrator(&self) -> AccountId {
        self.state.lock().registry.administrator().clone()
    }

    /// The custodian account the adapter acts as.
    pub fn custodian(&self) -> &AccountId {
        self.adapter.custodian()
    }

    /// The ledger adapter.
    pub fn adapter(&self) -> &L {
        &self.adapter
    }

    /// Fee retained on confirmation, in basis points.
    pub fn fee_bps(&self) -> u16 {
        self.fee_bps
    }

    /// Whether new deposits are blocked.
    pub fn is_paused(&self) -> bool {
        self.state.lock().registry.is_paused()
    }

    /// Number of transfer records ever created.
    pub fn total_transactions(&self) -> u64 {
        self.state.lock().total_transactions
    }

    /// Fees retained and not yet withdrawn.
    pub fn accumulated_profit(&self) -> Amount {
        self.state.lock().accumulated_profit
    }

    /// Whether `identity` is a registered arbitrator.
    pub fn is_arbitrator(&self, identity: &AccountId) -> bool {
        self.state.lock().registry.is_arbitrator(identity)
    }

    /// Whether `identity` is an approved beneficiary.
    pub fn is_approved_beneficiary(&self, identity: &AccountId) -> bool {
        self.state.lock().registry.is_approved_beneficiary(identity)
    }

    /// Sum of `identity`'s pending amounts; zero if none.
    pub fn balance(&self, identity: &AccountId) -> Amount {
        let st = self.state.lock();
        st.open_by_payer
            .get(identity)
            .and_then(|id| st.transfer(*id))
            .map_or(Amount::ZERO, |t| t.amount)
    }

    /// Snapshot of one transfer.
    pub fn transfer(&self, id: TransferId) -> Option<PendingTransfer> {
        self.state.lock().transfer(id).cloned()
    }

    /// Snapshot of `payer`'s pending transfer, if any.
    pub fn open_transfer(&self, payer: &AccountId) -> Option<PendingTransfer> {
        let st = self.state.lock();
        st.open_by_payer
            .get(payer)
            .and_then(|id| st.transfer(*id))
            .cloned()
    }

    /// Snapshot of one batch.
    pub fn batch(&self, batch_id: &BatchId) -> Option<Batch> {
        self.state.lock().batches.get(batch_id).cloned()
    }

    /// Whether every member of the batch is terminal; `None` if unknown.
    pub fn is_batch_settled(&self, batch_id: &BatchId) -> Option<bool> {
        self.state.lock().batch_settled(batch_id)
    }

    /// Every transfer ever admitted, in admission order.
    pub fn history(&self) -> Vec<PendingTransfer> {
        self.state.lock().transfers.clone()
    }

    /// Snapshot of the retained audit entries.
    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.state.lock().audit.entries().to_vec()
    }

    /// Verify the retained audit chain.
    pub fn verify_audit_chain(&self) -> Result<(), ChainBreak> {
        self.state.lock().audit.verify_chain()
    }

    /// What the custodian should hold: pending amounts plus profit.
    pub fn expected_custody(&self) -> Result<Amount, EscrowError> {
        let st = self.state.lock();
        let pending = Amount::try_sum(
            st.transfers
                .iter()
                .filter(|t| t.is_pending())
                .map(|t| t.amount),
        )?;
        Ok(pending.checked_add(st.accumulated_profit)?)
    }
}

impl<L: LedgerAdapter> std::fmt::Debug for EscrowLedger<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("EscrowLedger")
            .field("custodian", self.adapter.custodian())
            .field("fee_bps", &self.fee_bps)
            .field("paused", &st.registry.is_paused())
            .field("total_transactions", &st.total_transactions)
            .field("open_transfers", &st.open_by_payer.len())
            .field("accumulated_profit", &st.accumulated_profit)
            .finish()
    }
}
