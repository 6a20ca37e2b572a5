//! # Compensating Admission Tests
//!
//! Runs the escrow over an adapter that only has single movements, so
//! multi-payer admission goes through the provided compensating
//! `LedgerAdapter::pull_batch`.

use std::sync::atomic::{AtomicBool, Ordering};

use lqd_core::{AccountId, Amount};
use lqd_escrow::{EscrowConfig, EscrowError, EscrowLedger, ErrorKind};
use lqd_ledger::{CustodyAdapter, LedgerAdapter, TokenLedger, TransferError};

fn acct(s: &str) -> AccountId {
    AccountId::new(s).unwrap()
}

/// Forwards single movements to a custody adapter. Refunds can be switched
/// off to simulate a ledger outage mid-rollback.
struct NonTransactional {
    inner: CustodyAdapter,
    refunds_down: AtomicBool,
}

impl LedgerAdapter for NonTransactional {
    fn custodian(&self) -> &AccountId {
        self.inner.custodian()
    }

    fn pull(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.inner.pull(from, to, amount)
    }

    fn push(&self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        if self.refunds_down.load(Ordering::SeqCst) {
            return Err(TransferError::Unavailable("ledger offline".to_string()));
        }
        self.inner.push(to, amount)
    }

    fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> Amount {
        self.inner.allowance_of(owner, spender)
    }

    fn balance_of(&self, account: &AccountId) -> Amount {
        self.inner.balance_of(account)
    }
}

fn setup() -> (EscrowLedger<NonTransactional>, TokenLedger) {
    let token = TokenLedger::new();
    let escrow = acct("escrow");
    for u in ["user1", "user4", "user5"] {
        token.mint(&acct(u), Amount::new(1000)).unwrap();
    }
    token.approve(&acct("user1"), &escrow, Amount::new(500));
    token.approve(&acct("user4"), &escrow, Amount::new(500));
    let config = EscrowConfig {
        arbitrators: vec![acct("user3")],
        approved_beneficiaries: vec![acct("user2")],
        ..EscrowConfig::new(acct("owner"), escrow.clone())
    };
    let adapter = NonTransactional {
        inner: CustodyAdapter::new(token.clone(), escrow),
        refunds_down: AtomicBool::new(false),
    };
    (EscrowLedger::new(&config, adapter).unwrap(), token)
}

#[test]
fn failed_pull_refunds_earlier_payers() {
    let (ledger, token) = setup();
    let payers = [acct("user1"), acct("user4"), acct("user5")];
    let err = ledger
        .deposit(&acct("user1"), Amount::new(500), &acct("user2"), &payers)
        .unwrap_err();
    assert!(matches!(err, EscrowError::AssetTransferFailed { ref payer, .. } if payer == &acct("user5")));
    for p in &payers {
        assert_eq!(token.balance_of(p), Amount::new(1000));
        assert_eq!(ledger.balance(p), Amount::ZERO);
    }
    assert_eq!(token.balance_of(&acct("escrow")), Amount::ZERO);
    assert_eq!(ledger.total_transactions(), 0);
    // Compensating refunds restore balances but not the spent allowances.
    assert_eq!(
        token.allowance(&acct("user1"), &acct("escrow")),
        Amount::ZERO
    );
}

#[test]
fn failed_refund_is_reported_as_incomplete_rollback() {
    let (ledger, token) = setup();
    ledger.adapter().refunds_down.store(true, Ordering::SeqCst);
    let payers = [acct("user1"), acct("user4"), acct("user5")];
    let err = ledger
        .deposit(&acct("user1"), Amount::new(500), &acct("user2"), &payers)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AssetTransferFailed);
    match err {
        EscrowError::RollbackIncomplete {
            payer, unrefunded, ..
        } => {
            assert_eq!(payer, acct("user5"));
            assert_eq!(unrefunded, vec![acct("user1"), acct("user4")]);
        }
        other => panic!("expected RollbackIncomplete, got {other:?}"),
    }
    // Nothing was recorded even though funds are stuck in custody.
    assert_eq!(ledger.total_transactions(), 0);
    assert_eq!(ledger.balance(&acct("user1")), Amount::ZERO);
    assert_eq!(token.balance_of(&acct("escrow")), Amount::new(1000));
}
