//! # Audit Export Tests
//!
//! Exports a ledger's audit trail as JSON, reloads it from disk and checks
//! the chain still verifies. Also drives a full CLI scenario across the
//! crate boundary.

use lqd_cli::scenario::Scenario;
use lqd_core::{AccountId, Amount};
use lqd_escrow::audit::verify_entries;
use lqd_escrow::{AuditEntry, ChainBreak, EscrowConfig, EscrowLedger};
use lqd_ledger::{CustodyAdapter, TokenLedger};
use tempfile::TempDir;

fn acct(s: &str) -> AccountId {
    AccountId::new(s).unwrap()
}

fn config() -> EscrowConfig {
    EscrowConfig {
        arbitrators: vec![acct("user3")],
        approved_beneficiaries: vec![acct("user2")],
        ..EscrowConfig::new(acct("owner"), acct("escrow"))
    }
}

fn settled_ledger() -> EscrowLedger<CustodyAdapter> {
    let token = TokenLedger::new();
    for u in ["user1", "user4"] {
        token.mint(&acct(u), Amount::new(1000)).unwrap();
        token.approve(&acct(u), &acct("escrow"), Amount::new(500));
    }
    let adapter = CustodyAdapter::new(token, acct("escrow"));
    let ledger = EscrowLedger::new(&config(), adapter).unwrap();
    ledger
        .deposit(
            &acct("user1"),
            Amount::new(500),
            &acct("user2"),
            &[acct("user1"), acct("user4")],
        )
        .unwrap();
    ledger.cancel(&acct("user3"), &acct("user4")).unwrap();
    ledger.confirm(&acct("user1")).unwrap();
    ledger
}

fn export(ledger: &EscrowLedger<CustodyAdapter>, dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("audit.json");
    let body = serde_json::to_string_pretty(&ledger.audit_trail()).unwrap();
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn exported_trail_verifies_after_reload() {
    let ledger = settled_ledger();
    let dir = TempDir::new().unwrap();
    let path = export(&ledger, &dir);

    let reloaded: Vec<AuditEntry> =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reloaded, ledger.audit_trail());
    // Two deposits, one cancel, one confirm.
    assert_eq!(reloaded.len(), 4);
    assert_eq!(verify_entries(&reloaded), Ok(()));
}

#[test]
fn tampered_amount_is_detected_after_reload() {
    let ledger = settled_ledger();
    let dir = TempDir::new().unwrap();
    let path = export(&ledger, &dir);

    let mut raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    raw[0]["amount"] = serde_json::json!(1);
    let tampered: Vec<AuditEntry> = serde_json::from_value(raw).unwrap();
    assert_eq!(
        verify_entries(&tampered),
        Err(ChainBreak::DigestMismatch { sequence: 0 })
    );
}

#[test]
fn dropped_entry_breaks_the_link() {
    let ledger = settled_ledger();
    let mut entries = ledger.audit_trail();
    entries.remove(1);
    assert_eq!(
        verify_entries(&entries),
        Err(ChainBreak::BrokenLink { sequence: 2 })
    );
}

#[test]
fn cli_scenario_runs_against_escrow_crate() {
    let scenario = Scenario::from_yaml_str(
        r#"
mint: { user1: 1000, user4: 1000 }
approvals:
  - { owner: user1, amount: 500 }
  - { owner: user4, amount: 500 }
steps:
  - { op: deposit, caller: user1, amount: 500, beneficiary: user2, payers: [user1, user4] }
  - { op: cancel, caller: user3, payer: user4 }
  - { op: confirm, caller: user1 }
"#,
    )
    .unwrap();
    let report = scenario.run(&config()).unwrap();
    assert!(report.passed());
    assert_eq!(report.balances[&acct("user2")], Amount::new(500));
    assert_eq!(report.balances[&acct("user4")], Amount::new(1000));
    assert_eq!(report.custody_held, report.custody_expected);
    assert!(report.audit_chain_valid);
}
