//! # Custody Conservation Properties
//!
//! Random operation sequences over a small population. After every step
//! the custodian holds exactly the pending amounts plus retained profit,
//! escrow balances match the open transfers, and no asset is created or
//! destroyed.

use lqd_core::{AccountId, Amount};
use lqd_escrow::{EscrowConfig, EscrowLedger, TransferState};
use lqd_ledger::{CustodyAdapter, TokenLedger};
use proptest::prelude::*;

const USERS: [&str; 4] = ["u0", "u1", "u2", "u3"];

fn acct(s: &str) -> AccountId {
    AccountId::new(s).unwrap()
}

#[derive(Debug, Clone)]
enum Op {
    Deposit {
        caller: usize,
        amount: u64,
        payers: Vec<usize>,
    },
    Confirm {
        caller: usize,
    },
    ConfirmFrog {
        payer: usize,
    },
    Cancel {
        payer: usize,
    },
    Approve {
        owner: usize,
        amount: u64,
    },
    Withdraw,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..USERS.len(), 0u64..400, prop::collection::vec(0..USERS.len(), 0..4))
            .prop_map(|(caller, amount, payers)| Op::Deposit { caller, amount, payers }),
        2 => (0..USERS.len()).prop_map(|caller| Op::Confirm { caller }),
        2 => (0..USERS.len()).prop_map(|payer| Op::ConfirmFrog { payer }),
        2 => (0..USERS.len()).prop_map(|payer| Op::Cancel { payer }),
        2 => (0..USERS.len(), 0u64..1200).prop_map(|(owner, amount)| Op::Approve { owner, amount }),
        1 => Just(Op::Withdraw),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn custody_is_conserved(fee_bps in 0u16..=500, ops in prop::collection::vec(op_strategy(), 1..40)) {
        let token = TokenLedger::new();
        let escrow = acct("escrow");
        let owner = acct("owner");
        for u in USERS {
            token.mint(&acct(u), Amount::new(1000)).unwrap();
        }
        let supply = token.total_supply();
        let config = EscrowConfig {
            arbitrators: vec![acct("frog")],
            approved_beneficiaries: vec![acct("merchant")],
            fee_bps,
            ..EscrowConfig::new(owner.clone(), escrow.clone())
        };
        let ledger = EscrowLedger::new(&config, CustodyAdapter::new(token.clone(), escrow.clone())).unwrap();

        for op in ops {
            let before = ledger.total_transactions();
            match op {
                Op::Deposit { caller, amount, payers } => {
                    let payers: Vec<AccountId> = payers.iter().map(|i| acct(USERS[*i])).collect();
                    let ok = ledger
                        .deposit(&acct(USERS[caller]), Amount::new(amount), &acct("merchant"), &payers)
                        .is_ok();
                    let expected = if ok { before + payers.len() as u64 } else { before };
                    prop_assert_eq!(ledger.total_transactions(), expected);
                }
                Op::Confirm { caller } => { let _ = ledger.confirm(&acct(USERS[caller])); }
                Op::ConfirmFrog { payer } => { let _ = ledger.confirm_frog(&acct("frog"), &acct(USERS[payer])); }
                Op::Cancel { payer } => { let _ = ledger.cancel(&acct("frog"), &acct(USERS[payer])); }
                Op::Approve { owner: o, amount } => token.approve(&acct(USERS[o]), &escrow, Amount::new(amount)),
                Op::Withdraw => { let _ = ledger.withdraw_profit(&owner, &owner); }
            }

            prop_assert_eq!(token.balance_of(&escrow), ledger.expected_custody().unwrap());
            prop_assert_eq!(token.total_supply(), supply);
            for u in USERS {
                let pending: u64 = ledger
                    .history()
                    .iter()
                    .filter(|t| t.payer == acct(u) && t.state == TransferState::Pending)
                    .map(|t| t.amount.units())
                    .sum();
                prop_assert_eq!(ledger.balance(&acct(u)).units(), pending);
                prop_assert!(pending == 0 || ledger.open_transfer(&acct(u)).is_some());
            }
        }
        prop_assert!(ledger.history().iter().all(|t| !t.amount.is_zero()));
        prop_assert!(ledger.verify_audit_chain().is_ok());
    }
}
