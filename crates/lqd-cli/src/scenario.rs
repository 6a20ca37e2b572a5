//! # Scenarios
//!
//! A scenario is a YAML script run against a fresh [`TokenLedger`] and an
//! [`EscrowLedger`] bound to it:
//!
//! ```yaml
//! mint:
//!   user1: 1000
//!   user2: 1000
//! approvals:
//!   - { owner: user1, amount: 500 }
//! steps:
//!   - { op: deposit, caller: user1, amount: 500, beneficiary: user2, payers: [user1] }
//!   - { op: confirm_frog, caller: user2, payer: user1, expect: unauthorized }
//!   - { op: confirm, caller: user1 }
//! ```
//!
//! Approvals are granted to the config's custodian. Each step may carry an
//! `expect` of `ok` (the default) or an error kind name; a step whose outcome
//! differs is reported as unmet.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use lqd_core::{AccountId, Amount};
use lqd_escrow::{EscrowConfig, EscrowError, EscrowLedger};
use lqd_ledger::{CustodyAdapter, LedgerAdapter, TokenLedger};
use serde::{Deserialize, Serialize};

/// A token allowance granted to the custodian before the first step.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Approval {
    /// The approving account.
    pub owner: AccountId,
    /// The allowance granted.
    pub amount: Amount,
}

/// One escrow or token operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// `EscrowLedger::deposit`.
    Deposit {
        /// Initiator.
        caller: AccountId,
        /// Per-payer amount.
        amount: Amount,
        /// Beneficiary.
        beneficiary: AccountId,
        /// Payers, in order.
        payers: Vec<AccountId>,
    },
    /// `EscrowLedger::confirm`.
    Confirm {
        /// Initiator.
        caller: AccountId,
    },
    /// `EscrowLedger::confirm_frog`.
    ConfirmFrog {
        /// Arbitrator.
        caller: AccountId,
        /// Payer whose transfer is confirmed.
        payer: AccountId,
    },
    /// `EscrowLedger::cancel`.
    Cancel {
        /// Arbitrator.
        caller: AccountId,
        /// Payer whose transfer is refunded.
        payer: AccountId,
    },
    /// `EscrowLedger::set_paused`.
    SetPaused {
        /// Administrator.
        caller: AccountId,
        /// New flag value.
        paused: bool,
    },
    /// `EscrowLedger::withdraw_profit`.
    WithdrawProfit {
        /// Administrator.
        caller: AccountId,
        /// Recipient.
        to: AccountId,
    },
    /// Token-level approval to the custodian, mid-scenario.
    Approve {
        /// Approving account.
        owner: AccountId,
        /// New allowance.
        amount: Amount,
    },
}

impl Action {
    /// The `op` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Confirm { .. } => "confirm",
            Self::ConfirmFrog { .. } => "confirm_frog",
            Self::Cancel { .. } => "cancel",
            Self::SetPaused { .. } => "set_paused",
            Self::WithdrawProfit { .. } => "withdraw_profit",
            Self::Approve { .. } => "approve",
        }
    }

    fn accounts(&self) -> Vec<&AccountId> {
        match self {
            Self::Deposit {
                caller,
                beneficiary,
                payers,
                ..
            } => {
                let mut v = vec![caller, beneficiary];
                v.extend(payers.iter());
                v
            }
            Self::Confirm { caller } | Self::SetPaused { caller, .. } => vec![caller],
            Self::ConfirmFrog { caller, payer } | Self::Cancel { caller, payer } => {
                vec![caller, payer]
            }
            Self::WithdrawProfit { caller, to } => vec![caller, to],
            Self::Approve { owner, .. } => vec![owner],
        }
    }
}

/// An action plus its expected outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// The operation.
    #[serde(flatten)]
    pub action: Action,
    /// `ok` or an error kind name such as `invalid_state`.
    #[serde(default = "default_expect")]
    pub expect: String,
}

fn default_expect() -> String {
    "ok".to_string()
}

/// A parsed scenario.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Initial asset balances.
    #[serde(default)]
    pub mint: BTreeMap<AccountId, Amount>,
    /// Initial allowances to the custodian.
    #[serde(default)]
    pub approvals: Vec<Approval>,
    /// Operations, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Zero-based step index.
    pub index: usize,
    /// The `op` name.
    pub op: &'static str,
    /// `ok` or the error kind name.
    pub outcome: String,
    /// The error message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// What the scenario expected.
    pub expected: String,
    /// Whether `outcome` matched `expected`.
    pub met: bool,
}

/// Final state after a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Per-step outcomes.
    pub steps: Vec<StepOutcome>,
    /// Asset balances of every account the scenario mentions.
    pub balances: BTreeMap<AccountId, Amount>,
    /// Escrow `balance()` of every account with a pending transfer.
    pub pending: BTreeMap<AccountId, Amount>,
    /// `total_transactions` at the end.
    pub total_transactions: u64,
    /// `accumulated_profit` at the end.
    pub accumulated_profit: Amount,
    /// Pause flag at the end.
    pub paused: bool,
    /// What the custodian holds on the asset ledger.
    pub custody_held: Amount,
    /// Pending amounts plus accumulated profit.
    pub custody_expected: Amount,
    /// Number of retained audit entries.
    pub audit_entries: usize,
    /// Whether the audit chain verified.
    pub audit_chain_valid: bool,
}

impl Report {
    /// Whether every expectation was met and custody balances.
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.met) && self.custody_held == self.custody_expected
    }
}

impl Scenario {
    /// Parse a YAML scenario.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("invalid scenario")
    }

    /// Load a scenario file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read scenario {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Run the scenario against a fresh ledger built from `config`.
    pub fn run(&self, config: &EscrowConfig) -> Result<Report> {
        let token = TokenLedger::new();
        for (account, amount) in &self.mint {
            token
                .mint(account, *amount)
                .with_context(|| format!("cannot mint {amount} to {account}"))?;
        }
        for approval in &self.approvals {
            token.approve(&approval.owner, &config.custodian, approval.amount);
        }
        let adapter = CustodyAdapter::new(token.clone(), config.custodian.clone());
        let ledger = EscrowLedger::new(config, adapter).context("cannot build escrow ledger")?;

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let result = apply(&ledger, &token, &step.action);
            let (outcome, message) = match &result {
                Ok(()) => ("ok".to_string(), None),
                Err(e) => (e.kind().as_str().to_string(), Some(e.to_string())),
            };
            let met = outcome == step.expect;
            if !met {
                tracing::warn!(index, op = step.action.name(), %outcome, expected = %step.expect, "scenario expectation unmet");
            }
            steps.push(StepOutcome {
                index,
                op: step.action.name(),
                outcome,
                message,
                expected: step.expect.clone(),
                met,
            });
        }

        let mut accounts: BTreeSet<AccountId> = self.mint.keys().cloned().collect();
        accounts.extend(self.approvals.iter().map(|a| a.owner.clone()));
        accounts.extend(
            self.steps
                .iter()
                .flat_map(|s| s.action.accounts())
                .cloned(),
        );
        accounts.insert(config.administrator.clone());
        accounts.extend(config.arbitrators.iter().cloned());
        accounts.extend(config.approved_beneficiaries.iter().cloned());
        accounts.remove(&config.custodian);

        let balances = accounts
            .iter()
            .map(|a| (a.clone(), token.balance_of(a)))
            .collect();
        let pending = accounts
            .iter()
            .map(|a| (a.clone(), ledger.balance(a)))
            .filter(|(_, b)| !b.is_zero())
            .collect();

        Ok(Report {
            steps,
            balances,
            pending,
            total_transactions: ledger.total_transactions(),
            accumulated_profit: ledger.accumulated_profit(),
            paused: ledger.is_paused(),
            custody_held: ledger.adapter().balance_of(&config.custodian),
            custody_expected: ledger.expected_custody()?,
            audit_entries: ledger.audit_trail().len(),
            audit_chain_valid: ledger.verify_audit_chain().is_ok(),
        })
    }
}

fn apply(
    ledger: &EscrowLedger<CustodyAdapter>,
    token: &TokenLedger,
    action: &Action,
) -> Result<(), EscrowError> {
    match action {
        Action::Deposit {
            caller,
            amount,
            beneficiary,
            payers,
        } => ledger.deposit(caller, *amount, beneficiary, payers).map(|_| ()),
        Action::Confirm { caller } => ledger.confirm(caller).map(|_| ()),
        Action::ConfirmFrog { caller, payer } => ledger.confirm_frog(caller, payer).map(|_| ()),
        Action::Cancel { caller, payer } => ledger.cancel(caller, payer).map(|_| ()),
        Action::SetPaused { caller, paused } => ledger.set_paused(caller, *paused),
        Action::WithdrawProfit { caller, to } => ledger.withdraw_profit(caller, to).map(|_| ()),
        Action::Approve { owner, amount } => {
            token.approve(owner, ledger.custodian(), *amount);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EscrowConfig {
        EscrowConfig::from_yaml_str(
            "administrator: owner\ncustodian: escrow\narbitrators: [user3]\napproved_beneficiaries: [user2]\n",
        )
        .unwrap()
    }

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    #[test]
    fn happy_path_scenario_passes() {
        let scenario = Scenario::from_yaml_str(
            r#"
mint: { user1: 1000, user2: 1000 }
approvals: [{ owner: user1, amount: 500 }]
steps:
  - { op: deposit, caller: user1, amount: 500, beneficiary: user2, payers: [user1] }
  - { op: confirm_frog, caller: user2, payer: user1, expect: unauthorized }
  - { op: confirm, caller: user1 }
  - { op: confirm, caller: user1, expect: invalid_state }
"#,
        )
        .unwrap();
        let report = scenario.run(&config()).unwrap();
        assert!(report.passed(), "{report:?}");
        assert_eq!(report.balances[&acct("user1")], Amount::new(500));
        assert_eq!(report.balances[&acct("user2")], Amount::new(1500));
        assert!(report.pending.is_empty());
        assert_eq!(report.total_transactions, 1);
        assert!(report.audit_chain_valid);
        assert!(!report.balances.contains_key(&acct("escrow")));
    }

    #[test]
    fn unmet_expectation_fails_report() {
        let scenario = Scenario::from_yaml_str(
            r#"
mint: { user1: 1000 }
steps:
  - { op: deposit, caller: user1, amount: 500, beneficiary: user2, payers: [user1] }
"#,
        )
        .unwrap();
        let report = scenario.run(&config()).unwrap();
        assert!(!report.passed());
        assert_eq!(report.steps[0].outcome, "asset_transfer_failed");
        assert!(report.steps[0].message.is_some());
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(Scenario::from_yaml_str("steps:\n  - { op: steal, caller: a }\n").is_err());
    }
}
