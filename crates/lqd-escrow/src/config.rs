//! Escrow deployment configuration.
//!
//! Names the administrator, the custodian account the ledger adapter is
//! bound to, the initial arbitrator and beneficiary sets, the settlement
//! fee and the audit trail capacity. Loaded from YAML or JSON, then
//! optionally overridden from the environment.

use std::path::Path;

use lqd_core::{amount::BASIS_POINTS_DENOMINATOR, AccountId};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding [`EscrowConfig::fee_bps`].
pub const ENV_FEE_BPS: &str = "LQD_FEE_BPS";
/// Environment variable overriding [`EscrowConfig::paused`].
pub const ENV_PAUSED: &str = "LQD_PAUSED";

/// Configuration for one escrow deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscrowConfig {
    /// The administrator. Fixed for the ledger's lifetime.
    pub administrator: AccountId,
    /// The account holding funds in custody.
    pub custodian: AccountId,
    /// Initial arbitrators ("frogs").
    #[serde(default)]
    pub arbitrators: Vec<AccountId>,
    /// Initial approved beneficiaries.
    #[serde(default)]
    pub approved_beneficiaries: Vec<AccountId>,
    /// Fee retained on confirmation, in basis points. Default: 0.
    #[serde(default)]
    pub fee_bps: u16,
    /// Whether the ledger starts paused. Default: false.
    #[serde(default)]
    pub paused: bool,
    /// Maximum retained audit entries. Default: 10 000.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

fn default_audit_capacity() -> usize {
    10_000
}

impl EscrowConfig {
    /// A minimal configuration with defaults for everything optional.
    pub fn new(administrator: AccountId, custodian: AccountId) -> Self {
        Self {
            administrator,
            custodian,
            arbitrators: Vec::new(),
            approved_beneficiaries: Vec::new(),
            fee_bps: 0,
            paused: false,
            audit_capacity: default_audit_capacity(),
        }
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Load from a file. `.json` files are parsed as JSON, everything else
    /// as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&raw)
        } else {
            Self::from_yaml_str(&raw)
        }
    }

    /// Apply `LQD_FEE_BPS` and `LQD_PAUSED` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(raw) = lookup(ENV_FEE_BPS) {
            self.fee_bps = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    var: ENV_FEE_BPS,
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = lookup(ENV_PAUSED) {
            self.paused = parse_flag(&raw).ok_or_else(|| ConfigError::InvalidOverride {
                var: ENV_PAUSED,
                value: raw.clone(),
            })?;
        }
        Ok(self)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the fee exceeds 10 000 bps,
    /// the audit capacity is zero, or the custodian doubles as the
    /// administrator, an arbitrator or an approved beneficiary.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_bps > BASIS_POINTS_DENOMINATOR {
            return Err(ConfigError::Invalid(format!(
                "fee_bps {} exceeds {BASIS_POINTS_DENOMINATOR}",
                self.fee_bps
            )));
        }
        if self.audit_capacity == 0 {
            return Err(ConfigError::Invalid(
                "audit_capacity must be positive".to_string(),
            ));
        }
        if self.custodian == self.administrator {
            return Err(ConfigError::Invalid(format!(
                "custodian {} may not be the administrator",
                self.custodian
            )));
        }
        if self.arbitrators.contains(&self.custodian) {
            return Err(ConfigError::Invalid(format!(
                "custodian {} may not be an arbitrator",
                self.custodian
            )));
        }
        if self.approved_beneficiaries.contains(&self.custodian) {
            return Err(ConfigError::Invalid(format!(
                "custodian {} may not be an approved beneficiary",
                self.custodian
            )));
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const YAML: &str = r#"
administrator: owner
custodian: escrow
arbitrators: [user3]
approved_beneficiaries: [user2]
"#;

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    #[test]
    fn yaml_defaults_apply() {
        let cfg = EscrowConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(cfg.administrator, acct("owner"));
        assert_eq!(cfg.arbitrators, vec![acct("user3")]);
        assert_eq!(cfg.fee_bps, 0);
        assert!(!cfg.paused);
        assert_eq!(cfg.audit_capacity, 10_000);
        cfg.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EscrowConfig::from_yaml_str("administrator: a\ncustodian: b\nfrogs: []\n");
        assert!(matches!(err, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn invalid_account_is_rejected_at_parse() {
        let err = EscrowConfig::from_json_str(r#"{"administrator": "", "custodian": "escrow"}"#);
        assert!(matches!(err, Err(ConfigError::Json(_))));
    }

    #[test]
    fn loads_json_and_yaml_files() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            json,
            r#"{{"administrator":"owner","custodian":"escrow","fee_bps":25}}"#
        )
        .unwrap();
        let cfg = EscrowConfig::from_path(json.path()).unwrap();
        assert_eq!(cfg.fee_bps, 25);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        yaml.write_all(YAML.as_bytes()).unwrap();
        let cfg = EscrowConfig::from_path(yaml.path()).unwrap();
        assert_eq!(cfg.approved_beneficiaries, vec![acct("user2")]);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EscrowConfig::from_path("/nonexistent/lqd.yaml").unwrap_err();
        assert!(format!("{err}").contains("/nonexistent/lqd.yaml"));
    }

    #[test]
    fn overrides_replace_fee_and_pause() {
        let env: HashMap<&str, &str> = [(ENV_FEE_BPS, "150"), (ENV_PAUSED, "true")].into();
        let cfg = EscrowConfig::from_yaml_str(YAML)
            .unwrap()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.fee_bps, 150);
        assert!(cfg.paused);
    }

    #[test]
    fn bad_override_is_reported() {
        let err = EscrowConfig::from_yaml_str(YAML)
            .unwrap()
            .with_overrides(|k| (k == ENV_PAUSED).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride { var: ENV_PAUSED, .. }
        ));
    }

    #[test]
    fn validate_rejects_inconsistent_roles() {
        let mut cfg = EscrowConfig::new(acct("owner"), acct("owner"));
        assert!(cfg.validate().is_err());

        cfg.custodian = acct("escrow");
        cfg.arbitrators.push(acct("escrow"));
        assert!(cfg.validate().is_err());

        cfg.arbitrators.clear();
        cfg.approved_beneficiaries.push(acct("escrow"));
        assert!(cfg.validate().is_err());

        cfg.approved_beneficiaries.clear();
        cfg.fee_bps = 10_001;
        assert!(cfg.validate().is_err());

        cfg.fee_bps = 10_000;
        cfg.audit_capacity = 0;
        assert!(cfg.validate().is_err());

        cfg.audit_capacity = 1;
        assert!(cfg.validate().is_ok());
    }
}
