//! Keeper settings
//!
//! Tunables that are not connection details: gas ceilings per job kind,
//! drip collateral tags, PSM thresholds, enabled strategies and RPC timeouts.
//! Loaded from an optional JSON file; every field has a default.

use dss_common::{ContractRole, GatewayTimeouts, Ilk, JobKind, LabelError};
use ethers::types::U256;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gas ceiling for {0} jobs must be greater than 0")]
    ZeroGas(JobKind),

    #[error("{0} timeout must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("invalid collateral tag: {0}")]
    Ilk(#[from] LabelError),

    #[error("{0} is not a strategy-driven job kind")]
    NotAStrategy(JobKind),

    #[error("invalid cron expression `{expr}`: {message}")]
    Schedule { expr: String, message: String },

    #[error("tick interval must be greater than 0")]
    ZeroInterval,
}

/// Gas ceiling per job kind. Never escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GasLimits {
    pub sequencer: u64,
    pub oracle: u64,
    pub drip: u64,
    pub flap: u64,
    pub psm: u64,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            sequencer: 1_000_000,
            oracle: 500_000,
            drip: 300_000,
            flap: 500_000,
            psm: 500_000,
        }
    }
}

impl GasLimits {
    pub fn for_kind(&self, kind: JobKind) -> U256 {
        let gas = match kind {
            JobKind::Sequencer => self.sequencer,
            JobKind::Oracle => self.oracle,
            JobKind::Drip => self.drip,
            JobKind::Flap => self.flap,
            JobKind::Psm => self.psm,
        };
        U256::from(gas)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DripSettings {
    pub ilks: Vec<String>,
}

impl Default for DripSettings {
    fn default() -> Self {
        Self {
            ilks: vec!["ETH".to_string(), "USDT-A".to_string()],
        }
    }
}

/// A balance at or above its threshold trips the matching action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PsmThresholds {
    #[serde(deserialize_with = "deserialize_amount")]
    pub rush: U256,
    #[serde(deserialize_with = "deserialize_amount")]
    pub cut: U256,
    #[serde(deserialize_with = "deserialize_amount")]
    pub gush: U256,
}

impl Default for PsmThresholds {
    fn default() -> Self {
        Self {
            rush: U256::one(),
            cut: U256::one(),
            gush: U256::one(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeeperSettings {
    pub gas: GasLimits,
    pub drip: DripSettings,
    pub psm: PsmThresholds,
    /// Strategy-driven job kinds to run each tick
    pub strategies: Vec<JobKind>,
    pub rpc_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
}

impl Default for KeeperSettings {
    fn default() -> Self {
        Self {
            gas: GasLimits::default(),
            drip: DripSettings::default(),
            psm: PsmThresholds::default(),
            strategies: vec![JobKind::Oracle, JobKind::Drip, JobKind::Flap, JobKind::Psm],
            rpc_timeout_secs: 30,
            confirmation_timeout_secs: 180,
        }
    }
}

impl KeeperSettings {
    /// Read settings from a JSON file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for kind in [
            JobKind::Sequencer,
            JobKind::Oracle,
            JobKind::Drip,
            JobKind::Flap,
            JobKind::Psm,
        ] {
            if self.gas.for_kind(kind).is_zero() {
                return Err(SettingsError::ZeroGas(kind));
            }
        }

        if self.rpc_timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout("rpc"));
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(SettingsError::ZeroTimeout("confirmation"));
        }

        if let Some(kind) = self.strategies.iter().find(|k| **k == JobKind::Sequencer) {
            return Err(SettingsError::NotAStrategy(*kind));
        }

        self.drip_ilks()?;
        Ok(())
    }

    pub fn drip_ilks(&self) -> Result<Vec<Ilk>, SettingsError> {
        self.drip
            .ilks
            .iter()
            .map(|label| Ilk::from_label(label).map_err(SettingsError::from))
            .collect()
    }

    /// Address-book roles that must resolve before scheduling starts
    pub fn required_roles(&self) -> Vec<ContractRole> {
        let mut roles = vec![ContractRole::Sequencer];
        for kind in &self.strategies {
            match kind {
                JobKind::Oracle => roles.push(ContractRole::OracleJob),
                JobKind::Drip => roles.push(ContractRole::Jug),
                JobKind::Flap => {
                    roles.push(ContractRole::Vow);
                    roles.push(ContractRole::Vat);
                }
                JobKind::Psm => roles.push(ContractRole::LitePsm),
                JobKind::Sequencer => {}
            }
        }
        roles.sort();
        roles.dedup();
        roles
    }

    pub fn timeouts(&self) -> GatewayTimeouts {
        GatewayTimeouts {
            rpc: Duration::from_secs(self.rpc_timeout_secs),
            confirmation: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }
}

/// Accept decimal strings, 0x-hex strings or plain JSON integers
fn deserialize_amount<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(U256::from(n)),
        Raw::Text(text) => parse_amount(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_amount(text: &str) -> Result<U256, String> {
    let text = text.trim().replace('_', "");
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(&text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| format!("invalid amount `{}`: {}", text, e))
}
