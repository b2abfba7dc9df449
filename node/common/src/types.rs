use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::{format_bytes32_string, parse_bytes32_string};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A short text label packed into a bytes32 slot
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label is empty")]
    Empty,
    #[error("label `{0}` does not fit in 31 bytes")]
    TooLong(String),
}

fn encode_label(label: &str) -> Result<[u8; 32], LabelError> {
    if label.is_empty() {
        return Err(LabelError::Empty);
    }
    // Leave room for the terminating zero byte.
    if label.len() > 31 {
        return Err(LabelError::TooLong(label.to_string()));
    }
    format_bytes32_string(label).map_err(|_| LabelError::TooLong(label.to_string()))
}

fn display_label(bytes: &[u8; 32], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match parse_bytes32_string(bytes) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control()) => f.write_str(text),
        _ => write!(f, "0x{}", hex::encode(bytes)),
    }
}

/// Network partition tag scoping leadership and job visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId([u8; 32]);

impl NetworkId {
    pub fn from_label(label: &str) -> Result<Self, LabelError> {
        encode_label(label).map(Self)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_label(&self.0, f)
    }
}

/// Collateral type tag (`ETH`, `USDT-A`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ilk([u8; 32]);

impl Ilk {
    pub fn from_label(label: &str) -> Result<Self, LabelError> {
        encode_label(label).map(Self)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl fmt::Display for Ilk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        display_label(&self.0, f)
    }
}

/// Job kinds the keeper knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Generic job discovered through the sequencer
    Sequencer,
    Oracle,
    Drip,
    Flap,
    Psm,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::Sequencer => "sequencer",
            JobKind::Oracle => "oracle",
            JobKind::Drip => "drip",
            JobKind::Flap => "flap",
            JobKind::Psm => "psm",
        };
        f.write_str(name)
    }
}

/// Job identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobDescriptor {
    pub address: Address,
    pub kind: JobKind,
}

/// One entry of the sequencer's `getNextJobs` snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkableJob {
    pub job: JobDescriptor,
    pub can_work: bool,
    pub args: Bytes,
}

impl WorkableJob {
    pub fn sequencer(address: Address, can_work: bool, args: Bytes) -> Self {
        Self {
            job: JobDescriptor {
                address,
                kind: JobKind::Sequencer,
            },
            can_work,
            args,
        }
    }
}

/// A state-changing call the keeper can broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// `work(network, args)` on a job contract
    Work {
        job: Address,
        network: NetworkId,
        args: Bytes,
    },
    /// `Jug.drip(ilk)`
    Drip { ilk: Ilk },
    /// `Vow.heal(rad)`
    Heal { rad: U256 },
    /// `Vow.flap()`
    Flap,
    /// `LitePsm.fill()`
    Fill,
    /// `LitePsm.chug()`
    Chug,
    /// `LitePsm.trim()`
    Trim,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Work { .. } => "work",
            Action::Drip { .. } => "drip",
            Action::Heal { .. } => "heal",
            Action::Flap => "flap",
            Action::Fill => "fill",
            Action::Chug => "chug",
            Action::Trim => "trim",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Work { job, network, args } => {
                write!(f, "work({:?}, {}, 0x{})", job, network, hex::encode(args))
            }
            Action::Drip { ilk } => write!(f, "drip({})", ilk),
            Action::Heal { rad } => write!(f, "heal({})", rad),
            other => write!(f, "{}()", other.name()),
        }
    }
}

/// Confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: H256,
    pub block_number: u64,
    pub gas_used: U256,
}

/// Vow/Vat debt accounting read in one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebtSnapshot {
    /// `Vow.Sin()`: queued bad debt
    pub sin: U256,
    /// `Vow.Ash()`: bad debt on auction
    pub ash: U256,
    /// `Vat.sin(vow)`: unbacked debt held by the vow
    pub surplus: U256,
}

/// LitePsm balance pressures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PsmSnapshot {
    pub rush: U256,
    pub cut: U256,
    pub gush: U256,
}
