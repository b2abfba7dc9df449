//! Strategy-driven jobs
//!
//! Oracle, drip, flap and PSM jobs carry protocol-specific thresholds, so
//! each decides for itself what to submit instead of relying on the
//! sequencer's `canWork` flag. Decisions are handed to the
//! [`JobExecutor`](crate::executor::JobExecutor) like any other job.

pub mod drip;
pub mod flap;
pub mod oracle;
pub mod psm;

pub use drip::DripStrategy;
pub use flap::FlapStrategy;
pub use oracle::OracleStrategy;
pub use psm::PsmStrategy;

use crate::settings::{KeeperSettings, SettingsError};
use dss_common::{
    Action, AddressBook, AddressBookError, ChainGateway, ContractRole, GatewayError, JobKind,
    NetworkId,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("{kind} strategy read failed: {source}")]
    Read {
        kind: JobKind,
        #[source]
        source: GatewayError,
    },

    #[error("{kind} strategy could not decode payload: {message}")]
    Decode { kind: JobKind, message: String },
}

/// What a strategy wants done this tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoOp,
    /// Run in order; the first failure abandons the rest
    Chain(Vec<Action>),
    /// Run in order; failures do not affect the other actions
    Each(Vec<Action>),
}

impl Decision {
    pub fn actions(&self) -> &[Action] {
        match self {
            Decision::NoOp => &[],
            Decision::Chain(actions) | Decision::Each(actions) => actions,
        }
    }

    pub fn stops_on_failure(&self) -> bool {
        matches!(self, Decision::Chain(_))
    }
}

#[derive(Debug, Error)]
pub enum StrategySetupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    AddressBook(#[from] AddressBookError),
}

/// Tagged dispatch over the strategy-driven job kinds
#[derive(Debug, Clone)]
pub enum JobStrategy {
    Oracle(OracleStrategy),
    Drip(DripStrategy),
    Flap(FlapStrategy),
    Psm(PsmStrategy),
}

impl JobStrategy {
    pub fn kind(&self) -> JobKind {
        match self {
            JobStrategy::Oracle(_) => JobKind::Oracle,
            JobStrategy::Drip(_) => JobKind::Drip,
            JobStrategy::Flap(_) => JobKind::Flap,
            JobStrategy::Psm(_) => JobKind::Psm,
        }
    }

    pub async fn decide(
        &self,
        gateway: &dyn ChainGateway,
        network: NetworkId,
    ) -> Result<Decision, StrategyError> {
        match self {
            JobStrategy::Oracle(strategy) => strategy.decide(gateway, network).await,
            JobStrategy::Drip(strategy) => Ok(strategy.decide()),
            JobStrategy::Flap(strategy) => strategy.decide(gateway).await,
            JobStrategy::Psm(strategy) => strategy.decide(gateway).await,
        }
    }

    /// Build the enabled strategies, in the order the settings list them
    pub fn from_settings(
        settings: &KeeperSettings,
        book: &AddressBook,
    ) -> Result<Vec<JobStrategy>, StrategySetupError> {
        let mut strategies = Vec::new();
        for kind in &settings.strategies {
            let strategy = match kind {
                JobKind::Oracle => JobStrategy::Oracle(OracleStrategy::new(
                    book.require(ContractRole::OracleJob)?,
                )),
                JobKind::Drip => JobStrategy::Drip(DripStrategy::new(settings.drip_ilks()?)),
                JobKind::Flap => JobStrategy::Flap(FlapStrategy),
                JobKind::Psm => JobStrategy::Psm(PsmStrategy::new(settings.psm)),
                JobKind::Sequencer => return Err(SettingsError::NotAStrategy(*kind).into()),
            };
            strategies.push(strategy);
        }
        Ok(strategies)
    }
}
