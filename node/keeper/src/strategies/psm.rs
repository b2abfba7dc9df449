use super::{Decision, StrategyError};
use crate::settings::PsmThresholds;
use dss_common::{Action, ChainGateway, JobKind, PsmSnapshot};
use tracing::info;

/// LitePsm rebalancing: at most one of `fill`, `chug`, `trim` per tick,
/// checked in that order.
#[derive(Debug, Clone, Copy)]
pub struct PsmStrategy {
    thresholds: PsmThresholds,
}

impl PsmStrategy {
    pub fn new(thresholds: PsmThresholds) -> Self {
        Self { thresholds }
    }

    pub async fn decide(&self, gateway: &dyn ChainGateway) -> Result<Decision, StrategyError> {
        let snapshot = gateway
            .psm_snapshot()
            .await
            .map_err(|source| StrategyError::Read {
                kind: JobKind::Psm,
                source,
            })?;

        match select(&snapshot, &self.thresholds) {
            Some(action) => {
                info!(
                    rush = %snapshot.rush,
                    cut = %snapshot.cut,
                    gush = %snapshot.gush,
                    action = %action,
                    "PSM rebalance needed"
                );
                Ok(Decision::Chain(vec![action]))
            }
            None => {
                info!("No PSM action needed");
                Ok(Decision::NoOp)
            }
        }
    }
}

pub fn select(snapshot: &PsmSnapshot, thresholds: &PsmThresholds) -> Option<Action> {
    if snapshot.rush >= thresholds.rush {
        Some(Action::Fill)
    } else if snapshot.cut >= thresholds.cut {
        Some(Action::Chug)
    } else if snapshot.gush >= thresholds.gush {
        Some(Action::Trim)
    } else {
        None
    }
}
