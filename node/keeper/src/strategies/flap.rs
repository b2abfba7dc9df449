use super::{Decision, StrategyError};
use dss_common::{Action, ChainGateway, DebtSnapshot, JobKind};
use ethers::types::U256;
use tracing::info;

/// Surplus auction keeper.
///
/// Heals unbacked vow debt not already queued (`Sin`) or on auction (`Ash`),
/// then kicks a flap auction. The heal goes first so surplus that should
/// cover bad debt is never auctioned.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlapStrategy;

impl FlapStrategy {
    pub async fn decide(&self, gateway: &dyn ChainGateway) -> Result<Decision, StrategyError> {
        let snapshot = gateway
            .debt_snapshot()
            .await
            .map_err(|source| StrategyError::Read {
                kind: JobKind::Flap,
                source,
            })?;

        let heal = to_heal(&snapshot);
        info!(
            sin = %snapshot.sin,
            ash = %snapshot.ash,
            surplus = %snapshot.surplus,
            to_heal = %heal,
            "Flap check"
        );

        Ok(plan(heal))
    }
}

/// `max(0, surplus - (sin + ash))`
pub fn to_heal(snapshot: &DebtSnapshot) -> U256 {
    let queued = snapshot.sin.saturating_add(snapshot.ash);
    snapshot.surplus.saturating_sub(queued)
}

fn plan(heal: U256) -> Decision {
    let mut actions = Vec::with_capacity(2);
    if !heal.is_zero() {
        actions.push(Action::Heal { rad: heal });
    }
    actions.push(Action::Flap);
    Decision::Chain(actions)
}
