use super::Decision;
use dss_common::{Action, Ilk};

/// Stability-fee accrual. Dripping a tag with nothing accrued is a harmless
/// no-op on chain, so every tag is dripped every tick.
#[derive(Debug, Clone)]
pub struct DripStrategy {
    ilks: Vec<Ilk>,
}

impl DripStrategy {
    pub fn new(ilks: Vec<Ilk>) -> Self {
        Self { ilks }
    }

    pub fn decide(&self) -> Decision {
        if self.ilks.is_empty() {
            return Decision::NoOp;
        }
        Decision::Each(
            self.ilks
                .iter()
                .map(|ilk| Action::Drip { ilk: *ilk })
                .collect(),
        )
    }
}
