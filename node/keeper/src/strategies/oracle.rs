use super::{Decision, StrategyError};
use dss_common::{Action, ChainGateway, Ilk, JobKind, NetworkId};
use ethers::abi::{decode, ParamType, Token};
use ethers::types::{Address, Bytes};
use tracing::info;

/// Price updates through the oracle job's own `workable` check
#[derive(Debug, Clone, Copy)]
pub struct OracleStrategy {
    job: Address,
}

/// Decoded `workable` payload: `(bytes32[] ilksToUpdate, bytes32[] spotterIlksToUpdate)`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OracleUpdate {
    pub ilks: Vec<Ilk>,
    pub spotter_ilks: Vec<Ilk>,
}

impl OracleUpdate {
    pub fn decode(payload: &[u8]) -> Result<Self, StrategyError> {
        let element = || ParamType::Array(Box::new(ParamType::FixedBytes(32)));
        let tokens = decode(&[element(), element()], payload)
            .map_err(|e| decode_error(e.to_string()))?;

        let mut lists = tokens.into_iter().map(ilks_from_token);
        let ilks = lists.next().unwrap_or_else(|| Ok(Vec::new()))?;
        let spotter_ilks = lists.next().unwrap_or_else(|| Ok(Vec::new()))?;

        Ok(Self { ilks, spotter_ilks })
    }

    pub fn is_empty(&self) -> bool {
        self.ilks.is_empty() && self.spotter_ilks.is_empty()
    }
}

fn decode_error(message: String) -> StrategyError {
    StrategyError::Decode {
        kind: JobKind::Oracle,
        message,
    }
}

fn ilks_from_token(token: Token) -> Result<Vec<Ilk>, StrategyError> {
    let Token::Array(items) = token else {
        return Err(decode_error(format!("expected bytes32[], got {:?}", token)));
    };

    items
        .into_iter()
        .map(|item| match item {
            Token::FixedBytes(bytes) if bytes.len() == 32 => {
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&bytes);
                Ok(Ilk::from_bytes(raw))
            }
            other => Err(decode_error(format!("expected bytes32, got {:?}", other))),
        })
        .collect()
}

/// Best-effort human reading of a not-workable payload
fn describe_reason(payload: &Bytes) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.trim_matches('\0').is_empty() => text.trim_matches('\0').to_string(),
        _ => format!("0x{}", hex::encode(payload)),
    }
}

impl OracleStrategy {
    pub fn new(job: Address) -> Self {
        Self { job }
    }

    pub async fn decide(
        &self,
        gateway: &dyn ChainGateway,
        network: NetworkId,
    ) -> Result<Decision, StrategyError> {
        let (can_work, payload) = gateway
            .workable(self.job, network)
            .await
            .map_err(|source| StrategyError::Read {
                kind: JobKind::Oracle,
                source,
            })?;

        if !can_work {
            info!(reason = %describe_reason(&payload), "Oracle job not workable");
            return Ok(Decision::NoOp);
        }

        let update = OracleUpdate::decode(&payload)?;
        if update.is_empty() {
            info!("Oracle job workable but nothing to update");
            return Ok(Decision::NoOp);
        }

        info!(
            ilks = ?update.ilks.iter().map(ToString::to_string).collect::<Vec<_>>(),
            spotter_ilks = ?update.spotter_ilks.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Oracle update pending"
        );

        Ok(Decision::Chain(vec![Action::Work {
            job: self.job,
            network,
            args: payload,
        }]))
    }
}

/// ABI-encode an oracle payload, as the oracle job's `workable` would
pub fn encode_update(update: &OracleUpdate) -> Bytes {
    let list = |ilks: &[Ilk]| {
        Token::Array(
            ilks.iter()
                .map(|ilk| Token::FixedBytes(ilk.to_bytes().to_vec()))
                .collect(),
        )
    };
    ethers::abi::encode(&[list(&update.ilks), list(&update.spotter_ilks)]).into()
}
