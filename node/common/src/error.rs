use crate::addresses::ContractRole;
use ethers::contract::ContractError;
use ethers::providers::Middleware;
use ethers::types::{H256, U256};
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the chain endpoint
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transaction {tx_hash:?} reverted in block {block_number} after using {gas_used} gas")]
    ReceiptReverted {
        tx_hash: H256,
        block_number: u64,
        gas_used: U256,
    },

    #[error("transaction {0:?} dropped before confirmation")]
    Dropped(H256),

    #[error("nonce conflict: {0}")]
    Nonce(String),

    #[error("no address configured for {0}")]
    Unconfigured(ContractRole),

    #[error("failed to decode contract response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Network-level faults that may clear up by the next tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Transport(_)
                | GatewayError::Timeout(_)
                | GatewayError::Dropped(_)
                | GatewayError::Nonce(_)
        )
    }

    pub fn from_contract<M: Middleware>(err: ContractError<M>) -> Self {
        if let Some(reason) = err.decode_revert::<String>() {
            return GatewayError::Reverted(reason);
        }
        if let Some(data) = err.as_revert() {
            return GatewayError::Reverted(format!("0x{}", hex::encode(data)));
        }
        match err {
            ContractError::DecodingError(e) => GatewayError::Decode(e.to_string()),
            ContractError::AbiError(e) => GatewayError::Decode(e.to_string()),
            other => classify_message(other.to_string()),
        }
    }

    pub fn from_middleware<E: std::error::Error>(err: E) -> Self {
        classify_message(err.to_string())
    }
}

fn classify_message(message: String) -> GatewayError {
    let lower = message.to_lowercase();
    if lower.contains("nonce") {
        GatewayError::Nonce(message)
    } else if lower.contains("revert") {
        GatewayError::Reverted(message)
    } else {
        GatewayError::Transport(message)
    }
}
