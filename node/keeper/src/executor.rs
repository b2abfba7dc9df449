use crate::master::MasterResolver;
use crate::settings::GasLimits;
use crate::validator::ValidatedJob;
use chrono::Utc;
use dss_common::{Action, ChainGateway, GatewayError, JobKind, NetworkId, TxOutcome};
use ethers::types::U256;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// One bounded-gas submission
#[derive(Debug, Clone)]
pub struct ExecutionAttempt {
    pub kind: JobKind,
    pub action: Action,
    pub gas_limit: U256,
}

/// Why a submission failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Reverted,
    /// Reverted after burning the whole gas limit
    OutOfGas,
    Nonce,
    Timeout,
    Dropped,
    Transport,
    Other,
}

impl SubmissionKind {
    pub fn classify(err: &GatewayError, gas_limit: U256) -> Self {
        match err {
            GatewayError::ReceiptReverted { gas_used, .. } if *gas_used >= gas_limit => {
                SubmissionKind::OutOfGas
            }
            GatewayError::Reverted(_) | GatewayError::ReceiptReverted { .. } => {
                SubmissionKind::Reverted
            }
            GatewayError::Nonce(_) => SubmissionKind::Nonce,
            GatewayError::Timeout(_) => SubmissionKind::Timeout,
            GatewayError::Dropped(_) => SubmissionKind::Dropped,
            GatewayError::Transport(_) => SubmissionKind::Transport,
            GatewayError::Unconfigured(_) | GatewayError::Decode(_) => SubmissionKind::Other,
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionKind::Reverted => "reverted",
            SubmissionKind::OutOfGas => "out-of-gas",
            SubmissionKind::Nonce => "nonce",
            SubmissionKind::Timeout => "timeout",
            SubmissionKind::Dropped => "dropped",
            SubmissionKind::Transport => "transport",
            SubmissionKind::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("master check before submission failed: {0}")]
    MasterCheck(#[source] GatewayError),

    #[error("network {network} is no longer master")]
    LeadershipLost { network: NetworkId },

    #[error("{action} failed ({kind}): {source}")]
    Submission {
        kind: SubmissionKind,
        action: String,
        #[source]
        source: GatewayError,
    },
}

/// Sole owner of transaction submission.
///
/// Submissions are serialized behind one lock because they share the
/// signer's nonce sequence. Leadership is re-read under that lock right
/// before every broadcast.
pub struct JobExecutor {
    gateway: Arc<dyn ChainGateway>,
    master: MasterResolver,
    gas: GasLimits,
    submission: Mutex<()>,
}

impl JobExecutor {
    pub fn new(gateway: Arc<dyn ChainGateway>, master: MasterResolver, gas: GasLimits) -> Self {
        Self {
            gateway,
            master,
            gas,
            submission: Mutex::new(()),
        }
    }

    pub fn network(&self) -> NetworkId {
        self.master.network()
    }

    pub fn attempt(&self, kind: JobKind, action: Action) -> ExecutionAttempt {
        ExecutionAttempt {
            kind,
            action,
            gas_limit: self.gas.for_kind(kind),
        }
    }

    /// Run `work(network, args)` for a sequencer job that passed validation
    pub async fn execute_job(&self, job: ValidatedJob) -> Result<TxOutcome, ExecutionFailure> {
        let job = job.into_inner();
        let action = Action::Work {
            job: job.job.address,
            network: self.network(),
            args: job.args,
        };
        self.execute(self.attempt(job.job.kind, action)).await
    }

    pub async fn execute(&self, attempt: ExecutionAttempt) -> Result<TxOutcome, ExecutionFailure> {
        let _nonce = self.submission.lock().await;

        match self.master.is_master().await {
            Ok(true) => {}
            Ok(false) => {
                let network = self.network();
                warn!(network = %network, action = %attempt.action, "Leadership lost before submission");
                return Err(ExecutionFailure::LeadershipLost { network });
            }
            Err(e) => {
                warn!(action = %attempt.action, "Master check before submission failed: {}", e);
                return Err(ExecutionFailure::MasterCheck(e));
            }
        }

        let submitted_at = Utc::now().to_rfc3339();
        info!(
            kind = %attempt.kind,
            action = %attempt.action,
            gas_limit = %attempt.gas_limit,
            submitted_at = %submitted_at,
            "Submitting transaction"
        );

        match self.gateway.submit(&attempt.action, attempt.gas_limit).await {
            Ok(outcome) => {
                info!(
                    kind = %attempt.kind,
                    action = %attempt.action,
                    submitted_at = %submitted_at,
                    tx = ?outcome.tx_hash,
                    block = outcome.block_number,
                    gas_used = %outcome.gas_used,
                    "Job executed successfully"
                );
                Ok(outcome)
            }
            Err(source) => {
                let kind = SubmissionKind::classify(&source, attempt.gas_limit);
                if kind == SubmissionKind::OutOfGas {
                    error!(
                        kind = %attempt.kind,
                        action = %attempt.action,
                        submitted_at = %submitted_at,
                        gas_ceiling = %attempt.gas_limit,
                        "Job ran out of gas: {}",
                        source
                    );
                } else {
                    error!(
                        kind = %attempt.kind,
                        action = %attempt.action,
                        submitted_at = %submitted_at,
                        failure = %kind,
                        "Error executing job: {}",
                        source
                    );
                }
                Err(ExecutionFailure::Submission {
                    kind,
                    action: attempt.action.to_string(),
                    source,
                })
            }
        }
    }
}
