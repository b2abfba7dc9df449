use dss_common::{ChainGateway, GatewayError, WorkableJob};
use ethers::types::Address;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("job {0:?} has no deployed code")]
    NotDeployed(Address),

    #[error("job {0:?} is not registered in the sequencer")]
    NotRegistered(Address),

    #[error("job {0:?} is not workable this tick")]
    NotWorkable(Address),

    #[error("could not validate job {address:?}: {source}")]
    Read {
        address: Address,
        #[source]
        source: GatewayError,
    },
}

impl ValidationError {
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::NotDeployed(_) => "not-deployed",
            ValidationError::NotRegistered(_) => "not-registered",
            ValidationError::NotWorkable(_) => "not-workable",
            ValidationError::Read { .. } => "read-failure",
        }
    }
}

/// A workable job that passed the deployment and registration checks.
///
/// Only [`JobValidator`] can produce one, and the executor only runs
/// sequencer jobs in this form.
#[derive(Debug, Clone)]
pub struct ValidatedJob(WorkableJob);

impl ValidatedJob {
    pub fn into_inner(self) -> WorkableJob {
        self.0
    }
}

#[derive(Clone)]
pub struct JobValidator {
    gateway: Arc<dyn ChainGateway>,
}

impl JobValidator {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }

    pub async fn validate(&self, job: WorkableJob) -> Result<ValidatedJob, ValidationError> {
        let address = job.job.address;
        if !job.can_work {
            return Err(ValidationError::NotWorkable(address));
        }

        self.check(address).await?;
        debug!(job = ?address, "Job contract verified");
        Ok(ValidatedJob(job))
    }

    /// Deployed code and sequencer registration must both hold
    pub async fn check(&self, address: Address) -> Result<(), ValidationError> {
        let code = self
            .gateway
            .code_at(address)
            .await
            .map_err(|source| ValidationError::Read { address, source })?;
        if code.is_empty() {
            return Err(ValidationError::NotDeployed(address));
        }

        let registered = self
            .gateway
            .has_job(address)
            .await
            .map_err(|source| ValidationError::Read { address, source })?;
        if !registered {
            return Err(ValidationError::NotRegistered(address));
        }

        Ok(())
    }
}
