use dss_common::{ChainGateway, GatewayError, NetworkId, WorkableJob};
use std::sync::Arc;
use tracing::{debug, info};

/// Lists the sequencer's pending jobs for a network
#[derive(Clone)]
pub struct JobCatalog {
    gateway: Arc<dyn ChainGateway>,
    network: NetworkId,
}

impl JobCatalog {
    pub fn new(gateway: Arc<dyn ChainGateway>, network: NetworkId) -> Self {
        Self { gateway, network }
    }

    /// Full `getNextJobs` snapshot, non-workable entries included
    pub async fn list_workable(&self) -> Result<Vec<WorkableJob>, GatewayError> {
        let jobs = self.gateway.next_jobs(self.network).await?;

        let workable = jobs.iter().filter(|job| job.can_work).count();
        info!(
            network = %self.network,
            total = jobs.len(),
            workable,
            "Fetched sequencer jobs"
        );

        for job in jobs.iter().filter(|job| !job.can_work) {
            debug!(job = ?job.job.address, "Job not workable");
        }

        Ok(jobs)
    }
}
