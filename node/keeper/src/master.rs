use dss_common::{ChainGateway, GatewayError, NetworkId};
use std::sync::Arc;
use tracing::debug;

/// Reads leadership for this keeper's network. Never caches: every call is
/// a fresh `isMaster` read.
#[derive(Clone)]
pub struct MasterResolver {
    gateway: Arc<dyn ChainGateway>,
    network: NetworkId,
}

impl MasterResolver {
    pub fn new(gateway: Arc<dyn ChainGateway>, network: NetworkId) -> Self {
        Self { gateway, network }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub async fn is_master(&self) -> Result<bool, GatewayError> {
        let status = self.gateway.is_master(self.network).await?;
        debug!(network = %self.network, is_master = status, "Master status");
        Ok(status)
    }
}
