use crate::cadence::Cadence;
use crate::scheduler::{Scheduler, TickOutcome};
use crate::settings::KeeperSettings;
use crate::strategies::JobStrategy;
use anyhow::{bail, Context, Result};
use dss_common::{AddressBook, ChainGateway, ContractRole, EthersGateway, NetworkId};
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::Address,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Keeper node
pub struct KeeperNode {
    scheduler: Arc<Scheduler>,
    address: Address,
}

impl KeeperNode {
    /// Connect to the endpoint, resolve addresses and build the scheduler.
    ///
    /// Any failure here is fatal: the keeper never starts scheduling with a
    /// bad credential, an unreachable endpoint or missing addresses.
    pub async fn new(
        rpc_url: &str,
        private_key: &str,
        artifacts_dir: &Path,
        network: NetworkId,
        settings: &KeeperSettings,
    ) -> Result<Self> {
        // Setup provider and wallet
        let provider = Provider::<Http>::try_from(rpc_url).context("invalid RPC URL")?;
        let wallet = private_key
            .parse::<LocalWallet>()
            .context("invalid private key")?;

        let chain_id = tokio::time::timeout(settings.timeouts().rpc, provider.get_chainid())
            .await
            .context("timed out connecting to RPC endpoint")?
            .context("RPC endpoint unreachable")?
            .as_u64();
        info!(chain_id, "Connected to network");

        let wallet = wallet.with_chain_id(chain_id);
        let address = wallet.address();
        let client = Arc::new(SignerMiddleware::new(provider, wallet));

        // Read deployment artifacts
        let book = AddressBook::load(artifacts_dir, chain_id)
            .with_context(|| format!("failed to load artifacts for chain {}", chain_id))?;
        for role in settings.required_roles() {
            let addr = book.require(role)?;
            info!(role = %role, address = ?addr, "Resolved contract");
        }

        let gateway = EthersGateway::new(client, &book, settings.timeouts())?;

        let sequencer = book.require(ContractRole::Sequencer)?;
        let code = gateway
            .code_at(sequencer)
            .await
            .context("failed to check sequencer deployment")?;
        if code.is_empty() {
            bail!("No contract deployed at sequencer address {:?}", sequencer);
        }
        info!("Sequencer contract is deployed");

        let strategies = JobStrategy::from_settings(settings, &book)?;
        let scheduler = Scheduler::new(Arc::new(gateway), network, settings.gas, strategies);

        Ok(Self {
            scheduler: Arc::new(scheduler),
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Main keeper loop
    pub async fn run(&self, cadence: &Cadence, shutdown: CancellationToken) {
        info!("Keeper running: {:?}", self.address);
        Arc::clone(&self.scheduler).run(cadence, shutdown).await;
    }

    /// Single tick, for one-shot runs
    pub async fn run_once(&self) -> TickOutcome {
        info!("Keeper running once: {:?}", self.address);
        self.scheduler.fire().await
    }
}
