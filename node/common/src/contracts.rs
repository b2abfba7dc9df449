use crate::addresses::{AddressBook, AddressBookError, ContractRole};
use crate::error::GatewayError;
use crate::types::{Action, DebtSnapshot, NetworkId, PsmSnapshot, TxOutcome, WorkableJob};
use async_trait::async_trait;
use ethers::{
    abi::Detokenize,
    contract::{abigen, ContractCall},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, U256},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// Generate contract bindings
// getNextJobs returns a tuple array, which the human-readable parser
// collapses into a single tuple, so this one is declared as JSON.
abigen!(
    Sequencer,
    r#"[
        {
            "type": "function",
            "name": "getNextJobs",
            "stateMutability": "view",
            "inputs": [{ "name": "network", "type": "bytes32" }],
            "outputs": [
                {
                    "name": "",
                    "type": "tuple[]",
                    "components": [
                        { "name": "job", "type": "address" },
                        { "name": "canWork", "type": "bool" },
                        { "name": "args", "type": "bytes" }
                    ]
                }
            ]
        },
        {
            "type": "function",
            "name": "hasJob",
            "stateMutability": "view",
            "inputs": [{ "name": "job", "type": "address" }],
            "outputs": [{ "name": "", "type": "bool" }]
        },
        {
            "type": "function",
            "name": "isMaster",
            "stateMutability": "view",
            "inputs": [{ "name": "network", "type": "bytes32" }],
            "outputs": [{ "name": "", "type": "bool" }]
        }
    ]"#
);

abigen!(
    JobContract,
    r#"[
        function workable(bytes32 network) external view returns (bool canWork, bytes args)
        function work(bytes32 network, bytes args) external
    ]"#
);

abigen!(
    Vow,
    r#"[
        function Sin() external view returns (uint256)
        function Ash() external view returns (uint256)
        function heal(uint256 rad) external
        function flap() external returns (uint256)
    ]"#
);

abigen!(
    Vat,
    r#"[
        function sin(address usr) external view returns (uint256)
    ]"#
);

abigen!(
    Jug,
    r#"[
        function drip(bytes32 ilk) external returns (uint256)
    ]"#
);

abigen!(
    LitePsm,
    r#"[
        function rush() external view returns (uint256)
        function cut() external view returns (uint256)
        function gush() external view returns (uint256)
        function fill() external returns (uint256)
        function chug() external returns (uint256)
        function trim() external returns (uint256)
    ]"#
);

pub type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Everything the keeper needs from the chain.
///
/// Reads are side-effect free. `submit` is the only method that broadcasts,
/// and it resolves once the transaction has one confirmation.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    async fn is_master(&self, network: NetworkId) -> Result<bool, GatewayError>;

    async fn next_jobs(&self, network: NetworkId) -> Result<Vec<WorkableJob>, GatewayError>;

    async fn has_job(&self, job: Address) -> Result<bool, GatewayError>;

    /// Deployed bytecode at the chain head
    async fn code_at(&self, address: Address) -> Result<Bytes, GatewayError>;

    async fn workable(
        &self,
        job: Address,
        network: NetworkId,
    ) -> Result<(bool, Bytes), GatewayError>;

    async fn debt_snapshot(&self) -> Result<DebtSnapshot, GatewayError>;

    async fn psm_snapshot(&self) -> Result<PsmSnapshot, GatewayError>;

    async fn signer_balance(&self) -> Result<U256, GatewayError>;

    async fn submit(&self, action: &Action, gas_limit: U256) -> Result<TxOutcome, GatewayError>;
}

#[derive(Debug, Clone, Copy)]
pub struct GatewayTimeouts {
    /// Bound on every read and on broadcasting
    pub rpc: Duration,
    /// Bound on waiting for the first confirmation
    pub confirmation: Duration,
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self {
            rpc: Duration::from_secs(30),
            confirmation: Duration::from_secs(180),
        }
    }
}

/// ethers-rs backed gateway
#[derive(Clone)]
pub struct EthersGateway {
    client: Arc<Client>,
    sequencer: Sequencer<Client>,
    vow: Option<Vow<Client>>,
    vat: Option<Vat<Client>>,
    jug: Option<Jug<Client>>,
    lite_psm: Option<LitePsm<Client>>,
    vow_address: Option<Address>,
    timeouts: GatewayTimeouts,
}

impl EthersGateway {
    /// Bind contracts from the address book. Only the sequencer is mandatory.
    pub fn new(
        client: Arc<Client>,
        book: &AddressBook,
        timeouts: GatewayTimeouts,
    ) -> Result<Self, AddressBookError> {
        let sequencer = Sequencer::new(book.require(ContractRole::Sequencer)?, client.clone());
        let vow_address = book.get(ContractRole::Vow);

        Ok(Self {
            sequencer,
            vow: vow_address.map(|addr| Vow::new(addr, client.clone())),
            vat: book
                .get(ContractRole::Vat)
                .map(|addr| Vat::new(addr, client.clone())),
            jug: book
                .get(ContractRole::Jug)
                .map(|addr| Jug::new(addr, client.clone())),
            lite_psm: book
                .get(ContractRole::LitePsm)
                .map(|addr| LitePsm::new(addr, client.clone())),
            vow_address,
            client,
            timeouts,
        })
    }

    pub fn address(&self) -> Address {
        self.client.signer().address()
    }

    fn require<'a, T>(contract: &'a Option<T>, role: ContractRole) -> Result<&'a T, GatewayError> {
        contract.as_ref().ok_or(GatewayError::Unconfigured(role))
    }

    async fn bounded<T, F>(&self, limit: Duration, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| GatewayError::Timeout(limit))?
    }

    async fn read<D: Detokenize>(&self, call: ContractCall<Client, D>) -> Result<D, GatewayError> {
        self.bounded(self.timeouts.rpc, async {
            call.call().await.map_err(GatewayError::from_contract)
        })
        .await
    }

    /// Broadcast and wait for one confirmation
    async fn broadcast<D: Detokenize>(
        &self,
        call: ContractCall<Client, D>,
    ) -> Result<TxOutcome, GatewayError> {
        let pending = self
            .bounded(self.timeouts.rpc, async {
                call.send().await.map_err(GatewayError::from_contract)
            })
            .await?;

        let tx_hash = *pending;
        debug!(tx = ?tx_hash, "Transaction broadcast, awaiting confirmation");

        let receipt = self
            .bounded(self.timeouts.confirmation, async {
                pending
                    .confirmations(1)
                    .await
                    .map_err(GatewayError::from_middleware)
            })
            .await?
            .ok_or(GatewayError::Dropped(tx_hash))?;

        let block_number = receipt.block_number.map(|n| n.as_u64()).unwrap_or_default();
        let gas_used = receipt.gas_used.unwrap_or_default();
        if receipt.status.map(|s| s.as_u64()) == Some(0) {
            return Err(GatewayError::ReceiptReverted {
                tx_hash,
                block_number,
                gas_used,
            });
        }

        Ok(TxOutcome {
            tx_hash: receipt.transaction_hash,
            block_number,
            gas_used,
        })
    }
}

#[async_trait]
impl ChainGateway for EthersGateway {
    async fn is_master(&self, network: NetworkId) -> Result<bool, GatewayError> {
        self.read(self.sequencer.is_master(network.to_bytes())).await
    }

    async fn next_jobs(&self, network: NetworkId) -> Result<Vec<WorkableJob>, GatewayError> {
        let jobs = self
            .read(self.sequencer.get_next_jobs(network.to_bytes()))
            .await?;

        Ok(jobs
            .into_iter()
            .map(|(job, can_work, args)| WorkableJob::sequencer(job, can_work, args))
            .collect())
    }

    async fn has_job(&self, job: Address) -> Result<bool, GatewayError> {
        self.read(self.sequencer.has_job(job)).await
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, GatewayError> {
        self.bounded(self.timeouts.rpc, async {
            self.client
                .get_code(address, None)
                .await
                .map_err(GatewayError::from_middleware)
        })
        .await
    }

    async fn workable(
        &self,
        job: Address,
        network: NetworkId,
    ) -> Result<(bool, Bytes), GatewayError> {
        let contract = JobContract::new(job, self.client.clone());
        self.read(contract.workable(network.to_bytes())).await
    }

    async fn debt_snapshot(&self) -> Result<DebtSnapshot, GatewayError> {
        let vow = Self::require(&self.vow, ContractRole::Vow)?;
        let vat = Self::require(&self.vat, ContractRole::Vat)?;
        let vow_address = self
            .vow_address
            .ok_or(GatewayError::Unconfigured(ContractRole::Vow))?;

        let (sin, ash, surplus) = tokio::try_join!(
            self.read(vow.sin()),
            self.read(vow.ash()),
            self.read(vat.sin(vow_address)),
        )?;

        Ok(DebtSnapshot { sin, ash, surplus })
    }

    async fn psm_snapshot(&self) -> Result<PsmSnapshot, GatewayError> {
        let psm = Self::require(&self.lite_psm, ContractRole::LitePsm)?;

        let (rush, cut, gush) =
            tokio::try_join!(self.read(psm.rush()), self.read(psm.cut()), self.read(psm.gush()))?;

        Ok(PsmSnapshot { rush, cut, gush })
    }

    async fn signer_balance(&self) -> Result<U256, GatewayError> {
        self.bounded(self.timeouts.rpc, async {
            self.client
                .get_balance(self.address(), None)
                .await
                .map_err(GatewayError::from_middleware)
        })
        .await
    }

    async fn submit(&self, action: &Action, gas_limit: U256) -> Result<TxOutcome, GatewayError> {
        match action {
            Action::Work { job, network, args } => {
                let contract = JobContract::new(*job, self.client.clone());
                self.broadcast(contract.work(network.to_bytes(), args.clone()).gas(gas_limit))
                    .await
            }
            Action::Drip { ilk } => {
                let jug = Self::require(&self.jug, ContractRole::Jug)?;
                self.broadcast(jug.drip(ilk.to_bytes()).gas(gas_limit)).await
            }
            Action::Heal { rad } => {
                let vow = Self::require(&self.vow, ContractRole::Vow)?;
                self.broadcast(vow.heal(*rad).gas(gas_limit)).await
            }
            Action::Flap => {
                let vow = Self::require(&self.vow, ContractRole::Vow)?;
                self.broadcast(vow.flap().gas(gas_limit)).await
            }
            Action::Fill => {
                let psm = Self::require(&self.lite_psm, ContractRole::LitePsm)?;
                self.broadcast(psm.fill().gas(gas_limit)).await
            }
            Action::Chug => {
                let psm = Self::require(&self.lite_psm, ContractRole::LitePsm)?;
                self.broadcast(psm.chug().gas(gas_limit)).await
            }
            Action::Trim => {
                let psm = Self::require(&self.lite_psm, ContractRole::LitePsm)?;
                self.broadcast(psm.trim().gas(gas_limit)).await
            }
        }
    }
}
