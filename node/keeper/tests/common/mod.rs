#![allow(dead_code)]

use async_trait::async_trait;
use dss_common::{
    Action, ChainGateway, DebtSnapshot, GatewayError, NetworkId, PsmSnapshot, TxOutcome,
    WorkableJob,
};
use dss_keeper::settings::GasLimits;
use dss_keeper::strategies::JobStrategy;
use dss_keeper::Scheduler;
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn network() -> NetworkId {
    NetworkId::from_label("NTWK-MAIN").unwrap()
}

pub fn job_address(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// Scriptable in-memory chain that records every broadcast
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    master: bool,
    /// Answers consumed before falling back to `master`
    master_script: VecDeque<bool>,
    master_fails: bool,
    master_reads: usize,
    jobs: Vec<WorkableJob>,
    jobs_fail: bool,
    jobs_undecodable: bool,
    deployed: HashSet<Address>,
    registered: HashSet<Address>,
    workable: HashMap<Address, (bool, Bytes)>,
    debt: DebtSnapshot,
    debt_fails: bool,
    psm: PsmSnapshot,
    psm_fails: bool,
    submit_delay: Option<Duration>,
    failing_actions: HashSet<&'static str>,
    gas_exhausting_actions: HashSet<&'static str>,
    submissions: Vec<(Action, U256)>,
    block: u64,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_master(&self, master: bool) {
        self.with(|s| s.master = master);
    }

    pub fn script_master(&self, answers: &[bool]) {
        self.with(|s| s.master_script.extend(answers.iter().copied()));
    }

    pub fn fail_master(&self) {
        self.with(|s| s.master_fails = true);
    }

    pub fn master_reads(&self) -> usize {
        self.with(|s| s.master_reads)
    }

    /// Add a sequencer job; `valid` jobs are deployed and registered
    pub fn add_job(&self, address: Address, can_work: bool, valid: bool) {
        self.with(|s| {
            s.jobs.push(WorkableJob::sequencer(
                address,
                can_work,
                Bytes::from(vec![0xde, 0xad]),
            ));
            if valid {
                s.deployed.insert(address);
                s.registered.insert(address);
            }
        });
    }

    pub fn deploy(&self, address: Address) {
        self.with(|s| s.deployed.insert(address));
    }

    pub fn register(&self, address: Address) {
        self.with(|s| s.registered.insert(address));
    }

    pub fn fail_jobs(&self) {
        self.with(|s| s.jobs_fail = true);
    }

    pub fn set_workable(&self, job: Address, can_work: bool, payload: Bytes) {
        self.with(|s| s.workable.insert(job, (can_work, payload)));
    }

    pub fn set_debt(&self, sin: u64, ash: u64, surplus: u64) {
        self.with(|s| {
            s.debt = DebtSnapshot {
                sin: U256::from(sin),
                ash: U256::from(ash),
                surplus: U256::from(surplus),
            }
        });
    }

    pub fn fail_debt(&self) {
        self.with(|s| s.debt_fails = true);
    }

    pub fn set_psm(&self, rush: u64, cut: u64, gush: u64) {
        self.with(|s| {
            s.psm = PsmSnapshot {
                rush: U256::from(rush),
                cut: U256::from(cut),
                gush: U256::from(gush),
            }
        });
    }

    pub fn fail_psm(&self) {
        self.with(|s| s.psm_fails = true);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        self.with(|s| s.submit_delay = Some(delay));
    }

    /// Every submission of this action name reverts
    pub fn revert_action(&self, name: &'static str) {
        self.with(|s| s.failing_actions.insert(name));
    }

    /// Every submission of this action name reverts after burning its gas limit
    pub fn exhaust_gas(&self, name: &'static str) {
        self.with(|s| s.gas_exhausting_actions.insert(name));
    }

    /// `getNextJobs` answers with data that does not decode
    pub fn corrupt_jobs(&self) {
        self.with(|s| s.jobs_undecodable = true);
    }

    pub fn clear_reverts(&self) {
        self.with(|s| s.failing_actions.clear());
    }

    pub fn submissions(&self) -> Vec<Action> {
        self.with(|s| s.submissions.iter().map(|(a, _)| a.clone()).collect())
    }

    pub fn submitted_gas(&self) -> Vec<U256> {
        self.with(|s| s.submissions.iter().map(|(_, gas)| *gas).collect())
    }
}

fn offline() -> GatewayError {
    GatewayError::Transport("connection refused".to_string())
}

#[async_trait]
impl ChainGateway for FakeChain {
    async fn is_master(&self, _network: NetworkId) -> Result<bool, GatewayError> {
        self.with(|s| {
            s.master_reads += 1;
            if s.master_fails {
                return Err(offline());
            }
            Ok(s.master_script.pop_front().unwrap_or(s.master))
        })
    }

    async fn next_jobs(&self, _network: NetworkId) -> Result<Vec<WorkableJob>, GatewayError> {
        self.with(|s| {
            if s.jobs_fail {
                Err(offline())
            } else if s.jobs_undecodable {
                Err(GatewayError::Decode("invalid data".to_string()))
            } else {
                Ok(s.jobs.clone())
            }
        })
    }

    async fn has_job(&self, job: Address) -> Result<bool, GatewayError> {
        Ok(self.with(|s| s.registered.contains(&job)))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, GatewayError> {
        let deployed = self.with(|s| s.deployed.contains(&address));
        Ok(if deployed {
            Bytes::from(vec![0x60, 0x80])
        } else {
            Bytes::default()
        })
    }

    async fn workable(
        &self,
        job: Address,
        _network: NetworkId,
    ) -> Result<(bool, Bytes), GatewayError> {
        Ok(self.with(|s| s.workable.get(&job).cloned().unwrap_or_default()))
    }

    async fn debt_snapshot(&self) -> Result<DebtSnapshot, GatewayError> {
        self.with(|s| if s.debt_fails { Err(offline()) } else { Ok(s.debt) })
    }

    async fn psm_snapshot(&self) -> Result<PsmSnapshot, GatewayError> {
        self.with(|s| if s.psm_fails { Err(offline()) } else { Ok(s.psm) })
    }

    async fn signer_balance(&self) -> Result<U256, GatewayError> {
        Ok(U256::exp10(18))
    }

    async fn submit(&self, action: &Action, gas_limit: U256) -> Result<TxOutcome, GatewayError> {
        if let Some(delay) = self.with(|s| s.submit_delay) {
            tokio::time::sleep(delay).await;
        }

        self.with(|s| {
            if s.failing_actions.contains(action.name()) {
                return Err(GatewayError::Reverted(format!("{} reverted", action.name())));
            }
            s.block += 1;
            if s.gas_exhausting_actions.contains(action.name()) {
                return Err(GatewayError::ReceiptReverted {
                    tx_hash: H256::from_low_u64_be(s.block),
                    block_number: s.block,
                    gas_used: gas_limit,
                });
            }
            s.submissions.push((action.clone(), gas_limit));
            Ok(TxOutcome {
                tx_hash: H256::from_low_u64_be(s.block),
                block_number: s.block,
                gas_used: U256::from(21_000),
            })
        })
    }
}

pub fn scheduler(chain: &Arc<FakeChain>, strategies: Vec<JobStrategy>) -> Scheduler {
    Scheduler::new(chain.clone(), network(), GasLimits::default(), strategies)
}
