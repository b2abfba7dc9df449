//! Tick scheduler
//!
//! Each tick: check leadership, list the sequencer's jobs, validate the
//! workable ones, execute the valid ones, then run the strategy-driven jobs.
//! Ticks never overlap: a fire time that arrives while a tick is still
//! running is skipped outright.

use crate::cadence::Cadence;
use crate::catalog::JobCatalog;
use crate::executor::JobExecutor;
use crate::master::MasterResolver;
use crate::settings::GasLimits;
use crate::strategies::JobStrategy;
use crate::validator::JobValidator;
use dss_common::{ChainGateway, GatewayError, NetworkId, WorkableJob};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum TickError {
    #[error("master check failed: {0}")]
    MasterCheck(#[source] GatewayError),

    #[error("job discovery failed: {0}")]
    Discovery(#[source] GatewayError),
}

impl TickError {
    /// Whether the next tick may succeed without operator action
    pub fn is_transient(&self) -> bool {
        match self {
            TickError::MasterCheck(e) | TickError::Discovery(e) => e.is_transient(),
        }
    }
}

/// Per-tick counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entries returned by `getNextJobs`
    pub discovered: usize,
    pub workable: usize,
    /// Workable jobs that failed validation
    pub rejected: usize,
    /// Confirmed transactions, sequencer and strategy jobs alike
    pub executed: usize,
    pub failed: usize,
    pub strategy_errors: usize,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// The previous tick was still running
    Skipped,
    /// A read needed to start the tick failed
    Aborted(TickError),
    NotMaster,
    Completed(TickReport),
}

pub struct Scheduler {
    gateway: Arc<dyn ChainGateway>,
    master: MasterResolver,
    catalog: JobCatalog,
    validator: JobValidator,
    executor: JobExecutor,
    strategies: Vec<JobStrategy>,
    running: Mutex<()>,
    ticks: AtomicU64,
}

impl Scheduler {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        network: NetworkId,
        gas: GasLimits,
        strategies: Vec<JobStrategy>,
    ) -> Self {
        let master = MasterResolver::new(gateway.clone(), network);

        Self {
            catalog: JobCatalog::new(gateway.clone(), network),
            validator: JobValidator::new(gateway.clone()),
            executor: JobExecutor::new(gateway.clone(), master.clone(), gas),
            master,
            gateway,
            strategies,
            running: Mutex::new(()),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn network(&self) -> NetworkId {
        self.master.network()
    }

    /// Fire ticks on `cadence` until `shutdown` is cancelled. The in-flight
    /// tick is allowed to finish before this returns.
    pub async fn run(self: Arc<Self>, cadence: &Cadence, shutdown: CancellationToken) {
        info!(network = %self.network(), "Scheduler running ({})", cadence);

        let mut ticker = cadence.ticker();
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, no further ticks will be scheduled");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("Tick task panicked: {}", e);
                    }
                }
                fired = ticker.tick() => {
                    if !fired {
                        info!("Schedule has no further fire times");
                        break;
                    }
                    let scheduler = Arc::clone(&self);
                    in_flight.spawn(async move { scheduler.fire().await });
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!("Tick task panicked: {}", e);
            }
        }

        info!("Scheduler stopped");
    }

    /// Run one tick unless another is still in progress
    pub async fn fire(&self) -> TickOutcome {
        let Ok(_running) = self.running.try_lock() else {
            warn!("Previous tick still running, skipping this one");
            return TickOutcome::Skipped;
        };

        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        self.run_tick().instrument(info_span!("tick", tick)).await
    }

    async fn run_tick(&self) -> TickOutcome {
        self.log_balance().await;

        match self.master.is_master().await {
            Ok(true) => {}
            Ok(false) => {
                info!(network = %self.network(), "Network is not master, idling");
                return TickOutcome::NotMaster;
            }
            Err(e) => return Self::abort(TickError::MasterCheck(e)),
        }

        let jobs = match self.catalog.list_workable().await {
            Ok(jobs) => jobs,
            Err(e) => return Self::abort(TickError::Discovery(e)),
        };

        let mut report = TickReport {
            discovered: jobs.len(),
            ..TickReport::default()
        };

        self.work_sequencer_jobs(jobs, &mut report).await;

        for strategy in &self.strategies {
            self.run_strategy(strategy, &mut report).await;
        }

        info!(
            discovered = report.discovered,
            workable = report.workable,
            rejected = report.rejected,
            executed = report.executed,
            failed = report.failed,
            strategy_errors = report.strategy_errors,
            "Tick complete"
        );

        TickOutcome::Completed(report)
    }

    fn abort(err: TickError) -> TickOutcome {
        if err.is_transient() {
            warn!("Aborting tick, will retry on the next one: {}", err);
        } else {
            error!("Aborting tick on a non-transient fault: {}", err);
        }
        TickOutcome::Aborted(err)
    }

    async fn work_sequencer_jobs(&self, jobs: Vec<WorkableJob>, report: &mut TickReport) {
        let workable: Vec<WorkableJob> = jobs.into_iter().filter(|job| job.can_work).collect();
        report.workable = workable.len();

        for job in &workable {
            info!(
                job = ?job.job.address,
                args = %format!("0x{}", hex::encode(&job.args)),
                "Found workable job"
            );
        }

        // Validation reads are independent per job; submissions below are not.
        let validated = join_all(workable.into_iter().map(|job| self.validator.validate(job))).await;

        for result in validated {
            match result {
                Ok(job) => match self.executor.execute_job(job).await {
                    Ok(_) => report.executed += 1,
                    Err(_) => report.failed += 1,
                },
                Err(e) => {
                    warn!(reason = e.reason(), "Skipping job: {}", e);
                    report.rejected += 1;
                }
            }
        }
    }

    async fn run_strategy(&self, strategy: &JobStrategy, report: &mut TickReport) {
        let kind = strategy.kind();
        let decision = match strategy.decide(self.gateway.as_ref(), self.network()).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(strategy = %kind, "Strategy failed: {}", e);
                report.strategy_errors += 1;
                return;
            }
        };

        debug!(strategy = %kind, actions = decision.actions().len(), "Strategy decided");

        for action in decision.actions() {
            let attempt = self.executor.attempt(kind, action.clone());
            match self.executor.execute(attempt).await {
                Ok(_) => report.executed += 1,
                Err(_) => {
                    report.failed += 1;
                    if decision.stops_on_failure() {
                        warn!(strategy = %kind, "Abandoning remaining {} actions", kind);
                        break;
                    }
                }
            }
        }
    }

    async fn log_balance(&self) {
        match self.gateway.signer_balance().await {
            Ok(balance) => info!(balance = %ethers::utils::format_ether(balance), "Wallet balance"),
            Err(e) => warn!("Could not read wallet balance: {}", e),
        }
    }
}
