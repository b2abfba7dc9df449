mod common;

use common::{job_address, network, scheduler, FakeChain};
use dss_common::Action;
use dss_keeper::{Cadence, TickError, TickOutcome, TickReport};
use ethers::types::U256;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn completed(outcome: TickOutcome) -> TickReport {
    match outcome {
        TickOutcome::Completed(report) => report,
        other => panic!("expected a completed tick, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_submission_while_not_master() {
    let chain = FakeChain::new();
    chain.set_master(false);
    chain.add_job(job_address(1), true, true);
    chain.set_debt(0, 0, 10);

    let scheduler = scheduler(&chain, vec![]);
    for _ in 0..3 {
        assert!(matches!(scheduler.fire().await, TickOutcome::NotMaster));
    }

    assert!(chain.submissions().is_empty());
}

#[tokio::test]
async fn test_only_workable_jobs_are_executed() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(1), true, true);
    chain.add_job(job_address(2), false, true);
    chain.add_job(job_address(3), true, true);

    let report = completed(scheduler(&chain, vec![]).fire().await);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.workable, 2);
    assert_eq!(report.executed, 2);

    let targets: Vec<_> = chain
        .submissions()
        .into_iter()
        .map(|action| match action {
            Action::Work { job, network: n, .. } => {
                assert_eq!(n, network());
                job
            }
            other => panic!("unexpected action {}", other),
        })
        .collect();
    assert_eq!(targets, vec![job_address(1), job_address(3)]);
}

#[tokio::test]
async fn test_empty_job_list_is_a_normal_tick() {
    let chain = FakeChain::new();
    chain.set_master(true);

    let report = completed(scheduler(&chain, vec![]).fire().await);
    assert_eq!(report, TickReport::default());
}

#[tokio::test]
async fn test_undeployed_job_is_never_executed() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(4), true, false);
    chain.register(job_address(4));

    let report = completed(scheduler(&chain, vec![]).fire().await);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.executed, 0);
    assert!(chain.submissions().is_empty());
}

#[tokio::test]
async fn test_unregistered_job_is_never_executed() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(5), true, false);
    chain.deploy(job_address(5));
    chain.add_job(job_address(6), true, true);

    let report = completed(scheduler(&chain, vec![]).fire().await);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.executed, 1);
    assert_eq!(chain.submissions().len(), 1);
}

#[tokio::test]
async fn test_sequencer_jobs_use_their_gas_ceiling() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(1), true, true);

    completed(scheduler(&chain, vec![]).fire().await);
    assert_eq!(chain.submitted_gas(), vec![U256::from(1_000_000u64)]);
}

#[tokio::test]
async fn test_master_read_failure_aborts_tick() {
    let chain = FakeChain::new();
    chain.fail_master();
    chain.add_job(job_address(1), true, true);

    let outcome = scheduler(&chain, vec![]).fire().await;
    assert!(matches!(
        outcome,
        TickOutcome::Aborted(TickError::MasterCheck(_))
    ));
    if let TickOutcome::Aborted(err) = outcome {
        assert!(err.is_transient());
    }
    assert!(chain.submissions().is_empty());
}

#[tokio::test]
async fn test_discovery_failure_aborts_tick() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.fail_jobs();

    let outcome = scheduler(&chain, vec![]).fire().await;
    assert!(matches!(
        outcome,
        TickOutcome::Aborted(TickError::Discovery(_))
    ));
}

#[tokio::test]
async fn test_undecodable_job_list_is_not_transient() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.corrupt_jobs();

    match scheduler(&chain, vec![]).fire().await {
        TickOutcome::Aborted(err) => {
            assert!(matches!(err, TickError::Discovery(_)));
            assert!(!err.is_transient());
        }
        other => panic!("expected an aborted tick, got {:?}", other),
    }
    assert!(chain.submissions().is_empty());
}

#[tokio::test]
async fn test_leadership_is_rechecked_before_submission() {
    let chain = FakeChain::new();
    // Master at tick start, lost by the time the job is submitted.
    chain.script_master(&[true, false]);
    chain.add_job(job_address(1), true, true);

    let report = completed(scheduler(&chain, vec![]).fire().await);
    assert_eq!(report.failed, 1);
    assert_eq!(chain.master_reads(), 2);
    assert!(chain.submissions().is_empty());
}

#[tokio::test]
async fn test_failed_submission_is_retried_next_tick() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(1), true, true);
    chain.revert_action("work");

    let scheduler = scheduler(&chain, vec![]);
    let report = completed(scheduler.fire().await);
    assert_eq!(report.failed, 1);
    assert!(chain.submissions().is_empty());

    chain.clear_reverts();
    let report = completed(scheduler.fire().await);
    assert_eq!(report.executed, 1);
    assert_eq!(chain.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_tick_is_skipped() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(1), true, true);
    chain.set_submit_delay(Duration::from_secs(30));

    let scheduler = Arc::new(scheduler(&chain, vec![]));
    let first = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.fire().await }
    });

    // Let the first tick reach its pending submission.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(matches!(scheduler.fire().await, TickOutcome::Skipped));

    let report = completed(first.await.unwrap());
    assert_eq!(report.executed, 1);
    assert_eq!(chain.submissions().len(), 1);

    // Once the first tick is done the next one runs normally.
    chain.set_submit_delay(Duration::ZERO);
    assert!(matches!(scheduler.fire().await, TickOutcome::Completed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_finishes_in_flight_tick() {
    let chain = FakeChain::new();
    chain.set_master(true);
    chain.add_job(job_address(1), true, true);
    chain.set_submit_delay(Duration::from_secs(90));

    let scheduler = Arc::new(scheduler(&chain, vec![]));
    let cadence = Cadence::every(Duration::from_secs(60)).unwrap();
    let shutdown = CancellationToken::new();

    let runner = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(&cadence, shutdown).await }
    });

    // First tick fires immediately and is still waiting on its receipt;
    // the fire at 60s is skipped.
    tokio::time::sleep(Duration::from_secs(70)).await;
    assert!(chain.submissions().is_empty());

    shutdown.cancel();
    runner.await.unwrap();

    // The submitted transaction was allowed to confirm, and nothing else ran.
    assert_eq!(chain.submissions().len(), 1);
    assert_eq!(chain.master_reads(), 2);
}
