//! End-to-end pipeline runs against the deterministic mock bookmaker.
//!
//! Exercises whole runs — lock to terminal record — with no network and
//! no live clock dependence beyond the backoff sleeps, which the test
//! retry policy keeps at a millisecond.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use parlay::backend::mock::MockBackend;
use parlay::backend::BettingBackend;
use parlay::config::Credentials;
use parlay::ledger::MemorySink;
use parlay::lock::RunLock;
use parlay::pipeline::{PipelineConfig, RunPipeline};
use parlay::retry::RetryPolicy;
use parlay::selector::SelectionPolicy;
use parlay::types::{BetError, Match, RunState};

fn credentials() -> Credentials {
    Credentials {
        username: "test_user".to_string(),
        password: SecretString::new("test_pass".to_string()),
    }
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::with_delays(max_retries, 2.0, Duration::from_millis(1), Duration::ZERO)
}

fn config(policy: SelectionPolicy, stake: Decimal) -> PipelineConfig {
    PipelineConfig {
        stake,
        min_odds: dec!(1.2),
        max_legs: 4,
        policy,
        rebuild_attempts: 1,
        confirm_polls: 3,
        confirm_delay: Duration::from_millis(1),
    }
}

fn matches_with_odds(odds: &[Decimal]) -> Vec<Match> {
    odds.iter()
        .enumerate()
        .map(|(i, &odds)| Match {
            id: format!("M{:03}", i + 1),
            home: format!("Team{}A", i + 1),
            away: format!("Team{}B", i + 1),
            start_time: Utc::now() + chrono::Duration::minutes(45),
            odds,
            available: true,
        })
        .collect()
}

fn pipeline(
    backend: Arc<MockBackend>,
    policy: SelectionPolicy,
    stake: Decimal,
) -> (RunPipeline, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let p = RunPipeline::new(
        backend,
        sink.clone(),
        fast_retry(3),
        credentials(),
        config(policy, stake),
    );
    (p, sink)
}

#[tokio::test]
async fn full_run_builds_top_accumulator_and_records_it() {
    let backend = Arc::new(MockBackend::with_matches(matches_with_odds(&[
        dec!(1.3),
        dec!(1.5),
        dec!(2.0),
        dec!(2.5),
        dec!(4.0),
    ])));
    let (pipeline, sink) = pipeline(backend.clone(), SelectionPolicy::Top, dec!(10));

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.record.status, "ACCEPTED");
    assert_eq!(report.record.total_odd, Some(dec!(30.0)));
    assert_eq!(report.record.potential_return, Some(dec!(300.0)));

    // Exactly one durable record, matching the placed bet.
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].stake, dec!(10));

    let placed = backend.placed_bets();
    assert_eq!(placed.len(), 1);
    assert_eq!(records[0].bet_id.as_deref(), Some(placed[0].bet_id.as_str()));
}

#[tokio::test]
async fn transient_outage_is_ridden_out() {
    let backend = Arc::new(MockBackend::with_matches(matches_with_odds(&[
        dec!(1.5),
        dec!(2.0),
        dec!(2.5),
    ])));
    // Two network blips on the match fetch, one on placement.
    backend.script_failure("list_matches", BetError::Transient("connection reset".into()));
    backend.script_failure("list_matches", BetError::Transient("connection reset".into()));
    backend.script_failure("place_accumulator", BetError::Transient("timeout".into()));
    let (pipeline, sink) = pipeline(backend, SelectionPolicy::Top, dec!(5));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn persistent_outage_exhausts_retries_and_fails_once() {
    let backend = Arc::new(MockBackend::with_matches(matches_with_odds(&[
        dec!(1.5),
        dec!(2.0),
    ])));
    // max_retries = 3 allows 4 attempts; script 5 failures.
    for _ in 0..5 {
        backend.script_failure("list_matches", BetError::Transient("down".into()));
    }
    let (pipeline, sink) = pipeline(backend, SelectionPolicy::Top, dec!(5));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.state, RunState::Failed);
    assert!(report
        .record
        .error
        .as_deref()
        .unwrap()
        .starts_with("retries_exhausted:"));
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn odds_drift_rebuilds_against_fresh_board() {
    let backend = Arc::new(MockBackend::with_matches(matches_with_odds(&[
        dec!(1.5),
        dec!(2.0),
        dec!(2.5),
        dec!(4.0),
    ])));
    backend.script_failure(
        "place_accumulator",
        BetError::OddsChanged("M002 drifted".into()),
    );
    let (pipeline, sink) = pipeline(backend.clone(), SelectionPolicy::Top, dec!(10));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.record.total_odd, Some(dec!(30.0)));

    // Only the post-rebuild placement stuck.
    assert_eq!(backend.placed_bets().len(), 1);
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn seeded_random_selection_is_reproducible_end_to_end() {
    let board = matches_with_odds(&[dec!(1.3), dec!(1.5), dec!(2.0), dec!(2.5), dec!(4.0)]);
    let policy = SelectionPolicy::Random { seed: Some(99) };

    let first = {
        let backend = Arc::new(MockBackend::with_matches(board.clone()));
        let (pipeline, _) = pipeline(backend, policy.clone(), dec!(10));
        pipeline.run().await.unwrap()
    };
    let second = {
        let backend = Arc::new(MockBackend::with_matches(board));
        let (pipeline, _) = pipeline(backend, policy, dec!(10));
        pipeline.run().await.unwrap()
    };

    assert_eq!(first.state, RunState::Completed);
    assert_eq!(first.record.total_odd, second.record.total_odd);
    assert_eq!(first.record.potential_return, second.record.potential_return);
}

#[tokio::test]
async fn from_feed_selection_follows_the_feed() {
    let backend = Arc::new(MockBackend::with_matches(matches_with_odds(&[
        dec!(1.3),
        dec!(1.5),
        dec!(2.0),
        dec!(2.5),
    ])));
    let policy = SelectionPolicy::FromFeed {
        ids: vec!["M004".into(), "M001".into()],
    };
    let (pipeline, _sink) = pipeline(backend, policy, dec!(10));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    // 2.5 × 1.3, in feed order.
    assert_eq!(report.record.total_odd, Some(dec!(3.25)));
}

#[tokio::test]
async fn confirmation_of_terminal_bet_is_idempotent() {
    let backend = Arc::new(MockBackend::with_matches(matches_with_odds(&[
        dec!(1.5),
        dec!(2.0),
    ])));
    let (pipeline, sink) = pipeline(backend.clone(), SelectionPolicy::Top, dec!(5));

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.state, RunState::Completed);

    // Polling the settled bet again reports the same terminal result the
    // record already captured.
    let bet_id = report.record.bet_id.clone().unwrap();
    let again = backend.get_bet(&bet_id).await.unwrap();
    assert_eq!(again.status.to_string(), report.record.status);
    assert_eq!(sink.records().len(), 1);
}

#[tokio::test]
async fn lock_contention_skips_without_a_record() {
    let mut lock_path = std::env::temp_dir();
    lock_path.push(format!("parlay_it_lock_{}.lock", uuid::Uuid::new_v4()));
    let lock = RunLock::new(&lock_path, Duration::from_secs(3600));

    let guard = lock.acquire().unwrap();
    assert!(guard.is_some());

    // A second scheduled invocation arrives while the first still runs:
    // it must observe contention and never reach the pipeline.
    let sink = MemorySink::new();
    let second = lock.acquire().unwrap();
    assert!(second.is_none());
    assert!(sink.records().is_empty());

    drop(guard);
    assert!(lock.acquire().unwrap().is_some());
}
