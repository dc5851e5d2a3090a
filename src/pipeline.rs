//! Run pipeline — one full authenticate → select → build → place →
//! confirm pass over the backend.
//!
//! The pipeline owns the sequencing and the terminal bookkeeping: every
//! run, success or failure, ends in exactly one terminal state and exactly
//! one bet record appended to the sink. Backend calls all go through the
//! shared retry policy; an odds-change rejection triggers a bounded
//! rebuild cycle (fresh match list, fresh selection, fresh slip) instead
//! of a blind resubmit.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::BettingBackend;
use crate::builder::AccumulatorBuilder;
use crate::config::Credentials;
use crate::ledger::RecordSink;
use crate::retry::RetryPolicy;
use crate::selector::{self, SelectionPolicy};
use crate::types::{Accumulator, BetError, BetRecord, BetStatus, PlacementResult, RunState};

// ---------------------------------------------------------------------------
// Configuration & report
// ---------------------------------------------------------------------------

/// Everything one run needs beyond the backend itself.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub stake: Decimal,
    pub min_odds: Decimal,
    pub max_legs: usize,
    pub policy: SelectionPolicy,
    /// Rebuild-and-resubmit cycles allowed after an odds change.
    pub rebuild_attempts: u32,
    /// How many confirmation polls a PENDING bet gets.
    pub confirm_polls: u32,
    pub confirm_delay: Duration,
}

/// Terminal outcome of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,
    pub record: BetRecord,
}

/// A bet that made it onto the backend, terminal status attached.
struct Placed {
    accumulator: Accumulator,
    result: PlacementResult,
    status: BetStatus,
    /// Rejected at the placing stage (run fails) rather than during
    /// confirmation (run completes with a rejected bet).
    failed_at_placement: bool,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct RunPipeline {
    backend: Arc<dyn BettingBackend>,
    sink: Arc<dyn RecordSink>,
    retry: RetryPolicy,
    builder: AccumulatorBuilder,
    credentials: Credentials,
    cfg: PipelineConfig,
}

impl RunPipeline {
    pub fn new(
        backend: Arc<dyn BettingBackend>,
        sink: Arc<dyn RecordSink>,
        retry: RetryPolicy,
        credentials: Credentials,
        cfg: PipelineConfig,
    ) -> Self {
        let builder = AccumulatorBuilder::new(cfg.min_odds, cfg.max_legs);
        Self {
            backend,
            sink,
            retry,
            builder,
            credentials,
            cfg,
        }
    }

    /// Execute one run to a terminal state.
    ///
    /// The returned report carries the same record that was appended to
    /// the sink. `Err` here means the record itself could not be
    /// persisted; every other outcome has a durable trace.
    pub async fn run(&self) -> Result<RunReport> {
        info!(backend = self.backend.name(), stake = %self.cfg.stake, "Run starting");

        let (state, record) = match self.drive().await {
            Ok(placed) => {
                let total_odd = placed
                    .result
                    .accepted_odds
                    .unwrap_or(placed.accumulator.combined_odds);
                let record = BetRecord::placed(
                    &placed.result.bet_id,
                    placed.accumulator.stake,
                    total_odd,
                    placed.accumulator.stake * total_odd,
                    placed.status,
                );
                let state = if placed.failed_at_placement {
                    RunState::Failed
                } else {
                    RunState::Completed
                };
                (state, record)
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Run failed");
                (RunState::Failed, BetRecord::failed(self.cfg.stake, &e))
            }
        };

        self.sink
            .append(&record)
            .context("Failed to persist bet record")?;

        info!(state = %state, status = %record.status, "Run finished");
        Ok(RunReport { state, record })
    }

    /// The happy-path state sequence; any returned error is a Failed
    /// transition for `run` to record.
    async fn drive(&self) -> Result<Placed, BetError> {
        let backend = &self.backend;

        self.transition(RunState::Authenticating);
        let session = self
            .retry
            .execute("authenticate", || {
                backend.authenticate(
                    &self.credentials.username,
                    self.credentials.password.expose_secret(),
                )
            })
            .await?;
        debug!("Session established");

        let mut rebuilds = 0u32;
        let (accumulator, result) = loop {
            self.transition(RunState::Selecting);
            let matches = self
                .retry
                .execute("list_matches", || backend.list_matches())
                .await?;
            let legs = selector::select(
                &matches,
                &self.cfg.policy,
                self.cfg.min_odds,
                self.cfg.max_legs,
            )?;
            info!(
                legs = legs.len(),
                ids = ?legs.iter().map(|l| l.match_id.as_str()).collect::<Vec<_>>(),
                "Legs selected"
            );

            self.transition(RunState::Building);
            let accumulator = self.builder.build(legs, self.cfg.stake)?;
            info!(%accumulator, "Accumulator built");

            self.transition(RunState::Placing);
            let placed = self
                .retry
                .execute("place_accumulator", || {
                    backend.place_accumulator(&session, &accumulator.legs, accumulator.stake)
                })
                .await;

            match placed {
                Ok(result) => break (accumulator, result),
                Err(BetError::OddsChanged(reason)) if rebuilds < self.cfg.rebuild_attempts => {
                    rebuilds += 1;
                    warn!(
                        rebuilds,
                        budget = self.cfg.rebuild_attempts,
                        reason = %reason,
                        "Odds changed — rebuilding from a fresh match list"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        match result.status {
            BetStatus::Rejected | BetStatus::Error => {
                warn!(bet_id = %result.bet_id, status = %result.status, "Placement not accepted");
                Ok(Placed {
                    status: result.status,
                    failed_at_placement: true,
                    accumulator,
                    result,
                })
            }
            BetStatus::Accepted | BetStatus::Pending => {
                self.transition(RunState::Confirming);
                let status = self.confirm(&result).await?;
                Ok(Placed {
                    status,
                    failed_at_placement: false,
                    accumulator,
                    result,
                })
            }
        }
    }

    /// Poll `get_bet` until the backend reports a terminal status or the
    /// poll budget runs out. A bet still PENDING at that point is reported
    /// as such, not treated as a failure — the scheduler's next run owns
    /// nothing from this one.
    async fn confirm(&self, placed: &PlacementResult) -> Result<BetStatus, BetError> {
        let mut status = placed.status;

        for poll in 1..=self.cfg.confirm_polls {
            let latest = self
                .retry
                .execute("get_bet", || self.backend.get_bet(&placed.bet_id))
                .await?;
            status = latest.status;

            if status.is_terminal() {
                info!(bet_id = %placed.bet_id, %status, poll, "Bet confirmed");
                return Ok(status);
            }
            debug!(bet_id = %placed.bet_id, %status, poll, "Bet not yet settled");
            if poll < self.cfg.confirm_polls {
                tokio::time::sleep(self.cfg.confirm_delay).await;
            }
        }

        info!(bet_id = %placed.bet_id, %status, "Confirmation window closed without a terminal status");
        Ok(status)
    }

    fn transition(&self, state: RunState) {
        debug!(state = %state, "Pipeline state");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
