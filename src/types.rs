//! Shared types for the parlay bot.
//!
//! These types form the data model used across all modules: matches and
//! legs, the assembled accumulator, placement results, the durable bet
//! record, the pipeline state machine, and the error taxonomy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Opaque token identifying an authenticated backend session.
///
/// Held only for the duration of one pipeline run; never persisted.
#[derive(Clone)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the prefix — tokens don't belong in logs.
        write!(f, "SessionToken({}…)", &self.0[..self.0.len().min(8)])
    }
}

// ---------------------------------------------------------------------------
// Match & Leg
// ---------------------------------------------------------------------------

/// A match offered by the backend, immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub home: String,
    pub away: String,
    pub start_time: DateTime<Utc>,
    /// Decimal odds for the offered outcome (> 1.0 for any real market).
    pub odds: Decimal,
    /// Whether the market is currently open for betting.
    pub available: bool,
}

impl Match {
    /// Whether this match can be a leg under the given odds floor.
    pub fn qualifies(&self, min_odds: Decimal) -> bool {
        self.available && self.odds >= min_odds
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} vs {} @ {}", self.id, self.home, self.away, self.odds)
    }
}

/// One selected match carried into an accumulator placement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Leg {
    pub match_id: String,
    pub selection: String,
    pub odds: Decimal,
}

impl Leg {
    pub fn from_match(m: &Match) -> Self {
        Self {
            match_id: m.id.clone(),
            selection: format!("{} vs {}", m.home, m.away),
            odds: m.odds,
        }
    }
}

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// A validated multi-leg bet.
///
/// `combined_odds` is always recomputed as the exact product of the leg
/// odds — aggregates supplied from outside are never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accumulator {
    pub legs: Vec<Leg>,
    pub stake: Decimal,
    pub combined_odds: Decimal,
    pub potential_return: Decimal,
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} legs @ {} (stake {} returns {})",
            self.legs.len(),
            self.combined_odds,
            self.stake,
            self.potential_return,
        )
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Backend-reported status of a placed bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    Accepted,
    Rejected,
    Pending,
    Error,
}

impl BetStatus {
    /// Whether the backend will not change this status any further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BetStatus::Accepted | BetStatus::Rejected)
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Accepted => write!(f, "ACCEPTED"),
            BetStatus::Rejected => write!(f, "REJECTED"),
            BetStatus::Pending => write!(f, "PENDING"),
            BetStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of one `place_accumulator` or `get_bet` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementResult {
    pub bet_id: String,
    pub status: BetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_odds: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Bet record
// ---------------------------------------------------------------------------

/// The durable, append-only fact of one completed run.
///
/// Written exactly once per run, success or failure, and never mutated.
/// Failure records omit the bet fields and carry the error kind instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bet_id: Option<String>,
    pub stake: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_odd: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potential_return: Option<Decimal>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BetRecord {
    /// Record for a run that got a bet onto the backend.
    pub fn placed(
        bet_id: &str,
        stake: Decimal,
        total_odd: Decimal,
        potential_return: Decimal,
        status: BetStatus,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            bet_id: Some(bet_id.to_string()),
            stake,
            total_odd: Some(total_odd),
            potential_return: Some(potential_return),
            status: status.to_string(),
            error: None,
        }
    }

    /// Record for a run that failed before a bet existed.
    pub fn failed(stake: Decimal, error: &BetError) -> Self {
        Self {
            timestamp: Utc::now(),
            bet_id: None,
            stake,
            total_odd: None,
            potential_return: None,
            status: "FAILED".to_string(),
            error: Some(format!("{}: {error}", error.kind())),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline states
// ---------------------------------------------------------------------------

/// States of one pipeline run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Authenticating,
    Selecting,
    Building,
    Placing,
    Confirming,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::Authenticating => write!(f, "AUTHENTICATING"),
            RunState::Selecting => write!(f, "SELECTING"),
            RunState::Building => write!(f, "BUILDING"),
            RunState::Placing => write!(f, "PLACING"),
            RunState::Confirming => write!(f, "CONFIRMING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Failed => write!(f, "FAILED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Every failure class the bot distinguishes.
///
/// Only `Transient` is retried in place; `OddsChanged` is retried via a
/// pipeline rebuild cycle; everything else aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum BetError {
    #[error("transient backend error: {0}")]
    Transient(String),

    #[error("odds changed during placement: {0}")]
    OddsChanged(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("backend rejected the request: {0}")]
    Validation(String),

    #[error("accumulator constraint violated: {0}")]
    Constraint(String),

    #[error("not enough qualifying matches: found {found}, need at least {required}")]
    InsufficientMatches { found: usize, required: usize },

    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl BetError {
    /// Whether the retry executor may try the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, BetError::Transient(_))
    }

    /// Stable kind string written into failure records and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BetError::Transient(_) => "transient",
            BetError::OddsChanged(_) => "odds_changed",
            BetError::Auth(_) => "auth",
            BetError::Validation(_) => "validation",
            BetError::Constraint(_) => "constraint",
            BetError::InsufficientMatches { .. } => "insufficient_matches",
            BetError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
