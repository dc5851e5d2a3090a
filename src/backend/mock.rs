//! Mock bookmaker for deterministic testing and unattended dry runs.
//!
//! All state is in-memory. The fixture list, failure injection, and the
//! pending-confirmation countdown are fully controllable from test code,
//! so every pipeline path — including odds changes and transient outages —
//! can be exercised without a network.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use super::BettingBackend;
use crate::types::{BetError, BetStatus, Leg, Match, PlacementResult, SessionToken};

const BACKEND_NAME: &str = "mock";

/// Minimum odds the mock bookmaker itself accepts per leg, mirroring a
/// bookmaker-side validation rule distinct from the bot's own floor.
const HOUSE_MIN_ODDS: Decimal = dec!(1.01);

/// A mock betting backend.
pub struct MockBackend {
    matches: Mutex<Vec<Match>>,
    sessions: Mutex<Vec<String>>,
    bets: Mutex<HashMap<String, PlacementResult>>,
    next_bet_id: AtomicU64,
    /// Scripted failures per operation name, consumed FIFO.
    scripted: Mutex<HashMap<String, VecDeque<BetError>>>,
    /// How many `get_bet` calls report PENDING before turning ACCEPTED.
    pending_polls: AtomicU32,
    /// When set, placements come back PENDING instead of ACCEPTED.
    place_pending: AtomicU32,
}

impl MockBackend {
    /// Mock with the default fixture list.
    pub fn new() -> Self {
        Self::with_matches(Self::fixture_matches())
    }

    /// Mock with custom matches.
    pub fn with_matches(matches: Vec<Match>) -> Self {
        Self {
            matches: Mutex::new(matches),
            sessions: Mutex::new(Vec::new()),
            bets: Mutex::new(HashMap::new()),
            next_bet_id: AtomicU64::new(1000),
            scripted: Mutex::new(HashMap::new()),
            pending_polls: AtomicU32::new(0),
            place_pending: AtomicU32::new(0),
        }
    }

    /// Queue an error for the next call to `op`
    /// (`authenticate` | `list_matches` | `place_accumulator` | `get_bet`).
    pub fn script_failure(&self, op: &str, err: BetError) {
        self.scripted
            .lock()
            .unwrap()
            .entry(op.to_string())
            .or_default()
            .push_back(err);
    }

    /// Make the next placement report PENDING, with `polls` subsequent
    /// `get_bet` calls still PENDING before the bet settles ACCEPTED.
    pub fn set_pending(&self, polls: u32) {
        self.place_pending.store(1, Ordering::SeqCst);
        self.pending_polls.store(polls, Ordering::SeqCst);
    }

    /// Replace the offered matches (odds drifted between fetches).
    pub fn set_matches(&self, matches: Vec<Match>) {
        *self.matches.lock().unwrap() = matches;
    }

    /// All placements stored so far.
    pub fn placed_bets(&self) -> Vec<PlacementResult> {
        self.bets.lock().unwrap().values().cloned().collect()
    }

    /// A default spread of matches: mostly open, one suspended, odds from
    /// long-shot favourites to outsiders.
    pub fn fixture_matches() -> Vec<Match> {
        let odds_table = [
            dec!(1.15),
            dec!(1.30),
            dec!(1.45),
            dec!(1.60),
            dec!(1.85),
            dec!(2.00),
            dec!(2.40),
            dec!(2.75),
            dec!(3.10),
            dec!(3.50),
        ];
        let now = Utc::now();

        odds_table
            .iter()
            .enumerate()
            .map(|(i, &odds)| Match {
                id: format!("M{:03}", i + 1),
                home: format!("Team{}A", i + 1),
                away: format!("Team{}B", i + 1),
                start_time: now + Duration::minutes(30 + (i as i64) * 10),
                odds,
                // M007 is suspended; selection must skip it.
                available: i != 6,
            })
            .collect()
    }

    fn take_scripted(&self, op: &str) -> Option<BetError> {
        self.scripted
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(|q| q.pop_front())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BettingBackend for MockBackend {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, BetError> {
        if let Some(err) = self.take_scripted("authenticate") {
            return Err(err);
        }
        if username.is_empty() || password.is_empty() {
            return Err(BetError::Auth("invalid credentials".into()));
        }

        let token = format!("session-{}", uuid::Uuid::new_v4());
        self.sessions.lock().unwrap().push(token.clone());
        Ok(SessionToken::new(token))
    }

    async fn list_matches(&self) -> Result<Vec<Match>, BetError> {
        if let Some(err) = self.take_scripted("list_matches") {
            return Err(err);
        }
        Ok(self.matches.lock().unwrap().clone())
    }

    async fn place_accumulator(
        &self,
        session: &SessionToken,
        legs: &[Leg],
        stake: Decimal,
    ) -> Result<PlacementResult, BetError> {
        if let Some(err) = self.take_scripted("place_accumulator") {
            return Err(err);
        }

        if !self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .any(|s| s == session.as_str())
        {
            return Err(BetError::Validation("unknown session".into()));
        }
        if stake <= Decimal::ZERO {
            return Err(BetError::Validation(format!("invalid stake {stake}")));
        }

        // Bookmaker-side leg validation against the current board.
        let board = self.matches.lock().unwrap();
        for leg in legs {
            let offered = board
                .iter()
                .find(|m| m.id == leg.match_id)
                .ok_or_else(|| BetError::Validation(format!("unknown match {}", leg.match_id)))?;
            if !offered.available {
                return Err(BetError::Validation(format!(
                    "match {} suspended at placement",
                    leg.match_id
                )));
            }
            if leg.odds < HOUSE_MIN_ODDS {
                return Err(BetError::Validation(format!(
                    "leg {} odds {} below house minimum",
                    leg.match_id, leg.odds
                )));
            }
            if offered.odds != leg.odds {
                return Err(BetError::OddsChanged(format!(
                    "match {} now at {}, bet slip had {}",
                    leg.match_id, offered.odds, leg.odds
                )));
            }
        }
        drop(board);

        let bet_id = format!("B{}", self.next_bet_id.fetch_add(1, Ordering::SeqCst));
        let combined = legs.iter().fold(Decimal::ONE, |acc, l| acc * l.odds);

        let status = if self.place_pending.swap(0, Ordering::SeqCst) > 0 {
            BetStatus::Pending
        } else {
            BetStatus::Accepted
        };

        let result = PlacementResult {
            bet_id: bet_id.clone(),
            status,
            accepted_odds: Some(combined),
        };
        self.bets.lock().unwrap().insert(bet_id, result.clone());
        Ok(result)
    }

    async fn get_bet(&self, bet_id: &str) -> Result<PlacementResult, BetError> {
        if let Some(err) = self.take_scripted("get_bet") {
            return Err(err);
        }

        let mut bets = self.bets.lock().unwrap();
        let bet = bets
            .get_mut(bet_id)
            .ok_or_else(|| BetError::Validation(format!("bet not found: {bet_id}")))?;

        if bet.status == BetStatus::Pending {
            let remaining = self.pending_polls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.pending_polls.store(remaining - 1, Ordering::SeqCst);
            } else {
                bet.status = BetStatus::Accepted;
            }
        }

        Ok(bet.clone())
    }

    fn name(&self) -> &str {
        BACKEND_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
