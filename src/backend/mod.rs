//! Betting backend integrations.
//!
//! Defines the `BettingBackend` trait and provides implementations for:
//! - Mock — deterministic in-process bookmaker for unattended dry runs
//!   and tests
//! - REST — reqwest client for a real bookmaker HTTP API

pub mod mock;
pub mod rest;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{BetError, Leg, Match, PlacementResult, SessionToken};

/// Abstraction over betting backends.
///
/// Every error an implementation returns must be classified into the
/// [`BetError`] taxonomy — the retry executor and the pipeline dispatch
/// on the class, not on message text.
#[async_trait]
pub trait BettingBackend: Send + Sync {
    /// Exchange credentials for a session token.
    ///
    /// Invalid credentials are an [`BetError::Auth`] failure (never
    /// retried); connectivity problems are [`BetError::Transient`].
    async fn authenticate(&self, username: &str, password: &str)
        -> Result<SessionToken, BetError>;

    /// Fetch the currently offered matches.
    async fn list_matches(&self) -> Result<Vec<Match>, BetError>;

    /// Submit an accumulator.
    ///
    /// May fail [`BetError::Transient`] (retry in place),
    /// [`BetError::OddsChanged`] (re-fetch, rebuild, then retry), or
    /// [`BetError::Validation`] (fatal).
    async fn place_accumulator(
        &self,
        session: &SessionToken,
        legs: &[Leg],
        stake: Decimal,
    ) -> Result<PlacementResult, BetError>;

    /// Look up a placed bet, used to confirm a PENDING placement.
    async fn get_bet(&self, bet_id: &str) -> Result<PlacementResult, BetError>;

    /// Backend name for logging and identification.
    fn name(&self) -> &str;
}
