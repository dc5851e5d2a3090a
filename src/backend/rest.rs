//! REST bookmaker integration.
//!
//! Client for a bookmaker HTTP API exposing the same four operations as
//! the mock. Expected endpoints:
//!
//!   POST {base}/auth                → { "token": "…" }
//!   GET  {base}/matches             → [ { match … } ]
//!   POST {base}/accumulators        → { placement … }
//!   GET  {base}/bets/{bet_id}       → { placement … }
//!
//! HTTP status codes map onto the error taxonomy: 408/429/5xx and
//! connection-level failures are transient, 401/403 are auth failures,
//! 409 signals an odds change, and the remaining 4xx are validation
//! rejections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::BettingBackend;
use crate::types::{BetError, BetStatus, Leg, Match, PlacementResult, SessionToken};

const BACKEND_NAME: &str = "rest";
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// API request/response types (bookmaker JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    match_id: String,
    home: String,
    away: String,
    start_time: DateTime<Utc>,
    odds: Decimal,
    #[serde(default = "default_available")]
    available: bool,
}

fn default_available() -> bool {
    true
}

impl From<ApiMatch> for Match {
    fn from(m: ApiMatch) -> Self {
        Match {
            id: m.match_id,
            home: m.home,
            away: m.away,
            start_time: m.start_time,
            odds: m.odds,
            available: m.available,
        }
    }
}

#[derive(Debug, Serialize)]
struct PlaceRequest<'a> {
    legs: &'a [Leg],
    stake: Decimal,
}

#[derive(Debug, Deserialize)]
struct ApiPlacement {
    bet_id: String,
    status: BetStatus,
    #[serde(default)]
    accepted_odds: Option<Decimal>,
}

impl From<ApiPlacement> for PlacementResult {
    fn from(p: ApiPlacement) -> Self {
        PlacementResult {
            bet_id: p.bet_id,
            status: p.status,
            accepted_odds: p.accepted_odds,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// REST bookmaker client.
pub struct RestBackend {
    http: Client,
    base_url: String,
}

impl RestBackend {
    pub fn new(base_url: &str) -> Result<Self, BetError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("parlay/0.1.0")
            .build()
            .map_err(|e| BetError::Transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map an HTTP error status onto the error taxonomy.
    fn classify(status: StatusCode, body: &str) -> BetError {
        let detail = format!("HTTP {status}: {body}");
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            BetError::Auth(detail)
        } else if status == StatusCode::CONFLICT {
            BetError::OddsChanged(detail)
        } else if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            BetError::Transient(detail)
        } else {
            BetError::Validation(detail)
        }
    }

    /// Connection-level failures (refused, reset, timed out) are always
    /// transient — there is no response to classify.
    fn transport(e: reqwest::Error) -> BetError {
        BetError::Transient(format!("request failed: {e}"))
    }

    async fn read_error(response: reqwest::Response) -> BetError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::classify(status, &body)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BetError> {
        response
            .json::<T>()
            .await
            .map_err(|e| BetError::Validation(format!("malformed backend response: {e}")))
    }
}

#[async_trait]
impl BettingBackend for RestBackend {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, BetError> {
        let url = self.url("/auth");
        debug!(url = %url, "Authenticating");

        let response = self
            .http
            .post(&url)
            .json(&AuthRequest { username, password })
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let auth: AuthResponse = Self::decode(response).await?;
        Ok(SessionToken::new(auth.token))
    }

    async fn list_matches(&self) -> Result<Vec<Match>, BetError> {
        let url = self.url("/matches");
        debug!(url = %url, "Fetching matches");

        let response = self.http.get(&url).send().await.map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let matches: Vec<ApiMatch> = Self::decode(response).await?;
        Ok(matches.into_iter().map(Match::from).collect())
    }

    async fn place_accumulator(
        &self,
        session: &SessionToken,
        legs: &[Leg],
        stake: Decimal,
    ) -> Result<PlacementResult, BetError> {
        let url = self.url("/accumulators");
        debug!(url = %url, legs = legs.len(), %stake, "Placing accumulator");

        let response = self
            .http
            .post(&url)
            .bearer_auth(session.as_str())
            .json(&PlaceRequest { legs, stake })
            .send()
            .await
            .map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let placement: ApiPlacement = Self::decode(response).await?;
        Ok(placement.into())
    }

    async fn get_bet(&self, bet_id: &str) -> Result<PlacementResult, BetError> {
        let url = self.url(&format!("/bets/{bet_id}"));
        debug!(url = %url, "Fetching bet");

        let response = self.http.get(&url).send().await.map_err(Self::transport)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }
        let placement: ApiPlacement = Self::decode(response).await?;
        Ok(placement.into())
    }

    fn name(&self) -> &str {
        BACKEND_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            RestBackend::classify(StatusCode::UNAUTHORIZED, "bad password"),
            BetError::Auth(_)
        ));
        assert!(matches!(
            RestBackend::classify(StatusCode::FORBIDDEN, ""),
            BetError::Auth(_)
        ));
        assert!(matches!(
            RestBackend::classify(StatusCode::CONFLICT, "odds moved"),
            BetError::OddsChanged(_)
        ));
        assert!(matches!(
            RestBackend::classify(StatusCode::TOO_MANY_REQUESTS, ""),
            BetError::Transient(_)
        ));
        assert!(matches!(
            RestBackend::classify(StatusCode::BAD_GATEWAY, ""),
            BetError::Transient(_)
        ));
        assert!(matches!(
            RestBackend::classify(StatusCode::UNPROCESSABLE_ENTITY, "leg below minimum"),
            BetError::Validation(_)
        ));
        assert!(matches!(
            RestBackend::classify(StatusCode::NOT_FOUND, "bet not found"),
            BetError::Validation(_)
        ));
    }

    #[test]
    fn test_match_decoding() {
        let json = r#"{
            "match_id": "M001",
            "home": "Team1A",
            "away": "Team1B",
            "start_time": "2026-08-07T18:30:00Z",
            "odds": 2.4
        }"#;
        let api: ApiMatch = serde_json::from_str(json).unwrap();
        let m: Match = api.into();
        assert_eq!(m.id, "M001");
        assert_eq!(m.odds, dec!(2.4));
        // Absent availability flag means the market is open.
        assert!(m.available);
    }

    #[test]
    fn test_placement_decoding() {
        let json = r#"{"bet_id": "B1000", "status": "ACCEPTED", "accepted_odds": 30.0}"#;
        let api: ApiPlacement = serde_json::from_str(json).unwrap();
        let p: PlacementResult = api.into();
        assert_eq!(p.bet_id, "B1000");
        assert_eq!(p.status, BetStatus::Accepted);
        assert_eq!(p.accepted_odds, Some(dec!(30.0)));

        let json = r#"{"bet_id": "B1001", "status": "PENDING"}"#;
        let api: ApiPlacement = serde_json::from_str(json).unwrap();
        assert_eq!(api.status, BetStatus::Pending);
        assert!(api.accepted_odds.is_none());
    }

    #[test]
    fn test_base_url_normalisation() {
        let backend = RestBackend::new("https://bookie.example.com/api/").unwrap();
        assert_eq!(backend.url("/auth"), "https://bookie.example.com/api/auth");
    }
}
