//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Credentials are referenced by env-var name in the config and resolved
//! at runtime via `std::env::var`; the password never leaves a
//! `SecretString`.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::selector::{SelectionMode, SelectionPolicy};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub backend: BackendConfig,
    pub retry: RetryConfig,
    #[serde(default)]
    pub confirm: ConfirmConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub default_stake: Decimal,
    pub max_legs: usize,
    pub min_odds: Decimal,
    pub selection_mode: SelectionMode,
    /// Seed for the `random` selection mode; omit for entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Ordered candidate match ids for the `from_feed` selection mode.
    #[serde(default)]
    pub feed: Vec<String>,
    /// How many times placement is rebuilt and re-tried after an
    /// odds-change rejection before the run fails.
    #[serde(default = "default_rebuild_attempts")]
    pub rebuild_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub username_env: String,
    pub password_env: String,
    /// Run against the in-process mock instead of a real bookmaker.
    #[serde(default)]
    pub mock: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base: f64,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfirmConfig {
    pub poll_attempts: u32,
    pub poll_delay_ms: u64,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 3,
            poll_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockConfig {
    pub path: String,
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: "parlay.lock".to_string(),
            stale_after_secs: 3600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub path: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "placed_bets.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    /// Optional log file; console output is always on.
    #[serde(default)]
    pub file: Option<String>,
    /// Emit JSON log lines instead of the human format.
    #[serde(default)]
    pub json: bool,
}

impl BotConfig {
    /// Resolve the configured mode into a concrete selection policy.
    pub fn policy(&self) -> SelectionPolicy {
        match self.selection_mode {
            SelectionMode::Top => SelectionPolicy::Top,
            SelectionMode::Random => SelectionPolicy::Random {
                seed: self.random_seed,
            },
            SelectionMode::FromFeed => SelectionPolicy::FromFeed {
                ids: self.feed.clone(),
            },
        }
    }
}

fn default_rebuild_attempts() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    500
}

/// Backend credentials resolved from the environment.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.bot.default_stake <= Decimal::ZERO {
            bail!("bot.default_stake must be positive");
        }
        if self.bot.max_legs < 2 {
            bail!("bot.max_legs must be at least 2 (a one-leg accumulator is just a single)");
        }
        if self.bot.min_odds <= Decimal::ZERO {
            bail!("bot.min_odds must be positive");
        }
        if self.retry.backoff_base <= 1.0 {
            bail!("retry.backoff_base must be greater than 1.0");
        }
        if self.bot.selection_mode == SelectionMode::FromFeed && self.bot.feed.is_empty() {
            bail!("bot.feed must list candidate match ids when selection_mode is from_feed");
        }
        Ok(())
    }

    /// Resolve backend credentials from the configured env-var names.
    pub fn credentials(&self) -> Result<Credentials> {
        let username = std::env::var(&self.backend.username_env).with_context(|| {
            format!("Environment variable not set: {}", self.backend.username_env)
        })?;
        let password = std::env::var(&self.backend.password_env).with_context(|| {
            format!("Environment variable not set: {}", self.backend.password_env)
        })?;
        Ok(Credentials {
            username,
            password: SecretString::new(password),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SAMPLE: &str = r#"
        [bot]
        default_stake = 5.0
        max_legs = 4
        min_odds = 1.2
        selection_mode = "top"

        [backend]
        base_url = "https://mock-betting.local/api"
        username_env = "BOT_USERNAME"
        password_env = "BOT_PASSWORD"
        mock = true

        [retry]
        max_retries = 5
        backoff_base = 1.5
    "#;

    #[test]
    fn test_parse_sample() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.bot.default_stake, dec!(5.0));
        assert_eq!(cfg.bot.max_legs, 4);
        assert_eq!(cfg.bot.selection_mode, SelectionMode::Top);
        assert_eq!(cfg.bot.rebuild_attempts, 1);
        assert!(cfg.backend.mock);
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.base_delay_ms, 1000);

        // Sections with defaults may be omitted entirely.
        assert_eq!(cfg.confirm.poll_attempts, 3);
        assert_eq!(cfg.lock.path, "parlay.lock");
        assert_eq!(cfg.ledger.path, "placed_bets.jsonl");
        assert!(cfg.log.file.is_none());
    }

    #[test]
    fn test_rejects_single_leg_limit() {
        let mut cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.bot.max_legs = 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_stake() {
        let mut cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.bot.default_stake = dec!(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_flat_backoff() {
        let mut cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.retry.backoff_base = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_from_feed_without_feed() {
        let mut cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        cfg.bot.selection_mode = SelectionMode::FromFeed;
        assert!(cfg.validate().is_err());

        cfg.bot.feed = vec!["M001".to_string(), "M002".to_string()];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_credentials_resolution() {
        let cfg: AppConfig = toml::from_str(SAMPLE).unwrap();
        // Deliberately unset variables produce a context-carrying error.
        let missing = AppConfig {
            backend: BackendConfig {
                username_env: "PARLAY_TEST_UNSET_USER".to_string(),
                password_env: "PARLAY_TEST_UNSET_PASS".to_string(),
                ..cfg.backend.clone()
            },
            ..cfg
        };
        let err = missing.credentials().unwrap_err();
        assert!(err.to_string().contains("PARLAY_TEST_UNSET_USER"));
    }
}
