//! parlay — automated accumulator betting bot.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! takes the cross-invocation run lock, and drives a single pipeline run
//! to a terminal state. Designed to be fired from cron: overlapping
//! invocations skip cleanly, failures exit non-zero with the failure
//! kind in the log stream.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use parlay::backend::mock::MockBackend;
use parlay::backend::rest::RestBackend;
use parlay::backend::BettingBackend;
use parlay::config::AppConfig;
use parlay::ledger::BetLedger;
use parlay::lock::RunLock;
use parlay::pipeline::{PipelineConfig, RunPipeline};
use parlay::retry::RetryPolicy;
use parlay::types::RunState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    let _log_guard = init_logging(&cfg);

    info!(
        config = %config_path,
        backend = if cfg.backend.mock { "mock" } else { "rest" },
        stake = %cfg.bot.default_stake,
        max_legs = cfg.bot.max_legs,
        min_odds = %cfg.bot.min_odds,
        "parlay starting up"
    );

    // -- Run lock ---------------------------------------------------------

    let lock = RunLock::new(
        &cfg.lock.path,
        Duration::from_secs(cfg.lock.stale_after_secs),
    );
    let Some(_guard) = lock.acquire()? else {
        // Distinct, non-error outcome: the schedule fired while a previous
        // run is still live.
        warn!(lock = %cfg.lock.path, "Another run is active — skipping this invocation");
        return Ok(());
    };

    // -- Assemble the pipeline -------------------------------------------

    let credentials = cfg.credentials()?;

    let backend: Arc<dyn BettingBackend> = if cfg.backend.mock {
        Arc::new(MockBackend::new())
    } else {
        Arc::new(
            RestBackend::new(&cfg.backend.base_url)
                .context("Failed to build REST backend client")?,
        )
    };

    let sink = Arc::new(BetLedger::new(&cfg.ledger.path));

    let retry = RetryPolicy::with_delays(
        cfg.retry.max_retries,
        cfg.retry.backoff_base,
        Duration::from_millis(cfg.retry.base_delay_ms),
        Duration::from_millis(cfg.retry.max_jitter_ms),
    );

    let pipeline = RunPipeline::new(
        backend,
        sink,
        retry,
        credentials,
        PipelineConfig {
            stake: cfg.bot.default_stake,
            min_odds: cfg.bot.min_odds,
            max_legs: cfg.bot.max_legs,
            policy: cfg.bot.policy(),
            rebuild_attempts: cfg.bot.rebuild_attempts,
            confirm_polls: cfg.confirm.poll_attempts,
            confirm_delay: Duration::from_millis(cfg.confirm.poll_delay_ms),
        },
    );

    // -- Run --------------------------------------------------------------

    let report = pipeline.run().await?;

    info!(
        state = %report.state,
        status = %report.record.status,
        bet_id = report.record.bet_id.as_deref().unwrap_or("-"),
        "parlay run summary"
    );

    if report.state == RunState::Failed {
        anyhow::bail!(
            "run failed: {}",
            report
                .record
                .error
                .as_deref()
                .unwrap_or(&report.record.status)
        );
    }
    Ok(())
}

/// Initialise the `tracing` subscriber: console always, optional JSON
/// format, optional log file alongside.
fn init_logging(cfg: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parlay=info"));

    let file_layer = cfg.log.file.as_deref().map(|path| {
        let path = std::path::Path::new(path);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let appender =
            tracing_appender::rolling::never(dir.unwrap_or(std::path::Path::new(".")), name);
        tracing_appender::non_blocking(appender)
    });

    match file_layer {
        Some((writer, guard)) => {
            let registry = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(writer).with_ansi(false));
            if cfg.log.json {
                registry.with(fmt::layer().json()).init();
            } else {
                registry.with(fmt::layer()).init();
            }
            Some(guard)
        }
        None => {
            if cfg.log.json {
                fmt().json().with_env_filter(env_filter).init();
            } else {
                fmt().with_env_filter(env_filter).init();
            }
            None
        }
    }
}
