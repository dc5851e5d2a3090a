//! Durable bet record sink.
//!
//! One JSON object per line, append-only, never rewritten. Each append
//! opens the file in append mode so records land atomically enough for
//! out-of-band tooling to tail or append alongside the bot.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::types::BetRecord;

/// Where terminal bet records go. The pipeline writes exactly one record
/// per run through this seam; tests substitute an in-memory sink.
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &BetRecord) -> Result<()>;
}

/// JSONL file-backed sink.
pub struct BetLedger {
    path: PathBuf,
}

impl BetLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSink for BetLedger {
    fn append(&self, record: &BetRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create ledger directory {}", parent.display())
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;

        let line = serde_json::to_string(record).context("Failed to serialise bet record")?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append to ledger {}", self.path.display()))?;

        info!(path = %self.path.display(), status = %record.status, "Bet record persisted");
        Ok(())
    }
}

/// Buffering sink for tests.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<BetRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<BetRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: &BetRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
