//! Cross-invocation run lock.
//!
//! A lock file guards against overlapping scheduled runs: `acquire`
//! creates it atomically (`create_new`, so of two concurrent acquirers
//! exactly one wins) and the returned guard removes it on drop, covering
//! every exit path. A run that died without releasing leaves the file
//! behind; once its timestamp is older than the staleness window the next
//! invocation reclaims it instead of deadlocking forever.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Contents of the lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Process-wide mutual exclusion over a lock file path.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
    stale_after: Duration,
}

impl RunLock {
    pub fn new(path: impl AsRef<Path>, stale_after: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stale_after,
        }
    }

    /// Try to take the lock.
    ///
    /// Returns `Ok(None)` — not an error — when another run holds a live
    /// lock. A lock older than the staleness window (or one whose contents
    /// can't be read back) is treated as abandoned and reclaimed.
    pub fn acquire(&self) -> Result<Option<LockGuard>> {
        if let Some(guard) = self.try_create()? {
            return Ok(Some(guard));
        }

        match self.held_since()? {
            Some(acquired_at) => {
                let age = Utc::now() - acquired_at;
                if age.to_std().unwrap_or(Duration::ZERO) < self.stale_after {
                    debug!(path = %self.path.display(), %acquired_at, "Lock held by a live run");
                    return Ok(None);
                }
                warn!(
                    path = %self.path.display(),
                    %acquired_at,
                    "Reclaiming stale lock from a crashed run"
                );
            }
            // Unreadable or half-written lock file: reclaim it.
            None => warn!(path = %self.path.display(), "Reclaiming unreadable lock file"),
        }

        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove stale lock {}", self.path.display()))?;

        // Another invocation may have reclaimed it first; losing that race
        // is the same as finding a live lock.
        self.try_create()
    }

    /// Atomically create the lock file. `None` if it already exists.
    fn try_create(&self) -> Result<Option<LockGuard>> {
        let created = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);

        let mut file = match created {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create lock {}", self.path.display()))
            }
        };

        let info = LockInfo {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let json = serde_json::to_string(&info).context("Failed to serialise lock info")?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write lock {}", self.path.display()))?;

        info!(path = %self.path.display(), pid = info.pid, "Run lock acquired");
        Ok(Some(LockGuard {
            path: self.path.clone(),
        }))
    }

    /// Timestamp of the current holder, if the file parses.
    fn held_since(&self) -> Result<Option<DateTime<Utc>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read lock {}", self.path.display()))
            }
        };
        Ok(serde_json::from_str::<LockInfo>(&contents)
            .ok()
            .map(|info| info.acquired_at))
    }
}

/// Held lock; releases on drop so every exit path frees it.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            // Already-gone is fine (a reclaim beat us to it after a stall).
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to release run lock");
            }
        } else {
            debug!(path = %self.path.display(), "Run lock released");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
