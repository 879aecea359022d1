//! Match recording
//!
//! Completed drafts are handed to a recorder exactly once. A recorder failure
//! never undoes the in-memory finalization; the caller keeps the record for
//! manual reconciliation.

use crate::error::{PugError, Result};
use crate::types::MatchRecord;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Trait for persisting completed matches
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    /// Store a completed match
    async fn record_match(&self, record: &MatchRecord) -> Result<()>;

    /// Number of recorded matches the nick played in
    async fn games_played(&self, nick: &str) -> Result<u64>;
}

/// In-memory recorder, mainly for tests and console runs
#[derive(Debug, Default)]
pub struct InMemoryMatchRecorder {
    records: RwLock<Vec<MatchRecord>>,
    failing: AtomicBool,
}

impl InMemoryMatchRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All stored records
    pub fn records(&self) -> Vec<MatchRecord> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MatchRecorder for InMemoryMatchRecorder {
    async fn record_match(&self, record: &MatchRecord) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PugError::PersistenceFailed {
                message: "recorder unavailable".to_string(),
            }
            .into());
        }

        let mut records = self.records.write().map_err(|_| PugError::InternalError {
            message: "Failed to acquire records lock".to_string(),
        })?;
        records.push(record.clone());
        debug!("Stored match {} in memory", record.match_id);
        Ok(())
    }

    async fn games_played(&self, nick: &str) -> Result<u64> {
        let records = self.records.read().map_err(|_| PugError::InternalError {
            message: "Failed to acquire records lock".to_string(),
        })?;
        Ok(records.iter().filter(|record| record.played(nick)).count() as u64)
    }
}

/// Recorder appending one JSON document per line to a file
#[derive(Debug, Clone)]
pub struct JsonLinesMatchRecorder {
    path: PathBuf,
}

impl JsonLinesMatchRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MatchRecorder for JsonLinesMatchRecorder {
    async fn record_match(&self, record: &MatchRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record).map_err(|e| PugError::PersistenceFailed {
            message: format!("Failed to serialize match record: {}", e),
        })?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| PugError::PersistenceFailed {
                message: format!("Failed to open {}: {}", self.path.display(), e),
            })?;

        file.write_all(&line)
            .await
            .map_err(|e| PugError::PersistenceFailed {
                message: format!("Failed to write {}: {}", self.path.display(), e),
            })?;

        info!(
            "Recorded match {} ({} players) to {}",
            record.match_id,
            record.player_count(),
            self.path.display()
        );
        Ok(())
    }

    async fn games_played(&self, nick: &str) -> Result<u64> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(PugError::PersistenceFailed {
                    message: format!("Failed to read {}: {}", self.path.display(), e),
                }
                .into())
            }
        };

        let mut games = 0;
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            let record: MatchRecord =
                serde_json::from_str(line).map_err(|e| PugError::PersistenceFailed {
                    message: format!("Corrupt match record in {}: {}", self.path.display(), e),
                })?;
            if record.played(nick) {
                games += 1;
            }
        }
        Ok(games)
    }
}
