//! Chat sender identities

use crate::error::{PugError, Result};
use crate::types::{DispatchEntry, Recipient};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// One outbound chat identity (a bot connection)
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Name the identity sends as
    fn identity(&self) -> &str;

    /// Deliver one entry
    async fn send(&self, entry: &DispatchEntry) -> Result<()>;
}

/// Sender that keeps everything it was asked to deliver
#[derive(Debug, Default)]
pub struct RecordingSender {
    identity: String,
    sent: Mutex<Vec<DispatchEntry>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            ..Self::default()
        }
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Entries delivered so far
    pub fn sent(&self) -> Vec<DispatchEntry> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatSender for RecordingSender {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn send(&self, entry: &DispatchEntry) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PugError::TransportFailed {
                message: format!("{} is disconnected", self.identity),
            }
            .into());
        }

        let mut sent = self.sent.lock().map_err(|_| PugError::InternalError {
            message: "Failed to acquire sent messages lock".to_string(),
        })?;
        sent.push(entry.clone());
        Ok(())
    }
}

/// Sender writing to stdout, used by the console transport
#[derive(Debug, Clone)]
pub struct ConsoleSender {
    identity: String,
    channel: String,
}

impl ConsoleSender {
    pub fn new(identity: &str, channel: &str) -> Self {
        Self {
            identity: identity.to_string(),
            channel: channel.to_string(),
        }
    }

    fn render(&self, entry: &DispatchEntry) -> String {
        match (&entry.to, entry.notice) {
            (Recipient::Channel, _) => format!("[{}] <{}> {}\n", self.channel, self.identity, entry.body),
            (Recipient::Player(nick), true) => {
                format!("-{}:{}- {}\n", self.identity, nick, entry.body)
            }
            (Recipient::Player(nick), false) => {
                format!("*{} -> {}* {}\n", self.identity, nick, entry.body)
            }
        }
    }
}

#[async_trait]
impl ChatSender for ConsoleSender {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn send(&self, entry: &DispatchEntry) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(self.render(entry).as_bytes())
            .await
            .map_err(|e| PugError::TransportFailed {
                message: format!("stdout write failed: {}", e),
            })?;
        stdout.flush().await?;
        Ok(())
    }
}
