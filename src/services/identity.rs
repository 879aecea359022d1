//! Identity and presence service
//!
//! The AFK checker and signup flow ask this service whether a nick is
//! authorized with the chat network and how long it has been idle.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Trait for the chat network's identity/presence service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Whether the nick is registered and authenticated
    async fn is_authorized(&self, nick: &str) -> Result<bool>;

    /// Time since the nick was last active; `None` if the nick is unknown
    async fn idle_time(&self, nick: &str) -> Result<Option<Duration>>;

    /// Re-query the network for fresh presence data
    async fn refresh(&self, nick: &str) -> Result<()>;
}

/// In-process presence tracker fed by channel activity
///
/// Every chat line counts as activity. A nick that has never spoken is
/// unknown. Authorization is granted explicitly, or to everyone when
/// `authorize_all` is set. With a retention window, [`prune`](Self::prune)
/// drops nicks idle for longer than the window.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    last_seen: RwLock<HashMap<String, Instant>>,
    authorized: RwLock<HashSet<String>>,
    authorize_all: bool,
    retention: Option<Duration>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that treats every nick as authorized
    pub fn authorize_all() -> Self {
        Self {
            authorize_all: true,
            ..Self::default()
        }
    }

    /// Keep activity only for nicks seen within `retention`
    ///
    /// A pruned nick reads as unknown, so the window should be no shorter
    /// than the AFK threshold.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Record activity for a nick
    pub fn record_activity(&self, nick: &str) {
        if let Ok(mut seen) = self.last_seen.write() {
            seen.insert(nick.to_lowercase(), Instant::now());
        }
    }

    /// Forget a nick entirely (it becomes unknown)
    pub fn forget(&self, nick: &str) {
        if let Ok(mut seen) = self.last_seen.write() {
            seen.remove(&nick.to_lowercase());
        }
    }

    /// Grant authorization to a nick
    pub fn authorize(&self, nick: &str) {
        if let Ok(mut authorized) = self.authorized.write() {
            authorized.insert(nick.to_lowercase());
        }
    }

    /// Number of nicks with recorded activity
    pub fn tracked_count(&self) -> usize {
        self.last_seen.read().map(|seen| seen.len()).unwrap_or(0)
    }

    /// Drop nicks idle past the retention window, returning how many went
    pub fn prune(&self) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let Ok(mut seen) = self.last_seen.write() else {
            return 0;
        };

        let now = Instant::now();
        let before = seen.len();
        seen.retain(|_, last| now.saturating_duration_since(*last) <= retention);
        let pruned = before - seen.len();
        if pruned > 0 {
            debug!("Pruned {} idle nick(s) from presence", pruned);
        }
        pruned
    }
}

#[async_trait]
impl IdentityService for PresenceTracker {
    async fn is_authorized(&self, nick: &str) -> Result<bool> {
        if self.authorize_all {
            return Ok(true);
        }

        Ok(self
            .authorized
            .read()
            .map(|authorized| authorized.contains(&nick.to_lowercase()))
            .unwrap_or(false))
    }

    async fn idle_time(&self, nick: &str) -> Result<Option<Duration>> {
        let seen = self
            .last_seen
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire presence lock"))?;

        Ok(seen
            .get(&nick.to_lowercase())
            .map(|last| Instant::now().saturating_duration_since(*last)))
    }

    async fn refresh(&self, nick: &str) -> Result<()> {
        // Activity is pushed to us as chat arrives
        debug!("Presence refresh requested for '{}'", nick);
        Ok(())
    }
}
