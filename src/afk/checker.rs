//! Two-phase inactivity check
//!
//! Phase one finds candidates and warns them. After the grace period the
//! same candidates are checked again and only those still inactive are
//! reported for removal.

use crate::dispatch::Dispatcher;
use crate::metrics::MetricsCollector;
use crate::services::IdentityService;
use crate::types::Nick;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Candidates from the warning pass and when to re-check them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAfkCheck {
    pub candidates: Vec<Nick>,
    pub deadline: Instant,
}

impl PendingAfkCheck {
    pub fn new(candidates: Vec<Nick>, grace: Duration) -> Self {
        Self {
            candidates,
            deadline: Instant::now() + grace,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

pub struct AfkChecker {
    identity: Arc<dyn IdentityService>,
    dispatcher: Dispatcher,
    threshold: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl AfkChecker {
    pub fn new(identity: Arc<dyn IdentityService>, dispatcher: Dispatcher, threshold: Duration) -> Self {
        Self {
            identity,
            dispatcher,
            threshold,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether the identity service considers a player inactive
    ///
    /// Unknown players and players idle past the threshold are inactive.
    /// Lookup failures count as active.
    pub async fn is_inactive(&self, nick: &str) -> bool {
        if let Err(e) = self.identity.refresh(nick).await {
            warn!("Failed to refresh presence for '{}': {}", nick, e);
            self.record_failure();
        }

        match self.identity.idle_time(nick).await {
            Ok(None) => {
                debug!("'{}' is unknown to the identity service", nick);
                true
            }
            Ok(Some(idle)) => idle > self.threshold,
            Err(e) => {
                warn!("Failed to query idle time for '{}': {}", nick, e);
                self.record_failure();
                false
            }
        }
    }

    /// Subset of `nicks` that is currently inactive, in the given order
    pub async fn find_inactive(&self, nicks: &[Nick]) -> Vec<Nick> {
        let mut inactive = Vec::new();
        for nick in nicks {
            if self.is_inactive(nick).await {
                inactive.push(nick.clone());
            }
        }
        inactive
    }

    /// Publicly list the candidates and privately warn each one
    pub fn warn(&self, candidates: &[Nick], grace: Duration) {
        info!("Warning {} player(s) as afk", candidates.len());
        self.dispatcher.message(format!(
            "The following players are considered afk: {}",
            candidates.join(", ")
        ));

        for nick in candidates {
            self.dispatcher.private(
                nick.as_str(),
                format!(
                    "Warning, you are considered afk by the bot. Say anything in the channel within the next {} seconds to avoid being removed.",
                    grace.as_secs()
                ),
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_afk_warnings(candidates.len());
        }
    }

    fn record_failure(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_collaborator_failure("identity");
        }
    }
}
