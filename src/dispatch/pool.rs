//! Paced dispatch loop rotating through sender identities
//!
//! Each entry goes out through the identity at the front of the pool, which
//! then moves to the back. The loop sleeps `1 / (rate × pool size)` between
//! sends so every identity stays under its own message rate.

use super::queue::Dispatcher;
use super::sender::ChatSender;
use crate::config::DispatchSettings;
use crate::error::{PugError, PugResult};
use crate::metrics::MetricsCollector;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Pause between two sends for a pool of identities
pub fn send_interval(max_messages_per_second: f64, pool_size: usize) -> Duration {
    let rate = max_messages_per_second * pool_size.max(1) as f64;
    Duration::from_secs_f64(1.0 / rate)
}

/// Drains a [`Dispatcher`] through a rotating pool of [`ChatSender`]s
pub struct DispatchLoop {
    dispatcher: Dispatcher,
    senders: VecDeque<Arc<dyn ChatSender>>,
    interval: Duration,
    idle_poll: Duration,
    running: Arc<AtomicBool>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl DispatchLoop {
    pub fn new(
        dispatcher: Dispatcher,
        senders: Vec<Arc<dyn ChatSender>>,
        settings: &DispatchSettings,
        running: Arc<AtomicBool>,
    ) -> PugResult<Self> {
        if senders.is_empty() {
            return Err(PugError::ConfigurationError {
                message: "Dispatch loop needs at least one sender".to_string(),
            });
        }
        let mps = settings.max_messages_per_second;
        if !(mps.is_finite() && mps > 0.0) {
            return Err(PugError::ConfigurationError {
                message: "max_messages_per_second must be a positive number".to_string(),
            });
        }

        Ok(Self {
            interval: send_interval(settings.max_messages_per_second, senders.len()),
            idle_poll: Duration::from_millis(settings.idle_poll_ms),
            senders: senders.into(),
            dispatcher,
            running,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn send_interval(&self) -> Duration {
        self.interval
    }

    /// Identities in current rotation order
    pub fn identities(&self) -> Vec<String> {
        self.senders
            .iter()
            .map(|sender| sender.identity().to_string())
            .collect()
    }

    /// Send the entry at the front of the queue, if any
    ///
    /// Returns `true` when an entry was taken. A failed send is logged and
    /// dropped; the identity still rotates to the back.
    pub async fn dispatch_next(&mut self) -> bool {
        let Some(entry) = self.dispatcher.pop() else {
            return false;
        };
        let Some(sender) = self.senders.pop_front() else {
            return false;
        };

        let identity = sender.identity().to_string();
        let result = sender.send(&entry).await;
        self.senders.push_back(sender);

        match &result {
            Ok(()) => debug!("{} sent to {}", identity, entry.to),
            Err(e) => warn!("{} failed to send to {}: {}", identity, entry.to, e),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_message_sent(&identity, result.is_ok());
            metrics.set_queue_depth(self.dispatcher.len());
        }

        true
    }

    /// Run until the running flag clears
    pub async fn run(mut self) {
        info!(
            "Dispatch loop started with {} sender(s), interval {:?}",
            self.senders.len(),
            self.interval
        );

        while self.running.load(Ordering::SeqCst) {
            if self.dispatch_next().await {
                sleep(self.interval).await;
            } else {
                sleep(self.idle_poll).await;
            }
        }

        info!(
            "Dispatch loop stopped with {} entries still queued",
            self.dispatcher.len()
        );
    }
}
