//! Health check reporting
//!
//! The machine task publishes a [`MatchStats`] snapshot into the shared
//! [`ServiceStatus`] after every event; health checks read that snapshot
//! and never touch the machine itself.

use crate::lifecycle::MatchStats;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Value exported through the `health_status` gauge
    pub fn gauge_value(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if other.gauge_value() < self.gauge_value() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// State shared between the service tasks and the health server
#[derive(Debug)]
pub struct ServiceStatus {
    service_name: String,
    running: Arc<AtomicBool>,
    transport_alive: AtomicBool,
    stats: RwLock<Option<MatchStats>>,
    started: Instant,
}

impl ServiceStatus {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            transport_alive: AtomicBool::new(true),
            stats: RwLock::new(None),
            started: Instant::now(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flag shared with loops that stop when the service does
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn set_transport_alive(&self, alive: bool) {
        self.transport_alive.store(alive, Ordering::SeqCst);
    }

    pub fn transport_alive(&self) -> bool {
        self.transport_alive.load(Ordering::SeqCst)
    }

    /// Replace the latest state machine snapshot
    pub fn publish_stats(&self, stats: MatchStats) {
        if let Ok(mut current) = self.stats.write() {
            *current = Some(stats);
        }
    }

    pub fn stats(&self) -> Option<MatchStats> {
        self.stats.read().ok().and_then(|stats| stats.clone())
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: Option<MatchStats>,
    pub uptime_seconds: u64,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when the component is not healthy
    pub message: Option<String>,
}

impl HealthCheck {
    /// Full check of every component
    pub fn check(status: &ServiceStatus) -> Self {
        let checks = vec![
            Self::check_service_running(status),
            Self::check_match(status),
            Self::check_transport(status),
        ];
        let overall = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

        HealthCheck {
            status: overall,
            service: status.service_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: status.stats(),
            uptime_seconds: status.uptime_seconds(),
        }
    }

    /// Liveness: the service is running
    pub fn liveness_check(status: &ServiceStatus) -> HealthStatus {
        if status.is_running() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Readiness: running and the machine has reported in
    pub fn readiness_check(status: &ServiceStatus) -> HealthStatus {
        if !status.is_running() {
            return HealthStatus::Unhealthy;
        }
        Self::check_match(status)
            .status
            .worst(Self::check_transport(status).status)
    }

    fn check_service_running(status: &ServiceStatus) -> ComponentCheck {
        let (health, message) = if status.is_running() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status: health,
            message,
        }
    }

    fn check_match(status: &ServiceStatus) -> ComponentCheck {
        let (health, message) = match status.stats() {
            None => (
                HealthStatus::Unhealthy,
                Some("State machine has not reported".to_string()),
            ),
            Some(stats) if stats.unreconciled_matches > 0 => (
                HealthStatus::Degraded,
                Some(format!(
                    "{} match record(s) awaiting reconciliation",
                    stats.unreconciled_matches
                )),
            ),
            Some(_) => (HealthStatus::Healthy, None),
        };

        ComponentCheck {
            name: "match".to_string(),
            status: health,
            message,
        }
    }

    fn check_transport(status: &ServiceStatus) -> ComponentCheck {
        let (health, message) = if status.transport_alive() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Degraded,
                Some("Chat transport connection lost".to_string()),
            )
        };

        ComponentCheck {
            name: "transport".to_string(),
            status: health,
            message,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
