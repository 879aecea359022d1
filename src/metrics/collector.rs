//! Metrics collection using Prometheus
//!
//! Counters and gauges for the pug lobby: signups, draft progress, AFK
//! checks, outbound chat delivery and collaborator failures.

use crate::lifecycle::MatchStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle states exported as the `pug_room_match_state` gauge
const STATES: [&str; 5] = ["waiting", "afk_check", "draft_delay", "drafting", "complete"];

/// Main metrics collector for the pug service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    service_metrics: ServiceMetrics,
    match_metrics: MatchMetrics,
    dispatch_metrics: DispatchMetrics,
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Failures reported by identity, persistence or provisioning
    pub collaborator_failures_total: IntCounterVec,
}

/// Lobby and draft metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Signup attempts by outcome
    pub signups_total: IntCounterVec,

    /// Players currently signed up
    pub players_waiting: IntGauge,

    /// Accepted picks
    pub picks_total: IntCounter,

    /// Drafts that ran to completion
    pub drafts_completed_total: IntCounter,

    /// Drafts ended early by an admin
    pub drafts_aborted_total: IntCounter,

    /// Players warned during the first AFK pass
    pub afk_warnings_total: IntCounter,

    /// Players removed by the second AFK pass
    pub afk_removals_total: IntCounter,

    /// Commands rejected with a private notice, by error kind
    pub rejected_commands_total: IntCounterVec,

    /// 1 for the current lifecycle state, 0 for the others
    pub match_state: IntGaugeVec,

    /// Match records waiting for manual reconciliation
    pub unreconciled_matches: IntGauge,
}

/// Outbound chat metrics
#[derive(Clone)]
pub struct DispatchMetrics {
    /// Messages sent per sender identity
    pub messages_sent_total: IntCounterVec,

    /// Failed sends per sender identity
    pub send_failures_total: IntCounterVec,

    /// Entries waiting in the outbound queue
    pub queue_depth: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time spent handling one chat command
    pub command_duration: Histogram,

    /// Time from captain selection to final pick
    pub draft_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let dispatch_metrics = DispatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            match_metrics,
            dispatch_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn dispatch(&self) -> &DispatchMetrics {
        &self.dispatch_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh gauges from a state machine snapshot
    pub fn update_from_match_stats(&self, stats: &MatchStats) {
        self.match_metrics
            .players_waiting
            .set(stats.signups as i64);
        self.match_metrics
            .unreconciled_matches
            .set(stats.unreconciled_matches as i64);
        self.set_state(&stats.state);
    }

    /// Mark the current lifecycle state
    pub fn set_state(&self, state: &str) {
        for known in STATES {
            self.match_metrics
                .match_state
                .with_label_values(&[known])
                .set(if known == state { 1 } else { 0 });
        }
    }

    /// Record a signup attempt ("added", "updated", "rejected", "removed")
    pub fn record_signup(&self, outcome: &str) {
        self.match_metrics
            .signups_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_pick(&self) {
        self.match_metrics.picks_total.inc();
    }

    pub fn record_draft_completed(&self, duration: Duration) {
        self.match_metrics.drafts_completed_total.inc();
        self.performance_metrics
            .draft_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_draft_aborted(&self) {
        self.match_metrics.drafts_aborted_total.inc();
    }

    pub fn record_afk_warnings(&self, count: usize) {
        self.match_metrics.afk_warnings_total.inc_by(count as u64);
    }

    pub fn record_afk_removals(&self, count: usize) {
        self.match_metrics.afk_removals_total.inc_by(count as u64);
    }

    /// Record a command rejected back to the requester
    pub fn record_rejected_command(&self, kind: &str) {
        self.match_metrics
            .rejected_commands_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a failure reported by an external collaborator
    pub fn record_collaborator_failure(&self, collaborator: &str) {
        self.service_metrics
            .collaborator_failures_total
            .with_label_values(&[collaborator])
            .inc();
    }

    /// Record one outbound message delivery attempt
    pub fn record_message_sent(&self, identity: &str, success: bool) {
        if success {
            self.dispatch_metrics
                .messages_sent_total
                .with_label_values(&[identity])
                .inc();
        } else {
            self.dispatch_metrics
                .send_failures_total
                .with_label_values(&[identity])
                .inc();
        }
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.dispatch_metrics.queue_depth.set(depth as i64);
    }

    /// Record handling time for one chat command
    pub fn record_command(&self, duration: Duration) {
        self.performance_metrics
            .command_duration
            .observe(duration.as_secs_f64());
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("pug_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new("pug_room_amqp_messages_total", "Total AMQP messages processed"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("pug_room_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "pug_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pug_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let collaborator_failures_total = IntCounterVec::new(
            Opts::new(
                "pug_room_collaborator_failures_total",
                "Failures reported by external collaborators",
            ),
            &["collaborator"],
        )?;
        registry.register(Box::new(collaborator_failures_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
            collaborator_failures_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let signups_total = IntCounterVec::new(
            Opts::new("pug_room_signups_total", "Signup attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(signups_total.clone()))?;

        let players_waiting =
            IntGauge::new("pug_room_players_waiting", "Players currently signed up")?;
        registry.register(Box::new(players_waiting.clone()))?;

        let picks_total = IntCounter::new("pug_room_picks_total", "Accepted picks")?;
        registry.register(Box::new(picks_total.clone()))?;

        let drafts_completed_total = IntCounter::new(
            "pug_room_drafts_completed_total",
            "Drafts that ran to completion",
        )?;
        registry.register(Box::new(drafts_completed_total.clone()))?;

        let drafts_aborted_total = IntCounter::new(
            "pug_room_drafts_aborted_total",
            "Drafts ended early with !endgame",
        )?;
        registry.register(Box::new(drafts_aborted_total.clone()))?;

        let afk_warnings_total =
            IntCounter::new("pug_room_afk_warnings_total", "Players warned as afk")?;
        registry.register(Box::new(afk_warnings_total.clone()))?;

        let afk_removals_total =
            IntCounter::new("pug_room_afk_removals_total", "Players removed as afk")?;
        registry.register(Box::new(afk_removals_total.clone()))?;

        let rejected_commands_total = IntCounterVec::new(
            Opts::new(
                "pug_room_rejected_commands_total",
                "Commands rejected with a notice",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(rejected_commands_total.clone()))?;

        let match_state = IntGaugeVec::new(
            Opts::new("pug_room_match_state", "Current lifecycle state"),
            &["state"],
        )?;
        registry.register(Box::new(match_state.clone()))?;

        let unreconciled_matches = IntGauge::new(
            "pug_room_unreconciled_matches",
            "Match records that failed to persist",
        )?;
        registry.register(Box::new(unreconciled_matches.clone()))?;

        Ok(Self {
            signups_total,
            players_waiting,
            picks_total,
            drafts_completed_total,
            drafts_aborted_total,
            afk_warnings_total,
            afk_removals_total,
            rejected_commands_total,
            match_state,
            unreconciled_matches,
        })
    }
}

impl DispatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let messages_sent_total = IntCounterVec::new(
            Opts::new("pug_room_messages_sent_total", "Chat messages sent"),
            &["identity"],
        )?;
        registry.register(Box::new(messages_sent_total.clone()))?;

        let send_failures_total = IntCounterVec::new(
            Opts::new("pug_room_send_failures_total", "Failed chat sends"),
            &["identity"],
        )?;
        registry.register(Box::new(send_failures_total.clone()))?;

        let queue_depth = IntGauge::new(
            "pug_room_dispatch_queue_depth",
            "Entries waiting in the outbound queue",
        )?;
        registry.register(Box::new(queue_depth.clone()))?;

        Ok(Self {
            messages_sent_total,
            send_failures_total,
            queue_depth,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let command_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pug_room_command_duration_seconds",
                "Chat command handling time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        let draft_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pug_room_draft_duration_seconds",
                "Time from captain selection to the final pick",
            )
            .buckets(vec![30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        )?;
        registry.register(Box::new(draft_duration.clone()))?;

        Ok(Self {
            command_duration,
            draft_duration,
        })
    }
}
