//! Main application state and service coordination
//!
//! The state machine lives inside one task. Chat lines reach it through an
//! ordered mpsc channel fed by the AMQP consumer or the console reader, and
//! `tick()` runs on a fixed interval in the same task. Outbound messages
//! leave through the dispatch loop, a separate task draining the shared
//! [`Dispatcher`].

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::handlers::ChatLineConsumer;
use crate::amqp::publisher::{AmqpChatSender, PublisherConfig};
use crate::commands::CommandRouter;
use crate::config::AppConfig;
use crate::dispatch::{ChatSender, ConsoleSender, DispatchLoop, Dispatcher};
use crate::lifecycle::{Collaborators, MatchStateMachine};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::service::console;
use crate::service::health::{HealthCheck, ServiceStatus};
use crate::services::{
    InMemoryMatchRecorder, JsonLinesMatchRecorder, MatchRecorder, PresenceTracker,
    StaticServerProvisioner,
};
use crate::types::ChatLine;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Capacity of the inbound chat channel
const CHAT_CHANNEL_CAPACITY: usize = 256;

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Where chat comes from and goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// stdin/stdout
    Console,
    /// AMQP bridge to the chat gateway
    Amqp,
    /// Only the caller's chat handle feeds the machine; output is discarded
    Detached,
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    transport: Transport,
    status: Arc<ServiceStatus>,
    metrics_service: Arc<MetricsService>,
    dispatcher: Dispatcher,
    presence: Arc<PresenceTracker>,
    amqp_connection: Option<Arc<AmqpConnection>>,
    chat_consumer: Option<ChatLineConsumer>,
    chat_tx: mpsc::Sender<ChatLine>,
    chat_rx: Option<mpsc::Receiver<ChatLine>>,
    machine: Option<MatchStateMachine>,
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Build every component; nothing runs until [`AppState::start`]
    pub async fn new(config: AppConfig, transport: Transport) -> Result<Self, ServiceError> {
        info!(
            "Initializing {} on {} ({:?} transport)",
            config.service.name, config.service.channel, transport
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let status = Arc::new(ServiceStatus::new(&config.service.name));
        let metrics_service = Self::initialize_metrics(&config, status.clone())?;

        let amqp_connection = match transport {
            Transport::Amqp => Some(Self::initialize_amqp(&config).await?),
            Transport::Console | Transport::Detached => None,
        };

        let presence = Arc::new(
            match transport {
                Transport::Console | Transport::Detached => PresenceTracker::authorize_all(),
                Transport::Amqp => PresenceTracker::new(),
            }
            .with_retention(config.afk_threshold()),
        );
        for admin in &config.service.admins {
            presence.authorize(admin);
        }

        let dispatcher = Dispatcher::new();
        let machine = Self::initialize_machine(
            &config,
            presence.clone(),
            dispatcher.clone(),
            metrics_service.collector(),
        );
        status.publish_stats(machine.stats());

        let (chat_tx, chat_rx) = mpsc::channel(CHAT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            transport,
            status,
            metrics_service,
            dispatcher,
            presence,
            amqp_connection,
            chat_consumer: None,
            chat_tx,
            chat_rx: Some(chat_rx),
            machine: Some(machine),
            background_tasks: Vec::new(),
        })
    }

    /// Start the machine, the dispatch loop, the transport and health
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {}", self.config.service.name);
        self.status.set_running(true);

        self.start_metrics_service().await;
        self.start_dispatch_loop().await?;
        self.start_machine_task()?;
        self.start_transport().await?;
        self.start_health_task();

        info!("{} started", self.config.service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);
        self.status.set_running(false);

        if let Some(consumer) = &self.chat_consumer {
            if let Err(e) = consumer.stop_consuming().await {
                warn!("Failed to stop AMQP consumer: {}", e);
            }
        }

        self.stop_background_tasks().await;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        if let Some(stats) = self.status.stats() {
            info!("Final match statistics: {:?}", stats);
            if stats.unreconciled_matches > 0 {
                warn!(
                    "{} match record(s) were never saved",
                    stats.unreconciled_matches
                );
            }
        }

        info!("{} shutdown completed", self.config.service.name);
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn status(&self) -> Arc<ServiceStatus> {
        self.status.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn presence(&self) -> Arc<PresenceTracker> {
        self.presence.clone()
    }

    /// Handle for injecting chat lines into the machine task
    pub fn chat_sender(&self) -> mpsc::Sender<ChatLine> {
        self.chat_tx.clone()
    }

    fn initialize_metrics(
        config: &AppConfig,
        status: Arc<ServiceStatus>,
    ) -> Result<Arc<MetricsService>, ServiceError> {
        let collector = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let health_server =
            Arc::new(HealthServer::new(health_config, collector.clone()).with_status(status));

        Ok(Arc::new(MetricsService::new(collector, health_server)))
    }

    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.amqp.url);

        let amqp_config =
            AmqpConfig::from_settings(&config.amqp).map_err(|e| ServiceError::Configuration {
                message: format!("Failed to parse AMQP URL: {}", e),
            })?;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    fn initialize_machine(
        config: &AppConfig,
        presence: Arc<PresenceTracker>,
        dispatcher: Dispatcher,
        metrics: Arc<MetricsCollector>,
    ) -> MatchStateMachine {
        let recorder: Arc<dyn MatchRecorder> = match &config.service.match_log {
            Some(path) => {
                info!("Recording matches to {}", path);
                Arc::new(JsonLinesMatchRecorder::new(path))
            }
            None => Arc::new(InMemoryMatchRecorder::new()),
        };

        let collaborators = Collaborators {
            identity: presence,
            recorder,
            provisioner: Arc::new(StaticServerProvisioner::new(&config.server)),
        };

        MatchStateMachine::new(config.clone(), collaborators, dispatcher).with_metrics(metrics)
    }

    async fn start_metrics_service(&mut self) {
        let metrics_service = self.metrics_service.clone();
        let port = self.config.service.health_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        });
        self.background_tasks.push(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("Metrics service started on port {}", port);
    }

    async fn build_senders(&self) -> Result<Vec<Arc<dyn ChatSender>>, ServiceError> {
        let channel_name = &self.config.service.channel;
        let mut senders: Vec<Arc<dyn ChatSender>> = Vec::new();

        for identity in &self.config.dispatch.senders {
            match (self.transport, &self.amqp_connection) {
                (Transport::Amqp, Some(connection)) => {
                    let channel = connection
                        .connection()
                        .open_channel(None)
                        .await
                        .map_err(|e| ServiceError::AmqpConnection {
                            message: format!("Failed to open channel for {}: {}", identity, e),
                        })?;
                    let publisher_config = PublisherConfig {
                        max_retries: self.config.amqp.max_retry_attempts,
                        retry_delay_ms: self.config.amqp.retry_delay_ms,
                        ..PublisherConfig::default()
                    };
                    let sender = AmqpChatSender::new(
                        channel,
                        &self.config.amqp.outbound_exchange,
                        identity,
                        channel_name,
                        publisher_config,
                    )
                    .await
                    .map_err(|e| ServiceError::Initialization {
                        message: format!("Failed to set up sender {}: {}", identity, e),
                    })?;
                    senders.push(Arc::new(sender));
                }
                (Transport::Amqp, None) => {
                    return Err(ServiceError::Initialization {
                        message: "AMQP transport selected without a connection".to_string(),
                    })
                }
                (Transport::Console, _) => {
                    senders.push(Arc::new(ConsoleSender::new(identity, channel_name)))
                }
                (Transport::Detached, _) => {
                    senders.push(Arc::new(crate::dispatch::RecordingSender::new(identity)))
                }
            }
        }

        Ok(senders)
    }

    async fn start_dispatch_loop(&mut self) -> Result<(), ServiceError> {
        let senders = self.build_senders().await?;
        let dispatch_loop = DispatchLoop::new(
            self.dispatcher.clone(),
            senders,
            &self.config.dispatch,
            self.status.running_flag(),
        )
        .map_err(|e| ServiceError::Initialization {
            message: e.to_string(),
        })?
        .with_metrics(self.metrics_service.collector());

        info!(
            "Dispatching through {:?} every {:?}",
            dispatch_loop.identities(),
            dispatch_loop.send_interval()
        );
        self.background_tasks
            .push(tokio::spawn(dispatch_loop.run()));
        Ok(())
    }

    fn start_machine_task(&mut self) -> Result<(), ServiceError> {
        let (Some(machine), Some(chat_rx)) = (self.machine.take(), self.chat_rx.take()) else {
            return Err(ServiceError::BackgroundTask {
                message: "State machine task already started".to_string(),
            });
        };

        let handle = tokio::spawn(run_machine(
            machine,
            chat_rx,
            self.presence.clone(),
            self.status.clone(),
            self.metrics_service.collector(),
            self.config.tick_interval(),
        ));
        self.background_tasks.push(handle);
        Ok(())
    }

    async fn start_transport(&mut self) -> Result<(), ServiceError> {
        match self.transport {
            Transport::Amqp => {
                let connection =
                    self.amqp_connection
                        .clone()
                        .ok_or_else(|| ServiceError::Initialization {
                            message: "AMQP transport selected without a connection".to_string(),
                        })?;
                let channel = connection.connection().open_channel(None).await.map_err(|e| {
                    ServiceError::AmqpConnection {
                        message: format!("Failed to open consumer channel: {}", e),
                    }
                })?;

                let consumer = ChatLineConsumer::new(channel, self.chat_tx.clone())
                    .with_metrics(self.metrics_service.collector());
                consumer
                    .start_consuming(&self.config.amqp.inbound_queue)
                    .await
                    .map_err(|e| ServiceError::AmqpConnection {
                        message: format!("Failed to start consuming chat: {}", e),
                    })?;
                self.chat_consumer = Some(consumer);
            }
            Transport::Console => {
                let handle = tokio::spawn(console::read_stdin(self.chat_tx.clone()));
                self.background_tasks.push(handle);
            }
            Transport::Detached => {}
        }
        Ok(())
    }

    fn start_health_task(&mut self) {
        let collector = self.metrics_service.collector();
        let status = self.status.clone();
        let connection = self.amqp_connection.clone();
        let presence = self.presence.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(15));

            while status.is_running() {
                interval.tick().await;
                presence.prune();

                if let Some(connection) = &connection {
                    let alive = connection.is_alive();
                    if !alive && status.transport_alive() {
                        error!("AMQP connection lost");
                    }
                    status.set_transport_alive(alive);
                    collector.update_component_health("amqp", alive);
                }

                let health = HealthCheck::check(&status);
                collector
                    .service()
                    .uptime_seconds
                    .set(status.uptime_seconds() as i64);
                collector.update_health_status(health.status.gauge_value());
                collector.update_component_health("match", health.status.gauge_value() > 0);
                debug!("Health: {}", health.status);
            }
        });
        self.background_tasks.push(handle);
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("All {} background tasks stopped", task_count);
    }
}

/// Owns the state machine for the life of the service
async fn run_machine(
    mut machine: MatchStateMachine,
    mut chat_rx: mpsc::Receiver<ChatLine>,
    presence: Arc<PresenceTracker>,
    status: Arc<ServiceStatus>,
    metrics: Arc<MetricsCollector>,
    tick_interval: Duration,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("State machine task started in state {}", machine.state());

    while status.is_running() {
        tokio::select! {
            line = chat_rx.recv() => {
                let Some(line) = line else {
                    info!("Chat channel closed");
                    break;
                };
                handle_line(&mut machine, &presence, &metrics, &line).await;
            }
            _ = ticker.tick() => machine.tick().await,
        }

        status.publish_stats(machine.stats());
    }

    info!("State machine task stopped in state {}", machine.state());
}

async fn handle_line(
    machine: &mut MatchStateMachine,
    presence: &PresenceTracker,
    metrics: &MetricsCollector,
    line: &ChatLine,
) {
    presence.record_activity(&line.nick);

    let timer = metrics.start_timer();
    if let Some(result) = CommandRouter::route(machine, line).await {
        metrics.record_command(timer.stop());
        if let Err(e) = result {
            debug!("Command from {} rejected: {}", line.nick, e);
        }
    }
}
