//! AMQP chat sender
//!
//! Each sender identity publishes to the outbound exchange with its own
//! routing key, so the gateway can deliver through the matching bot
//! connection.

use crate::amqp::messages::{MessageEnvelope, MessageUtils, OutboundChat};
use crate::dispatch::ChatSender;
use crate::error::{PugError, Result};
use crate::types::DispatchEntry;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for outbound publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub publish_timeout_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            publish_timeout_ms: 5000,
        }
    }
}

/// Publishes outbound chat for one sender identity
pub struct AmqpChatSender {
    channel: Channel,
    exchange: String,
    identity: String,
    chat_channel: String,
    routing_key: String,
    config: PublisherConfig,
}

impl AmqpChatSender {
    /// Create a sender and declare the outbound exchange
    pub async fn new(
        channel: Channel,
        exchange: &str,
        identity: &str,
        chat_channel: &str,
        config: PublisherConfig,
    ) -> Result<Self> {
        let sender = Self {
            channel,
            exchange: exchange.to_string(),
            identity: identity.to_string(),
            chat_channel: chat_channel.to_string(),
            routing_key: MessageUtils::outbound_routing_key(identity),
            config,
        };

        sender.setup_exchange().await?;
        Ok(sender)
    }

    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.exchange, "topic")
            .durable(true)
            .finish();
        self.channel
            .exchange_declare(args)
            .await
            .map_err(|e| PugError::AmqpConnectionFailed {
                message: format!("Failed to declare exchange {}: {}", self.exchange, e),
            })?;

        info!(
            "{} publishing to {} with key {}",
            self.identity, self.exchange, self.routing_key
        );
        Ok(())
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    async fn publish_with_retry(&self, envelope: &MessageEnvelope<OutboundChat>) -> Result<()> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(()) => {
                    debug!(
                        "Published {} via {}",
                        envelope.correlation_id, self.identity
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(5000));
                }
            }
        }
    }

    async fn try_publish(&self, envelope: &MessageEnvelope<OutboundChat>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        let publish = self.channel.basic_publish(properties, payload, args);
        tokio::time::timeout(Duration::from_millis(self.config.publish_timeout_ms), publish)
            .await
            .map_err(|_| PugError::TransportFailed {
                message: "Publish timed out".to_string(),
            })?
            .map_err(|e| PugError::TransportFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl ChatSender for AmqpChatSender {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn send(&self, entry: &DispatchEntry) -> Result<()> {
        let chat = OutboundChat::from_entry(&self.identity, &self.chat_channel, entry);
        let envelope = MessageEnvelope::new(chat, self.routing_key.clone());
        self.publish_with_retry(&envelope).await
    }
}
