//! AMQP consumer for inbound chat lines
//!
//! Deliveries are decoded into [`ChatLine`]s and forwarded, in delivery
//! order, to the task that owns the state machine.

use crate::amqp::messages::MessageUtils;
use crate::error::{PugError, Result};
use crate::metrics::MetricsCollector;
use crate::types::ChatLine;
use amqprs::{
    channel::{BasicCancelArguments, BasicConsumeArguments, Channel, QueueDeclareArguments},
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Consumer for the inbound chat queue
pub struct ChatLineConsumer {
    channel: Channel,
    consumer_tag: String,
    sender: mpsc::Sender<ChatLine>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ChatLineConsumer {
    pub fn new(channel: Channel, sender: mpsc::Sender<ChatLine>) -> Self {
        Self {
            channel,
            consumer_tag: format!("pug-room-{}", uuid::Uuid::new_v4()),
            sender,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Declare the queue and start consuming
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let declare = QueueDeclareArguments::new(queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();
        self.channel
            .queue_declare(declare)
            .await
            .map_err(|e| PugError::AmqpConnectionFailed {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            })?;

        let args = BasicConsumeArguments::new(queue_name, &self.consumer_tag)
            .manual_ack(false)
            .finish();
        let consumer = ChatDelivery {
            sender: self.sender.clone(),
            metrics: self.metrics.clone(),
        };

        self.channel
            .basic_consume(consumer, args)
            .await
            .map_err(|e| PugError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming chat lines from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel
            .basic_cancel(args)
            .await
            .map_err(|e| PugError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            })?;

        info!("Stopped consuming chat lines");
        Ok(())
    }
}

/// Per-delivery handler registered with the channel
struct ChatDelivery {
    sender: mpsc::Sender<ChatLine>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ChatDelivery {
    async fn forward(&self, content: &[u8]) -> Result<()> {
        let line = MessageUtils::deserialize_chat_line(content)?;
        debug!("Chat from {}: {}", line.nick, line.text);

        self.sender
            .send(line)
            .await
            .map_err(|_| PugError::InternalError {
                message: "Chat event channel closed".to_string(),
            })?;
        Ok(())
    }
}

#[async_trait]
impl AsyncConsumer for ChatDelivery {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        let result = self.forward(&content).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_amqp_operation("consume", result.is_ok());
        }

        if let Err(e) = result {
            match e.downcast_ref::<PugError>() {
                Some(PugError::InternalError { .. }) => {
                    error!("Dropping delivery {}: {}", delivery_tag, e)
                }
                _ => {
                    let preview_len = content.len().min(100);
                    warn!(
                        "Ignoring malformed delivery {}: {} ({:?})",
                        delivery_tag,
                        e,
                        String::from_utf8_lossy(&content[..preview_len])
                    );
                }
            }
        }
    }
}
