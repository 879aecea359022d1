//! AMQP message definitions and serialization
//!
//! The chat gateway publishes every channel line to the inbound queue and
//! consumes outbound messages from a topic exchange, one routing key per
//! sender identity.

use crate::error::{PugError, Result};
use crate::types::{ChatLine, DispatchEntry, Recipient};
use serde::{Deserialize, Serialize};

/// Routing key prefix for outbound chat
pub const OUTBOUND_ROUTING_PREFIX: &str = "chat.send";

/// Message envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            PugError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            PugError::TransportFailed {
                message: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Outbound chat message handed to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundChat {
    /// Bot identity that must send the message
    pub identity: String,
    /// Channel the lobby lives in
    pub channel: String,
    pub to: Recipient,
    pub body: String,
    pub notice: bool,
}

impl OutboundChat {
    pub fn from_entry(identity: &str, channel: &str, entry: &DispatchEntry) -> Self {
        Self {
            identity: identity.to_string(),
            channel: channel.to_string(),
            to: entry.to.clone(),
            body: entry.body.clone(),
            notice: entry.notice,
        }
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize and validate an inbound chat line
    pub fn deserialize_chat_line(bytes: &[u8]) -> Result<ChatLine> {
        let line: ChatLine =
            serde_json::from_slice(bytes).map_err(|e| PugError::TransportFailed {
                message: format!("Failed to deserialize chat line: {}", e),
            })?;

        Self::validate_chat_line(&line)?;
        Ok(line)
    }

    pub fn validate_chat_line(line: &ChatLine) -> Result<()> {
        if line.nick.trim().is_empty() {
            return Err(PugError::TransportFailed {
                message: "Chat line has an empty nick".to_string(),
            }
            .into());
        }

        if line.nick.chars().any(char::is_whitespace) {
            return Err(PugError::TransportFailed {
                message: format!("Invalid nick '{}'", line.nick),
            }
            .into());
        }

        Ok(())
    }

    /// Routing key the gateway binds for one sender identity
    pub fn outbound_routing_key(identity: &str) -> String {
        format!("{}.{}", OUTBOUND_ROUTING_PREFIX, identity.to_lowercase())
    }
}
