//! AMQP bridge to the chat gateway
//!
//! Chat lines arrive on a queue; outbound messages are published to a topic
//! exchange keyed by sender identity.

pub mod connection;
pub mod handlers;
pub mod messages;
pub mod publisher;

pub use connection::{AmqpConfig, AmqpConnection};
pub use handlers::ChatLineConsumer;
pub use messages::*;
pub use publisher::{AmqpChatSender, PublisherConfig};
