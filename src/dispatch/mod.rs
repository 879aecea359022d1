//! Rate-limited outbound chat

pub mod pool;
pub mod queue;
pub mod sender;

pub use pool::{send_interval, DispatchLoop};
pub use queue::Dispatcher;
pub use sender::{ChatSender, ConsoleSender, RecordingSender};
