//! Service layer for the pug-room service
//!
//! Application state, transports, background tasks and health reporting.

pub mod app;
pub mod console;
pub mod health;

pub use app::{AppState, ServiceError, Transport};
pub use console::parse_console_line;
pub use health::{HealthCheck, HealthStatus, ServiceStatus};
