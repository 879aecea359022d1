//! Configuration management for the pug-room service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for the pick-up game service.

pub mod app;
pub mod teams;

// Re-export commonly used types
pub use app::{
    validate_config, AmqpSettings, AppConfig, DispatchSettings, EndgameSignupPolicy,
    PugSettings, ServerSettings, ServiceSettings,
};
pub use teams::{ClassRequirement, TeamsConfig};
