//! Pug Room - pick-up game lobby for team shooters
//!
//! Players sign up in a chat channel with the classes they can play. Once
//! enough players are queued, inactive players are weeded out, captains are
//! drawn at random and pick their teams in turn. Outbound chat goes through
//! a rate-limited pool of bot identities.

pub mod afk;
pub mod amqp;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod draft;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod service;
pub mod services;
pub mod signup;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ErrorKind, PugError, PugResult, Result};
pub use types::*;

// Re-export key components
pub use commands::{ChatCommand, CommandRouter};
pub use dispatch::{ChatSender, DispatchLoop, Dispatcher};
pub use lifecycle::{Collaborators, MatchState, MatchStateMachine};
pub use services::{IdentityService, MatchRecorder, ServerProvisioner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
