//! Chat commands

pub mod parser;
pub mod router;

pub use parser::{ChatCommand, COMMAND_PREFIX};
pub use router::CommandRouter;
