//! External collaborators: identity, match persistence and game servers
//!
//! Each collaborator is a trait so the state machine can be driven by
//! in-process implementations in tests and console runs.

pub mod identity;
pub mod persistence;
pub mod provisioner;

pub use identity::{IdentityService, PresenceTracker};
pub use persistence::{InMemoryMatchRecorder, JsonLinesMatchRecorder, MatchRecorder};
pub use provisioner::{ServerProvisioner, StaticServerProvisioner};
