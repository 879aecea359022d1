//! Signup queue for the next match

pub mod registry;

pub use registry::{Signup, SignupOutcome, SignupRegistry};
