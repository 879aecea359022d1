//! AFK detection

pub mod checker;

pub use checker::{AfkChecker, PendingAfkCheck};
