//! Match lifecycle: the live match and the state machine that drives it

pub mod game;
pub mod machine;
pub mod state;

pub use game::Match;
pub use machine::{Collaborators, MatchStateMachine, MatchStats};
pub use state::MatchState;
