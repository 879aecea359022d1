//! Captain draft: pick order, teams and the engine that runs picks

pub mod board;
pub mod engine;
pub mod pick_order;
pub mod team;

pub use board::DraftBoard;
pub use engine::{DraftEngine, PickOutcome};
pub use pick_order::PickOrder;
pub use team::Team;
