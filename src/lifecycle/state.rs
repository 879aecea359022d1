//! Lifecycle states of the live match

use serde::{Deserialize, Serialize};

/// Where the lobby is in its cycle
///
/// The order matters: adding and removing are allowed in every state before
/// [`MatchState::Drafting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    /// Collecting signups
    #[default]
    Waiting,
    /// Warned players have until the grace deadline to speak up
    AfkCheck,
    /// Countdown before captains are chosen
    DraftDelay,
    /// Captains are picking
    Drafting,
    /// Final pick made; finalization in progress
    Complete,
}

impl MatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchState::Waiting => "waiting",
            MatchState::AfkCheck => "afk_check",
            MatchState::DraftDelay => "draft_delay",
            MatchState::Drafting => "drafting",
            MatchState::Complete => "complete",
        }
    }

    pub fn can_add(&self) -> bool {
        *self < MatchState::Drafting
    }

    pub fn can_remove(&self) -> bool {
        *self < MatchState::Drafting
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
