//! Common types used throughout the pick-up game service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat handle identifying a player
pub type Nick = String;

/// Unique identifier for completed matches
pub type MatchId = Uuid;

/// Name of the role that makes a signup eligible for captaincy
pub const CAPTAIN_ROLE: &str = "captain";

/// Where an outbound chat message goes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Recipient {
    /// The pug channel
    Channel,
    /// A single player
    Player(Nick),
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recipient::Channel => write!(f, "#channel"),
            Recipient::Player(nick) => write!(f, "{}", nick),
        }
    }
}

/// A queued outbound chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub to: Recipient,
    pub body: String,
    /// Sent as a notice rather than a regular message
    pub notice: bool,
}

impl DispatchEntry {
    /// Public message to the channel
    pub fn channel(body: impl Into<String>) -> Self {
        Self {
            to: Recipient::Channel,
            body: body.into(),
            notice: false,
        }
    }

    /// Private notice to one player
    pub fn notice(nick: impl Into<Nick>, body: impl Into<String>) -> Self {
        Self {
            to: Recipient::Player(nick.into()),
            body: body.into(),
            notice: true,
        }
    }

    /// Private message to one player
    pub fn private(nick: impl Into<Nick>, body: impl Into<String>) -> Self {
        Self {
            to: Recipient::Player(nick.into()),
            body: body.into(),
            notice: false,
        }
    }
}

/// A line of chat received from the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub nick: Nick,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Game server connection details handed to drafted players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub address: String,
    pub password: Option<String>,
}

impl ConnectionInfo {
    /// Render as a console connect string
    pub fn connect_string(&self) -> String {
        match &self.password {
            Some(password) => format!("connect {}; password {}", self.address, password),
            None => format!("connect {}", self.address),
        }
    }
}

/// One drafted player and the class they play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub nick: Nick,
    pub class: String,
}

/// Persisted view of a finished team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub name: String,
    pub captain: Nick,
    pub roster: Vec<RosterEntry>,
}

/// Record of a completed draft, handed to the match recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub teams: Vec<TeamRecord>,
    pub server: Option<ConnectionInfo>,
    pub timestamp: DateTime<Utc>,
}

impl MatchRecord {
    /// Total number of players across all teams
    pub fn player_count(&self) -> usize {
        self.teams.iter().map(|team| team.roster.len()).sum()
    }

    /// Whether the nick played in this match
    pub fn played(&self, nick: &str) -> bool {
        self.teams.iter().any(|team| {
            team.roster
                .iter()
                .any(|entry| entry.nick.eq_ignore_ascii_case(nick))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_entry_constructors() {
        let public = DispatchEntry::channel("hello");
        assert_eq!(public.to, Recipient::Channel);
        assert!(!public.notice);

        let notice = DispatchEntry::notice("alice", "psst");
        assert_eq!(notice.to, Recipient::Player("alice".to_string()));
        assert!(notice.notice);

        let private = DispatchEntry::private("bob", "hi");
        assert!(!private.notice);
    }

    #[test]
    fn test_connect_string() {
        let info = ConnectionInfo {
            address: "127.0.0.1:27015".to_string(),
            password: Some("pug".to_string()),
        };
        assert_eq!(
            info.connect_string(),
            "connect 127.0.0.1:27015; password pug"
        );

        let open = ConnectionInfo {
            address: "10.0.0.2:27015".to_string(),
            password: None,
        };
        assert_eq!(open.connect_string(), "connect 10.0.0.2:27015");
    }
}
