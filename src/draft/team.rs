//! Teams built during the draft

use crate::config::TeamsConfig;
use crate::types::{Nick, RosterEntry, TeamRecord};
use serde::{Deserialize, Serialize};

/// A team: its captain and the players picked so far
///
/// The captain only enters the roster when the draft completes and they are
/// given the class nobody was picked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub captain: Nick,
    pub roster: Vec<RosterEntry>,
}

impl Team {
    pub fn new(name: &str, captain: &str) -> Self {
        Self {
            name: name.to_string(),
            captain: captain.to_string(),
            roster: Vec::new(),
        }
    }

    /// Put a player on the roster as a class
    pub fn assign(&mut self, nick: &str, class: &str) {
        self.roster.push(RosterEntry {
            nick: nick.to_string(),
            class: class.to_string(),
        });
    }

    pub fn class_count(&self, class: &str) -> usize {
        self.roster.iter().filter(|entry| entry.class == class).count()
    }

    /// Open slots per class, in configured order, omitting full classes
    pub fn classes_needed(&self, teams: &TeamsConfig) -> Vec<(String, usize)> {
        teams
            .classes
            .iter()
            .filter_map(|requirement| {
                let open = requirement
                    .slots
                    .saturating_sub(self.class_count(&requirement.name));
                (open > 0).then(|| (requirement.name.clone(), open))
            })
            .collect()
    }

    /// Whether the team still has an open slot for a class
    pub fn needs(&self, class: &str, teams: &TeamsConfig) -> bool {
        teams
            .class_slots(class)
            .map(|slots| self.class_count(class) < slots)
            .unwrap_or(false)
    }

    /// Captain or rostered player
    pub fn contains(&self, nick: &str) -> bool {
        self.captain == nick || self.roster.iter().any(|entry| entry.nick == nick)
    }

    pub fn class_of(&self, nick: &str) -> Option<&str> {
        self.roster
            .iter()
            .find(|entry| entry.nick == nick)
            .map(|entry| entry.class.as_str())
    }

    /// Every member, captain first
    pub fn members(&self) -> Vec<Nick> {
        let mut members = vec![self.captain.clone()];
        members.extend(
            self.roster
                .iter()
                .filter(|entry| entry.nick != self.captain)
                .map(|entry| entry.nick.clone()),
        );
        members
    }

    /// Replace a member everywhere they appear
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let mut found = false;
        if self.captain == old {
            self.captain = new.to_string();
            found = true;
        }
        for entry in self.roster.iter_mut().filter(|entry| entry.nick == old) {
            entry.nick = new.to_string();
            found = true;
        }
        found
    }

    /// One-line summary for the channel
    pub fn format_team(&self) -> String {
        let captain = match self.class_of(&self.captain) {
            Some(class) => format!("{} ({}, captain)", self.captain, class),
            None => format!("{} (captain)", self.captain),
        };

        let mut entries = vec![captain];
        entries.extend(
            self.roster
                .iter()
                .filter(|entry| entry.nick != self.captain)
                .map(|entry| format!("{} ({})", entry.nick, entry.class)),
        );

        format!("{}: {}", self.name, entries.join(", "))
    }

    pub fn to_record(&self) -> TeamRecord {
        TeamRecord {
            name: self.name.clone(),
            captain: self.captain.clone(),
            roster: self.roster.clone(),
        }
    }
}
