//! Signup registry: the ordered queue of players waiting for a match
//!
//! Signup order is preserved because it determines the numbering of the
//! draft lookup table.

use crate::error::{PugError, PugResult};
use crate::types::{Nick, CAPTAIN_ROLE};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A queued player and the classes they are willing to play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signup {
    pub nick: Nick,
    /// Lower-case class names, may include the captain role
    pub classes: Vec<String>,
    /// Whether the identity service knew the player when they added
    pub authorized: bool,
    pub joined_at: DateTime<Utc>,
}

impl Signup {
    pub fn new(nick: &str, classes: Vec<String>, authorized: bool) -> Self {
        Self {
            nick: nick.to_string(),
            classes,
            authorized,
            joined_at: current_timestamp(),
        }
    }

    pub fn plays(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn can_captain(&self) -> bool {
        self.plays(CAPTAIN_ROLE)
    }
}

/// Result of a successful add
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupOutcome {
    Added,
    /// The player was already queued and their classes changed
    Updated,
}

/// Ordered set of signups keyed by nick
#[derive(Debug, Clone, Default)]
pub struct SignupRegistry {
    entries: Vec<Signup>,
}

impl SignupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player, or replace the classes of an existing signup
    pub fn add(&mut self, signup: Signup) -> PugResult<SignupOutcome> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.nick == signup.nick) {
            if existing.classes == signup.classes {
                return Err(PugError::DuplicateSignup {
                    classes: existing.classes.join(" "),
                });
            }
            existing.classes = signup.classes;
            existing.authorized = signup.authorized;
            return Ok(SignupOutcome::Updated);
        }

        self.entries.push(signup);
        Ok(SignupOutcome::Added)
    }

    /// Remove a player by exact nick; removing an absent player is a no-op
    pub fn remove(&mut self, nick: &str) -> Option<Signup> {
        let index = self.entries.iter().position(|e| e.nick == nick)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.entries.iter().any(|e| e.nick == nick)
    }

    pub fn get(&self, nick: &str) -> Option<&Signup> {
        self.entries.iter().find(|e| e.nick == nick)
    }

    /// Case-insensitive lookup returning the stored nick
    pub fn find(&self, name: &str) -> Option<&Signup> {
        self.entries
            .iter()
            .find(|e| e.nick.to_lowercase() == name.to_lowercase())
    }

    /// Swap one player for another, keeping queue position and classes
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.nick == old) {
            Some(entry) => {
                entry.nick = new.to_string();
                true
            }
            None => false,
        }
    }

    /// Keep only the signups matching a predicate
    pub fn retain<F: FnMut(&Signup) -> bool>(&mut self, f: F) {
        self.entries.retain(f);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signup> {
        self.entries.iter()
    }

    /// Nicks in signup order
    pub fn nicks(&self) -> Vec<Nick> {
        self.entries.iter().map(|e| e.nick.clone()).collect()
    }

    /// Nicks of players who listed a class, in signup order
    pub fn players_for_class(&self, class: &str) -> Vec<Nick> {
        self.entries
            .iter()
            .filter(|e| e.plays(class))
            .map(|e| e.nick.clone())
            .collect()
    }

    pub fn count_for_class(&self, class: &str) -> usize {
        self.entries.iter().filter(|e| e.plays(class)).count()
    }

    pub fn captain_count(&self) -> usize {
        self.count_for_class(CAPTAIN_ROLE)
    }
}
