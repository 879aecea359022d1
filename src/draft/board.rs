//! Draft-scoped state: teams, pick counter and the lookup table

use super::team::Team;
use crate::signup::SignupRegistry;
use crate::types::Nick;
use std::collections::BTreeMap;

/// Everything that exists only while a draft is running
#[derive(Debug, Clone, Default)]
pub struct DraftBoard {
    teams: Vec<Team>,
    pick: usize,
    /// 1-based number → nick, built from signup order
    lookup: BTreeMap<usize, Nick>,
}

impl DraftBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether captains have been chosen
    pub fn is_active(&self) -> bool {
        !self.teams.is_empty()
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, index: usize) -> Option<&Team> {
        self.teams.get(index)
    }

    pub fn team_mut(&mut self, index: usize) -> Option<&mut Team> {
        self.teams.get_mut(index)
    }

    pub fn add_team(&mut self, team: Team) {
        self.teams.push(team);
    }

    /// Number of picks made so far
    pub fn pick(&self) -> usize {
        self.pick
    }

    pub fn advance_pick(&mut self) -> usize {
        self.pick += 1;
        self.pick
    }

    /// Number every current signup, 1-based, in signup order
    pub fn update_lookup(&mut self, signups: &SignupRegistry) {
        self.lookup = signups
            .iter()
            .enumerate()
            .map(|(i, signup)| (i + 1, signup.nick.clone()))
            .collect();
    }

    pub fn lookup(&self, number: usize) -> Option<&Nick> {
        self.lookup.get(&number)
    }

    /// Reverse lookup of a nick's number
    pub fn lookup_number(&self, nick: &str) -> Option<usize> {
        self.lookup
            .iter()
            .find(|(_, n)| n.as_str() == nick)
            .map(|(number, _)| *number)
    }

    pub fn lookup_len(&self) -> usize {
        self.lookup.len()
    }

    /// Whether a nick is a captain or has been picked
    pub fn is_drafted(&self, nick: &str) -> bool {
        self.teams.iter().any(|team| team.contains(nick))
    }

    /// Case-insensitive search among captains and picked players
    pub fn find_drafted(&self, name: &str) -> Option<Nick> {
        let name = name.to_lowercase();
        self.teams
            .iter()
            .flat_map(|team| team.members())
            .find(|member| member.to_lowercase() == name)
    }

    /// Captains and picked players across all teams
    pub fn drafted_players(&self) -> Vec<Nick> {
        self.teams.iter().flat_map(|team| team.members()).collect()
    }

    /// Swap a player in the teams and the lookup table
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        let mut found = false;
        for team in &mut self.teams {
            found |= team.rename(old, new);
        }
        for nick in self.lookup.values_mut().filter(|nick| nick.as_str() == old) {
            *nick = new.to_string();
            found = true;
        }
        found
    }

    /// Drop all draft state
    pub fn clear(&mut self) {
        self.teams.clear();
        self.pick = 0;
        self.lookup.clear();
    }
}
