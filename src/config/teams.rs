//! Team and class slot configuration

use serde::{Deserialize, Serialize};

/// How many slots per team a class fills
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRequirement {
    pub name: String,
    pub slots: usize,
}

impl ClassRequirement {
    pub fn new(name: &str, slots: usize) -> Self {
        Self {
            name: name.to_string(),
            slots,
        }
    }
}

/// Team layout for a single match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    /// Number of teams (and therefore captains)
    pub count: usize,
    /// Display names, one per team
    pub names: Vec<String>,
    /// Pickable classes in display order
    pub classes: Vec<ClassRequirement>,
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            count: 2,
            names: vec!["Red".to_string(), "Blue".to_string()],
            classes: vec![
                ClassRequirement::new("scout", 2),
                ClassRequirement::new("soldier", 2),
                ClassRequirement::new("demoman", 1),
                ClassRequirement::new("medic", 1),
            ],
        }
    }
}

impl TeamsConfig {
    /// Players on one team, captain included
    pub fn slots_per_team(&self) -> usize {
        self.classes.iter().map(|class| class.slots).sum()
    }

    /// Players across all teams
    pub fn total_slots(&self) -> usize {
        self.slots_per_team() * self.count
    }

    /// Picks made by captains before the draft completes
    pub fn picks_required(&self) -> usize {
        self.total_slots().saturating_sub(self.count)
    }

    /// Per-team slot count for a class, if the class exists
    pub fn class_slots(&self, class: &str) -> Option<usize> {
        self.classes
            .iter()
            .find(|requirement| requirement.name == class)
            .map(|requirement| requirement.slots)
    }

    pub fn is_valid_class(&self, class: &str) -> bool {
        self.class_slots(class).is_some()
    }

    /// Team name for an index, falling back to a numbered name
    pub fn team_name(&self, index: usize) -> String {
        self.names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Team {}", index + 1))
    }

    /// Class names in configured order
    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|class| class.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_six_versus_six() {
        let teams = TeamsConfig::default();
        assert_eq!(teams.slots_per_team(), 6);
        assert_eq!(teams.total_slots(), 12);
        assert_eq!(teams.picks_required(), 10);
    }

    #[test]
    fn test_class_lookup() {
        let teams = TeamsConfig::default();
        assert_eq!(teams.class_slots("scout"), Some(2));
        assert_eq!(teams.class_slots("medic"), Some(1));
        assert!(!teams.is_valid_class("spy"));
        assert!(!teams.is_valid_class("captain"));
    }

    #[test]
    fn test_team_name_fallback() {
        let teams = TeamsConfig::default();
        assert_eq!(teams.team_name(1), "Blue");
        assert_eq!(teams.team_name(2), "Team 3");
    }
}
