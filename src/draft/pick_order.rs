//! Pick order policies
//!
//! A pick order maps the zero-based pick index to the team whose captain
//! makes that pick. The staggered formula only alternates in pairs for two
//! teams; configurations where it would hand a team the wrong number of
//! picks are rejected by [`PickOrder::validate`].

use crate::config::TeamsConfig;
use crate::error::{PugError, PugResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Turn order policy for the draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickOrder {
    /// 0 1 0 1 0 1 ...
    Sequential,
    /// 0 1 1 0 0 1 1 0 ...
    #[default]
    Staggered,
    /// 0 1 0 1, then 1 0 0 1 1 0 ...
    Hybrid,
}

impl PickOrder {
    /// Team index for a pick
    pub fn team_for_pick(&self, pick: usize, team_count: usize) -> usize {
        if team_count == 0 {
            return 0;
        }

        match self {
            PickOrder::Sequential => sequential(pick, team_count),
            PickOrder::Staggered => staggered(pick, team_count),
            PickOrder::Hybrid => {
                if pick < 4 {
                    sequential(pick, team_count)
                } else {
                    staggered(pick - 2, team_count)
                }
            }
        }
    }

    /// Team index for every pick in a draft of `picks` picks
    pub fn sequence(&self, picks: usize, team_count: usize) -> Vec<usize> {
        (0..picks)
            .map(|pick| self.team_for_pick(pick, team_count))
            .collect()
    }

    /// Check that every team receives exactly `slots_per_team - 1` picks
    pub fn validate(&self, teams: &TeamsConfig) -> PugResult<()> {
        if teams.count == 0 {
            return Err(PugError::ConfigurationError {
                message: "Team count must be greater than 0".to_string(),
            });
        }

        let expected = teams.slots_per_team().saturating_sub(1);
        let mut per_team = vec![0usize; teams.count];
        for team in self.sequence(teams.picks_required(), teams.count) {
            per_team[team] += 1;
        }

        if let Some((team, picks)) = per_team
            .iter()
            .enumerate()
            .find(|(_, picks)| **picks != expected)
        {
            return Err(PugError::ConfigurationError {
                message: format!(
                    "Pick order '{}' gives {} {} picks but each team needs {}",
                    self,
                    teams.team_name(team),
                    picks,
                    expected
                ),
            });
        }

        Ok(())
    }
}

fn sequential(pick: usize, team_count: usize) -> usize {
    pick % team_count
}

fn staggered(pick: usize, team_count: usize) -> usize {
    ((pick + 1) / team_count) % team_count
}

impl std::fmt::Display for PickOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickOrder::Sequential => write!(f, "sequential"),
            PickOrder::Staggered => write!(f, "staggered"),
            PickOrder::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for PickOrder {
    type Err = PugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(PickOrder::Sequential),
            "staggered" => Ok(PickOrder::Staggered),
            "hybrid" => Ok(PickOrder::Hybrid),
            other => Err(PugError::ConfigurationError {
                message: format!("Unknown pick order: {}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassRequirement;
    use proptest::prelude::*;

    #[test]
    fn test_sequential_two_teams() {
        assert_eq!(PickOrder::Sequential.sequence(4, 2), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_staggered_two_teams() {
        assert_eq!(
            PickOrder::Staggered.sequence(8, 2),
            vec![0, 1, 1, 0, 0, 1, 1, 0]
        );
    }

    #[test]
    fn test_hybrid_two_teams() {
        assert_eq!(
            PickOrder::Hybrid.sequence(10, 2),
            vec![0, 1, 0, 1, 1, 0, 0, 1, 1, 0]
        );
    }

    #[test]
    fn test_default_is_staggered() {
        assert_eq!(PickOrder::default(), PickOrder::Staggered);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Hybrid".parse::<PickOrder>().unwrap(), PickOrder::Hybrid);
        assert!("snake".parse::<PickOrder>().is_err());
    }

    #[test]
    fn test_all_policies_valid_for_default_teams() {
        let teams = TeamsConfig::default();
        for order in [PickOrder::Sequential, PickOrder::Staggered, PickOrder::Hybrid] {
            assert!(order.validate(&teams).is_ok(), "{} should be valid", order);
        }
    }

    #[test]
    fn test_staggered_rejected_for_three_teams() {
        let teams = TeamsConfig {
            count: 3,
            names: vec!["Red".into(), "Blue".into(), "Green".into()],
            classes: vec![ClassRequirement::new("scout", 2), ClassRequirement::new("medic", 1)],
        };

        // 6 picks over 3 teams: 0 0 1 1 1 2 -> unbalanced
        assert_eq!(PickOrder::Staggered.sequence(6, 3), vec![0, 0, 1, 1, 1, 2]);
        assert!(PickOrder::Staggered.validate(&teams).is_err());
        assert!(PickOrder::Sequential.validate(&teams).is_ok());
    }

    proptest! {
        #[test]
        fn prop_team_index_in_range(pick in 0usize..1000, teams in 1usize..6) {
            for order in [PickOrder::Sequential, PickOrder::Staggered, PickOrder::Hybrid] {
                prop_assert!(order.team_for_pick(pick, teams) < teams);
            }
        }

        #[test]
        fn prop_staggered_matches_formula(pick in 0usize..1000) {
            prop_assert_eq!(PickOrder::Staggered.team_for_pick(pick, 2), ((pick + 1) / 2) % 2);
        }

        #[test]
        fn prop_two_team_orders_balance_in_pairs(pairs in 1usize..50) {
            for order in [PickOrder::Sequential, PickOrder::Staggered] {
                let seq = order.sequence(pairs * 4, 2);
                let first = seq.iter().filter(|team| **team == 0).count();
                prop_assert_eq!(first, pairs * 2);
            }
        }
    }
}
