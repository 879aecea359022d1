//! Captain election and pick handling
//!
//! The engine holds no draft state of its own; it operates on the signup
//! registry and a [`DraftBoard`] owned by the match. All chat output goes
//! through the dispatcher handle it was built with.

use super::board::DraftBoard;
use super::pick_order::PickOrder;
use super::team::Team;
use crate::config::TeamsConfig;
use crate::dispatch::Dispatcher;
use crate::error::{PugError, PugResult};
use crate::signup::SignupRegistry;
use crate::types::{Nick, CAPTAIN_ROLE};
use crate::utils::rjust;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Width of the class labels in the pick prompt
const PROMPT_LABEL_WIDTH: usize = 12;

/// Pick target that draws any unpicked player of the class
pub const RANDOM_TARGET: &str = "random";

/// What happens after an accepted pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// More picks remain; this captain is up next
    Continue { next_captain: Nick },
    /// The pick sequence is exhausted
    Complete,
}

pub struct DraftEngine {
    teams: TeamsConfig,
    order: PickOrder,
    dispatcher: Dispatcher,
    rng: StdRng,
}

impl DraftEngine {
    pub fn new(teams: TeamsConfig, order: PickOrder, dispatcher: Dispatcher) -> Self {
        Self {
            teams,
            order,
            dispatcher,
            rng: StdRng::from_entropy(),
        }
    }

    /// Engine with a deterministic captain draw
    pub fn with_seed(teams: TeamsConfig, order: PickOrder, dispatcher: Dispatcher, seed: u64) -> Self {
        Self {
            teams,
            order,
            dispatcher,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn teams_config(&self) -> &TeamsConfig {
        &self.teams
    }

    pub fn pick_order(&self) -> PickOrder {
        self.order
    }

    /// Picks captains make before the draft completes
    pub fn picks_required(&self) -> usize {
        self.teams.picks_required()
    }

    /// Index of the team whose captain makes the next pick
    pub fn current_team_index(&self, board: &DraftBoard) -> usize {
        self.order.team_for_pick(board.pick(), self.teams.count)
    }

    pub fn current_captain<'a>(&self, board: &'a DraftBoard) -> Option<&'a str> {
        board
            .team(self.current_team_index(board))
            .map(|team| team.captain.as_str())
    }

    /// Build the lookup table, elect captains and prompt the first one
    pub fn start(&mut self, signups: &mut SignupRegistry, board: &mut DraftBoard) -> PugResult<()> {
        board.clear();
        board.update_lookup(signups);
        self.choose_captains(signups, board)?;
        self.tell_captain(signups, board);
        Ok(())
    }

    /// Draw one captain per team at random and move them out of the pool
    pub fn choose_captains(
        &mut self,
        signups: &mut SignupRegistry,
        board: &mut DraftBoard,
    ) -> PugResult<Vec<Nick>> {
        let mut candidates = signups.players_for_class(CAPTAIN_ROLE);
        if candidates.len() < self.teams.count {
            return Err(PugError::NotEnoughCaptains {
                needed: self.teams.count,
                available: candidates.len(),
            });
        }

        let mut captains = Vec::with_capacity(self.teams.count);
        for index in 0..self.teams.count {
            let captain = candidates.remove(self.rng.gen_range(0..candidates.len()));
            signups.remove(&captain);
            board.add_team(Team::new(&self.teams.team_name(index), &captain));

            self.dispatcher.notice(
                captain.as_str(),
                "You have been selected as a captain. When it is your turn to pick, you can choose players with the '!pick num class' or '!pick name class' command.",
            );
            self.dispatcher.notice(
                captain.as_str(),
                "Remember, you will play the class that you do not pick, so be sure to pick a medic if you do not wish to play medic.",
            );
            captains.push(captain);
        }

        info!("Captains selected: {}", captains.join(", "));
        self.dispatcher
            .message(format!("Captains are {}", captains.join(", ")));
        Ok(captains)
    }

    /// Prompt the current captain with the classes they still need
    pub fn tell_captain(&self, signups: &SignupRegistry, board: &DraftBoard) {
        let index = self.current_team_index(board);
        let Some(team) = board.team(index) else {
            return;
        };

        self.dispatcher
            .notice(team.captain.as_str(), "It is your turn to pick.");

        for (class, open) in team.classes_needed(&self.teams) {
            let players: Vec<String> = signups
                .players_for_class(&class)
                .into_iter()
                .map(|nick| match board.lookup_number(&nick) {
                    Some(number) => format!("({}) {}", number, nick),
                    None => nick,
                })
                .collect();

            self.dispatcher.notice(
                team.captain.as_str(),
                format!(
                    "{} {}",
                    rjust(&format!("{} {}:", open, class), PROMPT_LABEL_WIDTH),
                    players.join(", ")
                ),
            );
        }
    }

    /// Validate and apply one pick
    pub fn pick(
        &mut self,
        captain: &str,
        target: &str,
        class: &str,
        signups: &mut SignupRegistry,
        board: &mut DraftBoard,
    ) -> PugResult<PickOutcome> {
        if !board.is_active() {
            return Err(PugError::PickingNotStarted);
        }

        let team_index = self.current_team_index(board);
        let team = board.team(team_index).ok_or(PugError::PickingNotStarted)?;
        if team.captain != captain {
            return Err(PugError::NotYourTurn);
        }

        let class = class.to_lowercase();
        if !self.teams.is_valid_class(&class) {
            return Err(PugError::InvalidClass { class });
        }
        if !team.needs(&class, &self.teams) {
            return Err(PugError::ClassFull { class });
        }

        let random = signups.find(target).is_none() && target.eq_ignore_ascii_case(RANDOM_TARGET);
        let player = if random {
            self.random_player(&class, signups)?
        } else {
            self.resolve_target(target, signups, board)?
        };

        signups.remove(&player);
        if let Some(team) = board.team_mut(team_index) {
            team.assign(&player, &class);
        }
        self.dispatcher
            .message(format!("{} picked {} as {}", captain, player, class));

        let pick = board.advance_pick();
        debug!("Pick {}/{}: {} -> {}", pick, self.picks_required(), player, class);

        if pick >= self.picks_required() {
            return Ok(PickOutcome::Complete);
        }

        self.tell_captain(signups, board);
        let next_captain = self
            .current_captain(board)
            .map(str::to_string)
            .unwrap_or_default();
        Ok(PickOutcome::Continue { next_captain })
    }

    /// Name first (case-insensitive), then lookup number
    /// Any unpicked player who listed the class
    fn random_player(&mut self, class: &str, signups: &SignupRegistry) -> PugResult<Nick> {
        let mut candidates = signups.players_for_class(class);
        if candidates.is_empty() {
            return Err(PugError::NoPlayersForClass {
                class: class.to_string(),
            });
        }
        Ok(candidates.swap_remove(self.rng.gen_range(0..candidates.len())))
    }

    fn resolve_target(
        &self,
        target: &str,
        signups: &SignupRegistry,
        board: &DraftBoard,
    ) -> PugResult<Nick> {
        if let Some(signup) = signups.find(target) {
            return Ok(signup.nick.clone());
        }

        if let Some(drafted) = board.find_drafted(target) {
            return Err(PugError::AlreadyPicked { player: drafted });
        }

        let nick = target
            .parse::<usize>()
            .ok()
            .filter(|number| *number > 0)
            .and_then(|number| board.lookup(number))
            .ok_or_else(|| PugError::PlayerNotFound {
                target: target.to_string(),
            })?;

        if !signups.contains(nick) {
            return Err(PugError::AlreadyPicked {
                player: nick.clone(),
            });
        }

        Ok(nick.clone())
    }

    /// Give each captain the one class their team has left
    pub fn assign_captain_classes(&self, board: &mut DraftBoard) {
        for index in 0..board.teams().len() {
            let Some(team) = board.team_mut(index) else {
                continue;
            };
            let remaining = team.classes_needed(&self.teams).into_iter().next();
            if let Some((class, _)) = remaining {
                let captain = team.captain.clone();
                team.assign(&captain, &class);
            }
        }
    }

    /// Announce every team's roster
    pub fn print_teams(&self, board: &DraftBoard) {
        for team in board.teams() {
            self.dispatcher.message(team.format_team());
        }
    }

    /// "The picking format is: ..." line
    pub fn format_order(&self) -> String {
        let turns: Vec<String> = self
            .order
            .sequence(self.picks_required(), self.teams.count)
            .into_iter()
            .map(|team| self.teams.team_name(team))
            .collect();

        format!("The picking format is: {}", turns.join(" "))
    }

    /// Announce whose turn it is
    pub fn list_captain(&self, board: &DraftBoard) -> PugResult<()> {
        let captain = self
            .current_captain(board)
            .ok_or(PugError::PickingNotStarted)?;
        self.dispatcher
            .message(format!("It is {}'s turn to pick", captain));
        Ok(())
    }
}
