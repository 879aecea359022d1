//! Match lifecycle state machine
//!
//! `waiting → afk_check → draft_delay → drafting → complete → waiting`
//!
//! The machine is owned by a single task. Timed transitions are deadlines
//! stored on the [`Match`] and acted on by [`MatchStateMachine::tick`].
//! Rejected commands are reported to the requester as a private notice and
//! leave state untouched; the error is also returned so callers can log it.

use super::game::Match;
use super::state::MatchState;
use crate::afk::{AfkChecker, PendingAfkCheck};
use crate::config::{AppConfig, EndgameSignupPolicy};
use crate::dispatch::Dispatcher;
use crate::draft::{DraftEngine, PickOutcome};
use crate::error::{PugError, PugResult};
use crate::metrics::MetricsCollector;
use crate::services::{IdentityService, MatchRecorder, ServerProvisioner};
use crate::signup::{Signup, SignupOutcome};
use crate::types::{ConnectionInfo, MatchRecord, Nick, CAPTAIN_ROLE};
use crate::utils::{current_timestamp, generate_match_id, normalize_classes};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// External services the machine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityService>,
    pub recorder: Arc<dyn MatchRecorder>,
    pub provisioner: Arc<dyn ServerProvisioner>,
}

/// Snapshot exposed through `/stats` and metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub state: String,
    pub signups: usize,
    pub captains_available: usize,
    pub minimum_players: usize,
    pub pick: usize,
    pub picks_required: usize,
    pub matches_completed: u64,
    pub unreconciled_matches: usize,
}

pub struct MatchStateMachine {
    config: AppConfig,
    game: Match,
    afk: AfkChecker,
    draft: DraftEngine,
    collaborators: Collaborators,
    dispatcher: Dispatcher,
    metrics: Option<Arc<MetricsCollector>>,
    /// Completed matches the recorder rejected
    unreconciled: Vec<MatchRecord>,
    matches_completed: u64,
}

impl MatchStateMachine {
    pub fn new(config: AppConfig, collaborators: Collaborators, dispatcher: Dispatcher) -> Self {
        let afk = AfkChecker::new(
            collaborators.identity.clone(),
            dispatcher.clone(),
            config.afk_threshold(),
        );
        let draft = DraftEngine::new(
            config.teams.clone(),
            config.pug.pick_order,
            dispatcher.clone(),
        );

        Self {
            config,
            game: Match::new(),
            afk,
            draft,
            collaborators,
            dispatcher,
            metrics: None,
            unreconciled: Vec::new(),
            matches_completed: 0,
        }
    }

    /// Use a deterministic captain draw
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.draft = DraftEngine::with_seed(
            self.config.teams.clone(),
            self.config.pug.pick_order,
            self.dispatcher.clone(),
            seed,
        );
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.afk = self.afk.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self.refresh_metrics();
        self
    }

    pub fn state(&self) -> MatchState {
        self.game.state()
    }

    pub fn game(&self) -> &Match {
        &self.game
    }

    pub fn draft(&self) -> &DraftEngine {
        &self.draft
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Match records waiting for manual reconciliation
    pub fn unreconciled(&self) -> &[MatchRecord] {
        &self.unreconciled
    }

    pub fn is_degraded(&self) -> bool {
        !self.unreconciled.is_empty()
    }

    /// Captain whose turn it is, while drafting
    pub fn current_captain(&self) -> Option<&str> {
        if self.state() != MatchState::Drafting {
            return None;
        }
        self.draft.current_captain(self.game.board())
    }

    pub fn stats(&self) -> MatchStats {
        MatchStats {
            state: self.state().to_string(),
            signups: self.game.signups().len(),
            captains_available: self.game.signups().captain_count(),
            minimum_players: self.config.pug.minimum_players,
            pick: self.game.board().pick(),
            picks_required: self.draft.picks_required(),
            matches_completed: self.matches_completed,
            unreconciled_matches: self.unreconciled.len(),
        }
    }

    /// `!add`
    pub async fn on_signup(&mut self, nick: &str, classes: &[String]) -> PugResult<()> {
        let result = self.try_signup(nick, classes).await;
        self.settle(nick, result)?;
        self.attempt_afk().await;
        self.refresh_metrics();
        Ok(())
    }

    async fn try_signup(&mut self, nick: &str, classes: &[String]) -> PugResult<()> {
        let teams = &self.config.teams;
        let mut options: Vec<&str> = teams.class_names();
        options.push(CAPTAIN_ROLE);
        let options_list = options.join(", ");

        let classes = normalize_classes(classes);
        if classes.is_empty() {
            return Err(PugError::NoClasses {
                options: options.join(" "),
            });
        }

        if self.config.is_restricted(nick) {
            return Err(PugError::Restricted);
        }

        let mut valid: Vec<String> = classes
            .into_iter()
            .filter(|class| class == CAPTAIN_ROLE || teams.is_valid_class(class))
            .collect();
        if valid.is_empty() {
            return Err(PugError::NoValidClasses {
                options: options_list,
            });
        }

        if !self.state().can_add() {
            return Err(PugError::CannotAdd);
        }

        let signups = self.game.signups();
        if !signups.contains(nick) && signups.len() >= self.config.teams.total_slots() {
            return Err(PugError::QueueFull);
        }

        if valid.iter().any(|class| class == CAPTAIN_ROLE) && !self.may_captain(nick).await {
            valid.retain(|class| class != CAPTAIN_ROLE);
            if valid.is_empty() {
                return Err(PugError::NoValidClasses {
                    options: options_list,
                });
            }
        }

        let authorized = match self.collaborators.identity.is_authorized(nick).await {
            Ok(authorized) => authorized,
            Err(e) => {
                warn!("Failed to check authorization for '{}': {}", nick, e);
                self.record_collaborator_failure("identity");
                false
            }
        };

        let outcome = self
            .game
            .signups_mut()
            .add(Signup::new(nick, valid.clone(), authorized))?;

        if !authorized {
            self.dispatcher.notice(
                nick,
                "You are not authorized with the chat network. You can still play, but any accumulated stats will only be connected to this nick.",
            );
        }

        match outcome {
            SignupOutcome::Added => {
                info!("{} added as {}", nick, valid.join(" "));
                self.record_signup("added");
            }
            SignupOutcome::Updated => {
                info!("{} changed classes to {}", nick, valid.join(" "));
                self.record_signup("updated");
            }
        }

        self.list_signups();
        Ok(())
    }

    /// `!remove`
    pub async fn on_leave(&mut self, nick: &str) -> PugResult<()> {
        let result = if !self.state().can_remove() {
            Err(PugError::CannotRemove)
        } else {
            self.game
                .signups_mut()
                .remove(nick)
                .map(|_| ())
                .ok_or(PugError::NotSignedUp)
        };
        self.settle(nick, result)?;

        info!("{} removed", nick);
        self.record_signup("removed");
        self.list_signups();
        self.refresh_metrics();
        Ok(())
    }

    /// `!pick <name|number|random> <class>`
    pub async fn on_pick(&mut self, captain: &str, target: &str, class: &str) -> PugResult<()> {
        let result = if self.state() != MatchState::Drafting {
            Err(PugError::PickingNotStarted)
        } else {
            let (signups, board) = self.game.draft_parts();
            self.draft.pick(captain, target, class, signups, board)
        };
        let outcome = self.settle(captain, result)?;

        if let Some(metrics) = &self.metrics {
            metrics.record_pick();
        }

        if outcome == PickOutcome::Complete {
            self.finalize().await;
        }
        self.refresh_metrics();
        Ok(())
    }

    /// Act on any deadline that has passed
    pub async fn tick(&mut self) {
        let now = Instant::now();

        match self.state() {
            MatchState::AfkCheck => {
                let due = self
                    .game
                    .pending_afk()
                    .map(|pending| pending.is_due(now))
                    .unwrap_or(false);
                if due {
                    self.finish_afk_check().await;
                }
            }
            MatchState::DraftDelay => {
                let due = self
                    .game
                    .draft_deadline()
                    .map(|deadline| now >= deadline)
                    .unwrap_or(false);
                if due {
                    self.start_picking();
                }
            }
            MatchState::Waiting => self.attempt_afk().await,
            _ => {}
        }

        self.refresh_metrics();
    }

    /// Admin `!endgame`: abandon whatever is in progress
    pub async fn end_game(&mut self, admin: &str) -> PugResult<()> {
        let result = self.require_admin(admin, "endgame");
        self.settle(admin, result)?;

        let was_drafting = self.game.board().is_active();
        self.game.clear_draft();
        if self.config.pug.endgame_signups == EndgameSignupPolicy::Clear {
            self.game.signups_mut().clear();
        }
        self.game.set_state(MatchState::Waiting);

        if was_drafting {
            if let Some(metrics) = &self.metrics {
                metrics.record_draft_aborted();
            }
        }

        info!(
            "{} ended the game, {} signup(s) kept",
            admin,
            self.game.signups().len()
        );
        self.dispatcher
            .message(format!("The pug has been ended by {}.", admin));
        self.list_signups();
        // Kept signups may already fill the lobby
        self.attempt_afk().await;
        self.refresh_metrics();
        Ok(())
    }

    /// Admin `!replace <old> <new>`
    pub async fn replace(&mut self, admin: &str, old: &str, new: &str) -> PugResult<()> {
        let result = self.require_admin(admin, "replace").and_then(|_| {
            if self.game.is_playing(new) {
                return Err(PugError::AlreadyPlaying {
                    player: new.to_string(),
                });
            }
            if !self.game.is_playing(old) {
                return Err(PugError::PlayerNotFound {
                    target: old.to_string(),
                });
            }
            Ok(())
        });
        self.settle(admin, result)?;

        self.game.signups_mut().rename(old, new);
        self.game.board_mut().rename(old, new);

        info!("{} replaced {} with {}", admin, old, new);
        self.dispatcher
            .message(format!("{} has replaced {}.", new, old));
        Ok(())
    }

    /// `!list`
    pub fn list_signups(&self) {
        let entries: Vec<String> = self
            .game
            .signups()
            .iter()
            .map(|signup| format!("{} ({})", signup.nick, signup.classes.join("/")))
            .collect();

        self.dispatcher.message(format!(
            "{} users added: {}",
            entries.len(),
            entries.join(", ")
        ));
    }

    /// `!listcaps` / `!need`: open class slots, captains and players
    pub fn list_classes_needed(&self) {
        if !self.state().can_add() {
            return;
        }

        let teams = &self.config.teams;
        let signups = self.game.signups();

        let mut output: Vec<String> = teams
            .classes
            .iter()
            .filter_map(|requirement| {
                let wanted = requirement.slots * teams.count;
                let open = wanted.saturating_sub(signups.count_for_class(&requirement.name));
                (open > 0).then(|| format!("{} {}", open, requirement.name))
            })
            .collect();

        let captains = teams.count.saturating_sub(signups.captain_count());
        if captains > 0 {
            output.push(format!("{} {}", captains, CAPTAIN_ROLE));
        }

        let players = self
            .config
            .pug
            .minimum_players
            .saturating_sub(signups.len());
        if players > 0 {
            output.push(format!("{} players", players));
        }

        if output.is_empty() {
            self.dispatcher.message("Classes needed: none");
        } else {
            self.dispatcher
                .message(format!("Classes needed: {}", output.join(", ")));
        }
    }

    /// `!captain`
    pub fn list_captain(&self, requester: &str) -> PugResult<()> {
        let result = if self.state() != MatchState::Drafting {
            Err(PugError::PickingNotStarted)
        } else {
            self.draft.list_captain(self.game.board())
        };
        self.settle(requester, result)
    }

    /// `!format`
    pub fn list_format(&self) {
        self.dispatcher.message(self.draft.format_order());
    }

    /// Check the captain games requirement, telling the player what is missing
    ///
    /// A recorder failure lets the player captain.
    async fn may_captain(&self, nick: &str) -> bool {
        let required = self.config.pug.captain_min_games;
        if required == 0 {
            return true;
        }

        match self.collaborators.recorder.games_played(nick).await {
            Ok(played) if played >= required => true,
            Ok(played) => {
                self.dispatcher.notice(
                    nick,
                    format!(
                        "You need {} more games before you can add as captain.",
                        required - played
                    ),
                );
                false
            }
            Err(e) => {
                warn!("Failed to look up games played by '{}': {}", nick, e);
                self.record_collaborator_failure("persistence");
                true
            }
        }
    }

    /// Enough signups and captains to start
    fn minimum_met(&self) -> bool {
        let signups = self.game.signups();
        signups.len() >= self.config.pug.minimum_players
            && signups.captain_count() >= self.config.teams.count
    }

    /// Leave `waiting` for the AFK check once the minimum is reached
    async fn attempt_afk(&mut self) {
        if self.state() != MatchState::Waiting || !self.minimum_met() {
            return;
        }

        info!("Minimum players reached, checking for afk players");
        self.game.set_state(MatchState::AfkCheck);

        let nicks = self.game.signups().nicks();
        let candidates = self.afk.find_inactive(&nicks).await;
        if candidates.is_empty() {
            self.attempt_picking();
            return;
        }

        let grace = self.config.afk_grace();
        self.afk.warn(&candidates, grace);
        self.game
            .set_pending_afk(PendingAfkCheck::new(candidates, grace));
    }

    /// Second AFK pass: drop players who are still inactive
    async fn finish_afk_check(&mut self) {
        let Some(pending) = self.game.take_pending_afk() else {
            return;
        };

        let still_inactive = self.afk.find_inactive(&pending.candidates).await;
        let removed: Vec<Nick> = still_inactive
            .into_iter()
            .filter(|nick| self.game.signups_mut().remove(nick).is_some())
            .collect();

        if !removed.is_empty() {
            info!("Removed afk players: {}", removed.join(", "));
            self.dispatcher
                .message(format!("Removed afk players: {}", removed.join(", ")));
            if let Some(metrics) = &self.metrics {
                metrics.record_afk_removals(removed.len());
            }
        }

        self.list_signups();
        self.attempt_picking();
    }

    /// Start the countdown, or fall back to waiting
    fn attempt_picking(&mut self) {
        if !self.minimum_met() {
            info!("Minimum no longer met, back to waiting");
            self.game.clear_draft();
            self.game.set_state(MatchState::Waiting);
            return;
        }

        let delay = self.config.draft_delay();
        self.game.set_state(MatchState::DraftDelay);
        self.game.set_draft_deadline(Instant::now() + delay);
        self.dispatcher.message(format!(
            "Teams are being drafted, captains will be selected in {} seconds",
            delay.as_secs()
        ));
    }

    /// Countdown elapsed: elect captains and begin drafting
    fn start_picking(&mut self) {
        self.game.take_draft_deadline();

        if !self.minimum_met() {
            info!("Players left during the countdown, back to waiting");
            self.game.set_state(MatchState::Waiting);
            self.list_classes_needed();
            return;
        }

        self.game.set_state(MatchState::Drafting);
        let (signups, board) = self.game.draft_parts();
        match self.draft.start(signups, board) {
            Ok(()) => {
                info!("Drafting started");
                self.game.mark_draft_started();
            }
            Err(e) => {
                warn!("Could not start drafting: {}", e);
                self.game.clear_draft();
                self.game.set_state(MatchState::Waiting);
            }
        }
    }

    /// Final pick made: announce, provision, record, reset
    async fn finalize(&mut self) {
        self.game.set_state(MatchState::Complete);

        self.draft.assign_captain_classes(self.game.board_mut());
        self.draft.print_teams(self.game.board());

        let server = match self.collaborators.provisioner.start_server().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Failed to start game server: {}", e);
                self.record_collaborator_failure("provisioner");
                self.dispatcher.message(
                    "The game server could not be started automatically. An admin will post the connection details.",
                );
                None
            }
        };
        let connect = server
            .as_ref()
            .map(ConnectionInfo::connect_string)
            .unwrap_or_else(|| "to be announced".to_string());

        self.dispatcher
            .message(format!("The server info is: {}", connect));
        self.announce_teams(&connect);

        let record = MatchRecord {
            match_id: generate_match_id(),
            teams: self
                .game
                .board()
                .teams()
                .iter()
                .map(|team| team.to_record())
                .collect(),
            server,
            timestamp: current_timestamp(),
        };

        match self.collaborators.recorder.record_match(&record).await {
            Ok(()) => info!("Recorded match {}", record.match_id),
            Err(e) => {
                warn!("Failed to record match {}: {}", record.match_id, e);
                self.record_collaborator_failure("persistence");
                self.dispatcher
                    .message("Match statistics could not be saved. An admin has been notified.");
                self.unreconciled.push(record);
            }
        }

        if let (Some(metrics), Some(started)) = (&self.metrics, self.game.draft_started()) {
            metrics.record_draft_completed(started.elapsed());
        }
        self.matches_completed += 1;

        self.game.clear_draft();
        self.game.signups_mut().clear();
        self.game.set_state(MatchState::Waiting);

        self.dispatcher
            .message("Game started. Add to the pug using the !add command.");
        self.list_signups();
    }

    /// Private delivery of team, class and server to every player
    fn announce_teams(&self, connect: &str) {
        for team in self.game.board().teams() {
            for entry in &team.roster {
                let body = if entry.nick == team.captain {
                    format!(
                        "You are captain of {} and will play {}. The server info is: {}",
                        team.name, entry.class, connect
                    )
                } else {
                    format!(
                        "You have been picked for {} as {}. The server info is: {}",
                        team.name, entry.class, connect
                    )
                };
                self.dispatcher.private(entry.nick.as_str(), body);
            }
        }
    }

    fn require_admin(&self, nick: &str, command: &str) -> PugResult<()> {
        if self.config.is_admin(nick) {
            Ok(())
        } else {
            Err(PugError::NotAdmin {
                command: command.to_string(),
            })
        }
    }

    /// Report a rejected command back to its sender
    fn settle<T>(&self, nick: &str, result: PugResult<T>) -> PugResult<T> {
        if let Err(e) = &result {
            warn!("Rejected command from {}: {}", nick, e);
            if e.is_recoverable() {
                self.dispatcher.notice(nick, e.to_string());
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_rejected_command(e.kind().as_str());
            }
        }
        result
    }

    fn record_signup(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_signup(outcome);
        }
    }

    fn record_collaborator_failure(&self, collaborator: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_collaborator_failure(collaborator);
        }
    }

    fn refresh_metrics(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.update_from_match_stats(&self.stats());
            metrics.set_queue_depth(self.dispatcher.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::MockIdentityService;
    use crate::services::persistence::MockMatchRecorder;
    use crate::services::provisioner::MockServerProvisioner;
    use crate::types::{DispatchEntry, Recipient};
    use std::time::Duration;

    const LOBBY: [(&str, &[&str]); 12] = [
        ("cap1", &["captain", "medic"]),
        ("cap2", &["captain", "medic"]),
        ("s1", &["scout"]),
        ("s2", &["scout"]),
        ("s3", &["scout"]),
        ("s4", &["scout"]),
        ("o1", &["soldier"]),
        ("o2", &["soldier"]),
        ("o3", &["soldier"]),
        ("o4", &["soldier"]),
        ("d1", &["demoman"]),
        ("d2", &["demoman"]),
    ];

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.service.admins = vec!["admin".to_string()];
        config
    }

    fn active_identity() -> MockIdentityService {
        let mut identity = MockIdentityService::new();
        identity.expect_is_authorized().returning(|_| Ok(true));
        identity
            .expect_idle_time()
            .returning(|_| Ok(Some(Duration::from_secs(5))));
        identity.expect_refresh().returning(|_| Ok(()));
        identity
    }

    fn provisioner() -> MockServerProvisioner {
        let mut provisioner = MockServerProvisioner::new();
        provisioner.expect_start_server().returning(|| {
            Ok(ConnectionInfo {
                address: "10.0.0.5:27015".to_string(),
                password: Some("pw".to_string()),
            })
        });
        provisioner
    }

    fn machine_with(
        identity: MockIdentityService,
        recorder: MockMatchRecorder,
        provisioner: MockServerProvisioner,
    ) -> (MatchStateMachine, Dispatcher) {
        let dispatcher = Dispatcher::new();
        let collaborators = Collaborators {
            identity: Arc::new(identity),
            recorder: Arc::new(recorder),
            provisioner: Arc::new(provisioner),
        };
        let machine =
            MatchStateMachine::new(config(), collaborators, dispatcher.clone()).with_seed(7);
        (machine, dispatcher)
    }

    fn classes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn notices_for(output: &[DispatchEntry], nick: &str) -> Vec<String> {
        output
            .iter()
            .filter(|e| e.to == Recipient::Player(nick.to_string()) && e.notice)
            .map(|e| e.body.clone())
            .collect()
    }

    async fn fill_lobby(machine: &mut MatchStateMachine) {
        for (nick, list) in LOBBY {
            machine.on_signup(nick, &classes(list)).await.unwrap();
        }
    }

    async fn run_draft(machine: &mut MatchStateMachine) {
        let plan = [
            ("s1", "scout"),
            ("s2", "scout"),
            ("s3", "scout"),
            ("s4", "scout"),
            ("o1", "soldier"),
            ("o2", "soldier"),
            ("o3", "soldier"),
            ("o4", "soldier"),
            ("d1", "demoman"),
            ("d2", "demoman"),
        ];
        for (target, class) in plan {
            let captain = machine.current_captain().unwrap().to_string();
            machine.on_pick(&captain, target, class).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_signup_validation_notices() {
        let (mut machine, dispatcher) =
            machine_with(active_identity(), MockMatchRecorder::new(), provisioner());

        assert!(machine.on_signup("alice", &[]).await.is_err());
        assert!(machine
            .on_signup("alice", &classes(&["pyro"]))
            .await
            .is_err());
        let output = dispatcher.drain();
        let notices = notices_for(&output, "alice");
        assert_eq!(
            notices[0],
            "No classes entered. Usage: !add scout soldier demoman medic captain"
        );
        assert_eq!(
            notices[1],
            "Invalid classes. Possible options are scout, soldier, demoman, medic, captain"
        );
        assert!(machine.game().signups().is_empty());

        machine
            .on_signup("alice", &classes(&["Scout", "medic", "pyro"]))
            .await
            .unwrap();
        let output = dispatcher.drain();
        assert_eq!(output.last().unwrap().body, "1 users added: alice (scout/medic)");
    }

    #[tokio::test]
    async fn test_unauthorized_players_are_warned_but_added() {
        let mut identity = MockIdentityService::new();
        identity.expect_is_authorized().returning(|nick| match nick {
            "guest" => Ok(false),
            _ => Err(anyhow::anyhow!("services unavailable")),
        });
        let (mut machine, dispatcher) =
            machine_with(identity, MockMatchRecorder::new(), provisioner());

        machine.on_signup("guest", &classes(&["scout"])).await.unwrap();
        machine.on_signup("other", &classes(&["medic"])).await.unwrap();

        let output = dispatcher.drain();
        assert!(notices_for(&output, "guest")[0].starts_with("You are not authorized"));
        assert!(notices_for(&output, "other")[0].starts_with("You are not authorized"));
        assert_eq!(machine.game().signups().len(), 2);
        assert!(!machine.game().signups().get("guest").unwrap().authorized);
    }

    #[tokio::test]
    async fn test_pick_before_drafting() {
        let (mut machine, dispatcher) =
            machine_with(active_identity(), MockMatchRecorder::new(), provisioner());

        let result = machine.on_pick("alice", "bob", "scout").await;
        assert_eq!(result, Err(PugError::PickingNotStarted));
        assert_eq!(machine.game().board().pick(), 0);
        assert_eq!(
            dispatcher.pop(),
            Some(DispatchEntry::notice("alice", "Picking has not started."))
        );
    }

    #[tokio::test]
    async fn test_remove_requires_signup() {
        let (mut machine, dispatcher) =
            machine_with(active_identity(), MockMatchRecorder::new(), provisioner());

        assert_eq!(machine.on_leave("alice").await, Err(PugError::NotSignedUp));
        machine.on_signup("alice", &classes(&["scout"])).await.unwrap();
        dispatcher.drain();

        machine.on_leave("alice").await.unwrap();
        assert!(machine.game().signups().is_empty());
        assert_eq!(dispatcher.pop().unwrap().body, "0 users added: ");
    }

    #[tokio::test]
    async fn test_queue_full() {
        let (mut machine, _dispatcher) =
            machine_with(active_identity(), MockMatchRecorder::new(), provisioner());
        for index in 0..12 {
            machine
                .on_signup(&format!("p{}", index), &classes(&["scout"]))
                .await
                .unwrap();
        }

        assert_eq!(
            machine.on_signup("late", &classes(&["scout"])).await,
            Err(PugError::QueueFull)
        );
        // Without captains the minimum is not met
        assert_eq!(machine.state(), MatchState::Waiting);

        // Updating classes is still allowed
        machine
            .on_signup("p0", &classes(&["captain", "medic"]))
            .await
            .unwrap();
        assert_eq!(machine.game().signups().captain_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_lifecycle() {
        let mut recorder = MockMatchRecorder::new();
        recorder
            .expect_record_match()
            .times(1)
            .returning(|record| {
                assert_eq!(record.teams.len(), 2);
                Ok(())
            });
        let (mut machine, dispatcher) = machine_with(active_identity(), recorder, provisioner());

        fill_lobby(&mut machine).await;
        assert_eq!(machine.state(), MatchState::DraftDelay);
        assert!(dispatcher.drain().iter().any(|e| e.body
            == "Teams are being drafted, captains will be selected in 30 seconds"));

        machine.tick().await;
        assert_eq!(machine.state(), MatchState::DraftDelay);

        tokio::time::advance(Duration::from_secs(30)).await;
        machine.tick().await;
        assert_eq!(machine.state(), MatchState::Drafting);
        assert!(machine.game().partition_holds());

        // No more adds while drafting
        assert_eq!(
            machine.on_signup("late", &classes(&["scout"])).await,
            Err(PugError::CannotAdd)
        );

        run_draft(&mut machine).await;

        assert_eq!(machine.state(), MatchState::Waiting);
        assert!(machine.game().signups().is_empty());
        assert!(!machine.game().board().is_active());
        assert_eq!(machine.stats().matches_completed, 1);
        assert!(!machine.is_degraded());

        let output = dispatcher.drain();
        assert!(output
            .iter()
            .any(|e| e.body == "The server info is: connect 10.0.0.5:27015; password pw"));
        assert!(output.iter().any(|e| !e.notice
            && e.body
                == "You are captain of Red and will play medic. The server info is: connect 10.0.0.5:27015; password pw"));
        assert_eq!(
            output.last().unwrap().body,
            "0 users added: ".to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_collaborator_failures_degrade_without_rollback() {
        let mut recorder = MockMatchRecorder::new();
        recorder
            .expect_record_match()
            .returning(|_| Err(anyhow::anyhow!("database down")));
        let mut failing = MockServerProvisioner::new();
        failing
            .expect_start_server()
            .returning(|| Err(anyhow::anyhow!("no capacity")));
        let (mut machine, dispatcher) = machine_with(active_identity(), recorder, failing);

        fill_lobby(&mut machine).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        machine.tick().await;
        run_draft(&mut machine).await;

        assert_eq!(machine.state(), MatchState::Waiting);
        assert!(machine.is_degraded());
        assert_eq!(machine.unreconciled().len(), 1);
        assert!(machine.unreconciled()[0].server.is_none());

        let output = dispatcher.drain();
        assert!(output
            .iter()
            .any(|e| e.body == "The server info is: to be announced"));
        assert!(output.iter().any(|e| e.body
            == "Match statistics could not be saved. An admin has been notified."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_afk_players_removed_after_grace() {
        let mut identity = MockIdentityService::new();
        identity.expect_is_authorized().returning(|_| Ok(true));
        identity.expect_refresh().returning(|_| Ok(()));
        identity.expect_idle_time().returning(|nick| match nick {
            "s4" => Ok(Some(Duration::from_secs(3600))),
            _ => Ok(Some(Duration::from_secs(1))),
        });
        let (mut machine, dispatcher) =
            machine_with(identity, MockMatchRecorder::new(), provisioner());

        fill_lobby(&mut machine).await;
        assert_eq!(machine.state(), MatchState::AfkCheck);
        let output = dispatcher.drain();
        assert!(output
            .iter()
            .any(|e| e.body == "The following players are considered afk: s4"));

        tokio::time::advance(Duration::from_secs(44)).await;
        machine.tick().await;
        assert_eq!(machine.state(), MatchState::AfkCheck);

        tokio::time::advance(Duration::from_secs(1)).await;
        machine.tick().await;
        assert_eq!(machine.state(), MatchState::Waiting);
        assert!(!machine.game().signups().contains("s4"));
        assert!(dispatcher
            .drain()
            .iter()
            .any(|e| e.body == "Removed afk players: s4"));
    }

    #[tokio::test]
    async fn test_captain_check_allows_captain_when_history_is_unavailable() {
        let mut recorder = MockMatchRecorder::new();
        recorder
            .expect_games_played()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("database down")));
        let dispatcher = Dispatcher::new();
        let collaborators = Collaborators {
            identity: Arc::new(active_identity()),
            recorder: Arc::new(recorder),
            provisioner: Arc::new(provisioner()),
        };
        let mut config = config();
        config.pug.captain_min_games = 10;
        let mut machine = MatchStateMachine::new(config, collaborators, dispatcher.clone());

        machine
            .on_signup("alice", &classes(&["captain", "medic"]))
            .await
            .unwrap();
        assert_eq!(machine.game().signups().captain_count(), 1);
        assert!(notices_for(&dispatcher.drain(), "alice").is_empty());

        // No captain role requested, no history lookup
        machine.on_signup("bob", &classes(&["scout"])).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_endgame_during_countdown_restarts() {
        let (mut machine, dispatcher) =
            machine_with(active_identity(), MockMatchRecorder::new(), provisioner());
        fill_lobby(&mut machine).await;
        assert_eq!(machine.state(), MatchState::DraftDelay);

        machine.end_game("admin").await.unwrap();
        assert_eq!(machine.game().signups().len(), 12);
        assert_eq!(machine.state(), MatchState::DraftDelay);

        tokio::time::advance(Duration::from_secs(30)).await;
        machine.tick().await;
        assert_eq!(machine.state(), MatchState::Drafting);
        assert!(dispatcher
            .drain()
            .iter()
            .any(|e| e.body == "The pug has been ended by admin."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_endgame_and_replace_require_admin() {
        let (mut machine, dispatcher) =
            machine_with(active_identity(), MockMatchRecorder::new(), provisioner());
        fill_lobby(&mut machine).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        machine.tick().await;
        dispatcher.drain();

        assert_eq!(
            machine.replace("s1", "s2", "x").await,
            Err(PugError::NotAdmin {
                command: "replace".to_string()
            })
        );
        assert_eq!(
            machine.replace("admin", "s1", "s2").await,
            Err(PugError::AlreadyPlaying {
                player: "s2".to_string()
            })
        );
        assert_eq!(
            machine.replace("admin", "ghost", "x").await,
            Err(PugError::PlayerNotFound {
                target: "ghost".to_string()
            })
        );

        machine.replace("admin", "s1", "sub").await.unwrap();
        assert!(machine.game().signups().contains("sub"));
        assert!(!machine.game().is_playing("s1"));

        assert!(machine.end_game("s2").await.is_err());
        assert_eq!(machine.state(), MatchState::Drafting);

        machine.end_game("admin").await.unwrap();
        assert_eq!(machine.state(), MatchState::Waiting);
        assert!(!machine.game().board().is_active());
        // Captains went back to nothing; unpicked players stay queued
        assert_eq!(machine.game().signups().len(), 10);
        assert!(dispatcher
            .drain()
            .iter()
            .any(|e| e.body == "The pug has been ended by admin."));
    }
}
