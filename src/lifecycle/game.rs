//! The single live match

use super::state::MatchState;
use crate::afk::PendingAfkCheck;
use crate::draft::DraftBoard;
use crate::signup::SignupRegistry;
use std::collections::HashSet;
use tokio::time::Instant;

/// Lobby aggregate: state, signups and draft-scoped data
#[derive(Debug, Default)]
pub struct Match {
    state: MatchState,
    signups: SignupRegistry,
    board: DraftBoard,
    pending_afk: Option<PendingAfkCheck>,
    draft_deadline: Option<Instant>,
    draft_started: Option<Instant>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn set_state(&mut self, state: MatchState) {
        self.state = state;
    }

    pub fn signups(&self) -> &SignupRegistry {
        &self.signups
    }

    pub fn signups_mut(&mut self) -> &mut SignupRegistry {
        &mut self.signups
    }

    pub fn board(&self) -> &DraftBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut DraftBoard {
        &mut self.board
    }

    /// Both halves the draft engine mutates
    pub fn draft_parts(&mut self) -> (&mut SignupRegistry, &mut DraftBoard) {
        (&mut self.signups, &mut self.board)
    }

    pub fn pending_afk(&self) -> Option<&PendingAfkCheck> {
        self.pending_afk.as_ref()
    }

    pub fn set_pending_afk(&mut self, pending: PendingAfkCheck) {
        self.pending_afk = Some(pending);
    }

    pub fn take_pending_afk(&mut self) -> Option<PendingAfkCheck> {
        self.pending_afk.take()
    }

    pub fn draft_deadline(&self) -> Option<Instant> {
        self.draft_deadline
    }

    pub fn set_draft_deadline(&mut self, deadline: Instant) {
        self.draft_deadline = Some(deadline);
    }

    pub fn take_draft_deadline(&mut self) -> Option<Instant> {
        self.draft_deadline.take()
    }

    pub fn mark_draft_started(&mut self) {
        self.draft_started = Some(Instant::now());
    }

    pub fn draft_started(&self) -> Option<Instant> {
        self.draft_started
    }

    /// Signed up, captaining or already picked
    pub fn is_playing(&self, nick: &str) -> bool {
        self.signups.contains(nick) || self.board.is_drafted(nick)
    }

    /// Drop draft state, pending checks and deadlines; signups are untouched
    pub fn clear_draft(&mut self) {
        self.board.clear();
        self.pending_afk = None;
        self.draft_deadline = None;
        self.draft_started = None;
    }

    /// Every player is either unpicked or on exactly one team
    pub fn partition_holds(&self) -> bool {
        let mut seen = HashSet::new();
        for team in self.board.teams() {
            for member in team.members() {
                if !seen.insert(member.clone()) || self.signups.contains(&member) {
                    return false;
                }
            }
        }
        true
    }
}
