//! Test fixtures and collaborator doubles for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use pug_room::commands::CommandRouter;
use pug_room::config::{AppConfig, EndgameSignupPolicy};
use pug_room::dispatch::Dispatcher;
use pug_room::error::{PugError, PugResult, Result};
use pug_room::lifecycle::{Collaborators, MatchStateMachine};
use pug_room::services::{IdentityService, InMemoryMatchRecorder, ServerProvisioner};
use pug_room::types::{ChatLine, ConnectionInfo, DispatchEntry, Recipient};
use pug_room::utils::current_timestamp;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A full 6v6 lobby: two captains who play medic and ten field players
pub const LOBBY: [(&str, &str); 12] = [
    ("cap1", "!add captain medic"),
    ("cap2", "!add captain medic"),
    ("s1", "!add scout"),
    ("s2", "!add scout"),
    ("s3", "!add scout"),
    ("s4", "!add scout"),
    ("o1", "!add soldier"),
    ("o2", "!add soldier"),
    ("o3", "!add soldier"),
    ("o4", "!add soldier"),
    ("d1", "!add demoman"),
    ("d2", "!add demoman"),
];

/// Picks that complete a draft of [`LOBBY`] under any pick order
pub const DRAFT_PLAN: [(&str, &str); 10] = [
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

/// Default configuration with an admin and a fixed server
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.service.admins = vec!["admin".to_string()];
    config.server.address = "10.0.0.5:27015".to_string();
    config.server.password = Some("pw".to_string());
    config
}

pub fn test_config_with_policy(policy: EndgameSignupPolicy) -> AppConfig {
    let mut config = test_config();
    config.pug.endgame_signups = policy;
    config
}

pub fn chat(nick: &str, text: &str) -> ChatLine {
    ChatLine {
        nick: nick.to_string(),
        text: text.to_string(),
        timestamp: current_timestamp(),
    }
}

/// Identity service whose answers are set by the test
///
/// Every nick is authorized and active unless told otherwise.
#[derive(Debug, Default)]
pub struct ScriptedIdentity {
    idle: Mutex<HashMap<String, Option<Duration>>>,
    unauthorized: Mutex<HashSet<String>>,
    refreshes: Mutex<Vec<String>>,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_idle(&self, nick: &str, idle: Duration) {
        self.idle.lock().unwrap().insert(nick.to_string(), Some(idle));
    }

    /// Make the nick unknown to the network
    pub fn set_unknown(&self, nick: &str) {
        self.idle.lock().unwrap().insert(nick.to_string(), None);
    }

    /// Back to active
    pub fn set_active(&self, nick: &str) {
        self.idle.lock().unwrap().remove(nick);
    }

    pub fn set_unauthorized(&self, nick: &str) {
        self.unauthorized.lock().unwrap().insert(nick.to_string());
    }

    pub fn refresh_count(&self, nick: &str) -> usize {
        self.refreshes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.as_str() == nick)
            .count()
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentity {
    async fn is_authorized(&self, nick: &str) -> Result<bool> {
        Ok(!self.unauthorized.lock().unwrap().contains(nick))
    }

    async fn idle_time(&self, nick: &str) -> Result<Option<Duration>> {
        Ok(self
            .idle
            .lock()
            .unwrap()
            .get(nick)
            .cloned()
            .unwrap_or(Some(Duration::from_secs(1))))
    }

    async fn refresh(&self, nick: &str) -> Result<()> {
        self.refreshes.lock().unwrap().push(nick.to_string());
        Ok(())
    }
}

/// Provisioner that can be switched into failure
#[derive(Debug, Default)]
pub struct SwitchableProvisioner {
    failing: AtomicBool,
}

impl SwitchableProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ServerProvisioner for SwitchableProvisioner {
    async fn start_server(&self) -> Result<ConnectionInfo> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PugError::ProvisioningFailed {
                message: "no servers available".to_string(),
            }
            .into());
        }
        Ok(ConnectionInfo {
            address: "10.0.0.5:27015".to_string(),
            password: Some("pw".to_string()),
        })
    }
}

/// A state machine wired to in-process collaborators
pub struct TestLobby {
    pub machine: MatchStateMachine,
    pub dispatcher: Dispatcher,
    pub identity: Arc<ScriptedIdentity>,
    pub recorder: Arc<InMemoryMatchRecorder>,
    pub provisioner: Arc<SwitchableProvisioner>,
}

impl TestLobby {
    pub fn new(config: AppConfig) -> Self {
        let dispatcher = Dispatcher::new();
        let identity = Arc::new(ScriptedIdentity::new());
        let recorder = Arc::new(InMemoryMatchRecorder::new());
        let provisioner = Arc::new(SwitchableProvisioner::new());

        let collaborators = Collaborators {
            identity: identity.clone(),
            recorder: recorder.clone(),
            provisioner: provisioner.clone(),
        };
        let machine =
            MatchStateMachine::new(config, collaborators, dispatcher.clone()).with_seed(42);

        Self {
            machine,
            dispatcher,
            identity,
            recorder,
            provisioner,
        }
    }

    /// Feed one chat line through the command router
    pub async fn say(&mut self, nick: &str, text: &str) -> Option<PugResult<()>> {
        CommandRouter::route(&mut self.machine, &chat(nick, text)).await
    }

    /// Add every player in [`LOBBY`]
    pub async fn fill(&mut self) {
        for (nick, text) in LOBBY {
            let result = self.say(nick, text).await;
            assert!(matches!(result, Some(Ok(()))), "{} failed to add", nick);
        }
    }

    /// Add only the named players from [`LOBBY`]
    pub async fn fill_partial(&mut self, nicks: &[&str]) {
        for (nick, text) in LOBBY.iter().filter(|(nick, _)| nicks.contains(nick)) {
            let result = self.say(nick, text).await;
            assert!(matches!(result, Some(Ok(()))), "{} failed to add", nick);
        }
    }

    /// Let the draft countdown run out
    pub async fn finish_countdown(&mut self) {
        let delay = self.machine.config().draft_delay();
        tokio::time::advance(delay).await;
        self.machine.tick().await;
    }

    /// Run every pick in [`DRAFT_PLAN`] as whichever captain is up
    pub async fn draft_all(&mut self) {
        for (target, class) in DRAFT_PLAN {
            let captain = self
                .machine
                .current_captain()
                .expect("a captain should be picking")
                .to_string();
            let result = self.say(&captain, &format!("!pick {} {}", target, class)).await;
            assert!(matches!(result, Some(Ok(()))), "pick of {} failed", target);
        }
    }

    pub fn drain(&self) -> Vec<DispatchEntry> {
        self.dispatcher.drain()
    }
}

/// Channel messages in order
pub fn channel_messages(output: &[DispatchEntry]) -> Vec<String> {
    output
        .iter()
        .filter(|entry| entry.to == Recipient::Channel)
        .map(|entry| entry.body.clone())
        .collect()
}

/// Everything sent privately to one nick
pub fn private_to(output: &[DispatchEntry], nick: &str) -> Vec<String> {
    output
        .iter()
        .filter(|entry| entry.to == Recipient::Player(nick.to_string()))
        .map(|entry| entry.body.clone())
        .collect()
}
