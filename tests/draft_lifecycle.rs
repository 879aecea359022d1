//! End-to-end lobby scenarios driven through chat commands

mod fixtures;

use fixtures::*;
use pug_room::config::EndgameSignupPolicy;
use pug_room::error::PugError;
use pug_room::lifecycle::MatchState;
use pug_room::services::MatchRecorder;
use pug_room::types::{MatchRecord, Recipient, RosterEntry, TeamRecord};
use pug_room::utils::{current_timestamp, generate_match_id};
use proptest::prelude::*;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_full_draft_through_chat() {
    let mut lobby = TestLobby::new(test_config());

    assert!(lobby.say("bystander", "good luck everyone").await.is_none());
    lobby.fill().await;
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);

    let output = lobby.drain();
    let channel = channel_messages(&output);
    assert!(channel.contains(&"Teams are being drafted, captains will be selected in 30 seconds".to_string()));

    lobby.finish_countdown().await;
    assert_eq!(lobby.machine.state(), MatchState::Drafting);
    // Numbered before the captains leave the queue
    assert_eq!(lobby.machine.game().board().lookup_len(), 12);

    // Late signups are turned away while captains pick
    let late = lobby.say("late", "!add scout").await;
    assert_eq!(late, Some(Err(PugError::CannotAdd)));

    lobby.draft_all().await;
    assert_eq!(lobby.machine.state(), MatchState::Waiting);
    assert!(lobby.machine.game().signups().is_empty());
    assert_eq!(lobby.machine.stats().matches_completed, 1);

    let records = lobby.recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].player_count(), 12);
    assert_eq!(
        records[0].server.as_ref().map(|s| s.connect_string()),
        Some("connect 10.0.0.5:27015; password pw".to_string())
    );

    let output = lobby.drain();
    let channel = channel_messages(&output);
    assert!(channel
        .iter()
        .any(|m| m == "The server info is: connect 10.0.0.5:27015; password pw"));
    assert!(channel
        .iter()
        .any(|m| m == "Game started. Add to the pug using the !add command."));

    for (nick, _) in LOBBY {
        let private = private_to(&output, nick);
        assert!(
            private.iter().any(|m| m.ends_with("The server info is: connect 10.0.0.5:27015; password pw")),
            "{} was not told the server",
            nick
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_pick_by_lookup_number() {
    let mut lobby = TestLobby::new(test_config());
    lobby.fill().await;
    lobby.finish_countdown().await;

    let captain = lobby.machine.current_captain().unwrap().to_string();
    let number = lobby
        .machine
        .game()
        .board()
        .lookup_number("d1")
        .unwrap();

    let result = lobby
        .say(&captain, &format!("!pick {} demoman", number))
        .await;
    assert_eq!(result, Some(Ok(())));
    assert!(lobby.machine.game().board().is_drafted("d1"));

    // The same number now refers to a drafted player
    let next = lobby.machine.current_captain().unwrap().to_string();
    let again = lobby
        .say(&next, &format!("!pick {} demoman", number))
        .await;
    assert_eq!(
        again,
        Some(Err(PugError::AlreadyPicked {
            player: "d1".to_string()
        }))
    );
}

#[tokio::test]
async fn test_pick_while_waiting_is_rejected() {
    let mut lobby = TestLobby::new(test_config());
    lobby.say("cap1", "!add captain medic").await;
    lobby.drain();

    let result = lobby.say("cap1", "!pick s1 scout").await;
    assert_eq!(result, Some(Err(PugError::PickingNotStarted)));
    assert_eq!(lobby.machine.game().board().pick(), 0);

    let output = lobby.drain();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].to, Recipient::Player("cap1".to_string()));
    assert!(output[0].notice);
    assert_eq!(output[0].body, "Picking has not started.");
}

#[tokio::test]
async fn test_usage_errors_are_noticed() {
    let mut lobby = TestLobby::new(test_config());

    let result = lobby.say("alice", "!pick alice").await;
    assert!(matches!(result, Some(Err(PugError::Usage { .. }))));

    let output = lobby.drain();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].body, "Usage: !pick <name|number|random> <class>");
}

#[tokio::test(start_paused = true)]
async fn test_rejected_picks_leave_the_draft_untouched() {
    let mut lobby = TestLobby::new(test_config());
    lobby.fill().await;
    lobby.finish_countdown().await;
    lobby.drain();

    let captain = lobby.machine.current_captain().unwrap().to_string();
    let other = if captain == "cap1" { "cap2" } else { "cap1" };

    let result = lobby.say(other, "!pick s1 scout").await;
    assert_eq!(result, Some(Err(PugError::NotYourTurn)));

    let result = lobby.say(&captain, "!pick s1 pyro").await;
    assert_eq!(
        result,
        Some(Err(PugError::InvalidClass {
            class: "pyro".to_string()
        }))
    );

    let result = lobby.say(&captain, "!pick nobody scout").await;
    assert_eq!(
        result,
        Some(Err(PugError::PlayerNotFound {
            target: "nobody".to_string()
        }))
    );

    assert_eq!(lobby.machine.game().board().pick(), 0);
    assert!(lobby.machine.game().partition_holds());
}

#[tokio::test(start_paused = true)]
async fn test_endgame_keeps_unpicked_signups() {
    let mut lobby = TestLobby::new(test_config_with_policy(EndgameSignupPolicy::Keep));
    lobby.fill().await;
    lobby.finish_countdown().await;

    let captain = lobby.machine.current_captain().unwrap().to_string();
    lobby.say(&captain, "!pick s1 scout").await;

    let result = lobby.say("admin", "!endgame").await;
    assert_eq!(result, Some(Ok(())));
    assert_eq!(lobby.machine.state(), MatchState::Waiting);
    assert!(!lobby.machine.game().board().is_active());
    // Captains and the picked player left the queue when the draft began
    assert_eq!(lobby.machine.game().signups().len(), 9);
    assert!(!lobby.machine.game().signups().contains("s1"));

    let channel = channel_messages(&lobby.drain());
    assert!(channel.contains(&"The pug has been ended by admin.".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_endgame_during_countdown_restarts_a_full_lobby() {
    let mut lobby = TestLobby::new(test_config_with_policy(EndgameSignupPolicy::Keep));
    lobby.fill().await;
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);
    lobby.drain();

    assert_eq!(lobby.say("admin", "!endgame").await, Some(Ok(())));
    assert_eq!(lobby.machine.game().signups().len(), 12);
    // Everyone is still active, so the countdown starts over
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);

    let channel = channel_messages(&lobby.drain());
    let ended = channel
        .iter()
        .position(|m| m == "The pug has been ended by admin.")
        .unwrap();
    let restarted = channel
        .iter()
        .position(|m| m.starts_with("Teams are being drafted"))
        .unwrap();
    assert!(ended < restarted);

    assert_eq!(
        lobby.say("late", "!add scout").await,
        Some(Err(PugError::QueueFull))
    );
    assert_eq!(lobby.machine.game().signups().len(), 12);

    lobby.finish_countdown().await;
    assert_eq!(lobby.machine.state(), MatchState::Drafting);
    lobby.draft_all().await;
    assert_eq!(lobby.recorder.len(), 1);
}

#[tokio::test]
async fn test_signups_never_exceed_the_team_slots() {
    let mut lobby = TestLobby::new(test_config());
    // Twelve players but only one captain, so the lobby keeps waiting
    lobby.say("cap1", "!add captain medic").await;
    lobby.say("cap2", "!add medic").await;
    for (nick, text) in LOBBY.iter().skip(2) {
        assert_eq!(lobby.say(nick, text).await, Some(Ok(())));
    }
    assert_eq!(lobby.machine.state(), MatchState::Waiting);

    for nick in ["late1", "late2"] {
        assert_eq!(
            lobby.say(nick, "!add captain scout").await,
            Some(Err(PugError::QueueFull))
        );
    }
    assert_eq!(
        lobby.machine.game().signups().len(),
        lobby.machine.config().teams.total_slots()
    );

    // A queued player can still become the second captain
    assert_eq!(lobby.say("cap2", "!add captain medic").await, Some(Ok(())));
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);
}

#[tokio::test(start_paused = true)]
async fn test_random_pick_through_chat() {
    let mut lobby = TestLobby::new(test_config());
    lobby.fill().await;
    lobby.finish_countdown().await;
    lobby.drain();

    let captain = lobby.machine.current_captain().unwrap().to_string();
    let result = lobby.say(&captain, "!pick random soldier").await;
    assert_eq!(result, Some(Ok(())));
    assert_eq!(lobby.machine.game().board().pick(), 1);
    assert_eq!(lobby.machine.game().signups().count_for_class("soldier"), 3);

    let channel = channel_messages(&lobby.drain());
    assert!(channel
        .iter()
        .any(|m| m.starts_with(&format!("{} picked o", captain)) && m.ends_with(" as soldier")));
    assert!(lobby.machine.game().partition_holds());
}

#[tokio::test]
async fn test_restricted_players_cannot_add() {
    let mut config = test_config();
    config.pug.restricted = vec!["Griefer".to_string()];
    let mut lobby = TestLobby::new(config);

    assert_eq!(
        lobby.say("griefer", "!add scout").await,
        Some(Err(PugError::Restricted))
    );
    assert!(lobby.machine.game().signups().is_empty());
    assert_eq!(
        private_to(&lobby.drain(), "griefer"),
        vec!["You are restricted from playing in this channel.".to_string()]
    );
}

#[tokio::test]
async fn test_captain_role_needs_recorded_games() {
    let mut config = test_config();
    config.pug.captain_min_games = 2;
    let mut lobby = TestLobby::new(config);

    let veteran = MatchRecord {
        match_id: generate_match_id(),
        teams: vec![TeamRecord {
            name: "Red".to_string(),
            captain: "cap1".to_string(),
            roster: vec![RosterEntry {
                nick: "cap1".to_string(),
                class: "medic".to_string(),
            }],
        }],
        server: None,
        timestamp: current_timestamp(),
    };
    lobby.recorder.record_match(&veteran).await.unwrap();
    lobby.recorder.record_match(&veteran).await.unwrap();

    assert_eq!(lobby.say("cap1", "!add captain medic").await, Some(Ok(())));
    assert!(lobby.machine.game().signups().get("cap1").unwrap().can_captain());

    // The rookie is added without the captain role
    assert_eq!(lobby.say("rookie", "!add captain medic").await, Some(Ok(())));
    assert_eq!(
        lobby.machine.game().signups().get("rookie").map(|s| s.classes.clone()),
        Some(vec!["medic".to_string()])
    );
    assert_eq!(
        lobby.say("rookie", "!add captain").await,
        Some(Err(PugError::NoValidClasses {
            options: "scout, soldier, demoman, medic, captain".to_string()
        }))
    );

    let notices = private_to(&lobby.drain(), "rookie");
    assert_eq!(
        notices[0],
        "You need 2 more games before you can add as captain."
    );
    assert!(notices[2].starts_with("Invalid classes."));
    assert_eq!(lobby.machine.game().signups().captain_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_endgame_clears_signups() {
    let mut lobby = TestLobby::new(test_config_with_policy(EndgameSignupPolicy::Clear));
    lobby.fill().await;

    let result = lobby.say("admin", "!endgame").await;
    assert_eq!(result, Some(Ok(())));
    assert_eq!(lobby.machine.state(), MatchState::Waiting);
    assert!(lobby.machine.game().signups().is_empty());

    // A fresh lobby can form straight away
    lobby.fill().await;
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);
}

#[tokio::test]
async fn test_endgame_requires_admin() {
    let mut lobby = TestLobby::new(test_config());
    lobby.fill_partial(&["s1", "s2"]).await;

    let result = lobby.say("s1", "!endgame").await;
    assert_eq!(
        result,
        Some(Err(PugError::NotAdmin {
            command: "endgame".to_string()
        }))
    );
    assert_eq!(lobby.machine.game().signups().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_players_get_a_grace_period() {
    let mut lobby = TestLobby::new(test_config());
    lobby.identity.set_unknown("s2");
    lobby.identity.set_idle("o3", Duration::from_secs(3600));

    lobby.fill().await;
    assert_eq!(lobby.machine.state(), MatchState::AfkCheck);
    // Nobody is removed on the first pass
    assert_eq!(lobby.machine.game().signups().len(), 12);

    let output = lobby.drain();
    assert!(channel_messages(&output)
        .contains(&"The following players are considered afk: s2, o3".to_string()));
    assert_eq!(private_to(&output, "s2").len(), 1);
    assert_eq!(private_to(&output, "o3").len(), 1);

    // o3 speaks up during the grace period, s2 stays silent
    lobby.identity.set_active("o3");
    tokio::time::advance(Duration::from_secs(44)).await;
    lobby.machine.tick().await;
    assert_eq!(lobby.machine.state(), MatchState::AfkCheck);

    tokio::time::advance(Duration::from_secs(1)).await;
    lobby.machine.tick().await;

    let signups = lobby.machine.game().signups();
    assert!(!signups.contains("s2"));
    assert!(signups.contains("o3"));
    assert_eq!(signups.len(), 11);
    // Below the minimum again
    assert_eq!(lobby.machine.state(), MatchState::Waiting);

    let channel = channel_messages(&lobby.drain());
    assert!(channel.contains(&"Removed afk players: s2".to_string()));

    // Refreshed once per pass
    assert_eq!(lobby.identity.refresh_count("s2"), 2);
    assert_eq!(lobby.identity.refresh_count("o3"), 2);
    assert_eq!(lobby.identity.refresh_count("s1"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_replacement_rejoins_after_afk_removal() {
    let mut lobby = TestLobby::new(test_config());
    lobby.identity.set_unknown("d2");
    lobby.fill().await;

    tokio::time::advance(Duration::from_secs(45)).await;
    lobby.machine.tick().await;
    assert_eq!(lobby.machine.state(), MatchState::Waiting);

    lobby.say("d3", "!add demoman").await;
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);
}

#[tokio::test(start_paused = true)]
async fn test_leaving_during_countdown_returns_to_waiting() {
    let mut lobby = TestLobby::new(test_config());
    lobby.fill().await;
    assert_eq!(lobby.machine.state(), MatchState::DraftDelay);

    assert_eq!(lobby.say("s4", "!remove").await, Some(Ok(())));
    lobby.drain();

    lobby.finish_countdown().await;
    assert_eq!(lobby.machine.state(), MatchState::Waiting);

    let channel = channel_messages(&lobby.drain());
    assert!(channel.iter().any(|m| m.starts_with("Classes needed:")));
}

#[tokio::test(start_paused = true)]
async fn test_collaborator_failures_degrade_the_lobby() {
    let mut lobby = TestLobby::new(test_config());
    lobby.recorder.set_failing(true);
    lobby.provisioner.set_failing(true);

    lobby.fill().await;
    lobby.finish_countdown().await;
    lobby.draft_all().await;

    // The draft still completes and the lobby resets
    assert_eq!(lobby.machine.state(), MatchState::Waiting);
    assert!(lobby.machine.is_degraded());
    assert_eq!(lobby.machine.unreconciled().len(), 1);
    assert!(lobby.machine.unreconciled()[0].server.is_none());
    assert!(lobby.recorder.is_empty());

    let output = lobby.drain();
    let channel = channel_messages(&output);
    assert!(channel.contains(&"The server info is: to be announced".to_string()));
    assert!(channel.contains(
        &"Match statistics could not be saved. An admin has been notified.".to_string()
    ));
}

#[tokio::test(start_paused = true)]
async fn test_captain_and_format_queries() {
    let mut lobby = TestLobby::new(test_config());

    let result = lobby.say("s1", "!captain").await;
    assert_eq!(result, Some(Err(PugError::PickingNotStarted)));

    lobby.say("s1", "!format").await;
    lobby.say("s1", "!need").await;
    let channel = channel_messages(&lobby.drain());
    assert_eq!(channel.len(), 2);
    assert_eq!(
        channel[1],
        "Classes needed: 4 scout, 4 soldier, 2 demoman, 2 medic, 2 captain, 12 players"
    );

    lobby.fill().await;
    lobby.finish_countdown().await;
    lobby.drain();

    assert_eq!(lobby.say("s1", "!captain").await, Some(Ok(())));
    assert_eq!(channel_messages(&lobby.drain()).len(), 1);
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_signups_and_teams_never_overlap(
        attempts in prop::collection::vec((0usize..2, 0usize..14, 0usize..5), 1..60)
    ) {
        const TARGETS: [&str; 14] = [
            "cap1", "cap2", "s1", "s2", "s3", "s4", "o1", "o2", "o3", "o4", "d1", "d2", "3", "nobody",
        ];
        const CLASSES: [&str; 5] = ["scout", "soldier", "demoman", "medic", "spy"];

        runtime().block_on(async {
            let mut lobby = TestLobby::new(test_config());
            lobby.fill().await;
            lobby.finish_countdown().await;

            for (captain, target, class) in attempts {
                let captain = if captain == 0 { "cap1" } else { "cap2" };
                let text = format!("!pick {} {}", TARGETS[target], CLASSES[class]);
                lobby.say(captain, &text).await;

                prop_assert!(lobby.machine.game().partition_holds());
                let picked = lobby.machine.game().board().drafted_players().len();
                let pick = lobby.machine.game().board().pick();
                if lobby.machine.state() == MatchState::Drafting {
                    prop_assert_eq!(picked, pick + 2);
                    prop_assert_eq!(lobby.machine.game().signups().len() + pick, 10);
                }
            }
            Ok(())
        })?;
    }
}
