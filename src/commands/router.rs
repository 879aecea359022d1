//! Routes parsed chat commands to the state machine

use super::parser::ChatCommand;
use crate::error::PugResult;
use crate::lifecycle::MatchStateMachine;
use crate::types::ChatLine;
use tracing::debug;

pub struct CommandRouter;

impl CommandRouter {
    /// Handle one chat line
    ///
    /// Returns `None` when the line is not a command.
    pub async fn route(machine: &mut MatchStateMachine, line: &ChatLine) -> Option<PugResult<()>> {
        let command = match ChatCommand::parse(&line.text)? {
            Ok(command) => command,
            Err(e) => {
                machine.dispatcher().notice(line.nick.as_str(), e.to_string());
                return Some(Err(e));
            }
        };

        debug!("{} issued !{}", line.nick, command.name());
        Some(Self::execute(machine, &line.nick, command).await)
    }

    /// Run a parsed command on behalf of a nick
    pub async fn execute(
        machine: &mut MatchStateMachine,
        nick: &str,
        command: ChatCommand,
    ) -> PugResult<()> {
        match command {
            ChatCommand::Add { classes } => machine.on_signup(nick, &classes).await,
            ChatCommand::Remove => machine.on_leave(nick).await,
            ChatCommand::Pick { target, class } => machine.on_pick(nick, &target, &class).await,
            ChatCommand::List => {
                machine.list_signups();
                Ok(())
            }
            ChatCommand::ListClasses => {
                machine.list_classes_needed();
                Ok(())
            }
            ChatCommand::Captain => machine.list_captain(nick),
            ChatCommand::Format => {
                machine.list_format();
                Ok(())
            }
            ChatCommand::Replace { old, new } => machine.replace(nick, &old, &new).await,
            ChatCommand::EndGame => machine.end_game(nick).await,
        }
    }
}
