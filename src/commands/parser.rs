//! Chat command parsing

use crate::error::{PugError, PugResult};

/// Prefix marking a chat line as a command
pub const COMMAND_PREFIX: char = '!';

/// A recognized chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Add { classes: Vec<String> },
    Remove,
    Pick { target: String, class: String },
    List,
    /// `!listcaps` or `!need`
    ListClasses,
    Captain,
    Format,
    Replace { old: String, new: String },
    EndGame,
}

impl ChatCommand {
    /// Parse a chat line
    ///
    /// Returns `None` for ordinary chat and unknown commands, and a usage
    /// error when a known command is missing arguments.
    pub fn parse(text: &str) -> Option<PugResult<ChatCommand>> {
        let body = text.trim().strip_prefix(COMMAND_PREFIX)?;
        let mut words = body.split_whitespace();
        let name = words.next()?.to_lowercase();
        let args: Vec<String> = words.map(str::to_string).collect();

        let command = match name.as_str() {
            "add" => Ok(ChatCommand::Add { classes: args }),
            "remove" => Ok(ChatCommand::Remove),
            "pick" => match args.as_slice() {
                [target, class, ..] => Ok(ChatCommand::Pick {
                    target: target.clone(),
                    class: class.clone(),
                }),
                _ => Err(usage("!pick <name|number|random> <class>")),
            },
            "list" => Ok(ChatCommand::List),
            "listcaps" | "need" => Ok(ChatCommand::ListClasses),
            "captain" => Ok(ChatCommand::Captain),
            "format" => Ok(ChatCommand::Format),
            "replace" => match args.as_slice() {
                [old, new, ..] => Ok(ChatCommand::Replace {
                    old: old.clone(),
                    new: new.clone(),
                }),
                _ => Err(usage("!replace <old> <new>")),
            },
            "endgame" => Ok(ChatCommand::EndGame),
            _ => return None,
        };

        Some(command)
    }

    /// Command name without prefix, for logs
    pub fn name(&self) -> &'static str {
        match self {
            ChatCommand::Add { .. } => "add",
            ChatCommand::Remove => "remove",
            ChatCommand::Pick { .. } => "pick",
            ChatCommand::List => "list",
            ChatCommand::ListClasses => "listcaps",
            ChatCommand::Captain => "captain",
            ChatCommand::Format => "format",
            ChatCommand::Replace { .. } => "replace",
            ChatCommand::EndGame => "endgame",
        }
    }
}

fn usage(text: &str) -> PugError {
    PugError::Usage {
        usage: text.to_string(),
    }
}
