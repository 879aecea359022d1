//! Console transport for local runs
//!
//! Each stdin line of the form `nick: text` is treated as a channel line
//! from `nick`.

use crate::types::ChatLine;
use crate::utils::current_timestamp;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tracing::{debug, info, warn};

/// Parse a `nick: text` console line
pub fn parse_console_line(input: &str) -> Option<ChatLine> {
    let (nick, text) = input.split_once(':')?;
    let nick = nick.trim();
    if nick.is_empty() || nick.chars().any(char::is_whitespace) {
        return None;
    }

    Some(ChatLine {
        nick: nick.to_string(),
        text: text.trim().to_string(),
        timestamp: current_timestamp(),
    })
}

/// Forward stdin lines until EOF or until the receiver goes away
pub async fn read_stdin(sender: mpsc::Sender<ChatLine>) {
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    info!("Reading chat from stdin as 'nick: text'");

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                break;
            }
        };

        match parse_console_line(&line) {
            Some(chat) => {
                if sender.send(chat).await.is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => debug!("Ignoring console input without a nick: {:?}", line),
        }
    }

    info!("Console input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_console_line() {
        let line = parse_console_line("alice: !add scout medic").unwrap();
        assert_eq!(line.nick, "alice");
        assert_eq!(line.text, "!add scout medic");

        let line = parse_console_line("bob:hello: there").unwrap();
        assert_eq!(line.nick, "bob");
        assert_eq!(line.text, "hello: there");
    }

    #[test]
    fn test_rejects_lines_without_nick() {
        assert!(parse_console_line("no separator").is_none());
        assert!(parse_console_line(": !add scout").is_none());
        assert!(parse_console_line("two words: !add").is_none());
    }
}
