//! Line-oriented operator console on stdin.
//!
//! ```text
//! press <button>      hold a board button
//! release <button>    let it go
//! click <button>      press and release
//! leave [rejoin]      have the network drop us
//! status              log the commissioning state
//! quit                shut the node down
//! ```

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use meshcomm_commissioning::ButtonId;

use crate::node::WorkItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Press(ButtonId),
    Release(ButtonId),
    Click(ButtonId),
    Leave { rejoin: bool },
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("'{0}' needs a button number")]
    MissingButton(&'static str),
    #[error("invalid button number: {0}")]
    InvalidButton(String),
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Parse one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let verb = verb.to_lowercase();

    let command = match verb.as_str() {
        "press" => ConsoleCommand::Press(button(words.next(), "press")?),
        "release" => ConsoleCommand::Release(button(words.next(), "release")?),
        "click" => ConsoleCommand::Click(button(words.next(), "click")?),
        "leave" => match words.next() {
            None => ConsoleCommand::Leave { rejoin: false },
            Some("rejoin") => ConsoleCommand::Leave { rejoin: true },
            Some(other) => return Err(ConsoleError::UnexpectedArgument(other.to_string())),
        },
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = words.next() {
        return Err(ConsoleError::UnexpectedArgument(extra.to_string()));
    }
    Ok(Some(command))
}

fn button(word: Option<&str>, verb: &'static str) -> Result<ButtonId, ConsoleError> {
    let word = word.ok_or(ConsoleError::MissingButton(verb))?;
    word.parse::<u8>()
        .map(ButtonId)
        .map_err(|_| ConsoleError::InvalidButton(word.to_string()))
}

/// Read commands from stdin until EOF, forwarding them to the node.
pub fn spawn_reader(tx: mpsc::Sender<WorkItem>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("console read failed: {e}");
                    break;
                }
            };
            match parse(&line) {
                Ok(Some(command)) => {
                    if tx.send(WorkItem::Console(command)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("{e}"),
            }
        }
        tracing::debug!("console closed");
    })
}
