//! Line-oriented command input
//!
//! Each stdin line is one command: `start [args...]`, `s`/`stop`,
//! `r`/`reload`, `d`/`menu`, `c`/`console`, `p`/`profiler`, `h`/`help`,
//! `q`/`quit`. Full command ids (`rn.dev.reload`) are accepted as well.

use std::io::BufRead;

use tokio::sync::mpsc;

use rndemon_core::prelude::*;

use crate::commands::{
    OPEN_PROFILER_COMMAND, RELOAD_COMMAND, SHOW_DEV_MENU_COMMAND, START_COMMAND, STOP_COMMAND,
    TOGGLE_CONSOLE_COMMAND,
};
use crate::message::Message;

/// Result of parsing one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Message(Message),
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ParseOutcome {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return ParseOutcome::Empty;
    };

    let message = match head {
        "start" | START_COMMAND => Message::start(words),
        "s" | "stop" => Message::command(STOP_COMMAND),
        "r" | "reload" => Message::command(RELOAD_COMMAND),
        "d" | "menu" => Message::command(SHOW_DEV_MENU_COMMAND),
        "c" | "console" => Message::command(TOGGLE_CONSOLE_COMMAND),
        "p" | "profiler" => Message::command(OPEN_PROFILER_COMMAND),
        "h" | "help" => Message::Help,
        "q" | "quit" => Message::Quit,
        id if id.starts_with("rn.") => Message::command(id),
        other => return ParseOutcome::Unknown(other.to_string()),
    };
    ParseOutcome::Message(message)
}

/// Read commands from `reader` until EOF or `quit` (blocking).
///
/// Run this on a dedicated thread.
pub fn read_commands<R: BufRead>(reader: R, msg_tx: mpsc::Sender<Message>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            ParseOutcome::Message(message) => {
                info!("Stdin: {:?}", message);
                let quit = message == Message::Quit;
                if msg_tx.blocking_send(message).is_err() || quit {
                    break;
                }
            }
            ParseOutcome::Empty => {}
            ParseOutcome::Unknown(word) => warn!("Unknown stdin command: {}", word),
        }
    }

    info!("Stdin reader exiting");
}

/// Spawn the blocking stdin reader on its own thread
pub fn spawn_stdin_reader(msg_tx: mpsc::Sender<Message>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        read_commands(stdin.lock(), msg_tx);
    });
}
