//! Terminal notifiers
//!
//! [`ConsoleNotifier`] prints plain text. [`HeadlessNotifier`] prints one
//! JSON object per notification (NDJSON) for scripts and editor
//! integrations.

use std::io::{self, Write};

use chrono::Utc;
use serde::Serialize;

use rndemon_core::prelude::*;
use rndemon_core::{Notification, Notifier};

/// Plain text lines for a notification
pub fn render_plain(notification: &Notification) -> Vec<String> {
    match notification {
        Notification::Message(text) => vec![format!("[rndemon] {text}")],
        Notification::Warning(text) => vec![format!("[rndemon] warning: {text}")],
        Notification::Lines(lines) => lines.clone(),
    }
}

fn write_lines(lines: &[String]) {
    let mut stdout = io::stdout().lock();
    for line in lines {
        if let Err(e) = writeln!(stdout, "{}", line) {
            error!("Failed to write to stdout: {}", e);
            return;
        }
    }
    if let Err(e) = stdout.flush() {
        error!("Failed to flush stdout: {}", e);
    }
}

/// Human-readable notifier writing to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show(&self, notification: Notification) {
        write_lines(&render_plain(&notification));
    }
}

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    Message { text: String, timestamp: i64 },
    Output { lines: Vec<String>, timestamp: i64 },
    Warning { text: String, timestamp: i64 },
}

impl HeadlessEvent {
    pub fn from_notification(notification: Notification) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        match notification {
            Notification::Message(text) => Self::Message { text, timestamp },
            Notification::Lines(lines) => Self::Output { lines, timestamp },
            Notification::Warning(text) => Self::Warning { text, timestamp },
        }
    }

    pub fn to_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                None
            }
        }
    }

    /// Emit this event to stdout as one JSON line
    pub fn emit(&self) {
        if let Some(json) = self.to_json() {
            write_lines(&[json]);
        }
    }
}

/// NDJSON notifier writing to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessNotifier;

impl Notifier for HeadlessNotifier {
    fn show(&self, notification: Notification) {
        HeadlessEvent::from_notification(notification).emit();
    }
}
