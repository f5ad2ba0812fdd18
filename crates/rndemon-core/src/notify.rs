//! User-notification boundary
//!
//! The editor (or terminal) side only has to implement [`Notifier`]. Every
//! call is fire-and-forget: nothing is returned and nothing is awaited.

use serde::Serialize;

/// Something to show the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Notification {
    /// A single status message
    Message(String),
    /// A batch of output lines
    Lines(Vec<String>),
    /// A short-lived warning such as "not running"
    Warning(String),
}

/// Sink for user-visible notifications
pub trait Notifier: Send + Sync {
    fn show(&self, notification: Notification);

    fn message(&self, text: &str) {
        self.show(Notification::Message(text.to_string()));
    }

    fn lines(&self, lines: Vec<String>) {
        if !lines.is_empty() {
            self.show(Notification::Lines(lines));
        }
    }

    fn warning(&self, text: &str) {
        self.show(Notification::Warning(text.to_string()));
    }
}
