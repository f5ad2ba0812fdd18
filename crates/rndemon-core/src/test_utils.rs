//! Test utilities shared across RN Demon crates

use std::sync::Mutex;

use crate::notify::{Notification, Notifier};

/// Notifier that records every notification for later assertions
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything shown so far, in order
    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Flattened text of every notification
    pub fn texts(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .flat_map(|n| match n {
                Notification::Message(t) | Notification::Warning(t) => vec![t],
                Notification::Lines(lines) => lines,
            })
            .collect()
    }

    /// True if any notification text contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.texts().iter().any(|t| t.contains(needle))
    }

    pub fn clear(&self) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, notification: Notification) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_flattens_lines() {
        let notifier = RecordingNotifier::new();
        notifier.message("Starting");
        notifier.lines(vec!["a".into(), "b".into()]);
        notifier.warning("not running");
        assert_eq!(notifier.texts(), vec!["Starting", "a", "b", "not running"]);
        assert!(notifier.contains("not run"));

        notifier.clear();
        assert!(notifier.shown().is_empty());
    }
}
