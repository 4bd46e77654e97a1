//! Notifier port
//!
//! The core publishes directed (per client) and grouped (per topic) frames
//! through this trait and never names the concrete sink. Implementations
//! must be thread-safe and must never block the caller; a frame that cannot
//! be delivered is dropped and counted, never retried from the core.

use std::sync::Mutex;
use types::prelude::ClientId;

/// Outbound event sink injected into each [`crate::MatchingCore`].
pub trait NotifierPort: Send + Sync {
    /// Deliver `frame` to one client, if connected.
    fn notify_user(&self, client: &ClientId, frame: String);

    /// Deliver `frame` to every subscriber of `group`.
    fn notify_group(&self, group: &str, frame: String);

    /// Add `client` to `group`, creating the group on demand.
    fn subscribe(&self, group: &str, client: &ClientId);

    /// Remove `client` from `group`; unknown pairs are ignored.
    fn unsubscribe(&self, group: &str, client: &ClientId);
}

/// Where a recorded frame was addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    User(ClientId),
    Group(String),
}

/// Capturing notifier for tests: retains every published frame in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Target, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames in publication order.
    pub fn all(&self) -> Vec<(Target, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Frames directed at `client`, in order.
    pub fn frames_for(&self, client: &ClientId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| matches!(t, Target::User(c) if c == client))
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Frames published to `group`, in order.
    pub fn frames_for_group(&self, group: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| matches!(t, Target::Group(g) if g == group))
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl NotifierPort for RecordingNotifier {
    fn notify_user(&self, client: &ClientId, frame: String) {
        self.sent.lock().unwrap().push((Target::User(client.clone()), frame));
    }

    fn notify_group(&self, group: &str, frame: String) {
        self.sent.lock().unwrap().push((Target::Group(group.to_string()), frame));
    }

    fn subscribe(&self, _group: &str, _client: &ClientId) {}

    fn unsubscribe(&self, _group: &str, _client: &ClientId) {}
}
