//! Session-backed notifier
//!
//! Implements the engine's [`NotifierPort`] over the session registry:
//! directed frames go to the client's writer queue, grouped frames fan out
//! to every subscriber. Enqueueing never blocks; frames for absent or dying
//! sessions are dropped and counted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use matching_engine::NotifierPort;
use types::prelude::ClientId;

use crate::session::SessionRegistry;

pub struct SessionNotifier {
    registry: Arc<SessionRegistry>,
    groups: DashMap<String, HashSet<ClientId>>,
    dropped: AtomicU64,
}

impl SessionNotifier {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            groups: DashMap::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Pre-create a topic so it shows up in diagnostics before the first
    /// subscriber arrives.
    pub fn register_group(&self, group: &str) {
        self.groups.entry(group.to_string()).or_default();
    }

    /// Drop `client` from every topic (session closed).
    pub fn remove_client(&self, client: &ClientId) {
        for mut entry in self.groups.iter_mut() {
            entry.value_mut().remove(client);
        }
    }

    /// Frames dropped because no session could take them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut out: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }
}

impl NotifierPort for SessionNotifier {
    fn notify_user(&self, client: &ClientId, frame: String) {
        let delivered = self
            .registry
            .lookup(client)
            .map(|handle| handle.send(frame))
            .unwrap_or(false);
        if !delivered {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(client = %client, "dropped frame for absent session");
        }
    }

    fn notify_group(&self, group: &str, frame: String) {
        let Some(members) = self.groups.get(group) else { return };
        for client in members.iter() {
            self.notify_user(client, frame.clone());
        }
    }

    fn subscribe(&self, group: &str, client: &ClientId) {
        self.groups.entry(group.to_string()).or_default().insert(client.clone());
    }

    fn unsubscribe(&self, group: &str, client: &ClientId) {
        if let Some(mut members) = self.groups.get_mut(group) {
            members.remove(client);
        }
    }
}
