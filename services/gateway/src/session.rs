//! Session registry
//!
//! Tracks every live connection and the client identity bound to it after
//! AUTH. At most one session per client id: re-authenticating evicts the
//! prior session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};
use types::prelude::ClientId;

/// Sessions idle longer than this are reaped.
pub const SESSION_IDLE_TIMEOUT_S: u64 = 60;

fn now_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared handle to one TCP session.
#[derive(Debug)]
pub struct ConnHandle {
    pub conn_id: u64,
    pub addr: SocketAddr,
    tx: mpsc::UnboundedSender<String>,
    client: RwLock<Option<ClientId>>,
    debug: AtomicBool,
    last_seen_s: AtomicU64,
    /// Signalled to force the reader loop to exit (eviction, idle reaping).
    pub shutdown: Notify,
}

impl ConnHandle {
    /// Queue one frame for delivery. Returns false if the writer is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.tx.send(frame.into()).is_ok()
    }

    pub fn touch(&self) {
        self.last_seen_s.store(now_s(), Ordering::Relaxed);
    }

    pub fn idle_secs(&self) -> u64 {
        now_s().saturating_sub(self.last_seen_s.load(Ordering::Relaxed))
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client.read().unwrap().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.read().unwrap().is_some()
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, elevated: bool) {
        self.debug.store(elevated, Ordering::Relaxed);
    }
}

/// All live sessions, addressable by connection id and by client id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    conns: DashMap<u64, Arc<ConnHandle>>,
    by_client: DashMap<ClientId, Arc<ConnHandle>>,
    next_conn_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, addr: SocketAddr, tx: mpsc::UnboundedSender<String>) -> Arc<ConnHandle> {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = Arc::new(ConnHandle {
            conn_id,
            addr,
            tx,
            client: RwLock::new(None),
            debug: AtomicBool::new(false),
            last_seen_s: AtomicU64::new(now_s()),
            shutdown: Notify::new(),
        });
        self.conns.insert(conn_id, handle.clone());
        handle
    }

    /// Bind `client` to `handle`. Returns the session this displaced, if a
    /// different connection previously owned the id.
    pub fn bind_client(
        &self,
        handle: &Arc<ConnHandle>,
        client: ClientId,
    ) -> Option<Arc<ConnHandle>> {
        if let Some(old) = handle.client_id() {
            if old != client {
                self.by_client.remove_if(&old, |_, h| h.conn_id == handle.conn_id);
            }
        }
        *handle.client.write().unwrap() = Some(client.clone());
        self.by_client
            .insert(client, handle.clone())
            .filter(|prev| prev.conn_id != handle.conn_id)
    }

    pub fn lookup(&self, client: &ClientId) -> Option<Arc<ConnHandle>> {
        self.by_client.get(client).map(|e| e.value().clone())
    }

    /// Drop a session, releasing its client binding unless another
    /// connection has already taken it over.
    pub fn remove(&self, handle: &Arc<ConnHandle>) {
        self.conns.remove(&handle.conn_id);
        if let Some(client) = handle.client_id() {
            self.by_client.remove_if(&client, |_, h| h.conn_id == handle.conn_id);
        }
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Sessions idle beyond `max_idle_s`.
    pub fn stale(&self, max_idle_s: u64) -> Vec<Arc<ConnHandle>> {
        self.conns
            .iter()
            .filter(|e| e.value().idle_secs() > max_idle_s)
            .map(|e| e.value().clone())
            .collect()
    }

    /// Snapshot of all sessions, ordered by connection id.
    pub fn snapshot(&self) -> Vec<Arc<ConnHandle>> {
        let mut out: Vec<Arc<ConnHandle>> = self.conns.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|h| h.conn_id);
        out
    }
}
