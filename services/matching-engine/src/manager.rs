//! Instrument manager
//!
//! Owns the set of instruments and dispatches intents to the right core.
//! Each instrument runs on its own task consuming an unbounded intent queue,
//! so a core applies exactly one intent at a time and intents stay totally
//! ordered per instrument. Replies travel back over oneshot channels.
//!
//! A process-wide order directory (order id -> symbol) routes cancels; it is
//! written only by the owning instrument's core.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use types::prelude::*;

use crate::engine::{EngineConfig, MatchingCore, SubmitOutcome, SubmitRequest};
use crate::notifier::NotifierPort;

/// Which instrument a live order belongs to. Entries exist from admission
/// until the order leaves the book.
#[derive(Debug, Default)]
pub struct OrderDirectory {
    inner: DashMap<OrderId, Symbol>,
}

impl OrderDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: OrderId, symbol: Symbol) {
        self.inner.insert(id, symbol);
    }

    pub fn remove(&self, id: &OrderId) {
        self.inner.remove(id);
    }

    pub fn symbol_of(&self, id: &OrderId) -> Option<Symbol> {
        self.inner.get(id).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// One unit of work for an instrument core.
enum Intent {
    Submit {
        req: SubmitRequest,
        reply: oneshot::Sender<Result<OrderId, Reject>>,
    },
    Cancel {
        id: OrderId,
        client: ClientId,
        reply: oneshot::Sender<Result<(), Reject>>,
    },
    Snapshot {
        client: ClientId,
        reply: oneshot::Sender<()>,
    },
    ClientGone {
        client: ClientId,
    },
    DumpDepth {
        client: ClientId,
    },
    DumpStats {
        client: ClientId,
    },
}

/// Registry of instrument cores, one task per symbol.
pub struct InstrumentManager {
    instruments: DashMap<Symbol, mpsc::UnboundedSender<Intent>>,
    directory: Arc<OrderDirectory>,
    notifier: Arc<dyn NotifierPort>,
    config: EngineConfig,
}

impl InstrumentManager {
    pub fn new(notifier: Arc<dyn NotifierPort>, config: EngineConfig) -> Self {
        Self {
            instruments: DashMap::new(),
            directory: Arc::new(OrderDirectory::new()),
            notifier,
            config,
        }
    }

    /// Register a new instrument and spawn its core. Returns false if the
    /// symbol is already registered.
    pub fn add_instrument(&self, symbol: Symbol) -> bool {
        if self.instruments.contains_key(&symbol) {
            return false;
        }
        let core = MatchingCore::new(
            symbol.clone(),
            Arc::clone(&self.notifier),
            Arc::clone(&self.directory),
            self.config,
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_instrument(core, rx));
        self.instruments.insert(symbol.clone(), tx);
        tracing::info!(%symbol, "instrument registered");
        true
    }

    pub fn has_instrument(&self, symbol: &Symbol) -> bool {
        self.instruments.contains_key(symbol)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = self.instruments.iter().map(|e| e.key().clone()).collect();
        out.sort();
        out
    }

    pub fn directory(&self) -> &Arc<OrderDirectory> {
        &self.directory
    }

    /// Submit a new order. The admission ack (or error) resolves once the
    /// core has validated the intent; fills follow as notifier events.
    pub async fn submit(&self, req: SubmitRequest) -> Result<OrderId, Reject> {
        let tx = self
            .instruments
            .get(&req.symbol)
            .ok_or(Reject::Input(ClientInputError::BadSymbol))?
            .clone();
        let (reply, rx) = oneshot::channel();
        tx.send(Intent::Submit { req, reply })
            .map_err(|_| Reject::Input(ClientInputError::BadSymbol))?;
        rx.await.map_err(|_| Reject::NotFound)?
    }

    /// Cancel by id, routed through the order directory.
    pub async fn cancel(&self, id: OrderId, client: ClientId) -> Result<(), Reject> {
        let symbol = self.directory.symbol_of(&id).ok_or(Reject::NotFound)?;
        let tx = self.instruments.get(&symbol).ok_or(Reject::NotFound)?.clone();
        let (reply, rx) = oneshot::channel();
        tx.send(Intent::Cancel { id, client, reply })
            .map_err(|_| Reject::NotFound)?;
        rx.await.map_err(|_| Reject::NotFound)?
    }

    /// Request one L1 snapshot frame for `client`. Resolves after the frame
    /// has been published.
    pub async fn snapshot(&self, symbol: &Symbol, client: ClientId) -> Result<(), Reject> {
        let tx = self
            .instruments
            .get(symbol)
            .ok_or(Reject::Input(ClientInputError::BadSymbol))?
            .clone();
        let (reply, rx) = oneshot::channel();
        tx.send(Intent::Snapshot { client, reply })
            .map_err(|_| Reject::Input(ClientInputError::BadSymbol))?;
        rx.await.map_err(|_| Reject::NotFound)
    }

    /// Fan a session loss out to every instrument; each cancels the
    /// client's resting orders before processing further intents.
    pub fn client_gone(&self, client: &ClientId) {
        for entry in self.instruments.iter() {
            let _ = entry.value().send(Intent::ClientGone {
                client: client.clone(),
            });
        }
    }

    /// Ask every instrument to publish its depth dump to `client`.
    pub fn dump_depth(&self, client: &ClientId) {
        for entry in self.instruments.iter() {
            let _ = entry.value().send(Intent::DumpDepth {
                client: client.clone(),
            });
        }
    }

    /// Ask every instrument to publish its stats dump to `client`.
    pub fn dump_stats(&self, client: &ClientId) {
        for entry in self.instruments.iter() {
            let _ = entry.value().send(Intent::DumpStats {
                client: client.clone(),
            });
        }
    }
}

/// Per-instrument event loop: one intent at a time, to completion.
async fn run_instrument(mut core: MatchingCore, mut rx: mpsc::UnboundedReceiver<Intent>) {
    while let Some(intent) = rx.recv().await {
        match intent {
            Intent::Submit { req, reply } => match core.admit(req) {
                Ok(order) => {
                    // Reply after admission but before matching: the ack
                    // frame is already queued ahead of any fills.
                    let _ = reply.send(Ok(order.id));
                    let _outcome: SubmitOutcome = core.execute(order);
                }
                Err(rej) => {
                    let _ = reply.send(Err(rej));
                }
            },
            Intent::Cancel { id, client, reply } => {
                let _ = reply.send(core.cancel(id, &client));
            }
            Intent::Snapshot { client, reply } => {
                core.publish_snapshot(&client);
                let _ = reply.send(());
            }
            Intent::ClientGone { client } => core.client_gone(&client),
            Intent::DumpDepth { client } => core.publish_depth_dump(&client, 10),
            Intent::DumpStats { client } => core.publish_stats_dump(&client),
        }
    }
    tracing::debug!(symbol = %core.symbol(), "instrument task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::RecordingNotifier;
    use types::prelude::*;

    fn limit_req(client: &str, symbol: &str, side: Side, price: u64, qty: u64) -> SubmitRequest {
        SubmitRequest {
            client_id: ClientId::new(client),
            client_order_id: String::new(),
            symbol: Symbol::new(symbol),
            side,
            order_type: OrderType::Limit,
            price: Price::new(price),
            qty: Qty::new(qty),
        }
    }

    #[tokio::test]
    async fn test_add_instrument_once() {
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = InstrumentManager::new(notifier, EngineConfig::default());
        assert!(manager.add_instrument(Symbol::new("TSLA")));
        assert!(!manager.add_instrument(Symbol::new("TSLA")));
        assert!(manager.has_instrument(&Symbol::new("TSLA")));
        assert_eq!(manager.symbols(), vec![Symbol::new("TSLA")]);
    }

    #[tokio::test]
    async fn test_submit_unknown_symbol_rejected() {
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = InstrumentManager::new(notifier, EngineConfig::default());
        let err = manager
            .submit(limit_req("a", "TSLA", Side::Bid, 100, 1))
            .await
            .unwrap_err();
        assert_eq!(err.wire_token(), "BAD_SYMBOL");
    }

    #[tokio::test]
    async fn test_submit_and_cancel_routed_by_directory() {
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = InstrumentManager::new(notifier.clone(), EngineConfig::default());
        manager.add_instrument(Symbol::new("TSLA"));

        let id = manager
            .submit(limit_req("alice", "TSLA", Side::Bid, 100, 5))
            .await
            .unwrap();
        assert_eq!(manager.directory().symbol_of(&id), Some(Symbol::new("TSLA")));

        // Wrong owner is refused and the order survives.
        let err = manager.cancel(id, ClientId::new("mallory")).await.unwrap_err();
        assert_eq!(err.wire_token(), "NOT_OWNER");

        manager.cancel(id, ClientId::new("alice")).await.unwrap();
        assert!(manager.directory().is_empty());

        let err = manager.cancel(id, ClientId::new("alice")).await.unwrap_err();
        assert_eq!(err.wire_token(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_cross_instrument_isolation() {
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = InstrumentManager::new(notifier.clone(), EngineConfig::default());
        manager.add_instrument(Symbol::new("TSLA"));
        manager.add_instrument(Symbol::new("AAPL"));

        manager
            .submit(limit_req("a", "TSLA", Side::Ask, 100, 5))
            .await
            .unwrap();
        manager
            .submit(limit_req("b", "AAPL", Side::Bid, 100, 5))
            .await
            .unwrap();

        // Same price on different instruments must not cross.
        assert_eq!(manager.directory().len(), 2);
        assert!(notifier
            .frames_for_group("TAPE:TSLA")
            .is_empty());
        assert!(notifier
            .frames_for_group("TAPE:AAPL")
            .is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_resolves_after_frame_published() {
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = InstrumentManager::new(notifier.clone(), EngineConfig::default());
        manager.add_instrument(Symbol::new("TSLA"));

        manager
            .snapshot(&Symbol::new("TSLA"), ClientId::new("alice"))
            .await
            .unwrap();

        let frames = notifier.frames_for(&ClientId::new("alice"));
        assert_eq!(frames.len(), 1);
        assert!(frames[0].starts_with("L1_SNAPSHOT TSLA"));
    }

    #[tokio::test]
    async fn test_client_gone_clears_resting_orders() {
        let notifier = Arc::new(RecordingNotifier::new());
        let manager = InstrumentManager::new(notifier.clone(), EngineConfig::default());
        manager.add_instrument(Symbol::new("TSLA"));

        manager
            .submit(limit_req("alice", "TSLA", Side::Bid, 100, 5))
            .await
            .unwrap();
        manager
            .submit(limit_req("alice", "TSLA", Side::Ask, 110, 5))
            .await
            .unwrap();
        assert_eq!(manager.directory().len(), 2);

        manager.client_gone(&ClientId::new("alice"));
        // Flush: a snapshot intent is processed strictly after ClientGone.
        manager
            .snapshot(&Symbol::new("TSLA"), ClientId::new("alice"))
            .await
            .unwrap();
        assert!(manager.directory().is_empty());
    }
}
