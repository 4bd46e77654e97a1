//! Matching core
//!
//! The per-instrument engine: owns both sides of the book, applies validated
//! intents one at a time, runs the continuous-match loop under strict
//! price-time priority, maintains trade statistics, and fans events out
//! through the injected notifier.
//!
//! The aggressor moves through `Incoming -> Matching -> {FullyFilled,
//! Resting, DroppedRemainder}`; each terminal state is reflected to the
//! submitter as one summary frame.

use std::collections::HashMap;
use std::sync::Arc;

use types::prelude::*;

use crate::book::SideBook;
use crate::clock::monotonic_now_ns;
use crate::events::{
    l1_group, tape_group, CancelReason, CancelledFrame, ExecFrame, FilledFrame, L1Frame, L1Kind,
    PartialCancelFrame, RestingFrame, TapeFrame,
};
use crate::manager::OrderDirectory;
use crate::matching::{crossing, TradeExecutor};
use crate::notifier::NotifierPort;
use crate::stats::InstrumentStats;

/// Engine knobs fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Reject a submit whose first crossing maker belongs to the submitting
    /// session, before any state changes.
    pub reject_self_match: bool,
}

/// A validated new-order intent, as delivered by the command decoder.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub client_id: ClientId,
    pub client_order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; ignored (zero) for market orders.
    pub price: Price,
    pub qty: Qty,
}

/// Terminal state of an aggressor after its matching episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Fully filled during matching.
    Filled,
    /// Limit remainder rested on its own side.
    Resting { remaining: Qty },
    /// Market remainder dropped; never rests.
    DroppedRemainder { filled: Qty },
}

/// Per-instrument matching engine. Single-threaded by construction: the
/// owning task applies one intent to completion before the next.
pub struct MatchingCore {
    symbol: Symbol,
    bids: SideBook,
    asks: SideBook,
    /// Which side a resting order lives on, for O(1) cancel routing.
    side_of: HashMap<OrderId, Side>,
    stats: InstrumentStats,
    executor: TradeExecutor,
    notifier: Arc<dyn NotifierPort>,
    directory: Arc<OrderDirectory>,
    config: EngineConfig,
}

impl MatchingCore {
    pub fn new(
        symbol: Symbol,
        notifier: Arc<dyn NotifierPort>,
        directory: Arc<OrderDirectory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            symbol,
            bids: SideBook::new(Side::Bid),
            asks: SideBook::new(Side::Ask),
            side_of: HashMap::new(),
            stats: InstrumentStats::new(),
            executor: TradeExecutor::new(0),
            notifier,
            directory,
            config,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn stats(&self) -> &InstrumentStats {
        &self.stats
    }

    pub fn bids(&self) -> &SideBook {
        &self.bids
    }

    pub fn asks(&self) -> &SideBook {
        &self.asks
    }

    /// Validate a new-order intent and admit it, publishing the admission
    /// acknowledgement. Rejections leave no trace in the book.
    pub fn admit(&mut self, req: SubmitRequest) -> Result<Order, Reject> {
        if req.symbol != self.symbol {
            return Err(ClientInputError::BadSymbol.into());
        }
        if req.qty.is_zero() {
            return Err(ClientInputError::BadQty.into());
        }
        if req.order_type == OrderType::Limit && req.price.is_zero() {
            return Err(ClientInputError::BadPrice.into());
        }

        if self.config.reject_self_match {
            let opp = self.opposing(req.side);
            if let Some((best_price, maker)) = opp.best() {
                if crossing::crosses(req.order_type, req.side, req.price, best_price)
                    && maker.client_id == req.client_id
                {
                    return Err(Reject::SelfMatch);
                }
            }
        }

        let order = Order::new(
            req.client_order_id,
            req.client_id,
            self.symbol.clone(),
            req.side,
            req.order_type,
            req.price,
            req.qty,
            monotonic_now_ns(),
        );
        // Registered up front so a pipelined cancel can already route here;
        // removed again if the order terminates without resting.
        self.directory.insert(order.id, self.symbol.clone());
        self.notifier
            .notify_user(&order.client_id, format!("OK NEW {}", order.id));
        Ok(order)
    }

    /// Run the matching episode for an admitted order to completion.
    pub fn execute(&mut self, mut order: Order) -> SubmitOutcome {
        while !order.remaining_qty.is_zero() {
            let (trade_price, fill_qty, fill) = {
                let opp = match order.side {
                    Side::Bid => &mut self.asks,
                    Side::Ask => &mut self.bids,
                };
                let Some((best_price, maker)) = opp.best() else { break };
                if !crossing::crosses(order.order_type, order.side, order.price, best_price) {
                    break;
                }
                let fill_qty = order.remaining_qty.min(maker.remaining_qty);
                let fill = opp.fill_front(fill_qty).expect("crossed level has a front order");
                (best_price, fill_qty, fill)
            };

            order.fill(fill_qty);
            if fill.removed {
                self.side_of.remove(&fill.order.id);
                self.directory.remove(&fill.order.id);
            }

            let ts_ns = monotonic_now_ns();
            // The trade prints at the resting order's price; improvement
            // accrues to the aggressor.
            let trade = self.executor.execute(
                self.symbol.clone(),
                &fill.order,
                &order,
                trade_price,
                fill_qty,
                ts_ns,
            );
            self.stats.record_fill(trade.price, trade.qty, ts_ns);
            self.publish_fill(&trade, &fill.order, &order);
        }

        let outcome = self.settle_remainder(order);
        #[cfg(debug_assertions)]
        self.enforce_invariants();
        outcome
    }

    /// Admit and execute in one step. Test and tooling convenience; the
    /// manager splits the phases so the admission ack precedes fill events.
    pub fn submit(&mut self, req: SubmitRequest) -> Result<(OrderId, SubmitOutcome), Reject> {
        let order = self.admit(req)?;
        let id = order.id;
        Ok((id, self.execute(order)))
    }

    fn settle_remainder(&mut self, order: Order) -> SubmitOutcome {
        if order.remaining_qty.is_zero() {
            self.directory.remove(&order.id);
            self.notifier.notify_user(
                &order.client_id,
                FilledFrame {
                    order_id: order.id,
                    filled_qty: order.filled_qty,
                    original_qty: order.original_qty,
                }
                .to_string(),
            );
            return SubmitOutcome::Filled;
        }

        if order.order_type == OrderType::Limit {
            let remaining = order.remaining_qty;
            let frame = RestingFrame {
                order_id: order.id,
                remaining_qty: remaining,
            };
            let client = order.client_id.clone();
            self.side_of.insert(order.id, order.side);
            match order.side {
                Side::Bid => self.bids.rest(order),
                Side::Ask => self.asks.rest(order),
            }
            self.notifier.notify_user(&client, frame.to_string());
            return SubmitOutcome::Resting { remaining };
        }

        // Market remainder is dropped, never rested.
        let filled = order.filled_qty;
        self.directory.remove(&order.id);
        self.notifier.notify_user(
            &order.client_id,
            PartialCancelFrame {
                order_id: order.id,
                filled_qty: filled,
                original_qty: order.original_qty,
            }
            .to_string(),
        );
        SubmitOutcome::DroppedRemainder { filled }
    }

    fn publish_fill(&self, trade: &Trade, maker: &Order, taker: &Order) {
        for order in [maker, taker] {
            self.notifier.notify_user(
                &order.client_id,
                ExecFrame {
                    symbol: self.symbol.clone(),
                    order_id: order.id,
                    side: order.side,
                    fill_qty: trade.qty,
                    price: trade.price,
                    cum_filled: order.filled_qty,
                    original_qty: order.original_qty,
                    ts_ns: trade.executed_at_ns,
                }
                .to_string(),
            );
        }
        self.notifier
            .notify_group(&tape_group(&self.symbol), TapeFrame::from(trade).to_string());
        self.notifier
            .notify_group(&l1_group(&self.symbol), self.l1_frame(L1Kind::Update).to_string());
    }

    /// Cancel a resting order, permitted only to its owning session.
    pub fn cancel(&mut self, id: OrderId, client: &ClientId) -> Result<(), Reject> {
        let side = *self.side_of.get(&id).ok_or(Reject::NotFound)?;
        let book = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };
        match book.get(&id) {
            Some(order) if order.client_id != *client => return Err(AuthError::NotOwner.into()),
            Some(_) => {}
            None => fatal_invariant(&self.symbol, "side map entry without a resting order"),
        }

        if book.cancel_by_id(&id).is_none() {
            fatal_invariant(&self.symbol, "cancel lost a resting order");
        }
        self.side_of.remove(&id);
        self.directory.remove(&id);
        self.notifier.notify_user(
            client,
            CancelledFrame {
                order_id: id,
                reason: CancelReason::UserRequested,
            }
            .to_string(),
        );
        #[cfg(debug_assertions)]
        self.enforce_invariants();
        Ok(())
    }

    /// Cancel every resting order owned by a departed session. No directed
    /// frames are emitted; the session is gone.
    pub fn client_gone(&mut self, client: &ClientId) {
        let mut ids = self.bids.ids_of_client(client);
        ids.extend(self.asks.ids_of_client(client));
        let count = ids.len();
        for id in ids {
            let Some(side) = self.side_of.remove(&id) else { continue };
            let book = match side {
                Side::Bid => &mut self.bids,
                Side::Ask => &mut self.asks,
            };
            book.cancel_by_id(&id);
            self.directory.remove(&id);
        }
        if count > 0 {
            tracing::info!(
                symbol = %self.symbol,
                client = %client,
                count,
                "cancelled resting orders for departed session"
            );
        }
        #[cfg(debug_assertions)]
        self.enforce_invariants();
    }

    /// Publish one L1 snapshot frame to the requesting client.
    pub fn publish_snapshot(&self, client: &ClientId) {
        self.notifier
            .notify_user(client, self.l1_frame(L1Kind::Snapshot).to_string());
    }

    /// Debug dump: top levels per side, best first.
    pub fn publish_depth_dump(&self, client: &ClientId, depth: usize) {
        let mut out = format!("ORDERS {}\n", self.symbol);
        for book in [&self.bids, &self.asks] {
            let tag = match book.side() {
                Side::Bid => "BID",
                Side::Ask => "ASK",
            };
            book.levels_best_first(depth, |price, qty, orders| {
                out.push_str(&format!("  {tag} {price} {qty} ({orders} orders)\n"));
            });
        }
        self.notifier.notify_user(client, out);
    }

    /// Debug dump: the stats block.
    pub fn publish_stats_dump(&self, client: &ClientId) {
        let s = &self.stats;
        let px = |p: Option<Price>| p.map_or(0, Price::ticks);
        let out = format!(
            "INSTRUMENT {} LTP={} LTS={} LTT={} VOL={} VWAP={} OPEN={} HIGH={} LOW={} CLOSE={} RESTING={}/{}\n",
            self.symbol,
            px(s.last_price()),
            s.last_qty(),
            s.last_ts_ns(),
            s.volume(),
            s.vwap().round_dp(4),
            px(s.open()),
            px(s.high()),
            px(s.low()),
            px(s.close()),
            self.bids.len(),
            self.asks.len(),
        );
        self.notifier.notify_user(client, out);
    }

    fn l1_frame(&self, kind: L1Kind) -> L1Frame {
        L1Frame {
            kind,
            symbol: self.symbol.clone(),
            last: self.stats.last_price(),
            high: self.stats.high(),
            low: self.stats.low(),
            open: self.stats.open(),
            close: self.stats.close(),
            vwap: self.stats.vwap(),
            bid: self.bids.best_quote(),
            ask: self.asks.best_quote(),
        }
    }

    fn opposing(&self, side: Side) -> &SideBook {
        match side {
            Side::Bid => &self.asks,
            Side::Ask => &self.bids,
        }
    }

    /// Structural checks after every mutating intent (debug builds). A
    /// violation here is unrecoverable corruption.
    #[cfg(debug_assertions)]
    fn enforce_invariants(&self) {
        if let Err(msg) = self.bids.check_invariants() {
            fatal_invariant(&self.symbol, &msg);
        }
        if let Err(msg) = self.asks.check_invariants() {
            fatal_invariant(&self.symbol, &msg);
        }
        if let (Some((bid, _)), Some((ask, _))) = (self.bids.best(), self.asks.best()) {
            if bid >= ask {
                fatal_invariant(&self.symbol, "book is crossed at rest");
            }
        }
        if self.side_of.len() != self.bids.len() + self.asks.len() {
            fatal_invariant(&self.symbol, "side map out of sync with books");
        }
    }
}

/// Unrecoverable structural corruption: flush a diagnostic and terminate.
fn fatal_invariant(symbol: &Symbol, msg: &str) -> ! {
    tracing::error!(%symbol, msg, "fatal invariant violation");
    eprintln!("fatal invariant violation on {symbol}: {msg}");
    std::process::exit(2);
}
