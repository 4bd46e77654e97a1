//! Event frames emitted by the matching core
//!
//! Every event is rendered as a single ASCII line (the session layer appends
//! the terminating newline). Multi-line diagnostics end with an embedded
//! newline so the terminator becomes the required blank line.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use types::prelude::{OrderId, Price, Qty, Side, Symbol, Trade};

/// Topic carrying top-of-book updates for `symbol`.
pub fn l1_group(symbol: &Symbol) -> String {
    format!("L1:{symbol}")
}

/// Topic carrying public trade prints for `symbol`.
pub fn tape_group(symbol: &Symbol) -> String {
    format!("TAPE:{symbol}")
}

/// Why an order left the book without filling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    UserRequested,
    SessionClosed,
}

impl CancelReason {
    pub fn wire_token(self) -> &'static str {
        match self {
            CancelReason::UserRequested => "USER_REQUESTED",
            CancelReason::SessionClosed => "SESSION_CLOSED",
        }
    }
}

/// One execution report, addressed to a single counterparty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecFrame {
    pub symbol: Symbol,
    pub order_id: OrderId,
    pub side: Side,
    pub fill_qty: Qty,
    pub price: Price,
    pub cum_filled: Qty,
    pub original_qty: Qty,
    pub ts_ns: u64,
}

impl fmt::Display for ExecFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EXEC {} {} {} {}@{} {}/{} {}",
            self.symbol,
            self.order_id,
            self.side.wire_token(),
            self.fill_qty,
            self.price,
            self.cum_filled,
            self.original_qty,
            self.ts_ns
        )
    }
}

/// Terminal summary for an aggressor that rested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestingFrame {
    pub order_id: OrderId,
    pub remaining_qty: Qty,
}

impl fmt::Display for RestingFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RESTING {} {}", self.order_id, self.remaining_qty)
    }
}

/// Terminal summary for a fully filled aggressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledFrame {
    pub order_id: OrderId,
    pub filled_qty: Qty,
    pub original_qty: Qty,
}

impl fmt::Display for FilledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FILLED {} {}/{}", self.order_id, self.filled_qty, self.original_qty)
    }
}

/// Cancellation acknowledgement for a resting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledFrame {
    pub order_id: OrderId,
    pub reason: CancelReason,
}

impl fmt::Display for CancelledFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CANCELLED {} {}", self.order_id, self.reason.wire_token())
    }
}

/// Terminal summary for a market order whose remainder was dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialCancelFrame {
    pub order_id: OrderId,
    pub filled_qty: Qty,
    pub original_qty: Qty,
}

impl fmt::Display for PartialCancelFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PARTIAL_AND_CANCELLED {} {}/{}",
            self.order_id, self.filled_qty, self.original_qty
        )
    }
}

/// Public trade print for the tape topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapeFrame {
    pub symbol: Symbol,
    pub qty: Qty,
    pub price: Price,
    pub sequence: u64,
    pub ts_ns: u64,
}

impl From<&Trade> for TapeFrame {
    fn from(trade: &Trade) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            qty: trade.qty,
            price: trade.price,
            sequence: trade.sequence,
            ts_ns: trade.executed_at_ns,
        }
    }
}

impl fmt::Display for TapeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TRADE {} {}@{} seq={} ts={}",
            self.symbol, self.qty, self.price, self.sequence, self.ts_ns
        )
    }
}

/// Whether a top-of-book frame was pushed or explicitly requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum L1Kind {
    Update,
    Snapshot,
}

/// Top-of-book market data: trade stats plus best bid/ask.
///
/// Empty sides render as `0x0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1Frame {
    pub kind: L1Kind,
    pub symbol: Symbol,
    pub last: Option<Price>,
    pub high: Option<Price>,
    pub low: Option<Price>,
    pub open: Option<Price>,
    pub close: Option<Price>,
    pub vwap: Decimal,
    pub bid: Option<(Price, Qty)>,
    pub ask: Option<(Price, Qty)>,
}

fn px(value: Option<Price>) -> u64 {
    value.map_or(0, Price::ticks)
}

impl fmt::Display for L1Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            L1Kind::Update => "L1_UPDATE",
            L1Kind::Snapshot => "L1_SNAPSHOT",
        };
        let (bid_px, bid_qty) = self.bid.map_or((0, 0), |(p, q)| (p.ticks(), q.units()));
        let (ask_px, ask_qty) = self.ask.map_or((0, 0), |(p, q)| (p.ticks(), q.units()));
        write!(
            f,
            "{tag} {} LTP={} HIGH={} LOW={} OPEN={} CLOSE={} VWAP={} BID={}x{} ASK={}x{}",
            self.symbol,
            px(self.last),
            px(self.high),
            px(self.low),
            px(self.open),
            px(self.close),
            self.vwap.round_dp(4),
            bid_px,
            bid_qty,
            ask_px,
            ask_qty,
        )
    }
}
