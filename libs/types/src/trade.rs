//! Trade execution types

use crate::ids::{ClientId, OrderId, Symbol, TradeId};
use crate::ticks::{notional, Price, Qty};
use serde::{Deserialize, Serialize};

/// An atomic exchange between a resting maker and an incoming taker.
///
/// The price is always the maker's price; price improvement accrues to the
/// taker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    /// Per-instrument monotonic sequence number.
    pub sequence: u64,
    pub symbol: Symbol,

    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    pub maker_client_id: ClientId,
    pub taker_client_id: ClientId,

    /// Side of the aggressor.
    pub taker_side: crate::order::Side,
    pub price: Price,
    pub qty: Qty,

    pub executed_at_ns: u64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequence: u64,
        symbol: Symbol,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_client_id: ClientId,
        taker_client_id: ClientId,
        taker_side: crate::order::Side,
        price: Price,
        qty: Qty,
        executed_at_ns: u64,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            sequence,
            symbol,
            maker_order_id,
            taker_order_id,
            maker_client_id,
            taker_client_id,
            taker_side,
            price,
            qty,
            executed_at_ns,
        }
    }

    /// Trade value (price x quantity) in tick-units.
    pub fn value(&self) -> u128 {
        notional(self.price, self.qty)
    }

    /// True when maker and taker belong to different sessions.
    pub fn is_cross_client(&self) -> bool {
        self.maker_client_id != self.taker_client_id
    }
}
