//! Order lifecycle types

use crate::ids::{ClientId, OrderId, Symbol};
use crate::ticks::{Price, Qty};
use serde::{Deserialize, Serialize};

/// Side of the book an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side; best is the highest price.
    Bid,
    /// Sell side; best is the lowest price.
    Ask,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Wire token used in protocol frames.
    pub fn wire_token(self) -> &'static str {
        match self {
            Side::Bid => "BUY",
            Side::Ask => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Executed immediately against the best available prices; any remainder
    /// is dropped, never rested.
    Market,
    /// Executed at the limit price or better; any remainder rests.
    Limit,
}

/// A single order admitted by the engine.
///
/// While resting, an order is owned by exactly one price level queue and is
/// mutated only by the engine's fill path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Opaque client tag; may be empty.
    pub client_order_id: String,
    pub client_id: ClientId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price in ticks; zero for market orders.
    pub price: Price,
    pub original_qty: Qty,
    pub remaining_qty: Qty,
    pub filled_qty: Qty,
    /// Monotonic admission timestamp, the secondary key in price-time
    /// priority.
    pub arrival_ns: u64,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_order_id: String,
        client_id: ClientId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        price: Price,
        qty: Qty,
        arrival_ns: u64,
    ) -> Self {
        debug_assert!(!qty.is_zero(), "orders must carry positive quantity");
        Self {
            id: OrderId::new(),
            client_order_id,
            client_id,
            symbol,
            side,
            order_type,
            price,
            original_qty: qty,
            remaining_qty: qty,
            filled_qty: Qty::ZERO,
            arrival_ns,
        }
    }

    /// Quantity invariant: filled + remaining == original.
    pub fn check_invariant(&self) -> bool {
        self.filled_qty + self.remaining_qty == self.original_qty
    }

    pub fn is_filled(&self) -> bool {
        self.remaining_qty.is_zero()
    }

    /// Apply a fill to this order.
    ///
    /// # Panics
    /// Panics in debug builds if the fill exceeds the remaining quantity.
    pub fn fill(&mut self, qty: Qty) {
        debug_assert!(qty <= self.remaining_qty, "fill exceeds remaining quantity");
        self.remaining_qty -= qty;
        self.filled_qty += qty;
        debug_assert!(self.check_invariant(), "quantity invariant violated after fill");
    }
}
