//! Trade construction
//!
//! Stamps each fill with a per-instrument monotonic sequence number and
//! builds the trade record from the two counterparties.

use types::prelude::{Order, Price, Qty, Symbol, Trade};

/// Builds trades and owns the instrument's sequence counter.
#[derive(Debug)]
pub struct TradeExecutor {
    sequence: u64,
}

impl TradeExecutor {
    pub fn new(starting_sequence: u64) -> Self {
        Self {
            sequence: starting_sequence,
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let seq = self.sequence;
        self.sequence += 1;
        seq
    }

    /// Build the trade for one fill. The price is the maker's price.
    pub fn execute(
        &mut self,
        symbol: Symbol,
        maker: &Order,
        taker: &Order,
        price: Price,
        qty: Qty,
        ts_ns: u64,
    ) -> Trade {
        Trade::new(
            self.next_sequence(),
            symbol,
            maker.id,
            taker.id,
            maker.client_id.clone(),
            taker.client_id.clone(),
            taker.side,
            price,
            qty,
            ts_ns,
        )
    }
}
