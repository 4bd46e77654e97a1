//! Per-instrument trade statistics
//!
//! Last trade, session volume, VWAP, and OHLC, updated once per fill. The
//! VWAP numerator is 128-bit and saturates at its ceiling; saturation is
//! logged once and never halts matching.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use types::prelude::{notional, Price, Qty};

#[derive(Debug, Default)]
pub struct InstrumentStats {
    last_price: Option<Price>,
    last_qty: Qty,
    last_ts_ns: u64,
    volume: u64,
    vwap_numerator: u128,
    vwap_saturated: bool,
    open: Option<Price>,
    high: Option<Price>,
    low: Option<Price>,
    close: Option<Price>,
}

impl InstrumentStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fill into the session statistics.
    pub fn record_fill(&mut self, price: Price, qty: Qty, ts_ns: u64) {
        self.last_price = Some(price);
        self.last_qty = qty;
        self.last_ts_ns = ts_ns;
        self.volume = self.volume.saturating_add(qty.units());

        let add = notional(price, qty);
        let (sum, overflowed) = self.vwap_numerator.overflowing_add(add);
        if overflowed {
            self.vwap_numerator = u128::MAX;
            if !self.vwap_saturated {
                self.vwap_saturated = true;
                tracing::warn!("vwap numerator saturated; session vwap is now a floor");
            }
        } else {
            self.vwap_numerator = sum;
        }

        // Open is set by the first trade of the process lifetime and never
        // changes afterwards.
        if self.open.is_none() {
            self.open = Some(price);
        }
        self.high = Some(self.high.map_or(price, |h| h.max(price)));
        self.low = Some(self.low.map_or(price, |l| l.min(price)));
        self.close = Some(price);
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    pub fn last_qty(&self) -> Qty {
        self.last_qty
    }

    pub fn last_ts_ns(&self) -> u64 {
        self.last_ts_ns
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    pub fn open(&self) -> Option<Price> {
        self.open
    }

    pub fn high(&self) -> Option<Price> {
        self.high
    }

    pub fn low(&self) -> Option<Price> {
        self.low
    }

    pub fn close(&self) -> Option<Price> {
        self.close
    }

    /// Session volume-weighted average price; zero before the first trade.
    pub fn vwap(&self) -> Decimal {
        if self.volume == 0 {
            return Decimal::ZERO;
        }
        let numerator = Decimal::from_u128(self.vwap_numerator).unwrap_or(Decimal::MAX);
        numerator / Decimal::from(self.volume)
    }
}
