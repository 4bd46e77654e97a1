//! Crossing detection
//!
//! Decides whether an incoming order can trade against the best opposing
//! level. Market orders cross whenever the opposing side is non-empty; limit
//! orders cross only at their price or better.

use types::prelude::{OrderType, Price, Side};

/// True when an aggressor can match against the best opposing price.
pub fn crosses(
    order_type: OrderType,
    taker_side: Side,
    limit_price: Price,
    best_opposing: Price,
) -> bool {
    match order_type {
        OrderType::Market => true,
        OrderType::Limit => match taker_side {
            Side::Bid => best_opposing <= limit_price,
            Side::Ask => best_opposing >= limit_price,
        },
    }
}
