//! Order book infrastructure module
//!
//! Contains the balanced price index, price levels, and the per-side book.

pub mod price_index;
pub mod price_level;
pub mod side_book;

pub use price_index::PriceIndex;
pub use price_level::{OrderNode, PriceLevel};
pub use side_book::{MakerFill, SideBook};
