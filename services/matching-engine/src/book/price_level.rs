//! Price level: FIFO order queue at a single price
//!
//! Orders live by value in a per-side slab; a level only holds the queue
//! metadata. Queue links are intrusive (each order node carries prev/next
//! slab keys), so the slab key handed out on enqueue is a stable position
//! handle and any order can be unlinked in O(1).

use slab::Slab;
use types::prelude::{Order, Qty};

/// An order plus its position in the level queue.
///
/// The prev/next pointers are slab keys, not references; they are `None` when
/// the node sits at the head/tail of its queue.
#[derive(Debug, Clone)]
pub struct OrderNode {
    pub order: Order,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

impl OrderNode {
    pub fn new(order: Order) -> Self {
        Self {
            order,
            prev: None,
            next: None,
        }
    }
}

/// FIFO queue of resting orders at one price, plus the aggregate resting
/// quantity.
///
/// A level present in the price index is never empty; the side book unlinks
/// emptied levels.
#[derive(Debug, Default)]
pub struct PriceLevel {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    aggregate_qty: Qty,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Sum of remaining quantities across the queue.
    pub fn aggregate_qty(&self) -> Qty {
        self.aggregate_qty
    }

    /// Slab key of the oldest order at this price.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Append an order node to the tail. The key remains a valid position
    /// handle until that exact order is removed.
    pub fn push_back(&mut self, key: usize, arena: &mut Slab<OrderNode>) {
        let qty = arena[key].order.remaining_qty;
        arena[key].prev = self.tail;
        arena[key].next = None;

        match self.tail {
            Some(t) => arena[t].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.len += 1;
        self.aggregate_qty += qty;
    }

    /// Unlink the order at `key` from the queue and subtract its remaining
    /// quantity from the aggregate. The key must not be reused afterwards.
    pub fn remove(&mut self, key: usize, arena: &mut Slab<OrderNode>) {
        let (prev, next, qty) = {
            let node = &arena[key];
            (node.prev, node.next, node.order.remaining_qty)
        };

        match prev {
            Some(p) => arena[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => arena[n].prev = prev,
            None => self.tail = prev,
        }
        arena[key].prev = None;
        arena[key].next = None;

        self.len -= 1;
        self.aggregate_qty -= qty;
    }

    /// Subtract a partial fill from the aggregate without unlinking.
    pub fn reduce(&mut self, qty: Qty) {
        self.aggregate_qty -= qty;
    }

    #[cfg(test)]
    pub(crate) fn set_aggregate_for_test(&mut self, qty: Qty) {
        self.aggregate_qty = qty;
    }
}
