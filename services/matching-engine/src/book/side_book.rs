//! One side of an instrument's book
//!
//! Price-ordered levels with FIFO within each level, plus a by-id handle map
//! for O(1) cancellation. Polarity decides which end of the price index is
//! "best": highest price for bids, lowest for asks.

use std::collections::HashMap;

use slab::Slab;
use types::prelude::{Order, OrderId, Price, Qty, Side};

use super::price_index::PriceIndex;
use super::price_level::OrderNode;

/// Location of a resting order: the level's index-arena slot and the order's
/// slab key. Both are stable while the order rests.
#[derive(Debug, Clone, Copy)]
struct Handle {
    level_idx: usize,
    order_key: usize,
}

/// Result of filling the front order at the best level.
#[derive(Debug, Clone)]
pub struct MakerFill {
    /// Post-fill snapshot of the maker order.
    pub order: Order,
    /// True when the maker was exhausted and unlinked from the book.
    pub removed: bool,
}

/// One side (bid or ask) of a single instrument's order book.
#[derive(Debug)]
pub struct SideBook {
    side: Side,
    index: PriceIndex,
    arena: Slab<OrderNode>,
    by_id: HashMap<OrderId, Handle>,
    order_count: usize,
}

impl SideBook {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            index: PriceIndex::new(),
            arena: Slab::new(),
            by_id: HashMap::new(),
            order_count: 0,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Total resting orders on this side.
    pub fn len(&self) -> usize {
        self.order_count
    }

    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    pub fn level_count(&self) -> usize {
        self.index.len()
    }

    /// Rest `order` at the tail of its price's level, creating the level on
    /// demand.
    ///
    /// Duplicate rest of a live id is a caller contract violation.
    pub fn rest(&mut self, order: Order) {
        debug_assert_eq!(order.side, self.side, "order rested on the wrong side");
        debug_assert!(!order.remaining_qty.is_zero(), "exhausted order must not rest");
        debug_assert!(!self.by_id.contains_key(&order.id), "duplicate rest for order id");

        let id = order.id;
        let price = order.price;
        let order_key = self.arena.insert(OrderNode::new(order));
        let level_idx = self.index.get_or_insert(price);
        self.index.level_mut(level_idx).push_back(order_key, &mut self.arena);
        self.by_id.insert(id, Handle { level_idx, order_key });
        self.order_count += 1;
    }

    /// Remove the order with `id`, erasing its level if it empties out.
    /// Returns None (without side effects) if the id is not resting here.
    pub fn cancel_by_id(&mut self, id: &OrderId) -> Option<Order> {
        let handle = self.by_id.remove(id)?;
        self.index.level_mut(handle.level_idx).remove(handle.order_key, &mut self.arena);
        let node = self.arena.remove(handle.order_key);
        if self.index.level(handle.level_idx).is_empty() {
            self.index.erase_at(handle.level_idx);
        }
        self.order_count -= 1;
        Some(node.order)
    }

    /// The resting order with `id`, if any.
    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        let handle = self.by_id.get(id)?;
        Some(&self.arena[handle.order_key].order)
    }

    fn best_level_idx(&self) -> Option<usize> {
        match self.side {
            Side::Bid => self.index.max(),
            Side::Ask => self.index.min(),
        }
    }

    /// Best price and its head (oldest) order, or None when empty.
    pub fn best(&self) -> Option<(Price, &Order)> {
        let idx = self.best_level_idx()?;
        let key = self.index.level(idx).front()?;
        Some((self.index.price_at(idx), &self.arena[key].order))
    }

    /// Best price and the aggregate quantity resting at it.
    pub fn best_quote(&self) -> Option<(Price, Qty)> {
        let idx = self.best_level_idx()?;
        Some((self.index.price_at(idx), self.index.level(idx).aggregate_qty()))
    }

    /// Apply `qty` against the head order of the best level, unlinking the
    /// maker (and its level, if emptied) when exhausted.
    pub fn fill_front(&mut self, qty: Qty) -> Option<MakerFill> {
        let level_idx = self.best_level_idx()?;
        let order_key = self.index.level(level_idx).front()?;

        let node = &mut self.arena[order_key];
        node.order.fill(qty);
        let snapshot = node.order.clone();
        self.index.level_mut(level_idx).reduce(qty);

        let removed = snapshot.is_filled();
        if removed {
            self.index.level_mut(level_idx).remove(order_key, &mut self.arena);
            self.arena.remove(order_key);
            self.by_id.remove(&snapshot.id);
            self.order_count -= 1;
            if self.index.level(level_idx).is_empty() {
                self.index.erase_at(level_idx);
            }
        }

        Some(MakerFill { order: snapshot, removed })
    }

    /// Head orders of the best `n` levels, best first; at most one order per
    /// level.
    pub fn top_n(&self, n: usize) -> Vec<&Order> {
        let mut keys = Vec::with_capacity(n.min(self.index.len()));
        let visit = |node: &super::price_index::TreeNode| {
            if let Some(k) = node.level.front() {
                keys.push(k);
            }
        };
        match self.side {
            Side::Bid => self.index.in_order_desc(visit, n),
            Side::Ask => self.index.in_order(visit, n),
        }
        keys.into_iter().map(|k| &self.arena[k].order).collect()
    }

    /// Visit up to `limit` levels best-first as (price, aggregate, depth).
    pub fn levels_best_first<F: FnMut(Price, Qty, usize)>(&self, limit: usize, mut f: F) {
        let visit = |node: &super::price_index::TreeNode| {
            f(node.price, node.level.aggregate_qty(), node.level.len());
        };
        match self.side {
            Side::Bid => self.index.in_order_desc(visit, limit),
            Side::Ask => self.index.in_order(visit, limit),
        }
    }

    /// Total resting quantity at `price`; zero if the level is absent.
    pub fn aggregate_at(&self, price: Price) -> Qty {
        self.index
            .find(price)
            .map_or(Qty::ZERO, |idx| self.index.level(idx).aggregate_qty())
    }

    /// Ids of all resting orders owned by `client`.
    pub fn ids_of_client(&self, client: &types::prelude::ClientId) -> Vec<OrderId> {
        self.by_id
            .iter()
            .filter(|(_, h)| &self.arena[h.order_key].order.client_id == client)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Structural self-check used by tests and debug builds: levels non-empty
    /// and consistent with their queues, by-id handles live, counts accurate.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut total_orders = 0usize;
        let mut errors = Vec::new();

        self.index.in_order(
            |node| {
                if node.level.is_empty() {
                    errors.push(format!("empty level present at {}", node.price));
                }
                let mut qty_sum = Qty::ZERO;
                let mut seen = 0usize;
                let mut cur = node.level.front();
                while let Some(k) = cur {
                    let entry = &self.arena[k];
                    qty_sum += entry.order.remaining_qty;
                    if entry.order.price != node.price {
                        errors.push(format!("order {} queued at wrong level", entry.order.id));
                    }
                    if !entry.order.check_invariant() {
                        errors.push(format!("quantity invariant broken on {}", entry.order.id));
                    }
                    seen += 1;
                    cur = entry.next;
                }
                if qty_sum != node.level.aggregate_qty() {
                    errors.push(format!("aggregate mismatch at {}", node.price));
                }
                if seen != node.level.len() {
                    errors.push(format!("queue length mismatch at {}", node.price));
                }
                total_orders += seen;
            },
            usize::MAX,
        );

        if total_orders != self.order_count {
            errors.push(format!(
                "order_count {} != sum of queue sizes {}",
                self.order_count, total_orders
            ));
        }
        for (id, handle) in &self.by_id {
            match self.arena.get(handle.order_key) {
                Some(node) if node.order.id == *id => {}
                _ => errors.push(format!("stale by-id handle for {id}")),
            }
        }
        if self.by_id.len() != self.order_count {
            errors.push("by-id size differs from order count".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}
