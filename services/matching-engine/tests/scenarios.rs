//! End-to-end matching scenarios against a capturing notifier.

use std::sync::Arc;

use matching_engine::engine::{EngineConfig, MatchingCore, SubmitOutcome, SubmitRequest};
use matching_engine::manager::OrderDirectory;
use matching_engine::notifier::RecordingNotifier;
use rust_decimal::Decimal;
use types::prelude::*;

struct Venue {
    core: MatchingCore,
    notifier: Arc<RecordingNotifier>,
    directory: Arc<OrderDirectory>,
}

fn venue() -> Venue {
    venue_with(EngineConfig::default())
}

fn venue_with(config: EngineConfig) -> Venue {
    let notifier = Arc::new(RecordingNotifier::new());
    let directory = Arc::new(OrderDirectory::new());
    let core = MatchingCore::new(
        Symbol::new("TSLA"),
        notifier.clone(),
        directory.clone(),
        config,
    );
    Venue {
        core,
        notifier,
        directory,
    }
}

fn limit(client: &str, side: Side, price: u64, qty: u64) -> SubmitRequest {
    SubmitRequest {
        client_id: ClientId::new(client),
        client_order_id: String::new(),
        symbol: Symbol::new("TSLA"),
        side,
        order_type: OrderType::Limit,
        price: Price::new(price),
        qty: Qty::new(qty),
    }
}

fn market(client: &str, side: Side, qty: u64) -> SubmitRequest {
    SubmitRequest {
        client_id: ClientId::new(client),
        client_order_id: String::new(),
        symbol: Symbol::new("TSLA"),
        side,
        order_type: OrderType::Market,
        price: Price::ZERO,
        qty: Qty::new(qty),
    }
}

fn tape_prices(notifier: &RecordingNotifier) -> Vec<u64> {
    notifier
        .frames_for_group("TAPE:TSLA")
        .iter()
        .map(|f| {
            // TRADE TSLA <qty>@<price> seq=.. ts=..
            let qty_at_price = f.split_whitespace().nth(2).unwrap();
            qty_at_price.split('@').nth(1).unwrap().parse().unwrap()
        })
        .collect()
}

fn tape_qtys(notifier: &RecordingNotifier) -> Vec<u64> {
    notifier
        .frames_for_group("TAPE:TSLA")
        .iter()
        .map(|f| {
            let qty_at_price = f.split_whitespace().nth(2).unwrap();
            qty_at_price.split('@').next().unwrap().parse().unwrap()
        })
        .collect()
}

#[test]
fn s1_simple_cross_full_fill() {
    let mut v = venue();

    let (_, outcome) = v.core.submit(limit("buyer", Side::Bid, 100, 10)).unwrap();
    assert_eq!(outcome, SubmitOutcome::Resting { remaining: Qty::new(10) });

    let (_, outcome) = v.core.submit(limit("seller", Side::Ask, 100, 10)).unwrap();
    assert_eq!(outcome, SubmitOutcome::Filled);

    assert!(v.core.bids().is_empty());
    assert!(v.core.asks().is_empty());
    assert!(v.directory.is_empty());

    let stats = v.core.stats();
    assert_eq!(stats.last_price(), Some(Price::new(100)));
    assert_eq!(stats.volume(), 10);
    assert_eq!(stats.open(), Some(Price::new(100)));
    assert_eq!(stats.high(), Some(Price::new(100)));
    assert_eq!(stats.low(), Some(Price::new(100)));
    assert_eq!(stats.close(), Some(Price::new(100)));
    assert_eq!(stats.vwap(), Decimal::from(100));

    // Both counterparties saw exactly one execution and a terminal summary.
    let buyer = v.notifier.frames_for(&ClientId::new("buyer"));
    assert!(buyer.iter().any(|f| f.starts_with("EXEC TSLA") && f.contains(" 10@100 ")));
    assert!(buyer.iter().any(|f| f.starts_with("FILLED ")));
    let seller = v.notifier.frames_for(&ClientId::new("seller"));
    assert!(seller.iter().any(|f| f.starts_with("EXEC TSLA") && f.contains(" 10@100 ")));
    assert!(seller.iter().any(|f| f.starts_with("FILLED ")));
}

#[test]
fn s2_partial_fill_aggressor_rests() {
    let mut v = venue();

    v.core.submit(limit("seller", Side::Ask, 105, 5)).unwrap();
    let (_, outcome) = v.core.submit(limit("buyer", Side::Bid, 105, 8)).unwrap();

    assert_eq!(outcome, SubmitOutcome::Resting { remaining: Qty::new(3) });
    assert!(v.core.asks().is_empty());
    assert_eq!(v.core.bids().aggregate_at(Price::new(105)), Qty::new(3));
    assert_eq!(tape_qtys(&v.notifier), vec![5]);

    let seller = v.notifier.frames_for(&ClientId::new("seller"));
    assert!(seller.iter().any(|f| f.starts_with("FILLED ")));
    let buyer = v.notifier.frames_for(&ClientId::new("buyer"));
    assert!(buyer.iter().any(|f| f.starts_with("RESTING ") && f.ends_with(" 3")));
}

#[test]
fn s3_price_time_priority_on_maker_side() {
    let mut v = venue();

    let (b1, _) = v.core.submit(limit("m1", Side::Bid, 100, 4)).unwrap();
    let (b2, _) = v.core.submit(limit("m2", Side::Bid, 100, 4)).unwrap();
    let (_, outcome) = v.core.submit(limit("taker", Side::Ask, 99, 6)).unwrap();

    assert_eq!(outcome, SubmitOutcome::Filled);
    assert_eq!(tape_qtys(&v.notifier), vec![4, 2], "oldest maker fills first");
    assert_eq!(tape_prices(&v.notifier), vec![100, 100]);

    // B1 is gone, B2 keeps the remainder.
    assert!(v.core.bids().get(&b1).is_none());
    assert_eq!(v.core.bids().get(&b2).unwrap().remaining_qty, Qty::new(2));
    assert_eq!(v.core.bids().aggregate_at(Price::new(100)), Qty::new(2));
}

#[test]
fn s4_market_order_leftover_dropped() {
    let mut v = venue();

    v.core.submit(limit("m1", Side::Ask, 101, 3)).unwrap();
    v.core.submit(limit("m2", Side::Ask, 102, 3)).unwrap();
    let (id, outcome) = v.core.submit(market("taker", Side::Bid, 10)).unwrap();

    assert_eq!(outcome, SubmitOutcome::DroppedRemainder { filled: Qty::new(6) });
    assert_eq!(tape_prices(&v.notifier), vec![101, 102]);
    assert!(v.core.asks().is_empty());
    assert!(v.core.bids().is_empty(), "market remainder never rests");
    assert!(v.directory.is_empty());

    let taker = v.notifier.frames_for(&ClientId::new("taker"));
    let summary = format!("PARTIAL_AND_CANCELLED {id} 6/10");
    assert!(taker.contains(&summary), "missing {summary:?} in {taker:?}");
}

#[test]
fn s5_price_improvement_to_aggressor() {
    let mut v = venue();

    v.core.submit(limit("maker", Side::Ask, 100, 5)).unwrap();
    let (_, outcome) = v.core.submit(limit("taker", Side::Bid, 110, 5)).unwrap();

    assert_eq!(outcome, SubmitOutcome::Filled);
    assert_eq!(tape_prices(&v.notifier), vec![100], "maker price sets the trade price");
    assert_eq!(v.core.stats().last_price(), Some(Price::new(100)));
}

#[test]
fn s6_cancel_then_cross() {
    let mut v = venue();

    let (b1, _) = v.core.submit(limit("alice", Side::Bid, 100, 5)).unwrap();
    v.core.cancel(b1, &ClientId::new("alice")).unwrap();
    let (_, outcome) = v.core.submit(limit("bob", Side::Ask, 100, 5)).unwrap();

    assert_eq!(outcome, SubmitOutcome::Resting { remaining: Qty::new(5) });
    assert!(v.core.bids().is_empty());
    assert_eq!(v.core.asks().aggregate_at(Price::new(100)), Qty::new(5));
    assert!(tape_prices(&v.notifier).is_empty(), "no fills after cancel");

    let alice = v.notifier.frames_for(&ClientId::new("alice"));
    assert!(alice.iter().any(|f| f == &format!("CANCELLED {b1} USER_REQUESTED")));
}

#[test]
fn admission_frames_precede_fills() {
    let mut v = venue();

    v.core.submit(limit("maker", Side::Ask, 100, 5)).unwrap();
    v.notifier.clear();
    v.core.submit(limit("taker", Side::Bid, 100, 5)).unwrap();

    let taker = v.notifier.frames_for(&ClientId::new("taker"));
    assert!(taker[0].starts_with("OK NEW "), "ack first, got {taker:?}");
    assert!(taker[1].starts_with("EXEC "), "then the fill, got {taker:?}");
    assert!(taker[2].starts_with("FILLED "), "then the summary, got {taker:?}");
}

#[test]
fn price_monotonic_along_one_sweep() {
    let mut v = venue();
    for (price, qty) in [(101, 3), (103, 3), (102, 3)] {
        v.core.submit(limit("maker", Side::Ask, price, qty)).unwrap();
    }

    v.core.submit(market("taker", Side::Bid, 9)).unwrap();

    let prices = tape_prices(&v.notifier);
    assert_eq!(prices, vec![101, 102, 103], "bid aggressor sweeps non-decreasing prices");
}

#[test]
fn l1_updates_once_per_fill() {
    let mut v = venue();
    v.core.submit(limit("m1", Side::Ask, 101, 3)).unwrap();
    v.core.submit(limit("m2", Side::Ask, 102, 3)).unwrap();
    v.core.submit(market("taker", Side::Bid, 6)).unwrap();

    let updates = v.notifier.frames_for_group("L1:TSLA");
    assert_eq!(updates.len(), 2, "one update per fill, never conflated at the source");
    assert!(updates[0].contains("LTP=101"));
    assert!(updates[1].contains("LTP=102"));
    // After the sweep the ask side is empty.
    assert!(updates[1].contains("ASK=0x0"));
}

#[test]
fn rejects_leave_no_trace() {
    let mut v = venue();

    let err = v.core.submit(limit("a", Side::Bid, 0, 5)).unwrap_err();
    assert_eq!(err.wire_token(), "BAD_PRICE");
    let err = v.core.submit(limit("a", Side::Bid, 100, 0)).unwrap_err();
    assert_eq!(err.wire_token(), "BAD_QTY");
    let err = v
        .core
        .submit(SubmitRequest {
            symbol: Symbol::new("AAPL"),
            ..limit("a", Side::Bid, 100, 5)
        })
        .unwrap_err();
    assert_eq!(err.wire_token(), "BAD_SYMBOL");

    assert!(v.core.bids().is_empty());
    assert!(v.core.asks().is_empty());
    assert!(v.directory.is_empty());
    assert!(v.notifier.all().is_empty(), "rejections publish nothing");
}

#[test]
fn cancel_ownership_and_absence() {
    let mut v = venue();
    let (id, _) = v.core.submit(limit("alice", Side::Bid, 100, 5)).unwrap();

    let err = v.core.cancel(id, &ClientId::new("bob")).unwrap_err();
    assert_eq!(err.wire_token(), "NOT_OWNER");
    assert_eq!(v.core.bids().len(), 1, "refused cancel leaves the order");

    v.core.cancel(id, &ClientId::new("alice")).unwrap();
    let err = v.core.cancel(id, &ClientId::new("alice")).unwrap_err();
    assert_eq!(err.wire_token(), "NOT_FOUND");
}

#[test]
fn self_match_prevention_flag() {
    let mut v = venue_with(EngineConfig {
        reject_self_match: true,
    });

    v.core.submit(limit("alice", Side::Ask, 100, 5)).unwrap();
    let err = v.core.submit(limit("alice", Side::Bid, 100, 5)).unwrap_err();
    assert_eq!(err.wire_token(), "SELF_MATCH");
    assert_eq!(v.core.asks().len(), 1, "rejected pre-entry, book untouched");

    // A different client still crosses normally.
    let (_, outcome) = v.core.submit(limit("bob", Side::Bid, 100, 5)).unwrap();
    assert_eq!(outcome, SubmitOutcome::Filled);
}

#[test]
fn client_gone_cancels_everything_owned() {
    let mut v = venue();
    v.core.submit(limit("alice", Side::Bid, 99, 5)).unwrap();
    v.core.submit(limit("alice", Side::Ask, 110, 5)).unwrap();
    v.core.submit(limit("bob", Side::Bid, 98, 5)).unwrap();

    v.core.client_gone(&ClientId::new("alice"));

    assert_eq!(v.core.bids().len(), 1, "bob's order survives");
    assert!(v.core.asks().is_empty());
    assert_eq!(v.directory.len(), 1);
}

#[test]
fn round_trip_insert_cancel_leaves_empty_book() {
    let mut v = venue();
    let mut ids = Vec::new();
    for i in 0..40u64 {
        let side = if i % 2 == 0 { Side::Bid } else { Side::Ask };
        // Bids below 100, asks above: nothing crosses.
        let price = if side == Side::Bid { 90 + i % 5 } else { 110 + i % 5 };
        let (id, outcome) = v.core.submit(limit("alice", side, price, 1 + i)).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Resting { .. }));
        ids.push(id);
    }

    for id in ids {
        v.core.cancel(id, &ClientId::new("alice")).unwrap();
    }

    assert!(v.core.bids().is_empty());
    assert!(v.core.asks().is_empty());
    assert_eq!(v.core.bids().level_count(), 0);
    assert_eq!(v.core.asks().level_count(), 0);
    assert!(v.directory.is_empty());
}

#[test]
fn stats_vwap_and_snapshot_frame() {
    let mut v = venue();
    v.core.submit(limit("m", Side::Ask, 100, 3)).unwrap();
    v.core.submit(limit("m", Side::Ask, 200, 1)).unwrap();
    v.core.submit(market("t", Side::Bid, 4)).unwrap();

    // (100*3 + 200*1) / 4 = 125
    assert_eq!(v.core.stats().vwap(), Decimal::from(125));

    v.core.publish_snapshot(&ClientId::new("q"));
    let frames = v.notifier.frames_for(&ClientId::new("q"));
    let snap = frames.last().unwrap();
    assert!(snap.starts_with("L1_SNAPSHOT TSLA"));
    assert!(snap.contains("LTP=200"));
    assert!(snap.contains("OPEN=100"));
    assert!(snap.contains("HIGH=200"));
    assert!(snap.contains("LOW=100"));
    assert!(snap.contains("VWAP=125"));
}

#[test]
fn depth_dump_lists_levels_best_first() {
    let mut v = venue();
    v.core.submit(limit("a", Side::Bid, 100, 5)).unwrap();
    v.core.submit(limit("a", Side::Bid, 102, 1)).unwrap();
    v.core.submit(limit("a", Side::Ask, 105, 2)).unwrap();

    v.core.publish_depth_dump(&ClientId::new("dbg"), 10);
    let frames = v.notifier.frames_for(&ClientId::new("dbg"));
    let dump = frames.last().unwrap();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], "ORDERS TSLA");
    assert_eq!(lines[1], "  BID 102 1 (1 orders)");
    assert_eq!(lines[2], "  BID 100 5 (1 orders)");
    assert_eq!(lines[3], "  ASK 105 2 (1 orders)");
    assert!(dump.ends_with('\n'), "multi-line dumps end with a newline");
}
