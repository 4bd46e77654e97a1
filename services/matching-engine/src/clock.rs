//! Monotonic nanosecond timestamps
//!
//! Arrival and trade timestamps double as priority tie-breakers, so they must
//! be strictly increasing even if the wall clock stalls or steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_NS: AtomicU64 = AtomicU64::new(0);

/// Current time in nanoseconds since the epoch, strictly greater than any
/// previously returned value.
pub fn monotonic_now_ns() -> u64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let mut last = LAST_NS.load(Ordering::Relaxed);
    loop {
        let next = wall.max(last + 1);
        match LAST_NS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}
