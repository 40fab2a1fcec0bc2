//! Correlation ids for model round trips.
//!
//! Each generation, unit build or grading call gets one `request_id`, carried
//! by every log line of that call so a failed build can be traced from the
//! prompt to the rejected payload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique id for one round trip, e.g. `rq-18c2f…-0003`.
pub fn generate_request_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates calls within the same nanosecond.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("rq-{ts:x}-{count:04x}")
}
