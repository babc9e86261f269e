// ── Banter Engine: Reconnect Backoff ───────────────────────────────────────
// Exponential backoff with ±25% jitter for transport redials.
// Base 1s, cap 30s, floor 100ms. Jitter comes from the system clock, good
// enough to spread redials, no rand crate needed.

use std::time::{Duration, SystemTime};

/// Initial redial delay in milliseconds (doubles each attempt).
const INITIAL_DELAY_MS: u64 = 1_000;

/// Maximum redial delay cap in milliseconds (30 seconds).
const MAX_DELAY_MS: u64 = 30_000;

/// Compute the jittered delay for redial attempt `attempt` (0-based).
pub fn reconnect_backoff_ms(attempt: u32) -> u64 {
    let base_ms = INITIAL_DELAY_MS * 2u64.pow(attempt.min(12));
    apply_jitter(base_ms.min(MAX_DELAY_MS))
}

/// Sleep with exponential backoff + jitter.
/// Returns the actual delay duration for logging.
pub async fn reconnect_delay(attempt: u32) -> Duration {
    let delay = Duration::from_millis(reconnect_backoff_ms(attempt));
    tokio::time::sleep(delay).await;
    delay
}

/// Apply ±25% jitter to prevent thundering-herd effects.
fn apply_jitter(base_ms: u64) -> u64 {
    let jitter_range = (base_ms / 4) as i64;
    if jitter_range == 0 {
        return base_ms.max(100);
    }
    let offset = (rand_jitter() % (2 * jitter_range + 1)) - jitter_range;
    let result = base_ms as i64 + offset;
    result.max(100) as u64
}

/// Simple jitter source using system clock nanos (no extra crate needed).
fn rand_jitter() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as i64
}
