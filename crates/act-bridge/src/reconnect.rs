//! Reconnect schedule for the extension peer.
//!
//! The bridge never dials out; when the connection drops, the extension is
//! expected to reconnect on this schedule and reset its attempt counter on
//! the next successful `auth_result`. The constants and the delay function
//! live here so both the bridge documentation and any Rust-side test peer
//! agree on the contract.

use std::time::Duration;

/// Delay before the first reconnect attempt.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound on the delay between attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Attempts before the peer gives up entirely.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 50;

/// Delay before reconnect attempt number `attempt` (zero-based).
///
/// Exponential: `initial * 2^attempt`, capped at [`MAX_BACKOFF`]. The shift
/// is clamped so large attempt numbers cannot overflow.
pub fn backoff_delay(attempt: u32) -> Duration {
    let millis = INITIAL_BACKOFF
        .as_millis()
        .saturating_mul(1u128 << attempt.min(16)) as u64;
    Duration::from_millis(millis).min(MAX_BACKOFF)
}
