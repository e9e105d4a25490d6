//! Time helpers used for heartbeat timestamps and block ID generation.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the Unix epoch.
pub fn now_msec() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("clock went backwards")
		.as_millis() as u64
}

/// Current time as seconds since the Unix epoch (used for heartbeat
/// liveness comparisons, where sub-second precision doesn't matter).
pub fn now_sec() -> u64 {
	now_msec() / 1000
}
