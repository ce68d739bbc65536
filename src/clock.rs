//! Wall-clock timestamps with millisecond resolution.
//!
//! Block timestamps and the difficulty window are plain integer milliseconds
//! since the Unix epoch, so epoch (de)serialisation is the identity and
//! round-trips exactly.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time, floored to milliseconds.
pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
