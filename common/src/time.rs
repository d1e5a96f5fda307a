// A simple module to define the time types used in the project
//
// These helpers read the local system clock: they are used for the snapshot
// timestamp and the latency measurement, never for on-chain data, which
// always carries its own timestamps (oracle rounds for example).

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Seconds timestamps used to determine it using its type
pub type TimestampSeconds = u64;

#[inline]
pub fn get_current_time() -> Duration {
    // A clock set before 1970 is reported as the epoch itself
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

// Return timestamp in seconds
pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_follow_the_clock() {
        let before = get_current_time().as_secs();
        let secs = get_current_time_in_seconds();
        assert!(secs >= before);
        assert!(secs - before <= 1);
        // Well past 2023-11
        assert!(secs > 1_700_000_000);
    }
}
