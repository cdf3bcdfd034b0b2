//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::time::Duration;

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Returns whether at least `interval` has passed between `since` and `now`
///
/// A clock that moved backwards counts as no time elapsed.
pub fn elapsed_at_least(now: u64, since: u64, interval: Duration) -> bool {
    now.saturating_sub(since) >= duration_to_millis(interval)
}
