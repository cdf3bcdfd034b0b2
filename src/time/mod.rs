//! Clock sources
//!
//! Every timestamp in this crate is a monotonic millisecond count obtained
//! from a [`Clock`]. Nodes use [`SystemClock`]; tests and simulations use
//! [`ManualClock`], which can be advanced or rewound at will.
//!
//! # Examples
//!
//! ```
//! use lidar_link::time::{Clock, ManualClock};
//!
//! let clock = ManualClock::new(100);
//! let handle = clock.clone();
//! handle.advance(50);
//! assert_eq!(clock.now_millis(), 150);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond time source
pub trait Clock {
    /// Returns the current timestamp in milliseconds
    fn now_millis(&self) -> u64;
}

/// Clock backed by [`Instant`], counting from its creation
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock reading zero now
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        crate::util::duration_to_millis(self.origin.elapsed())
    }
}

/// Manually driven clock
///
/// Clones share the same time, so a test can keep a handle after moving the
/// clock into a state machine or protocol context.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start`
    pub fn new(start: u64) -> Self {
        ManualClock {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Sets the current time, which may move backwards
    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Moves the clock forward
    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}
