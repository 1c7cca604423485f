//! # Log Throttling
//!
//! A meter with a dirty read head or a loose cable produces a framing error on
//! every poll. `LogThrottle` keeps such repeated warnings from flooding the log
//! while still counting what was dropped.
//!
//! ```rust
//! use sml_bridge::util::logging::LogThrottle;
//!
//! // At most 3 messages per minute
//! let mut throttle = LogThrottle::new(60_000, 3);
//! if throttle.allow() {
//!     log::warn!("frame skipped");
//! }
//! ```

use std::time::{Duration, Instant};

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    window: Duration,
    cap: u32,
    count: u32,
    suppressed: u64,
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with a time window (milliseconds) and a message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self::starting_at(window_ms, cap, Instant::now())
    }

    /// Create a throttle whose first window opens at `t0`
    pub fn starting_at(window_ms: u64, cap: u32, t0: Instant) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            cap,
            count: 0,
            suppressed: 0,
            t0,
        }
    }

    /// Check if logging is allowed now
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Check if logging is allowed at `now`. A new window starts once the
    /// current one has expired.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.t0) > self.window {
            self.t0 = now;
            self.count = 0;
        }

        self.count = self.count.saturating_add(1);
        if self.count <= self.cap {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Total number of messages rejected since creation
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
