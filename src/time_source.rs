//! Time source abstraction for supporting both real-time and simulated time.
//!
//! Timelines, damage timeouts and the WAITING elapsed timer all read time
//! through a [`TimeSource`]. The real source wraps a monotonic clock; the
//! simulated source only moves when told to, which lets tests and the
//! `simulate` command step an effect frame by frame.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Trait for abstracting time operations.
///
/// `now()` is a monotonic offset from an arbitrary origin fixed when the
/// source was created. Only differences between two readings are meaningful.
pub trait TimeSource: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Duration;

    /// Check if this is a simulated time source.
    fn is_simulated(&self) -> bool;
}

/// Real-time implementation backed by [`Instant`].
pub struct RealTimeSource {
    origin: Instant,
}

impl RealTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for RealTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for RealTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Simulated time source that advances only on request.
pub struct SimulatedTimeSource {
    current: Mutex<Duration>,
}

impl SimulatedTimeSource {
    /// Create a simulated clock reading zero.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += step;
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for SimulatedTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> Duration {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
