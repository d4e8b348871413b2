//! Host clock abstraction
//!
//! Position tracking and the randomizer cooldown are measured on wall-clock
//! time relative to a recorded reference, never by counting ticks.

use std::fmt::Debug;
use std::sync::Mutex;
use std::time::Instant;

/// Monotonic time source in seconds
pub trait Clock: Send + Sync + Debug {
    /// Seconds since an arbitrary, fixed origin
    fn now(&self) -> f64;
}

/// Clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
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
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic tests and offline tooling
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            seconds: Mutex::new(start),
        }
    }

    /// Move time forward by `delta` seconds (negative deltas are ignored)
    pub fn advance(&self, delta: f64) {
        if let Ok(mut seconds) = self.seconds.lock() {
            *seconds += delta.max(0.0);
        }
    }

    pub fn set(&self, seconds: f64) {
        if let Ok(mut current) = self.seconds.lock() {
            *current = seconds;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds.lock().map(|s| *s).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.5);
        assert_eq!(clock.now(), 1.5);

        clock.advance(-3.0);
        assert_eq!(clock.now(), 1.5);

        clock.set(10.0);
        assert_eq!(clock.now(), 10.0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
