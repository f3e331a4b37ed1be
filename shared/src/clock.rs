//! World clocks: the authority's simulation clock and the client's estimate of it

use std::time::Instant;

/// Source of the shared world time used to stamp moves.
pub trait WorldClock {
    /// Seconds on the authority's world clock.
    fn server_time_seconds(&self) -> f64;
}

/// The authority's clock: seconds since the simulation started.
#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    started: Instant,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldClock for ServerClock {
    fn server_time_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// Client-side estimate of the authority's clock.
///
/// Every packet stamped with `server_time` is a sample of
/// `server_time - local_elapsed`, which undershoots the true offset by the
/// one-way latency of that packet. Keeping the maximum sample converges on the
/// least-delayed packet and means the estimate, and with it every move
/// timestamp, only ever moves forward.
#[derive(Debug, Clone, Copy)]
pub struct SyncedClock {
    origin: Instant,
    offset: Option<f64>,
}

impl SyncedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: None,
        }
    }

    pub fn local_seconds(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    pub fn observe(&mut self, server_time: f64) {
        let local = self.local_seconds();
        self.observe_at(server_time, local);
    }

    pub fn observe_at(&mut self, server_time: f64, local_seconds: f64) {
        let sample = server_time - local_seconds;
        self.offset = Some(match self.offset {
            Some(offset) => offset.max(sample),
            None => sample,
        });
    }

    pub fn is_synchronized(&self) -> bool {
        self.offset.is_some()
    }

    pub fn offset(&self) -> Option<f64> {
        self.offset
    }

    pub fn server_time_at(&self, local_seconds: f64) -> f64 {
        local_seconds + self.offset.unwrap_or(0.0)
    }
}

impl Default for SyncedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldClock for SyncedClock {
    fn server_time_seconds(&self) -> f64 {
        self.server_time_at(self.local_seconds())
    }
}

/// Hand-advanced clock for loopback hosting and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    now: f64,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self { now }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
    }

    pub fn set(&mut self, now: f64) {
        self.now = now;
    }
}

impl WorldClock for ManualClock {
    fn server_time_seconds(&self) -> f64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_server_clock_is_monotonic() {
        let clock = ServerClock::new();
        let first = clock.server_time_seconds();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = clock.server_time_seconds();
        assert!(second > first);
    }

    #[test]
    fn test_synced_clock_keeps_least_delayed_sample() {
        let mut clock = SyncedClock::new();
        assert!(!clock.is_synchronized());

        // Server is 100s ahead; packets arrive with 30ms then 10ms then 50ms latency.
        clock.observe_at(100.0 + 1.0 - 0.030, 1.0);
        clock.observe_at(100.0 + 2.0 - 0.010, 2.0);
        clock.observe_at(100.0 + 3.0 - 0.050, 3.0);

        assert!(clock.is_synchronized());
        assert_approx_eq!(clock.offset().unwrap(), 99.99, 1e-9);
        assert_approx_eq!(clock.server_time_at(4.0), 103.99, 1e-9);
    }

    #[test]
    fn test_synced_clock_never_moves_backwards() {
        let mut clock = SyncedClock::new();
        clock.observe_at(50.0, 1.0);
        let before = clock.server_time_at(2.0);
        clock.observe_at(10.0, 1.5);
        assert_eq!(clock.server_time_at(2.0), before);
    }

    #[test]
    fn test_manual_clock() {
        let mut clock = ManualClock::new(1.0);
        clock.advance(0.5);
        assert_eq!(clock.server_time_seconds(), 1.5);
        clock.set(10.0);
        assert_eq!(clock.server_time_seconds(), 10.0);
    }
}
