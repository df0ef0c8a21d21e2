//! Heartbeat-driven virtual clock.
//!
//! The client keeps a local clock that advances at `dt * (1 + sync_rate)`
//! and is nudged toward the server's clock on every heartbeat reply. The
//! correction is a bounded proportional term rather than a snap, so remote
//! playback (which samples this clock) never sees a discontinuous jump.

/// Lag below this threshold counts as converged.
pub const SYNC_EPSILON: f32 = 0.1;
/// Proportional gain applied to the measured lag.
pub const SYNC_FACTOR: f32 = 0.1;
/// The clock never runs backwards and never more than ~2x real time.
pub const MAX_SYNC_RATE: f32 = 0.9999;

/// Tracks `Uninitialized -> Tracking`: the clock is meaningless until the
/// first heartbeat reply seeds it from the server time.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    started: bool,
    current: f32,
    sync_rate: f32,
    latency: f32,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            started: false,
            current: 0.0,
            sync_rate: 0.0,
            latency: 0.0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn now(&self) -> f32 {
        self.current
    }

    pub fn sync_rate(&self) -> f32 {
        self.sync_rate
    }

    pub fn latency(&self) -> f32 {
        self.latency
    }

    /// Advances the clock by one frame. No-op until the first correction.
    pub fn advance(&mut self, dt: f32) {
        if !self.started {
            return;
        }
        self.current += dt * (1.0 + self.sync_rate);
    }

    /// Applies a heartbeat reply.
    ///
    /// The first reply seeds the clock at `server_time + latency / 2` (the
    /// reply is half a round trip old by the time it arrives). Later replies
    /// recompute the sync rate from the remaining lag.
    pub fn correct(&mut self, server_time: f32, latency: f32) {
        self.latency = latency;

        if !self.started {
            self.started = true;
            self.current = server_time + latency / 2.0;
            return;
        }

        let lag = server_time - self.current;
        if lag.abs() < SYNC_EPSILON {
            self.sync_rate = 0.0;
        } else {
            self.sync_rate = (lag * SYNC_FACTOR).clamp(-MAX_SYNC_RATE, MAX_SYNC_RATE);
        }
    }

    pub fn reset(&mut self) {
        *self = VirtualClock::new();
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_uninitialized_clock_does_not_advance() {
        let mut clock = VirtualClock::new();
        clock.advance(1.0);
        assert!(!clock.is_started());
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_first_correction_seeds_from_server_time() {
        let mut clock = VirtualClock::new();
        clock.correct(100.0, 0.2);
        assert!(clock.is_started());
        assert_approx_eq!(clock.now(), 100.1);
        assert_eq!(clock.sync_rate(), 0.0);
    }

    #[test]
    fn test_converged_clock_runs_at_real_time() {
        let mut clock = VirtualClock::new();
        clock.correct(10.0, 0.0);
        clock.correct(10.05, 0.0);
        assert_eq!(clock.sync_rate(), 0.0);

        clock.advance(0.5);
        assert_approx_eq!(clock.now(), 10.5);
    }

    #[test]
    fn test_lagging_clock_speeds_up() {
        let mut clock = VirtualClock::new();
        clock.correct(10.0, 0.0);
        // Server is 2 seconds ahead of us.
        clock.correct(12.0, 0.0);
        assert!(clock.sync_rate() > 0.0);
        assert_approx_eq!(clock.sync_rate(), 2.0 * SYNC_FACTOR);

        let before = clock.now();
        clock.advance(1.0);
        assert!(clock.now() - before > 1.0);
    }

    #[test]
    fn test_leading_clock_slows_down_but_never_reverses() {
        let mut clock = VirtualClock::new();
        clock.correct(10.0, 0.0);
        // We are far ahead of the server.
        clock.correct(-1000.0, 0.0);
        assert_eq!(clock.sync_rate(), -MAX_SYNC_RATE);

        let before = clock.now();
        clock.advance(1.0);
        // Slowed almost to a halt, but still monotonic.
        assert!(clock.now() >= before);
    }

    #[test]
    fn test_convergence_under_constant_lag() {
        // Client seeded 1.5s behind a server whose clock then advances in
        // real time, heartbeat at 1 Hz. The rate must push the lag under
        // epsilon within a bounded number of heartbeats, without exceeding
        // the configured maximum.
        let mut clock = VirtualClock::new();
        clock.correct(48.5, 0.0);
        let mut server_time = 50.0_f32; // already 1.5s ahead

        let mut heartbeats = 0;
        loop {
            server_time += 1.0;
            clock.advance(1.0);
            clock.correct(server_time, 0.0);
            heartbeats += 1;

            assert!(clock.sync_rate().abs() <= MAX_SYNC_RATE);
            let lag = server_time - clock.now();
            if lag.abs() < SYNC_EPSILON {
                break;
            }
            assert!(heartbeats < 100, "clock failed to converge: lag {}", lag);
        }

        // One more converged heartbeat settles the rate to zero.
        server_time += 1.0;
        clock.advance(1.0);
        clock.correct(server_time, 0.0);
        assert_eq!(clock.sync_rate(), 0.0);
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let mut clock = VirtualClock::new();
        clock.correct(5.0, 0.0);
        clock.advance(1.0);
        clock.reset();
        assert!(!clock.is_started());
        assert_eq!(clock.now(), 0.0);
    }
}
