//! Countdown timers driven by the control loop
//!
//! Timers never read the clock themselves. The loop measures how long each
//! iteration took and hands that duration to [`Timer::clock`], so every timer
//! in the host advances by exactly the same amount per iteration.

use std::time::Duration;

/// A countdown timer with a fixed timeout
///
/// A timer with a zero timeout is disabled: starting it has no effect and it
/// never expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    timeout: Duration,
    elapsed: Duration,
    running: bool,
}

impl Timer {
    /// Create a stopped timer
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            elapsed: Duration::ZERO,
            running: false,
        }
    }

    /// Change the timeout; the timer is stopped
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        self.stop();
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start (or restart) the countdown from the full timeout
    pub fn start(&mut self) {
        if self.timeout.is_zero() {
            return;
        }
        self.elapsed = Duration::ZERO;
        self.running = true;
    }

    /// Stop the countdown
    pub fn stop(&mut self) {
        self.elapsed = Duration::ZERO;
        self.running = false;
    }

    /// Advance the countdown
    pub fn clock(&mut self, elapsed: Duration) {
        if self.running {
            self.elapsed = self.elapsed.saturating_add(elapsed);
        }
    }

    /// Whether the timer has been started and not stopped
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a running timer has reached its timeout
    pub fn has_expired(&self) -> bool {
        self.running && self.elapsed >= self.timeout
    }

    /// Time left before expiry, zero if stopped or expired
    pub fn remaining(&self) -> Duration {
        if self.running {
            self.timeout.saturating_sub(self.elapsed)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_expires_at_timeout() {
        let mut timer = Timer::new(MS * 100);
        assert!(!timer.is_running());

        timer.start();
        timer.clock(MS * 60);
        assert!(!timer.has_expired());
        assert_eq!(timer.remaining(), MS * 40);

        timer.clock(MS * 40);
        assert!(timer.has_expired());
        assert!(timer.is_running());
    }

    #[test]
    fn test_restart_resets_countdown() {
        let mut timer = Timer::new(MS * 100);
        timer.start();
        timer.clock(MS * 90);
        timer.start();
        timer.clock(MS * 90);
        assert!(!timer.has_expired());
    }

    #[test]
    fn test_stopped_timer_does_not_advance() {
        let mut timer = Timer::new(MS * 10);
        timer.clock(MS * 50);
        assert!(!timer.has_expired());

        timer.start();
        timer.stop();
        timer.clock(MS * 50);
        assert!(!timer.has_expired());
        assert_eq!(timer.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_zero_timeout_is_disabled() {
        let mut timer = Timer::new(Duration::ZERO);
        timer.start();
        timer.clock(Duration::from_secs(3600));
        assert!(!timer.is_running());
        assert!(!timer.has_expired());
    }
}
