use std::time::Duration;

/// Growth factor applied to the reconnect wait after each failed attempt
pub const BACKOFF_MULTIPLIER: f64 = 1.6;

/// Reconnect backoff configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Wait before the first reconnect attempt
    pub initial: Duration,
    /// Maximum wait between attempts
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1500),
            max: Duration::from_secs(20),
        }
    }
}

/// Geometric reconnect backoff.
///
/// Retries are unbounded: a camera outage is expected to be transient, so the
/// worker keeps trying until it is stopped. The wait only grows up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current: config.initial,
            failures: 0,
        }
    }

    /// Wait to apply before the next reconnect attempt
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive failed attempts since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt and grow the wait
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.mul_f64(BACKOFF_MULTIPLIER).min(self.config.max);
        self.current
    }

    /// Record a successful reconnect
    pub fn reset(&mut self) {
        self.failures = 0;
        self.current = self.config.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Duration, expected_secs: f64) {
        let diff = (actual.as_secs_f64() - expected_secs).abs();
        assert!(
            diff < 1e-6,
            "expected {:.4}s, got {:.4}s",
            expected_secs,
            actual.as_secs_f64()
        );
    }

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = Backoff::new(BackoffConfig::default());

        assert_close(backoff.current(), 1.5);
        assert_close(backoff.on_failure(), 2.4);
        assert_close(backoff.on_failure(), 3.84);
        assert_close(backoff.on_failure(), 6.144);
        assert_eq!(backoff.failures(), 3);
    }

    #[test]
    fn test_backoff_is_capped() {
        let mut backoff = Backoff::new(BackoffConfig::default());

        for _ in 0..20 {
            backoff.on_failure();
        }

        assert_eq!(backoff.current(), Duration::from_secs(20));
        assert_eq!(backoff.on_failure(), Duration::from_secs(20));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new(BackoffConfig {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
        });

        backoff.on_failure();
        backoff.on_failure();
        assert!(backoff.current() > Duration::from_millis(100));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(100));
        assert_eq!(backoff.failures(), 0);
    }
}
