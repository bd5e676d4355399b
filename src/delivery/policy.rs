//! Flush policy.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default transmission interval (5 minutes).
pub const DEFAULT_TRANSMISSION_INTERVAL: Duration = Duration::from_secs(300);

/// Decides when buffered events must be sent.
///
/// Holds a single value, the transmission interval. The buffer is flushed
/// once its oldest event is strictly older than that interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    transmission_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSMISSION_INTERVAL)
    }
}

impl FlushPolicy {
    /// Create a policy with the given transmission interval.
    pub fn new(transmission_interval: Duration) -> Self {
        Self {
            transmission_interval,
        }
    }

    /// Current transmission interval.
    pub fn transmission_interval(&self) -> Duration {
        self.transmission_interval
    }

    /// Whether a buffer whose oldest event has this age must be flushed.
    pub fn should_flush(&self, oldest_pending_age: Duration) -> bool {
        oldest_pending_age > self.transmission_interval
    }

    /// Age of an event captured at `timestamp`, measured at `now`.
    ///
    /// Uses the absolute difference: an event stamped in the future by a
    /// skewed clock ages the same way as one in the past.
    pub fn age_of(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (now - timestamp).abs().to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let policy = FlushPolicy::new(Duration::from_secs(60));
        assert!(!policy.should_flush(Duration::from_secs(59)));
        assert!(!policy.should_flush(Duration::from_secs(60)));
        assert!(policy.should_flush(Duration::from_secs(61)));
        assert!(policy.should_flush(Duration::from_millis(60_001)));
    }

    #[test]
    fn test_zero_interval_flushes_any_age() {
        let policy = FlushPolicy::new(Duration::ZERO);
        assert!(!policy.should_flush(Duration::ZERO));
        assert!(policy.should_flush(Duration::from_millis(1)));
    }

    #[test]
    fn test_age_of_is_absolute() {
        let now = Utc::now();
        let past = now - chrono::Duration::seconds(61);
        let future = now + chrono::Duration::seconds(61);
        assert_eq!(FlushPolicy::age_of(past, now), Duration::from_secs(61));
        assert_eq!(FlushPolicy::age_of(future, now), Duration::from_secs(61));
        assert_eq!(FlushPolicy::age_of(now, now), Duration::ZERO);
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(
            FlushPolicy::default().transmission_interval(),
            DEFAULT_TRANSMISSION_INTERVAL
        );
    }
}
