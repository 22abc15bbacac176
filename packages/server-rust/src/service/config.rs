use std::time::Duration;

use batchgate_core::DEFAULT_PRIORITY_THRESHOLD;

/// Tuning knobs for the batching scheduler and the retrying dispatcher.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Number of worker loops pulling batches concurrently.
    pub concurrent_workers: usize,
    /// Requests drawn per batch.
    pub batch_size_base: usize,
    /// Ceiling on any single draw, regardless of `batch_size_base`.
    pub max_batch_size: usize,
    /// Idle interval between worker iterations with empty lanes.
    pub base_interval: Duration,
    /// Upper bound on the idle interval.
    pub max_interval: Duration,
    /// Extra idle time added per pending request.
    pub backlog_step: Duration,
    /// Base delay for exponential retry backoff.
    pub retry_backoff: Duration,
    /// Total downstream attempts per batch before it is marked failed.
    pub max_retries: u32,
    /// Payloads longer than this many characters go to the high lane.
    pub priority_threshold: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            concurrent_workers: 3,
            batch_size_base: 5,
            max_batch_size: 20,
            base_interval: Duration::from_millis(50),
            max_interval: Duration::from_millis(200),
            backlog_step: Duration::from_millis(10),
            retry_backoff: Duration::from_millis(100),
            max_retries: 3,
            priority_threshold: DEFAULT_PRIORITY_THRESHOLD,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("concurrent_workers must be at least 1")]
    NoWorkers,
    #[error("batch_size_base and max_batch_size must be at least 1")]
    ZeroBatchSize,
    #[error("max_retries must be at least 1")]
    NoAttempts,
    #[error("base_interval ({base:?}) exceeds max_interval ({max:?})")]
    IntervalOrder { base: Duration, max: Duration },
}

impl BatcherConfig {
    /// Checks the invariants the scheduler and dispatcher rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a `ConfigError`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrent_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.batch_size_base == 0 || self.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.base_interval > self.max_interval {
            return Err(ConfigError::IntervalOrder {
                base: self.base_interval,
                max: self.max_interval,
            });
        }
        Ok(())
    }

    /// Number of requests a worker removes per drain: `batch_size_base`,
    /// capped at `max_batch_size`.
    #[must_use]
    pub fn draw_size(&self) -> usize {
        self.batch_size_base.min(self.max_batch_size)
    }

    /// Idle interval for a worker given the current backlog:
    /// `min(max_interval, base_interval + backlog_step * pending)`.
    #[must_use]
    pub fn adaptive_interval(&self, pending: usize) -> Duration {
        let steps = u32::try_from(pending).unwrap_or(u32::MAX);
        let backlog = self
            .backlog_step
            .checked_mul(steps)
            .unwrap_or(self.max_interval);
        self.base_interval
            .saturating_add(backlog)
            .min(self.max_interval)
    }

    /// Delay before the retry that follows the `failures`-th failed attempt:
    /// `retry_backoff * 2^failures`.
    #[must_use]
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.retry_backoff
            .checked_mul(factor)
            .unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = BatcherConfig::default();
        assert_eq!(config.concurrent_workers, 3);
        assert_eq!(config.batch_size_base, 5);
        assert_eq!(config.max_batch_size, 20);
        assert_eq!(config.base_interval, Duration::from_millis(50));
        assert_eq!(config.max_interval, Duration::from_millis(200));
        assert_eq!(config.retry_backoff, Duration::from_millis(100));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.priority_threshold, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn draw_size_is_capped() {
        let config = BatcherConfig {
            batch_size_base: 50,
            ..BatcherConfig::default()
        };
        assert_eq!(config.draw_size(), 20);
        assert_eq!(BatcherConfig::default().draw_size(), 5);
    }

    #[test]
    fn adaptive_interval_grows_with_backlog_then_saturates() {
        let config = BatcherConfig::default();
        assert_eq!(config.adaptive_interval(0), Duration::from_millis(50));
        assert_eq!(config.adaptive_interval(5), Duration::from_millis(100));
        assert_eq!(config.adaptive_interval(15), Duration::from_millis(200));
        assert_eq!(config.adaptive_interval(1_000), Duration::from_millis(200));
        assert_eq!(config.adaptive_interval(usize::MAX), Duration::from_millis(200));
    }

    #[test]
    fn backoff_doubles_per_failure() {
        let config = BatcherConfig::default();
        assert_eq!(config.backoff_for(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for(2), Duration::from_millis(400));
        assert_eq!(config.backoff_for(3), Duration::from_millis(800));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero_workers = BatcherConfig {
            concurrent_workers: 0,
            ..BatcherConfig::default()
        };
        assert_eq!(zero_workers.validate(), Err(ConfigError::NoWorkers));

        let zero_batch = BatcherConfig {
            batch_size_base: 0,
            ..BatcherConfig::default()
        };
        assert_eq!(zero_batch.validate(), Err(ConfigError::ZeroBatchSize));

        let no_attempts = BatcherConfig {
            max_retries: 0,
            ..BatcherConfig::default()
        };
        assert_eq!(no_attempts.validate(), Err(ConfigError::NoAttempts));

        let inverted = BatcherConfig {
            base_interval: Duration::from_secs(1),
            ..BatcherConfig::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ConfigError::IntervalOrder { .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn adaptive_interval_stays_within_bounds(pending in 0usize..100_000) {
            let config = BatcherConfig::default();
            let interval = config.adaptive_interval(pending);
            proptest::prop_assert!(interval >= config.base_interval);
            proptest::prop_assert!(interval <= config.max_interval);
            proptest::prop_assert!(interval <= config.adaptive_interval(pending + 1));
        }
    }
}
