use crate::Result;
use core::time::Duration;
use ohno::bail;
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`super::RetryEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    /// Delay before the first backoff retry
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    /// Upper bound for any single wait
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Number of waits allowed before giving up
    pub max_retries: u32,

    /// Upper bound for the sum of all waits in one call; unbounded when absent
    #[serde(with = "humantime_serde::option", skip_serializing_if = "Option::is_none")]
    pub max_total_wait: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            max_retries: 10,
            max_total_wait: None,
        }
    }
}

impl RetryConfig {
    /// The backoff delay before jitter: `base_delay * 2^retry_count`, clamped to `max_delay`.
    #[must_use]
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        2u32.checked_pow(retry_count)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// # Errors
    ///
    /// Returns an error if the delays are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            bail!("retry base_delay must be greater than zero");
        }

        if self.max_delay < self.base_delay {
            bail!(
                "retry max_delay ({:?}) must not be less than base_delay ({:?})",
                self.max_delay,
                self.base_delay
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(300));
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.max_total_wait, None);
        config.validate().unwrap();
    }

    #[test]
    fn test_backoff_doubles_until_clamped() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_delay(0), Duration::from_secs(1));
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(5), Duration::from_secs(32));
        assert_eq!(config.backoff_delay(8), Duration::from_secs(256));
        assert_eq!(config.backoff_delay(9), Duration::from_secs(300));
        assert_eq!(config.backoff_delay(64), Duration::from_secs(300));
    }

    #[test]
    fn test_backoff_for_many_bases() {
        for base_ms in [10_u64, 250, 1000, 7000] {
            let config = RetryConfig {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_secs(60),
                ..RetryConfig::default()
            };

            for retry_count in 0..12 {
                let expected = Duration::from_millis(base_ms * (1 << retry_count)).min(Duration::from_secs(60));
                assert_eq!(config.backoff_delay(retry_count), expected, "base {base_ms}ms, retry {retry_count}");
            }
        }
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let config = RetryConfig {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(5),
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            base_delay: Duration::ZERO,
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: RetryConfig = toml::from_str(
            r#"
            base_delay = "500ms"
            max_delay = "2m"
            max_retries = 3
            max_total_wait = "10m"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(120));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_total_wait, Some(Duration::from_secs(600)));
    }
}
