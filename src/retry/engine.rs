use super::checkpoint::{Checkpoint, CheckpointStore};
use super::config::RetryConfig;
use super::failure::{FailureClass, SourceError};
use super::sleeper::{Sleeper, ThreadSleeper};
use crate::clock::{self, SharedClock};
use crate::logging::{self, SharedLogger};
use core::fmt::{Debug, Display, Formatter};
use core::time::Duration;
use log::Level;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "     retry";
const RATE_LIMIT_PADDING: Duration = Duration::from_secs(5);
const RATE_LIMIT_JITTER_SECS: f64 = 10.0;
const BACKOFF_JITTER_FRACTION: f64 = 0.1;
const DEFAULT_RESET_WAIT_SECS: i64 = 3600;

/// Why [`RetryEngine::execute`] gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// A non-retryable failure; raised on first sight.
    Client { error: SourceError, retry_count: u32 },

    /// Every allowed wait was spent and the operation still failed.
    Exhausted {
        operation_id: String,
        retry_count: u32,
        last: SourceError,
    },

    /// The next wait would push the call past its cumulative wait budget.
    WaitBudgetExceeded {
        operation_id: String,
        retry_count: u32,
        waited: Duration,
        last: SourceError,
    },
}

impl RetryError {
    /// Waits performed before giving up.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        match self {
            Self::Client { retry_count, .. } | Self::Exhausted { retry_count, .. } | Self::WaitBudgetExceeded { retry_count, .. } => {
                *retry_count
            }
        }
    }

    /// The last failure observed from the operation.
    #[must_use]
    pub const fn last_error(&self) -> &SourceError {
        match self {
            Self::Client { error, .. } => error,
            Self::Exhausted { last, .. } | Self::WaitBudgetExceeded { last, .. } => last,
        }
    }
}

impl Display for RetryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Client { error, .. } => write!(f, "{error}"),
            Self::Exhausted {
                operation_id,
                retry_count,
                last,
            } => write!(f, "'{operation_id}' still failing after {retry_count} retries: {last}"),
            Self::WaitBudgetExceeded {
                operation_id,
                waited,
                last,
                ..
            } => write!(
                f,
                "'{operation_id}' exceeded its wait budget after waiting {:.1}s: {last}",
                waited.as_secs_f64()
            ),
        }
    }
}

impl core::error::Error for RetryError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(self.last_error())
    }
}

/// Runs a remote call, waiting out rate limits and transient failures.
///
/// The engine is synchronous: waits block the calling thread through the injected [`Sleeper`].
pub struct RetryEngine {
    config: RetryConfig,
    checkpoints: Option<CheckpointStore>,
    clock: SharedClock,
    sleeper: Arc<dyn Sleeper>,
    rng: Mutex<StdRng>,
    logger: SharedLogger,
}

impl Debug for RetryEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RetryEngine")
            .field("config", &self.config)
            .field("checkpoints", &self.checkpoints)
            .field("clock", &self.clock)
            .field("sleeper", &self.sleeper)
            .finish_non_exhaustive()
    }
}

impl RetryEngine {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            checkpoints: None,
            clock: clock::system(),
            sleeper: Arc::new(ThreadSleeper),
            rng: Mutex::new(StdRng::from_entropy()),
            logger: logging::global(),
        }
    }

    #[must_use]
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Makes jitter reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    #[must_use]
    pub const fn checkpoints(&self) -> Option<&CheckpointStore> {
        self.checkpoints.as_ref()
    }

    /// Run `operation` until it succeeds, fails with a client error, or runs out of retries.
    ///
    /// When `checkpoint_key` is given, a [`Checkpoint`] is written under it before every
    /// wait and removed once the operation succeeds.
    pub fn execute<T, F>(&self, operation_id: &str, checkpoint_key: Option<&str>, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Result<T, SourceError>,
    {
        let mut retry_count = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            let error = match operation() {
                Ok(value) => {
                    if retry_count > 0 {
                        emit!(self.logger, Level::Debug, "'{operation_id}' succeeded after {retry_count} retries");
                        self.clear_checkpoint(checkpoint_key);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let wait = match error.class() {
                FailureClass::ClientError => {
                    emit!(self.logger, Level::Debug, "'{operation_id}' failed with a non-retryable error: {error}");
                    return Err(RetryError::Client { error, retry_count });
                }
                FailureClass::RateLimited => self.rate_limit_wait(&error),
                FailureClass::SecondaryRateLimited | FailureClass::ServerError | FailureClass::Unknown => {
                    self.backoff_wait(retry_count, error.retry_after())
                }
            };

            if retry_count >= self.config.max_retries {
                emit!(
                    self.logger,
                    Level::Error,
                    "Giving up on '{operation_id}' after {retry_count} retries: {error}"
                );
                return Err(RetryError::Exhausted {
                    operation_id: operation_id.to_string(),
                    retry_count,
                    last: error,
                });
            }

            if let Some(budget) = self.config.max_total_wait
                && waited + wait > budget
            {
                emit!(
                    self.logger,
                    Level::Error,
                    "Giving up on '{operation_id}': waiting {:.1}s more would exceed the {:.1}s budget",
                    wait.as_secs_f64(),
                    budget.as_secs_f64()
                );
                return Err(RetryError::WaitBudgetExceeded {
                    operation_id: operation_id.to_string(),
                    retry_count,
                    waited,
                    last: error,
                });
            }

            self.save_checkpoint(checkpoint_key, operation_id, retry_count);

            emit!(
                self.logger,
                Level::Warn,
                "{} for '{operation_id}', waiting {:.1}s (retry {}/{})",
                describe(error.class()),
                wait.as_secs_f64(),
                retry_count + 1,
                self.config.max_retries
            );

            self.sleeper.sleep(wait);
            waited += wait;
            retry_count += 1;
        }
    }

    /// Wait until the reported reset, plus padding and up to ten seconds of jitter.
    fn rate_limit_wait(&self, error: &SourceError) -> Duration {
        let now = self.clock.now();
        let reset_at = error
            .rate_limit_reset()
            .unwrap_or_else(|| now + chrono::Duration::seconds(DEFAULT_RESET_WAIT_SECS));
        let until_reset = (reset_at - now).to_std().unwrap_or(Duration::ZERO);
        let jitter = Duration::from_secs_f64(self.random_unit() * RATE_LIMIT_JITTER_SECS);

        (until_reset + RATE_LIMIT_PADDING + jitter).min(self.config.max_delay)
    }

    /// Exponential backoff with up to 10% jitter. A server-provided `retry-after` acts as a floor.
    fn backoff_wait(&self, retry_count: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self.config.backoff_delay(retry_count);
        let jitter = delay.mul_f64(self.random_unit() * BACKOFF_JITTER_FRACTION);
        let wait = (delay + jitter).max(retry_after.unwrap_or(Duration::ZERO));

        wait.min(self.config.max_delay)
    }

    fn random_unit(&self) -> f64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).r#gen::<f64>()
    }

    fn save_checkpoint(&self, key: Option<&str>, operation_id: &str, retry_count: u32) {
        let (Some(key), Some(store)) = (key, &self.checkpoints) else {
            return;
        };

        let checkpoint = Checkpoint {
            operation_id: operation_id.to_string(),
            retry_count,
            timestamp: self.clock.now(),
        };

        if let Err(e) = store.save(key, &checkpoint) {
            emit!(self.logger, Level::Warn, "Could not save checkpoint '{key}': {e:#}");
        }
    }

    fn clear_checkpoint(&self, key: Option<&str>) {
        let (Some(key), Some(store)) = (key, &self.checkpoints) else {
            return;
        };

        if let Err(e) = store.clear(key) {
            emit!(self.logger, Level::Warn, "Could not remove checkpoint '{key}': {e:#}");
        }
    }
}

const fn describe(class: FailureClass) -> &'static str {
    match class {
        FailureClass::RateLimited => "Rate limit exceeded",
        FailureClass::SecondaryRateLimited => "Secondary rate limit hit",
        FailureClass::ServerError => "Server error",
        FailureClass::ClientError => "Client error",
        FailureClass::Unknown => "Request failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::logging::CapturingLogger;
    use crate::retry::RecordingSleeper;
    use chrono::{DateTime, Utc};
    use core::cell::Cell;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_704_067_200, 0).unwrap()
    }

    struct Harness {
        engine: RetryEngine,
        clock: Arc<ManualClock>,
        sleeper: Arc<RecordingSleeper>,
        capture: Arc<CapturingLogger>,
    }

    fn harness(config: RetryConfig) -> Harness {
        let clock = ManualClock::new(start());
        let sleeper = RecordingSleeper::advancing(Arc::clone(&clock));
        let capture = CapturingLogger::new();
        let engine = RetryEngine::new(config)
            .with_clock(clock.clone())
            .with_sleeper(sleeper.clone())
            .with_logger(capture.clone())
            .with_seed(7);

        Harness {
            engine,
            clock,
            sleeper,
            capture,
        }
    }

    #[test]
    fn test_success_on_first_attempt_does_not_wait() {
        let h = harness(RetryConfig::default());
        let value = h.engine.execute("op", None, || Ok::<_, SourceError>(42)).unwrap();
        assert_eq!(value, 42);
        assert!(h.sleeper.waits().is_empty());
    }

    #[test]
    fn test_client_error_raises_immediately() {
        let h = harness(RetryConfig::default());
        let calls = Cell::new(0);

        let err = h
            .engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                Err::<(), _>(SourceError::client(404, "Not Found"))
            })
            .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert_eq!(err.retry_count(), 0);
        assert!(matches!(err, RetryError::Client { .. }));
        assert_eq!(err.last_error().status(), Some(404));
        assert!(h.sleeper.waits().is_empty());
    }

    #[test]
    fn test_rate_limit_waits_until_reset_plus_padding() {
        let h = harness(RetryConfig::default());
        let reset = start() + chrono::Duration::seconds(10);
        let calls = Cell::new(0);

        let value = h
            .engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(SourceError::rate_limited(Some(reset), "API rate limit exceeded"))
                } else {
                    Ok("done")
                }
            })
            .unwrap();

        assert_eq!(value, "done");
        let waits = h.sleeper.waits();
        assert_eq!(waits.len(), 1);
        assert!(waits[0] >= Duration::from_secs(15), "waited {:?}", waits[0]);
        assert!(waits[0] <= Duration::from_secs(25), "waited {:?}", waits[0]);
    }

    #[test]
    fn test_rate_limit_without_reset_assumes_an_hour_capped_by_max_delay() {
        let h = harness(RetryConfig::default());
        let calls = Cell::new(0);

        h.engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 { Err(SourceError::rate_limited(None, "limited")) } else { Ok(()) }
            })
            .unwrap();

        assert_eq!(h.sleeper.waits(), vec![Duration::from_secs(300)]);
    }

    #[test]
    fn test_rate_limit_reset_in_the_past_still_pads() {
        let h = harness(RetryConfig::default());
        let reset = start() - chrono::Duration::seconds(30);
        let calls = Cell::new(0);

        h.engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(SourceError::rate_limited(Some(reset), "limited"))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        let wait = h.sleeper.waits()[0];
        assert!(wait >= Duration::from_secs(5) && wait <= Duration::from_secs(15), "waited {wait:?}");
    }

    #[test]
    fn test_backoff_grows_within_jitter_bounds() {
        let h = harness(RetryConfig::default());
        let calls = Cell::new(0);

        h.engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                if calls.get() <= 4 { Err(SourceError::server(502, "Bad Gateway")) } else { Ok(()) }
            })
            .unwrap();

        let waits = h.sleeper.waits();
        assert_eq!(waits.len(), 4);
        for (retry_count, wait) in waits.iter().enumerate() {
            let base = Duration::from_secs(1 << retry_count);
            assert!(*wait >= base, "retry {retry_count} waited {wait:?}");
            assert!(*wait <= base.mul_f64(1.1), "retry {retry_count} waited {wait:?}");
        }
    }

    #[test]
    fn test_secondary_rate_limit_uses_backoff() {
        let h = harness(RetryConfig::default());
        let calls = Cell::new(0);

        h.engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(SourceError::secondary_rate_limited("slow down"))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        let wait = h.sleeper.waits()[0];
        assert!(wait >= Duration::from_secs(1) && wait <= Duration::from_millis(1100), "waited {wait:?}");
    }

    #[test]
    fn test_retry_after_is_a_floor_for_backoff() {
        let h = harness(RetryConfig::default());
        let calls = Cell::new(0);

        h.engine
            .execute("op", None, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(SourceError::from_http(429, "slow down", None, None, Some(Duration::from_secs(30))))
                } else {
                    Ok(())
                }
            })
            .unwrap();

        assert_eq!(h.sleeper.waits(), vec![Duration::from_secs(30)]);
    }

    #[test]
    fn test_exhaustion_raises_last_error() {
        let config = RetryConfig {
            max_retries: 3,
            ..RetryConfig::default()
        };
        let h = harness(config);
        let calls = Cell::new(0);

        let err = h
            .engine
            .execute("collect_review_octo/hello", None, || {
                calls.set(calls.get() + 1);
                Err::<(), _>(SourceError::server(500, format!("boom {}", calls.get())))
            })
            .unwrap_err();

        assert_eq!(calls.get(), 4);
        assert_eq!(h.sleeper.waits().len(), 3);
        assert_eq!(err.retry_count(), 3);
        assert_eq!(err.last_error().message(), "boom 4");
        assert!(err.to_string().contains("collect_review_octo/hello"));
        assert_eq!(h.capture.messages_at(Level::Warn).len(), 3);
        assert_eq!(h.capture.messages_at(Level::Error).len(), 1);
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let config = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        let h = harness(config);

        let err = h
            .engine
            .execute("op", None, || Err::<(), _>(SourceError::transport("connection reset")))
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { retry_count: 0, .. }));
        assert!(h.sleeper.waits().is_empty());
    }

    #[test]
    fn test_wait_budget_stops_before_overflowing() {
        let config = RetryConfig {
            max_total_wait: Some(Duration::from_secs(5)),
            ..RetryConfig::default()
        };
        let h = harness(config);

        let err = h
            .engine
            .execute("op", None, || Err::<(), _>(SourceError::server(503, "unavailable")))
            .unwrap_err();

        // 1s + 2s fit in the budget; the ~4s wait that follows does not
        assert!(matches!(err, RetryError::WaitBudgetExceeded { retry_count: 2, .. }));
        assert!(h.sleeper.total() <= Duration::from_secs(5));
        assert_eq!(h.sleeper.waits().len(), 2);
    }

    #[test]
    fn test_waits_are_logged_with_operation_and_retry_count() {
        let h = harness(RetryConfig::default());
        let calls = Cell::new(0);

        h.engine
            .execute("collect_commit_octo/hello", None, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 { Err(SourceError::server(500, "oops")) } else { Ok(()) }
            })
            .unwrap();

        let warnings = h.capture.messages_at(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("collect_commit_octo/hello"));
        assert!(warnings[0].contains("retry 1/10"));
        assert_eq!(h.capture.records()[0].target, "retry");
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_checkpoint_written_before_wait_and_cleared_on_success() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let h = harness(RetryConfig::default());
        let engine = h.engine.with_checkpoints(store.clone());
        let calls = Cell::new(0);

        engine
            .execute("op", Some("commits_octo_hello_2024-01-01"), || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    let saved = store.load("commits_octo_hello_2024-01-01").unwrap();
                    if calls.get() == 2 {
                        assert_eq!(saved.unwrap().retry_count, 0);
                    }
                    Err(SourceError::server(500, "oops"))
                } else {
                    let saved = store.load("commits_octo_hello_2024-01-01").unwrap().unwrap();
                    assert_eq!(saved.retry_count, 1);
                    assert_eq!(saved.operation_id, "op");
                    Ok(())
                }
            })
            .unwrap();

        assert!(store.load("commits_octo_hello_2024-01-01").unwrap().is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_checkpoint_left_behind_when_giving_up() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        let config = RetryConfig {
            max_retries: 2,
            ..RetryConfig::default()
        };
        let h = harness(config);
        let clock = Arc::clone(&h.clock);
        let engine = h.engine.with_checkpoints(store.clone());

        let _ = engine
            .execute("op", Some("key"), || Err::<(), _>(SourceError::server(500, "oops")))
            .unwrap_err();

        let saved = store.load("key").unwrap().unwrap();
        assert_eq!(saved.retry_count, 1);
        assert!(saved.timestamp <= clock.now());
    }

    #[test]
    fn test_seeded_engines_produce_identical_waits() {
        let a = harness(RetryConfig::default());
        let b = harness(RetryConfig::default());

        for h in [&a, &b] {
            let calls = Cell::new(0);
            h.engine
                .execute("op", None, || {
                    calls.set(calls.get() + 1);
                    if calls.get() <= 3 { Err(SourceError::server(500, "oops")) } else { Ok(()) }
                })
                .unwrap();
        }

        assert_eq!(a.sleeper.waits(), b.sleeper.waits());
    }
}
