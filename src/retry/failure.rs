use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use serde::Serialize;
use strum::Display as StrumDisplay;

/// How a failed remote call should be handled.
///
/// Computed once, when the error is built at the source boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    /// The primary quota is spent; wait until it resets.
    RateLimited,

    /// Abuse detection or request-rate throttling; back off exponentially.
    SecondaryRateLimited,

    /// The remote side failed; back off exponentially.
    ServerError,

    /// The request itself is wrong. Never retried.
    ClientError,

    /// No response was received (connection, TLS, timeout, undecodable body).
    Unknown,
}

impl FailureClass {
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::ClientError)
    }

    /// Classify an HTTP failure.
    ///
    /// `remaining` is the `x-ratelimit-remaining` header and `has_retry_after` tells whether a
    /// `retry-after` header was present.
    #[must_use]
    pub fn from_http(status: u16, message: &str, remaining: Option<u64>, has_retry_after: bool) -> Self {
        let lowered = message.to_ascii_lowercase();

        match status {
            429 => Self::SecondaryRateLimited,
            403 if has_retry_after || lowered.contains("secondary rate limit") => Self::SecondaryRateLimited,
            403 if remaining == Some(0) || lowered.contains("rate limit") => Self::RateLimited,
            500.. => Self::ServerError,
            _ => Self::ClientError,
        }
    }
}

/// A failed call against the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    class: FailureClass,
    status: Option<u16>,
    message: String,
    rate_limit_reset: Option<DateTime<Utc>>,
    retry_after: Option<Duration>,
}

impl SourceError {
    /// Build an error from an HTTP response, classifying it on the way.
    #[must_use]
    pub fn from_http(
        status: u16,
        message: impl Into<String>,
        remaining: Option<u64>,
        rate_limit_reset: Option<DateTime<Utc>>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        let class = FailureClass::from_http(status, &message, remaining, retry_after.is_some());

        Self {
            class,
            status: Some(status),
            message,
            rate_limit_reset,
            retry_after,
        }
    }

    /// A primary rate-limit failure (HTTP 403) with an optional reset instant.
    #[must_use]
    pub fn rate_limited(rate_limit_reset: Option<DateTime<Utc>>, message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::RateLimited,
            status: Some(403),
            message: message.into(),
            rate_limit_reset,
            retry_after: None,
        }
    }

    /// A secondary rate-limit failure (HTTP 429).
    #[must_use]
    pub fn secondary_rate_limited(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::SecondaryRateLimited,
            status: Some(429),
            message: message.into(),
            rate_limit_reset: None,
            retry_after: None,
        }
    }

    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::ServerError,
            status: Some(status),
            message: message.into(),
            rate_limit_reset: None,
            retry_after: None,
        }
    }

    #[must_use]
    pub fn client(status: u16, message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::ClientError,
            status: Some(status),
            message: message.into(),
            rate_limit_reset: None,
            retry_after: None,
        }
    }

    /// A failure where no HTTP status was received.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Unknown,
            status: None,
            message: message.into(),
            rate_limit_reset: None,
            retry_after: None,
        }
    }

    #[must_use]
    pub const fn class(&self) -> FailureClass {
        self.class
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        self.rate_limit_reset
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status}): {}", self.class, self.message),
            None => write!(f, "{}: {}", self.class, self.message),
        }
    }
}

impl core::error::Error for SourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_http_statuses() {
        assert_eq!(FailureClass::from_http(429, "", None, false), FailureClass::SecondaryRateLimited);
        assert_eq!(FailureClass::from_http(500, "", None, false), FailureClass::ServerError);
        assert_eq!(FailureClass::from_http(503, "", None, false), FailureClass::ServerError);
        assert_eq!(FailureClass::from_http(404, "Not Found", None, false), FailureClass::ClientError);
        assert_eq!(FailureClass::from_http(422, "", None, false), FailureClass::ClientError);
    }

    #[test]
    fn test_classify_403_variants() {
        assert_eq!(
            FailureClass::from_http(403, "API rate limit exceeded for user", Some(0), false),
            FailureClass::RateLimited
        );
        assert_eq!(FailureClass::from_http(403, "", Some(0), false), FailureClass::RateLimited);
        assert_eq!(
            FailureClass::from_http(403, "You have exceeded a secondary rate limit", Some(100), false),
            FailureClass::SecondaryRateLimited
        );
        assert_eq!(FailureClass::from_http(403, "", Some(10), true), FailureClass::SecondaryRateLimited);
        assert_eq!(
            FailureClass::from_http(403, "Resource not accessible by integration", Some(4000), false),
            FailureClass::ClientError
        );
    }

    #[test]
    fn test_only_client_errors_are_final() {
        assert!(FailureClass::RateLimited.is_retryable());
        assert!(FailureClass::SecondaryRateLimited.is_retryable());
        assert!(FailureClass::ServerError.is_retryable());
        assert!(FailureClass::Unknown.is_retryable());
        assert!(!FailureClass::ClientError.is_retryable());
    }

    #[test]
    fn test_from_http_keeps_headers() {
        let reset = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        let err = SourceError::from_http(403, "API rate limit exceeded", Some(0), Some(reset), None);
        assert_eq!(err.class(), FailureClass::RateLimited);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.rate_limit_reset(), Some(reset));
        assert_eq!(err.to_string(), "rate_limited (HTTP 403): API rate limit exceeded");
    }

    #[test]
    fn test_transport_has_no_status() {
        let err = SourceError::transport("connection refused");
        assert_eq!(err.class(), FailureClass::Unknown);
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "unknown: connection refused");
    }
}
