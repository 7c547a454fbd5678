//! GitHub API client
//!
//! Thin wrapper over `reqwest` that turns unsuccessful responses into classified
//! [`SourceError`] values and walks `Link`-paginated listings.

use crate::logging::redact;
use crate::retry::SourceError;
use chrono::{DateTime, Utc};
use core::time::Duration;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use serde::de::DeserializeOwned;

/// Items requested per page for every listing.
pub const PAGE_SIZE: u32 = 100;

const MAX_MESSAGE_CHARS: usize = 300;

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a client with an optional authentication token.
    pub fn new(token: Option<&str>, base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> crate::Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET, returning the response only when it succeeded.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        let resp = self.send(url).await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        Err(error_from_response(resp).await)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let resp = self.get(url).await?;
        resp.json().await.map_err(|e| decode_error(url, &e))
    }

    /// Fetch every page of a listing as raw JSON values.
    ///
    /// Pages are requested until one comes back empty or carries no `rel="next"` link.
    pub async fn get_pages(&self, url: &str) -> Result<Vec<serde_json::Value>, SourceError> {
        let separator = if url.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut page_num = 1u32;

        loop {
            let page_url = format!("{url}{separator}per_page={PAGE_SIZE}&page={page_num}");
            let resp = self.get(&page_url).await?;
            let has_next_page = has_next_page(resp.headers());

            let batch: Vec<serde_json::Value> = resp.json().await.map_err(|e| decode_error(&page_url, &e))?;
            if batch.is_empty() {
                break;
            }

            items.extend(batch);

            if !has_next_page {
                break;
            }

            page_num += 1;
        }

        Ok(items)
    }

    /// Membership-style probe: 204 means yes, 404 or a redirect means no.
    pub async fn probe(&self, url: &str) -> Result<bool, SourceError> {
        let resp = self.send(url).await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND || status.is_redirection() {
            return Ok(false);
        }

        if status.is_success() {
            return Ok(true);
        }

        Err(error_from_response(resp).await)
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, SourceError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::transport(redact(&format!("request to {url} failed: {e}")).into_owned()))
    }
}

async fn error_from_response(resp: reqwest::Response) -> SourceError {
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.text().await.unwrap_or_default();

    let message = error_message(status, &body);
    let rate_limit = extract_rate_limit_from_headers(&headers);
    let remaining = rate_limit
        .map(|rl| rl.remaining)
        .or_else(|| header_u64(&headers, "x-ratelimit-remaining"));

    SourceError::from_http(
        status.as_u16(),
        redact(&message).into_owned(),
        remaining,
        rate_limit.map(|rl| rl.reset_at),
        extract_retry_after(&headers),
    )
}

/// GitHub error bodies are `{"message": "..."}`; anything else is reported truncated.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(serde_json::Value::as_str).map(str::to_string));

    let message = from_json.unwrap_or_else(|| body.trim().chars().take(MAX_MESSAGE_CHARS).collect());
    if message.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        message
    }
}

fn decode_error(url: &str, e: &reqwest::Error) -> SourceError {
    SourceError::transport(redact(&format!("unable to decode response from {url}: {e}")).into_owned())
}

fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|link_str| link_str.contains(r#"rel="next""#))
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok()
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = header_u64(headers, "x-ratelimit-remaining")?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.trim().parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

/// Only the delay-seconds form of `retry-after` is honored.
fn extract_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let text = headers.get(RETRY_AFTER)?.to_str().ok()?;
    text.trim().parse::<u64>().ok().map(Duration::from_secs)
}
