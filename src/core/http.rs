//! HTTP client utilities.
//!
//! Provides a shared HTTP client and the JSON round trip used by both
//! provider clients. Status codes are mapped onto [`RalphError`] here so the
//! rate limiter sees a uniform error shape regardless of provider.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::core::provider::Provider;
use crate::error::{RalphError, Result};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Longest error-body excerpt carried in an error message.
const ERROR_BODY_LIMIT: usize = 500;

/// A parsed response body together with the headers it arrived with.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: T,
}

/// Build a configured HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("ralph/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| RalphError::Config(format!("failed to build HTTP client: {e}")))
}

/// Get or create a default HTTP client.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn default_client() -> Result<Client> {
    build_client(DEFAULT_TIMEOUT)
}

/// Send a prepared request and decode a JSON body.
///
/// HTTP 429 maps to [`RalphError::RateLimited`] (honouring a `retry-after`
/// header in seconds), any other non-2xx to [`RalphError::ProviderApiError`].
///
/// # Errors
///
/// Returns error on timeout, connection failure, non-2xx status or a body
/// that does not decode as `T`.
pub async fn send_json<T: DeserializeOwned>(
    provider: Provider,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<ApiResponse<T>> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_transport_error(provider, timeout, &e))?;

    let status = response.status();
    let headers = response.headers().clone();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let message = response.text().await.unwrap_or_default();
        return Err(RalphError::RateLimited {
            provider,
            retry_after: parse_retry_after(&headers),
            message: truncate_body(&message),
        });
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(RalphError::ProviderApiError {
            provider,
            status_code: status.as_u16(),
            message: truncate_body(&message),
        });
    }

    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(provider, timeout, &e))?;
    let body = serde_json::from_str(&text).map_err(|e| RalphError::ParseResponse {
        provider,
        message: e.to_string(),
    })?;

    Ok(ApiResponse {
        status: status.as_u16(),
        headers,
        body,
    })
}

fn map_transport_error(provider: Provider, timeout: Duration, err: &reqwest::Error) -> RalphError {
    if err.is_timeout() {
        RalphError::Timeout { provider, timeout }
    } else {
        RalphError::Network {
            provider,
            message: err.to_string(),
        }
    }
}

/// Parse a `retry-after` header given in (possibly fractional) seconds.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let secs: f64 = raw.parse().ok()?;
    if secs.is_finite() && secs > 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_accepts_fractional_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn retry_after_ignores_garbage_and_zero() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("0"));
        assert_eq!(parse_retry_after(&headers), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), ERROR_BODY_LIMIT + 1);
        assert!(truncated.ends_with('…'));
        assert_eq!(truncate_body("  short  "), "short");
    }
}
