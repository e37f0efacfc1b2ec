//! Shared HTTP plumbing for the reqwest-based providers.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use formsmith_types::error::ProviderError;

/// Upper bound on a single HTTP exchange. The cascade enforces its own,
/// usually shorter, per-provider timeout on top of this.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Build the reqwest client used by a provider.
pub fn build_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::unknown(format!("failed to create HTTP client: {e}")))
}

/// Map a transport-level reqwest failure.
pub fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if let Some(status) = err.status() {
        ProviderError::from_status(status.as_u16(), &err.to_string(), None)
    } else if err.is_connect() || err.is_request() || err.is_body() {
        ProviderError::unavailable(format!("HTTP request failed: {err}"))
    } else {
        ProviderError::unknown(format!("HTTP request failed: {err}"))
    }
}

/// `retry-after` header in milliseconds. Only the delta-seconds form is read.
pub fn retry_after_ms(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0).round() as u64)
}

/// Pass successful responses through; turn anything else into a typed error.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = retry_after_ms(response.headers());
    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(500).collect();
    tracing::debug!(status = status.as_u16(), body = %body, "provider returned an error status");
    Err(ProviderError::from_status(status.as_u16(), &body, retry_after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after_ms(&headers), Some(2_000));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("0.5"));
        assert_eq!(retry_after_ms(&headers), Some(500));
    }

    #[test]
    fn test_retry_after_http_date_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after_ms(&headers), None);
    }
}
