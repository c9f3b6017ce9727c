//! HTTP retry helpers for transient errors.
//!
//! Fetchers call [`send_json`] or [`send_bytes`] instead of
//! `reqwest::RequestBuilder::send()` directly, so every request gets
//! automatic retry with exponential backoff for transient failures
//! (timeouts, connection resets, server errors, rate limiting). Permanent
//! client errors (4xx other than 429) are never retried — for the soil
//! primary path that is exactly the signal the orchestrator needs to
//! switch to the fallback.

use std::time::Duration;

use crate::SourceError;

/// Maximum retry attempts for transient transport errors. With
/// exponential backoff (2s, 4s, 8s, 16s, 32s) the total wait before
/// giving up is 62 seconds.
const MAX_RETRIES: u32 = 5;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends a request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    let url = response.url().to_string();
    let status = response.status();

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|json_err| {
        let preview = if text.len() > BODY_PREVIEW_LEN {
            format!("{}...", &text[..BODY_PREVIEW_LEN])
        } else {
            text.clone()
        };
        log::error!(
            "JSON parse failed.\n  url: {url}\n  status: {status}\n  \
             received: {} bytes\n  parse error: {json_err}\n  body preview: {preview}",
            text.len(),
        );
        SourceError::Payload {
            message: format!(
                "JSON parse failed: {json_err} (status={status}, received {} bytes)",
                text.len()
            ),
        }
    })
}

/// Sends a request and returns the raw response bytes.
///
/// Used for binary coverage payloads (`GeoTIFF`).
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// body cannot be read.
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F) -> Result<Vec<u8>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES).await?;
    Ok(response.bytes().await?.to_vec())
}

/// Core retry loop shared by [`send_json`] and [`send_bytes`].
///
/// Retries transient errors up to `max_retries` times with exponential
/// backoff and returns the successful response (status 2xx/3xx).
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<SourceError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt); // 2s, 4s, 8s...
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(SourceError::Http(e));
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                // 429 and 5xx are worth another attempt; other 4xx are
                // permanent.
                if is_retryable_status(status.as_u16()) {
                    if attempt < max_retries {
                        log::warn!("  HTTP {status}");
                        last_error = Some(SourceError::Service {
                            message: format!("HTTP {status}"),
                        });
                        continue;
                    }
                    return Err(SourceError::Service {
                        message: format!("HTTP {status} after {max_retries} retries"),
                    });
                }

                if status.is_client_error() {
                    return Err(SourceError::Service {
                        message: format!("HTTP {status}"),
                    });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| SourceError::Service {
        message: "request failed after all retries".to_string(),
    }))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

/// Classifies an HTTP status for retry purposes. Split out of
/// [`send_inner`] so the policy itself is testable without a server.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable() {
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
    }

    #[test]
    fn rate_limiting_is_retryable() {
        assert!(is_retryable_status(429));
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(413));
    }

    #[test]
    fn success_is_not_retried() {
        assert!(!is_retryable_status(200));
    }
}
