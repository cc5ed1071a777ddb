use anyhow::Context;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Request, RequestBuilder, Response};
use std::time::Duration;

use crate::config::TransportSettings;
use crate::error::{AuthError, Result};

/// Upper bound on a single backoff sleep (milliseconds)
const MAX_BACKOFF_MS: u64 = 60_000;

/// Scoped HTTP session that retries transient failures.
///
/// Each auth operation builds one, issues a single logical request through
/// it and drops it, which releases the underlying connection pool.
pub struct RetryingHttpClient {
    /// Session-scoped client carrying the total request timeout
    client: Client,

    /// Maximum number of retries
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl RetryingHttpClient {
    /// Create a session with a total per-attempt timeout
    pub fn new(settings: &TransportSettings, timeout: Duration) -> Result<Self> {
        Self::with_default_headers(settings, timeout, HeaderMap::new())
    }

    /// Create a session whose every request carries `headers`
    pub fn with_default_headers(
        settings: &TransportSettings,
        timeout: Duration,
        headers: HeaderMap,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries: settings.max_retries,
            base_delay_ms: settings.base_delay_ms,
        })
    }

    /// Start building a request on this session
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Execute a request with retry logic
    /// Automatically handles:
    /// - 429: exponential backoff
    /// - 5xx: exponential backoff
    /// - connect/timeout errors: exponential backoff
    ///
    /// Any other non-2xx status fails immediately with `AuthError::Http`.
    pub async fn request_with_retry(&self, request: Request) -> Result<Response> {
        let mut attempt = 0;

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(
            method = %method,
            url = %url,
            "Sending HTTP request"
        );

        loop {
            let req = request.try_clone().ok_or_else(|| {
                AuthError::Internal(anyhow::anyhow!("Request body is not cloneable"))
            })?;

            tracing::debug!(
                attempt = attempt + 1,
                max_retries = self.max_retries,
                "Executing request attempt"
            );

            match self.client.execute(req).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        tracing::debug!(status = %status, "Request successful");
                        return Ok(response);
                    }

                    if is_transient_status(status.as_u16()) && attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Received {}, retrying after {}ms (attempt {}/{})",
                            status,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );

                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    // Non-retryable error or max retries exceeded
                    let body = response.text().await.unwrap_or_default();

                    tracing::debug!(
                        status = status.as_u16(),
                        url = %url,
                        response_body = %body,
                        attempt = attempt + 1,
                        "HTTP request failed with error response"
                    );
                    return Err(AuthError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }

                Err(e) => {
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else if e.is_body() {
                        "body_error"
                    } else {
                        "unknown"
                    };

                    if attempt < self.max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            error_kind = error_kind,
                            url = %url,
                            "Request failed: {}, retrying after {}ms (attempt {}/{})",
                            e,
                            delay,
                            attempt + 1,
                            self.max_retries
                        );

                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        total_attempts = attempt + 1,
                        "HTTP request failed after all retries"
                    );

                    return Err(AuthError::Transport(e));
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        // Exponential backoff: base_delay * 2^attempt, plus up to 10% jitter,
        // never above MAX_BACKOFF_MS
        let delay = 2_u64
            .checked_pow(attempt)
            .and_then(|factor| self.base_delay_ms.checked_mul(factor))
            .map_or(MAX_BACKOFF_MS, |d| d.min(MAX_BACKOFF_MS));
        let jitter = (delay as f64 * 0.1 * rand::random::<f64>()) as u64;
        delay.saturating_add(jitter).min(MAX_BACKOFF_MS)
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500..=599)
}
