//! HTTP transport shared by the LLM providers.
//!
//! Sends a JSON request, retrying rate limits, server errors, timeouts and connection
//! failures with exponential backoff. Everything else fails on the first attempt.

use reqwest::{RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AskError, Result};

/// Maximum number of attempts for one completion.
pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
pub(crate) const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Maps a non-success response to an error and whether it is worth retrying.
pub(crate) type ErrorParser = fn(StatusCode, &str) -> (AskError, bool);

/// Sends the request built by `build` until it succeeds or retries are exhausted.
///
/// Returns the body of the first successful response.
pub(crate) async fn send_with_retry<F>(
    provider: &str,
    build: F,
    parse_error: ErrorParser,
) -> Result<String>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_error = None;
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        debug!(provider, attempt, max_attempts = MAX_RETRY_ATTEMPTS, "LLM request");

        let is_retryable = match build().send().await {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .map_err(|e| AskError::llm(format!("Failed to read response: {e}")))?;

                if status.is_success() {
                    return Ok(body);
                }

                let (error, is_retryable) = parse_error(status, &body);
                warn!(provider, attempt, %status, "LLM request failed");
                last_error = Some(error);
                is_retryable
            }
            Err(e) => {
                let is_retryable = e.is_timeout() || e.is_connect();
                let error = if e.is_timeout() {
                    AskError::llm("Request timed out. Try again.")
                } else if e.is_connect() {
                    AskError::llm(format!("Failed to connect to {provider}. Check your network."))
                } else {
                    AskError::llm(format!("Request failed: {e}"))
                };
                warn!(provider, attempt, "LLM request failed: {error}");
                last_error = Some(error);
                is_retryable
            }
        };

        if !is_retryable || attempt >= MAX_RETRY_ATTEMPTS {
            break;
        }

        debug!(provider, ?delay, "Retrying LLM request");
        tokio::time::sleep(delay).await;
        delay *= 2;
    }

    Err(last_error.unwrap_or_else(|| AskError::internal("LLM request was never attempted")))
}

/// Common status handling: 401/403 are fatal, 429 and 5xx are retryable.
pub(crate) fn classify_status(provider: &str, status: StatusCode) -> Option<(AskError, bool)> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Some((
            AskError::llm(format!("Authentication failed. Check your {provider} API key.")),
            false,
        ));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some((
            AskError::llm("Rate limited. Please wait and try again."),
            true,
        ));
    }

    None
}
