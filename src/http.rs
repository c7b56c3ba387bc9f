//! Shared JSON-over-HTTP call used by the embedding and generation adapters.
//!
//! Retry strategy (only when `max_retries > 0`):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! The final failure is a [`MapError::Service`] carrying the HTTP status
//! and reason.

use std::time::Duration;

use fieldmap_core::MapError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

/// Build a client with an optional request timeout.
pub fn build_client(
    operation: &'static str,
    timeout_secs: Option<u64>,
) -> Result<reqwest::Client, MapError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| MapError::service(operation, None, e.to_string()))
}

/// POST `body` as JSON to `url` and decode the JSON response as `R`.
pub async fn post_json<B, R>(
    client: &reqwest::Client,
    operation: &'static str,
    url: &str,
    body: &B,
    max_retries: u32,
) -> Result<R, MapError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client.post(url).json(body).send().await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json::<R>().await.map_err(|e| {
                        MapError::service(
                            operation,
                            Some(status.as_u16()),
                            format!("malformed response body: {}", e),
                        )
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let reason = match status.canonical_reason() {
                    Some(r) if body_text.is_empty() => r.to_string(),
                    Some(r) => format!("{}: {}", r, body_text),
                    None => body_text,
                };
                let err = MapError::service(operation, Some(status.as_u16()), reason);

                if status.as_u16() == 429 || status.is_server_error() {
                    warn!(operation, attempt, status = status.as_u16(), "transient service error");
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                warn!(operation, attempt, error = %e, "service request failed");
                last_err = Some(MapError::service(
                    operation,
                    None,
                    format!("request to {} failed: {}", url, e),
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| MapError::service(operation, None, "no attempt was made")))
}
