//! HTTP layer: status mapping and retry.
//!
//! This is the only place that interprets status codes; control/mod.rs
//! builds requests and decodes bodies.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::warn;

use crate::config::ControlConfig;
use crate::error::{ConductError, ConductResult};

/// Upper bound on a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Exponential backoff from 250ms, capped at [`MAX_BACKOFF`] for any retry count.
fn base_backoff(retries: u32) -> Duration {
    250u64
        .checked_shl(retries)
        .filter(|ms| ms >> retries == 250)
        .map(Duration::from_millis)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// HTTP backend for control API requests.
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) config: ControlConfig,
}

impl HttpBackend {
    /// Send once and map the status. 3xx responses are failures.
    pub(crate) async fn send(&self, request: RequestBuilder) -> ConductResult<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let reason = status.canonical_reason().unwrap_or("unknown status");
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            reason.to_string()
        } else {
            format!("{}: {}", reason, body.chars().take(200).collect::<String>())
        };

        Err(ConductError::Http {
            status: status.as_u16(),
            message,
        })
    }

    /// GET with retries on transient failures.
    pub(crate) async fn get(&self, url: &str) -> ConductResult<Response> {
        use rand::Rng;

        let mut retries = 0;
        let max_retries = self.config.max_retries;

        loop {
            match self.send(self.client.get(url)).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let base_backoff = base_backoff(retries);
                    let jittered_ms =
                        rand::thread_rng().gen_range(0..=base_backoff.as_millis() as u64);
                    let backoff = Duration::from_millis(jittered_ms.max(10));

                    warn!(
                        url,
                        error = %e,
                        retry = retries,
                        max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_backoff_doubles_then_caps() {
        assert_eq!(base_backoff(1), Duration::from_millis(500));
        assert_eq!(base_backoff(2), Duration::from_millis(1000));
        assert_eq!(base_backoff(4), Duration::from_millis(4000));
        assert_eq!(base_backoff(5), MAX_BACKOFF);
    }

    #[test]
    fn test_base_backoff_large_retry_counts() {
        for retries in [56, 63, 64, 100, u32::MAX] {
            assert_eq!(base_backoff(retries), MAX_BACKOFF);
        }
    }
}
