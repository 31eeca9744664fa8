//! Bounded-time polling for cluster convergence.
//!
//! The poller queries a [`StatusSource`] until a predicate holds or the
//! timeout elapses. A transport failure during one iteration counts as a
//! failed check: it is logged, remembered, and polling continues, so a
//! flaky connection ends in `WaitTimeout` rather than an abort. Any other
//! error aborts the wait immediately.
//!
//! The deadline is only checked between iterations; a request in flight is
//! never interrupted, so a wait can overrun the timeout by one request.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument, Span};

use crate::error::{ConductError, ConductResult};

/// Default wait timeout.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Remote status query for a target.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Current status of `target`, as an opaque JSON value
    /// (`Value::Null` when the target is unknown).
    async fn fetch_status(&self, target: &str) -> ConductResult<Value>;
}

/// Timing for one wait call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollOptions {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Number of started executions reported for a bundle.
pub fn started_executions(status: &Value) -> usize {
    status
        .get("bundleExecutions")
        .and_then(Value::as_array)
        .map(|executions| {
            executions
                .iter()
                .filter(|e| e.get("isStarted").and_then(Value::as_bool) == Some(true))
                .count()
        })
        .unwrap_or(0)
}

/// Whether the bundle reports at least one installation.
pub fn is_installed(status: &Value) -> bool {
    status
        .get("bundleInstallations")
        .and_then(Value::as_array)
        .map(|installations| !installations.is_empty())
        .unwrap_or(false)
}

/// Scale goal: at least `desired` started executions, or none at all when
/// `desired` is zero.
pub fn scale_reached(count: usize, desired: usize) -> bool {
    if desired == 0 {
        count == 0
    } else {
        count >= desired
    }
}

/// Polls a status source until a predicate holds.
pub struct StatusPoller<S> {
    source: S,
    span: Span,
}

impl<S: StatusSource> StatusPoller<S> {
    pub fn new(source: S, span: Span) -> Self {
        Self { source, span }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Wait until `predicate` holds for the status of `target`.
    ///
    /// Returns the elapsed time on success, `WaitTimeout` once the timeout
    /// is reached without the predicate holding.
    pub async fn await_state<P>(
        &self,
        target: &str,
        predicate: P,
        options: PollOptions,
    ) -> ConductResult<Duration>
    where
        P: Fn(&Value) -> bool + Send + Sync,
    {
        self.poll(target, &predicate, options)
            .instrument(self.span.clone())
            .await
    }

    async fn poll(
        &self,
        target: &str,
        predicate: &(dyn Fn(&Value) -> bool + Send + Sync),
        options: PollOptions,
    ) -> ConductResult<Duration> {
        let start = Instant::now();
        let mut last_error: Option<String> = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.source.fetch_status(target).await {
                Ok(status) if predicate(&status) => {
                    let elapsed = start.elapsed();
                    debug!(target, attempt, elapsed_ms = elapsed.as_millis(), "state reached");
                    return Ok(elapsed);
                }
                Ok(_) => {
                    debug!(target, attempt, "state not reached yet");
                }
                Err(e) if e.is_transport() => {
                    warn!(target, attempt, error = %e, "status check failed");
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= options.timeout {
                return Err(ConductError::WaitTimeout {
                    target: target.to_string(),
                    elapsed,
                    last_error,
                });
            }

            tokio::time::sleep(options.interval).await;
        }
    }

    /// Wait until `bundle_id` reports an installation.
    pub async fn await_installation(
        &self,
        bundle_id: &str,
        options: PollOptions,
    ) -> ConductResult<Duration> {
        info!(parent: &self.span, bundle_id, "waiting for bundle to be installed");
        let elapsed = self.await_state(bundle_id, is_installed, options).await?;
        info!(parent: &self.span, bundle_id, "bundle installed");
        Ok(elapsed)
    }

    /// Wait until `bundle_id` reaches `desired` started executions
    /// (or none, when `desired` is zero).
    pub async fn await_scale(
        &self,
        bundle_id: &str,
        desired: usize,
        options: PollOptions,
    ) -> ConductResult<Duration> {
        info!(parent: &self.span, bundle_id, desired, "waiting for bundle to reach expected scale");
        let elapsed = self
            .await_state(
                bundle_id,
                |status| scale_reached(started_executions(status), desired),
                options,
            )
            .await?;
        info!(parent: &self.span, bundle_id, desired, "bundle expected scale is met");
        Ok(elapsed)
    }
}
