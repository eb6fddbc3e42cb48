//! Retry execution with exponential backoff and rate-limit-aware pacing.
//!
//! Every provider exchange goes through a [`RetryExecutor`] bound to
//! that provider's configuration. The executor owns the provider's
//! [`RateGate`] and [`HealthTracker`], so release-time and failure-streak
//! invariants hold across concurrent callers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{ProviderConfig, RateLimitStrategy};
use crate::error::Error;
use crate::models::ProviderTag;
use crate::providers::ProviderError;
use crate::utils::health::{HealthStatus, HealthTracker, DEGRADED_THRESHOLD};
use crate::utils::rate::RateGate;

/// Ceiling on any single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Ceiling on honored Retry-After values (1 hour)
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Exponential backoff delay before retry attempt `attempt` (1-based),
/// capped at [`MAX_BACKOFF`].
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports both RFC 7231 forms: integer seconds and HTTP-date. Returns
/// `None` for unparseable or negative values; excessive values are
/// capped at one hour.
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            return None;
        }
        return Some(Duration::from_secs(seconds as u64).min(MAX_RETRY_AFTER));
    }

    if let Ok(date) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        return match date.duration_since(now) {
            Ok(delay) => Some(delay.min(MAX_RETRY_AFTER)),
            // Date in the past
            Err(_) => Some(Duration::ZERO),
        };
    }

    None
}

/// Wraps single provider exchanges with gating, retries and health
/// bookkeeping.
#[derive(Debug)]
pub struct RetryExecutor {
    tag: ProviderTag,
    config: ProviderConfig,
    gate: RateGate,
    health: HealthTracker,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(tag: ProviderTag, config: ProviderConfig) -> Self {
        let gate = RateGate::new(config.min_interval);
        Self {
            tag,
            config,
            gate,
            health: HealthTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a caller-provided cancellation token instead of a private one.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn tag(&self) -> ProviderTag {
        self.tag
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Snapshot of this provider's health.
    pub async fn health_status(&self) -> HealthStatus {
        HealthStatus {
            provider: self.tag,
            healthy: self.health.is_healthy(),
            consecutive_failures: self.health.consecutive_failures(),
            last_request_time: self.gate.last_request_time().await,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }

    /// Run `op` with rate gating, Retry-After-aware retries and
    /// exponential backoff.
    ///
    /// The first attempt passes through the rate gate; retries sleep
    /// `retry_delay * 2^(k-1)` instead, except that a 429 carrying a
    /// parseable Retry-After sleeps exactly that long and skips the
    /// generic backoff. 5xx, timeouts and connection errors are
    /// transient; any other 4xx aborts immediately. The failure streak
    /// is incremented once per failed `execute`, never per attempt.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error: Option<ProviderError> = None;
        let mut skip_backoff = false;

        for attempt in 0..max_attempts {
            if attempt == 0 {
                self.gate.wait(&self.cancel).await?;
            } else if skip_backoff {
                skip_backoff = false;
            } else {
                self.sleep(backoff_delay(self.config.retry_delay, attempt)).await?;
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                result = op() => result,
            };

            match result {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(
                            provider = %self.tag,
                            attempt = attempt + 1,
                            "request succeeded after retries"
                        );
                    }
                    self.health.record_success();
                    return Ok(value);
                }
                Err(ProviderError::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    if let ProviderError::RateLimited { retry_after } = &err {
                        if self.config.rate_limit_strategy == RateLimitStrategy::RetryAfter {
                            if let Some(delay) = retry_after {
                                tracing::debug!(
                                    provider = %self.tag,
                                    delay_secs = delay.as_secs(),
                                    "honoring Retry-After"
                                );
                                self.sleep((*delay).min(MAX_RETRY_AFTER)).await?;
                                skip_backoff = true;
                            }
                        }
                        last_error = Some(err);
                        continue;
                    }

                    if err.is_transient() {
                        tracing::debug!(
                            provider = %self.tag,
                            attempt = attempt + 1,
                            error = %err,
                            "transient provider error, retrying"
                        );
                        last_error = Some(err);
                        continue;
                    }

                    // Permanent error: the final attempt of this execute
                    self.note_failure();
                    return Err(self.surface(err, attempt + 1));
                }
            }
        }

        self.note_failure();
        let err = last_error
            .unwrap_or_else(|| ProviderError::Network("no attempts executed".to_string()));
        Err(self.surface(err, max_attempts))
    }

    fn note_failure(&self) {
        let failures = self.health.record_failure();
        if failures == DEGRADED_THRESHOLD {
            tracing::warn!(
                provider = %self.tag,
                consecutive_failures = failures,
                "provider degraded"
            );
        }
    }

    fn surface(&self, err: ProviderError, attempts: u32) -> Error {
        match err {
            ProviderError::RateLimited { .. } => Error::RateLimited {
                provider: self.tag,
                attempts,
            },
            other => Error::Provider {
                provider: self.tag,
                attempts,
                status: other.status(),
                message: other.to_string(),
            },
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), Error> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
