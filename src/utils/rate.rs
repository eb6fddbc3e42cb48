//! Per-provider minimum-interval request gating.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Enforces a minimum interval between requests to one provider.
///
/// `wait` serializes concurrent callers through an async mutex, so
/// release times are always separated by at least the configured
/// interval. The first request proceeds immediately.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// The configured minimum interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until at least `min_interval` has passed since the previous
    /// release, then record the release time.
    ///
    /// Cancellation aborts the in-flight sleep and surfaces
    /// [`Error::Cancelled`]; the release time is not updated in that case.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut last = self.last_request.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let delay = self.min_interval - elapsed;
                tracing::trace!(delay_ms = delay.as_millis() as u64, "rate gate waiting");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        *last = Some(Instant::now());
        Ok(())
    }

    /// Time of the last release, for health snapshots.
    pub async fn last_request_time(&self) -> Option<Instant> {
        *self.last_request.lock().await
    }
}
