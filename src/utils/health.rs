//! Consecutive-failure health tracking for provider adapters.

use std::sync::atomic::{AtomicU32, Ordering};

use tokio::time::Instant;

use crate::models::ProviderTag;

/// Consecutive failures at which a provider counts as degraded
pub const DEGRADED_THRESHOLD: u32 = 3;

/// Tracks consecutive failures for one provider.
///
/// Failures are recorded only after a whole `execute` run fails (not
/// per retry attempt); any success resets the counter. A degraded
/// provider is not disabled, callers may still route to it.
#[derive(Debug, Default)]
pub struct HealthTracker {
    consecutive_failures: AtomicU32,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful operation, resetting the failure streak.
    ///
    /// A 404 that came back as a well-formed not-found response counts
    /// as a success: the API is responding.
    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
    }

    /// Record a terminally failed operation.
    pub fn record_failure(&self) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures() < DEGRADED_THRESHOLD
    }
}

/// Point-in-time health snapshot for one provider
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub provider: ProviderTag,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub last_request_time: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_by_default() {
        let tracker = HealthTracker::new();
        assert!(tracker.is_healthy());
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[test]
    fn test_three_failures_degrade() {
        let tracker = HealthTracker::new();
        tracker.record_failure();
        tracker.record_failure();
        assert!(tracker.is_healthy());

        tracker.record_failure();
        assert!(!tracker.is_healthy());
        assert_eq!(tracker.consecutive_failures(), 3);
    }

    #[test]
    fn test_success_resets_streak() {
        let tracker = HealthTracker::new();
        for _ in 0..5 {
            tracker.record_failure();
        }
        assert!(!tracker.is_healthy());

        tracker.record_success();
        assert!(tracker.is_healthy());
        assert_eq!(tracker.consecutive_failures(), 0);
    }
}
