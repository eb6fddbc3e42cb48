//! Utility modules supporting the fetch and acquisition layers:
//!
//! - [`HttpClient`]: shared reqwest wrapper plus the User-Agent and
//!   Referer pools used by the download recovery ladder
//! - [`RateGate`]: per-provider minimum-interval request gating
//! - [`RetryExecutor`]: backoff and Retry-After-aware retry wrapper
//! - [`HealthTracker`]: consecutive-failure circuit per provider
//! - [`text`]: DOI normalization and title similarity

pub mod health;
pub mod http;
pub mod rate;
pub mod retry;
pub mod text;

pub use health::{HealthStatus, HealthTracker, DEGRADED_THRESHOLD};
pub use http::{
    HttpClient, ACADEMIC_REFERERS, BROWSER_USER_AGENTS, GOOGLE_REFERER, LIBRARY_USER_AGENT,
    PDF_ACCEPT,
};
pub use rate::RateGate;
pub use retry::{backoff_delay, parse_retry_after, RetryExecutor};
