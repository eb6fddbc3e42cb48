//! Public error taxonomy.

use crate::models::{DownloadFailure, ProviderTag};

/// Errors surfaced by public litfetch operations.
///
/// Transient transport errors are recovered internally by the retry
/// executor and the downloader's recovery ladder; what reaches callers
/// is the terminal classification with enough context to diagnose it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 429 responses persisted after exhausting Retry-After-aware retries
    #[error("{provider} rate limited after {attempts} attempts")]
    RateLimited { provider: ProviderTag, attempts: u32 },

    /// Non-retryable provider response, or exhausted transient retries
    #[error("{provider} request failed after {attempts} attempt(s): {message}")]
    Provider {
        provider: ProviderTag,
        attempts: u32,
        status: Option<u16>,
        message: String,
    },

    /// PDF acquisition exhausted every candidate URL and fallback
    #[error(transparent)]
    Download(#[from] DownloadFailure),

    /// Directory creation, file write, or corrupt-artifact cleanup failed
    #[error("file operation failed: {0}")]
    File(#[from] std::io::Error),

    /// Invalid enumerated option or malformed configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Caller-initiated cancellation (distinct from timeout)
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Status code of the terminal response, where one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RateLimited { .. } => Some(429),
            Error::Provider { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether this error was caused by cancellation rather than failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
