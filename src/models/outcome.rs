//! Download outcome types for the PDF acquisition pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Terminal classification of a failed download attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Server returned an HTML page instead of a PDF
    HtmlResponse,
    /// HTML landing page contained no usable PDF link
    HtmlNoPdfLink,
    /// Body was neither a PDF nor declared HTML
    ContentMismatch,
    /// HTTP 403
    AccessDenied,
    /// HTTP 404
    NotFound,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError,
    Timeout,
    NetworkError,
    RedirectLoop,
    /// File landed on disk with zero bytes
    EmptyFile,
    /// File landed on disk but fails magic-byte validation
    InvalidResponse,
    /// Could not create, write, or delete the target file
    FileError,
    Unknown,
}

impl FailureKind {
    /// Stable identifier used in logs and failure reports
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::HtmlResponse => "html_response",
            FailureKind::HtmlNoPdfLink => "html_no_pdf_link",
            FailureKind::ContentMismatch => "content_mismatch",
            FailureKind::AccessDenied => "access_denied",
            FailureKind::NotFound => "not_found",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::ServerError => "server_error",
            FailureKind::Timeout => "timeout",
            FailureKind::NetworkError => "network_error",
            FailureKind::RedirectLoop => "redirect_loop",
            FailureKind::EmptyFile => "empty_file",
            FailureKind::InvalidResponse => "invalid_response",
            FailureKind::FileError => "file_error",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Classify an HTTP status code from a download response
    pub fn from_status(status: u16) -> FailureKind {
        match status {
            403 => FailureKind::AccessDenied,
            404 => FailureKind::NotFound,
            429 => FailureKind::RateLimited,
            s if s >= 500 => FailureKind::ServerError,
            _ => FailureKind::Unknown,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one download attempt (or a whole acquisition run)
#[derive(Debug, Clone)]
pub enum DownloadOutcome {
    /// PDF written to disk and validated
    Success { path: PathBuf, bytes: u64 },
    /// Attempt failed; `kind` is the terminal classification
    Failure {
        kind: FailureKind,
        last_error: String,
        attempted_urls: Vec<String>,
    },
}

impl DownloadOutcome {
    pub fn failure(kind: FailureKind, last_error: impl Into<String>) -> Self {
        DownloadOutcome::Failure {
            kind,
            last_error: last_error.into(),
            attempted_urls: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success { .. })
    }

    /// The failure kind, if this outcome is a failure
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            DownloadOutcome::Failure { kind, .. } => Some(*kind),
            DownloadOutcome::Success { .. } => None,
        }
    }
}

/// Structured error for an acquisition that exhausted every strategy.
///
/// Carries enough context for a human to diagnose the run: every URL
/// that was tried (annotated with the strategy that produced it), the
/// terminal failure reason, and the attempt count.
#[derive(Debug, Clone, thiserror::Error)]
#[error("pdf acquisition failed ({kind}) after {total_attempts} attempts: {failure_reason}")]
pub struct DownloadFailure {
    /// Terminal classification of the last attempt
    pub kind: FailureKind,
    /// Human-readable reason from the last attempt
    pub failure_reason: String,
    /// Every URL tried, in order, with strategy annotations
    pub attempted_urls: Vec<String>,
    /// Where the PDF would have been written
    pub output_path: PathBuf,
    /// Total URL attempts across all strategies
    pub total_attempts: usize,
}

/// Aggregate result of a batch acquisition run
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Paths of successfully acquired PDFs
    pub succeeded: Vec<PathBuf>,
    /// Failures, one per record that could not be acquired
    pub failed: Vec<DownloadFailure>,
    /// Total bytes written
    pub total_bytes: u64,
}

impl DownloadReport {
    /// Fraction of records acquired, in [0, 1]
    pub fn success_rate(&self) -> f64 {
        let total = self.succeeded.len() + self.failed.len();
        if total == 0 {
            0.0
        } else {
            self.succeeded.len() as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_from_status() {
        assert_eq!(FailureKind::from_status(403), FailureKind::AccessDenied);
        assert_eq!(FailureKind::from_status(404), FailureKind::NotFound);
        assert_eq!(FailureKind::from_status(429), FailureKind::RateLimited);
        assert_eq!(FailureKind::from_status(500), FailureKind::ServerError);
        assert_eq!(FailureKind::from_status(503), FailureKind::ServerError);
        assert_eq!(FailureKind::from_status(418), FailureKind::Unknown);
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = DownloadOutcome::Success {
            path: PathBuf::from("/tmp/x.pdf"),
            bytes: 10,
        };
        assert!(ok.is_success());
        assert_eq!(ok.failure_kind(), None);

        let failed = DownloadOutcome::failure(FailureKind::NotFound, "404");
        assert!(!failed.is_success());
        assert_eq!(failed.failure_kind(), Some(FailureKind::NotFound));
    }

    #[test]
    fn test_report_success_rate() {
        let mut report = DownloadReport::default();
        assert_eq!(report.success_rate(), 0.0);

        report.succeeded.push(PathBuf::from("a.pdf"));
        report.failed.push(DownloadFailure {
            kind: FailureKind::NotFound,
            failure_reason: "404 on primary".to_string(),
            attempted_urls: vec!["https://example.com/a.pdf".to_string()],
            output_path: PathBuf::from("b.pdf"),
            total_attempts: 3,
        });
        assert!((report.success_rate() - 0.5).abs() < f64::EPSILON);
    }
}
