//! Bibliographic provider adapters with a trait-based common contract.
//!
//! Every adapter implements [`Provider`]: a required `search`, optional
//! DOI and title lookups, and health reporting. All network calls go
//! through the provider's [`RetryExecutor`], so rate gating, backoff,
//! 429/Retry-After pacing and the consecutive-failure circuit behave
//! identically across providers.
//!
//! Parsers are pure functions over the raw response body. A malformed
//! single entry never aborts a whole search: the entry is skipped and
//! logged at debug.
//!
//! Which providers are active at runtime is controlled by
//! `LITERATURE_SOURCES` (see [`crate::config`]); adapters for disabled
//! providers are simply never constructed.

mod arxiv;
mod biorxiv;
mod crossref;
mod dblp;
mod europe_pmc;
mod openalex;
mod pubmed;
mod registry;
mod semantic;
mod unpaywall;

pub use arxiv::ArxivProvider;
pub use biorxiv::BiorxivProvider;
pub use crossref::CrossRefProvider;
pub use dblp::DblpProvider;
pub use europe_pmc::EuropePmcProvider;
pub use openalex::OpenAlexProvider;
pub use pubmed::PubMedProvider;
pub use registry::{ProviderCapabilities, ProviderRegistry};
pub use semantic::SemanticScholarProvider;
pub use unpaywall::UnpaywallProvider;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ProviderTag, SearchRecord};
use crate::utils::health::HealthStatus;
use crate::utils::retry::{parse_retry_after, RetryExecutor};
use crate::utils::text;

/// The common contract every provider adapter implements.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Tag identifying this provider
    fn tag(&self) -> ProviderTag;

    /// Human-readable provider name
    fn name(&self) -> &str {
        self.tag().name()
    }

    /// What this provider can do beyond search
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH
    }

    /// The retry executor owning this provider's rate gate and health
    fn executor(&self) -> &RetryExecutor;

    /// Search for records matching the query
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchRecord>>;

    /// Look up a single record by DOI.
    ///
    /// Returns `Ok(None)` when the provider answers with a well-formed
    /// not-found; that is a healthy response, not an error.
    async fn lookup_doi(&self, _doi: &str) -> Result<Option<SearchRecord>> {
        Ok(None)
    }

    /// Look up a record by title.
    ///
    /// The default implementation searches and accepts the best hit at
    /// Jaccard token similarity >= 0.7, returning `None` below that.
    async fn lookup_title(&self, title: &str, limit: usize) -> Result<Option<SearchRecord>> {
        let records = self.search(title, limit).await?;
        Ok(text::best_title_match(records, title))
    }

    /// Health snapshot for this provider
    async fn health(&self) -> HealthStatus {
        self.executor().health_status().await
    }

    /// Whether this provider is currently considered healthy.
    ///
    /// Degraded providers stay callable; orchestrators may down-rank
    /// them based on this.
    async fn health_check(&self) -> bool {
        if !self.executor().config().health_check_enabled {
            return true;
        }
        self.executor().is_healthy()
    }

    fn supports_doi_lookup(&self) -> bool {
        self.capabilities().contains(ProviderCapabilities::DOI_LOOKUP)
    }

    fn supports_title_lookup(&self) -> bool {
        self.capabilities().contains(ProviderCapabilities::TITLE_LOOKUP)
    }
}

/// Classified error for a single provider exchange.
///
/// The retry executor decides from this classification whether to
/// retry, honor a Retry-After, or abort.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out
    #[error("request timed out")]
    Timeout,

    /// Response body could not be parsed (XML, JSON, Atom)
    #[error("parse error: {0}")]
    Parse(String),

    /// Well-formed not-found answer
    #[error("not found: {0}")]
    NotFound(String),

    /// The request itself was malformed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP 429, with the server's Retry-After when parseable
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Caller-initiated cancellation
    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether the retry executor should keep trying after this error
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_)
            | ProviderError::Timeout
            | ProviderError::RateLimited { .. } => true,
            ProviderError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Observed HTTP status, where one exists
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::RateLimited { .. } => Some(429),
            ProviderError::NotFound(_) => Some(404),
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if let Some(status) = err.status() {
            ProviderError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::DeError> for ProviderError {
    fn from(err: quick_xml::DeError) -> Self {
        ProviderError::Parse(format!("XML: {}", err))
    }
}

/// Classify a non-success response into a [`ProviderError`].
///
/// 404 becomes `NotFound` so lookup methods can convert it to
/// `Ok(None)`; 429 captures Retry-After for the executor.
pub(crate) async fn check_status(
    response: reqwest::Response,
    provider: &str,
) -> std::result::Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ProviderError::NotFound(format!(
            "{} returned 404",
            provider
        )));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(ProviderError::RateLimited { retry_after });
    }

    let code = status.as_u16();
    let message = response.text().await.unwrap_or_default();
    let message = if message.chars().count() > 200 {
        let truncated: String = message.chars().take(200).collect();
        format!("{}...", truncated)
    } else {
        message
    };
    Err(ProviderError::Status {
        status: code,
        message: format!("{} API: {}", provider, message),
    })
}
