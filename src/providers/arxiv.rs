//! arXiv provider implementation (Atom feed API).

use async_trait::async_trait;
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
const ARXIV_PDF_BASE: &str = "https://arxiv.org/pdf";

/// Trailing version suffix on arXiv IDs (v1, v2, ...)
static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)v\d+$").expect("valid regex"));

/// New-format (2301.12345) or old-format (math.GT/0104020) arXiv ID
static ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{4}\.\d{4,5}|[a-z-]+(?:\.[a-z]{2})?/\d{7})").expect("valid regex")
});

/// arXiv research source.
///
/// Search only; arXiv has no DOI endpoint, and title lookup uses the
/// default similarity matching over search results.
#[derive(Debug)]
pub struct ArxivProvider {
    client: HttpClient,
    executor: RetryExecutor,
    api_base: String,
}

impl ArxivProvider {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_api_base(config, ARXIV_API_URL)
    }

    /// Point the adapter at a different API base (for testing)
    pub fn with_api_base(config: &Config, api_base: impl Into<String>) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::Arxiv);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::Arxiv, provider_config),
            api_base: api_base.into(),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    /// Extract a bare arXiv ID (version stripped) from an ID string or
    /// an abs/pdf URL.
    ///
    /// Accepts `2301.12345`, `2301.12345v2`, `arxiv:2301.12345`,
    /// `https://arxiv.org/abs/2301.12345v1`, and the old
    /// `math.GT/0104020` format.
    pub fn parse_id(raw: &str) -> std::result::Result<String, ProviderError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ProviderError::InvalidRequest("empty arXiv ID".to_string()));
        }

        let candidate = if let Some(pos) = raw.find("/abs/") {
            &raw[pos + 5..]
        } else if let Some(pos) = raw.find("/pdf/") {
            &raw[pos + 5..]
        } else {
            raw.strip_prefix("arxiv:")
                .or_else(|| raw.strip_prefix("arXiv:"))
                .unwrap_or(raw)
        };
        let candidate = candidate.trim_end_matches(".pdf").trim_matches('/');

        let id = ID_RE
            .find(candidate)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!("unrecognized arXiv ID: {}", raw))
            })?;

        Ok(VERSION_RE.replace(&id, "").to_string())
    }

    /// Canonical PDF URL for an arXiv ID
    pub fn pdf_url(id: &str) -> String {
        format!("{}/{}.pdf", ARXIV_PDF_BASE, id)
    }

    /// Parse one Atom entry, or `None` if required fields are missing
    fn parse_entry(entry: &feed_rs::model::Entry) -> Option<SearchRecord> {
        let paper_id = Self::parse_id(&entry.id).ok()?;

        let title = entry.title.as_ref().map(|t| t.content.trim().to_string())?;
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = entry.authors.iter().map(|a| a.name.clone()).collect();

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        let year = entry.published.map(|d| d.year());

        // arXiv marks the DOI link with title="doi" when one exists
        let doi = entry
            .links
            .iter()
            .find(|l| {
                l.title.as_deref() == Some("doi") || l.href.contains("doi.org/")
            })
            .map(|l| l.href.as_str())
            .unwrap_or_default();

        let record = RecordBuilder::new(title, ProviderTag::Arxiv)
            .authors(authors)
            .year(year)
            .abstract_text(abstract_text)
            .url(format!("https://arxiv.org/abs/{}", paper_id))
            .doi(doi)
            .pdf_url(Self::pdf_url(&paper_id))
            .venue("arXiv")
            .build();

        Some(record)
    }
}

#[async_trait]
impl Provider for ArxivProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Arxiv
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH | ProviderCapabilities::TITLE_LOOKUP
    }

    fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let max_results = limit.clamp(1, 100);
        let url = format!(
            "{}?search_query={}&max_results={}&sortBy=relevance&sortOrder=descending",
            self.api_base,
            urlencoding::encode(&format!("all:{}", query)),
            max_results
        );

        let client = self.client.clone();
        let feed = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client
                        .get(&url)
                        .header("Accept", "application/atom+xml")
                        .send()
                        .await
                        .map_err(ProviderError::from)?;
                    let response = check_status(response, "arXiv").await?;
                    let bytes = response.bytes().await.map_err(ProviderError::from)?;
                    feed_rs::parser::parse(bytes.as_ref())
                        .map_err(|e| ProviderError::Parse(format!("Atom feed: {}", e)))
                }
            })
            .await?;

        let mut records = Vec::new();
        for entry in &feed.entries {
            match Self::parse_entry(entry) {
                Some(record) => records.push(record),
                None => tracing::debug!(entry_id = %entry.id, "skipping unparseable arXiv entry"),
            }
        }
        Ok(records)
    }
}
