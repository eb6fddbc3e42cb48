//! CrossRef provider implementation (REST works API).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const CROSSREF_API_BASE: &str = "https://api.crossref.org/works";

/// JATS markup in CrossRef abstracts
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

/// CrossRef research source
#[derive(Debug)]
pub struct CrossRefProvider {
    client: HttpClient,
    executor: RetryExecutor,
}

impl CrossRefProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::CrossRef);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::CrossRef, provider_config),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    fn parse_work(work: &CrossRefWork) -> Option<SearchRecord> {
        let title = work.title.first()?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = work
            .author
            .iter()
            .filter_map(|a| match (&a.given, &a.family) {
                (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
                (None, Some(family)) => Some(family.clone()),
                (Some(given), None) => Some(given.clone()),
                (None, None) => a.name.clone(),
            })
            .collect();

        let year = work
            .issued
            .as_ref()
            .and_then(|d| d.date_parts.first())
            .and_then(|parts| parts.first())
            .and_then(|y| y.as_ref().copied());

        let abstract_text = work
            .r#abstract
            .as_ref()
            .map(|a| TAG_RE.replace_all(a, "").trim().to_string())
            .unwrap_or_default();

        // First link explicitly typed application/pdf, when present
        let pdf_url = work
            .link
            .iter()
            .find(|l| l.content_type.as_deref() == Some("application/pdf"))
            .and_then(|l| l.url.clone())
            .unwrap_or_default();

        let citation_count = work
            .is_referenced_by_count
            .and_then(|c| u32::try_from(c).ok());

        Some(
            RecordBuilder::new(title, ProviderTag::CrossRef)
                .authors(authors)
                .year(year)
                .abstract_text(abstract_text)
                .url(work.url.clone().unwrap_or_default())
                .doi(work.doi.clone().unwrap_or_default())
                .pdf_url(pdf_url)
                .venue(work.container_title.first().cloned().unwrap_or_default())
                .citation_count(citation_count)
                .build(),
        )
    }
}

#[async_trait]
impl Provider for CrossRefProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::CrossRef
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH
            | ProviderCapabilities::DOI_LOOKUP
            | ProviderCapabilities::TITLE_LOOKUP
    }

    fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let url = format!(
            "{}?query={}&rows={}",
            CROSSREF_API_BASE,
            urlencoding::encode(query),
            limit.clamp(1, 100)
        );

        let client = self.client.clone();
        let response: CrossRefSearchResponse = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "CrossRef").await?;
                    response
                        .json::<CrossRefSearchResponse>()
                        .await
                        .map_err(|e| ProviderError::Parse(format!("JSON: {}", e)))
                }
            })
            .await?;

        let mut records = Vec::new();
        for work in &response.message.items {
            match Self::parse_work(work) {
                Some(record) => records.push(record),
                None => tracing::debug!("skipping CrossRef work without title"),
            }
        }
        Ok(records)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<SearchRecord>> {
        let url = format!("{}/{}", CROSSREF_API_BASE, urlencoding::encode(doi));

        let client = self.client.clone();
        let work: Option<CrossRefWork> = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    match check_status(response, "CrossRef").await {
                        Ok(response) => response
                            .json::<CrossRefWorkResponse>()
                            .await
                            .map(|r| Some(r.message))
                            .map_err(|e| ProviderError::Parse(format!("JSON: {}", e))),
                        Err(ProviderError::NotFound(_)) => Ok(None),
                        Err(err) => Err(err),
                    }
                }
            })
            .await?;

        Ok(work.as_ref().and_then(Self::parse_work))
    }
}

#[derive(Debug, Deserialize)]
struct CrossRefSearchResponse {
    message: CrossRefMessage,
}

#[derive(Debug, Deserialize)]
struct CrossRefMessage {
    #[serde(default)]
    items: Vec<CrossRefWork>,
}

#[derive(Debug, Deserialize)]
struct CrossRefWorkResponse {
    message: CrossRefWork,
}

#[derive(Debug, Deserialize)]
struct CrossRefWork {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossRefAuthor>,
    issued: Option<CrossRefDate>,
    r#abstract: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    link: Vec<CrossRefLink>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "is-referenced-by-count")]
    is_referenced_by_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CrossRefAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrossRefDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

#[derive(Debug, Deserialize)]
struct CrossRefLink {
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "content-type")]
    content_type: Option<String>,
}
