//! Semantic Scholar provider implementation (Graph API).

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const S2_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
const S2_FIELDS: &str = "title,abstract,year,authors,externalIds,openAccessPdf,venue,citationCount,url";

/// Semantic Scholar research source.
///
/// An API key (`SEMANTICSCHOLAR_API_KEY`) raises the rate limits but is
/// not required.
#[derive(Debug)]
pub struct SemanticScholarProvider {
    client: HttpClient,
    executor: RetryExecutor,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::SemanticScholar);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::SemanticScholar, provider_config),
            api_key: config.semanticscholar_api_key.clone(),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    fn parse_paper(paper: &S2Paper) -> Option<SearchRecord> {
        let title = paper.title.as_deref()?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = paper
            .authors
            .iter()
            .filter_map(|a| a.name.clone())
            .collect();

        let doi = paper
            .external_ids
            .as_ref()
            .and_then(|ids| ids.doi.clone())
            .unwrap_or_default();

        let citation_count = paper.citation_count.and_then(|c| u32::try_from(c).ok());

        Some(
            RecordBuilder::new(title, ProviderTag::SemanticScholar)
                .authors(authors)
                .year(paper.year)
                .abstract_text(paper.r#abstract.clone().unwrap_or_default())
                .url(paper.url.clone().unwrap_or_default())
                .doi(doi)
                .pdf_url(
                    paper
                        .open_access_pdf
                        .as_ref()
                        .and_then(|p| p.url.clone())
                        .unwrap_or_default(),
                )
                .venue(paper.venue.clone().unwrap_or_default())
                .citation_count(citation_count)
                .build(),
        )
    }
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::SemanticScholar
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
            "{}/paper/search?query={}&limit={}&fields={}",
            S2_API_BASE,
            urlencoding::encode(query),
            limit.clamp(1, 100),
            S2_FIELDS
        );

        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let response: S2SearchResponse = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                let api_key = api_key.clone();
                async move {
                    let mut request = client.get(&url);
                    if let Some(key) = &api_key {
                        request = request.header("x-api-key", key);
                    }
                    let response = request.send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "Semantic Scholar").await?;
                    response
                        .json::<S2SearchResponse>()
                        .await
                        .map_err(|e| ProviderError::Parse(format!("JSON: {}", e)))
                }
            })
            .await?;

        let mut records = Vec::new();
        for paper in &response.data {
            match Self::parse_paper(paper) {
                Some(record) => records.push(record),
                None => tracing::debug!("skipping Semantic Scholar entry without title"),
            }
        }
        Ok(records)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<SearchRecord>> {
        let url = format!(
            "{}/paper/DOI:{}?fields={}",
            S2_API_BASE,
            urlencoding::encode(doi),
            S2_FIELDS
        );

        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let paper: Option<S2Paper> = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                let api_key = api_key.clone();
                async move {
                    let mut request = client.get(&url);
                    if let Some(key) = &api_key {
                        request = request.header("x-api-key", key);
                    }
                    let response = request.send().await.map_err(ProviderError::from)?;
                    match check_status(response, "Semantic Scholar").await {
                        Ok(response) => response
                            .json::<S2Paper>()
                            .await
                            .map(Some)
                            .map_err(|e| ProviderError::Parse(format!("JSON: {}", e))),
                        Err(ProviderError::NotFound(_)) => Ok(None),
                        Err(err) => Err(err),
                    }
                }
            })
            .await?;

        Ok(paper.as_ref().and_then(Self::parse_paper))
    }
}

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    title: Option<String>,
    r#abstract: Option<String>,
    year: Option<i32>,
    url: Option<String>,
    venue: Option<String>,
    #[serde(rename = "citationCount")]
    citation_count: Option<i64>,
    #[serde(rename = "openAccessPdf")]
    open_access_pdf: Option<S2OpenAccessPdf>,
    #[serde(rename = "externalIds")]
    external_ids: Option<S2ExternalIds>,
    #[serde(default)]
    authors: Vec<S2Author>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}
