//! OpenAlex provider implementation (works API).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const OPENALEX_API_BASE: &str = "https://api.openalex.org/works";

/// OpenAlex research source
#[derive(Debug)]
pub struct OpenAlexProvider {
    client: HttpClient,
    executor: RetryExecutor,
}

impl OpenAlexProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::OpenAlex);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::OpenAlex, provider_config),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    /// Rebuild abstract text from OpenAlex's inverted index
    /// (word -> positions).
    fn reconstruct_abstract(index: &HashMap<String, Vec<usize>>) -> String {
        let mut positions: Vec<(usize, &str)> = Vec::new();
        for (word, offsets) in index {
            for &offset in offsets {
                positions.push((offset, word.as_str()));
            }
        }
        positions.sort_unstable_by_key(|(offset, _)| *offset);
        positions
            .into_iter()
            .map(|(_, word)| word)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn parse_work(work: &OpenAlexWork) -> Option<SearchRecord> {
        let title = work.display_name.as_deref()?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = work
            .authorships
            .iter()
            .filter_map(|a| a.author.display_name.clone())
            .collect();

        let abstract_text = work
            .abstract_inverted_index
            .as_ref()
            .map(Self::reconstruct_abstract)
            .unwrap_or_default();

        // Prefer the open-access URL over the primary location's pdf_url
        let pdf_url = work
            .open_access
            .as_ref()
            .and_then(|oa| oa.oa_url.clone())
            .or_else(|| {
                work.primary_location
                    .as_ref()
                    .and_then(|loc| loc.pdf_url.clone())
            })
            .unwrap_or_default();

        let venue = work
            .primary_location
            .as_ref()
            .and_then(|loc| loc.source.as_ref())
            .and_then(|s| s.display_name.clone())
            .unwrap_or_default();

        let url = work
            .primary_location
            .as_ref()
            .and_then(|loc| loc.landing_page_url.clone())
            .or_else(|| work.doi.clone())
            .unwrap_or_default();

        let citation_count = work.cited_by_count.and_then(|c| u32::try_from(c).ok());

        Some(
            RecordBuilder::new(title, ProviderTag::OpenAlex)
                .authors(authors)
                .year(work.publication_year)
                .abstract_text(abstract_text)
                .url(url)
                .doi(work.doi.clone().unwrap_or_default())
                .pdf_url(pdf_url)
                .venue(venue)
                .citation_count(citation_count)
                .build(),
        )
    }
}

#[async_trait]
impl Provider for OpenAlexProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::OpenAlex
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
            "{}?search={}&per-page={}",
            OPENALEX_API_BASE,
            urlencoding::encode(query),
            limit.clamp(1, 100)
        );

        let client = self.client.clone();
        let response: OpenAlexSearchResponse = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "OpenAlex").await?;
                    response
                        .json::<OpenAlexSearchResponse>()
                        .await
                        .map_err(|e| ProviderError::Parse(format!("JSON: {}", e)))
                }
            })
            .await?;

        let mut records = Vec::new();
        for work in &response.results {
            match Self::parse_work(work) {
                Some(record) => records.push(record),
                None => tracing::debug!("skipping OpenAlex work without title"),
            }
        }
        Ok(records)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<SearchRecord>> {
        let url = format!("{}/https://doi.org/{}", OPENALEX_API_BASE, doi);

        let client = self.client.clone();
        let work: Option<OpenAlexWork> = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    match check_status(response, "OpenAlex").await {
                        Ok(response) => response
                            .json::<OpenAlexWork>()
                            .await
                            .map(Some)
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
struct OpenAlexSearchResponse {
    #[serde(default)]
    results: Vec<OpenAlexWork>,
}

#[derive(Debug, Deserialize)]
struct OpenAlexWork {
    display_name: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    cited_by_count: Option<i64>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    open_access: Option<OpenAccess>,
    primary_location: Option<Location>,
    #[serde(default)]
    authorships: Vec<Authorship>,
}

#[derive(Debug, Deserialize)]
struct OpenAccess {
    oa_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    pdf_url: Option<String>,
    landing_page_url: Option<String>,
    source: Option<LocationSource>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: OpenAlexAuthor,
}

#[derive(Debug, Deserialize)]
struct OpenAlexAuthor {
    display_name: Option<String>,
}
