//! DBLP provider implementation (publication search API).

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const DBLP_API_BASE: &str = "https://dblp.org/search/publ/api";

/// DBLP research source (computer science bibliography)
#[derive(Debug)]
pub struct DblpProvider {
    client: HttpClient,
    executor: RetryExecutor,
}

/// A wire field that may be a single value or a list.
///
/// DBLP collapses one-element lists into bare objects, so both shapes
/// must parse.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl DblpProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::Dblp);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::Dblp, provider_config),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    fn parse_hit(hit: &DblpHit) -> Option<SearchRecord> {
        let info = hit.info.as_ref()?;
        let title = info.title.as_deref()?.trim().trim_end_matches('.').to_string();
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = info
            .authors
            .as_ref()
            .map(|a| {
                a.author
                    .iter()
                    .map(|entry| entry.text.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let year = info.year.as_deref().and_then(|y| y.trim().parse().ok());

        let ee_urls: Vec<String> = info
            .ee
            .as_ref()
            .map(|e| match e {
                OneOrMany::One(url) => vec![url.clone()],
                OneOrMany::Many(urls) => urls.clone(),
            })
            .unwrap_or_default();

        // Prefer an ee link that is itself a PDF; else the first ee URL
        let pdf_url = ee_urls
            .iter()
            .find(|u| u.to_lowercase().ends_with(".pdf"))
            .cloned()
            .unwrap_or_default();
        let landing = ee_urls.first().cloned().unwrap_or_default();

        Some(
            RecordBuilder::new(title, ProviderTag::Dblp)
                .authors(authors)
                .year(year)
                .url(info.url.clone().unwrap_or(landing))
                .doi(info.doi.clone().unwrap_or_default())
                .pdf_url(pdf_url)
                .venue(info.venue.clone().unwrap_or_default())
                .build(),
        )
    }
}

#[async_trait]
impl Provider for DblpProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Dblp
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH | ProviderCapabilities::TITLE_LOOKUP
    }

    fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let url = format!(
            "{}?q={}&format=json&h={}",
            DBLP_API_BASE,
            urlencoding::encode(query),
            limit.clamp(1, 100)
        );

        let client = self.client.clone();
        let response: DblpResponse = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "DBLP").await?;
                    response
                        .json::<DblpResponse>()
                        .await
                        .map_err(|e| ProviderError::Parse(format!("JSON: {}", e)))
                }
            })
            .await?;

        let hits = response
            .result
            .hits
            .and_then(|h| h.hit)
            .map(OneOrMany::into_vec)
            .unwrap_or_default();

        let mut records = Vec::new();
        for hit in &hits {
            match Self::parse_hit(hit) {
                Some(record) => records.push(record),
                None => tracing::debug!("skipping DBLP hit without title"),
            }
        }
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct DblpResponse {
    result: DblpResult,
}

#[derive(Debug, Deserialize)]
struct DblpResult {
    hits: Option<DblpHits>,
}

#[derive(Debug, Deserialize)]
struct DblpHits {
    hit: Option<OneOrMany<DblpHit>>,
}

#[derive(Debug, Deserialize)]
struct DblpHit {
    info: Option<DblpInfo>,
}

#[derive(Debug, Deserialize)]
struct DblpInfo {
    title: Option<String>,
    authors: Option<DblpAuthors>,
    year: Option<String>,
    venue: Option<String>,
    ee: Option<OneOrMany<String>>,
    doi: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DblpAuthors {
    #[serde(deserialize_with = "deserialize_authors")]
    author: Vec<DblpAuthor>,
}

#[derive(Debug, Deserialize)]
struct DblpAuthor {
    text: String,
}

/// DBLP emits a single author object instead of a one-element list
fn deserialize_authors<'de, D>(deserializer: D) -> std::result::Result<Vec<DblpAuthor>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: OneOrMany<DblpAuthor> = Deserialize::deserialize(deserializer)?;
    Ok(value.into_vec())
}
