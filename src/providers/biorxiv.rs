//! bioRxiv/medRxiv provider implementation.
//!
//! Both servers share one API shape behind different hosts, so a single
//! adapter serves the `biorxiv` tag and queries each server as needed.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::text::{title_similarity, TITLE_MATCH_THRESHOLD};
use crate::utils::{HttpClient, RetryExecutor};

const BIORXIV_API_BASE: &str = "https://api.biorxiv.org";

/// How far back keyword search scans, in days
const SEARCH_WINDOW_DAYS: i64 = 365;

/// Page size of the details endpoint
const PAGE_SIZE: usize = 100;

/// Pages scanned per server before giving up on a keyword search
const MAX_SEARCH_PAGES: usize = 5;

/// Preprint server behind the shared API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Server {
    BioRxiv,
    MedRxiv,
}

impl Server {
    const BOTH: [Server; 2] = [Server::BioRxiv, Server::MedRxiv];

    fn name(&self) -> &'static str {
        match self {
            Server::BioRxiv => "biorxiv",
            Server::MedRxiv => "medrxiv",
        }
    }

    fn content_host(&self) -> &'static str {
        match self {
            Server::BioRxiv => "www.biorxiv.org",
            Server::MedRxiv => "www.medrxiv.org",
        }
    }

    fn pdf_url(&self, doi: &str) -> String {
        format!("https://{}/content/{}.full.pdf", self.content_host(), doi)
    }
}

/// bioRxiv/medRxiv research source
#[derive(Debug)]
pub struct BiorxivProvider {
    client: HttpClient,
    executor: RetryExecutor,
    api_base: String,
}

impl BiorxivProvider {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_api_base(config, BIORXIV_API_BASE)
    }

    /// Point the adapter at a different API base (for testing)
    pub fn with_api_base(config: &Config, api_base: impl Into<String>) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::BioRxiv);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::BioRxiv, provider_config),
            api_base: api_base.into(),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    async fn fetch_details(&self, path: String) -> Result<Vec<BiorxivEntry>> {
        let url = format!("{}/details/{}", self.api_base, path);

        let client = self.client.clone();
        let response: Option<BiorxivResponse> = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    match check_status(response, "bioRxiv").await {
                        Ok(response) => response
                            .json::<BiorxivResponse>()
                            .await
                            .map(Some)
                            .map_err(|e| ProviderError::Parse(format!("JSON: {}", e))),
                        Err(ProviderError::NotFound(_)) => Ok(None),
                        Err(err) => Err(err),
                    }
                }
            })
            .await?;

        Ok(response.map(|r| r.collection).unwrap_or_default())
    }

    /// Latest-version record for a DOI on one server, if posted there
    async fn lookup_on_server(&self, server: Server, doi: &str) -> Result<Option<SearchRecord>> {
        let entries = self
            .fetch_details(format!("{}/{}", server.name(), doi))
            .await?;

        // One entry per posted version; keep the newest
        let latest = entries
            .into_iter()
            .max_by_key(|e| e.version.as_deref().and_then(|v| v.parse::<u32>().ok()));

        Ok(latest.and_then(|entry| Self::parse_entry(&entry, server)))
    }

    fn parse_entry(entry: &BiorxivEntry, server: Server) -> Option<SearchRecord> {
        let title = entry.title.as_deref()?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let doi = entry.doi.as_deref().unwrap_or_default();
        if doi.is_empty() {
            return None;
        }

        let authors: Vec<String> = entry
            .authors
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let year = entry
            .date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok());

        let version_suffix = entry
            .version
            .as_deref()
            .map(|v| format!("v{}", v))
            .unwrap_or_default();

        Some(
            RecordBuilder::new(title, ProviderTag::BioRxiv)
                .authors(authors)
                .year(year)
                .abstract_text(entry.r#abstract.clone().unwrap_or_default())
                .url(format!(
                    "https://{}/content/{}{}",
                    server.content_host(),
                    doi,
                    version_suffix
                ))
                .doi(doi)
                .pdf_url(server.pdf_url(doi))
                .venue(server.name())
                .build(),
        )
    }
}

#[async_trait]
impl Provider for BiorxivProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::BioRxiv
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH
            | ProviderCapabilities::DOI_LOOKUP
            | ProviderCapabilities::TITLE_LOOKUP
    }

    fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Keyword search over recently posted preprints.
    ///
    /// The details API has no query endpoint, so this enumerates the
    /// most recent 365-day window newest-first and keeps entries whose
    /// title or abstract contains the query as a substring
    /// (case-insensitive). Scanning stops after `limit` matches or
    /// [`MAX_SEARCH_PAGES`] pages per server.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let needle = query.to_lowercase();
        let today = Utc::now().date_naive();
        let start = today - ChronoDuration::days(SEARCH_WINDOW_DAYS);
        let interval = format!("{}/{}", start.format("%Y-%m-%d"), today.format("%Y-%m-%d"));

        let mut records = Vec::new();
        'servers: for server in Server::BOTH {
            for page in 0..MAX_SEARCH_PAGES {
                let cursor = page * PAGE_SIZE;
                let entries = self
                    .fetch_details(format!("{}/{}/{}", server.name(), interval, cursor))
                    .await?;
                let exhausted = entries.len() < PAGE_SIZE;

                for entry in &entries {
                    let matches = [entry.title.as_deref(), entry.r#abstract.as_deref()]
                        .iter()
                        .flatten()
                        .any(|text| text.to_lowercase().contains(&needle));
                    if !matches {
                        continue;
                    }
                    if let Some(record) = Self::parse_entry(entry, server) {
                        records.push(record);
                        if records.len() >= limit {
                            break 'servers;
                        }
                    }
                }

                if exhausted {
                    break;
                }
            }
        }

        Ok(records)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<SearchRecord>> {
        for server in Server::BOTH {
            if let Some(record) = self.lookup_on_server(server, doi).await? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn lookup_title(&self, title: &str, limit: usize) -> Result<Option<SearchRecord>> {
        let records = self.search(title, limit).await?;
        Ok(records
            .into_iter()
            .map(|r| (title_similarity(&r.title, title), r))
            .filter(|(score, _)| *score >= TITLE_MATCH_THRESHOLD)
            .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(_, r)| r))
    }
}

#[derive(Debug, Deserialize)]
struct BiorxivResponse {
    #[serde(default)]
    collection: Vec<BiorxivEntry>,
}

#[derive(Debug, Deserialize)]
struct BiorxivEntry {
    doi: Option<String>,
    title: Option<String>,
    authors: Option<String>,
    date: Option<String>,
    version: Option<String>,
    r#abstract: Option<String>,
}
