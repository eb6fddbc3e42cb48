//! Unpaywall provider implementation (open-access lookup by DOI).

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const UNPAYWALL_API_BASE: &str = "https://api.unpaywall.org/v2";

/// Unpaywall open-access lookup.
///
/// Keyed by DOI only; the API requires a contact email (free, no key).
/// Construction takes the already-validated email, the fallback
/// orchestrator owns the validate-or-disable decision.
#[derive(Debug)]
pub struct UnpaywallProvider {
    client: HttpClient,
    executor: RetryExecutor,
    email: String,
    api_base: String,
}

impl UnpaywallProvider {
    pub fn new(config: &Config, email: impl Into<String>) -> Result<Self> {
        Self::with_api_base(config, email, UNPAYWALL_API_BASE)
    }

    /// Point the adapter at a different API base (for testing)
    pub fn with_api_base(
        config: &Config,
        email: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::Unpaywall);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::Unpaywall, provider_config),
            email: email.into(),
            api_base: api_base.into(),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    async fn fetch(&self, doi: &str) -> Result<Option<UnpaywallResponse>> {
        let url = format!(
            "{}/{}?email={}",
            self.api_base,
            urlencoding::encode(doi),
            urlencoding::encode(&self.email)
        );

        let client = self.client.clone();
        self.executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    match check_status(response, "Unpaywall").await {
                        Ok(response) => response
                            .json::<UnpaywallResponse>()
                            .await
                            .map(Some)
                            .map_err(|e| ProviderError::Parse(format!("JSON: {}", e))),
                        Err(ProviderError::NotFound(_)) => Ok(None),
                        Err(err) => Err(err),
                    }
                }
            })
            .await
    }

    /// Best open-access PDF URL for a DOI, or `None` when the paper is
    /// closed or unknown.
    ///
    /// Prefers `best_oa_location.url_for_pdf`, then the first
    /// `oa_locations` entry that carries a PDF URL.
    pub async fn best_pdf_url(&self, doi: &str) -> Result<Option<String>> {
        let Some(response) = self.fetch(doi).await? else {
            return Ok(None);
        };
        if !response.is_oa.unwrap_or(false) {
            return Ok(None);
        }
        Ok(Self::pick_pdf_url(&response))
    }

    fn pick_pdf_url(response: &UnpaywallResponse) -> Option<String> {
        response
            .best_oa_location
            .as_ref()
            .and_then(|loc| loc.url_for_pdf.clone())
            .or_else(|| {
                response
                    .oa_locations
                    .iter()
                    .find_map(|loc| loc.url_for_pdf.clone())
            })
    }

    fn parse_response(response: &UnpaywallResponse, doi: &str) -> Option<SearchRecord> {
        let title = response.title.as_deref()?.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let authors: Vec<String> = response
            .z_authors
            .iter()
            .filter_map(|a| match (&a.given, &a.family) {
                (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
                (None, Some(family)) => Some(family.clone()),
                _ => None,
            })
            .collect();

        Some(
            RecordBuilder::new(title, ProviderTag::Unpaywall)
                .authors(authors)
                .year(response.year)
                .url(format!("https://doi.org/{}", doi))
                .doi(doi)
                .pdf_url(Self::pick_pdf_url(response).unwrap_or_default())
                .venue(response.journal_name.clone().unwrap_or_default())
                .build(),
        )
    }
}

#[async_trait]
impl Provider for UnpaywallProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Unpaywall
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::DOI_LOOKUP
    }

    fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchRecord>> {
        Err(Error::Provider {
            provider: ProviderTag::Unpaywall,
            attempts: 0,
            status: None,
            message: "Unpaywall is a DOI lookup service and does not support search".to_string(),
        })
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<SearchRecord>> {
        let response = self.fetch(doi).await?;
        Ok(response.as_ref().and_then(|r| Self::parse_response(r, doi)))
    }
}

#[derive(Debug, Deserialize)]
struct UnpaywallResponse {
    title: Option<String>,
    year: Option<i32>,
    is_oa: Option<bool>,
    journal_name: Option<String>,
    best_oa_location: Option<OaLocation>,
    #[serde(default)]
    oa_locations: Vec<OaLocation>,
    #[serde(default)]
    z_authors: Vec<ZAuthor>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url_for_pdf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZAuthor {
    given: Option<String>,
    family: Option<String>,
}
