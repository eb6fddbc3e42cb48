//! Europe PMC provider implementation (RESTful search API).

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const EUROPE_PMC_API_BASE: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// Europe PMC research source
#[derive(Debug)]
pub struct EuropePmcProvider {
    client: HttpClient,
    executor: RetryExecutor,
}

impl EuropePmcProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::EuropePmc);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::EuropePmc, provider_config),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    async fn query(&self, query: String, page_size: usize) -> Result<Vec<EuropePmcResult>> {
        let url = format!(
            "{}?query={}&format=json&resultType=core&pageSize={}",
            EUROPE_PMC_API_BASE,
            urlencoding::encode(&query),
            page_size.clamp(1, 100)
        );

        let client = self.client.clone();
        let response: EuropePmcResponse = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "Europe PMC").await?;
                    response
                        .json::<EuropePmcResponse>()
                        .await
                        .map_err(|e| ProviderError::Parse(format!("JSON: {}", e)))
                }
            })
            .await?;

        Ok(response.result_list.map(|l| l.result).unwrap_or_default())
    }

    fn parse_result(result: &EuropePmcResult) -> Option<SearchRecord> {
        let title = result.title.as_deref()?.trim().trim_end_matches('.').to_string();
        if title.is_empty() {
            return None;
        }

        // authorString is "A Author, B Author, C Author."
        let authors: Vec<String> = result
            .author_string
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('.')
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let year = result.pub_year.as_deref().and_then(|y| y.trim().parse().ok());

        // Direct PDF where the full-text list carries a pdf entry
        let pdf_url = result
            .full_text_url_list
            .as_ref()
            .map(|l| l.full_text_url.as_slice())
            .unwrap_or_default()
            .iter()
            .find(|u| u.document_style.as_deref() == Some("pdf"))
            .and_then(|u| u.url.clone())
            .unwrap_or_default();

        let url = match (&result.pmcid, &result.doi) {
            (Some(pmcid), _) => format!("https://europepmc.org/article/PMC/{}", pmcid.trim_start_matches("PMC")),
            (None, Some(doi)) => format!("https://doi.org/{}", doi),
            (None, None) => String::new(),
        };

        let citation_count = result.cited_by_count.and_then(|c| u32::try_from(c).ok());

        Some(
            RecordBuilder::new(title, ProviderTag::EuropePmc)
                .authors(authors)
                .year(year)
                .abstract_text(result.abstract_text.clone().unwrap_or_default())
                .url(url)
                .doi(result.doi.clone().unwrap_or_default())
                .pdf_url(pdf_url)
                .venue(result.journal_title.clone().unwrap_or_default())
                .citation_count(citation_count)
                .build(),
        )
    }
}

#[async_trait]
impl Provider for EuropePmcProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::EuropePmc
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
        let results = self.query(query.to_string(), limit).await?;

        let mut records = Vec::new();
        for result in &results {
            match Self::parse_result(result) {
                Some(record) => records.push(record),
                None => tracing::debug!("skipping Europe PMC entry without title"),
            }
        }
        Ok(records)
    }

    async fn lookup_doi(&self, doi: &str) -> Result<Option<SearchRecord>> {
        let results = self.query(format!("DOI:\"{}\"", doi), 1).await?;
        Ok(results.first().and_then(Self::parse_result))
    }
}

#[derive(Debug, Deserialize)]
struct EuropePmcResponse {
    #[serde(rename = "resultList")]
    result_list: Option<EuropePmcResultList>,
}

#[derive(Debug, Deserialize)]
struct EuropePmcResultList {
    #[serde(default)]
    result: Vec<EuropePmcResult>,
}

#[derive(Debug, Deserialize)]
struct EuropePmcResult {
    title: Option<String>,
    #[serde(rename = "authorString")]
    author_string: Option<String>,
    #[serde(rename = "pubYear")]
    pub_year: Option<String>,
    #[serde(rename = "abstractText")]
    abstract_text: Option<String>,
    doi: Option<String>,
    pmcid: Option<String>,
    #[serde(rename = "journalTitle")]
    journal_title: Option<String>,
    #[serde(rename = "citedByCount")]
    cited_by_count: Option<i64>,
    #[serde(rename = "fullTextUrlList")]
    full_text_url_list: Option<FullTextUrlList>,
}

#[derive(Debug, Deserialize)]
struct FullTextUrlList {
    #[serde(rename = "fullTextUrl", default)]
    full_text_url: Vec<FullTextUrl>,
}

#[derive(Debug, Deserialize)]
struct FullTextUrl {
    #[serde(rename = "documentStyle")]
    document_style: Option<String>,
    url: Option<String>,
}
