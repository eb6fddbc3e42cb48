//! PubMed provider implementation using the NCBI E-utilities API.
//!
//! Search is a two-call protocol: ESearch returns matching PMIDs, then
//! EFetch returns the article XML for those PMIDs.

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ProviderTag, RecordBuilder, SearchRecord};
use crate::providers::{check_status, Provider, ProviderCapabilities, ProviderError};
use crate::utils::{HttpClient, RetryExecutor};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// PubMed research source
#[derive(Debug)]
pub struct PubMedProvider {
    client: HttpClient,
    executor: RetryExecutor,
}

impl PubMedProvider {
    pub fn new(config: &Config) -> Result<Self> {
        let provider_config = config.provider(ProviderTag::PubMed);
        let client = HttpClient::new(provider_config.request_timeout)
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            executor: RetryExecutor::new(ProviderTag::PubMed, provider_config),
        })
    }

    /// Abort in-flight waits and requests with the caller's token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    /// PMC article PDF URL for a PMC ID (digits only)
    fn pmc_pdf_url(pmc_id: &str) -> String {
        format!(
            "https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{}/pdf/",
            pmc_id.trim_start_matches("PMC")
        )
    }

    fn parse_search_response(xml: &str) -> std::result::Result<Vec<String>, ProviderError> {
        let result: ESearchResult = from_str(xml)?;
        Ok(result.id_list.ids)
    }

    fn parse_fetch_response(xml: &str) -> std::result::Result<Vec<SearchRecord>, ProviderError> {
        let result: PubmedArticleSet = from_str(xml)?;

        let mut records = Vec::new();
        for article in &result.articles {
            match Self::parse_article(article) {
                Some(record) => records.push(record),
                None => tracing::debug!("skipping PubMed article without title"),
            }
        }
        Ok(records)
    }

    fn parse_article(article: &PubmedArticle) -> Option<SearchRecord> {
        let citation = article.medline_citation.as_ref()?;
        let inner = citation.article.as_ref()?;

        let title = inner.article_title.as_ref()?.text.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let pmid = citation.pmid.as_ref().map(|p| p.text.clone());

        let authors: Vec<String> = inner
            .author_list
            .as_ref()
            .map(|list| {
                list.authors
                    .iter()
                    .filter_map(|a| match (&a.fore_name, &a.last_name) {
                        (Some(fore), Some(last)) => Some(format!("{} {}", fore.text, last.text)),
                        (None, Some(last)) => Some(last.text.clone()),
                        _ => a.collective_name.as_ref().map(|c| c.text.clone()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let abstract_text = inner
            .r#abstract
            .as_ref()
            .map(|a| {
                a.sections
                    .iter()
                    .map(|s| s.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let journal = inner.journal.as_ref();
        let venue = journal.and_then(|j| j.title.as_ref()).map(|t| t.text.clone());
        let year = journal
            .and_then(|j| j.journal_issue.as_ref())
            .and_then(|i| i.pub_date.as_ref())
            .and_then(PubDate::year);

        // DOI and PMC ID live in the trailing ArticleIdList
        let mut doi = String::new();
        let mut pmc_id: Option<String> = None;
        if let Some(ids) = article
            .pubmed_data
            .as_ref()
            .and_then(|d| d.article_id_list.as_ref())
        {
            for id in &ids.ids {
                match id.id_type.as_str() {
                    "doi" => doi = id.text.clone(),
                    "pmc" => pmc_id = Some(id.text.clone()),
                    _ => {}
                }
            }
        }

        let url = pmid
            .as_ref()
            .map(|p| format!("https://pubmed.ncbi.nlm.nih.gov/{}/", p))
            .unwrap_or_default();

        let mut builder = RecordBuilder::new(title, ProviderTag::PubMed)
            .authors(authors)
            .year(year)
            .abstract_text(abstract_text)
            .url(url)
            .doi(doi)
            .venue(venue.unwrap_or_default());

        if let Some(pmc) = pmc_id {
            builder = builder.pdf_url(Self::pmc_pdf_url(&pmc));
        }

        Some(builder.build())
    }
}

#[async_trait]
impl Provider for PubMedProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::PubMed
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::SEARCH | ProviderCapabilities::TITLE_LOOKUP
    }

    fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchRecord>> {
        let search_url = format!(
            "{}?db=pubmed&term={}&retmax={}&retmode=xml",
            ESEARCH_URL,
            urlencoding::encode(query),
            limit.clamp(1, 100)
        );

        let client = self.client.clone();
        let ids = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = search_url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "PubMed").await?;
                    let xml = response.text().await.map_err(ProviderError::from)?;
                    Self::parse_search_response(&xml)
                }
            })
            .await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let fetch_url = format!("{}?db=pubmed&id={}&retmode=xml", EFETCH_URL, ids.join(","));
        let client = self.client.clone();
        let records = self
            .executor
            .execute(|| {
                let client = client.clone();
                let url = fetch_url.clone();
                async move {
                    let response = client.get(&url).send().await.map_err(ProviderError::from)?;
                    let response = check_status(response, "PubMed").await?;
                    let xml = response.text().await.map_err(ProviderError::from)?;
                    Self::parse_fetch_response(&xml)
                }
            })
            .await?;

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(rename = "IdList")]
    id_list: IdList,
}

#[derive(Debug, Deserialize)]
struct IdList {
    #[serde(rename = "Id", default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation")]
    medline_citation: Option<MedlineCitation>,
    #[serde(rename = "PubmedData")]
    pubmed_data: Option<PubmedData>,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: Option<TextNode>,
    #[serde(rename = "Article")]
    article: Option<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
    #[serde(rename = "ArticleTitle")]
    article_title: Option<TextNode>,
    #[serde(rename = "Abstract")]
    r#abstract: Option<Abstract>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<TextNode>,
    #[serde(rename = "JournalIssue")]
    journal_issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "MedlineDate")]
    medline_date: Option<String>,
}

impl PubDate {
    /// Year from either the structured field or the leading token of a
    /// MedlineDate like "2004 Jul-Aug"
    fn year(&self) -> Option<i32> {
        if let Some(year) = &self.year {
            return year.trim().parse().ok();
        }
        self.medline_date
            .as_ref()
            .and_then(|d| d.split_whitespace().next())
            .and_then(|y| y.parse().ok())
    }
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(rename = "LastName")]
    last_name: Option<TextNode>,
    #[serde(rename = "ForeName")]
    fore_name: Option<TextNode>,
    #[serde(rename = "CollectiveName")]
    collective_name: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct PubmedData {
    #[serde(rename = "ArticleIdList")]
    article_id_list: Option<ArticleIdList>,
}

#[derive(Debug, Deserialize)]
struct ArticleIdList {
    #[serde(rename = "ArticleId", default)]
    ids: Vec<ArticleId>,
}

#[derive(Debug, Deserialize)]
struct ArticleId {
    #[serde(rename = "@IdType")]
    id_type: String,
    #[serde(rename = "$text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    text: String,
}
