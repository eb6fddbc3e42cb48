//! Canonical search record produced by every provider adapter.

use serde::{Deserialize, Serialize};

use crate::utils::text::normalize_doi;

/// The bibliographic source a record was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Arxiv,
    SemanticScholar,
    PubMed,
    EuropePmc,
    CrossRef,
    OpenAlex,
    Dblp,
    BioRxiv,
    Unpaywall,
}

impl ProviderTag {
    /// All known provider tags, in default registration order.
    pub const ALL: [ProviderTag; 9] = [
        ProviderTag::Arxiv,
        ProviderTag::SemanticScholar,
        ProviderTag::PubMed,
        ProviderTag::EuropePmc,
        ProviderTag::CrossRef,
        ProviderTag::OpenAlex,
        ProviderTag::Dblp,
        ProviderTag::BioRxiv,
        ProviderTag::Unpaywall,
    ];

    /// Returns the identifier used in configuration and logs
    pub fn id(&self) -> &'static str {
        match self {
            ProviderTag::Arxiv => "arxiv",
            ProviderTag::SemanticScholar => "semanticscholar",
            ProviderTag::PubMed => "pubmed",
            ProviderTag::EuropePmc => "europepmc",
            ProviderTag::CrossRef => "crossref",
            ProviderTag::OpenAlex => "openalex",
            ProviderTag::Dblp => "dblp",
            ProviderTag::BioRxiv => "biorxiv",
            ProviderTag::Unpaywall => "unpaywall",
        }
    }

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            ProviderTag::Arxiv => "arXiv",
            ProviderTag::SemanticScholar => "Semantic Scholar",
            ProviderTag::PubMed => "PubMed",
            ProviderTag::EuropePmc => "Europe PMC",
            ProviderTag::CrossRef => "CrossRef",
            ProviderTag::OpenAlex => "OpenAlex",
            ProviderTag::Dblp => "DBLP",
            ProviderTag::BioRxiv => "bioRxiv/medRxiv",
            ProviderTag::Unpaywall => "Unpaywall",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for ProviderTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arxiv" => Ok(ProviderTag::Arxiv),
            "semanticscholar" | "semantic_scholar" => Ok(ProviderTag::SemanticScholar),
            "pubmed" => Ok(ProviderTag::PubMed),
            "europepmc" | "europe_pmc" => Ok(ProviderTag::EuropePmc),
            "crossref" => Ok(ProviderTag::CrossRef),
            "openalex" => Ok(ProviderTag::OpenAlex),
            "dblp" => Ok(ProviderTag::Dblp),
            "biorxiv" | "medrxiv" => Ok(ProviderTag::BioRxiv),
            "unpaywall" => Ok(ProviderTag::Unpaywall),
            other => Err(format!("unknown provider tag: {}", other)),
        }
    }
}

/// A normalized literature search result
///
/// Every adapter parses its wire format into this shape, so downstream
/// code never sees provider-specific structures. Records are immutable
/// once built and move by value through the acquisition pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Paper title (always non-empty for records that survive parsing)
    pub title: String,

    /// Author names in publication order
    pub authors: Vec<String>,

    /// Publication year, where the provider reported one
    pub year: Option<i32>,

    /// Abstract text (empty when the provider omits it)
    pub r#abstract: String,

    /// Landing-page URL (may be empty)
    pub url: String,

    /// DOI in bare form `10.xxxx/yyyy`, lowercased
    pub doi: Option<String>,

    /// Source the record came from
    pub source: ProviderTag,

    /// Direct PDF URL, where the provider exposes one (absolute)
    pub pdf_url: Option<String>,

    /// Journal or venue name
    pub venue: Option<String>,

    /// Citation count, where the provider reports one
    pub citation_count: Option<u32>,
}

impl SearchRecord {
    /// Check if the record carries a direct PDF URL
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }

    /// Last name of the first author, if any.
    ///
    /// Assumes the Western "Given Family" order every provider in the
    /// registry emits; the last whitespace-separated token is taken.
    pub fn first_author_last_name(&self) -> Option<&str> {
        self.authors
            .first()
            .and_then(|a| a.split_whitespace().last())
    }
}

/// Builder for constructing [`SearchRecord`]s inside adapter parsers.
///
/// The builder applies the normalization rules every parser shares:
/// DOIs are stripped of URL prefixes and lowercased (dropped entirely
/// when they do not look like a DOI), and empty strings become `None`
/// for the optional scalar fields.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: SearchRecord,
}

impl RecordBuilder {
    /// Create a new builder with the required fields
    pub fn new(title: impl Into<String>, source: ProviderTag) -> Self {
        Self {
            record: SearchRecord {
                title: title.into(),
                authors: Vec::new(),
                year: None,
                r#abstract: String::new(),
                url: String::new(),
                doi: None,
                source,
                pdf_url: None,
                venue: None,
                citation_count: None,
            },
        }
    }

    /// Set the author list
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.record.authors = authors
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        self
    }

    /// Set the publication year
    pub fn year(mut self, year: Option<i32>) -> Self {
        self.record.year = year;
        self
    }

    /// Set the abstract text
    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.record.r#abstract = text.into();
        self
    }

    /// Set the landing-page URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.record.url = url.into();
        self
    }

    /// Set the DOI, normalizing to bare lowercase form.
    ///
    /// Values that do not match `10.<prefix>/<suffix>` after prefix
    /// stripping are discarded.
    pub fn doi(mut self, doi: impl AsRef<str>) -> Self {
        self.record.doi = normalize_doi(doi.as_ref());
        self
    }

    /// Set the direct PDF URL; empty strings are dropped
    pub fn pdf_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.record.pdf_url = if url.trim().is_empty() { None } else { Some(url) };
        self
    }

    /// Set the venue; empty strings are dropped
    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        let venue = venue.into();
        self.record.venue = if venue.trim().is_empty() { None } else { Some(venue) };
        self
    }

    /// Set the citation count
    pub fn citation_count(mut self, count: Option<u32>) -> Self {
        self.record.citation_count = count;
        self
    }

    /// Build the record
    pub fn build(self) -> SearchRecord {
        self.record
    }
}
