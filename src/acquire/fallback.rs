//! Preprint-server and open-access fallbacks for PDF acquisition.
//!
//! Wires the Unpaywall, arXiv and bioRxiv adapters into the download
//! pipeline as last-resort PDF locators. Lookup errors are logged and
//! degrade to "no URL", never failing the caller.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::acquire::candidates::transform_url;
use crate::config::{is_valid_email, Config};
use crate::error::Result;
use crate::models::SearchRecord;
use crate::providers::{ArxivProvider, BiorxivProvider, Provider, UnpaywallProvider};

/// Title-lookup breadth for the arXiv fallback
const TITLE_LOOKUP_LIMIT: usize = 5;

/// Fallback URL sources composed from provider adapters
#[derive(Debug)]
pub struct FallbackOrchestrator {
    unpaywall: Option<Arc<UnpaywallProvider>>,
    arxiv: Arc<ArxivProvider>,
    biorxiv: Arc<BiorxivProvider>,
}

impl FallbackOrchestrator {
    /// Build the fallback adapters.
    ///
    /// Unpaywall requires a valid contact email; when it is missing or
    /// malformed the fallback is disabled quietly, with a single
    /// warning here at construction.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_cancellation(config, CancellationToken::new())
    }

    /// [`from_config`](Self::from_config) with a caller-provided
    /// cancellation token threaded into every adapter.
    pub fn from_config_with_cancellation(
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let unpaywall = if config.use_unpaywall {
            match config.unpaywall_email.as_deref() {
                Some(email) if is_valid_email(email) => Some(Arc::new(
                    UnpaywallProvider::new(config, email)?.with_cancellation(cancel.clone()),
                )),
                Some(email) => {
                    tracing::warn!(
                        email,
                        "UNPAYWALL_EMAIL is malformed, Unpaywall fallback disabled"
                    );
                    None
                }
                None => {
                    tracing::warn!("UNPAYWALL_EMAIL is not set, Unpaywall fallback disabled");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            unpaywall,
            arxiv: Arc::new(ArxivProvider::new(config)?.with_cancellation(cancel.clone())),
            biorxiv: Arc::new(BiorxivProvider::new(config)?.with_cancellation(cancel)),
        })
    }

    /// Assemble from explicit adapters (for testing against local servers)
    pub fn from_parts(
        unpaywall: Option<Arc<UnpaywallProvider>>,
        arxiv: Arc<ArxivProvider>,
        biorxiv: Arc<BiorxivProvider>,
    ) -> Self {
        Self {
            unpaywall,
            arxiv,
            biorxiv,
        }
    }

    /// Whether the Unpaywall fallback is active
    pub fn unpaywall_enabled(&self) -> bool {
        self.unpaywall.is_some()
    }

    /// Best open-access PDF URL for a DOI via Unpaywall
    pub async fn unpaywall_url(&self, doi: &str) -> Option<String> {
        let unpaywall = self.unpaywall.as_ref()?;
        match unpaywall.best_pdf_url(doi).await {
            Ok(url) => url,
            Err(err) => {
                tracing::debug!(doi, error = %err, "Unpaywall lookup failed");
                None
            }
        }
    }

    /// PDF URL from an arXiv title lookup.
    ///
    /// Uses the matched record's PDF URL when present; otherwise
    /// transforms its abstract URL and takes the first candidate.
    pub async fn arxiv_by_title(&self, record: &SearchRecord) -> Option<String> {
        let matched = match self
            .arxiv
            .lookup_title(&record.title, TITLE_LOOKUP_LIMIT)
            .await
        {
            Ok(matched) => matched?,
            Err(err) => {
                tracing::debug!(title = %record.title, error = %err, "arXiv title lookup failed");
                return None;
            }
        };

        if let Some(pdf_url) = matched.pdf_url {
            return Some(pdf_url);
        }
        transform_url(&matched.url)
            .into_iter()
            .next()
            .map(|candidate| candidate.url)
    }

    /// PDF URL from a bioRxiv/medRxiv lookup, DOI first, then title.
    pub async fn biorxiv_by_doi(&self, record: &SearchRecord) -> Option<String> {
        if let Some(doi) = &record.doi {
            match self.biorxiv.lookup_doi(doi).await {
                Ok(Some(matched)) => return matched.pdf_url,
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(doi = %doi, error = %err, "bioRxiv DOI lookup failed");
                }
            }
        }

        match self
            .biorxiv
            .lookup_title(&record.title, TITLE_LOOKUP_LIMIT)
            .await
        {
            Ok(matched) => matched.and_then(|m| m.pdf_url),
            Err(err) => {
                tracing::debug!(title = %record.title, error = %err, "bioRxiv title lookup failed");
                None
            }
        }
    }
}
