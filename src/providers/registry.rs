//! Registry wiring enabled provider adapters together.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::models::{ProviderTag, SearchRecord};
use crate::providers::{
    ArxivProvider, BiorxivProvider, CrossRefProvider, DblpProvider, EuropePmcProvider,
    OpenAlexProvider, Provider, PubMedProvider, SemanticScholarProvider,
};
use crate::utils::health::HealthStatus;

/// Providers queried concurrently during one fan-out search
const MAX_CONCURRENT_PROVIDERS: usize = 4;

bitflags::bitflags! {
    /// Capabilities a provider can support beyond plain search
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProviderCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DOI_LOOKUP = 1 << 1;
        const TITLE_LOOKUP = 1 << 2;
    }
}

/// Registry of the enabled provider adapters.
///
/// Construction respects `LITERATURE_SOURCES`; disabled providers are
/// never built. Unpaywall is not a search source and is wired
/// separately by the fallback orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn Provider>>,
    default_limit: usize,
    max_results: usize,
}

impl ProviderRegistry {
    /// Build adapters for every enabled search provider.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::build(config, CancellationToken::new())
    }

    /// Build adapters whose rate-gate waits, backoffs and in-flight
    /// requests abort on the caller's token.
    pub fn from_config_with_cancellation(
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Self::build(config, cancel)
    }

    fn build(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        for tag in &config.sources {
            let token = cancel.clone();
            let provider: Arc<dyn Provider> = match tag {
                ProviderTag::Arxiv => Arc::new(ArxivProvider::new(config)?.with_cancellation(token)),
                ProviderTag::SemanticScholar => {
                    Arc::new(SemanticScholarProvider::new(config)?.with_cancellation(token))
                }
                ProviderTag::PubMed => {
                    Arc::new(PubMedProvider::new(config)?.with_cancellation(token))
                }
                ProviderTag::EuropePmc => {
                    Arc::new(EuropePmcProvider::new(config)?.with_cancellation(token))
                }
                ProviderTag::CrossRef => {
                    Arc::new(CrossRefProvider::new(config)?.with_cancellation(token))
                }
                ProviderTag::OpenAlex => {
                    Arc::new(OpenAlexProvider::new(config)?.with_cancellation(token))
                }
                ProviderTag::Dblp => Arc::new(DblpProvider::new(config)?.with_cancellation(token)),
                ProviderTag::BioRxiv => {
                    Arc::new(BiorxivProvider::new(config)?.with_cancellation(token))
                }
                // Fallback-only source, see FallbackOrchestrator
                ProviderTag::Unpaywall => continue,
            };
            providers.push(provider);
        }

        Ok(Self {
            providers,
            default_limit: config.default_limit,
            max_results: config.max_results,
        })
    }

    /// Get a provider by tag
    pub fn get(&self, tag: ProviderTag) -> Option<&Arc<dyn Provider>> {
        self.providers.iter().find(|p| p.tag() == tag)
    }

    /// All registered providers
    pub fn all(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    /// Providers supporting a capability
    pub fn with_capability(&self, capability: ProviderCapabilities) -> Vec<&Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|p| p.capabilities().contains(capability))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Fan a query out to every enabled provider concurrently.
    ///
    /// One provider failing never fails the whole search: its error is
    /// logged and its slot contributes nothing. Results are concatenated
    /// in registration order and capped at the global maximum.
    pub async fn search_all(&self, query: &str, limit: Option<usize>) -> Vec<SearchRecord> {
        let per_source = limit.unwrap_or(self.default_limit);

        let mut outcomes: Vec<(usize, Vec<SearchRecord>)> =
            stream::iter(self.providers.iter().enumerate().map(|(index, provider)| {
                let provider = Arc::clone(provider);
                let query = query.to_string();
                async move {
                    match provider.search(&query, per_source).await {
                        Ok(records) => {
                            tracing::debug!(
                                provider = %provider.tag(),
                                count = records.len(),
                                "provider search completed"
                            );
                            (index, records)
                        }
                        Err(err) => {
                            tracing::warn!(
                                provider = %provider.tag(),
                                error = %err,
                                "provider search failed, skipping"
                            );
                            (index, Vec::new())
                        }
                    }
                }
            }))
            .buffer_unordered(MAX_CONCURRENT_PROVIDERS)
            .collect()
            .await;

        outcomes.sort_by_key(|(index, _)| *index);

        let mut records: Vec<SearchRecord> = Vec::new();
        for (_, batch) in outcomes {
            records.extend(batch);
        }
        records.truncate(self.max_results);
        records
    }

    /// Health snapshot across every registered provider
    pub async fn health_report(&self) -> Vec<HealthStatus> {
        let mut report = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            report.push(provider.health().await);
        }
        report
    }
}
