//! Top-level PDF acquisition driver.
//!
//! For one record the engine derives the output filename, builds the
//! ordered candidate plan, executes it through the downloader's
//! recovery ladder, then falls back to preprint-server lookups, all
//! under the URL and fallback budgets. Batch acquisition runs in a
//! bounded worker pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::acquire::candidates::{doi_to_urls, transform_url};
use crate::acquire::download::{cleanup_empty_file, DownloadConfig, PdfDownloader};
use crate::acquire::fallback::FallbackOrchestrator;
use crate::acquire::plan::{AttemptKind, DownloadPlan, UrlCandidate};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{
    DownloadFailure, DownloadOutcome, DownloadReport, FailureKind, ProviderTag, SearchRecord,
};
use crate::providers::ArxivProvider;

/// Title words never used as the filename's title token
const FILENAME_STOPWORDS: [&str; 10] =
    ["a", "an", "the", "on", "in", "of", "for", "to", "and", "with"];

/// Derive the artifact filename for a record:
/// `{firstAuthorLastNameLower}{year|"nodate"}{firstNonStopwordFromTitleLower}.pdf`,
/// alphanumeric only.
pub fn pdf_filename(record: &SearchRecord) -> String {
    let author: String = record
        .first_author_last_name()
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    let year = record
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "nodate".to_string());

    let title_word = record
        .title
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .find(|word| !word.is_empty() && !FILENAME_STOPWORDS.contains(&word.as_str()))
        .unwrap_or_default();

    format!("{}{}{}.pdf", author, year, title_word)
}

/// Collaborator notified when a record's PDF lands on disk.
///
/// The filename stem doubles as the citation key, so a library index
/// can map the notification back to its entry.
pub trait PdfPathListener: Send + Sync + std::fmt::Debug {
    fn update_pdf_path(&self, citation_key: &str, path: &std::path::Path);
}

/// PDF acquisition engine for search records
#[derive(Debug)]
pub struct AcquisitionEngine {
    downloader: PdfDownloader,
    fallbacks: FallbackOrchestrator,
    download_dir: PathBuf,
    default_timeout: Duration,
    timeout_overrides: HashMap<ProviderTag, Duration>,
    max_url_attempts: usize,
    max_fallback_strategies: usize,
    pool: Arc<Semaphore>,
    cancel: CancellationToken,
    listener: Option<Arc<dyn PdfPathListener>>,
}

impl AcquisitionEngine {
    /// Build the engine and create the download directory.
    pub fn new(config: &Config) -> Result<Self> {
        Self::new_with_cancellation(config, CancellationToken::new())
    }

    /// Build the engine with a caller-provided cancellation token.
    ///
    /// Cancelling the token aborts in-flight downloads, gate waits and
    /// backoffs, surfacing [`Error::Cancelled`].
    pub fn new_with_cancellation(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let downloader = PdfDownloader::new(DownloadConfig {
            timeout: config.pdf_timeout,
            retry_attempts: config.download_retry_attempts,
            retry_delay: config.download_retry_delay,
            rotate_user_agents: config.use_browser_user_agent,
            ..DownloadConfig::default()
        })?
        .with_cancellation(cancel.clone());
        let fallbacks = FallbackOrchestrator::from_config_with_cancellation(config, cancel.clone())?;

        std::fs::create_dir_all(&config.download_dir)?;

        Ok(Self {
            downloader,
            fallbacks,
            download_dir: config.download_dir.clone(),
            default_timeout: config.pdf_timeout,
            timeout_overrides: HashMap::new(),
            max_url_attempts: config.max_url_attempts_per_pdf.max(1),
            max_fallback_strategies: config.max_fallback_strategies,
            pool: Arc::new(Semaphore::new(config.max_parallel_downloads.max(1))),
            cancel,
            listener: None,
        })
    }

    /// Notify a library-index collaborator of every completed download.
    pub fn with_path_listener(mut self, listener: Arc<dyn PdfPathListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replace the download timeout for records from one source.
    pub fn with_timeout_override(mut self, source: ProviderTag, timeout: Duration) -> Self {
        self.timeout_overrides.insert(source, timeout);
        self
    }

    /// Replace the fallback orchestrator (for testing against local servers)
    pub fn with_fallbacks(mut self, fallbacks: FallbackOrchestrator) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    fn timeout_for(&self, source: ProviderTag) -> Duration {
        self.timeout_overrides
            .get(&source)
            .copied()
            .unwrap_or(self.default_timeout)
    }

    /// Output path a record will be written to
    pub fn output_path(&self, record: &SearchRecord) -> PathBuf {
        self.download_dir.join(pdf_filename(record))
    }

    /// Build the ordered candidate plan for a record.
    ///
    /// Order: primary URL (arXiv-normalized when the record is from
    /// arXiv), publisher transforms (promoted ahead of abstract-page
    /// primaries), DOI patterns, Unpaywall, then source-aware
    /// prioritization. Duplicates collapse into their first position
    /// and the plan never exceeds the URL budget.
    pub async fn build_plan(
        &self,
        record: &SearchRecord,
        primary_override: Option<&str>,
    ) -> DownloadPlan {
        let mut plan = DownloadPlan::with_capacity(self.max_url_attempts);
        let is_arxiv = record.source == ProviderTag::Arxiv;

        let primary = primary_override
            .map(str::to_string)
            .or_else(|| record.pdf_url.clone())
            .or_else(|| (!record.url.is_empty()).then(|| record.url.clone()));

        if let Some(primary) = &primary {
            if is_arxiv && record.pdf_url.is_some() {
                // Normalized arXiv PDF first, arXiv-domain mirrors next
                match ArxivProvider::parse_id(primary) {
                    Ok(id) => {
                        plan.push(UrlCandidate::new(
                            ArxivProvider::pdf_url(&id),
                            AttemptKind::Primary,
                        ));
                    }
                    Err(_) => {
                        plan.push(UrlCandidate::new(primary.clone(), AttemptKind::Primary));
                    }
                }
                for candidate in transform_url(primary) {
                    if candidate.url.contains("arxiv.org/") {
                        plan.push(candidate);
                    }
                }
            } else {
                let transforms = transform_url(primary);
                let abstract_page = {
                    let lowered = primary.to_lowercase();
                    lowered.contains("/abs/") || lowered.contains("abstract")
                };
                if abstract_page {
                    // Direct-PDF transforms beat a page we know is HTML
                    for candidate in transforms {
                        plan.push(candidate);
                    }
                    plan.push(UrlCandidate::new(primary.clone(), AttemptKind::Primary));
                } else {
                    plan.push(UrlCandidate::new(primary.clone(), AttemptKind::Primary));
                    for candidate in transforms {
                        plan.push(candidate);
                    }
                }
            }
        }

        if let Some(doi) = &record.doi {
            for candidate in doi_to_urls(doi) {
                plan.push(candidate);
            }
        }

        // Preprint records are already open access, Unpaywall cannot
        // add a location their canonical URL does not cover
        let skip_unpaywall = is_arxiv || record.source == ProviderTag::BioRxiv;
        if !skip_unpaywall {
            if let Some(doi) = &record.doi {
                if let Some(url) = self.fallbacks.unpaywall_url(doi).await {
                    plan.push(UrlCandidate::new(url, AttemptKind::Unpaywall));
                }
            }
        }

        if is_arxiv {
            plan.promote(|c| c.url.contains("arxiv.org/pdf/"));
        }

        plan
    }

    /// Acquire the PDF for one record.
    ///
    /// Returns the validated artifact path, or a [`DownloadFailure`]
    /// carrying every attempted URL and the terminal failure reason.
    pub async fn acquire(&self, record: &SearchRecord) -> Result<PathBuf> {
        self.acquire_from(record, None).await
    }

    /// [`acquire`](Self::acquire) with an explicit primary URL.
    pub async fn acquire_from(
        &self,
        record: &SearchRecord,
        primary_override: Option<&str>,
    ) -> Result<PathBuf> {
        let output_path = self.output_path(record);

        // Idempotent by filename: an existing artifact short-circuits
        // before any network traffic
        if let Ok(metadata) = std::fs::metadata(&output_path) {
            if metadata.len() > 0 {
                tracing::debug!(path = %output_path.display(), "artifact already present");
                return Ok(output_path);
            }
        }

        let timeout = self.timeout_for(record.source);
        let plan = self.build_plan(record, primary_override).await;
        tracing::debug!(
            title = %record.title,
            candidates = plan.len(),
            "executing download plan"
        );

        let mut attempted: Vec<String> = Vec::new();
        let mut last_failure: Option<(FailureKind, String)> = None;

        for candidate in plan.iter() {
            if self.cancel.is_cancelled() {
                cleanup_empty_file(&output_path).await;
                return Err(Error::Cancelled);
            }

            let (outcome, tried) = self
                .downloader
                .attempt_with_recovery_timed(&candidate.url, &output_path, timeout)
                .await;
            attempted.extend(tried);

            match outcome {
                DownloadOutcome::Success { path, .. } => {
                    self.notify_success(&path);
                    return Ok(path);
                }
                DownloadOutcome::Failure { kind, last_error, .. } => {
                    last_failure = Some((kind, last_error));
                }
            }
        }

        // Preprint-server fallbacks, only after the URL plan exhausts
        let mut fallbacks_used = 0usize;

        if record.source != ProviderTag::Arxiv && fallbacks_used < self.max_fallback_strategies {
            fallbacks_used += 1;
            if let Some(url) = self.fallbacks.arxiv_by_title(record).await {
                match self
                    .try_fallback_url(&url, AttemptKind::ArxivFallback, &output_path, timeout, &mut attempted)
                    .await
                {
                    Ok(path) => {
                        self.notify_success(&path);
                        return Ok(path);
                    }
                    Err(failure) => last_failure = failure.or(last_failure),
                }
            }
        }

        if fallbacks_used < self.max_fallback_strategies {
            if let Some(url) = self.fallbacks.biorxiv_by_doi(record).await {
                match self
                    .try_fallback_url(&url, AttemptKind::BiorxivFallback, &output_path, timeout, &mut attempted)
                    .await
                {
                    Ok(path) => {
                        self.notify_success(&path);
                        return Ok(path);
                    }
                    Err(failure) => last_failure = failure.or(last_failure),
                }
            }
        }

        cleanup_empty_file(&output_path).await;
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (kind, failure_reason) = last_failure.unwrap_or((
            FailureKind::Unknown,
            "no candidate URLs could be derived for this record".to_string(),
        ));
        let total_attempts = attempted.len();
        Err(Error::Download(DownloadFailure {
            kind,
            failure_reason,
            attempted_urls: attempted,
            output_path,
            total_attempts,
        }))
    }

    fn notify_success(&self, path: &std::path::Path) {
        if let Some(listener) = &self.listener {
            let key = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            listener.update_pdf_path(key, path);
        }
    }

    async fn try_fallback_url(
        &self,
        url: &str,
        kind: AttemptKind,
        output_path: &std::path::Path,
        timeout: Duration,
        attempted: &mut Vec<String>,
    ) -> std::result::Result<PathBuf, Option<(FailureKind, String)>> {
        if self.cancel.is_cancelled() {
            return Err(None);
        }
        attempted.push(UrlCandidate::new(url, kind).annotated());

        let (outcome, mut tried) = self
            .downloader
            .attempt_with_recovery_timed(url, output_path, timeout)
            .await;
        // First entry duplicates the annotated URL pushed above
        if !tried.is_empty() {
            tried.remove(0);
        }
        attempted.extend(tried);

        match outcome {
            DownloadOutcome::Success { path, .. } => Ok(path),
            DownloadOutcome::Failure { kind, last_error, .. } => Err(Some((kind, last_error))),
        }
    }

    /// Acquire PDFs for many records through the bounded worker pool.
    ///
    /// Submission beyond the pool size blocks; records never race each
    /// other for the same plan.
    pub async fn acquire_all(&self, records: &[SearchRecord]) -> DownloadReport {
        let outcomes: Vec<(usize, Result<PathBuf>)> = stream::iter(
            records.iter().enumerate().map(|(index, record)| {
                let pool = Arc::clone(&self.pool);
                async move {
                    let _permit = pool.acquire().await.expect("semaphore closed");
                    (index, self.acquire(record).await)
                }
            }),
        )
        .buffer_unordered(records.len().max(1))
        .collect()
        .await;

        let mut report = DownloadReport::default();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(path) => {
                    if let Ok(metadata) = std::fs::metadata(&path) {
                        report.total_bytes += metadata.len();
                    }
                    report.succeeded.push(path);
                }
                Err(Error::Download(failure)) => report.failed.push(failure),
                Err(other) => {
                    tracing::warn!(error = %other, "acquisition failed outside the download path");
                    report.failed.push(DownloadFailure {
                        kind: FailureKind::Unknown,
                        failure_reason: other.to_string(),
                        attempted_urls: Vec::new(),
                        output_path: PathBuf::new(),
                        total_attempts: 0,
                    });
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordBuilder;

    fn record(title: &str, authors: &[&str], year: Option<i32>) -> SearchRecord {
        RecordBuilder::new(title, ProviderTag::CrossRef)
            .authors(authors.iter().map(|a| a.to_string()).collect())
            .year(year)
            .build()
    }

    #[test]
    fn test_pdf_filename_full_record() {
        let record = record(
            "The Structure of Scientific Revolutions",
            &["Thomas S. Kuhn"],
            Some(1962),
        );
        assert_eq!(pdf_filename(&record), "kuhn1962structure.pdf");
    }

    #[test]
    fn test_pdf_filename_skips_stopwords() {
        let record = record("On the Origin of Species", &["Charles Darwin"], Some(1859));
        assert_eq!(pdf_filename(&record), "darwin1859origin.pdf");
    }

    #[test]
    fn test_pdf_filename_no_year() {
        let record = record("Attention Is All You Need", &["Ashish Vaswani"], None);
        assert_eq!(pdf_filename(&record), "vaswaninodateattention.pdf");
    }

    #[test]
    fn test_pdf_filename_strips_non_alnum() {
        let record = record(
            "Deep learning: a survey",
            &["Jean-Pierre O'Neil"],
            Some(2020),
        );
        assert_eq!(pdf_filename(&record), "oneil2020deep.pdf");
    }

    #[test]
    fn test_pdf_filename_no_author() {
        let record = record("Editorial notes", &[], Some(2021));
        assert_eq!(pdf_filename(&record), "2021editorial.pdf");
    }
}
