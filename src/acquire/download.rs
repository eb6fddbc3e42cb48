//! The PDF download state machine.
//!
//! [`PdfDownloader::attempt`] performs one URL attempt: status
//! classification, body sniffing (PDF magic bytes vs HTML), bounded
//! recursion through HTML landing pages, streaming write and post-write
//! validation. [`PdfDownloader::attempt_with_recovery`] wraps it with
//! the recovery ladder (URL transforms, UA rotation, minimal headers,
//! HEAD probe, referer spoofs, backoff retries).

use std::path::Path;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::acquire::candidates::transform_url;
use crate::acquire::extract::extract_pdf_urls;
use crate::models::{DownloadOutcome, FailureKind};
use crate::utils::http::{
    ACADEMIC_REFERERS, BROWSER_USER_AGENTS, GOOGLE_REFERER, LIBRARY_USER_AGENT, PDF_ACCEPT,
};
use crate::utils::retry::backoff_delay;

/// Bytes sniffed before deciding PDF vs HTML
const SNIFF_BYTES: usize = 2048;

/// Maximum HTML-landing recursion depth
const MAX_HTML_DEPTH: u32 = 2;

/// Extracted links tried at the top level / when already recursing
const HTML_LINKS_AT_ROOT: usize = 3;
const HTML_LINKS_NESTED: usize = 2;

/// Transformed URLs tried by the recovery ladder
const TRANSFORM_ATTEMPTS: usize = 3;

/// Cap on buffered HTML used for link extraction
const MAX_HTML_BYTES: usize = 2 * 1024 * 1024;

/// Substrings that mark a body as HTML even without a content type
const HTML_MARKERS: [&str; 8] = [
    "<!doctype html",
    "<html",
    "<head",
    "<body",
    "<script",
    "<meta",
    "<title>",
    "<?xml",
];

/// Downloader policy knobs
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Per-request timeout for PDF fetches
    pub timeout: Duration,
    /// Backoff retries at the end of the recovery ladder
    pub retry_attempts: u32,
    /// Base delay for those retries
    pub retry_delay: Duration,
    /// Whether the standard attempt uses a browser UA (and 403s rotate)
    pub rotate_user_agents: bool,
    /// Hard cap on a single artifact
    pub max_file_bytes: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry_attempts: 2,
            retry_delay: Duration::from_secs(2),
            rotate_user_agents: true,
            max_file_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Header set for one attempt
#[derive(Debug, Clone)]
pub struct AttemptHeaders {
    user_agent: String,
    referer: Option<String>,
    minimal: bool,
}

impl AttemptHeaders {
    /// Browser-like defaults: UA, `Accept: application/pdf,*/*`,
    /// Accept-Language
    pub fn standard(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            referer: None,
            minimal: false,
        }
    }

    /// Bare minimum: UA only
    pub fn minimal(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            referer: None,
            minimal: true,
        }
    }

    /// Standard headers plus a Referer
    pub fn with_referer(user_agent: &str, referer: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            referer: Some(referer.to_string()),
            minimal: false,
        }
    }
}

/// Single-artifact PDF downloader.
///
/// Owns no cross-request state; file handles are scoped to one attempt,
/// so any number of downloaders (or concurrent calls on one) may run.
#[derive(Debug)]
pub struct PdfDownloader {
    client: reqwest::Client,
    config: DownloadConfig,
    cancel: CancellationToken,
}

impl PdfDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self, crate::error::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| crate::error::Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config,
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    fn default_user_agent(&self) -> &str {
        if self.config.rotate_user_agents {
            BROWSER_USER_AGENTS[0]
        } else {
            LIBRARY_USER_AGENT
        }
    }

    /// One URL attempt with the default timeout.
    pub async fn attempt(
        &self,
        url: &str,
        output_path: &Path,
        headers: &AttemptHeaders,
        depth: u32,
    ) -> DownloadOutcome {
        self.attempt_timed(url, output_path, headers, depth, self.config.timeout)
            .await
    }

    async fn attempt_timed(
        &self,
        url: &str,
        output_path: &Path,
        headers: &AttemptHeaders,
        depth: u32,
        timeout: Duration,
    ) -> DownloadOutcome {
        if self.cancel.is_cancelled() {
            return DownloadOutcome::failure(FailureKind::Unknown, "cancelled");
        }

        let mut request = self
            .client
            .get(url)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, &headers.user_agent);
        if !headers.minimal {
            request = request
                .header(reqwest::header::ACCEPT, PDF_ACCEPT)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        }
        if let Some(referer) = &headers.referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let mut response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Self::classify_transport(&err),
        };

        let status = response.status().as_u16();
        if status >= 400 {
            return DownloadOutcome::failure(
                FailureKind::from_status(status),
                format!("HTTP {} at {}", status, url),
            );
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();

        // Sniff the head of the body before touching the filesystem
        let mut sniff: Vec<u8> = Vec::with_capacity(SNIFF_BYTES);
        while sniff.len() < SNIFF_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => sniff.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(err) => return Self::classify_transport(&err),
            }
        }

        if sniff.starts_with(b"%PDF") {
            return self.stream_to_file(response, sniff, output_path).await;
        }

        if content_type.contains("text/html") || looks_like_html(&sniff) {
            return self
                .recover_from_html(response, sniff, &final_url, output_path, headers, depth, timeout)
                .await;
        }

        DownloadOutcome::failure(
            FailureKind::ContentMismatch,
            format!(
                "body at {} is neither PDF nor HTML (content-type: {})",
                url,
                if content_type.is_empty() { "none" } else { content_type.as_str() }
            ),
        )
    }

    /// Streaming write, then magic-byte validation of the artifact.
    async fn stream_to_file(
        &self,
        mut response: reqwest::Response,
        head: Vec<u8>,
        output_path: &Path,
    ) -> DownloadOutcome {
        if let Some(parent) = output_path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                return DownloadOutcome::failure(
                    FailureKind::FileError,
                    format!("cannot create {}: {}", parent.display(), err),
                );
            }
        }

        let mut file = match tokio::fs::File::create(output_path).await {
            Ok(file) => file,
            Err(err) => {
                return DownloadOutcome::failure(
                    FailureKind::FileError,
                    format!("cannot create {}: {}", output_path.display(), err),
                )
            }
        };

        let mut bytes = head.len() as u64;
        if let Err(err) = file.write_all(&head).await {
            drop(file);
            let _ = tokio::fs::remove_file(output_path).await;
            return DownloadOutcome::failure(FailureKind::FileError, err.to_string());
        }

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    bytes += chunk.len() as u64;
                    if bytes > self.config.max_file_bytes {
                        drop(file);
                        let _ = tokio::fs::remove_file(output_path).await;
                        return DownloadOutcome::failure(
                            FailureKind::InvalidResponse,
                            format!("artifact exceeds {} byte cap", self.config.max_file_bytes),
                        );
                    }
                    if let Err(err) = file.write_all(&chunk).await {
                        drop(file);
                        let _ = tokio::fs::remove_file(output_path).await;
                        return DownloadOutcome::failure(FailureKind::FileError, err.to_string());
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(output_path).await;
                    return Self::classify_transport(&err);
                }
            }
        }

        if let Err(err) = file.flush().await {
            drop(file);
            let _ = tokio::fs::remove_file(output_path).await;
            return DownloadOutcome::failure(FailureKind::FileError, err.to_string());
        }
        drop(file);

        match validate_pdf_file(output_path).await {
            Ok(()) => DownloadOutcome::Success {
                path: output_path.to_path_buf(),
                bytes,
            },
            Err(kind) => {
                let _ = tokio::fs::remove_file(output_path).await;
                DownloadOutcome::failure(kind, "artifact failed PDF validation")
            }
        }
    }

    /// Step 4 of the attempt state machine: scan the landing page for
    /// PDF links and recurse, bounded by depth.
    #[allow(clippy::too_many_arguments)]
    async fn recover_from_html(
        &self,
        mut response: reqwest::Response,
        mut body: Vec<u8>,
        base_url: &str,
        output_path: &Path,
        headers: &AttemptHeaders,
        depth: u32,
        timeout: Duration,
    ) -> DownloadOutcome {
        if depth >= MAX_HTML_DEPTH {
            return DownloadOutcome::failure(
                FailureKind::HtmlResponse,
                format!("HTML at {} (max recursion depth)", base_url),
            );
        }

        while body.len() < MAX_HTML_BYTES {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(_) => break,
            }
        }
        drop(response);

        let html = String::from_utf8_lossy(&body);
        let links = extract_pdf_urls(&html, base_url);
        if links.is_empty() {
            return DownloadOutcome::failure(
                FailureKind::HtmlNoPdfLink,
                format!("HTML at {} contains no PDF links", base_url),
            );
        }

        let budget = if depth == 0 {
            HTML_LINKS_AT_ROOT
        } else {
            HTML_LINKS_NESTED
        };

        for link in links.iter().take(budget) {
            if self.cancel.is_cancelled() {
                break;
            }
            tracing::debug!(url = %link, depth = depth + 1, "trying extracted PDF link");
            let outcome = self
                .attempt_boxed(link, output_path, headers, depth + 1, timeout)
                .await;
            if outcome.is_success() {
                return outcome;
            }
        }

        DownloadOutcome::failure(
            FailureKind::HtmlNoPdfLink,
            format!("no extracted link at {} yielded a PDF", base_url),
        )
    }

    /// Run the full recovery ladder for one URL.
    ///
    /// Returns the final outcome plus every annotated attempt, in order.
    pub async fn attempt_with_recovery(
        &self,
        url: &str,
        output_path: &Path,
    ) -> (DownloadOutcome, Vec<String>) {
        self.attempt_with_recovery_timed(url, output_path, self.config.timeout)
            .await
    }

    /// [`attempt_with_recovery`](Self::attempt_with_recovery) with a
    /// per-call timeout override.
    pub async fn attempt_with_recovery_timed(
        &self,
        url: &str,
        output_path: &Path,
        timeout: Duration,
    ) -> (DownloadOutcome, Vec<String>) {
        let mut tried: Vec<String> = Vec::new();
        let default_ua = self.default_user_agent().to_string();
        let standard = AttemptHeaders::standard(&default_ua);

        // 1. Standard attempt
        tried.push(url.to_string());
        let mut outcome = self.attempt_timed(url, output_path, &standard, 0, timeout).await;
        if outcome.is_success() || self.cancel.is_cancelled() {
            return (outcome, tried);
        }

        // 2. HTML dead end: try publisher transforms of the same URL
        if matches!(
            outcome.failure_kind(),
            Some(FailureKind::HtmlResponse) | Some(FailureKind::HtmlNoPdfLink)
        ) {
            for candidate in transform_url(url).into_iter().take(TRANSFORM_ATTEMPTS) {
                tried.push(candidate.annotated());
                outcome = self
                    .attempt_timed(&candidate.url, output_path, &standard, 0, timeout)
                    .await;
                if outcome.is_success() || self.cancel.is_cancelled() {
                    return (outcome, tried);
                }
            }
        }

        // 3. 403: rotate browser User-Agents
        if outcome.failure_kind() == Some(FailureKind::AccessDenied) && self.config.rotate_user_agents
        {
            for (index, ua) in BROWSER_USER_AGENTS.iter().enumerate() {
                tried.push(format!("{} [ua-rotate:{}]", url, index + 1));
                outcome = self
                    .attempt_timed(url, output_path, &AttemptHeaders::standard(ua), 0, timeout)
                    .await;
                if outcome.is_success() || self.cancel.is_cancelled() {
                    return (outcome, tried);
                }
            }
        }

        // 4. Minimal headers
        tried.push(format!("{} [minimal-headers]", url));
        outcome = self
            .attempt_timed(url, output_path, &AttemptHeaders::minimal(&default_ua), 0, timeout)
            .await;
        if outcome.is_success() || self.cancel.is_cancelled() {
            return (outcome, tried);
        }

        // 5. HEAD probe; on 200, re-GET with the same UA
        if self.head_probe(url, &default_ua, timeout).await {
            tried.push(format!("{} [head-probe]", url));
            outcome = self.attempt_timed(url, output_path, &standard, 0, timeout).await;
            if outcome.is_success() || self.cancel.is_cancelled() {
                return (outcome, tried);
            }
        }

        // 6. Referer spoof: Google
        tried.push(format!("{} [referer:{}]", url, GOOGLE_REFERER));
        outcome = self
            .attempt_timed(
                url,
                output_path,
                &AttemptHeaders::with_referer(&default_ua, GOOGLE_REFERER),
                0,
                timeout,
            )
            .await;
        if outcome.is_success() || self.cancel.is_cancelled() {
            return (outcome, tried);
        }

        // 7. Academic referers
        for referer in ACADEMIC_REFERERS.iter().take(2) {
            tried.push(format!("{} [referer:{}]", url, referer));
            outcome = self
                .attempt_timed(
                    url,
                    output_path,
                    &AttemptHeaders::with_referer(&default_ua, referer),
                    0,
                    timeout,
                )
                .await;
            if outcome.is_success() || self.cancel.is_cancelled() {
                return (outcome, tried);
            }
        }

        // 8. Backoff retries, cycling UAs while access stays denied
        for retry in 1..=self.config.retry_attempts {
            let delay = backoff_delay(self.config.retry_delay, retry);
            tokio::select! {
                _ = self.cancel.cancelled() => return (outcome, tried),
                _ = tokio::time::sleep(delay) => {}
            }

            let ua = if outcome.failure_kind() == Some(FailureKind::AccessDenied)
                && self.config.rotate_user_agents
            {
                BROWSER_USER_AGENTS[(retry as usize - 1) % BROWSER_USER_AGENTS.len()]
            } else {
                default_ua.as_str()
            };

            tried.push(format!("{} [retry:{}]", url, retry));
            outcome = self
                .attempt_timed(url, output_path, &AttemptHeaders::standard(ua), 0, timeout)
                .await;
            if outcome.is_success() || self.cancel.is_cancelled() {
                return (outcome, tried);
            }
        }

        (outcome, tried)
    }

    /// Type-erased recursion point: the landing-page recovery inside
    /// `attempt_timed` re-enters it at the next depth.
    fn attempt_boxed<'a>(
        &'a self,
        url: &'a str,
        output_path: &'a Path,
        headers: &'a AttemptHeaders,
        depth: u32,
        timeout: Duration,
    ) -> BoxFuture<'a, DownloadOutcome> {
        Box::pin(self.attempt_timed(url, output_path, headers, depth, timeout))
    }

    async fn head_probe(&self, url: &str, user_agent: &str, timeout: Duration) -> bool {
        let request = self
            .client
            .head(url)
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, user_agent);
        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn classify_transport(err: &reqwest::Error) -> DownloadOutcome {
        let kind = if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_redirect() {
            FailureKind::RedirectLoop
        } else {
            FailureKind::NetworkError
        };
        DownloadOutcome::failure(kind, err.to_string())
    }
}

/// HTML heuristics over the sniffed body head
fn looks_like_html(sniff: &[u8]) -> bool {
    let head = String::from_utf8_lossy(sniff).to_lowercase();
    HTML_MARKERS.iter().any(|marker| head.contains(marker))
}

/// Post-write validation: the file must exist, be non-empty, and start
/// with the PDF magic bytes.
async fn validate_pdf_file(path: &Path) -> Result<(), FailureKind> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| FailureKind::FileError)?;
    if metadata.len() == 0 {
        return Err(FailureKind::EmptyFile);
    }

    let bytes = tokio::fs::read(path).await.map_err(|_| FailureKind::FileError)?;
    if bytes.starts_with(b"%PDF") {
        Ok(())
    } else {
        Err(FailureKind::InvalidResponse)
    }
}

/// Delete the artifact if it exists with zero bytes.
///
/// Failed exit paths call this so aborted attempts never leave empty
/// files behind.
pub async fn cleanup_empty_file(path: &Path) {
    if let Ok(metadata) = tokio::fs::metadata(path).await {
        if metadata.len() == 0 {
            let _ = tokio::fs::remove_file(path).await;
        }
    }
}
