//! Configuration management.
//!
//! All options are recognized from the environment under the
//! `LITERATURE_` prefix (plus `UNPAYWALL_EMAIL` and
//! `SEMANTICSCHOLAR_API_KEY` for provider auth). Invalid numeric values
//! and unknown provider tags are configuration errors, not silent
//! defaults.

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::ProviderTag;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid regex")
});

/// How a provider reacts to HTTP 429 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitStrategy {
    /// Honor the Retry-After header before the next attempt
    RetryAfter,
    /// Treat 429 like any other transient error
    ExponentialBackoff,
}

/// Per-provider request policy
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Minimum interval between requests to this provider
    pub min_interval: Duration,
    /// Attempt budget for one logical call (first try included)
    pub max_retries: u32,
    /// Timeout for a single API request
    pub request_timeout: Duration,
    /// Base delay for exponential backoff between retries
    pub retry_delay: Duration,
    pub rate_limit_strategy: RateLimitStrategy,
    pub health_check_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
            rate_limit_strategy: RateLimitStrategy::RetryAfter,
            health_check_enabled: true,
        }
    }
}

/// Library configuration, loaded from the environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Default per-source result cap (`LITERATURE_DEFAULT_LIMIT`)
    pub default_limit: usize,
    /// Global result cap across providers (`LITERATURE_MAX_RESULTS`)
    pub max_results: usize,
    /// API request timeout (`LITERATURE_TIMEOUT`, seconds)
    pub request_timeout: Duration,
    /// PDF request timeout (`LITERATURE_PDF_DOWNLOAD_TIMEOUT`, seconds)
    pub pdf_timeout: Duration,
    /// Provider-call retry budget (`LITERATURE_RETRY_ATTEMPTS`)
    pub retry_attempts: u32,
    /// Provider-call base backoff (`LITERATURE_RETRY_DELAY`, seconds)
    pub retry_delay: Duration,
    /// Downloader retry budget (`LITERATURE_DOWNLOAD_RETRY_ATTEMPTS`)
    pub download_retry_attempts: u32,
    /// Downloader base backoff (`LITERATURE_DOWNLOAD_RETRY_DELAY`, seconds)
    pub download_retry_delay: Duration,
    /// Download worker pool size (`LITERATURE_MAX_PARALLEL_DOWNLOADS`)
    pub max_parallel_downloads: usize,
    /// URL candidate budget per PDF (`LITERATURE_MAX_URL_ATTEMPTS_PER_PDF`)
    pub max_url_attempts_per_pdf: usize,
    /// Fallback-family budget (`LITERATURE_MAX_FALLBACK_STRATEGIES`)
    pub max_fallback_strategies: usize,
    /// Enabled providers (`LITERATURE_SOURCES`, comma-separated tags)
    pub sources: Vec<ProviderTag>,
    /// Open-access fallback toggle (`LITERATURE_USE_UNPAYWALL`)
    pub use_unpaywall: bool,
    /// Unpaywall contact email (`UNPAYWALL_EMAIL`)
    pub unpaywall_email: Option<String>,
    /// Browser UA rotation toggle (`LITERATURE_USE_BROWSER_USER_AGENT`)
    pub use_browser_user_agent: bool,
    /// arXiv inter-request interval (`LITERATURE_ARXIV_DELAY`, seconds)
    pub arxiv_delay: Duration,
    /// Semantic Scholar interval (`LITERATURE_SEMANTICSCHOLAR_DELAY`)
    pub semanticscholar_delay: Duration,
    /// Semantic Scholar auth (`SEMANTICSCHOLAR_API_KEY`)
    pub semanticscholar_api_key: Option<String>,
    /// Download directory (`LITERATURE_DOWNLOAD_DIR`)
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_results: 50,
            request_timeout: Duration::from_secs(30),
            pdf_timeout: Duration::from_secs(60),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
            download_retry_attempts: 2,
            download_retry_delay: Duration::from_secs(2),
            max_parallel_downloads: 4,
            max_url_attempts_per_pdf: 8,
            max_fallback_strategies: 3,
            sources: vec![
                ProviderTag::Arxiv,
                ProviderTag::SemanticScholar,
                ProviderTag::PubMed,
                ProviderTag::EuropePmc,
                ProviderTag::CrossRef,
                ProviderTag::OpenAlex,
                ProviderTag::Dblp,
                ProviderTag::BioRxiv,
            ],
            use_unpaywall: true,
            unpaywall_email: None,
            use_browser_user_agent: true,
            arxiv_delay: Duration::from_secs(3),
            semanticscholar_delay: Duration::from_secs(1),
            semanticscholar_api_key: None,
            download_dir: PathBuf::from("./downloads"),
        }
    }
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Unset keys fall back to defaults; set-but-invalid values are
    /// surfaced as [`Error::Config`] naming the offending key.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Config::default();

        let sources = match std::env::var("LITERATURE_SOURCES") {
            Ok(raw) => parse_sources(&raw)?,
            Err(_) => defaults.sources,
        };

        Ok(Self {
            default_limit: env_parse("LITERATURE_DEFAULT_LIMIT", defaults.default_limit)?,
            max_results: env_parse("LITERATURE_MAX_RESULTS", defaults.max_results)?,
            request_timeout: env_secs("LITERATURE_TIMEOUT", defaults.request_timeout)?,
            pdf_timeout: env_secs("LITERATURE_PDF_DOWNLOAD_TIMEOUT", defaults.pdf_timeout)?,
            retry_attempts: env_parse("LITERATURE_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay: env_secs("LITERATURE_RETRY_DELAY", defaults.retry_delay)?,
            download_retry_attempts: env_parse(
                "LITERATURE_DOWNLOAD_RETRY_ATTEMPTS",
                defaults.download_retry_attempts,
            )?,
            download_retry_delay: env_secs(
                "LITERATURE_DOWNLOAD_RETRY_DELAY",
                defaults.download_retry_delay,
            )?,
            max_parallel_downloads: env_parse(
                "LITERATURE_MAX_PARALLEL_DOWNLOADS",
                defaults.max_parallel_downloads,
            )?,
            max_url_attempts_per_pdf: env_parse(
                "LITERATURE_MAX_URL_ATTEMPTS_PER_PDF",
                defaults.max_url_attempts_per_pdf,
            )?,
            max_fallback_strategies: env_parse(
                "LITERATURE_MAX_FALLBACK_STRATEGIES",
                defaults.max_fallback_strategies,
            )?,
            sources,
            use_unpaywall: env_bool("LITERATURE_USE_UNPAYWALL", defaults.use_unpaywall)?,
            unpaywall_email: std::env::var("UNPAYWALL_EMAIL").ok().filter(|s| !s.is_empty()),
            use_browser_user_agent: env_bool(
                "LITERATURE_USE_BROWSER_USER_AGENT",
                defaults.use_browser_user_agent,
            )?,
            arxiv_delay: env_secs("LITERATURE_ARXIV_DELAY", defaults.arxiv_delay)?,
            semanticscholar_delay: env_secs(
                "LITERATURE_SEMANTICSCHOLAR_DELAY",
                defaults.semanticscholar_delay,
            )?,
            semanticscholar_api_key: std::env::var("SEMANTICSCHOLAR_API_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            download_dir: std::env::var("LITERATURE_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
        })
    }

    /// Request policy for one provider tag.
    ///
    /// Providers are statically enumerated; adding one means adding a
    /// tag and an arm here, not a dynamic key lookup.
    pub fn provider(&self, tag: ProviderTag) -> ProviderConfig {
        let base = ProviderConfig {
            max_retries: self.retry_attempts,
            request_timeout: self.request_timeout,
            retry_delay: self.retry_delay,
            ..ProviderConfig::default()
        };

        match tag {
            // arXiv asks for multi-second spacing between API calls
            ProviderTag::Arxiv => ProviderConfig {
                min_interval: self.arxiv_delay,
                ..base
            },
            ProviderTag::SemanticScholar => ProviderConfig {
                min_interval: self.semanticscholar_delay,
                ..base
            },
            // NCBI allows 3 req/s without an API key
            ProviderTag::PubMed => ProviderConfig {
                min_interval: Duration::from_millis(334),
                ..base
            },
            ProviderTag::EuropePmc => ProviderConfig {
                min_interval: Duration::from_millis(200),
                ..base
            },
            ProviderTag::CrossRef => ProviderConfig {
                min_interval: Duration::from_millis(100),
                ..base
            },
            ProviderTag::OpenAlex => ProviderConfig {
                min_interval: Duration::from_millis(100),
                ..base
            },
            ProviderTag::Dblp => ProviderConfig {
                min_interval: Duration::from_millis(500),
                rate_limit_strategy: RateLimitStrategy::ExponentialBackoff,
                ..base
            },
            ProviderTag::BioRxiv => ProviderConfig {
                min_interval: Duration::from_millis(500),
                ..base
            },
            ProviderTag::Unpaywall => ProviderConfig {
                min_interval: Duration::from_millis(100),
                max_retries: 3,
                ..base
            },
        }
    }
}

/// Validate the configured Unpaywall contact email.
///
/// The fallback orchestrator disables Unpaywall quietly when this
/// fails; callers that want the hard error use this directly.
pub fn validate_unpaywall_email(email: &str) -> Result<(), Error> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "malformed Unpaywall contact email: {:?}",
            email
        )))
    }
}

/// Whether an email passes the Unpaywall contact pattern.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn parse_sources(raw: &str) -> Result<Vec<ProviderTag>, Error> {
    let mut tags = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let tag: ProviderTag = part
            .parse()
            .map_err(|e: String| Error::Config(format!("LITERATURE_SOURCES: {}", e)))?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    if tags.is_empty() {
        return Err(Error::Config(
            "LITERATURE_SOURCES: no providers enabled".to_string(),
        ));
    }
    Ok(tags)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, Error> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{}: invalid value {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration, Error> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{}: invalid value {:?}", key, raw)))?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::Config(format!("{}: invalid value {:?}", key, raw)));
            }
            Ok(Duration::from_secs_f64(secs))
        }
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, Error> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("{}: invalid value {:?}", key, raw))),
        },
        Err(_) => Ok(default),
    }
}
