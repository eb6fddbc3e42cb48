//! HTTP client utilities and the User-Agent / Referer pools used by the
//! download recovery ladder.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

/// Identifying User-Agent sent on API calls
pub const LIBRARY_USER_AGENT: &str = concat!("litfetch/", env!("CARGO_PKG_VERSION"));

/// Browser User-Agents rotated through on 403 responses.
///
/// Three distinct engines so a block keyed on any one of them does not
/// condemn the whole pool.
pub const BROWSER_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// Referer used by the first spoof step of the recovery ladder
pub const GOOGLE_REFERER: &str = "https://www.google.com/";

/// Academic referers tried after the Google spoof
pub const ACADEMIC_REFERERS: [&str; 2] = [
    "https://scholar.google.com/",
    "https://www.semanticscholar.org/",
];

/// Accept header sent on PDF requests
pub const PDF_ACCEPT: &str = "application/pdf,*/*";

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with the library User-Agent
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_user_agent(LIBRARY_USER_AGENT, timeout)
    }

    /// Create a new HTTP client with a custom User-Agent
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url)
    }

    /// Start a HEAD request
    pub fn head(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.head(url)
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
