//! # litfetch
//!
//! Multi-source scholarly literature search with open-access PDF
//! acquisition.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures ([`SearchRecord`], download outcomes)
//! - [`providers`]: Provider adapters with a trait-based common contract
//! - [`acquire`]: Candidate-URL generation, HTML extraction and the PDF
//!   acquisition engine
//! - [`utils`]: HTTP client, rate gating, retries, health tracking
//! - [`config`]: Environment-driven configuration
//! - [`error`]: The public error taxonomy
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use litfetch::{AcquisitionEngine, Config, ProviderRegistry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), litfetch::Error> {
//! let config = Config::from_env()?;
//! let registry = ProviderRegistry::from_config(&config)?;
//! let engine = AcquisitionEngine::new(&config)?;
//!
//! let records = registry.search_all("transformer attention", None).await;
//! for record in &records {
//!     match engine.acquire(record).await {
//!         Ok(path) => println!("saved {}", path.display()),
//!         Err(err) => eprintln!("failed: {}", err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod utils;

// Re-export commonly used types
pub use acquire::{AcquisitionEngine, FallbackOrchestrator, PdfDownloader};
pub use config::Config;
pub use error::Error;
pub use models::{DownloadOutcome, ProviderTag, SearchRecord};
pub use providers::{Provider, ProviderRegistry};
// Cancellation tokens appear in public constructors
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
