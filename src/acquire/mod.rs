//! PDF acquisition pipeline: candidate generation, HTML extraction,
//! the download state machine, fallbacks, and the top-level engine.
//!
//! Data flow for one record: [`AcquisitionEngine`] builds an ordered
//! [`DownloadPlan`] from the record's URL and DOI (via
//! [`candidates::transform_url`] and [`candidates::doi_to_urls`]) plus
//! the Unpaywall fallback, executes each candidate through
//! [`PdfDownloader`]'s recovery ladder (which may recurse through
//! [`extract::extract_pdf_urls`] on HTML landing pages), then tries the
//! preprint-server fallbacks. Success is a validated `%PDF` artifact on
//! disk.

pub mod candidates;
pub mod download;
pub mod engine;
pub mod extract;
pub mod fallback;
pub mod plan;

pub use download::{AttemptHeaders, DownloadConfig, PdfDownloader};
pub use engine::{pdf_filename, AcquisitionEngine, PdfPathListener};
pub use fallback::FallbackOrchestrator;
pub use plan::{AttemptKind, DownloadPlan, UrlCandidate};
