//! Core data models for search records and download outcomes.

mod outcome;
mod record;

pub use outcome::{DownloadFailure, DownloadOutcome, DownloadReport, FailureKind};
pub use record::{ProviderTag, RecordBuilder, SearchRecord};
