//! Core data models for discovery queries, ranked candidates and downloads.

mod candidate;
mod download;
mod query;

pub use candidate::{Candidate, CandidateMetadata, SearchResult};
pub use download::{DownloadOptions, DownloadResult, PdfQuality, ProxyConfig, ValidationResult};
pub use query::{AccessLevel, PdfQuery, SourceType, DEFAULT_MAX_RESULTS, DEFAULT_SOURCE_TIMEOUT_SECS};
