//! Ranked-fallback PDF retrieval.
//!
//! - [`DownloadPipeline`]: search, then try candidates in order until one commits
//! - [`DownloadTransport`]: manual-redirect HTTP client with size-bounded streaming
//! - [`OutputPaths`]: hashed output naming and temp files

mod error;
mod pipeline;
mod storage;
mod transport;

pub use error::{CandidateError, DownloadError};
pub use pipeline::DownloadPipeline;
pub use storage::{reference_hash, sanitize_reference, OutputPaths};
pub use transport::{check_content_type, DownloadTransport, ResolvedUrl, MAX_REDIRECTS};
