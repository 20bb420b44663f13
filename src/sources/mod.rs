//! Document source plugins.
//!
//! Every open-access catalog implements [`CandidateSource`]: it turns a
//! [`PdfQuery`] into zero or more [`Candidate`] locations with a baseline
//! confidence that reflects how reliable that catalog's links are. Sources are
//! collected in a [`SourceRegistry`] and fanned out by the open-access finder.
//!
//! Two collaborators sit next to the catalogs:
//!
//! - [`DoiResolver`] resolves a DOI to registry metadata and a direct PDF link
//!   ([`CrossRefResolver`] is the default implementation).
//! - [`SnapshotProvider`] renders a web page to PDF bytes as a last resort.
//!
//! # Runtime Source Configuration
//!
//! Sources are filtered by the `[sources]` section of the configuration file or
//! by environment variables:
//!
//! - `PDF_FINDER_SOURCES__ENABLED` - only use these sources (e.g. `unpaywall,openalex`)
//! - `PDF_FINDER_SOURCES__DISABLED` - never use these sources
//!
//! CORE is only registered when a `CORE_API_KEY` is available.

mod arxiv;
mod core_repo;
mod crossref;
mod europe_pmc;
mod openalex;
mod pmc;
mod registry;
mod semantic;
pub mod snapshot;
mod unpaywall;

pub mod mock;

pub use arxiv::ArxivSource;
pub use core_repo::CoreSource;
pub use crossref::{CrossRefResolver, DoiMetadata, PdfLinkKind, CROSSREF_SOURCE_NAME};
pub use europe_pmc::EuropePmcSource;
pub use mock::{MockDoiResolver, MockSnapshotProvider, MockSource};
pub use openalex::OpenAlexSource;
pub use pmc::PmcSource;
pub use registry::{SourceCapabilities, SourceRegistry};
pub use semantic::SemanticScholarSource;
pub use snapshot::{RenderOptions, RenderedPdf, SnapshotProvider};
pub use unpaywall::UnpaywallSource;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{Candidate, PdfQuery};

/// The CandidateSource trait defines the interface for all catalog adapters.
///
/// # Implementing a New Source
///
/// 1. Create a struct that implements `CandidateSource`
/// 2. Declare which identifiers it can search on in `capabilities`
/// 3. Parse the catalog response into a private serde schema, then lift it
///    into [`Candidate`]s with a source-specific baseline confidence
/// 4. Register it in [`SourceRegistry::from_config`] or dynamically
#[async_trait]
pub trait CandidateSource: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g. "unpaywall", "openalex")
    fn id(&self) -> &str;

    /// Human-readable name; used as the candidate's `source` field
    fn name(&self) -> &str;

    /// Which identifiers this source can search on
    fn capabilities(&self) -> SourceCapabilities;

    /// Whether the query carries an identifier this source understands
    fn can_handle(&self, query: &PdfQuery) -> bool {
        let caps = self.capabilities();
        (query.doi_str().is_some() && caps.contains(SourceCapabilities::DOI_LOOKUP))
            || (query.pmid_str().is_some() && caps.contains(SourceCapabilities::PMID_LOOKUP))
            || (query.title_str().is_some() && caps.contains(SourceCapabilities::TITLE_SEARCH))
            || (query.isbn_str().is_some() && caps.contains(SourceCapabilities::ISBN_LOOKUP))
    }

    /// Locate candidate PDFs for the query
    async fn find(&self, query: &PdfQuery) -> Result<Vec<Candidate>, SourceError>;
}

/// Resolves DOIs against a works registry
#[async_trait]
pub trait DoiResolver: Send + Sync + std::fmt::Debug {
    /// Fetch registry metadata, including the best direct PDF link found
    async fn resolve(&self, doi: &str) -> Result<DoiMetadata, SourceError>;

    /// Convenience wrapper returning only the PDF link
    async fn find_pdf_link(&self, doi: &str) -> Result<Option<String>, SourceError> {
        Ok(self.resolve(doi).await?.pdf_url)
    }

    /// Lift resolved metadata into a candidate, if it carries a PDF link
    fn to_candidate(&self, metadata: &DoiMetadata) -> Option<Candidate> {
        metadata.to_candidate()
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// The call did not complete within its budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Parsing error (XML, JSON, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimit,

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// Source is not usable in this configuration (e.g. missing API key)
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

/// Map a non-success HTTP status to a [`SourceError`]
pub(crate) async fn check_status(
    response: reqwest::Response,
    source_name: &str,
) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(format!(
            "{} returned 404 for {}",
            source_name,
            response.url()
        )));
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimit);
    }
    let text = response.text().await.unwrap_or_default();
    Err(SourceError::Api(format!(
        "{} API returned status {}: {}",
        source_name,
        status,
        text.chars().take(200).collect::<String>()
    )))
}

/// Strip resolver prefixes from a DOI and lower-case it
pub(crate) fn bare_doi(doi: &str) -> String {
    let doi = doi.trim();
    let lower = doi.to_lowercase();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    lower
}

/// Percent-encode a DOI for use as a URL path, keeping its `/` separators
pub(crate) fn doi_path(doi: &str) -> String {
    doi.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse the leading four-digit year from a date string like "2015-05-28" or "2015 May"
pub(crate) fn leading_year(date: &str) -> Option<i32> {
    let digits: String = date.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}
