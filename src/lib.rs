//! # PDF Finder
//!
//! Federated discovery, ranking and retrieval of scholarly PDFs.
//!
//! Given whatever is known about a document (DOI, title, authors, PubMed id,
//! ISBN), the search fans out to a DOI registry and a set of open-access
//! catalogs, scores every located copy, and returns a ranked list. The
//! download pipeline then walks that list until one copy passes redirect,
//! content-type, size and structural checks.
//!
//! ## Architecture
//!
//! - [`models`]: queries, candidates, search and download results
//! - [`sources`]: catalog adapters, the CrossRef resolver and the snapshot provider seam
//! - [`search`]: validation, fan-out, scoring and orchestration
//! - [`download`]: manual-redirect transport and the ranked-fallback pipeline
//! - [`utils`]: HTTP client and PDF validation
//! - [`config`]: layered configuration
//!
//! ## Example
//!
//! ```no_run
//! use pdf_finder::config::get_config;
//! use pdf_finder::models::{DownloadOptions, PdfQuery};
//! use pdf_finder::{DownloadPipeline, SearchOrchestrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = get_config();
//! let pipeline = DownloadPipeline::new(SearchOrchestrator::from_config(&config)?);
//!
//! let query = PdfQuery::new().doi("10.1371/journal.pone.0000001");
//! let options = DownloadOptions::new("ref-1", "./downloads");
//! let result = pipeline.download_best(&query, &options).await?;
//! println!("{:?}", result.file_path);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod models;
pub mod search;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use download::{DownloadError, DownloadPipeline};
pub use models::{Candidate, PdfQuery, SearchResult};
pub use search::SearchOrchestrator;
pub use sources::{CandidateSource, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
