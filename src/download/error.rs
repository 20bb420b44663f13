//! Error types for the download pipeline.
//!
//! [`CandidateError`] fails a single attempt and moves the pipeline to the
//! next-ranked candidate. [`DownloadError`] is what the caller sees when the
//! whole operation fails.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::search::InputValidationError;

/// Why one candidate could not be downloaded
#[derive(Debug, Error)]
pub enum CandidateError {
    /// A redirect pointed back at a URL already visited
    #[error("circular redirect at {url}")]
    CircularRedirect { url: String },

    #[error("too many redirects (more than {limit}) starting from {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("redirect from {url} without a usable Location header")]
    MissingLocation { url: String },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("unsupported content type {content_type:?} at {url}")]
    UnsupportedContentType {
        url: String,
        content_type: Option<String>,
    },

    /// Declared or streamed size exceeded the limit
    #[error("file exceeds the {limit_bytes} byte limit at {url}")]
    TooLarge { url: String, limit_bytes: u64 },

    #[error("invalid PDF: {reason}")]
    InvalidPdf { reason: String },

    #[error("network error downloading {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CandidateError {
    pub(crate) fn network(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Whole-operation download failure
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputValidationError),

    /// The search completed without any candidate
    #[error("no PDF candidates found{}", format_warnings(.warnings))]
    PdfNotFound { warnings: Vec<String> },

    /// Every candidate was tried and failed
    #[error("all {} download attempts failed: {}", .attempts.len(), .attempts.join("; "))]
    AllFailed { attempts: Vec<String> },

    #[error("invalid proxy configuration: {0}")]
    InvalidProxy(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::InvalidInput(_) | DownloadError::InvalidProxy(_) => "INVALID_INPUT",
            DownloadError::PdfNotFound { .. } => "PDF_NOT_FOUND",
            DownloadError::AllFailed { .. } | DownloadError::Client(_) => "DOWNLOAD_FAILED",
            DownloadError::Io { .. } => "IO_ERROR",
        }
    }
}

fn format_warnings(warnings: &[String]) -> String {
    if warnings.is_empty() {
        String::new()
    } else {
        format!(" ({})", warnings.join("; "))
    }
}
