//! Identifier normalization and validation.
//!
//! Runs before any I/O: a query that fails here never reaches a source.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::models::PdfQuery;

/// Input validation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputValidationError {
    #[error("At least one of doi, title, pmid or isbn is required")]
    MissingIdentifier,

    #[error("Invalid DOI format: {0}")]
    InvalidDoi(String),

    #[error("Invalid PMID: {0}")]
    InvalidPmid(String),
}

fn doi_pattern() -> Option<&'static Regex> {
    static DOI_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    DOI_PATTERN
        .get_or_init(|| Regex::new(r"^10\.\d{4,}/\S+$").ok())
        .as_ref()
}

/// Strip resolver prefixes, case-fold and check the DOI shape
///
/// Accepts `10.1038/nature12373`, `doi:10.1038/...` and
/// `https://doi.org/10.1038/...`.
pub fn normalize_doi(doi: &str) -> Result<String, InputValidationError> {
    let lower = doi.trim().to_lowercase();

    let mut bare = lower.as_str();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if let Some(rest) = bare.strip_prefix(prefix) {
            bare = rest.trim_start();
            break;
        }
    }

    if doi_pattern().is_some_and(|re| re.is_match(bare)) {
        Ok(bare.to_string())
    } else {
        Err(InputValidationError::InvalidDoi(doi.trim().to_string()))
    }
}

/// Check that the query names a document and that its identifiers are well formed
pub fn validate(query: &PdfQuery) -> Result<(), InputValidationError> {
    normalize_query(query).map(|_| ())
}

/// Validate and return a copy with normalized identifiers.
///
/// Blank strings become `None`, the DOI is normalized and the remaining
/// strings are trimmed.
pub fn normalize_query(query: &PdfQuery) -> Result<PdfQuery, InputValidationError> {
    if query.doi_str().is_none()
        && query.title_str().is_none()
        && query.pmid_str().is_none()
        && query.isbn_str().is_none()
    {
        return Err(InputValidationError::MissingIdentifier);
    }

    let doi = query.doi_str().map(normalize_doi).transpose()?;

    let pmid = match query.pmid_str() {
        Some(pmid) if pmid.chars().all(|c| c.is_ascii_digit()) => Some(pmid.to_string()),
        Some(pmid) => return Err(InputValidationError::InvalidPmid(pmid.to_string())),
        None => None,
    };

    let mut normalized = query.clone();
    normalized.doi = doi;
    normalized.pmid = pmid;
    normalized.title = query.title_str().map(str::to_string);
    normalized.isbn = query
        .isbn_str()
        .map(|isbn| isbn.chars().filter(|c| !matches!(c, '-' | ' ')).collect());
    normalized.journal = query
        .journal
        .as_deref()
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .map(str::to_string);
    normalized.authors = query
        .authors
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();

    Ok(normalized)
}
