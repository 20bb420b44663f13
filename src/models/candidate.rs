//! Candidate document locations and the ranked search result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::query::{AccessLevel, SourceType};

/// Bibliographic metadata a source reported alongside a location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub journal: Option<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub publisher: Option<String>,
    pub content_type: Option<String>,
}

/// One located copy of a document.
///
/// The `url` is the deduplication key. `confidence` is kept in `[0, 1]` by
/// every constructor and setter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Human-readable name of the source that produced this location
    pub source: String,

    pub source_type: SourceType,

    pub url: String,

    confidence: f64,

    pub access_level: AccessLevel,

    pub last_checked: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CandidateMetadata>,

    /// Rendered document bytes (snapshot candidates only, never serialized)
    #[serde(skip)]
    pub payload: Option<Arc<[u8]>>,
}

impl Candidate {
    /// Create a candidate, clamping the confidence into `[0, 1]`
    pub fn new(
        source: impl Into<String>,
        source_type: SourceType,
        url: impl Into<String>,
        confidence: f64,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            source: source.into(),
            source_type,
            url: url.into(),
            confidence: clamp_confidence(confidence),
            access_level,
            last_checked: Utc::now(),
            metadata: None,
            payload: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: CandidateMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach a rendered byte payload
    pub fn with_payload(mut self, bytes: Vec<u8>) -> Self {
        self.payload = Some(Arc::from(bytes));
        self
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Replace the confidence, clamping into `[0, 1]`
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_confidence(confidence);
    }

    /// Whether this candidate carries its own bytes and needs no network fetch
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Outcome of a federated search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub found: bool,

    /// Candidates ordered by descending confidence
    pub results: Vec<Candidate>,

    /// Number of distinct source names among `results`
    pub total_sources: usize,

    /// Wall-clock search time in milliseconds
    pub search_time_ms: u64,

    /// Non-fatal branch failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl SearchResult {
    /// Build a result from a final ranked list
    pub fn new(results: Vec<Candidate>, search_time_ms: u64, errors: Vec<String>) -> Self {
        let total_sources = results
            .iter()
            .map(|c| c.source.as_str())
            .collect::<HashSet<_>>()
            .len();
        Self {
            found: !results.is_empty(),
            results,
            total_sources,
            search_time_ms,
            errors,
        }
    }

    /// A failed search with a single error and no results
    pub fn failed(error: impl Into<String>, search_time_ms: u64) -> Self {
        Self {
            found: false,
            results: Vec::new(),
            total_sources: 0,
            search_time_ms,
            errors: vec![error.into()],
        }
    }

    /// Highest-ranked candidate
    pub fn best(&self) -> Option<&Candidate> {
        self.results.first()
    }
}
