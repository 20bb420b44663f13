//! Web page snapshot rendering.
//!
//! A snapshot is the last-resort candidate: the landing page of the document
//! rendered to PDF by an external renderer (a headless browser, a print
//! service). Only the contract lives here; the renderer is plugged in through
//! [`SnapshotProvider`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};

/// Source name used on snapshot candidates
pub const SNAPSHOT_SOURCE_NAME: &str = "Snapshot";

/// Baseline confidence of a rendered page
pub const SNAPSHOT_CONFIDENCE: f64 = 0.3;

const DOI_RESOLVER_URL: &str = "https://doi.org";
const SEMANTIC_SCHOLAR_SEARCH_URL: &str = "https://www.semanticscholar.org/search";

/// Options passed to the renderer
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::models::DEFAULT_SOURCE_TIMEOUT_SECS),
        }
    }
}

/// Renderer output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderedPdf {
    pub success: bool,
    #[serde(skip)]
    pub bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub error: Option<String>,
}

impl RenderedPdf {
    pub fn ok(bytes: Vec<u8>) -> Self {
        Self {
            success: true,
            bytes: Some(bytes),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Renders a URL to PDF bytes
#[async_trait]
pub trait SnapshotProvider: Send + Sync + std::fmt::Debug {
    async fn render_to_pdf(&self, url: &str, options: &RenderOptions) -> RenderedPdf;
}

/// The page to render for a query: the DOI landing page, else a title search
pub fn snapshot_target(query: &PdfQuery) -> Option<String> {
    if let Some(doi) = query.doi_str() {
        return Some(format!("{}/{}", DOI_RESOLVER_URL, doi));
    }
    query.title_str().map(|title| {
        format!(
            "{}?q={}",
            SEMANTIC_SCHOLAR_SEARCH_URL,
            urlencoding::encode(title)
        )
    })
}

/// Turn a successful render into a payload-carrying candidate
pub fn snapshot_candidate(target: &str, query: &PdfQuery, rendered: RenderedPdf) -> Option<Candidate> {
    if !rendered.success {
        return None;
    }
    let bytes = rendered.bytes.filter(|b| !b.is_empty())?;

    let metadata = CandidateMetadata {
        title: rendered
            .metadata
            .get("title")
            .cloned()
            .or_else(|| query.title_str().map(str::to_string)),
        doi: query.doi_str().map(str::to_string),
        content_type: Some("application/pdf".to_string()),
        ..CandidateMetadata::default()
    };

    Some(
        Candidate::new(
            SNAPSHOT_SOURCE_NAME,
            SourceType::Snapshot,
            format!("snapshot:{}", target),
            SNAPSHOT_CONFIDENCE,
            AccessLevel::Free,
        )
        .with_metadata(metadata)
        .with_payload(bytes),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_prefers_doi() {
        let q = PdfQuery::new().doi("10.1/x").title("T");
        assert_eq!(snapshot_target(&q).as_deref(), Some("https://doi.org/10.1/x"));

        let q = PdfQuery::new().title("Deep learning");
        assert_eq!(
            snapshot_target(&q).as_deref(),
            Some("https://www.semanticscholar.org/search?q=Deep%20learning")
        );

        assert!(snapshot_target(&PdfQuery::new().pmid("1")).is_none());
    }

    #[test]
    fn test_candidate_from_render() {
        let q = PdfQuery::new().title("Deep learning");
        let c = snapshot_candidate("https://x", &q, RenderedPdf::ok(b"%PDF-1.4".to_vec())).unwrap();
        assert_eq!(c.url, "snapshot:https://x");
        assert_eq!(c.confidence(), 0.3);
        assert!(c.has_payload());

        assert!(snapshot_candidate("https://x", &q, RenderedPdf::failed("boom")).is_none());
        assert!(snapshot_candidate("https://x", &q, RenderedPdf::ok(Vec::new())).is_none());
    }
}
