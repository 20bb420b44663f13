//! Mock collaborators for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::models::{AccessLevel, Candidate, CandidateMetadata, PdfQuery, SourceType};
use crate::sources::{
    DoiMetadata, DoiResolver, RenderOptions, RenderedPdf, SnapshotProvider, SourceCapabilities,
    SourceError,
};

use super::CandidateSource;

/// A mock source that returns predefined candidates and counts its calls.
#[derive(Debug)]
pub struct MockSource {
    id: String,
    name: String,
    capabilities: SourceCapabilities,
    candidates: Mutex<Vec<Candidate>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a mock source that can serve every identifier and finds nothing
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capabilities: SourceCapabilities::all(),
            candidates: Mutex::new(Vec::new()),
            failure: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: SourceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_candidates(self, candidates: Vec<Candidate>) -> Self {
        self.set_candidates(candidates);
        self
    }

    /// Make every call fail with an API error carrying `message`
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Sleep before answering
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the candidates returned by later calls
    pub fn set_candidates(&self, candidates: Vec<Candidate>) {
        let mut guard = self
            .candidates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = candidates;
    }

    /// Number of times `find` was invoked
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandidateSource for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SourceCapabilities {
        self.capabilities
    }

    async fn find(&self, _query: &PdfQuery) -> Result<Vec<Candidate>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(SourceError::Api(message.clone()));
        }

        let guard = self
            .candidates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }
}

/// A mock DOI resolver returning fixed metadata
#[derive(Debug, Default)]
pub struct MockDoiResolver {
    metadata: Option<DoiMetadata>,
    calls: AtomicUsize,
}

impl MockDoiResolver {
    /// Resolve every DOI to `metadata`
    pub fn new(metadata: DoiMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every DOI with `NotFound`
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DoiResolver for MockDoiResolver {
    async fn resolve(&self, doi: &str) -> Result<DoiMetadata, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .clone()
            .ok_or_else(|| SourceError::NotFound(format!("DOI not registered: {}", doi)))
    }
}

/// A mock renderer returning a fixed render result
#[derive(Debug)]
pub struct MockSnapshotProvider {
    rendered: RenderedPdf,
    calls: AtomicUsize,
    last_url: Mutex<Option<String>>,
}

impl MockSnapshotProvider {
    pub fn new(rendered: RenderedPdf) -> Self {
        Self {
            rendered,
            calls: AtomicUsize::new(0),
            last_url: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URL of the most recent render request
    pub fn last_url(&self) -> Option<String> {
        self.last_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SnapshotProvider for MockSnapshotProvider {
    async fn render_to_pdf(&self, url: &str, _options: &RenderOptions) -> RenderedPdf {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
        self.rendered.clone()
    }
}

/// Helper function to create a candidate for testing.
pub fn make_candidate(source: &str, url: &str, confidence: f64) -> Candidate {
    Candidate::new(
        source,
        SourceType::OpenAccess,
        url,
        confidence,
        AccessLevel::Subscription,
    )
}

/// Helper function to create a candidate carrying metadata for testing.
pub fn make_candidate_with_metadata(
    source: &str,
    url: &str,
    confidence: f64,
    metadata: CandidateMetadata,
) -> Candidate {
    make_candidate(source, url, confidence).with_metadata(metadata)
}
